use super::{Effect, EffectContext, Equalizer, Limiter, ReplayGain};
use crate::dsp::DspError;

/// Ordered list of effects applied one after another.
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
    context: EffectContext,
    enabled: bool,
}

impl std::fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectChain")
            .field("enabled", &self.enabled)
            .field("context", &self.context)
            .field("effects", &self.names())
            .finish()
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new(EffectContext::default())
    }
}

impl EffectChain {
    pub fn new(context: EffectContext) -> Self {
        Self {
            effects: Vec::new(),
            context,
            enabled: true,
        }
    }

    /// ReplayGain, then the equalizer, then the limiter.
    pub fn standard(context: EffectContext) -> Self {
        let mut chain = Self::new(context);
        chain.add(Box::new(ReplayGain::new()));
        chain.add(Box::new(Equalizer::new(context)));
        chain.add(Box::new(Limiter::new(context)));
        chain
    }

    pub fn context(&self) -> EffectContext {
        self.context
    }

    /// Append an effect, configured for the chain's current context.
    pub fn add(&mut self, mut effect: Box<dyn Effect>) {
        effect.configure(&self.context);
        self.effects.push(effect);
    }

    /// Detach an effect by name.
    pub fn remove(&mut self, name: &str) -> Result<Box<dyn Effect>, DspError> {
        let index = self
            .effects
            .iter()
            .position(|effect| effect.name() == name)
            .ok_or_else(|| DspError::EffectNotFound(name.to_string()))?;
        Ok(self.effects.remove(index))
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.effects.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&dyn Effect> {
        self.effects
            .iter()
            .find(|effect| effect.name() == name)
            .map(|effect| effect.as_ref())
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut (dyn Effect + 'static)> {
        self.effects
            .iter_mut()
            .find(|effect| effect.name() == name)
            .map(|effect| effect.as_mut())
    }

    /// Typed access to the first effect of type `T`.
    pub fn get<T: Effect + 'static>(&self) -> Option<&T> {
        self.effects
            .iter()
            .find_map(|effect| effect.as_any().downcast_ref::<T>())
    }

    /// Mutable typed access to the first effect of type `T`.
    pub fn get_mut<T: Effect + 'static>(&mut self) -> Option<&mut T> {
        self.effects
            .iter_mut()
            .find_map(|effect| effect.as_any_mut().downcast_mut::<T>())
    }

    /// Enable or bypass the whole chain.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    /// Push a new sample rate or channel count to every effect.
    pub fn configure(&mut self, context: &EffectContext) {
        self.context = *context;
        for effect in &mut self.effects {
            effect.configure(context);
        }
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for effect in self.effects.iter_mut().filter(|e| e.is_enabled()) {
            effect.process(samples);
        }
    }

    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for effect in self.effects.iter_mut().filter(|e| e.is_enabled()) {
            effect.process_stereo(left, right);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::dsp::effects::{equalizer, limiter, replay_gain};

    struct Scale {
        factor: f32,
        enabled: bool,
    }

    impl Effect for Scale {
        fn name(&self) -> &str {
            "Scale"
        }
        fn configure(&mut self, _context: &EffectContext) {}
        fn process(&mut self, samples: &mut [f32]) {
            samples.iter_mut().for_each(|s| *s *= self.factor);
        }
        fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
            self.process(left);
            self.process(right);
        }
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn reset(&mut self) {}
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn scale(factor: f32) -> Box<dyn Effect> {
        Box::new(Scale {
            factor,
            enabled: true,
        })
    }

    #[test]
    fn standard_chain_order() {
        let chain = EffectChain::standard(EffectContext::new(44_100, 2));
        assert_eq!(
            chain.names(),
            vec![replay_gain::NAME, equalizer::NAME, limiter::NAME]
        );
        assert!(chain.get::<Equalizer>().is_some());
    }

    #[test]
    fn only_enabled_effects_run() {
        let mut chain = EffectChain::default();
        chain.add(scale(2.0));
        let mut samples = vec![0.25_f32; 4];
        chain.process(&mut samples);
        assert_eq!(samples, vec![0.5; 4]);

        chain.find_mut("Scale").unwrap().set_enabled(false);
        chain.process(&mut samples);
        assert_eq!(samples, vec![0.5; 4]);

        chain.find_mut("Scale").unwrap().set_enabled(true);
        chain.set_enabled(false);
        chain.process(&mut samples);
        assert_eq!(samples, vec![0.5; 4]);
    }

    #[test]
    fn remove_by_name() {
        let mut chain = EffectChain::standard(EffectContext::default());
        let removed = chain.remove(limiter::NAME).unwrap();
        assert_eq!(removed.name(), limiter::NAME);
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.remove(limiter::NAME).err(),
            Some(DspError::EffectNotFound(limiter::NAME.to_string()))
        );
    }

    #[test]
    fn typed_access_mutates_in_place() {
        let mut chain = EffectChain::standard(EffectContext::default());
        chain
            .get_mut::<Equalizer>()
            .unwrap()
            .load_preset("rock")
            .unwrap();
        assert_eq!(
            chain.get::<Equalizer>().unwrap().current_preset(),
            Some("rock")
        );
    }

    #[test]
    fn stereo_runs_in_order() {
        let mut chain = EffectChain::default();
        chain.add(scale(0.5));
        chain.add(scale(3.0));
        let (mut l, mut r) = (vec![1.0_f32; 2], vec![-1.0_f32; 2]);
        chain.process_stereo(&mut l, &mut r);
        assert_eq!(l, vec![1.5; 2]);
        assert_eq!(r, vec![-1.5; 2]);
    }
}
