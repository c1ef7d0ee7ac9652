//! Extension and content-type keyed decoder selection.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use symphonia::core::io::{MediaSource, ReadOnlySource};

use super::{DecodeError, Decoder, SymphoniaDecoder};

/// Builds decoders for one family of formats.
pub trait DecoderFactory: Send + Sync {
    fn open_path(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError>;

    fn open_stream(
        &self,
        source: Box<dyn MediaSource>,
        extension: &str,
    ) -> Result<Box<dyn Decoder>, DecodeError>;
}

/// Factory producing [`SymphoniaDecoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaFactory;

impl DecoderFactory for SymphoniaFactory {
    fn open_path(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
        Ok(Box::new(SymphoniaDecoder::open_path(path)?))
    }

    fn open_stream(
        &self,
        source: Box<dyn MediaSource>,
        extension: &str,
    ) -> Result<Box<dyn Decoder>, DecodeError> {
        Ok(Box::new(SymphoniaDecoder::open_stream(
            source,
            Some(extension),
        )?))
    }
}

const DEFAULT_EXTENSIONS: &[&str] = &[
    "wav", "wave", "flac", "mp3", "ogg", "oga", "m4a", "aac", "mp4", "alac", "caf",
];

const DEFAULT_CONTENT_TYPES: &[(&str, &str)] = &[
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/flac", "flac"),
    ("audio/x-flac", "flac"),
    ("audio/ogg", "ogg"),
    ("application/ogg", "ogg"),
    ("audio/wav", "wav"),
    ("audio/wave", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/aac", "aac"),
    ("audio/mp4", "m4a"),
];

/// Maps file extensions and MIME content types to decoder factories.
///
/// Constructed once and shared by reference; there is no process-wide
/// registry.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    factories: HashMap<String, Arc<dyn DecoderFactory>>,
    content_types: HashMap<String, String>,
}

impl DecoderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the symphonia factory for every bundled format.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let factory: Arc<dyn DecoderFactory> = Arc::new(SymphoniaFactory);
        for extension in DEFAULT_EXTENSIONS {
            registry.register_shared(extension, factory.clone());
        }
        for (content_type, extension) in DEFAULT_CONTENT_TYPES {
            registry.register_content_type(content_type, extension);
        }
        registry
    }

    /// Register (or replace) the factory for `extension`.
    pub fn register<F>(&mut self, extension: &str, factory: F)
    where
        F: DecoderFactory + 'static,
    {
        self.register_shared(extension, Arc::new(factory));
    }

    pub fn register_shared(&mut self, extension: &str, factory: Arc<dyn DecoderFactory>) {
        self.factories.insert(normalize_extension(extension), factory);
    }

    /// Route a MIME content type to the factory registered for `extension`.
    pub fn register_content_type(&mut self, content_type: &str, extension: &str) {
        self.content_types.insert(
            normalize_content_type(content_type),
            normalize_extension(extension),
        );
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.factories.contains_key(&normalize_extension(extension))
    }

    pub fn supports_content_type(&self, content_type: &str) -> bool {
        self.extension_for_content_type(content_type)
            .map(|ext| self.factories.contains_key(ext))
            .unwrap_or(false)
    }

    /// Registered extensions in sorted order.
    pub fn supported_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.factories.keys().cloned().collect();
        formats.sort();
        formats
    }

    /// Content types grouped by the extension they resolve to.
    pub fn content_types(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (content_type, extension) in &self.content_types {
            grouped
                .entry(extension.clone())
                .or_default()
                .push(content_type.clone());
        }
        for types in grouped.values_mut() {
            types.sort();
        }
        grouped
    }

    /// Open a decoder for a file, chosen by its extension.
    pub fn open_path(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(normalize_extension)
            .ok_or_else(|| {
                DecodeError::UnsupportedFormat(format!("{} has no extension", path.display()))
            })?;
        let factory = self.factories.get(&extension).ok_or_else(|| {
            DecodeError::UnsupportedFormat(format!("no decoder registered for .{}", extension))
        })?;
        factory.open_path(path)
    }

    /// Open a decoder for a byte source, chosen by MIME content type.
    pub fn open_stream(
        &self,
        source: Box<dyn MediaSource>,
        content_type: &str,
    ) -> Result<Box<dyn Decoder>, DecodeError> {
        let extension = self
            .extension_for_content_type(content_type)
            .ok_or_else(|| DecodeError::UnsupportedFormat(content_type.to_string()))?;
        let factory = self.factories.get(extension).ok_or_else(|| {
            DecodeError::UnsupportedFormat(format!("no decoder registered for .{}", extension))
        })?;
        factory.open_stream(source, extension)
    }

    /// Open a decoder over a forward-only reader. Seeking will report
    /// [`DecodeError::SeekNotSupported`].
    pub fn open_reader<R>(
        &self,
        reader: R,
        content_type: &str,
    ) -> Result<Box<dyn Decoder>, DecodeError>
    where
        R: Read + Send + Sync + 'static,
    {
        self.open_stream(Box::new(ReadOnlySource::new(reader)), content_type)
    }

    fn extension_for_content_type(&self, content_type: &str) -> Option<&str> {
        self.content_types
            .get(&normalize_content_type(content_type))
            .map(String::as_str)
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formats", &self.supported_formats())
            .finish()
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Lowercase and strip parameters such as `; charset=binary`.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use super::*;
    use crate::decoder::{AudioFormat, MemoryDecoder};
    use crate::test_data::{sine_wave, wav_bytes};

    struct SilenceFactory;

    impl DecoderFactory for SilenceFactory {
        fn open_path(&self, _path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
            Ok(Box::new(MemoryDecoder::new(
                AudioFormat::new(8_000, 2),
                vec![0.0; 16],
            )))
        }

        fn open_stream(
            &self,
            _source: Box<dyn MediaSource>,
            _extension: &str,
        ) -> Result<Box<dyn Decoder>, DecodeError> {
            self.open_path(Path::new("stream"))
        }
    }

    #[test]
    fn unknown_extension_fails_fast() {
        let registry = DecoderRegistry::with_defaults();
        let err = registry
            .open_path(&PathBuf::from("song.xyz"))
            .err()
            .expect("xyz should be rejected");
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));

        let err = registry
            .open_path(&PathBuf::from("no_extension"))
            .err()
            .expect("missing extension should be rejected");
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn content_type_aliases_resolve() {
        let registry = DecoderRegistry::with_defaults();
        assert!(registry.supports_content_type("audio/mp3"));
        assert!(registry.supports_content_type("Audio/MPEG"));
        assert!(registry.supports_content_type("application/ogg"));
        assert!(registry.supports_content_type("audio/wave; codecs=1"));
        assert!(!registry.supports_content_type("video/webm"));
        assert!(registry.supports(".FLAC"));
    }

    #[test]
    fn stream_opens_through_content_type() {
        let registry = DecoderRegistry::with_defaults();
        let bytes = wav_bytes(8_000, 2, &sine_wave(220.0, 8_000, 2, 400, 0.3));
        let decoder = registry
            .open_stream(Box::new(Cursor::new(bytes)), "audio/wav")
            .expect("wav stream");
        assert_eq!(decoder.sample_count(), 400);

        let err = registry
            .open_stream(Box::new(Cursor::new(Vec::new())), "audio/unknown")
            .err()
            .expect("unknown content type");
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn custom_factories_override_defaults() {
        let mut registry = DecoderRegistry::new();
        assert!(registry.supported_formats().is_empty());

        registry.register("raw", SilenceFactory);
        registry.register_content_type("audio/x-raw", "raw");
        assert_eq!(registry.supported_formats(), vec!["raw".to_string()]);

        let decoder = registry.open_path(Path::new("clip.RAW")).unwrap();
        assert_eq!(decoder.sample_count(), 8);
        assert_eq!(
            registry.content_types().get("raw"),
            Some(&vec!["audio/x-raw".to_string()])
        );
    }
}
