//! Playback orchestration.

pub mod player;

pub use player::{Player, PlayerConfig, PlayerError, PlayerEvent, PlayerState, SubscriptionId, Track};
