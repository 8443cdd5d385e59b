// Mirrored session state: one application path for local actions and
// relay echoes, instantiated for pause, volume, playback, world clock and seats

mod playback;
mod replica;
mod state;
mod volume;
mod world_clock;


pub use crate::protocol::StateKey;
pub use playback::{
    playback_offset_ms, AudioBackend, HeadlessAudio, MediaStatus, PlaybackScheduler, SpeakerOutput,
};
pub use replica::{Origin, Replica, SharedValue};
pub use state::{normalize_change, PlaybackRecord, SessionState};
pub use volume::{clamp_volume, effective_gain, spatial_falloff, DEFAULT_VOLUME};
pub use world_clock::WorldClock;
