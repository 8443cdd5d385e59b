use crate::config::PlaybackConfig;
use crate::entity::EntityId;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Load state of a speaker's media as seen by the local audio backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaStatus {
    /// Speaker object not instantiated yet
    Missing,
    /// Metadata (duration) not resolved yet
    Loading,
    Ready { duration_ms: i64 },
    Failed,
}

/// Local audio output. Every call is idempotent.
pub trait AudioBackend {
    fn media_status(&self, speaker: EntityId) -> MediaStatus;
    fn start(&mut self, speaker: EntityId, track: &str, offset_ms: i64);
    fn set_paused(&mut self, speaker: EntityId, paused: bool);
    fn set_gain(&mut self, speaker: EntityId, gain: f32);
}

/// Position within a looping track for a start issued at `server_time`.
/// Negative elapsed time (clock skew) counts as zero.
pub fn playback_offset_ms(now: i64, server_time: i64, duration_ms: i64) -> i64 {
    if duration_ms <= 0 {
        return 0;
    }
    (now - server_time).max(0) % duration_ms
}

#[derive(Clone, Debug, PartialEq)]
struct PendingStart {
    track: String,
    server_time: i64,
    queued_at: i64,
    next_attempt: i64,
    attempts: u32,
}

/// Deferred playback starts waiting on media to load.
///
/// One entry per speaker; a newer start replaces the older one. Entries are
/// retried every `retry_backoff_ms` and dropped after `retry_budget_ms`.
#[derive(Debug)]
pub struct PlaybackScheduler {
    pending: BTreeMap<EntityId, PendingStart>,
    backoff_ms: i64,
    budget_ms: i64,
}

impl PlaybackScheduler {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            pending: BTreeMap::new(),
            backoff_ms: config.retry_backoff_ms.max(1),
            budget_ms: config.retry_budget_ms.max(0),
        }
    }

    /// Queue a start; it is attempted on the next `poll`
    pub fn schedule(&mut self, speaker: EntityId, track: &str, server_time: i64, now: i64) {
        let replaced = self
            .pending
            .insert(
                speaker,
                PendingStart {
                    track: track.to_string(),
                    server_time,
                    queued_at: now,
                    next_attempt: now,
                    attempts: 0,
                },
            )
            .is_some();
        if replaced {
            debug!(speaker = %speaker, track = track, "Replaced pending playback start");
        }
    }

    pub fn cancel(&mut self, speaker: EntityId) -> bool {
        self.pending.remove(&speaker).is_some()
    }

    pub fn is_pending(&self, speaker: EntityId) -> bool {
        self.pending.contains_key(&speaker)
    }

    pub fn attempts(&self, speaker: EntityId) -> Option<u32> {
        self.pending.get(&speaker).map(|p| p.attempts)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Attempt every due entry. Returns the speakers that started playing.
    pub fn poll<A: AudioBackend + ?Sized>(&mut self, now: i64, audio: &mut A) -> Vec<EntityId> {
        let due: Vec<EntityId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.next_attempt <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut started = Vec::new();
        for speaker in due {
            match audio.media_status(speaker) {
                MediaStatus::Ready { duration_ms } => {
                    if let Some(entry) = self.pending.remove(&speaker) {
                        let offset = playback_offset_ms(now, entry.server_time, duration_ms);
                        audio.start(speaker, &entry.track, offset);
                        info!(
                            speaker = %speaker,
                            track = %entry.track,
                            offset_ms = offset,
                            attempts = entry.attempts,
                            "Started synchronized playback"
                        );
                        started.push(speaker);
                    }
                }
                MediaStatus::Failed => {
                    if let Some(entry) = self.pending.remove(&speaker) {
                        warn!(speaker = %speaker, track = %entry.track, "Media failed to load, playback aborted");
                    }
                }
                MediaStatus::Missing | MediaStatus::Loading => {
                    let expired = match self.pending.get_mut(&speaker) {
                        Some(entry) if now - entry.queued_at >= self.budget_ms => true,
                        Some(entry) => {
                            entry.attempts += 1;
                            entry.next_attempt = now + self.backoff_ms;
                            false
                        }
                        None => continue,
                    };
                    if expired {
                        self.pending.remove(&speaker);
                        warn!(
                            speaker = %speaker,
                            budget_ms = self.budget_ms,
                            "Speaker media never became ready, dropping playback start"
                        );
                    }
                }
            }
        }
        started
    }
}

/// What a headless backend has been told about one speaker
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpeakerOutput {
    pub track: Option<String>,
    pub offset_ms: Option<i64>,
    pub starts: u32,
    pub paused: bool,
    pub gain: f32,
}

/// Audio backend without sound output: media status is set by the caller
/// and every call is recorded. Used by headless instances and tests.
#[derive(Debug, Default)]
pub struct HeadlessAudio {
    media: HashMap<EntityId, MediaStatus>,
    outputs: HashMap<EntityId, SpeakerOutput>,
}

impl HeadlessAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_media(&mut self, speaker: EntityId, status: MediaStatus) {
        self.media.insert(speaker, status);
    }

    pub fn output(&self, speaker: EntityId) -> Option<&SpeakerOutput> {
        self.outputs.get(&speaker)
    }

    fn output_mut(&mut self, speaker: EntityId) -> &mut SpeakerOutput {
        self.outputs.entry(speaker).or_default()
    }
}

impl AudioBackend for HeadlessAudio {
    fn media_status(&self, speaker: EntityId) -> MediaStatus {
        self.media.get(&speaker).copied().unwrap_or(MediaStatus::Missing)
    }

    fn start(&mut self, speaker: EntityId, track: &str, offset_ms: i64) {
        let out = self.output_mut(speaker);
        out.track = Some(track.to_string());
        out.offset_ms = Some(offset_ms);
        out.starts += 1;
    }

    fn set_paused(&mut self, speaker: EntityId, paused: bool) {
        self.output_mut(speaker).paused = paused;
    }

    fn set_gain(&mut self, speaker: EntityId, gain: f32) {
        self.output_mut(speaker).gain = gain;
    }
}
