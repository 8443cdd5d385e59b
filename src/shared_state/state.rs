use super::playback::{AudioBackend, PlaybackScheduler};
use super::replica::{Origin, Replica};
use super::volume::{clamp_volume, effective_gain, DEFAULT_VOLUME};
use super::world_clock::WorldClock;
use crate::config::PlaybackConfig;
use crate::entity::{ConnectionId, EntityId, Registry, Vec3};
use crate::protocol::{StateChange, StateKey};
use tracing::debug;

/// Last playback start applied for a speaker
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackRecord {
    pub track: String,
    pub server_time: i64,
}

/// Mirrored session state for one instance: pause, volume, playback,
/// world clock and seats, plus the local speakers and seats they refer to.
///
/// All mutation goes through [`SessionState::apply`]. `apply_local` returns
/// the change the caller must publish; `apply_remote` has nothing to publish.
pub struct SessionState {
    paused: Replica<EntityId, bool>,
    volume: Replica<EntityId, f32>,
    playback: Replica<EntityId, PlaybackRecord>,
    world_clock: Replica<(), WorldClock>,
    seats: Replica<EntityId, Option<ConnectionId>>,
    speakers: Registry<Vec3>,
    known_seats: Registry<()>,
    scheduler: PlaybackScheduler,
    listener: Vec3,
    falloff_distance: f32,
    master_volume: f32,
}

impl SessionState {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            paused: Replica::new(),
            volume: Replica::new(),
            playback: Replica::new(),
            world_clock: Replica::new(),
            seats: Replica::new(),
            speakers: Registry::new(),
            known_seats: Registry::new(),
            scheduler: PlaybackScheduler::new(config),
            listener: Vec3::default(),
            falloff_distance: config.falloff_distance,
            master_volume: config.master_volume,
        }
    }

    pub fn register_speaker(&mut self, id: EntityId, position: Vec3) {
        self.speakers.insert(id, position);
    }

    /// Forget a speaker and every value mirrored for it
    pub fn remove_speaker(&mut self, id: EntityId) -> bool {
        self.paused.remove(&id);
        self.volume.remove(&id);
        self.playback.remove(&id);
        self.scheduler.cancel(id);
        self.speakers.remove(id).is_some()
    }

    pub fn register_seat(&mut self, id: EntityId) {
        self.known_seats.insert(id, ());
    }

    pub fn remove_seat(&mut self, id: EntityId) -> bool {
        self.seats.remove(&id);
        self.known_seats.remove(id).is_some()
    }

    /// The one application function shared by local actions and mirrored
    /// events. Returns false when the change was dropped (unknown target,
    /// invalid clock).
    pub fn apply<A: AudioBackend + ?Sized>(
        &mut self,
        change: &StateChange,
        origin: Origin,
        audio: &mut A,
        now: i64,
    ) -> bool {
        match change {
            StateChange::SpeakerPaused { speaker_id, paused } => {
                if !self.require_speaker(*speaker_id) {
                    return false;
                }
                self.paused.apply(*speaker_id, *paused, origin);
                audio.set_paused(*speaker_id, *paused);
                true
            }
            StateChange::SpeakerVolume { speaker_id, volume } => {
                if !self.require_speaker(*speaker_id) {
                    return false;
                }
                self.volume.apply(*speaker_id, clamp_volume(*volume), origin);
                audio.set_gain(*speaker_id, self.gain_for(*speaker_id));
                true
            }
            StateChange::PlaybackStarted {
                speaker_id,
                track,
                server_time,
            } => {
                // Speakers may still be loading; the scheduler waits for them
                let record = PlaybackRecord {
                    track: track.clone(),
                    server_time: *server_time,
                };
                if self.playback.apply(*speaker_id, record, origin) {
                    self.scheduler.schedule(*speaker_id, track, *server_time, now);
                }
                true
            }
            StateChange::WorldClock {
                phase,
                server_time,
                day_length_ms,
            } => {
                if *day_length_ms <= 0 {
                    debug!(day_length_ms = *day_length_ms, "Ignoring world clock with invalid day length");
                    return false;
                }
                let clock = WorldClock::new(*phase, *server_time, *day_length_ms);
                self.world_clock.apply((), clock, origin);
                true
            }
            StateChange::SeatOccupied { seat_id, occupant } => {
                if !self.known_seats.contains(*seat_id) {
                    debug!(seat = %seat_id, "Ignoring change for unknown seat");
                    return false;
                }
                self.seats.apply(*seat_id, *occupant, origin);
                true
            }
        }
    }

    /// Apply an explicit local action and return the normalized change to publish
    pub fn apply_local<A: AudioBackend + ?Sized>(
        &mut self,
        change: StateChange,
        audio: &mut A,
        now: i64,
    ) -> StateChange {
        let change = normalize_change(change);
        self.apply(&change, Origin::Local, audio, now);
        change
    }

    /// Apply a change mirrored from the relay
    pub fn apply_remote<A: AudioBackend + ?Sized>(
        &mut self,
        change: &StateChange,
        audio: &mut A,
        now: i64,
    ) -> bool {
        self.apply(change, Origin::Remote, audio, now)
    }

    /// Run deferred playback starts. Speakers paused before their media
    /// loaded stay paused once started.
    pub fn tick_playback<A: AudioBackend + ?Sized>(&mut self, now: i64, audio: &mut A) {
        for speaker in self.scheduler.poll(now, audio) {
            if self.is_paused(speaker) {
                audio.set_paused(speaker, true);
            }
            audio.set_gain(speaker, self.gain_for(speaker));
        }
    }

    /// Recompute every speaker's gain for a new listener position
    pub fn update_gains<A: AudioBackend + ?Sized>(&mut self, listener: Vec3, audio: &mut A) {
        self.listener = listener;
        for id in self.speakers.ids() {
            audio.set_gain(id, self.gain_for(id));
        }
    }

    pub fn set_master_volume(&mut self, master: f32) {
        self.master_volume = if master.is_finite() { master.max(0.0) } else { 0.0 };
    }

    pub fn gain_for(&self, speaker: EntityId) -> f32 {
        let Some(position) = self.speakers.find(speaker) else {
            return 0.0;
        };
        effective_gain(
            self.volume(speaker).unwrap_or(DEFAULT_VOLUME),
            self.listener.distance(position),
            self.falloff_distance,
            self.master_volume,
        )
    }

    pub fn knows_speaker(&self, id: EntityId) -> bool {
        self.speakers.contains(id)
    }

    fn require_speaker(&self, id: EntityId) -> bool {
        let known = self.speakers.contains(id);
        if !known {
            debug!(speaker = %id, "Ignoring change for unknown speaker");
        }
        known
    }

    pub fn is_paused(&self, speaker: EntityId) -> bool {
        self.paused.get(&speaker).copied().unwrap_or(false)
    }

    pub fn volume(&self, speaker: EntityId) -> Option<f32> {
        self.volume.get(&speaker).copied()
    }

    pub fn playback(&self, speaker: EntityId) -> Option<&PlaybackRecord> {
        self.playback.get(&speaker)
    }

    pub fn world_clock(&self) -> Option<WorldClock> {
        self.world_clock.get(&()).copied()
    }

    pub fn world_phase(&self, now: i64) -> Option<f64> {
        self.world_clock().map(|c| c.current_phase(now))
    }

    pub fn seat_occupant(&self, seat: EntityId) -> Option<ConnectionId> {
        self.seats.get(&seat).copied().flatten()
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Where the value behind `key` was last applied from
    pub fn origin(&self, key: StateKey) -> Option<Origin> {
        match key {
            StateKey::SpeakerPaused(id) => self.paused.entry(&id).map(|v| v.origin),
            StateKey::SpeakerVolume(id) => self.volume.entry(&id).map(|v| v.origin),
            StateKey::SpeakerPlayback(id) => self.playback.entry(&id).map(|v| v.origin),
            StateKey::WorldClock => self.world_clock.entry(&()).map(|v| v.origin),
            StateKey::Seat(id) => self.seats.entry(&id).map(|v| v.origin),
        }
    }
}

/// Canonical form of a change: what is stored is what travels
/// Local-only normalization: volume clamp and world clock phase wrap
pub fn normalize_change(change: StateChange) -> StateChange {
    match change {
        StateChange::SpeakerVolume { speaker_id, volume } => StateChange::SpeakerVolume {
            speaker_id,
            volume: clamp_volume(volume),
        },
        StateChange::WorldClock {
            phase,
            server_time,
            day_length_ms,
        } => WorldClock::new(phase, server_time, day_length_ms).to_change(),
        other => other,
    }
}
