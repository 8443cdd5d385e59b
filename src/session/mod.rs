// One instance of the room: election, reconciliation, simulation and
// mirrored state advanced together once per tick

mod driver;


pub use driver::run_session;

use crate::authority::{AuthorityElector, AuthorityRole};
use crate::clock::Clock;
use crate::config::{LayoutConfig, RoomConfig};
use crate::entity::{ConnectionId, EntityId, GroupId, Pose, Vec3};
use crate::protocol::{
    validate_change, ClientMessage, ServerMessage, StateChange, MAX_SNAPSHOTS_PER_BATCH,
};
use crate::reconcile::{EntityFrame, EntityReconciler};
use crate::shared_state::{normalize_change, AudioBackend, SessionState, WorldClock};
use crate::simulation::{LocalSimulator, Obstacle};
use crate::transport::{InboundQueue, Transport};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub role: AuthorityRole,
    /// Inbound messages handled this tick
    pub handled: usize,
    /// Snapshot batches sent this tick
    pub published: usize,
    pub frames: Vec<EntityFrame>,
}

pub struct Session<T: Transport, A: AudioBackend, C: Clock> {
    transport: T,
    audio: A,
    clock: C,
    connection_id: Option<ConnectionId>,
    inbound: InboundQueue,
    elector: AuthorityElector,
    reconciler: EntityReconciler,
    simulator: LocalSimulator,
    state: SessionState,
    layout: LayoutConfig,
    day_length_ms: i64,
    clock_sync_interval: Duration,
    since_clock_sync: Duration,
    last_tick: Option<i64>,
    layout_spawned: bool,
}

impl<T: Transport, A: AudioBackend, C: Clock> Session<T, A, C> {
    /// Build a session for the pet group. `seed` drives the wander AI.
    pub fn new(config: &RoomConfig, transport: T, audio: A, clock: C, seed: u64) -> Self {
        let obstacles: Vec<Obstacle> = config.layout.obstacles.iter().map(Obstacle::from).collect();

        let mut state = SessionState::new(&config.playback);
        for speaker in &config.layout.speakers {
            state.register_speaker(speaker.id, speaker.position());
        }
        for seat in &config.layout.seats {
            state.register_seat(seat.id);
        }

        Self {
            transport,
            audio,
            clock,
            connection_id: None,
            inbound: InboundQueue::new(),
            elector: AuthorityElector::new(GroupId::pets(), &config.authority),
            reconciler: EntityReconciler::new(&config.reconcile),
            simulator: LocalSimulator::new(&config.wander, obstacles, seed),
            state,
            layout: config.layout.clone(),
            day_length_ms: config.world_clock.day_length_ms,
            clock_sync_interval: Duration::from_millis(config.world_clock.sync_interval_ms),
            since_clock_sync: Duration::ZERO,
            last_tick: None,
            layout_spawned: false,
        }
    }

    /// Ask the relay for the pet group's authority role
    pub fn start(&mut self) {
        let request = self.elector.begin();
        if let Err(e) = self.transport.send(request) {
            warn!(error = %e, "Failed to send role request");
            self.elector.on_request_failed();
        }
    }

    /// One cooperative step
    pub fn tick(&mut self) -> FrameReport {
        let now = self.clock.now_ms();
        let dt = match self.last_tick {
            Some(last) => Duration::from_millis((now - last).max(0) as u64),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);

        self.inbound.fill_from(&mut self.transport);
        let messages: Vec<ServerMessage> = self.inbound.drain().collect();
        let handled = messages.len();
        for msg in messages {
            self.handle(msg, now);
        }

        let known = if self.elector.is_authoritative() {
            self.simulator.len()
        } else {
            self.reconciler.known_count()
        };
        let election = self.elector.tick(dt, known);
        if election.promoted {
            self.become_authoritative(false);
        }

        let frames = if self.elector.is_authoritative() {
            self.simulator.tick(dt)
        } else {
            self.reconciler.tick()
        };

        let published = if election.publish_due {
            self.publish_snapshots(now)
        } else {
            0
        };

        self.state.tick_playback(now, &mut self.audio);
        if self.elector.is_authoritative() {
            self.sync_world_clock(dt, now);
        }

        FrameReport {
            role: self.elector.role(),
            handled,
            published,
            frames,
        }
    }

    fn handle(&mut self, msg: ServerMessage, now: i64) {
        match msg {
            ServerMessage::Welcome { connection_id } => {
                debug!(connection_id = %connection_id, "Joined relay");
                self.connection_id = Some(connection_id);
            }
            ServerMessage::AuthorityRoleGranted {
                group,
                is_authoritative,
            } => {
                if &group != self.elector.group() {
                    return;
                }
                let transition = self.elector.on_role_granted(is_authoritative);
                if transition.changed && transition.role.is_authoritative() {
                    self.become_authoritative(true);
                }
            }
            ServerMessage::EntitySnapshotBatch {
                group, snapshots, ..
            } => {
                if &group != self.elector.group() {
                    return;
                }
                if self.elector.on_snapshot_batch() {
                    for id in self.reconciler.apply_batch(&snapshots) {
                        debug!(pet = %id, "Pet appeared");
                    }
                }
            }
            ServerMessage::StateChangeApplied { change, .. } => {
                self.state.apply_remote(&change, &mut self.audio, now);
            }
            ServerMessage::Error { error } => {
                warn!(error = %error, "Relay rejected a message");
            }
        }
    }

    /// Drive the pets from here on. Pets seen as an observer carry over at
    /// their last visual pose; the configured layout is spawned only by a
    /// relay-granted host that has nothing to continue from.
    fn become_authoritative(&mut self, granted: bool) {
        let handed = self.reconciler.drain_poses();
        let carried = handed.len();
        self.simulator.adopt(handed);

        if granted && self.simulator.is_empty() && !self.layout_spawned {
            for pet in &self.layout.pets {
                self.simulator
                    .spawn(pet.id.unwrap_or_else(EntityId::new), pet.position());
            }
            self.layout_spawned = true;
        }

        // Publish the world clock on the first authoritative tick
        self.since_clock_sync = self.clock_sync_interval;

        info!(
            group = %self.elector.group(),
            granted = granted,
            carried_over = carried,
            pets = self.simulator.len(),
            "Now simulating pets"
        );
    }

    fn publish_snapshots(&mut self, now: i64) -> usize {
        let snapshots = self.simulator.snapshots();
        let mut sent = 0;
        for chunk in snapshots.chunks(MAX_SNAPSHOTS_PER_BATCH) {
            let batch = ClientMessage::EntitySnapshotBatch {
                group: self.elector.group().clone(),
                timestamp: now,
                snapshots: chunk.to_vec(),
            };
            match self.transport.send(batch) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(error = %e, "Failed to publish snapshot batch");
                    break;
                }
            }
        }
        sent
    }

    fn sync_world_clock(&mut self, dt: Duration, now: i64) {
        self.since_clock_sync += dt;
        if self.since_clock_sync < self.clock_sync_interval {
            return;
        }
        self.since_clock_sync = Duration::ZERO;

        let clock = match self.state.world_clock() {
            Some(clock) => clock.rebased(now),
            None => WorldClock::new(0.0, now, self.day_length_ms),
        };
        self.publish(clock.to_change(), now);
    }

    /// Local path: apply, then announce to every instance including this one.
    /// Changes the relay would reject are dropped before touching local state.
    fn publish(&mut self, change: StateChange, now: i64) -> bool {
        let change = normalize_change(change);
        if let Err(e) = validate_change(&change) {
            warn!(key = ?change.key(), error = %e, "Refusing invalid local change");
            return false;
        }

        let change = self.state.apply_local(change, &mut self.audio, now);
        if let Err(e) = self.transport.send(ClientMessage::StateChangeRequest { change }) {
            warn!(error = %e, "Failed to publish state change");
        }
        true
    }

    pub fn set_paused(&mut self, speaker: EntityId, paused: bool) {
        let now = self.clock.now_ms();
        self.publish(
            StateChange::SpeakerPaused {
                speaker_id: speaker,
                paused,
            },
            now,
        );
    }

    pub fn set_volume(&mut self, speaker: EntityId, volume: f32) {
        let now = self.clock.now_ms();
        self.publish(
            StateChange::SpeakerVolume {
                speaker_id: speaker,
                volume,
            },
            now,
        );
    }

    /// Start `track` on `speaker` for everyone, anchored at the local clock.
    /// Returns false if the start was refused (empty track).
    pub fn start_playback(&mut self, speaker: EntityId, track: impl Into<String>) -> bool {
        let now = self.clock.now_ms();
        self.publish(
            StateChange::PlaybackStarted {
                speaker_id: speaker,
                track: track.into(),
                server_time: now,
            },
            now,
        )
    }

    /// Jump the day-night cycle to `phase`
    pub fn set_world_time(&mut self, phase: f64) {
        let now = self.clock.now_ms();
        let day_length_ms = self
            .state
            .world_clock()
            .map(|c| c.day_length_ms)
            .unwrap_or(self.day_length_ms);
        self.publish(WorldClock::new(phase, now, day_length_ms).to_change(), now);
    }

    /// Occupy a seat. Needs the relay-assigned connection id.
    pub fn sit(&mut self, seat: EntityId) -> bool {
        let Some(occupant) = self.connection_id else {
            warn!(seat = %seat, "Cannot sit before joining the relay");
            return false;
        };
        let now = self.clock.now_ms();
        self.publish(
            StateChange::SeatOccupied {
                seat_id: seat,
                occupant: Some(occupant),
            },
            now,
        )
    }

    pub fn stand(&mut self, seat: EntityId) {
        let now = self.clock.now_ms();
        self.publish(
            StateChange::SeatOccupied {
                seat_id: seat,
                occupant: None,
            },
            now,
        );
    }

    /// Pet models finished loading
    pub fn set_assets_ready(&mut self) {
        self.reconciler.set_ready();
    }

    /// Listener moved; recompute spatial gains
    pub fn update_listener(&mut self, position: Vec3) {
        self.state.update_gains(position, &mut self.audio);
    }

    pub fn set_master_volume(&mut self, master: f32) {
        self.state.set_master_volume(master);
    }

    /// Pose of a pet as this instance renders it
    pub fn pet_pose(&self, id: EntityId) -> Option<Pose> {
        if self.elector.is_authoritative() {
            self.simulator.pose(id)
        } else {
            self.reconciler.pose(id)
        }
    }

    pub fn role(&self) -> AuthorityRole {
        self.elector.role()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn elector(&self) -> &AuthorityElector {
        &self.elector
    }

    pub fn reconciler(&self) -> &EntityReconciler {
        &self.reconciler
    }

    pub fn simulator(&self) -> &LocalSimulator {
        &self.simulator
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
