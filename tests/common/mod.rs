// Shared harness: several sessions on one in-process relay and one clock

#![allow(dead_code)]

use roomsync::clock::ManualClock;
use roomsync::config::RoomConfig;
use roomsync::session::Session;
use roomsync::shared_state::HeadlessAudio;
use roomsync::transport::{LocalRelay, LocalTransport};

pub const FRAME_MS: i64 = 16;

pub type TestSession = Session<LocalTransport, HeadlessAudio, ManualClock>;

pub struct Room {
    pub relay: LocalRelay,
    pub clock: ManualClock,
    pub config: RoomConfig,
    pub sessions: Vec<TestSession>,
    next_seed: u64,
}

impl Room {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            relay: LocalRelay::new(&config.relay),
            clock: ManualClock::new(1_700_000_000_000),
            config,
            sessions: Vec::new(),
            next_seed: 1,
        }
    }

    /// Connect a new instance, request its role and return its index
    pub fn join(&mut self) -> usize {
        let mut session = Session::new(
            &self.config,
            self.relay.connect(),
            HeadlessAudio::new(),
            self.clock.clone(),
            self.next_seed,
        );
        self.next_seed += 1;
        session.start();
        session.set_assets_ready();
        self.sessions.push(session);
        self.sessions.len() - 1
    }

    /// Drop an instance without a goodbye
    pub fn crash(&mut self, index: usize) -> TestSession {
        let mut session = self.sessions.remove(index);
        session.transport_mut().disconnect();
        session
    }

    /// Advance the shared clock one frame and tick every instance
    pub fn step(&mut self) {
        self.clock.advance(FRAME_MS);
        for session in &mut self.sessions {
            session.tick();
        }
    }

    pub fn run_for(&mut self, ms: i64) {
        let frames = ms / FRAME_MS;
        for _ in 0..frames {
            self.step();
        }
    }

    pub fn now(&self) -> i64 {
        use roomsync::clock::Clock;
        self.clock.now_ms()
    }

    pub fn authoritative_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.role().is_authoritative())
            .count()
    }
}
