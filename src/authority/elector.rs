use super::{next_role, AuthorityRole, RoleInput, RoleTransition};
use crate::config::AuthorityConfig;
use crate::entity::GroupId;
use crate::protocol::ClientMessage;
use std::time::Duration;
use tracing::{info, warn};

/// What the caller should do after a tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElectorTick {
    /// Publish a snapshot batch for every locally simulated entity
    pub publish_due: bool,
    /// This tick promoted the instance through fallback takeover
    pub promoted: bool,
}

/// Decides whether this instance drives a group's simulation.
///
/// Timer state is advanced only through `tick(dt)`, so the elector has no
/// wall-clock or transport dependency of its own. Callers send the message
/// returned by `begin` and feed back grants, failures and snapshot arrivals.
#[derive(Debug)]
pub struct AuthorityElector {
    group: GroupId,
    role: AuthorityRole,
    liveness_threshold: Duration,
    publish_interval: Duration,
    request_timeout: Duration,
    /// Time since the last snapshot batch; `None` when not watching
    silence: Option<Duration>,
    /// Time since the role request went out; `None` when no request is pending
    request_elapsed: Option<Duration>,
    since_publish: Duration,
}

impl AuthorityElector {
    pub fn new(group: GroupId, config: &AuthorityConfig) -> Self {
        Self {
            group,
            role: AuthorityRole::Unassigned,
            liveness_threshold: Duration::from_millis(config.liveness_threshold_ms),
            publish_interval: Duration::from_millis(config.publish_interval_ms.max(1)),
            request_timeout: Duration::from_millis(config.role_request_timeout_ms),
            silence: None,
            request_elapsed: None,
            since_publish: Duration::ZERO,
        }
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn role(&self) -> AuthorityRole {
        self.role
    }

    pub fn is_authoritative(&self) -> bool {
        self.role.is_authoritative()
    }

    /// Time since the last snapshot batch, while the liveness timer is armed
    pub fn silence(&self) -> Option<Duration> {
        self.silence
    }

    pub fn request_pending(&self) -> bool {
        self.request_elapsed.is_some()
    }

    /// Start the election: arms the liveness timer and returns the role request to send
    pub fn begin(&mut self) -> ClientMessage {
        if self.role != AuthorityRole::Authoritative {
            self.request_elapsed = Some(Duration::ZERO);
            self.silence.get_or_insert(Duration::ZERO);
        }
        ClientMessage::RequestAuthorityRole {
            group: self.group.clone(),
        }
    }

    pub fn on_role_granted(&mut self, is_authoritative: bool) -> RoleTransition {
        self.request_elapsed = None;
        self.apply(RoleInput::Granted { is_authoritative })
    }

    /// Role request could not be sent or was never answered
    pub fn on_request_failed(&mut self) -> RoleTransition {
        self.request_elapsed = None;
        let transition = self.apply(RoleInput::RequestFailed);
        if transition.changed {
            warn!(group = %self.group, "Role request failed, defaulting to observer");
        }
        transition
    }

    /// A snapshot batch arrived for this group. Returns false when this
    /// instance is authoritative and the batch should be ignored.
    pub fn on_snapshot_batch(&mut self) -> bool {
        if self.role.is_authoritative() {
            return false;
        }
        if self.silence.is_some() {
            self.silence = Some(Duration::ZERO);
        }
        true
    }

    /// Advance timers by `dt`. `known_entities` is how many group entities
    /// this instance currently knows about; takeover needs at least one.
    pub fn tick(&mut self, dt: Duration, known_entities: usize) -> ElectorTick {
        let mut out = ElectorTick::default();

        if let Some(elapsed) = self.request_elapsed.as_mut() {
            *elapsed += dt;
            if *elapsed >= self.request_timeout {
                warn!(group = %self.group, "Role request timed out");
                self.on_request_failed();
            }
        }

        match self.role {
            AuthorityRole::Authoritative => {
                self.since_publish += dt;
                if self.since_publish >= self.publish_interval {
                    out.publish_due = true;
                    let remainder = self.since_publish - self.publish_interval;
                    // Skip missed publishes instead of bursting
                    self.since_publish = if remainder >= self.publish_interval {
                        Duration::ZERO
                    } else {
                        remainder
                    };
                }
            }
            AuthorityRole::Unassigned | AuthorityRole::Observer => {
                if let Some(silence) = self.silence.as_mut() {
                    *silence += dt;
                    if *silence >= self.liveness_threshold && known_entities > 0 {
                        let silent_for = *silence;
                        let transition = self.apply(RoleInput::LivenessExpired);
                        if transition.changed {
                            warn!(
                                group = %self.group,
                                silent_ms = silent_for.as_millis() as u64,
                                known_entities = known_entities,
                                "Authority silent, taking over simulation"
                            );
                            out.promoted = true;
                            out.publish_due = true;
                        }
                    }
                }
            }
        }

        out
    }

    fn apply(&mut self, input: RoleInput) -> RoleTransition {
        let transition = next_role(self.role, input);
        if transition.changed {
            info!(
                group = %self.group,
                from = ?self.role,
                to = ?transition.role,
                "Authority role changed"
            );
            self.role = transition.role;
            if self.role.is_authoritative() {
                // Promoted instances never watch for themselves
                self.silence = None;
                self.request_elapsed = None;
                self.since_publish = Duration::ZERO;
            }
        }
        transition
    }
}
