// Host election with fallback takeover

mod elector;

pub use elector::{AuthorityElector, ElectorTick};

use serde::Serialize;

/// This instance's role for one autonomous-entity group.
///
/// `Authoritative` is terminal for the process lifetime: there is no
/// renegotiation after a fallback promotion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AuthorityRole {
    Unassigned,
    Observer,
    Authoritative,
}

impl AuthorityRole {
    pub fn is_authoritative(&self) -> bool {
        matches!(self, AuthorityRole::Authoritative)
    }
}

/// Inputs that can move the role state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleInput {
    /// Coordinator answered the role request
    Granted { is_authoritative: bool },
    /// Role request could not be sent or timed out
    RequestFailed,
    /// No snapshot batch for longer than the liveness threshold
    LivenessExpired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleTransition {
    pub role: AuthorityRole,
    pub changed: bool,
}

/// Pure role transition function
pub fn next_role(current: AuthorityRole, input: RoleInput) -> RoleTransition {
    let role = match (current, input) {
        (AuthorityRole::Authoritative, _) => AuthorityRole::Authoritative,
        (_, RoleInput::Granted { is_authoritative: true }) => AuthorityRole::Authoritative,
        (_, RoleInput::LivenessExpired) => AuthorityRole::Authoritative,
        (AuthorityRole::Unassigned, RoleInput::Granted { is_authoritative: false }) => {
            AuthorityRole::Observer
        }
        (AuthorityRole::Unassigned, RoleInput::RequestFailed) => AuthorityRole::Observer,
        (AuthorityRole::Observer, _) => AuthorityRole::Observer,
    };

    RoleTransition {
        role,
        changed: role != current,
    }
}
