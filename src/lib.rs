// Time sources
pub mod clock;

// Configuration loading
pub mod config;

// Entity ids, poses and the owned registry
pub mod entity;

// Wire protocol and validation
pub mod protocol;

// Instance-side transport abstraction
pub mod transport;

// Relay hub, role coordinator and WebSocket endpoint
pub mod relay;

// Authority election
pub mod authority;

// Mirrored session state
pub mod shared_state;

// Observer-side interpolation
pub mod reconcile;

// Wander simulation
pub mod simulation;

// Per-instance tick loop
pub mod session;
