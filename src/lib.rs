//! Deepfake awareness backend
//!
//! Tracks face-swap and voice-clone jobs on third-party providers and relays
//! the generated media to the browser through a same-origin gateway.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
