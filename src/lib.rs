//! Client session and game-state sync for the Call card game.
//!
//! A player registers with the game authority, keeps the registration alive
//! with heartbeats, mirrors the pushed game state and turns local intents
//! into authority mutations. [`orchestrator::ClientOrchestrator`] ties the
//! pieces together.

pub mod admin;
pub mod authority;
pub mod backoff;
pub mod catalog;
pub mod config;
pub mod consensus;
pub mod console;
pub mod dispatch;
pub mod http;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod subscriber;

#[cfg(test)]
mod test_helpers;
