//! Node bootstrap for the genpool coordinator.
//!
//! Drives a fresh host through software install, genesis fetch, identity
//! derivation, enrollment, and node start. Every step is resumable: the
//! artifacts it leaves on disk double as the progress record.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod runner;
pub mod state;

pub use config::BootstrapConfig;
pub use error::{BootstrapError, EXIT_SOFTWARE, EXIT_TEMPFAIL};
pub use runner::NodeBootstrapper;
pub use state::{BootstrapPaths, BootstrapState};
