//! Genpool coordinator server library.
//!
//! Provides configuration, HTTP routing for the genesis distribution and
//! enrollment surfaces, the enrollment coordinator, and shutdown handling.

#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod routes;
pub mod shutdown;
