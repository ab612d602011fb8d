//! Member registration and invitations, built on a small service-object framework
//!
//! * [`operation`]: the framework every business operation is built on
//! * [`commands`]: the operations themselves and the invitation dispatcher
//! * [`ports`] / [`adapters`]: collaborators and their implementations

pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod operation;
pub mod ports;
pub mod request;
pub mod telemetry;
