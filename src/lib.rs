//! X-ray session agent.
//!
//! Keeps a registry of active x-ray diagnostic sessions reconciled against
//! the list the remote controller considers active, drives the sampling
//! subsystem's subscriptions for them, and harvests what was collected.

pub mod commands;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod sampling;
pub mod session_management;
pub mod web_interface;

pub use session_management::SessionStatus;
