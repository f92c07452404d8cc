//! Control commands delivered by the remote controller.

pub mod active_sessions;

pub use active_sessions::ActiveSessionsCommand;
