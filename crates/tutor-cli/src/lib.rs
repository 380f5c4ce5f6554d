//! Tutor CLI - command-line front end for the tutor core
//!
//! This crate provides command parsing, a session that runs commands against
//! the core library, and pluggable output notification.

pub mod commands;
pub mod notifier;
pub mod session;

// Re-export commonly used types for convenience
pub use commands::{build_cli, parse_command, GlobalOptions, TutorCommand};
pub use notifier::{DefaultNotifier, Notifier, RecordingNotifier};
pub use session::{ExitStatus, Session};
