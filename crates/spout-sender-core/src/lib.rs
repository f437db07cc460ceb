//! Host-facing types for the Spout sender bridge.
//!
//! This crate owns everything that is not the plugin itself: the collaborator contracts the host
//! implements, the typed frame-event boundary, configuration, errors and diagnostic events. It
//! has no GPU or platform code so simulators and tests can depend on it freely.

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod host;

pub use config::{ConfigMode, ExportConfig, PixelFormat};
pub use error::SenderError;
pub use events::{Diagnostics, DropReason, ExportEvent, ExportStats};
