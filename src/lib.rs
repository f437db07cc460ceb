//! # Spout sender bridge
//!
//! Shares every completed render of the host's scene with other processes through a named
//! Spout channel, handing over the renderer's GPU texture instead of reading pixels back.
//!
//! ## Mental model
//! - **Shared texture**: one render target created through the host's texture factory, bound
//!   to the active scene context and a fixed viewpoint. The renderer fills it every frame.
//! - **Frame event**: the host announces each completed render with a drawable-changed event.
//!   The bridge pulls the `LdrColor` AOV out of it and forwards the GPU resource.
//! - **Sender channel**: the named endpoint receivers discover (`"Omniverse"` by default).
//!
//! ## Threads
//! The bridge spawns none. The host delivers update ticks and frame events serially on threads
//! it owns; every callback returns without waiting on anything.
//!
//! ## Failure policy
//! Nothing escapes to the host. A missing collaborator leaves the plugin loaded but inert, a
//! frame that cannot be exported is dropped and counted.

pub mod channel;
pub mod controller;
pub mod dispatch;
pub mod heartbeat;
pub mod logging;
pub mod output;
pub mod texture;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use spout_sender_core::config::{load_export_config_from, ConfigMode};
use spout_sender_core::host::{Extension, HostServices};
use spout_sender_core::{Diagnostics, ExportConfig, ExportStats};

pub use controller::{LifecycleController, LifecycleState};

/// The plugin object the host loads.
pub struct SpoutSenderExtension {
    controller: LifecycleController,
}

impl SpoutSenderExtension {
    /// Default configuration and the platform's sender backend.
    pub fn new(host: HostServices) -> Self {
        Self::with_parts(
            host,
            output::platform_sender(),
            ExportConfig::default(),
            Diagnostics::disabled(),
        )
    }

    /// Like `new`, but picks up `spout_sender.json` from `SPOUT_SENDER_CONFIG` or by searching
    /// upward from `start_dir`. A broken file is logged and the defaults are used.
    pub fn from_environment(host: HostServices, start_dir: &Path) -> Self {
        logging::init(None);
        let config = match load_export_config_from(start_dir, ConfigMode::Lenient) {
            Ok((cfg, Some(path))) => {
                logi!("CONFIG", "loaded {}", path.display());
                cfg
            }
            Ok((cfg, None)) => cfg,
            Err(e) => {
                logw!("CONFIG", "{e}; using built-in defaults");
                ExportConfig::default()
            }
        };
        Self::with_parts(host, output::platform_sender(), config, Diagnostics::disabled())
    }

    pub fn with_parts(
        host: HostServices,
        sender: Box<dyn output::TextureSender>,
        config: ExportConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            controller: LifecycleController::new(host, sender, config, diagnostics),
        }
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn stats(&self) -> ExportStats {
        self.controller.stats()
    }
}

impl Extension for SpoutSenderExtension {
    fn on_startup(&mut self, ext_id: &str) {
        let controller = &mut self.controller;
        if catch_unwind(AssertUnwindSafe(|| controller.start(ext_id))).is_err() {
            loge!("INIT", "startup panicked; spout sender left inert");
        }
    }

    fn on_shutdown(&mut self) {
        let controller = &mut self.controller;
        if catch_unwind(AssertUnwindSafe(|| controller.stop())).is_err() {
            loge!("SHUTDOWN", "shutdown panicked");
        }
    }
}
