//! Frame extraction & dispatch
//!
//! Runs synchronously on the renderer's thread for every drawable-changed event:
//!   1) decode the typed result token from the event
//!   2) ask the shared texture for the configured AOV (exactly one match)
//!   3) forward its GPU resource to the sender channel
//!
//! Every step that finds nothing drops the frame silently. Nothing is kept between calls
//! except the counters, which belong to the controller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use spout_sender_core::host::{
    FrameEventError, FrameListener, FrameResultToken, HostEvent, SharedTexture,
};
use spout_sender_core::{ExportConfig, ExportStats, PixelFormat};

use crate::channel::{PublishOutcome, SenderChannel};

/// Counters shared by the controller and the frame path.
#[derive(Debug, Default)]
pub struct FrameCounters {
    ignored: AtomicU64,
    empty: AtomicU64,
}

impl FrameCounters {
    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn empty(&self) -> u64 {
        self.empty.load(Ordering::Relaxed)
    }

    /// Fill the frame-path fields of `stats`.
    pub fn fill(&self, stats: &mut ExportStats) {
        stats.ignored = self.ignored();
        stats.empty = self.empty();
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not a well-formed drawable-changed event.
    Ignored(FrameEventError),
    /// The renderer produced no matching AOV this frame.
    NoAov,
    /// The AOV matched but carried no GPU resource.
    NoResource,
    /// The exporter was detached during shutdown.
    Detached,
    Forwarded(PublishOutcome),
}

pub struct FrameExporter {
    texture: RwLock<Option<Arc<dyn SharedTexture>>>,
    channel: Arc<SenderChannel>,
    counters: Arc<FrameCounters>,
    aov_name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl FrameExporter {
    pub fn new(
        texture: Arc<dyn SharedTexture>,
        channel: Arc<SenderChannel>,
        counters: Arc<FrameCounters>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            texture: RwLock::new(Some(texture)),
            channel,
            counters,
            aov_name: config.aov_name.clone(),
            width: config.width,
            height: config.height,
            format: config.pixel_format,
        }
    }

    pub fn export(&self, event: &HostEvent) -> FrameOutcome {
        let token = match FrameResultToken::from_event(event) {
            Ok(t) => t,
            Err(e) => {
                self.counters.ignored.fetch_add(1, Ordering::Relaxed);
                return FrameOutcome::Ignored(e);
            }
        };

        // Contention here only happens while detach() runs at shutdown.
        let Ok(guard) = self.texture.try_read() else {
            return FrameOutcome::Detached;
        };
        let Some(texture) = guard.as_ref() else {
            return FrameOutcome::Detached;
        };

        let aov = texture
            .query_aovs(&token, &self.aov_name, 1)
            .into_iter()
            .next();
        let Some(aov) = aov else {
            self.counters.empty.fetch_add(1, Ordering::Relaxed);
            return FrameOutcome::NoAov;
        };
        let Some(resource) = aov.resource else {
            self.counters.empty.fetch_add(1, Ordering::Relaxed);
            return FrameOutcome::NoResource;
        };

        FrameOutcome::Forwarded(
            self.channel
                .publish(resource, self.width, self.height, self.format),
        )
    }

    /// Drop the texture back-reference; later events become no-ops. Returns what was held.
    pub fn detach(&self) -> Option<Arc<dyn SharedTexture>> {
        match self.texture.write() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl FrameListener for FrameExporter {
    fn on_frame_event(&self, event: &HostEvent) {
        // Runs on the renderer's thread; a panicking collaborator costs this frame only.
        if catch_unwind(AssertUnwindSafe(|| self.export(event))).is_err() {
            self.channel.frame_panicked("shared texture");
        }
    }
}
