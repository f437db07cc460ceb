//! Sender channel
//!
//! Owns the named output channel and its backend. Opening is idempotent, publishing is
//! best-effort and never waits, closing is safe whether or not `open` ever succeeded.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, TryLockError};

use spout_sender_core::host::GpuResource;
use spout_sender_core::{Diagnostics, DropReason, ExportEvent, PixelFormat, SenderError};

use crate::output::TextureSender;
use crate::{logi, logw};

/// Result of one `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Dropped(DropReason),
}

struct Backend {
    sender: Box<dyn TextureSender>,
    name: Option<String>,
}

pub struct SenderChannel {
    backend: Mutex<Backend>,
    open: AtomicBool,
    published: AtomicU64,
    dropped: AtomicU64,
    warned: AtomicBool,
    diagnostics: Diagnostics,
}

impl SenderChannel {
    pub fn new(sender: Box<dyn TextureSender>, diagnostics: Diagnostics) -> Self {
        Self {
            backend: Mutex::new(Backend { sender, name: None }),
            open: AtomicBool::new(false),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            warned: AtomicBool::new(false),
            diagnostics,
        }
    }

    /// Register `name` with the sharing subsystem. Returns whether the channel is open.
    ///
    /// A failure is logged and leaves the channel inert; it is never an error for the caller.
    pub fn open(&self, name: &str, width: u32, height: u32, format: PixelFormat) -> bool {
        let mut b = match self.backend.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(current) = &b.name {
            if current != name {
                logw!("OUTPUT", "channel already open as '{current}', ignoring open('{name}')");
            }
            return true;
        }

        let backend = b.sender.backend_name();
        match b.sender.open(name, width, height, format) {
            Ok(()) => {
                b.name = Some(name.to_string());
                self.open.store(true, Ordering::Release);
                logi!(
                    "OUTPUT",
                    "channel '{name}' open via {backend} ({width}x{height} {})",
                    format.as_str()
                );
                self.diagnostics.emit(ExportEvent::ChannelOpened {
                    name: name.to_string(),
                    backend,
                });
                true
            }
            Err(e) => {
                let err = SenderError::ChannelOpen {
                    name: name.to_string(),
                    msg: format!("{e:#}"),
                };
                logw!("OUTPUT", "{err} (via {backend}); frames will not be shared");
                self.diagnostics.emit(ExportEvent::ChannelUnavailable {
                    name: name.to_string(),
                    error: err.to_string(),
                });
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Share one frame. Never blocks and never fails; anything that goes wrong is a dropped frame.
    pub fn publish(
        &self,
        resource: GpuResource,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> PublishOutcome {
        if !self.is_open() {
            return self.drop_frame(DropReason::ChannelClosed);
        }

        let mut b = match self.backend.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return self.drop_frame(DropReason::Busy),
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        // close() may have won the race between the flag check and the lock.
        if b.name.is_none() {
            return self.drop_frame(DropReason::ChannelClosed);
        }

        let sent = catch_unwind(AssertUnwindSafe(|| {
            b.sender.publish(resource, width, height, format)
        }));
        match sent {
            Ok(Ok(())) => {
                let frame = self.published.fetch_add(1, Ordering::Relaxed) + 1;
                self.diagnostics.emit(ExportEvent::FramePublished { frame });
                PublishOutcome::Published
            }
            Ok(Err(e)) => {
                self.warn_once(&format!("publish failed: {e:#}"));
                self.drop_frame(DropReason::Rejected)
            }
            Err(_) => self.frame_panicked(b.sender.backend_name()),
        }
    }

    /// Count a frame lost to a panic in `what`. Only the first failure of any kind is logged.
    pub fn frame_panicked(&self, what: &str) -> PublishOutcome {
        self.warn_once(&format!("{what} panicked while exporting a frame"));
        self.drop_frame(DropReason::Panicked)
    }

    fn warn_once(&self, msg: &str) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            logw!("OUTPUT", "{msg} (further failures are counted, not logged)");
        }
    }

    /// Release the channel. Safe to call repeatedly and when `open` never succeeded.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        let mut b = match self.backend.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(name) = b.name.take() {
            b.sender.close();
            logi!(
                "OUTPUT",
                "channel '{name}' closed (published={} dropped={})",
                self.published(),
                self.dropped()
            );
        }
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn drop_frame(&self, reason: DropReason) -> PublishOutcome {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.diagnostics.emit(ExportEvent::FrameDropped { reason });
        PublishOutcome::Dropped(reason)
    }
}

impl Drop for SenderChannel {
    fn drop(&mut self) {
        self.close();
    }
}
