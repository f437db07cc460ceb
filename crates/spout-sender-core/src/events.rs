use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Why a frame that reached the sender channel was not shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The channel never opened or was already closed.
    ChannelClosed,
    /// The backend was in use (shutdown in progress).
    Busy,
    /// The sharing subsystem refused the frame.
    Rejected,
    /// A collaborator panicked while the frame was being exported.
    Panicked,
}

/// Counter snapshot for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Update ticks observed.
    pub updates: u64,
    /// Frames handed to the sharing subsystem.
    pub published: u64,
    /// Frames that reached the channel but were not shared.
    pub dropped: u64,
    /// Events that were not well-formed drawable-changed events.
    pub ignored: u64,
    /// Frames without a usable AOV.
    pub empty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    /// Startup finished. `degraded` means no frames will be exported.
    Started { ext_id: String, degraded: bool },

    /// A collaborator was missing or failed; the bridge keeps running without it.
    Degraded { reason: String },

    ChannelOpened { name: String, backend: &'static str },

    ChannelUnavailable { name: String, error: String },

    TextureCreated { name: String, width: u32, height: u32 },

    Heartbeat { ticks: u64 },

    FramePublished { frame: u64 },

    FrameDropped { reason: DropReason },

    Stopped { stats: ExportStats },
}

/// Non-blocking sink for `ExportEvent`s.
///
/// Backed by a bounded channel; when nobody drains it the newest events are discarded rather
/// than stalling the caller.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    tx: Option<Sender<ExportEvent>>,
}

impl Diagnostics {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, Receiver<ExportEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Returns `false` when the event was discarded.
    pub fn emit(&self, event: ExportEvent) -> bool {
        match &self.tx {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
            },
            None => false,
        }
    }
}
