//! Output backends
//!
//! A backend is the thin shim between "GPU texture + dimensions" and a concrete texture-sharing
//! SDK. `SenderChannel` owns exactly one and never lets its errors escape.
//!
//! - **SpoutDX**: Windows shared-handle texture sharing (needs the Spout SDK at build time)
//!
pub mod spout;

use spout_sender_core::host::GpuResource;
use spout_sender_core::PixelFormat;

pub trait TextureSender: Send {
    fn backend_name(&self) -> &'static str;

    /// Register the named channel receivers discover us by.
    fn open(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> anyhow::Result<()>;

    /// Share one frame. Must not wait on receivers.
    fn publish(
        &mut self,
        resource: GpuResource,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> anyhow::Result<()>;

    /// Release everything `open` acquired. Called at most once per successful `open`.
    fn close(&mut self);
}

/// The backend this build shares frames through.
pub fn platform_sender() -> Box<dyn TextureSender> {
    Box::new(spout::SpoutDxSender::default())
}
