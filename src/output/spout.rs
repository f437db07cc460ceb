use super::TextureSender;
use spout_sender_core::host::GpuResource;
use spout_sender_core::PixelFormat;

/// What `spout_dx_send_texture` reported for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(all(target_os = "windows", has_spout)), allow(dead_code))]
enum SendStatus {
  Sent,
  Rejected,
  /// D3D11 could not be opened on the renderer's device; the bridge will not try again.
  DeviceUnavailable,
}

#[cfg_attr(not(all(target_os = "windows", has_spout)), allow(dead_code))]
impl SendStatus {
  fn from_code(code: i32) -> Self {
    match code {
      1 => SendStatus::Sent,
      c if c < 0 => SendStatus::DeviceUnavailable,
      _ => SendStatus::Rejected,
    }
  }
}

#[cfg(all(target_os = "windows", has_spout))]
mod win {
  use std::ffi::{c_char, c_void, CString};

  use super::{GpuResource, PixelFormat, SendStatus, TextureSender};

  // native/spout_bridge.cpp (built by build.rs when SPOUT_SDK_DIR is set)
  #[link(name = "spout_bridge")]
  extern "C" {
    fn spout_dx_open_sender(
      sender_name: *const c_char,
      width: u32,
      height: u32,
      dxgi_format: u32,
    ) -> i32;
    fn spout_dx_send_texture(texture: *mut c_void, width: u32, height: u32) -> i32;
    fn spout_dx_release_sender();
  }

  #[derive(Default)]
  pub struct SpoutDxSender {
    name: Option<CString>,
    device_lost: bool,
  }

  impl TextureSender for SpoutDxSender {
    fn backend_name(&self) -> &'static str {
      "spoutdx"
    }

    fn open(
      &mut self,
      name: &str,
      width: u32,
      height: u32,
      format: PixelFormat,
    ) -> anyhow::Result<()> {
      let c = CString::new(name)?;
      let ok = unsafe { spout_dx_open_sender(c.as_ptr(), width, height, format.dxgi_format()) };
      anyhow::ensure!(ok == 1, "Spout open sender failed (no D3D11 device?)");
      self.name = Some(c);
      self.device_lost = false;
      Ok(())
    }

    /// `resource` must be an `ID3D11Texture2D*` owned by the renderer for this frame.
    fn publish(
      &mut self,
      resource: GpuResource,
      width: u32,
      height: u32,
      _format: PixelFormat,
    ) -> anyhow::Result<()> {
      anyhow::ensure!(self.name.is_some(), "Spout sender not open");
      anyhow::ensure!(!self.device_lost, "D3D11 unavailable on the renderer's device");
      let texture = resource.raw() as usize as *mut c_void;
      let code = unsafe { spout_dx_send_texture(texture, width, height) };
      match SendStatus::from_code(code) {
        SendStatus::Sent => Ok(()),
        SendStatus::Rejected => anyhow::bail!("Spout send texture failed"),
        SendStatus::DeviceUnavailable => {
          self.device_lost = true;
          anyhow::bail!("D3D11 unavailable on the renderer's device")
        }
      }
    }

    fn close(&mut self) {
      if self.name.take().is_some() {
        unsafe { spout_dx_release_sender() };
      }
    }
  }

  impl Drop for SpoutDxSender {
    fn drop(&mut self) {
      self.close();
    }
  }
}

#[cfg(all(target_os = "windows", has_spout))]
pub use win::SpoutDxSender;

/// Stand-in on builds without SpoutDX; `open` always fails so the channel stays inert.
#[cfg(not(all(target_os = "windows", has_spout)))]
#[derive(Debug, Default)]
pub struct SpoutDxSender;

#[cfg(not(all(target_os = "windows", has_spout)))]
impl TextureSender for SpoutDxSender {
  fn backend_name(&self) -> &'static str {
    "spoutdx"
  }

  fn open(&mut self, _: &str, _: u32, _: u32, _: PixelFormat) -> anyhow::Result<()> {
    if cfg!(target_os = "windows") {
      anyhow::bail!("built without the Spout SDK (set SPOUT_SDK_DIR and rebuild)");
    }
    anyhow::bail!("Spout is Windows-only");
  }

  fn publish(&mut self, _: GpuResource, _: u32, _: u32, _: PixelFormat) -> anyhow::Result<()> {
    anyhow::bail!("Spout sender not available");
  }

  fn close(&mut self) {}
}
