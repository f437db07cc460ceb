//! Synthetic host collaborators
//!
//! A stand-in renderer that "renders" by handing out fake GPU handles, so the whole bridge can
//! run end to end without a GPU or the real host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use spout_sender::output::TextureSender;
use spout_sender_core::host::{
    AovDescriptor, FrameResultToken, GpuResource, SharedTexture, Stage, TextureDesc,
    TextureFactory, TextureId,
};
use spout_sender_core::{PixelFormat, SenderError};

/// Base of the fake resource handles; the frame's result handle is added to it.
const FAKE_RESOURCE_BASE: u64 = 0x1000_0000;

pub struct SimTexture {
    id: TextureId,
    desc: TextureDesc,
    skip_every: u64,
}

impl SharedTexture for SimTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn query_aovs(
        &self,
        token: &FrameResultToken<'_>,
        name: &str,
        max_matches: usize,
    ) -> Vec<AovDescriptor> {
        // The sim renderer only computes LDR color, and not on every skip_every-th frame.
        if name != "LdrColor" || max_matches == 0 {
            return Vec::new();
        }
        if self.skip_every > 0 && token.raw() % self.skip_every == 0 {
            return Vec::new();
        }
        vec![AovDescriptor {
            name: name.to_string(),
            resource: GpuResource::from_raw(FAKE_RESOURCE_BASE + token.raw()),
        }]
    }
}

pub struct SimFactory {
    next: u64,
    skip_every: u64,
    started: bool,
}

impl SimFactory {
    pub fn new(skip_every: u64) -> Self {
        Self {
            next: 0,
            skip_every,
            started: false,
        }
    }
}

impl TextureFactory for SimFactory {
    fn startup(&mut self) -> Result<(), SenderError> {
        self.started = true;
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
    ) -> Result<Arc<dyn SharedTexture>, SenderError> {
        if !self.started {
            return Err(SenderError::TextureCreate {
                name: desc.name.clone(),
                msg: "factory not started".into(),
            });
        }
        self.next += 1;
        Ok(Arc::new(SimTexture {
            id: TextureId(self.next),
            desc: desc.clone(),
            skip_every: self.skip_every,
        }))
    }

    fn release_texture(&mut self, _texture: Arc<dyn SharedTexture>) {}

    fn shutdown(&mut self) {
        self.started = false;
    }
}

#[derive(Default)]
pub struct SimStage {
    attached: std::sync::atomic::AtomicBool,
}

impl Stage for SimStage {
    fn active_context_name(&self) -> Option<String> {
        Some(String::new())
    }

    fn is_engine_attached(&self, _engine_id: &str) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    fn attach_engine(&self, _engine_id: &str) -> Result<(), SenderError> {
        self.attached.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Backend that accepts every frame and counts it.
#[derive(Clone, Default)]
pub struct RecordingSender {
    pub frames: Arc<AtomicU64>,
}

impl TextureSender for RecordingSender {
    fn backend_name(&self) -> &'static str {
        "sim"
    }

    fn open(&mut self, _: &str, _: u32, _: u32, _: PixelFormat) -> anyhow::Result<()> {
        Ok(())
    }

    fn publish(
        &mut self,
        _resource: GpuResource,
        _width: u32,
        _height: u32,
        _format: PixelFormat,
    ) -> anyhow::Result<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) {}
}
