//! Texture factory session
//!
//! Wraps a started `TextureFactory` and tracks the textures it issued, so the factory is never
//! shut down while one of them is still live.

use std::sync::Arc;

use spout_sender_core::host::{SharedTexture, TextureDesc, TextureFactory, TextureId};
use spout_sender_core::SenderError;

use crate::{logi, logw};

/// The bridge only ever needs one shared texture.
pub const MAX_LIVE_TEXTURES: usize = 1;

pub struct TextureRegistry {
    factory: Box<dyn TextureFactory>,
    live: Vec<Arc<dyn SharedTexture>>,
}

impl TextureRegistry {
    /// Start `factory`. On failure the factory is dropped without `shutdown`.
    pub fn start(mut factory: Box<dyn TextureFactory>) -> Result<Self, SenderError> {
        factory.startup()?;
        logi!("TEXTURE", "texture factory started");
        Ok(Self {
            factory,
            live: Vec::new(),
        })
    }

    pub fn create(&mut self, desc: &TextureDesc) -> Result<Arc<dyn SharedTexture>, SenderError> {
        if self.live.len() >= MAX_LIVE_TEXTURES {
            return Err(SenderError::TextureLimit {
                live: self.live.len(),
            });
        }
        let texture = self.factory.create_texture(desc)?;
        logi!(
            "TEXTURE",
            "created '{}' {}x{} context='{}' viewpoint='{}' engine='{}'",
            desc.name,
            desc.width,
            desc.height,
            desc.context_name,
            desc.viewpoint_path,
            desc.engine_id
        );
        self.live.push(texture.clone());
        Ok(texture)
    }

    /// Hand `texture` back to the factory. Unknown textures are ignored.
    pub fn release(&mut self, texture: Arc<dyn SharedTexture>) {
        let id = texture.id();
        let Some(pos) = self.live.iter().position(|t| t.id() == id) else {
            logw!("TEXTURE", "release of unknown texture {:?} ignored", id);
            return;
        };
        let tracked = self.live.swap_remove(pos);
        // Give the factory the last reference we hold.
        drop(texture);
        self.factory.release_texture(tracked);
        logi!("TEXTURE", "released texture {:?}", id);
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: TextureId) -> bool {
        self.live.iter().any(|t| t.id() == id)
    }

    /// Release anything still live, then shut the factory down.
    pub fn stop(mut self) {
        if !self.live.is_empty() {
            logw!(
                "TEXTURE",
                "{} texture(s) still live at factory stop; releasing first",
                self.live.len()
            );
        }
        for texture in std::mem::take(&mut self.live) {
            self.factory.release_texture(texture);
        }
        self.factory.shutdown();
        logi!("TEXTURE", "texture factory stopped");
    }
}
