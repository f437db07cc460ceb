//! Lifecycle controller
//!
//! Startup order:
//!   update tick → sender channel → texture factory → context/engine → shared texture →
//!   frame subscription
//!
//! Teardown runs in strict reverse order and tolerates any step never having been acquired:
//!   update tick → frame subscription → shared texture → texture factory → sender channel
//!
//! Unsubscribing before the texture is released is what keeps a late frame event from touching
//! a released texture.

use std::sync::Arc;

use spout_sender_core::host::{
    EventDispatcher, HostServices, SharedTexture, Stage, Subscription, TextureDesc,
    TextureFactory, DEFAULT_ORDER,
};
use spout_sender_core::{Diagnostics, ExportConfig, ExportEvent, ExportStats, SenderError};

use crate::channel::SenderChannel;
use crate::dispatch::{FrameCounters, FrameExporter};
use crate::heartbeat::Heartbeat;
use crate::output::TextureSender;
use crate::texture::TextureRegistry;
use crate::{logi, logw};

/// Subscription name the host sees for both of our observers.
pub const SUBSCRIPTION_NAME: &str = "Spout Sender Extension";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

pub struct LifecycleController {
    state: LifecycleState,
    config: ExportConfig,
    diagnostics: Diagnostics,

    // Collaborators handed over by the host; consumed by start().
    events: Option<Arc<dyn EventDispatcher>>,
    stage: Option<Arc<dyn Stage>>,
    pending_factory: Option<Box<dyn TextureFactory>>,

    heartbeat: Arc<Heartbeat>,
    counters: Arc<FrameCounters>,

    // Acquired resources, released in reverse order by stop().
    update_sub: Option<Subscription>,
    channel: Arc<SenderChannel>,
    registry: Option<TextureRegistry>,
    texture: Option<Arc<dyn SharedTexture>>,
    exporter: Option<Arc<FrameExporter>>,
    frame_sub: Option<Subscription>,

    degraded: Option<String>,
}

impl LifecycleController {
    pub fn new(
        host: HostServices,
        sender: Box<dyn TextureSender>,
        config: ExportConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        let heartbeat = Arc::new(Heartbeat::new(config.heartbeat_interval, diagnostics.clone()));
        let channel = Arc::new(SenderChannel::new(sender, diagnostics.clone()));
        Self {
            state: LifecycleState::Uninitialized,
            config,
            diagnostics,
            events: host.events,
            stage: host.stage,
            pending_factory: host.factory,
            heartbeat,
            counters: Arc::new(FrameCounters::default()),
            update_sub: None,
            channel,
            registry: None,
            texture: None,
            exporter: None,
            frame_sub: None,
            degraded: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Why frame export is disabled, if it is.
    pub fn degraded_reason(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn is_exporting(&self) -> bool {
        self.frame_sub.is_some()
    }

    pub fn shared_texture(&self) -> Option<&Arc<dyn SharedTexture>> {
        self.texture.as_ref()
    }

    pub fn stats(&self) -> ExportStats {
        let mut stats = ExportStats {
            updates: self.heartbeat.ticks(),
            ..ExportStats::default()
        };
        stats.published = self.channel.published();
        stats.dropped = self.channel.dropped();
        self.counters.fill(&mut stats);
        stats
    }

    /// Bring the bridge up. Never fails: a missing collaborator only disables frame export.
    pub fn start(&mut self, ext_id: &str) {
        if self.state != LifecycleState::Uninitialized {
            logw!("INIT", "start('{ext_id}') ignored in state {:?}", self.state);
            return;
        }
        self.state = LifecycleState::Starting;
        logi!("INIT", "spout sender starting (ext_id: {ext_id})");

        // A missing dispatcher is reported once, by start_texture_export().
        if let Some(events) = &self.events {
            self.update_sub = Some(events.observe_post_update(
                SUBSCRIPTION_NAME,
                DEFAULT_ORDER,
                self.heartbeat.clone(),
            ));
        }

        self.channel.open(
            &self.config.channel_name,
            self.config.width,
            self.config.height,
            self.config.pixel_format,
        );

        if let Err(e) = self.start_texture_export() {
            logw!("INIT", "{e}; frame export disabled");
            self.diagnostics.emit(ExportEvent::Degraded {
                reason: e.to_string(),
            });
            self.degraded = Some(e.to_string());
        }

        self.state = LifecycleState::Running;
        logi!(
            "INIT",
            "spout sender running (channel='{}' exporting={})",
            self.config.channel_name,
            self.is_exporting()
        );
        self.diagnostics.emit(ExportEvent::Started {
            ext_id: ext_id.to_string(),
            degraded: self.degraded.is_some(),
        });
    }

    fn start_texture_export(&mut self) -> Result<(), SenderError> {
        // Without frame events a texture would never be read, so don't create one.
        let events = self
            .events
            .clone()
            .ok_or(SenderError::DispatcherUnavailable)?;
        let factory = self
            .pending_factory
            .take()
            .ok_or(SenderError::FactoryUnavailable)?;
        let registry = self.registry.insert(TextureRegistry::start(factory)?);

        let stage = self.stage.as_ref().ok_or(SenderError::ContextUnavailable)?;
        let context_name = stage
            .active_context_name()
            .ok_or(SenderError::ContextUnavailable)?;
        let engine_id = &self.config.engine_id;
        if !stage.is_engine_attached(engine_id) {
            logi!("INIT", "attaching engine '{engine_id}' to context '{context_name}'");
            stage.attach_engine(engine_id)?;
        }

        let desc = TextureDesc {
            name: self.config.texture_name.clone(),
            width: self.config.width,
            height: self.config.height,
            context_name,
            viewpoint_path: self.config.viewpoint_path.clone(),
            engine_id: self.config.engine_id.clone(),
        };
        let texture = self.texture.insert(registry.create(&desc)?).clone();
        self.diagnostics.emit(ExportEvent::TextureCreated {
            name: desc.name.clone(),
            width: desc.width,
            height: desc.height,
        });

        let exporter = Arc::new(FrameExporter::new(
            texture.clone(),
            self.channel.clone(),
            self.counters.clone(),
            &self.config,
        ));
        self.frame_sub = Some(events.observe_drawable_changed(
            SUBSCRIPTION_NAME,
            DEFAULT_ORDER,
            texture.id(),
            exporter.clone(),
        ));
        self.exporter = Some(exporter);
        Ok(())
    }

    /// Tear everything down. Idempotent; safe after a partial start.
    pub fn stop(&mut self) {
        if self.state == LifecycleState::Stopped {
            return;
        }
        self.state = LifecycleState::ShuttingDown;
        logi!("SHUTDOWN", "spout sender shutting down");

        if let Some(sub) = self.update_sub.take() {
            sub.release();
        }
        if let Some(sub) = self.frame_sub.take() {
            sub.release();
        }
        if let Some(exporter) = self.exporter.take() {
            exporter.detach();
        }
        if let Some(texture) = self.texture.take() {
            match self.registry.as_mut() {
                Some(registry) => registry.release(texture),
                None => logw!("SHUTDOWN", "texture outlived its factory"),
            }
        }
        if let Some(registry) = self.registry.take() {
            registry.stop();
        }
        // A factory that was never started is dropped without shutdown.
        self.pending_factory = None;

        let stats = self.stats();
        self.channel.close();

        self.state = LifecycleState::Stopped;
        logi!(
            "SHUTDOWN",
            "stopped (updates={} published={} dropped={} ignored={} empty={})",
            stats.updates,
            stats.published,
            stats.dropped,
            stats.ignored,
            stats.empty
        );
        self.diagnostics.emit(ExportEvent::Stopped { stats });
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if matches!(
            self.state,
            LifecycleState::Starting | LifecycleState::Running | LifecycleState::ShuttingDown
        ) {
            self.stop();
        }
    }
}
