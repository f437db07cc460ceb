//! Recording mock host shared by the integration tests.
//!
//! Every collaborator writes to one journal so tests can assert cross-component ordering.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spout_sender::output::TextureSender;
use spout_sender_core::bus::LocalDispatcher;
use spout_sender_core::host::{
    AovDescriptor, EventDispatcher, FrameListener, FrameResultToken, GpuResource, HostServices,
    SharedTexture, Stage, Subscription, TextureDesc, TextureFactory, TextureId, UpdateListener,
};
use spout_sender_core::{PixelFormat, SenderError};

pub type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

/// What the renderer produces for the `LdrColor` AOV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AovMode {
    Present(u64),
    Empty,
    NoResource,
}

pub const LDR_RESOURCE: u64 = 0x7f00_1000;

#[derive(Debug, Clone, Copy)]
pub struct Faults {
    pub factory: bool,
    pub factory_startup: bool,
    pub stage: bool,
    pub context: bool,
    pub engine_attached: bool,
    pub engine_attach: bool,
    pub texture_create: bool,
    pub dispatcher: bool,
    pub sender_open: bool,
    pub factory_panics: bool,
    pub sender_panics: bool,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            factory: true,
            factory_startup: true,
            stage: true,
            context: true,
            engine_attached: false,
            engine_attach: true,
            texture_create: true,
            dispatcher: true,
            sender_open: true,
            factory_panics: false,
            sender_panics: false,
        }
    }
}

pub struct MockHost {
    pub journal: Journal,
    pub bus: LocalDispatcher,
    pub aov: Arc<Mutex<AovMode>>,
    pub queries: Arc<AtomicUsize>,
    pub publishes: Arc<Mutex<Vec<(u64, u32, u32, PixelFormat)>>>,
    pub descs: Arc<Mutex<Vec<TextureDesc>>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            journal: Arc::default(),
            bus: LocalDispatcher::new(),
            aov: Arc::new(Mutex::new(AovMode::Present(LDR_RESOURCE))),
            queries: Arc::default(),
            publishes: Arc::default(),
            descs: Arc::default(),
        }
    }

    pub fn services(&self, faults: Faults) -> HostServices {
        let events: Option<Arc<dyn EventDispatcher>> = if faults.dispatcher {
            Some(Arc::new(JournalDispatcher {
                bus: self.bus.clone(),
                journal: self.journal.clone(),
            }))
        } else {
            None
        };
        let factory: Option<Box<dyn TextureFactory>> = if faults.factory {
            Some(Box::new(MockFactory {
                journal: self.journal.clone(),
                aov: self.aov.clone(),
                queries: self.queries.clone(),
                descs: self.descs.clone(),
                startup_ok: faults.factory_startup,
                create_ok: faults.texture_create,
                panics: faults.factory_panics,
                next: 0,
            }))
        } else {
            None
        };
        let stage: Option<Arc<dyn Stage>> = if faults.stage {
            Some(Arc::new(MockStage {
                journal: self.journal.clone(),
                context: faults.context,
                attached: Mutex::new(faults.engine_attached),
                attach_ok: faults.engine_attach,
            }))
        } else {
            None
        };
        HostServices {
            events,
            factory,
            stage,
        }
    }

    pub fn sender(&self, faults: Faults) -> Box<dyn TextureSender> {
        Box::new(MockSender {
            journal: self.journal.clone(),
            publishes: self.publishes.clone(),
            open_ok: faults.sender_open,
            panics: faults.sender_panics,
        })
    }

    pub fn set_aov(&self, mode: AovMode) {
        *self.aov.lock().unwrap() = mode;
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.journal().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

struct JournalDispatcher {
    bus: LocalDispatcher,
    journal: Journal,
}

impl EventDispatcher for JournalDispatcher {
    fn observe_post_update(
        &self,
        name: &str,
        order: i32,
        listener: Arc<dyn UpdateListener>,
    ) -> Subscription {
        note(&self.journal, "subscribe update");
        let inner = self.bus.observe_post_update(name, order, listener);
        let journal = self.journal.clone();
        Subscription::new(name, move || {
            inner.release();
            note(&journal, "unsubscribe update");
        })
    }

    fn observe_drawable_changed(
        &self,
        name: &str,
        order: i32,
        texture: TextureId,
        listener: Arc<dyn FrameListener>,
    ) -> Subscription {
        note(&self.journal, "subscribe frame");
        let inner = self.bus.observe_drawable_changed(name, order, texture, listener);
        let journal = self.journal.clone();
        Subscription::new(name, move || {
            inner.release();
            note(&journal, "unsubscribe frame");
        })
    }
}

struct MockTexture {
    id: TextureId,
    desc: TextureDesc,
    aov: Arc<Mutex<AovMode>>,
    queries: Arc<AtomicUsize>,
}

impl SharedTexture for MockTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn query_aovs(
        &self,
        _token: &FrameResultToken<'_>,
        name: &str,
        max_matches: usize,
    ) -> Vec<AovDescriptor> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if name != "LdrColor" || max_matches == 0 {
            return Vec::new();
        }
        match *self.aov.lock().unwrap() {
            AovMode::Present(raw) => vec![AovDescriptor {
                name: name.to_string(),
                resource: GpuResource::from_raw(raw),
            }],
            AovMode::NoResource => vec![AovDescriptor {
                name: name.to_string(),
                resource: None,
            }],
            AovMode::Empty => Vec::new(),
        }
    }
}

struct MockFactory {
    journal: Journal,
    aov: Arc<Mutex<AovMode>>,
    queries: Arc<AtomicUsize>,
    descs: Arc<Mutex<Vec<TextureDesc>>>,
    startup_ok: bool,
    create_ok: bool,
    panics: bool,
    next: u64,
}

impl TextureFactory for MockFactory {
    fn startup(&mut self) -> Result<(), SenderError> {
        if self.panics {
            panic!("factory exploded");
        }
        note(&self.journal, "factory startup");
        if self.startup_ok {
            Ok(())
        } else {
            Err(SenderError::FactoryStartup {
                msg: "no gpu".into(),
            })
        }
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
    ) -> Result<Arc<dyn SharedTexture>, SenderError> {
        note(&self.journal, "factory create");
        if !self.create_ok {
            return Err(SenderError::TextureCreate {
                name: desc.name.clone(),
                msg: "out of memory".into(),
            });
        }
        self.next += 1;
        self.descs.lock().unwrap().push(desc.clone());
        Ok(Arc::new(MockTexture {
            id: TextureId(self.next),
            desc: desc.clone(),
            aov: self.aov.clone(),
            queries: self.queries.clone(),
        }))
    }

    fn release_texture(&mut self, _texture: Arc<dyn SharedTexture>) {
        note(&self.journal, "factory release");
    }

    fn shutdown(&mut self) {
        note(&self.journal, "factory shutdown");
    }
}

struct MockStage {
    journal: Journal,
    context: bool,
    attached: Mutex<bool>,
    attach_ok: bool,
}

impl Stage for MockStage {
    fn active_context_name(&self) -> Option<String> {
        self.context.then(String::new)
    }

    fn is_engine_attached(&self, _engine_id: &str) -> bool {
        *self.attached.lock().unwrap()
    }

    fn attach_engine(&self, engine_id: &str) -> Result<(), SenderError> {
        note(&self.journal, format!("attach {engine_id}"));
        if !self.attach_ok {
            return Err(SenderError::EngineAttach {
                engine_id: engine_id.to_string(),
                msg: "renderer not installed".into(),
            });
        }
        *self.attached.lock().unwrap() = true;
        Ok(())
    }
}

struct MockSender {
    journal: Journal,
    publishes: Arc<Mutex<Vec<(u64, u32, u32, PixelFormat)>>>,
    open_ok: bool,
    panics: bool,
}

impl TextureSender for MockSender {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn open(&mut self, name: &str, _w: u32, _h: u32, _f: PixelFormat) -> anyhow::Result<()> {
        note(&self.journal, format!("sender open {name}"));
        anyhow::ensure!(self.open_ok, "sharing subsystem unavailable");
        Ok(())
    }

    fn publish(&mut self, r: GpuResource, w: u32, h: u32, f: PixelFormat) -> anyhow::Result<()> {
        if self.panics {
            panic!("sharing subsystem crashed");
        }
        self.publishes.lock().unwrap().push((r.raw(), w, h, f));
        Ok(())
    }

    fn close(&mut self) {
        note(&self.journal, "sender close");
    }
}
