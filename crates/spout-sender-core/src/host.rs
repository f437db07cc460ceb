//! Host collaborator contracts
//!
//! The bridge never talks to the host application directly. Everything it needs (event
//! delivery, texture creation, the scene stage) comes in through the traits below, which keeps
//! the plugin testable with an in-process host (see `bus::LocalDispatcher`).
//!
//! Two layers of event data exist:
//! - `HostEvent` / `Payload`: the host-owned, untyped key/value part of the boundary.
//! - `FrameResultToken`: the typed view the bridge decodes from a drawable-changed event.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::error::SenderError;

/// Payload key carrying the renderer's per-frame result handle.
pub const RESULT_HANDLE_KEY: &str = "result_handle";

/// Optional payload key carrying the frame-event layout version.
pub const VERSION_KEY: &str = "version";

/// Newest frame-event layout this crate understands.
pub const FRAME_EVENT_VERSION: u64 = 1;

/// Default subscription order. Lower orders are delivered first.
pub const DEFAULT_ORDER: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fired once per application update, after the update completed.
    PostUpdate,
    /// A render target has new content for this frame.
    DrawableChanged,
    /// Anything else sharing the stream.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Bytes(Vec<u8>),
    UInt(u64),
    Int(i64),
    Str(String),
    Bool(bool),
}

/// String-keyed event payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    entries: BTreeMap<String, PayloadValue>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: PayloadValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PayloadValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries.get(key)
    }

    /// Raw bytes under `key`, only if exactly `size` bytes long.
    pub fn get_bytes(&self, key: &str, size: usize) -> Option<&[u8]> {
        match self.entries.get(key) {
            Some(PayloadValue::Bytes(b)) if b.len() == size => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub kind: EventKind,
    pub payload: Payload,
}

impl HostEvent {
    pub fn new(kind: EventKind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    pub fn post_update() -> Self {
        Self::new(EventKind::PostUpdate, Payload::new())
    }

    /// A well-formed drawable-changed event carrying `result_handle`.
    pub fn drawable_changed(result_handle: u64) -> Self {
        Self::new(
            EventKind::DrawableChanged,
            Payload::new().with(
                RESULT_HANDLE_KEY,
                PayloadValue::Bytes(result_handle.to_ne_bytes().to_vec()),
            ),
        )
    }
}

/// Why an event could not be decoded into a `FrameResultToken`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEventError {
    WrongKind,
    MissingResult,
    MalformedResult,
    UnsupportedVersion(u64),
}

impl fmt::Display for FrameEventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEventError::WrongKind => write!(f, "not a drawable-changed event"),
            FrameEventError::MissingResult => write!(f, "payload has no '{RESULT_HANDLE_KEY}'"),
            FrameEventError::MalformedResult => {
                write!(f, "'{RESULT_HANDLE_KEY}' has an unexpected type or size")
            }
            FrameEventError::UnsupportedVersion(v) => {
                write!(f, "frame event version {v} is newer than {FRAME_EVENT_VERSION}")
            }
        }
    }
}

impl std::error::Error for FrameEventError {}

/// Opaque handle to one completed render.
///
/// Borrowed from the event that delivered it, so it cannot outlive the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResultToken<'ev> {
    handle: NonZeroU64,
    _event: PhantomData<&'ev HostEvent>,
}

impl<'ev> FrameResultToken<'ev> {
    pub fn from_event(event: &'ev HostEvent) -> Result<Self, FrameEventError> {
        if event.kind != EventKind::DrawableChanged {
            return Err(FrameEventError::WrongKind);
        }

        match event.payload.get(VERSION_KEY) {
            None => {}
            Some(PayloadValue::UInt(v)) if *v <= FRAME_EVENT_VERSION => {}
            Some(PayloadValue::UInt(v)) => return Err(FrameEventError::UnsupportedVersion(*v)),
            Some(_) => return Err(FrameEventError::MalformedResult),
        }

        let raw = match event.payload.get(RESULT_HANDLE_KEY) {
            None => return Err(FrameEventError::MissingResult),
            Some(PayloadValue::UInt(v)) => *v,
            Some(PayloadValue::Bytes(_)) => {
                let bytes = event
                    .payload
                    .get_bytes(RESULT_HANDLE_KEY, std::mem::size_of::<u64>())
                    .ok_or(FrameEventError::MalformedResult)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                u64::from_ne_bytes(buf)
            }
            Some(_) => return Err(FrameEventError::MalformedResult),
        };

        // A null result handle is the renderer saying "nothing this frame".
        let handle = NonZeroU64::new(raw).ok_or(FrameEventError::MissingResult)?;
        Ok(Self {
            handle,
            _event: PhantomData,
        })
    }

    pub fn raw(&self) -> u64 {
        self.handle.get()
    }
}

/// Native GPU resource pointer (e.g. an `ID3D11Texture2D*`), never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuResource(NonZeroU64);

impl GpuResource {
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// One AOV of one frame. Produced fresh per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AovDescriptor {
    pub name: String,
    pub resource: Option<GpuResource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub context_name: String,
    pub viewpoint_path: String,
    pub engine_id: String,
}

/// Render target bound to a scene context and viewpoint.
pub trait SharedTexture: Send + Sync {
    fn id(&self) -> TextureId;

    fn desc(&self) -> &TextureDesc;

    /// AOVs named `name` for the frame identified by `token`, at most `max_matches` of them.
    /// An empty result is legitimate: the renderer may skip an AOV on some frames.
    fn query_aovs(
        &self,
        token: &FrameResultToken<'_>,
        name: &str,
        max_matches: usize,
    ) -> Vec<AovDescriptor>;
}

/// Creates and destroys shared textures. Must be started before any texture exists and stopped
/// only after all of them are released.
pub trait TextureFactory: Send {
    fn startup(&mut self) -> Result<(), SenderError>;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Arc<dyn SharedTexture>, SenderError>;

    fn release_texture(&mut self, texture: Arc<dyn SharedTexture>);

    fn shutdown(&mut self);
}

/// The scene/stage the shared texture renders.
pub trait Stage: Send + Sync {
    fn active_context_name(&self) -> Option<String>;

    fn is_engine_attached(&self, engine_id: &str) -> bool;

    fn attach_engine(&self, engine_id: &str) -> Result<(), SenderError>;
}

pub trait UpdateListener: Send + Sync {
    fn on_update(&self, event: &HostEvent);
}

pub trait FrameListener: Send + Sync {
    fn on_frame_event(&self, event: &HostEvent);
}

/// Event delivery. Every observe call hands back a `Subscription` the caller must hold for as
/// long as it wants callbacks.
pub trait EventDispatcher: Send + Sync {
    fn observe_post_update(
        &self,
        name: &str,
        order: i32,
        listener: Arc<dyn UpdateListener>,
    ) -> Subscription;

    /// Drawable-changed events of `texture` only.
    fn observe_drawable_changed(
        &self,
        name: &str,
        order: i32,
        texture: TextureId,
        listener: Arc<dyn FrameListener>,
    ) -> Subscription;
}

/// Scoped subscription token.
///
/// Releasing (explicitly or by drop) runs the dispatcher's unsubscribe hook exactly once. Once
/// it returns, no further callbacks for this subscription are delivered.
pub struct Subscription {
    name: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(name: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release (e.g. the dispatcher refused it).
    pub fn inert(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            release: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

/// What the host hands the plugin. Any collaborator may be missing.
#[derive(Default)]
pub struct HostServices {
    pub events: Option<Arc<dyn EventDispatcher>>,
    pub factory: Option<Box<dyn TextureFactory>>,
    pub stage: Option<Arc<dyn Stage>>,
}

/// Lifecycle interface the host drives. Neither call reports failure back to the host.
pub trait Extension {
    fn on_startup(&mut self, ext_id: &str);

    fn on_shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn token_decodes_native_endian_bytes() {
        let ev = HostEvent::drawable_changed(0xdead_beef);
        let token = FrameResultToken::from_event(&ev).unwrap();
        assert_eq!(token.raw(), 0xdead_beef);
    }

    #[test]
    fn token_accepts_integer_payload() {
        let ev = HostEvent::new(
            EventKind::DrawableChanged,
            Payload::new().with(RESULT_HANDLE_KEY, PayloadValue::UInt(7)),
        );
        assert_eq!(FrameResultToken::from_event(&ev).unwrap().raw(), 7);
    }

    #[test]
    fn token_rejects_foreign_kinds() {
        let mut ev = HostEvent::drawable_changed(1);
        ev.kind = EventKind::Other("resize".into());
        assert_eq!(FrameResultToken::from_event(&ev), Err(FrameEventError::WrongKind));
    }

    #[test]
    fn token_rejects_missing_and_misshapen_handles() {
        let missing = HostEvent::new(EventKind::DrawableChanged, Payload::new());
        assert_eq!(
            FrameResultToken::from_event(&missing),
            Err(FrameEventError::MissingResult)
        );

        let short = HostEvent::new(
            EventKind::DrawableChanged,
            Payload::new().with(RESULT_HANDLE_KEY, PayloadValue::Bytes(vec![1, 2, 3, 4])),
        );
        assert_eq!(
            FrameResultToken::from_event(&short),
            Err(FrameEventError::MalformedResult)
        );

        let text = HostEvent::new(
            EventKind::DrawableChanged,
            Payload::new().with(RESULT_HANDLE_KEY, PayloadValue::Str("0x10".into())),
        );
        assert_eq!(
            FrameResultToken::from_event(&text),
            Err(FrameEventError::MalformedResult)
        );

        assert_eq!(
            FrameResultToken::from_event(&HostEvent::drawable_changed(0)),
            Err(FrameEventError::MissingResult)
        );
    }

    #[test]
    fn token_checks_version() {
        let mut ev = HostEvent::drawable_changed(5);
        ev.payload.insert(VERSION_KEY, PayloadValue::UInt(1));
        assert!(FrameResultToken::from_event(&ev).is_ok());

        ev.payload.insert(VERSION_KEY, PayloadValue::UInt(2));
        assert_eq!(
            FrameResultToken::from_event(&ev),
            Err(FrameEventError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn subscription_releases_exactly_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = Subscription::new("test", move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        sub.release();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let h = hits.clone();
        drop(Subscription::new("dropped", move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn gpu_resource_is_never_null() {
        assert!(GpuResource::from_raw(0).is_none());
        assert_eq!(GpuResource::from_raw(42).map(GpuResource::raw), Some(42));
    }
}
