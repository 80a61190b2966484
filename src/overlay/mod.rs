//! Capture overlay
//!
//! Shows the captured image back on a display through a dedicated camera.
//! The host owns a [`CameraRenderRegistry`]; the compositor registers a
//! render observer there and, for its own overlay camera only, emits one
//! full-screen triangle sampling the capture texture. The overlay camera
//! renders exactly one reserved layer, which the host picks (the
//! `overlay_layer` setting) so it never collides with scene content.

use std::collections::BTreeMap;

/// Number of render layers a culling mask can address
pub const LAYER_COUNT: u8 = 32;

/// Vertices in the full-screen triangle
pub const FULL_SCREEN_TRIANGLE_VERTICES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Render layer {0} is out of range (0..{LAYER_COUNT})")]
    InvalidLayer(u8),
}

pub type Result<T> = std::result::Result<T, OverlayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle returned by [`CameraRenderRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// A render layer index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layer(u8);

impl Layer {
    pub fn new(index: u8) -> Result<Self> {
        if index < LAYER_COUNT {
            Ok(Self(index))
        } else {
            Err(OverlayError::InvalidLayer(index))
        }
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    /// Culling mask selecting only this layer
    pub fn mask(&self) -> u32 {
        1 << self.0
    }
}

/// A draw request produced during a camera's render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub camera: CameraId,
    pub texture: TextureId,
    pub layer: Layer,
    pub vertex_count: u32,
}

type RenderObserver = Box<dyn Fn(CameraId) -> Option<DrawCommand> + Send>;

/// Host-side camera ids and per-camera render observers
#[derive(Default)]
pub struct CameraRenderRegistry {
    next_id: u64,
    next_camera: u32,
    observers: BTreeMap<ObserverId, RenderObserver>,
}

impl CameraRenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new camera
    pub fn create_camera(&mut self) -> CameraId {
        let id = CameraId(self.next_camera);
        self.next_camera += 1;
        id
    }

    /// Add an observer, called once per camera render pass
    pub fn register<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(CameraId) -> Option<DrawCommand> + Send + 'static,
    {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.insert(id, Box::new(observer));
        id
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run a camera's render pass, collecting draws in registration order
    pub fn dispatch(&self, camera: CameraId) -> Vec<DrawCommand> {
        self.observers
            .values()
            .filter_map(|observer| observer(camera))
            .collect()
    }
}

/// The dedicated camera the overlay draws through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayCamera {
    pub id: CameraId,
    pub target_display: u32,
    pub culling_mask: u32,
    /// Overlay cameras never clear; they draw over what is there
    pub clears: bool,
}

/// Returned by [`OverlayCompositor::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayHandle {
    camera: CameraId,
    observer: ObserverId,
}

/// Draws a texture full-screen through a camera limited to one layer
#[derive(Debug)]
pub struct OverlayCompositor {
    layer: Layer,
    camera: OverlayCamera,
    attached: Option<ObserverId>,
}

impl OverlayCompositor {
    pub fn new(registry: &mut CameraRenderRegistry, layer: u8, target_display: u32) -> Result<Self> {
        let layer = Layer::new(layer)?;
        let camera = OverlayCamera {
            id: registry.create_camera(),
            target_display,
            culling_mask: layer.mask(),
            clears: false,
        };
        log::debug!(
            "Overlay camera {:?} on display {} renders layer {}",
            camera.id,
            target_display,
            layer.index()
        );
        Ok(Self {
            layer,
            camera,
            attached: None,
        })
    }

    pub fn camera(&self) -> &OverlayCamera {
        &self.camera
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// Start drawing `source` on the overlay camera
    ///
    /// Re-attaching first detaches the previous observer, so at most one draw
    /// per render pass comes from this compositor.
    pub fn attach(&mut self, registry: &mut CameraRenderRegistry, source: TextureId) -> OverlayHandle {
        if let Some(previous) = self.attached.take() {
            registry.unregister(previous);
        }

        let own_camera = self.camera.id;
        let layer = self.layer;
        let observer = registry.register(move |camera| {
            (camera == own_camera).then_some(DrawCommand {
                camera,
                texture: source,
                layer,
                vertex_count: FULL_SCREEN_TRIANGLE_VERTICES,
            })
        });

        self.attached = Some(observer);
        OverlayHandle {
            camera: own_camera,
            observer,
        }
    }

    /// Stop drawing. Returns false when the handle was already detached or
    /// was issued by another compositor.
    pub fn detach(&mut self, registry: &mut CameraRenderRegistry, handle: OverlayHandle) -> bool {
        if handle.camera != self.camera.id {
            log::debug!(
                "Ignoring overlay handle for camera {:?} on camera {:?}",
                handle.camera,
                self.camera.id
            );
            return false;
        }
        if self.attached == Some(handle.observer) {
            self.attached = None;
        }
        registry.unregister(handle.observer)
    }
}
