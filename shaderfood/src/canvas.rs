//! [`Canvas`] is the drawing surface: it owns the swapchain, the
//! depth buffer, the current viewport and render state, and the caches
//! that turn shared vertex and index arrays into GPU buffers.
//!
//! A typical frame is [`Canvas::clear`], some number of
//! [`crate::Shader::draw`] calls into the returned [`Frame`], and
//! [`Canvas::present`].

use crate::buffers::{BufferCache, IndexData, VertexData};
use crate::error::CanvasError;
use crate::params::{Capability, RenderState};
use crate::WGPU;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Surface setup options.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            present_mode: wgpu::PresentMode::AutoVsync,
            prefer_srgb: true,
        }
    }
}

/// Which attachments [`Canvas::clear`] should clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearBits {
    pub color: bool,
    pub depth: bool,
}

impl ClearBits {
    pub const NONE: Self = Self {
        color: false,
        depth: false,
    };
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
    };
    pub const DEPTH: Self = Self {
        color: false,
        depth: true,
    };
}

impl std::ops::BitOr for ClearBits {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self {
            color: self.color || rhs.color,
            depth: self.depth || rhs.depth,
        }
    }
}

/// Options for [`Canvas::clear`].
#[derive(Clone, Debug, PartialEq)]
pub struct ClearParams {
    pub color: [f64; 4],
    pub bits: ClearBits,
    pub enables: Vec<Capability>,
    pub disables: Vec<Capability>,
    /// `[x, y, width, height]`; the whole canvas when `None`.
    pub viewport: Option<[f32; 4]>,
}

impl Default for ClearParams {
    fn default() -> Self {
        Self {
            color: [0.6, 0.6, 0.6, 1.0],
            bits: ClearBits::COLOR | ClearBits::DEPTH,
            enables: vec![Capability::DepthTest],
            disables: vec![],
            viewport: None,
        }
    }
}

/// An acquired swapchain image that draws render into.
pub struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

impl Frame {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[allow(dead_code)]
pub struct Canvas {
    gpu: WGPU,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    viewport: [f32; 4],
    state: RenderState,
    vbos: BufferCache<VertexData, Arc<wgpu::Buffer>>,
    ibos: BufferCache<IndexData, Arc<wgpu::Buffer>>,
    constants: HashMap<Vec<u8>, Arc<wgpu::Buffer>>,
    default_indices: IndexData,
    default_vertices: VertexData,
}

impl Canvas {
    /// The format used for depth textures within shaderfood.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a canvas drawing to `surface`, configured at the given size.
    pub fn new(
        gpu: WGPU,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        config: &CanvasConfig,
    ) -> Self {
        let width = if width == 0 { 320 } else { width };
        let height = if height == 0 { 240 } else { height };
        let caps = surface.get_capabilities(gpu.adapter());
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb() == config.prefer_srgb)
            .or_else(|| caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: config.present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(gpu.device(), &surface_config);
        let (depth_texture, depth_view) = Self::create_depth_texture(gpu.device(), width, height);
        log::debug!("canvas {width}x{height} format {format:?}");
        Self {
            gpu,
            surface,
            config: surface_config,
            depth_texture,
            depth_view,
            viewport: [0.0, 0.0, width as f32, height as f32],
            state: RenderState::default(),
            vbos: BufferCache::new(),
            ibos: BufferCache::new(),
            constants: HashMap::new(),
            default_indices: IndexData::U16((0..=u16::MAX).collect()),
            default_vertices: VertexData::from(vec![-1.0, -1.0, 0.0, 0.0, 1.0, 0.0, 1.0, -1.0, 0.0]),
        }
    }

    /// Create a canvas on the web page's `<canvas>` element with the given id.
    #[cfg(target_arch = "wasm32")]
    pub async fn from_element_id(id: &str, config: &CanvasConfig) -> Result<Self, CanvasError> {
        use wasm_bindgen_futures::wasm_bindgen::JsCast;
        let canvas = web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| doc.get_element_by_id(id))
            .and_then(|elt| elt.dyn_into::<web_sys::HtmlCanvasElement>().ok())
            .ok_or_else(|| CanvasError::ElementNotFound(id.to_string()))?;
        let (width, height) = (canvas.width(), canvas.height());
        let instance = Arc::new(wgpu::Instance::default());
        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas))?;
        let gpu = WGPU::new(instance, Some(&surface)).await?;
        Ok(Self::new(gpu, surface, width, height, config))
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some("depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Resize the surface and depth texture (typically called when the window or canvas size changes).
    pub fn resize(&mut self, w: u32, h: u32) {
        if w == 0 || h == 0 {
            return;
        }
        self.config.width = w;
        self.config.height = h;
        self.surface.configure(self.gpu.device(), &self.config);
        let (depth_texture, depth_view) = Self::create_depth_texture(self.gpu.device(), w, h);
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;
        self.viewport = [0.0, 0.0, w as f32, h as f32];
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, CanvasError> {
        match self.surface.get_current_texture() {
            Ok(tex) => Ok(tex),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("surface {err}, reconfiguring");
                self.surface.configure(self.gpu.device(), &self.config);
                Ok(self.surface.get_current_texture()?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Acquire the next frame, set the viewport and render state, and
    /// clear the color and depth buffers.
    pub fn clear(&mut self, params: &ClearParams) -> Result<Frame, CanvasError> {
        self.viewport = params.viewport.unwrap_or([
            0.0,
            0.0,
            self.config.width as f32,
            self.config.height as f32,
        ]);
        self.state.apply(&params.enables, &params.disables);
        let texture = self.acquire()?;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let [r, g, b, a] = params.color;
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if params.bits.color {
                        wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if params.bits.depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        self.gpu.queue().submit(Some(encoder.finish()));
        Ok(Frame { texture, view })
    }

    /// Present a frame returned by [`Canvas::clear`].
    pub fn present(&self, frame: Frame) {
        drop(frame.view);
        frame.texture.present();
    }

    /// The GPU index buffer for `indices`, or for the default indices
    /// when `None`.  Uploaded once per array and memoized.
    pub fn ibo(&mut self, indices: Option<&IndexData>) -> Arc<wgpu::Buffer> {
        let data = indices.unwrap_or(&self.default_indices).clone();
        let device = self.gpu.device();
        self.ibos
            .get_or_insert_with(&data, |ix| {
                log::debug!("upload {} indices", ix.len());
                Arc::new(upload(
                    device,
                    "ibo",
                    &ix.to_buffer_bytes(),
                    wgpu::BufferUsages::INDEX,
                ))
            })
            .clone()
    }

    /// The GPU vertex buffer for `vertices`, or for the default
    /// triangle when `None`.  Uploaded once per array and memoized.
    pub fn vbo(&mut self, vertices: Option<&VertexData>) -> Arc<wgpu::Buffer> {
        let data = vertices.unwrap_or(&self.default_vertices).clone();
        let device = self.gpu.device();
        self.vbos
            .get_or_insert_with(&data, |v| {
                log::debug!("upload {} vertex floats", v.len());
                Arc::new(upload(
                    device,
                    "vbo",
                    v.as_bytes(),
                    wgpu::BufferUsages::VERTEX,
                ))
            })
            .clone()
    }

    /// A vertex buffer holding one constant attribute value, memoized by content.
    pub fn constant_vbo(&mut self, bytes: &[u8]) -> Arc<wgpu::Buffer> {
        if let Some(buf) = self.constants.get(bytes) {
            return buf.clone();
        }
        let buf = Arc::new(upload(
            self.gpu.device(),
            "constant",
            bytes,
            wgpu::BufferUsages::VERTEX,
        ));
        self.constants.insert(bytes.to_vec(), buf.clone());
        buf
    }

    /// Frees GPU buffers whose arrays are no longer referenced anywhere else,
    /// and constant buffers no draw is holding.
    pub fn release_unused_buffers(&mut self) -> usize {
        let released = self.vbos.release_unused()
            + self.ibos.release_unused()
            + prune_unshared(&mut self.constants);
        if released > 0 {
            log::debug!("released {released} buffers");
        }
        released
    }

    pub fn state(&self) -> RenderState {
        self.state
    }
    pub fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }
    pub fn viewport(&self) -> [f32; 4] {
        self.viewport
    }
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }
    pub fn default_indices(&self) -> &IndexData {
        &self.default_indices
    }
    pub fn default_vertices(&self) -> &VertexData {
        &self.default_vertices
    }
    pub fn gpu(&self) -> &WGPU {
        &self.gpu
    }
}

fn upload(
    device: &wgpu::Device,
    label: &str,
    bytes: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    // empty buffers can't be bound
    let padded;
    let contents = if bytes.is_empty() {
        padded = [0u8; 4];
        &padded[..]
    } else {
        bytes
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage,
    })
}

/// Drops entries nobody outside the map holds a handle to.
fn prune_unshared<K, B>(map: &mut HashMap<K, Arc<B>>) -> usize {
    let before = map.len();
    map.retain(|_, b| Arc::strong_count(b) > 1);
    before - map.len()
}
