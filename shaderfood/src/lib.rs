//! A small GPU feeder built with WGPU.
//!
//! shaderfood takes care of the bookkeeping between plain data and a
//! draw call.  A [`Shader`] discovers its vertex attributes and uniforms
//! from the WGSL source, so drawing is a matter of handing it a
//! [`Params`] bundle that maps those names to values.  Vertex and index
//! arrays are shared ([`VertexData`], [`IndexData`]) and the [`Canvas`]
//! uploads each one to the GPU once, no matter how many frames draw it.
//!
//! Meshes come from OBJ, PLY, or a compact binary chunk format via
//! [`mesh::load`]; [`mesh::Model::params`] gives draw parameters with a
//! default Phong material, which [`Shader::phong`] knows how to draw.
//! [`Camera`] fills in the transforms.
//!
//! With the `winit` feature, [`with_default_runtime()`] sets up a
//! window, logging, the GPU and a canvas in one go.

mod gpu;
pub use gpu::WGPU;
pub use wgpu;

pub mod assets;
pub mod buffers;
pub use buffers::{IndexData, VertexData};
pub mod canvas;
pub use canvas::{Canvas, CanvasConfig, ClearBits, ClearParams, Frame};
mod camera;
pub use camera::Camera;
pub mod error;
pub use error::{AssetError, CanvasError, DrawError, MeshError, ShaderError};
pub mod mesh;
pub use mesh::{Model, Scene};
pub mod params;
pub use params::{default_material, Capability, Params, Primitive, RenderState, Value};
pub mod reflect;
pub use reflect::{ParamType, ProgramInfo};
mod shader;
pub use shader::Shader;
mod runtime;
pub use runtime::*;
