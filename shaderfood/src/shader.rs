//! [`Shader`] wraps one WGSL program.  Its attributes and uniforms are
//! discovered by [`crate::reflect`] when the shader is created, and
//! [`Shader::draw`] looks each of them up by name in a [`Params`]
//! bundle: vertex arrays become (memoized) vertex buffers, everything
//! else is packed into the program's uniform buffers.  Anything the
//! params leave out gets its type's default value.

use crate::canvas::{Canvas, Frame};
use crate::error::{DrawError, ShaderError};
use crate::params::{Params, Primitive, RenderState, Value};
use crate::reflect::{self, AttributeInfo, ProgramInfo, UniformBlockInfo, UniformInfo};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

const PHONG: &str = include_str!("shaders/phong.wgsl");

struct UniformBlock {
    info: UniformBlockInfo,
    buffer: wgpu::Buffer,
    staging: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    primitive: Primitive,
    state: RenderState,
    // one bit per attribute slot bound to a single constant value
    constant_mask: u64,
    strip_format: Option<wgpu::IndexFormat>,
}

pub struct Shader {
    label: String,
    info: ProgramInfo,
    module: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_blocks: Vec<UniformBlock>,
    bind_groups: Vec<wgpu::BindGroup>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Shader {
    /// Compile `source` and set up buffers for every uniform it declares.
    pub fn from_source(canvas: &Canvas, label: &str, source: &str) -> Result<Self, ShaderError> {
        let info = reflect::reflect(label, source)?;
        let device = canvas.gpu().device();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
        });

        let uniform_blocks: Vec<UniformBlock> = info
            .uniform_blocks
            .iter()
            .map(|b| UniformBlock {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&b.name),
                    size: b.size as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                staging: vec![0; b.size as usize],
                info: b.clone(),
            })
            .collect();

        // every group up to the highest one used needs a layout, even if empty
        let group_count = info.max_group().map_or(0, |g| g + 1);
        let mut bind_group_layouts = Vec::with_capacity(group_count as usize);
        let mut bind_groups = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            let blocks: Vec<&UniformBlock> = uniform_blocks
                .iter()
                .filter(|b| b.info.group == group)
                .collect();
            let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = blocks
                .iter()
                .map(|b| wgpu::BindGroupLayoutEntry {
                    binding: b.info.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                })
                .collect();
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &layout_entries,
            });
            let entries: Vec<wgpu::BindGroupEntry> = blocks
                .iter()
                .map(|b| wgpu::BindGroupEntry {
                    binding: b.info.binding,
                    resource: b.buffer.as_entire_binding(),
                })
                .collect();
            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &entries,
            }));
            bind_group_layouts.push(layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &bind_group_layouts.iter().collect::<Vec<_>>(),
            push_constant_ranges: &[],
        });

        Ok(Self {
            label: label.to_string(),
            info,
            module,
            pipeline_layout,
            uniform_blocks,
            bind_groups,
            pipelines: HashMap::new(),
        })
    }

    /// Fetch a WGSL program from a path or URL and compile it.
    pub async fn load(canvas: &Canvas, url: &str) -> Result<Self, ShaderError> {
        let source = crate::assets::load_string(url).await?;
        Self::from_source(canvas, url, &source)
    }

    /// The bundled Phong shader.  It reads the names set by
    /// [`crate::default_material`] plus `pos` and `normal` attributes.
    pub fn phong(canvas: &Canvas) -> Result<Self, ShaderError> {
        Self::from_source(canvas, "phong.wgsl", PHONG)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn info(&self) -> &ProgramInfo {
        &self.info
    }
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.info.attributes
    }
    pub fn uniforms(&self) -> impl Iterator<Item = &UniformInfo> {
        self.info.uniforms()
    }

    /// Draw a model with this shader into `frame`.
    pub fn draw(
        &mut self,
        canvas: &mut Canvas,
        frame: &Frame,
        params: &Params,
    ) -> Result<(), DrawError> {
        canvas
            .state_mut()
            .apply(&params.enables, &params.disables);

        for block in self.uniform_blocks.iter_mut() {
            block.info.pack(params, &mut block.staging)?;
            canvas
                .gpu()
                .queue()
                .write_buffer(&block.buffer, 0, &block.staging);
        }

        let mut constant_mask = 0_u64;
        let mut vertex_buffers: Vec<Arc<wgpu::Buffer>> =
            Vec::with_capacity(self.info.attributes.len());
        for (slot, attr) in self.info.attributes.iter().enumerate() {
            let buffer = match params.get(&attr.name) {
                Some(Value::Vertices(v)) => canvas.vbo(Some(v)),
                Some(v) if attr.ty.accepts(v) => {
                    constant_mask |= 1 << slot;
                    canvas.constant_vbo(&reflect::attribute_bytes(v).unwrap_or_default())
                }
                Some(v) => {
                    return Err(DrawError::TypeMismatch {
                        name: attr.name.clone(),
                        expected: attr.ty,
                        found: v.kind(),
                    })
                }
                None => {
                    constant_mask |= 1 << slot;
                    let default = attr.ty.default_value();
                    canvas.constant_vbo(&reflect::attribute_bytes(&default).unwrap_or_default())
                }
            };
            vertex_buffers.push(buffer);
        }

        let (ibo, count, format) = match params.get("indices") {
            Some(Value::Indices(ix)) => (canvas.ibo(Some(ix)), ix.len() as u32, ix.format()),
            Some(other) => return Err(DrawError::NotIndices(other.kind())),
            None => (canvas.ibo(None), 3, wgpu::IndexFormat::Uint16),
        };

        let key = PipelineKey {
            primitive: params.primitive,
            state: canvas.state(),
            constant_mask,
            strip_format: params.primitive.is_strip().then_some(format),
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(canvas, &key);
            self.pipelines.insert(key, pipeline);
        }
        let pipeline = &self.pipelines[&key];

        let canvas = &*canvas;
        let (width, height) = canvas.size();
        let [x, y, w, h] = canvas.viewport();
        let x = x.clamp(0.0, width as f32 - 1.0);
        let y = y.clamp(0.0, height as f32 - 1.0);
        let w = w.clamp(1.0, width as f32 - x);
        let h = h.clamp(1.0, height as f32 - y);

        let gpu = canvas.gpu();
        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&self.label),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&self.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: canvas.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            rpass.set_pipeline(pipeline);
            rpass.set_viewport(x, y, w, h, 0.0, 1.0);
            for (group, bind_group) in self.bind_groups.iter().enumerate() {
                rpass.set_bind_group(group as u32, bind_group, &[]);
            }
            for (slot, buffer) in vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            rpass.set_index_buffer(ibo.slice(..), format);
            rpass.draw_indexed(0..count, 0, 0..1);
        }
        gpu.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    fn create_pipeline(&self, canvas: &Canvas, key: &PipelineKey) -> wgpu::RenderPipeline {
        log::debug!("{}: new pipeline for {key:?}", self.label);
        // one buffer per attribute, so each layout holds a single attribute
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = self
            .info
            .attributes
            .iter()
            .map(|a| {
                [wgpu::VertexAttribute {
                    format: a.ty.vertex_format().unwrap_or(wgpu::VertexFormat::Float32x4),
                    offset: 0,
                    shader_location: a.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = attributes
            .iter()
            .enumerate()
            .map(|(slot, attrs)| wgpu::VertexBufferLayout {
                array_stride: attrs[0].format.size(),
                step_mode: if key.constant_mask & (1 << slot) != 0 {
                    wgpu::VertexStepMode::Instance
                } else {
                    wgpu::VertexStepMode::Vertex
                },
                attributes: attrs,
            })
            .collect();
        canvas
            .gpu()
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&self.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.module,
                    entry_point: &self.info.vertex_entry,
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.module,
                    entry_point: &self.info.fragment_entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: canvas.surface_format(),
                        blend: key
                            .state
                            .blend
                            .then_some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: key.primitive.topology(),
                    strip_index_format: key.strip_format,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: key.state.cull_face.then_some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: Canvas::DEPTH_FORMAT,
                    depth_write_enabled: key.state.depth_test,
                    depth_compare: if key.state.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
    }
}
