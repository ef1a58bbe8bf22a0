//! Shader introspection.
//!
//! A shaderfood program is a single WGSL source holding both a vertex
//! and a fragment entry point.  [`reflect`] parses and validates it
//! with naga and lists what the program consumes: its vertex inputs
//! ("attributes") and the members of its uniform buffers
//! ("uniforms").  Nothing here touches the GPU, so the layout rules
//! used to pack uniform values can be checked in isolation.

use crate::error::{DrawError, ShaderError};
use crate::params::{Params, Value};

/// The value types a shader parameter can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    Int,
    IVec2,
    IVec3,
    IVec4,
}

impl ParamType {
    /// The value used when a draw call does not provide this parameter.
    pub fn default_value(self) -> Value {
        match self {
            ParamType::Float => Value::Float(0.0),
            ParamType::Vec2 => Value::Vec2([0.0, 0.0]),
            ParamType::Vec3 => Value::Vec3([0.0, 0.0, 0.0]),
            ParamType::Vec4 => Value::Vec4([0.0, 0.0, 0.0, 1.0]),
            ParamType::Mat2 => Value::Mat2([1.0, 0.0, 0.0, 1.0]),
            ParamType::Mat3 => Value::Mat3([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
            ParamType::Mat4 => Value::Mat4(crate::params::IDENTITY4),
            ParamType::Int => Value::Int(0),
            ParamType::IVec2 => Value::IVec2([0, 0]),
            ParamType::IVec3 => Value::IVec3([0, 0, 0]),
            ParamType::IVec4 => Value::IVec4([0, 0, 0, 1]),
        }
    }
    /// Number of scalar components.
    pub fn components(self) -> usize {
        match self {
            ParamType::Float | ParamType::Int => 1,
            ParamType::Vec2 | ParamType::IVec2 => 2,
            ParamType::Vec3 | ParamType::IVec3 => 3,
            ParamType::Vec4 | ParamType::IVec4 | ParamType::Mat2 => 4,
            ParamType::Mat3 => 9,
            ParamType::Mat4 => 16,
        }
    }
    /// Size in bytes of this type inside a uniform buffer.
    pub fn uniform_size(self) -> usize {
        match self {
            ParamType::Mat3 => 48,
            t => t.components() * 4,
        }
    }
    /// The vertex buffer format for an attribute of this type.
    pub fn vertex_format(self) -> Option<wgpu::VertexFormat> {
        Some(match self {
            ParamType::Float => wgpu::VertexFormat::Float32,
            ParamType::Vec2 => wgpu::VertexFormat::Float32x2,
            ParamType::Vec3 => wgpu::VertexFormat::Float32x3,
            ParamType::Vec4 => wgpu::VertexFormat::Float32x4,
            ParamType::Int => wgpu::VertexFormat::Sint32,
            ParamType::IVec2 => wgpu::VertexFormat::Sint32x2,
            ParamType::IVec3 => wgpu::VertexFormat::Sint32x3,
            ParamType::IVec4 => wgpu::VertexFormat::Sint32x4,
            ParamType::Mat2 | ParamType::Mat3 | ParamType::Mat4 => return None,
        })
    }
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ParamType::Float, Value::Float(_))
                | (ParamType::Vec2, Value::Vec2(_))
                | (ParamType::Vec3, Value::Vec3(_))
                | (ParamType::Vec4, Value::Vec4(_))
                | (ParamType::Mat2, Value::Mat2(_))
                | (ParamType::Mat3, Value::Mat3(_))
                | (ParamType::Mat4, Value::Mat4(_))
                | (ParamType::Int, Value::Int(_))
                | (ParamType::IVec2, Value::IVec2(_))
                | (ParamType::IVec3, Value::IVec3(_))
                | (ParamType::IVec4, Value::IVec4(_))
        )
    }

    fn from_naga(inner: &naga::TypeInner) -> Option<Self> {
        use naga::{ScalarKind, TypeInner, VectorSize};
        match *inner {
            TypeInner::Scalar(naga::Scalar { kind, width: 4 }) => match kind {
                ScalarKind::Float => Some(ParamType::Float),
                ScalarKind::Sint => Some(ParamType::Int),
                _ => None,
            },
            TypeInner::Vector {
                size,
                scalar: naga::Scalar { kind, width: 4 },
            } => match (kind, size) {
                (ScalarKind::Float, VectorSize::Bi) => Some(ParamType::Vec2),
                (ScalarKind::Float, VectorSize::Tri) => Some(ParamType::Vec3),
                (ScalarKind::Float, VectorSize::Quad) => Some(ParamType::Vec4),
                (ScalarKind::Sint, VectorSize::Bi) => Some(ParamType::IVec2),
                (ScalarKind::Sint, VectorSize::Tri) => Some(ParamType::IVec3),
                (ScalarKind::Sint, VectorSize::Quad) => Some(ParamType::IVec4),
                _ => None,
            },
            TypeInner::Matrix {
                columns,
                rows,
                scalar:
                    naga::Scalar {
                        kind: ScalarKind::Float,
                        width: 4,
                    },
            } => match (columns, rows) {
                (VectorSize::Bi, VectorSize::Bi) => Some(ParamType::Mat2),
                (VectorSize::Tri, VectorSize::Tri) => Some(ParamType::Mat3),
                (VectorSize::Quad, VectorSize::Quad) => Some(ParamType::Mat4),
                _ => None,
            },
            _ => None,
        }
    }
}

/// An active vertex input.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    pub ty: ParamType,
}

/// An active uniform: one member of a uniform buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub offset: u32,
    /// `None` for member types shaderfood cannot fill; those stay zeroed.
    pub ty: Option<ParamType>,
}

/// One `var<uniform>` binding and the uniforms it holds.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformBlockInfo {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Buffer size in bytes, a multiple of 16.
    pub size: u32,
    pub fields: Vec<UniformInfo>,
}

/// Everything the program consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramInfo {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub attributes: Vec<AttributeInfo>,
    pub uniform_blocks: Vec<UniformBlockInfo>,
}

impl ProgramInfo {
    pub fn uniforms(&self) -> impl Iterator<Item = &UniformInfo> {
        self.uniform_blocks.iter().flat_map(|b| b.fields.iter())
    }
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }
    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms().find(|u| u.name == name)
    }
    /// Highest bind group index used, if any uniforms exist.
    pub fn max_group(&self) -> Option<u32> {
        self.uniform_blocks.iter().map(|b| b.group).max()
    }
}

/// Parses, validates and introspects a WGSL program.
pub fn reflect(label: &str, source: &str) -> Result<ProgramInfo, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Validation {
        label: label.to_string(),
        message: e.as_inner().to_string(),
    })?;

    let entry = |stage: naga::ShaderStage, stage_name: &'static str| {
        module
            .entry_points
            .iter()
            .find(|ep| ep.stage == stage)
            .ok_or_else(|| ShaderError::MissingEntryPoint {
                label: label.to_string(),
                stage: stage_name,
            })
    };
    let vertex = entry(naga::ShaderStage::Vertex, "vertex")?;
    let fragment = entry(naga::ShaderStage::Fragment, "fragment")?;

    let mut attributes = vec![];
    for arg in vertex.function.arguments.iter() {
        let arg_name = arg.name.clone().unwrap_or_default();
        match &module.types[arg.ty].inner {
            naga::TypeInner::Struct { members, .. } => {
                for member in members.iter() {
                    if let Some(naga::Binding::Location { location, .. }) = member.binding {
                        let name = member.name.clone().unwrap_or_default();
                        attributes.push(attribute(label, &module, name, location, member.ty)?);
                    }
                }
            }
            _ => {
                if let Some(naga::Binding::Location { location, .. }) = arg.binding {
                    attributes.push(attribute(label, &module, arg_name, location, arg.ty)?);
                }
            }
        }
    }
    attributes.sort_by_key(|a| a.location);

    let mut uniform_blocks = vec![];
    for (_, var) in module.global_variables.iter() {
        let name = var.name.clone().unwrap_or_default();
        let Some(binding) = &var.binding else {
            continue;
        };
        if var.space != naga::AddressSpace::Uniform {
            return Err(ShaderError::UnsupportedResource {
                label: label.to_string(),
                name,
            });
        }
        let (size, fields) = match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, span } => (
                *span,
                members
                    .iter()
                    .map(|m| UniformInfo {
                        name: m.name.clone().unwrap_or_default(),
                        offset: m.offset,
                        ty: ParamType::from_naga(&module.types[m.ty].inner),
                    })
                    .collect(),
            ),
            inner => {
                let ty = ParamType::from_naga(inner);
                (
                    ty.map(|t| t.uniform_size() as u32).unwrap_or(16),
                    vec![UniformInfo {
                        name: name.clone(),
                        offset: 0,
                        ty,
                    }],
                )
            }
        };
        uniform_blocks.push(UniformBlockInfo {
            name,
            group: binding.group,
            binding: binding.binding,
            size: size.max(16).next_multiple_of(16),
            fields,
        });
    }
    uniform_blocks.sort_by_key(|b| (b.group, b.binding));

    log::debug!(
        "reflected {label}: {} attributes, {} uniform blocks",
        attributes.len(),
        uniform_blocks.len()
    );
    Ok(ProgramInfo {
        vertex_entry: vertex.name.clone(),
        fragment_entry: fragment.name.clone(),
        attributes,
        uniform_blocks,
    })
}

fn attribute(
    label: &str,
    module: &naga::Module,
    name: String,
    location: u32,
    ty: naga::Handle<naga::Type>,
) -> Result<AttributeInfo, ShaderError> {
    match ParamType::from_naga(&module.types[ty].inner) {
        Some(ty) if ty.vertex_format().is_some() => Ok(AttributeInfo { name, location, ty }),
        _ => Err(ShaderError::UnsupportedAttribute {
            label: label.to_string(),
            name,
        }),
    }
}

impl UniformBlockInfo {
    /// Writes every field from `params`, or its default when absent,
    /// into `out` using WGSL uniform buffer layout.
    pub fn pack(&self, params: &Params, out: &mut [u8]) -> Result<(), DrawError> {
        for field in self.fields.iter() {
            let Some(ty) = field.ty else {
                continue;
            };
            let default;
            let value = match params.get(&field.name) {
                Some(v) if ty.accepts(v) => v,
                Some(v) => {
                    return Err(DrawError::TypeMismatch {
                        name: field.name.clone(),
                        expected: ty,
                        found: v.kind(),
                    })
                }
                None => {
                    default = ty.default_value();
                    &default
                }
            };
            write_uniform(value, field.offset as usize, out);
        }
        Ok(())
    }
}

fn put(out: &mut [u8], at: usize, bytes: &[u8]) {
    if let Some(dst) = out.get_mut(at..at + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

fn write_uniform(value: &Value, offset: usize, out: &mut [u8]) {
    match value {
        Value::Float(f) => put(out, offset, bytemuck::bytes_of(f)),
        Value::Vec2(v) => put(out, offset, bytemuck::bytes_of(v)),
        Value::Vec3(v) => put(out, offset, bytemuck::bytes_of(v)),
        Value::Vec4(v) | Value::Mat2(v) => put(out, offset, bytemuck::bytes_of(v)),
        Value::Mat3(m) => {
            // each column is padded out to a vec4
            for (i, col) in m.chunks_exact(3).enumerate() {
                put(out, offset + i * 16, bytemuck::cast_slice(col));
            }
        }
        Value::Mat4(m) => put(out, offset, bytemuck::bytes_of(m)),
        Value::Int(i) => put(out, offset, bytemuck::bytes_of(i)),
        Value::IVec2(v) => put(out, offset, bytemuck::bytes_of(v)),
        Value::IVec3(v) => put(out, offset, bytemuck::bytes_of(v)),
        Value::IVec4(v) => put(out, offset, bytemuck::bytes_of(v)),
        Value::Vertices(_) | Value::Indices(_) => {}
    }
}

/// Bytes of a single attribute value, for binding a constant attribute.
pub fn attribute_bytes(value: &Value) -> Option<Vec<u8>> {
    Some(match value {
        Value::Float(f) => bytemuck::bytes_of(f).to_vec(),
        Value::Vec2(v) => bytemuck::bytes_of(v).to_vec(),
        Value::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
        Value::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
        Value::Int(i) => bytemuck::bytes_of(i).to_vec(),
        Value::IVec2(v) => bytemuck::bytes_of(v).to_vec(),
        Value::IVec3(v) => bytemuck::bytes_of(v).to_vec(),
        Value::IVec4(v) => bytemuck::bytes_of(v).to_vec(),
        _ => return None,
    })
}
