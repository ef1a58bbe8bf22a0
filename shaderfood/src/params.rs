//! Named draw parameters: uniform values, vertex arrays and indices,
//! plus the primitive and render-state toggles for one draw call.

use crate::buffers::{IndexData, VertexData};
use std::collections::BTreeMap;

/// A single named parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    Vertices(VertexData),
    Indices(IndexData),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Vec2(_) => "vec2",
            Value::Vec3(_) => "vec3",
            Value::Vec4(_) => "vec4",
            Value::Mat2(_) => "mat2",
            Value::Mat3(_) => "mat3",
            Value::Mat4(_) => "mat4",
            Value::Int(_) => "int",
            Value::IVec2(_) => "ivec2",
            Value::IVec3(_) => "ivec3",
            Value::IVec4(_) => "ivec4",
            Value::Vertices(_) => "vertex data",
            Value::Indices(_) => "index data",
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}
impl From<[f32; 2]> for Value {
    fn from(v: [f32; 2]) -> Self {
        Value::Vec2(v)
    }
}
impl From<[f32; 3]> for Value {
    fn from(v: [f32; 3]) -> Self {
        Value::Vec3(v)
    }
}
impl From<[f32; 4]> for Value {
    fn from(v: [f32; 4]) -> Self {
        Value::Vec4(v)
    }
}
impl From<[f32; 16]> for Value {
    fn from(v: [f32; 16]) -> Self {
        Value::Mat4(v)
    }
}
impl From<ultraviolet::Mat4> for Value {
    fn from(m: ultraviolet::Mat4) -> Self {
        Value::Mat4(bytemuck::cast(m))
    }
}
impl From<ultraviolet::Vec3> for Value {
    fn from(v: ultraviolet::Vec3) -> Self {
        Value::Vec3([v.x, v.y, v.z])
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}
impl From<VertexData> for Value {
    fn from(v: VertexData) -> Self {
        Value::Vertices(v)
    }
}
impl From<IndexData> for Value {
    fn from(v: IndexData) -> Self {
        Value::Indices(v)
    }
}

/// Pipeline state that can be switched on and off between draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    DepthTest,
    CullFace,
    Blend,
}

/// The set of currently enabled [`Capability`] values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub depth_test: bool,
    pub cull_face: bool,
    pub blend: bool,
}

impl RenderState {
    pub fn set(&mut self, cap: Capability, on: bool) {
        match cap {
            Capability::DepthTest => self.depth_test = on,
            Capability::CullFace => self.cull_face = on,
            Capability::Blend => self.blend = on,
        }
    }
    pub fn is_enabled(&self, cap: Capability) -> bool {
        match cap {
            Capability::DepthTest => self.depth_test,
            Capability::CullFace => self.cull_face,
            Capability::Blend => self.blend,
        }
    }
    /// Enables come first, so a capability listed in both ends up disabled.
    pub fn apply(&mut self, enables: &[Capability], disables: &[Capability]) {
        for &e in enables {
            self.set(e, true);
        }
        for &d in disables {
            self.set(d, false);
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

impl Primitive {
    pub fn topology(self) -> wgpu::PrimitiveTopology {
        match self {
            Primitive::Points => wgpu::PrimitiveTopology::PointList,
            Primitive::Lines => wgpu::PrimitiveTopology::LineList,
            Primitive::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
    pub fn is_strip(self) -> bool {
        matches!(self, Primitive::LineStrip | Primitive::TriangleStrip)
    }
}

/// Everything one draw call needs besides the shader itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value>,
    pub primitive: Primitive,
    pub enables: Vec<Capability>,
    pub disables: Vec<Capability>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }
    /// Parameters pre-filled with [`default_material`].
    pub fn with_default_material() -> Self {
        let mut p = Self::new();
        default_material(&mut p);
        p
    }
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// The `indices` parameter, if it holds index data.
    pub fn indices(&self) -> Option<&IndexData> {
        match self.values.get("indices") {
            Some(Value::Indices(ix)) => Some(ix),
            _ => None,
        }
    }
    pub fn vertices(&self, name: &str) -> Option<&VertexData> {
        match self.values.get(name) {
            Some(Value::Vertices(v)) => Some(v),
            _ => None,
        }
    }
    pub fn mat4(&self, name: &str) -> Option<ultraviolet::Mat4> {
        match self.values.get(name) {
            Some(Value::Mat4(m)) => Some(bytemuck::cast(*m)),
            _ => None,
        }
    }
    fn set_default(&mut self, name: &str, value: Value) {
        self.values.entry(name.to_string()).or_insert(value);
    }
}

pub const IDENTITY4: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Fills in the material and transform parameters a lit shader
/// expects.  Names already present in `params` are left alone.
pub fn default_material(params: &mut Params) -> &mut Params {
    params.set_default("ambient", Value::Vec3([0.4, 0.4, 0.4]));
    params.set_default("diffuse", Value::Vec3([0.5, 0.5, 0.5]));
    params.set_default("specular", Value::Vec3([0.5, 0.5, 0.5]));
    params.set_default("shininess", Value::Float(10.0));
    params.set_default("alpha", Value::Float(1.0));
    params.set_default("model_to_world", Value::Mat4(IDENTITY4));
    // usually overwritten by Camera::set_params
    params.set_default("light_pos", Value::Vec3([3.0, 0.0, 0.0]));
    params.set_default("view_pos", Value::Vec3([0.0, 0.0, 3.0]));
    params.set_default("model_to_perspective", Value::Mat4(IDENTITY4));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_material_fills_only_missing() {
        let mut p = Params::new();
        p.set("diffuse", [1.0, 0.0, 0.0]);
        default_material(&mut p);
        assert_eq!(p.get("diffuse"), Some(&Value::Vec3([1.0, 0.0, 0.0])));
        assert_eq!(p.get("shininess"), Some(&Value::Float(10.0)));
        assert_eq!(p.get("model_to_world"), Some(&Value::Mat4(IDENTITY4)));
        assert_eq!(p.len(), 9);
    }

    #[test]
    fn disables_win_over_enables() {
        let mut s = RenderState::default();
        s.apply(
            &[Capability::DepthTest, Capability::Blend],
            &[Capability::Blend],
        );
        assert!(s.is_enabled(Capability::DepthTest));
        assert!(!s.is_enabled(Capability::Blend));
        assert!(!s.cull_face);
    }

    #[test]
    fn typed_getters_ignore_other_kinds() {
        let mut p = Params::new();
        p.set("indices", 3.0);
        p.set("pos", VertexData::from(vec![0.0; 9]));
        assert!(p.indices().is_none());
        assert_eq!(p.vertices("pos").map(|v| v.len()), Some(9));
        assert!(p.mat4("pos").is_none());
    }

    #[test]
    fn mat4_round_trips_through_ultraviolet() {
        let m = ultraviolet::Mat4::from_translation(ultraviolet::Vec3::new(1.0, 2.0, 3.0));
        let mut p = Params::new();
        p.set("m", m);
        assert_eq!(p.mat4("m"), Some(m));
        match p.get("m") {
            Some(Value::Mat4(a)) => assert_eq!(&a[12..15], &[1.0, 2.0, 3.0]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
