use shaderfood::reflect::{attribute_bytes, reflect};
use shaderfood::{DrawError, ParamType, Params, ShaderError, Value};

const LIT: &str = r#"
struct Globals {
    model_to_perspective: mat4x4<f32>,
    tint: vec4<f32>,
    normal_matrix: mat3x3<f32>,
    mode: i32,
}
@group(0) @binding(0) var<uniform> globals: Globals;

struct Light {
    dir: vec3<f32>,
    power: f32,
}
@group(2) @binding(1) var<uniform> light: Light;

struct VertexInput {
    @location(2) color: vec4<f32>,
    @location(0) pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vertex(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let n = globals.normal_matrix * in.normal;
    let lit = max(dot(n, light.dir), 0.0) * light.power;
    out.clip = globals.model_to_perspective * vec4<f32>(in.pos, 1.0);
    out.color = in.color * globals.tint * lit;
    return out;
}

@fragment
fn fragment(in: VertexOutput) -> @location(0) vec4<f32> {
    if globals.mode == 1 {
        return vec4<f32>(1.0);
    }
    return in.color;
}
"#;

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn attributes_sorted_by_location() {
    let info = reflect("lit", LIT).unwrap();
    let names: Vec<_> = info.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["pos", "normal", "color"]);
    assert_eq!(info.attribute("color").unwrap().ty, ParamType::Vec4);
    assert_eq!(info.vertex_entry, "vertex");
    assert_eq!(info.fragment_entry, "fragment");
}

#[test]
fn blocks_and_groups() {
    let info = reflect("lit", LIT).unwrap();
    assert_eq!(info.uniform_blocks.len(), 2);
    assert_eq!(info.max_group(), Some(2));
    let globals = &info.uniform_blocks[0];
    assert_eq!((globals.group, globals.binding), (0, 0));
    assert_eq!(info.uniform("tint").unwrap().offset, 64);
    assert_eq!(info.uniform("normal_matrix").unwrap().offset, 80);
    assert_eq!(info.uniform("mode").unwrap().offset, 128);
    assert_eq!(globals.size, 144);
    let light = &info.uniform_blocks[1];
    assert_eq!((light.group, light.binding, light.size), (2, 1, 16));
}

#[test]
fn packing_uses_params_then_defaults() {
    let info = reflect("lit", LIT).unwrap();
    let globals = &info.uniform_blocks[0];
    let mut params = Params::new();
    params.set("tint", [0.5, 0.25, 1.0, 1.0]).set("mode", 1);
    let mut out = vec![0; globals.size as usize];
    globals.pack(&params, &mut out).unwrap();
    let f = floats(&out);
    // model_to_perspective defaults to identity
    assert_eq!(&f[0..4], &[1.0, 0.0, 0.0, 0.0]);
    assert_eq!(&f[16..20], &[0.5, 0.25, 1.0, 1.0]);
    // normal_matrix defaults to identity, one padded column per vec4
    assert_eq!(&f[20..32], &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(&out[128..132], &1_i32.to_le_bytes());

    params.set("mode", 2.0);
    let err = globals.pack(&params, &mut out).unwrap_err();
    assert!(matches!(
        err,
        DrawError::TypeMismatch { ref name, expected: ParamType::Int, found: "float" } if name == "mode"
    ));
}

#[test]
fn constant_attribute_bytes() {
    assert_eq!(
        floats(&attribute_bytes(&Value::Vec4([1.0, 0.0, 0.0, 1.0])).unwrap()),
        vec![1.0, 0.0, 0.0, 1.0]
    );
    assert!(attribute_bytes(&ParamType::Mat4.default_value()).is_none());
}

#[test]
fn storage_buffers_are_rejected() {
    let src = r#"
@group(0) @binding(0) var<storage, read> data: array<f32>;
@vertex
fn vs(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(data[i]);
}
@fragment
fn fs() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
    let err = reflect("storage", src).unwrap_err();
    assert!(matches!(err, ShaderError::UnsupportedResource { ref name, .. } if name == "data"));
}
