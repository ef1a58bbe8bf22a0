use shaderfood::mesh::{self, bin, Format};
use shaderfood::{IndexData, MeshError, Value};

const CUBE_OBJ: &str = "\
# two objects sharing one vertex pool
o top
v -1 1 -1
v 1 1 -1
v 1 1 1
v -1 1 1
vn 0 1 0
f 1//1 2//1 3//1 4//1
o bottom
v -1 -1 -1
v 1 -1 -1
v 1 -1 1
v -1 -1 1
vn 0 -1 0
f 5//2 8//2 7//2 6//2
";

fn temp_file(name: &str, contents: &[u8]) -> String {
    let path = std::env::temp_dir().join(format!("shaderfood-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn obj_file_loads_by_extension() {
    let path = temp_file("cube.obj", CUBE_OBJ.as_bytes());
    let scene = pollster::block_on(mesh::load(&path)).unwrap();
    assert_eq!(scene.names().collect::<Vec<_>>(), vec!["top", "bottom"]);
    for model in scene.iter() {
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.triangle_count(), 2);
    }
    let bottom = scene.get("bottom").unwrap();
    assert_eq!(&bottom.attribute("normal").unwrap().as_slice()[..3], &[0.0, -1.0, 0.0]);
}

#[test]
fn scene_params_are_ready_to_draw() {
    let scene = mesh::obj::parse(CUBE_OBJ).unwrap();
    let params = scene.into_params();
    assert_eq!(params.len(), 2);
    let (name, top) = &params[0];
    assert_eq!(name, "top");
    assert!(top.vertices("pos").is_some());
    assert!(top.vertices("normal").is_some());
    assert_eq!(top.indices().map(IndexData::len), Some(6));
    assert_eq!(top.get("alpha"), Some(&Value::Float(1.0)));
    assert_eq!(top.get("light_pos"), Some(&Value::Vec3([3.0, 0.0, 0.0])));
}

#[test]
fn obj_converts_to_bin_and_back() {
    let scene = mesh::obj::parse(CUBE_OBJ).unwrap();
    let path = temp_file("cube.msh", &bin::write_scene(&scene));
    let back = pollster::block_on(mesh::load(&path)).unwrap();
    assert_eq!(back, scene);
}

#[test]
fn ply_through_format_dispatch() {
    let ply = "ply\nformat ascii 1.0\nelement vertex 3\n\
property double x\nproperty double y\nproperty double z\n\
element face 1\nproperty list uchar uint vertex_index\nend_header\n\
0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
    let scene = Format::Ply.parse(ply.as_bytes()).unwrap();
    assert_eq!(scene.len(), 1);
    let model = scene.iter().next().unwrap();
    assert_eq!(model.indices.to_u32(), vec![0, 1, 2]);
}

#[test]
fn unknown_extension_and_missing_file() {
    let err = pollster::block_on(mesh::load("scene.fbx")).unwrap_err();
    assert!(matches!(err, MeshError::UnknownFormat(_)));
    let err = pollster::block_on(mesh::load("no/such/mesh.obj")).unwrap_err();
    assert!(matches!(err, MeshError::Asset(_)), "{err}");
}
