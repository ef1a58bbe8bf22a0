//! Wavefront OBJ text files, read with `tobj`. Each object or group becomes
//! one model with `pos`, `uv` and `normal` attributes. Materials are skipped.

use super::{Model, Scene};
use crate::buffers::IndexData;
use crate::error::MeshError;

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// `tobj` names objects without a name of their own like this.
fn is_default_name(name: &str) -> bool {
    matches!(name.trim(), "" | "unnamed" | "unnamed_object")
}

/// Keeps a per-vertex attribute only if every vertex has a value for it.
fn per_vertex(data: Vec<f32>, width: usize, vertices: usize) -> Option<Vec<f32>> {
    if data.is_empty() {
        None
    } else if data.len() == width * vertices {
        Some(data)
    } else {
        log::warn!(
            "obj attribute with {} values does not cover {vertices} vertices; dropping it",
            data.len()
        );
        None
    }
}

fn to_model(index: usize, model: tobj::Model) -> Model {
    let name = if is_default_name(&model.name) {
        format!("unnamed.{index}")
    } else {
        model.name
    };
    let mesh = model.mesh;
    let vertices = mesh.positions.len() / 3;
    let uv = per_vertex(mesh.texcoords, 2, vertices);
    let normal = per_vertex(mesh.normals, 3, vertices);
    let mut out = Model::new(name, IndexData::from_u32(mesh.indices))
        .with_attribute("pos", mesh.positions);
    if let Some(uv) = uv {
        out = out.with_attribute("uv", uv);
    }
    if let Some(normal) = normal {
        out = out.with_attribute("normal", normal);
    }
    log::debug!(
        "obj object {}: {} vertices, {} triangles",
        out.name,
        out.vertex_count(),
        out.triangle_count()
    );
    out
}

/// Parses OBJ bytes into one model per object.
pub fn parse_bytes(bytes: &[u8]) -> Result<Scene, MeshError> {
    let (models, _materials) = tobj::load_obj_buf(
        &mut std::io::BufReader::new(bytes),
        &load_options(),
        |path| {
            log::trace!("obj: skipping material library {}", path.display());
            Err(tobj::LoadError::OpenFileFailed)
        },
    )?;
    let mut scene = Scene::new();
    for (index, model) in models.into_iter().enumerate() {
        if !model.mesh.indices.is_empty() {
            scene.insert(to_model(index, model));
        }
    }
    Ok(scene)
}

/// Parses an OBJ file into one model per object.
pub fn parse(text: &str) -> Result<Scene, MeshError> {
    parse_bytes(text.as_bytes())
}

/// Load and parse an OBJ file.
pub async fn load(url: &str) -> Result<Scene, MeshError> {
    let bytes = crate::assets::load_bytes(url).await?;
    parse_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "# a quad\r\n\
o quad\r\n\
v 0 0 0\r\n\
v 1 0 0\r\n\
v 1 1 0\r\n\
v 0 1 0\r\n\
vt 0 0\n\
vt 1 1\n\
vn 0 0 1\n\
f 1/1/1 2/1/1 3/2/1 4/2/1\n";

    #[test]
    fn quad_is_triangulated() {
        let scene = parse(QUAD).unwrap();
        assert_eq!(scene.len(), 1);
        let quad = scene.get("quad").unwrap();
        assert_eq!(quad.indices.to_u32(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.attribute("normal").unwrap().len(), 12);
        assert_eq!(
            quad.attribute("uv").unwrap().as_slice(),
            &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(quad.indices.format(), wgpu::IndexFormat::Uint16);
    }

    #[test]
    fn shared_corners_are_deduplicated() {
        let scene = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3\nf 3 2 4\n").unwrap();
        let m = scene.get("unnamed.0").unwrap();
        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.indices.to_u32(), vec![0, 1, 2, 2, 1, 3]);
        assert!(m.attribute("uv").is_none());
        assert!(m.attribute("normal").is_none());
    }

    #[test]
    fn relative_and_absolute_corners_share_a_vertex() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\n\
f 1/2 2/1 3/1\n\
f -3/2 -1/1 -2/1\n";
        let m = parse(text).unwrap().get("unnamed.0").unwrap().clone();
        // `-3/2` and `1/2` name the same position and uv
        assert_eq!(m.vertex_count(), 3);
        assert_eq!(m.indices.to_u32(), vec![0, 1, 2, 0, 2, 1]);
        assert_eq!(m.attribute("uv").unwrap().len(), 6);
    }

    #[test]
    fn objects_share_pools_and_count_default_names() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\n\
o first\nf 1 2 3\n\
o\nf -3 -2 -1\n";
        let scene = parse(text).unwrap();
        assert_eq!(
            scene.names().collect::<Vec<_>>(),
            vec!["first", "unnamed.1"]
        );
        assert_eq!(
            scene.get("unnamed.1").unwrap().attribute("pos"),
            scene.get("first").unwrap().attribute("pos")
        );
    }

    #[test]
    fn objects_without_faces_are_dropped() {
        let scene = parse("o only\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no empty\n").unwrap();
        assert_eq!(scene.names().collect::<Vec<_>>(), vec!["only"]);
        // two-corner faces are lines, not polygons
        let scene = parse("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap();
        assert!(scene.is_empty());
    }

    #[test]
    fn malformed_files_are_errors() {
        let err = parse("v 0 0 0\nv 1 x 0\nf 1 1 1\n").unwrap_err();
        assert!(matches!(err, MeshError::Obj(_)), "{err}");
        assert!(err.to_string().starts_with("obj: "));

        let err = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\n\nf 1 2 4\n").unwrap_err();
        assert!(matches!(err, MeshError::Obj(_)), "{err}");

        assert!(parse_bytes(b"v 0 0 0\n\xff\xfe\n").is_err());
    }

    #[test]
    fn unknown_keywords_are_ignored() {
        let text = "mtllib x.mtl\nusemtl red\ns off\nvp 0.5\n\
v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let scene = parse(text).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.get("unnamed.0").unwrap().triangle_count(), 1);
    }
}
