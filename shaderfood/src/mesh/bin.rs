//! A compact little-endian chunked mesh format.
//!
//! A chunk is a NUL-terminated tag (padded to 4 bytes), a `u32` length
//! that counts itself plus the payload, then the payload; the next chunk
//! starts at the following 4-byte boundary.  Tags that start with an
//! uppercase letter are containers holding more chunks.
//!
//! ```text
//! MSH          one mesh
//!   msh name   its name
//!   ix2 / ix4  u16 / u32 indices
//!   atn name   names the next attribute
//!   a3f        f32 data for it
//! ```

use super::{Model, Scene};
use crate::buffers::IndexData;
use crate::error::MeshError;
use std::collections::BTreeMap;

#[derive(Default)]
struct MeshBuilder {
    name: Option<String>,
    indices: Option<IndexData>,
    attributes: BTreeMap<String, Vec<f32>>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    attr_name: Option<String>,
    mesh: Option<MeshBuilder>,
    unnamed: usize,
    scene: Scene,
}

/// Containers nested deeper than this are rejected.
const MAX_DEPTH: usize = 64;

fn align4(n: usize) -> usize {
    n.next_multiple_of(4)
}

impl<'a> Reader<'a> {
    fn read_str(&mut self, limit: usize) -> Result<String, MeshError> {
        let start = self.pos;
        let rest = self.bytes.get(start..limit).unwrap_or_default();
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| MeshError::bin(start, "truncated string"))?;
        self.pos = align4(start + nul + 1);
        Ok(String::from_utf8_lossy(&rest[..nul]).into_owned())
    }

    fn read_u32(&mut self, limit: usize) -> Result<u32, MeshError> {
        let at = self.pos;
        let bytes = self
            .bytes
            .get(at..at + 4)
            .filter(|_| at + 4 <= limit)
            .ok_or_else(|| MeshError::bin(at, "truncated chunk header"))?;
        self.pos += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_chunk(&mut self, limit: usize, depth: usize) -> Result<(), MeshError> {
        if depth > MAX_DEPTH {
            return Err(MeshError::bin(self.pos, "chunks nested too deeply"));
        }
        let tag = self.read_str(limit)?;
        let len_at = self.pos;
        let len = self.read_u32(limit)? as usize;
        if len < 4 {
            return Err(MeshError::bin(len_at, format!("chunk {tag:?} has length {len}")));
        }
        let end = len_at + len;
        if end > limit {
            return Err(MeshError::bin(
                len_at,
                format!("chunk {tag:?} ends at {end}, past its parent's end {limit}"),
            ));
        }

        if tag.as_bytes().first().map_or(true, |&c| c < b'a') {
            if tag == "MSH" {
                self.mesh = Some(MeshBuilder::default());
            }
            while self.pos < end {
                self.read_chunk(end, depth + 1)?;
            }
            if tag == "MSH" {
                self.finish_mesh();
            }
        } else {
            let bytes = self.bytes;
            let payload = &bytes[self.pos..end];
            match tag.as_str() {
                "msh" => {
                    let name = self.read_str(end)?;
                    if let Some(mesh) = self.mesh.as_mut() {
                        mesh.name = Some(name);
                    }
                }
                "ix2" => {
                    let ix: Vec<u16> = payload
                        .chunks_exact(2)
                        .map(|c| u16::from_le_bytes([c[0], c[1]]))
                        .collect();
                    if let Some(mesh) = self.mesh.as_mut() {
                        mesh.indices = Some(ix.into());
                    }
                }
                "ix4" => {
                    let ix: Vec<u32> = payload
                        .chunks_exact(4)
                        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                        .collect();
                    if let Some(mesh) = self.mesh.as_mut() {
                        mesh.indices = Some(IndexData::from_u32(ix));
                    }
                }
                "atn" => self.attr_name = Some(self.read_str(end)?),
                "a3f" => {
                    let name = self
                        .attr_name
                        .clone()
                        .ok_or_else(|| MeshError::bin(len_at, "a3f chunk without a preceding atn"))?;
                    let data: Vec<f32> = payload
                        .chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                        .collect();
                    if let Some(mesh) = self.mesh.as_mut() {
                        mesh.attributes.insert(name, data);
                    }
                }
                other => log::trace!("bin offset {len_at}: skipping chunk {other:?}"),
            }
        }
        self.pos = align4(end);
        Ok(())
    }

    fn finish_mesh(&mut self) {
        let Some(mesh) = self.mesh.take() else {
            return;
        };
        let name = mesh.name.unwrap_or_else(|| {
            self.unnamed += 1;
            format!("unnamed.{}", self.unnamed - 1)
        });
        let vertex_count = mesh.attributes.get("pos").map_or(0, |p| p.len() / 3);
        // without an index chunk, draw the vertices in order
        let indices = mesh
            .indices
            .unwrap_or_else(|| IndexData::from_u32((0..vertex_count as u32).collect()));
        let mut model = Model::new(name, indices);
        for (attr, data) in mesh.attributes {
            model = model.with_attribute(attr, data);
        }
        log::debug!(
            "bin mesh {}: {} vertices, {} triangles",
            model.name,
            model.vertex_count(),
            model.triangle_count()
        );
        self.scene.insert(model);
    }
}

/// Reads every top-level chunk in `bytes`.
pub fn read(bytes: &[u8]) -> Result<Scene, MeshError> {
    let mut reader = Reader {
        bytes,
        pos: 0,
        attr_name: None,
        mesh: None,
        unnamed: 0,
        scene: Scene::new(),
    };
    while reader.pos < bytes.len() {
        // trailing zero padding
        if bytes[reader.pos..].iter().all(|&b| b == 0) {
            break;
        }
        reader.read_chunk(bytes.len(), 0)?;
    }
    Ok(reader.scene)
}

/// Load and parse a binary mesh file.
pub async fn load(url: &str) -> Result<Scene, MeshError> {
    let bytes = crate::assets::load_bytes(url).await?;
    read(&bytes)
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out.resize(align4(out.len()), 0);
}

fn write_chunk(out: &mut Vec<u8>, tag: &str, payload: impl FnOnce(&mut Vec<u8>)) {
    write_str(out, tag);
    let len_at = out.len();
    out.extend_from_slice(&[0; 4]);
    payload(out);
    let len = (out.len() - len_at) as u32;
    out[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
    out.resize(align4(out.len()), 0);
}

/// Encodes a scene so that [`read`] gives it back.
pub fn write_scene(scene: &Scene) -> Vec<u8> {
    let mut out = vec![];
    for model in scene.iter() {
        write_chunk(&mut out, "MSH", |out| {
            write_chunk(out, "msh", |out| write_str(out, &model.name));
            match &model.indices {
                IndexData::U16(ix) => write_chunk(out, "ix2", |out| {
                    out.extend(ix.iter().flat_map(|i| i.to_le_bytes()))
                }),
                IndexData::U32(ix) => write_chunk(out, "ix4", |out| {
                    out.extend(ix.iter().flat_map(|i| i.to_le_bytes()))
                }),
            }
            for (name, data) in model.attributes.iter() {
                write_chunk(out, "atn", |out| write_str(out, name));
                write_chunk(out, "a3f", |out| out.extend_from_slice(data.as_bytes()));
            }
        });
    }
    out
}
