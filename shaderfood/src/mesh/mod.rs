//! Indexed triangle meshes and the file formats they come from.
//!
//! Every loader produces a [`Scene`]: an ordered set of named [`Model`]s,
//! each holding float attribute arrays (`pos`, `normal`, `uv`, `color`)
//! and an index array.  [`Model::params`] turns one into draw parameters
//! with the default material filled in.

use crate::buffers::{IndexData, VertexData};
use crate::error::MeshError;
use crate::params::{default_material, Params};
use std::collections::BTreeMap;

pub mod bin;
pub mod obj;
pub mod ply;

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub name: String,
    pub attributes: BTreeMap<String, VertexData>,
    pub indices: IndexData,
}

impl Model {
    pub fn new(name: impl Into<String>, indices: IndexData) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            indices,
        }
    }
    pub fn with_attribute(mut self, name: impl Into<String>, data: impl Into<VertexData>) -> Self {
        self.attributes.insert(name.into(), data.into());
        self
    }
    pub fn attribute(&self, name: &str) -> Option<&VertexData> {
        self.attributes.get(name)
    }
    /// Number of vertices, judged by the `pos` attribute.
    pub fn vertex_count(&self) -> usize {
        self.attribute("pos").map_or(0, |p| p.len() / 3)
    }
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
    /// Draw parameters for this model: its attributes, `indices`, and the
    /// default material.  The vertex and index data are shared, not copied,
    /// so GPU buffers made for them are reused across calls.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for (name, data) in self.attributes.iter() {
            params.set(name.as_str(), data.clone());
        }
        params.set("indices", self.indices.clone());
        default_material(&mut params);
        params
    }
}

/// Models in load order, keyed by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    models: Vec<Model>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }
    /// Adds `model`, replacing (in place) any model with the same name.
    pub fn insert(&mut self, model: Model) {
        match self.models.iter_mut().find(|m| m.name == model.name) {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
    }
    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }
    pub fn len(&self) -> usize {
        self.models.len()
    }
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
    pub fn into_params(self) -> Vec<(String, Params)> {
        self.models
            .into_iter()
            .map(|m| {
                let params = m.params();
                (m.name, params)
            })
            .collect()
    }
}

impl IntoIterator for Scene {
    type Item = Model;
    type IntoIter = std::vec::IntoIter<Model>;
    fn into_iter(self) -> Self::IntoIter {
        self.models.into_iter()
    }
}

/// Which parser handles a file, judged by its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Obj,
    Bin,
    Ply,
}

impl Format {
    pub fn from_path(path: &str) -> Option<Self> {
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        // ignore any query string on a URL
        let file = file.split(['?', '#']).next().unwrap_or(file);
        let (_, ext) = file.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "obj" => Some(Self::Obj),
            "bin" | "msh" => Some(Self::Bin),
            "ply" => Some(Self::Ply),
            _ => None,
        }
    }
    pub fn parse(self, bytes: &[u8]) -> Result<Scene, MeshError> {
        match self {
            Self::Obj => obj::parse_bytes(bytes),
            Self::Bin => bin::read(bytes),
            Self::Ply => ply::parse(bytes),
        }
    }
}

/// Load a mesh file of any supported format.
pub async fn load(url: &str) -> Result<Scene, MeshError> {
    let format = Format::from_path(url).ok_or_else(|| MeshError::UnknownFormat(url.to_string()))?;
    let bytes = crate::assets::load_bytes(url).await?;
    let scene = format.parse(&bytes)?;
    log::debug!("loaded {} models from {url}", scene.len());
    Ok(scene)
}
