//! Error types for every fallible operation in shaderfood.

use crate::reflect::ParamType;

/// Failures while setting up or driving the GPU context.
#[derive(thiserror::Error, Debug)]
pub enum CanvasError {
    #[error("no valid adapter found for GPU requirements")]
    NoUsableAdapter,
    #[error("could not find {0}")]
    ElementNotFound(String),
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Failures while compiling or introspecting a shader program.
#[derive(thiserror::Error, Debug)]
pub enum ShaderError {
    #[error("error compiling shader {label}:\n{message}")]
    Parse { label: String, message: String },
    #[error("error validating shader {label}:\n{message}")]
    Validation { label: String, message: String },
    #[error("shader {label} has no {stage} entry point")]
    MissingEntryPoint { label: String, stage: &'static str },
    #[error("shader {label} binds unsupported resource {name:?}")]
    UnsupportedResource { label: String, name: String },
    #[error("shader {label} attribute {name:?} has an unsupported type")]
    UnsupportedAttribute { label: String, name: String },
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Failures while binding parameters for a draw call.
#[derive(thiserror::Error, Debug)]
pub enum DrawError {
    #[error("parameter {name:?} should be {expected:?} but is {found}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        found: &'static str,
    },
    #[error("parameter \"indices\" must hold index data, found {0}")]
    NotIndices(&'static str),
}

/// Failures while reading a file or URL.
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("{path} is not valid UTF-8")]
    Utf8 { path: String },
}

/// Failures while parsing a mesh file.
#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    #[error("obj: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("bin offset {offset}: {message}")]
    Bin { offset: usize, message: String },
    #[error("ply: {0}")]
    Ply(String),
    #[error("unknown mesh format for {0}")]
    UnknownFormat(String),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl MeshError {
    pub(crate) fn bin(offset: usize, message: impl Into<String>) -> Self {
        Self::Bin {
            offset,
            message: message.into(),
        }
    }
    pub(crate) fn ply(message: impl Into<String>) -> Self {
        Self::Ply(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_errors_name_their_location() {
        assert!(MeshError::from(tobj::LoadError::PositionParseError)
            .to_string()
            .starts_with("obj: "));
        assert_eq!(
            MeshError::bin(64, "truncated chunk").to_string(),
            "bin offset 64: truncated chunk"
        );
    }

    #[test]
    fn shader_parse_error_keeps_label_and_message() {
        let err = ShaderError::Parse {
            label: "phong.wgsl".into(),
            message: "expected ';'".into(),
        };
        let text = err.to_string();
        assert!(text.contains("phong.wgsl"));
        assert!(text.contains("expected ';'"));
    }
}
