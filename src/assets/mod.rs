mod fbx_loader;
mod gltf_loader;
pub mod import;

#[cfg(test)]
pub(crate) use gltf_loader::fixtures;

use crate::scene::Aabb;
use glam::{Mat4, Vec3};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File formats the import surface recognizes.
///
/// `Ifc` is recognized so it can be rejected with a specific message; it is
/// never dispatched to a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SourceFormat {
    Gltf,
    Glb,
    Fbx,
    Ifc,
}

impl SourceFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "gltf" => Some(Self::Gltf),
            "glb" => Some(Self::Glb),
            "fbx" => Some(Self::Fbx),
            "ifc" => Some(Self::Ifc),
            _ => None,
        }
    }

    /// Resolve the format tag for a path, rejecting anything that cannot be
    /// dispatched to a parser.
    pub fn for_path(path: &Path) -> Result<Self, AssetError> {
        let file = display_name(path);
        let format = path
            .extension()
            .and_then(|value| value.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| AssetError::UnsupportedFormat {
                file: file.clone(),
                reason: "only .gltf, .glb and .fbx files can be imported".to_string(),
            })?;
        if format == Self::Ifc {
            return Err(AssetError::UnsupportedFormat {
                file,
                reason: "IFC import is disabled".to_string(),
            });
        }
        Ok(format)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Gltf => "glTF",
            Self::Glb => "GLB",
            Self::Fbx => "FBX",
            Self::Ifc => "IFC",
        }
    }
}

/// Broad error classes the UI layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedFormat,
    ParseFailure,
    UnsupportedVersion,
    DegenerateGeometry,
    Unreadable,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("unsupported format for {file}: {reason}")]
    UnsupportedFormat { file: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format} file {file}: {message}")]
    ParseFailure {
        file: String,
        format: &'static str,
        message: String,
    },
    #[error("unsupported FBX version in {file}: {message}")]
    UnsupportedVersion { file: String, message: String },
    #[error("degenerate geometry in {file}: largest extent is {max_extent}")]
    DegenerateGeometry { file: String, max_extent: f32 },
}

impl AssetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Read { .. } => ErrorKind::Unreadable,
            Self::ParseFailure { .. } => ErrorKind::ParseFailure,
            Self::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Self::DegenerateGeometry { .. } => ErrorKind::DegenerateGeometry,
        }
    }

    /// Message suitable for the status line of the import panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedFormat { file, reason } => {
                format!("Cannot import '{}': {}.", file, reason)
            }
            Self::Read { path, .. } => format!("Cannot read '{}'.", path),
            Self::ParseFailure { file, format, .. } => {
                format!("'{}' is not a valid {} file.", file, format)
            }
            Self::UnsupportedVersion { file, .. } => format!(
                "'{}' uses an FBX version that cannot be loaded. Re-export it as binary FBX 7.x (FBX 2011 or newer).",
                file
            ),
            Self::DegenerateGeometry { file, .. } => {
                format!("'{}' has no measurable geometry.", file)
            }
        }
    }
}

/// Loaded byte source for one import. Cheap to clone; the bytes are shared.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    path: PathBuf,
    bytes: Arc<[u8]>,
    digest: String,
}

impl SourceHandle {
    pub fn read(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_bytes(path.to_path_buf(), bytes))
    }

    pub fn from_bytes(path: PathBuf, bytes: Vec<u8>) -> Self {
        let digest = format!("{:x}", Sha256::digest(&bytes));
        Self {
            path,
            bytes: bytes.into(),
            digest,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn name(&self) -> String {
        display_name(&self.path)
    }

    /// Directory used to resolve sibling resources such as external glTF buffers.
    pub fn base_dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
}

/// Format-independent node graph produced by the loaders.
#[derive(Debug, Clone)]
pub struct RawNode {
    pub name: Option<String>,
    pub transform: Mat4,
    pub meshes: Vec<MeshData>,
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            transform: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Axis-aligned bounds of all geometry in this node's parent space, or
    /// `None` when the graph has no vertices.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut bounds = None;
        self.accumulate_bounds(Mat4::IDENTITY, &mut bounds);
        bounds
    }

    fn accumulate_bounds(&self, parent: Mat4, bounds: &mut Option<Aabb>) {
        let world = parent * self.transform;
        for mesh in &self.meshes {
            for position in &mesh.positions {
                let point = world.transform_point3(*position);
                match bounds {
                    Some(aabb) => aabb.include(point),
                    None => *bounds = Some(Aabb::from_point(point)),
                }
            }
        }
        for child in &self.children {
            child.accumulate_bounds(world, bounds);
        }
    }

    /// False when any matrix or vertex in the graph holds a NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.transform.is_finite()
            && self
                .meshes
                .iter()
                .all(|mesh| mesh.positions.iter().all(|p| p.is_finite()))
            && self.children.iter().all(RawNode::is_finite)
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes
            .iter()
            .map(|mesh| mesh.positions.len())
            .sum::<usize>()
            + self
                .children
                .iter()
                .map(RawNode::vertex_count)
                .sum::<usize>()
    }
}

/// Parse a byte source into a raw node graph using the parser for `format`.
pub fn load(source: &SourceHandle, format: SourceFormat) -> Result<RawNode, AssetError> {
    match format {
        SourceFormat::Gltf | SourceFormat::Glb => gltf_loader::load(source, format),
        SourceFormat::Fbx => fbx_loader::load(source),
        SourceFormat::Ifc => Err(AssetError::UnsupportedFormat {
            file: source.name(),
            reason: "IFC import is disabled".to_string(),
        }),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("asset")
        .to_string()
}
