use super::{AssetError, MeshData, RawNode, SourceFormat, SourceHandle};
use glam::{Mat4, Vec3};

pub(super) fn load(source: &SourceHandle, format: SourceFormat) -> Result<RawNode, AssetError> {
    let parse_error = |err: ::gltf::Error| AssetError::ParseFailure {
        file: source.name(),
        format: format.label(),
        message: err.to_string(),
    };

    // Gltf::from_slice sniffs the GLB magic itself, so both tags share this path.
    let ::gltf::Gltf { document, blob } =
        ::gltf::Gltf::from_slice(source.bytes()).map_err(parse_error)?;
    let buffers =
        ::gltf::import_buffers(&document, source.base_dir(), blob).map_err(parse_error)?;

    let mut root = RawNode::new(Some(source.name()));
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            log::debug!("glTF '{}': walking scene {:?}", source.name(), scene.name());
            for node in scene.nodes() {
                root.children.push(load_node(&node, &buffers));
            }
        }
        None => {
            // Scene-less documents still carry meshes; place them untransformed.
            for mesh in document.meshes() {
                root.meshes.extend(load_mesh(&mesh, &buffers));
            }
        }
    }

    log::debug!(
        "glTF '{}': {} meshes, {} vertices",
        source.name(),
        document.meshes().count(),
        root.vertex_count()
    );
    Ok(root)
}

fn load_node(node: &::gltf::Node, buffers: &[::gltf::buffer::Data]) -> RawNode {
    let mut raw = RawNode::new(node.name().map(str::to_string));
    raw.transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        raw.meshes.extend(load_mesh(&mesh, buffers));
    }
    for child in node.children() {
        raw.children.push(load_node(&child, buffers));
    }
    raw
}

fn load_mesh(mesh: &::gltf::Mesh, buffers: &[::gltf::buffer::Data]) -> Vec<MeshData> {
    mesh.primitives()
        .filter_map(|primitive| {
            let reader = primitive
                .reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let positions = reader.read_positions()?;
            Some(MeshData {
                positions: positions.map(Vec3::from_array).collect(),
            })
        })
        .collect()
}
