use super::{AssetError, MeshData, RawNode, SourceHandle};
use fbxcel::low::v7400::AttributeValue;
use fbxcel::tree::any::AnyTree;
use fbxcel::tree::v7400::NodeHandle;
use glam::{EulerRot, Mat4, Quat, Vec3};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

pub(super) fn load(source: &SourceHandle) -> Result<RawNode, AssetError> {
    let tree = AnyTree::from_seekable_reader(Cursor::new(source.bytes()))
        .map_err(|err| classify_parse_error(source, err.to_string()))?;

    let (version, tree) = match tree {
        AnyTree::V7400(version, tree, _footer) => (version, tree),
        _ => {
            return Err(classify_parse_error(
                source,
                "unsupported FBX version: tree layout not recognized".to_string(),
            ))
        }
    };
    log::debug!("FBX '{}': version {:?}", source.name(), version);

    let graph = ObjectGraph::collect(&tree.root());
    log::debug!(
        "FBX '{}': {} models, {} mesh geometries, {} other geometries skipped",
        source.name(),
        graph.models.len(),
        graph.geometries.len(),
        graph.skipped
    );
    let root = graph.into_root(source.name());
    log::debug!("FBX '{}': {} vertices", source.name(), root.vertex_count());
    Ok(root)
}

/// The parser only reports version problems through its error text, so the
/// message decides between the two error kinds.
fn classify_parse_error(source: &SourceHandle, message: String) -> AssetError {
    if message.to_ascii_lowercase().contains("version") {
        AssetError::UnsupportedVersion {
            file: source.name(),
            message,
        }
    } else {
        AssetError::ParseFailure {
            file: source.name(),
            format: "FBX",
            message,
        }
    }
}

struct ModelEntry {
    id: i64,
    name: Option<String>,
    transform: Mat4,
}

struct GeometryEntry {
    id: Option<i64>,
    name: Option<String>,
    mesh: MeshData,
}

/// `Objects` and `Connections` flattened out of the document tree.
struct ObjectGraph {
    models: Vec<ModelEntry>,
    geometries: Vec<GeometryEntry>,
    /// `C: "OO", child, parent` links in document order.
    links: Vec<(i64, i64)>,
    skipped: usize,
}

impl ObjectGraph {
    fn collect(document: &NodeHandle<'_>) -> Self {
        let mut graph = ObjectGraph {
            models: Vec::new(),
            geometries: Vec::new(),
            links: Vec::new(),
            skipped: 0,
        };
        for objects in document.children_by_name("Objects") {
            for model in objects.children_by_name("Model") {
                let Some(id) = object_id(&model) else {
                    continue;
                };
                graph.models.push(ModelEntry {
                    id,
                    name: object_name(&model),
                    transform: model_transform(&model),
                });
            }
            for geometry in objects.children_by_name("Geometry") {
                // Blend shape targets store per-vertex deltas, not positions.
                if object_class(&geometry) != Some("Mesh") {
                    graph.skipped += 1;
                    continue;
                }
                if let Some(mesh) = load_vertices(&geometry) {
                    graph.geometries.push(GeometryEntry {
                        id: object_id(&geometry),
                        name: object_name(&geometry),
                        mesh,
                    });
                }
            }
        }
        for connections in document.children_by_name("Connections") {
            for link in connections.children_by_name("C") {
                if let [AttributeValue::String(kind), AttributeValue::I64(child), AttributeValue::I64(parent), ..] =
                    link.attributes()
                {
                    if kind == "OO" {
                        graph.links.push((*child, *parent));
                    }
                }
            }
        }
        graph
    }

    /// Rebuild the model hierarchy under one root. Geometry attached to a
    /// model inherits its transform chain; unattached geometry sits directly
    /// under the root.
    fn into_root(self, name: String) -> RawNode {
        let model_ids: HashSet<i64> = self.models.iter().map(|model| model.id).collect();

        let mut parent_of: HashMap<i64, i64> = HashMap::new();
        let mut owners: HashMap<i64, Vec<i64>> = HashMap::new();
        for &(child, parent) in &self.links {
            if !model_ids.contains(&parent) {
                continue;
            }
            if model_ids.contains(&child) {
                if child != parent {
                    parent_of.entry(child).or_insert(parent);
                }
            } else {
                owners.entry(child).or_default().push(parent);
            }
        }

        let mut root = RawNode::new(Some(name));
        let mut meshes: HashMap<i64, Vec<MeshData>> = HashMap::new();
        for geometry in self.geometries {
            match geometry.id.and_then(|id| owners.get(&id)) {
                Some(models) => {
                    for model in models {
                        meshes.entry(*model).or_default().push(geometry.mesh.clone());
                    }
                }
                None => {
                    let mut node = RawNode::new(geometry.name);
                    node.meshes.push(geometry.mesh);
                    root.children.push(node);
                }
            }
        }

        let mut children_of: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, model) in self.models.iter().enumerate() {
            if let Some(parent) = parent_of.get(&model.id) {
                children_of.entry(*parent).or_default().push(index);
            }
        }
        // A model with no model parent hangs off the scene root. Parent links
        // form a forest over ids, so the walk below always terminates.
        for (index, model) in self.models.iter().enumerate() {
            if !parent_of.contains_key(&model.id) {
                let node = build_model(index, &self.models, &children_of, &mut meshes);
                root.children.push(node);
            }
        }
        root
    }
}

fn build_model(
    index: usize,
    models: &[ModelEntry],
    children_of: &HashMap<i64, Vec<usize>>,
    meshes: &mut HashMap<i64, Vec<MeshData>>,
) -> RawNode {
    let model = &models[index];
    let mut node = RawNode::new(model.name.clone());
    node.transform = model.transform;
    node.meshes = meshes.remove(&model.id).unwrap_or_default();
    if let Some(children) = children_of.get(&model.id) {
        for &child in children {
            node.children.push(build_model(child, models, children_of, meshes));
        }
    }
    node
}

fn object_id(object: &NodeHandle<'_>) -> Option<i64> {
    match object.attributes().first()? {
        AttributeValue::I64(id) => Some(*id),
        _ => None,
    }
}

/// Object names are stored as "Name\x00\x01Class"; keep the leading part.
fn object_name(object: &NodeHandle<'_>) -> Option<String> {
    object.attributes().iter().find_map(|attr| match attr {
        AttributeValue::String(name) => name
            .split('\u{0}')
            .next()
            .filter(|part| !part.is_empty())
            .map(str::to_string),
        _ => None,
    })
}

fn object_class<'a>(object: &'a NodeHandle<'_>) -> Option<&'a str> {
    match object.attributes().get(2)? {
        AttributeValue::String(class) => Some(class.as_str()),
        _ => None,
    }
}

fn load_vertices(geometry: &NodeHandle<'_>) -> Option<MeshData> {
    let vertices = geometry.children_by_name("Vertices").next()?;
    let positions = match vertices.attributes().first()? {
        AttributeValue::ArrF64(values) => triplets(values.iter().map(|v| *v as f32)),
        AttributeValue::ArrF32(values) => triplets(values.iter().copied()),
        _ => return None,
    };
    Some(MeshData { positions })
}

fn triplets(values: impl Iterator<Item = f32>) -> Vec<Vec3> {
    let flat: Vec<f32> = values.collect();
    flat.chunks_exact(3)
        .map(|chunk| Vec3::new(chunk[0], chunk[1], chunk[2]))
        .collect()
}

/// Local matrix of a `Model` from its `Properties70` block:
/// `T * PreRotation * Rotation * S`. Rotations are XYZ euler angles in degrees.
/// Pivots and offsets are not applied.
fn model_transform(model: &NodeHandle<'_>) -> Mat4 {
    let mut translation = Vec3::ZERO;
    let mut pre_rotation = Vec3::ZERO;
    let mut rotation = Vec3::ZERO;
    let mut scaling = Vec3::ONE;
    for properties in model.children_by_name("Properties70") {
        for property in properties.children_by_name("P") {
            let attributes = property.attributes();
            let (Some(AttributeValue::String(name)), Some(value)) =
                (attributes.first(), vector_property(attributes))
            else {
                continue;
            };
            match name.as_str() {
                "Lcl Translation" => translation = value,
                "Lcl Rotation" => rotation = value,
                "Lcl Scaling" => scaling = value,
                "PreRotation" => pre_rotation = value,
                _ => {}
            }
        }
    }
    Mat4::from_translation(translation)
        * Mat4::from_quat(euler_xyz_degrees(pre_rotation))
        * Mat4::from_quat(euler_xyz_degrees(rotation))
        * Mat4::from_scale(scaling)
}

/// `P: name, type, label, flags, x, y, z`
fn vector_property(attributes: &[AttributeValue]) -> Option<Vec3> {
    let [_, _, _, _, x, y, z, ..] = attributes else {
        return None;
    };
    Some(Vec3::new(number(x)?, number(y)?, number(z)?))
}

fn number(value: &AttributeValue) -> Option<f32> {
    match value {
        AttributeValue::F64(v) => Some(*v as f32),
        AttributeValue::F32(v) => Some(*v),
        AttributeValue::I32(v) => Some(*v as f32),
        AttributeValue::I64(v) => Some(*v as f32),
        _ => None,
    }
}

/// X is applied first, then Y, then Z.
fn euler_xyz_degrees(angles: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::ZYX,
        angles.z.to_radians(),
        angles.y.to_radians(),
        angles.x.to_radians(),
    )
}
