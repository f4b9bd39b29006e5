mod bounds;
mod compose;
mod normalize;
pub mod registry;

pub use bounds::Aabb;
pub use compose::{compose, compose_transform_matrix};
pub use normalize::{normalize, NormalizeSettings, NormalizedNode, ReferenceMetrics};
pub use registry::{
    AssetId, Axis, NewPlacement, PlacedAsset, PlacementRegistry, RenderItem, TransformData,
    TransformField,
};
