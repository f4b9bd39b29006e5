use crate::render::CameraViewController;
use crate::scene::{AssetId, PlacementRegistry, ReferenceMetrics, TransformData};

/// Serializable view of the stage, printed by the command line front end.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StageSnapshot {
    pub assets: Vec<PlacementSnapshot>,
    pub selected: Option<AssetId>,
    pub camera: CameraSnapshot,
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PlacementSnapshot {
    pub id: AssetId,
    pub name: String,
    pub format: &'static str,
    pub sha256: String,
    pub transform: TransformData,
    pub reference: ReferenceMetrics,
    /// Column-major.
    pub final_transform: [f32; 16],
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CameraSnapshot {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
}

impl StageSnapshot {
    pub fn capture(
        registry: &PlacementRegistry,
        camera: &CameraViewController,
        status: &str,
    ) -> Self {
        let assets = registry
            .assets()
            .iter()
            .map(|asset| PlacementSnapshot {
                id: asset.id(),
                name: asset.name().to_string(),
                format: asset.format().label(),
                sha256: asset.source().digest().to_string(),
                transform: asset.transform,
                reference: *asset.reference(),
                final_transform: asset.final_transform(),
            })
            .collect();
        Self {
            assets,
            selected: registry.selected(),
            camera: CameraSnapshot {
                position: camera.position().to_array(),
                target: camera.target().to_array(),
                up: camera.up().to_array(),
            },
            status: status.to_string(),
        }
    }
}
