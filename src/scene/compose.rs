use super::ReferenceMetrics;
use glam::{EulerRot, Mat4, Quat, Vec3};

/// Final placement transform for a normalized asset.
///
/// Scaling grows the asset away from its anchor corner instead of from its
/// local origin: the translation is pulled back by `anchor * (scale - 1)` so
/// the local point `anchor` lands on `position + anchor` for every scale.
/// Rotation is XYZ Euler in degrees.
pub fn compose(
    reference: &ReferenceMetrics,
    position: [f32; 3],
    scale: [f32; 3],
    rotation_deg: [f32; 3],
) -> Mat4 {
    let position = Vec3::from_array(position);
    let scale = Vec3::from_array(scale);
    let adjusted = position - reference.anchor() * (scale - Vec3::ONE);

    let rotation = Quat::from_euler(
        EulerRot::XYZ,
        rotation_deg[0].to_radians(),
        rotation_deg[1].to_radians(),
        rotation_deg[2].to_radians(),
    );
    Mat4::from_scale_rotation_translation(scale, rotation, adjusted)
}

/// Column-major matrix handed to the renderer.
pub fn compose_transform_matrix(
    reference: &ReferenceMetrics,
    position: [f32; 3],
    rotation_deg: [f32; 3],
    scale: [f32; 3],
) -> [f32; 16] {
    compose(reference, position, scale, rotation_deg).to_cols_array()
}
