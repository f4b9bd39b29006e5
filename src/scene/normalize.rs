//! One-time normalization of a freshly loaded node graph.
//!
//! Every asset is scaled uniformly so that its largest extent matches the
//! configured target, centered horizontally on its own origin, and dropped so
//! its bottom face rests on the ground plane. The anchor offsets recorded here
//! are what the transform composer works against for the rest of the asset's
//! life.

use super::Aabb;
use crate::assets::{AssetError, RawNode};
use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeSettings {
    /// Largest extent every asset is scaled to.
    pub target_extent: f32,
    /// Distance of the ground plane below the world origin.
    pub ground_offset: f32,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            target_extent: 2.0,
            ground_offset: 1.0,
        }
    }
}

/// Bounds and anchor offsets captured right after uniform scaling, before any
/// user transform. Never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ReferenceMetrics {
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub left_x: f32,
    pub bottom_y: f32,
    pub front_z: f32,
}

impl ReferenceMetrics {
    fn from_scaled_bounds(bounds: &Aabb) -> Self {
        Self {
            bounds_min: bounds.min.to_array(),
            bounds_max: bounds.max.to_array(),
            left_x: -bounds.min.x,
            bottom_y: -bounds.min.y,
            front_z: -bounds.min.z,
        }
    }

    pub fn anchor(&self) -> Vec3 {
        Vec3::new(self.left_x, self.bottom_y, self.front_z)
    }
}

/// A node graph whose root transform carries the normalization.
#[derive(Debug, Clone)]
pub struct NormalizedNode {
    pub node: RawNode,
    pub uniform_scale: f32,
    /// Bounds of the node in its local frame after normalization.
    pub bounds: Aabb,
}

impl NormalizedNode {
    pub fn base_transform(&self) -> Mat4 {
        self.node.transform
    }
}

pub fn normalize(
    mut node: RawNode,
    settings: &NormalizeSettings,
) -> Result<(NormalizedNode, ReferenceMetrics), AssetError> {
    let file = node.name.clone().unwrap_or_else(|| "asset".to_string());
    let degenerate = |max_extent: f32| AssetError::DegenerateGeometry {
        file: file.clone(),
        max_extent,
    };

    if !node.is_finite() {
        return Err(degenerate(f32::NAN));
    }
    let native = node.bounds().ok_or_else(|| degenerate(0.0))?;
    let max_dim = native.max_dimension();
    if !native.is_finite() || !max_dim.is_finite() || max_dim <= 0.0 {
        return Err(degenerate(max_dim));
    }

    let uniform_scale = settings.target_extent / max_dim;
    if !uniform_scale.is_finite() || uniform_scale <= 0.0 {
        return Err(degenerate(max_dim));
    }
    node.transform = Mat4::from_scale(Vec3::splat(uniform_scale)) * node.transform;

    let scaled = node.bounds().ok_or_else(|| degenerate(max_dim))?;
    if !scaled.is_finite() {
        return Err(degenerate(max_dim));
    }
    let center = scaled.center();
    let offset = Vec3::new(
        -center.x,
        -scaled.min.y - settings.ground_offset,
        -center.z,
    );
    node.transform = Mat4::from_translation(offset) * node.transform;

    let reference = ReferenceMetrics::from_scaled_bounds(&scaled);
    let bounds = Aabb {
        min: scaled.min + offset,
        max: scaled.max + offset,
    };
    log::debug!(
        "normalized '{}': native max extent {:.4}, uniform scale {:.6}, anchor {:?}",
        file,
        max_dim,
        uniform_scale,
        reference.anchor()
    );

    Ok((
        NormalizedNode {
            node,
            uniform_scale,
            bounds,
        },
        reference,
    ))
}
