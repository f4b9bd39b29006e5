use super::{compose_transform_matrix, NormalizedNode, ReferenceMetrics};
use crate::assets::{SourceFormat, SourceHandle};

/// Identifier of a placed asset. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct AssetId(u64);

impl AssetId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformField {
    Position,
    Scale,
    Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// User-editable transform parameters - matches the panel sliders.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TransformData {
    pub position: [f32; 3],
    pub rotation_deg: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation_deg: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl TransformData {
    fn field_mut(&mut self, field: TransformField) -> &mut [f32; 3] {
        match field {
            TransformField::Position => &mut self.position,
            TransformField::Scale => &mut self.scale,
            TransformField::Rotation => &mut self.rotation_deg,
        }
    }
}

/// One imported instance in the scene.
#[derive(Debug, Clone)]
pub struct PlacedAsset {
    id: AssetId,
    name: String,
    format: SourceFormat,
    source: SourceHandle,
    node: NormalizedNode,
    reference: ReferenceMetrics,
    pub transform: TransformData,
}

impl PlacedAsset {
    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn node(&self) -> &NormalizedNode {
        &self.node
    }

    pub fn reference(&self) -> &ReferenceMetrics {
        &self.reference
    }

    /// Column-major placement matrix, recomputed from the stored metrics.
    pub fn final_transform(&self) -> [f32; 16] {
        compose_transform_matrix(
            &self.reference,
            self.transform.position,
            self.transform.rotation_deg,
            self.transform.scale,
        )
    }
}

/// What the renderer draws for one placed asset.
#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'a> {
    pub id: AssetId,
    pub node: &'a NormalizedNode,
    pub transform: [f32; 16],
}

/// Everything a successful import hands to the registry.
#[derive(Debug, Clone)]
pub struct NewPlacement {
    pub name: String,
    pub format: SourceFormat,
    pub source: SourceHandle,
    pub node: NormalizedNode,
    pub reference: ReferenceMetrics,
}

#[derive(Debug)]
pub struct PlacementRegistry {
    assets: Vec<PlacedAsset>,
    next_id: u64,
    selected: Option<AssetId>,
}

impl Default for PlacementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementRegistry {
    pub fn new() -> Self {
        Self {
            assets: Vec::new(),
            next_id: 1,
            selected: None,
        }
    }

    pub fn assets(&self) -> &[PlacedAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: AssetId) -> Option<&PlacedAsset> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    pub fn selected(&self) -> Option<AssetId> {
        self.selected
    }

    pub fn selected_asset(&self) -> Option<&PlacedAsset> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Append a new placement and select it.
    pub fn add(&mut self, placement: NewPlacement) -> AssetId {
        let id = AssetId(self.next_id);
        self.next_id += 1;
        self.assets.push(PlacedAsset {
            id,
            name: placement.name,
            format: placement.format,
            source: placement.source,
            node: placement.node,
            reference: placement.reference,
            transform: TransformData::default(),
        });
        self.selected = Some(id);
        id
    }

    /// Select `id`, or clear the selection when `id` is `None` or unknown.
    pub fn select(&mut self, id: Option<AssetId>) {
        self.selected = id.filter(|id| self.get(*id).is_some());
    }

    /// Set one axis of one transform field on the selected asset.
    ///
    /// Returns false (and changes nothing) when `id` is not the selected
    /// asset or `value` is not finite.
    pub fn update_transform(
        &mut self,
        id: AssetId,
        field: TransformField,
        axis: Axis,
        value: f32,
    ) -> bool {
        if self.selected != Some(id) || !value.is_finite() {
            return false;
        }
        let Some(asset) = self.assets.iter_mut().find(|asset| asset.id == id) else {
            return false;
        };
        asset.transform.field_mut(field)[axis.index()] = value;
        true
    }

    pub fn remove(&mut self, id: AssetId) -> Option<PlacedAsset> {
        let index = self.assets.iter().position(|asset| asset.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.assets.remove(index))
    }

    pub fn render_items(&self) -> Vec<RenderItem<'_>> {
        self.assets
            .iter()
            .map(|asset| RenderItem {
                id: asset.id,
                node: &asset.node,
                transform: asset.final_transform(),
            })
            .collect()
    }
}
