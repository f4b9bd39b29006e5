use crate::scene::PlacementRegistry;

/// Text state backing the asset panel: per-asset readouts and the last status
/// message. Widgets are drawn elsewhere.
pub struct UiState {
    asset_summary: String,
    status: String,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            asset_summary: String::new(),
            status: String::new(),
        }
    }

    pub fn update(&mut self, registry: &PlacementRegistry) {
        let selected = registry.selected();
        let mut summary = String::new();
        for asset in registry.assets() {
            let marker = if Some(asset.id()) == selected { '>' } else { ' ' };
            let t = &asset.transform;
            summary.push_str(&format!(
                "{} {} {} [{}] pos {:.2}, {:.2}, {:.2} | scale {:.2}, {:.2}, {:.2} | rot {:.1}, {:.1}, {:.1}\n",
                marker,
                asset.id(),
                asset.name(),
                asset.format().label(),
                t.position[0],
                t.position[1],
                t.position[2],
                t.scale[0],
                t.scale[1],
                t.scale[2],
                t.rotation_deg[0],
                t.rotation_deg[1],
                t.rotation_deg[2],
            ));
        }
        summary.push_str(&format!("Placed assets: {}", registry.len()));
        if !self.status.is_empty() {
            summary.push('\n');
            summary.push_str(&self.status);
        }
        self.asset_summary = summary;
    }

    pub fn summary(&self) -> &str {
        &self.asset_summary
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: String) {
        self.status = status;
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
