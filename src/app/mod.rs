mod snapshot;

use crate::assets::import::{CompletedImport, ImportQueue, ImportTicket};
use crate::assets::AssetError;
use crate::config::{load_config_from_file, StageConfig};
use crate::render::{CameraView, CameraViewController, ViewRequestSender};
use crate::scene::{AssetId, Axis, PlacementRegistry, RenderItem, TransformField};
use crate::ui::UiState;
use clap::Parser;
pub use snapshot::{CameraSnapshot, PlacementSnapshot, StageSnapshot};

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outcome of one completed import as seen by the event loop.
#[derive(Debug)]
pub enum ImportEvent {
    Placed { ticket: ImportTicket, id: AssetId },
    Failed { ticket: ImportTicket, path: PathBuf, error: AssetError },
}

/// Headless stage host. Owns every piece of mutable state and is driven from
/// a single thread; only the import workers run elsewhere.
pub struct Session {
    config: StageConfig,
    registry: PlacementRegistry,
    imports: ImportQueue,
    camera: CameraViewController,
    ui: UiState,
}

impl Session {
    pub fn new(config: StageConfig) -> Self {
        let [near, far] = config.zoom_limits;
        Self {
            imports: ImportQueue::new(config.normalize_settings()),
            camera: CameraViewController::new(config.camera_distance, (near, far)),
            registry: PlacementRegistry::new(),
            ui: UiState::new(),
            config,
        }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlacementRegistry {
        &self.registry
    }

    pub fn camera(&self) -> &CameraViewController {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraViewController {
        &mut self.camera
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Handle for the toolbar to request canonical views.
    pub fn view_sender(&self) -> ViewRequestSender {
        self.camera.view_sender()
    }

    pub fn pending_imports(&self) -> usize {
        self.imports.pending_count()
    }

    /// Queue an import. Unsupported files are rejected immediately and leave
    /// the registry untouched.
    pub fn import(&mut self, path: &Path) -> Result<ImportTicket, AssetError> {
        match self.imports.submit(path) {
            Ok(ticket) => {
                self.ui.set_status(format!("Loading {}...", path.display()));
                Ok(ticket)
            }
            Err(err) => {
                log::warn!("Rejected import {}: {}", path.display(), err);
                self.ui.set_status(err.user_message());
                Err(err)
            }
        }
    }

    /// Abandon in-flight imports; whatever they produce is discarded.
    pub fn cancel_imports(&mut self) {
        self.imports.cancel_all();
    }

    /// One event-loop tick: apply finished imports and pending view requests.
    pub fn tick(&mut self) -> Vec<ImportEvent> {
        let events: Vec<ImportEvent> = self
            .imports
            .poll()
            .into_iter()
            .map(|completed| self.apply_import(completed))
            .collect();
        if let Some(view) = self.camera.update() {
            log::info!("Camera view: {}", view.tag());
        }
        self.ui.update(&self.registry);
        events
    }

    fn apply_import(&mut self, completed: CompletedImport) -> ImportEvent {
        let CompletedImport {
            ticket,
            path,
            result,
        } = completed;
        match result {
            Ok(placement) => {
                let name = placement.name.clone();
                let digest = placement.source.digest().to_string();
                let reference = placement.reference;
                let id = self.registry.add(placement);
                log::info!(
                    "Placed '{}' as {} [sha256 {}] (anchor {:.3}, {:.3}, {:.3})",
                    name,
                    id,
                    &digest[..digest.len().min(12)],
                    reference.left_x,
                    reference.bottom_y,
                    reference.front_z
                );
                self.ui.set_status(format!("Imported {}", name));
                ImportEvent::Placed { ticket, id }
            }
            Err(error) => {
                log::warn!("Failed to import {}: {}", path.display(), error);
                self.ui.set_status(error.user_message());
                ImportEvent::Failed {
                    ticket,
                    path,
                    error,
                }
            }
        }
    }

    /// Poll until no import is in flight or `timeout` elapses.
    pub fn wait_for_imports(&mut self, timeout: Duration) -> Vec<ImportEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.tick();
        while self.imports.pending_count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            events.extend(self.tick());
        }
        events
    }

    pub fn select(&mut self, id: Option<AssetId>) {
        self.registry.select(id);
        self.ui.update(&self.registry);
    }

    /// Slider edit on the currently selected asset.
    pub fn edit_selected(&mut self, field: TransformField, axis: Axis, value: f32) -> bool {
        let Some(id) = self.registry.selected() else {
            return false;
        };
        let changed = self.registry.update_transform(id, field, axis, value);
        if changed {
            log::debug!("{} {:?}.{:?} = {}", id, field, axis, value);
            self.ui.update(&self.registry);
        }
        changed
    }

    pub fn remove(&mut self, id: AssetId) -> bool {
        let removed = self.registry.remove(id);
        if let Some(asset) = &removed {
            log::info!("Removed '{}' ({})", asset.name(), id);
            self.ui.update(&self.registry);
        }
        removed.is_some()
    }

    pub fn render_items(&self) -> Vec<RenderItem<'_>> {
        self.registry.render_items()
    }

    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot::capture(&self.registry, &self.camera, self.ui.status())
    }
}

/// Import 3D assets onto a shared stage and print the placed result as JSON.
#[derive(Debug, Parser)]
#[command(name = "placer")]
struct CliArgs {
    /// JSON stage configuration; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Snap the camera to front, back, left, right, top or bottom
    #[arg(long)]
    view: Option<CameraView>,
    /// Files to import (.gltf, .glb, .fbx)
    files: Vec<PathBuf>,
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => match load_config_from_file(path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Failed to load config {}: {}", path.display(), err);
                std::process::exit(2);
            }
        },
        None => StageConfig::default(),
    };

    let mut session = Session::new(config);
    for file in &args.files {
        // Rejections are already logged and reflected in the status line.
        let _ = session.import(file);
    }
    let events = session.wait_for_imports(Duration::from_secs(120));
    let failures = events
        .iter()
        .filter(|event| matches!(event, ImportEvent::Failed { .. }))
        .count();
    if session.pending_imports() > 0 {
        log::warn!(
            "{} imports still running; giving up",
            session.pending_imports()
        );
    }

    if let Some(view) = args.view {
        session.view_sender().send(view);
        session.tick();
    }

    match serde_json::to_string_pretty(&session.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(err) => log::error!("Failed to serialize snapshot: {}", err),
    }
    log::info!("{} placed, {} failed", session.registry().len(), failures);
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, ImportEvent, Session};
    use clap::Parser;
    use crate::assets::fixtures::{glb, gltf_with_external_buffer, CUBE_CORNERS_CM};
    use crate::assets::{ErrorKind, SourceFormat};
    use crate::config::StageConfig;
    use crate::render::CameraView;
    use crate::scene::{Axis, TransformField};
    use glam::{Mat4, Vec3};
    use std::path::PathBuf;
    use std::time::Duration;

    fn temp_dir(tag: &str) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "placer_session_{}_{}_{}",
            tag,
            std::process::id(),
            nonce
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_fixtures(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let glb_path = dir.join("model.glb");
        std::fs::write(&glb_path, glb(&CUBE_CORNERS_CM)).unwrap();
        let (json, bin) = gltf_with_external_buffer(&CUBE_CORNERS_CM, "model.bin", "");
        std::fs::write(dir.join("model.bin"), bin).unwrap();
        let gltf_path = dir.join("model.gltf");
        std::fs::write(&gltf_path, json).unwrap();
        (glb_path, gltf_path)
    }

    #[test]
    fn format_gating_and_tagging() {
        let dir = temp_dir("gating");
        let (glb_path, gltf_path) = write_fixtures(&dir);
        let obj_path = dir.join("model.obj");
        std::fs::write(&obj_path, "v 0 0 0\n").unwrap();

        let mut session = Session::new(StageConfig::default());
        let err = session.import(&obj_path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(session.registry().is_empty());
        assert!(session.ui().status().contains("model.obj"));

        session.import(&glb_path).unwrap();
        session.import(&gltf_path).unwrap();
        let events = session.wait_for_imports(Duration::from_secs(10));
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|event| matches!(event, ImportEvent::Placed { .. })));

        let mut formats: Vec<(String, SourceFormat)> = session
            .registry()
            .assets()
            .iter()
            .map(|asset| (asset.name().to_string(), asset.format()))
            .collect();
        formats.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            formats,
            vec![
                ("model.glb".to_string(), SourceFormat::Glb),
                ("model.gltf".to_string(), SourceFormat::Gltf),
            ]
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn failed_import_leaves_registry_and_selection_alone() {
        let dir = temp_dir("failure");
        let (glb_path, _) = write_fixtures(&dir);
        let broken = dir.join("broken.glb");
        std::fs::write(&broken, b"not a binary gltf").unwrap();

        let mut session = Session::new(StageConfig::default());
        session.import(&glb_path).unwrap();
        session.wait_for_imports(Duration::from_secs(10));
        let selected = session.registry().selected();
        assert!(selected.is_some());

        session.import(&broken).unwrap();
        let events = session.wait_for_imports(Duration::from_secs(10));
        assert!(matches!(
            events.as_slice(),
            [ImportEvent::Failed { error, .. }] if error.kind() == ErrorKind::ParseFailure
        ));
        assert_eq!(session.registry().len(), 1);
        assert_eq!(session.registry().selected(), selected);
        assert!(session.ui().status().contains("broken.glb"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn scale_edits_keep_the_world_anchor_fixed() {
        let dir = temp_dir("anchor");
        let (glb_path, _) = write_fixtures(&dir);
        let mut session = Session::new(StageConfig::default());
        session.import(&glb_path).unwrap();
        session.wait_for_imports(Duration::from_secs(10));

        assert!(session.edit_selected(TransformField::Position, Axis::X, 0.5));
        assert!(session.edit_selected(TransformField::Position, Axis::Z, -2.0));
        let asset = session.registry().selected_asset().unwrap();
        let anchor = asset.reference().anchor();
        let expected = Vec3::new(0.5, 0.0, -2.0) + anchor;

        for (axis, value) in [(Axis::X, 2.0), (Axis::Y, 0.5), (Axis::Z, 3.5), (Axis::X, 0.75)] {
            assert!(session.edit_selected(TransformField::Scale, axis, value));
            let item = &session.render_items()[0];
            let placed = Mat4::from_cols_array(&item.transform).transform_point3(anchor);
            assert!(placed.abs_diff_eq(expected, 1e-5), "{:?}", placed);
        }

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn edits_without_selection_do_nothing() {
        let dir = temp_dir("noselect");
        let (glb_path, _) = write_fixtures(&dir);
        let mut session = Session::new(StageConfig::default());
        session.import(&glb_path).unwrap();
        session.wait_for_imports(Duration::from_secs(10));

        session.select(None);
        assert!(!session.edit_selected(TransformField::Position, Axis::Y, 4.0));
        let id = session.registry().assets()[0].id();
        assert!(session.remove(id));
        assert!(!session.remove(id));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn view_requests_do_not_touch_the_registry() {
        let mut session = Session::new(StageConfig {
            camera_distance: 7.0,
            ..StageConfig::default()
        });
        let toolbar = session.view_sender();
        toolbar.send(CameraView::Top);
        session.tick();
        assert_eq!(session.camera().position(), Vec3::new(0.0, 7.0, 0.0));
        assert!(session.registry().is_empty());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.camera.position, [0.0, 7.0, 0.0]);
        assert!(snapshot.assets.is_empty());
    }

    #[test]
    fn cancelled_session_imports_are_not_placed() {
        let dir = temp_dir("cancel");
        let (glb_path, _) = write_fixtures(&dir);
        let mut session = Session::new(StageConfig::default());
        session.import(&glb_path).unwrap();
        session.cancel_imports();
        let events = session.wait_for_imports(Duration::from_secs(10));
        assert!(events.is_empty());
        assert!(session.registry().is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn cli_arguments() {
        let args = CliArgs::try_parse_from([
            "placer",
            "--view",
            "left",
            "a.glb",
            "--config",
            "stage.json",
            "b.fbx",
        ])
        .unwrap();
        assert_eq!(args.view, Some(CameraView::Left));
        assert_eq!(args.config, Some(PathBuf::from("stage.json")));
        assert_eq!(args.files, vec![PathBuf::from("a.glb"), PathBuf::from("b.fbx")]);

        let defaults = CliArgs::try_parse_from(["placer"]).unwrap();
        assert!(defaults.config.is_none() && defaults.view.is_none());
        assert!(defaults.files.is_empty());

        assert!(CliArgs::try_parse_from(["placer", "--view"]).is_err());
        assert!(CliArgs::try_parse_from(["placer", "--view", "sideways"]).is_err());
    }
}
