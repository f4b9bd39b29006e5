use glam::{Mat4, Vec3};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Pitch stays this far short of the poles while orbiting.
const POLE_MARGIN: f32 = 1e-3;

/// One of the six fixed viewpoints, all looking at the world origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraView {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl CameraView {
    pub const ALL: [CameraView; 6] = [
        CameraView::Front,
        CameraView::Back,
        CameraView::Left,
        CameraView::Right,
        CameraView::Top,
        CameraView::Bottom,
    ];

    pub fn axis(self) -> Vec3 {
        match self {
            CameraView::Front => Vec3::Z,
            CameraView::Back => Vec3::NEG_Z,
            CameraView::Left => Vec3::NEG_X,
            CameraView::Right => Vec3::X,
            CameraView::Top => Vec3::Y,
            CameraView::Bottom => Vec3::NEG_Y,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            CameraView::Front => "front",
            CameraView::Back => "back",
            CameraView::Left => "left",
            CameraView::Right => "right",
            CameraView::Top => "top",
            CameraView::Bottom => "bottom",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown camera view '{0}' (expected front, back, left, right, top or bottom)")]
pub struct ParseViewError(String);

impl std::str::FromStr for CameraView {
    type Err = ParseViewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        CameraView::ALL
            .into_iter()
            .find(|view| view.tag() == lowered)
            .ok_or_else(|| ParseViewError(value.to_string()))
    }
}

/// Toolbar-side handle for requesting a canonical view.
#[derive(Debug, Clone)]
pub struct ViewRequestSender {
    sender: Sender<CameraView>,
}

impl ViewRequestSender {
    /// Returns false once the controller has been dropped.
    pub fn send(&self, view: CameraView) -> bool {
        self.sender.send(view).is_ok()
    }
}

/// Spherical orbit parameters around `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitState {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl OrbitState {
    pub fn eye(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        self.target
            + Vec3::new(
                cos_pitch * self.yaw.sin(),
                self.pitch.sin(),
                cos_pitch * self.yaw.cos(),
            ) * self.distance
    }

    fn from_pose(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let distance = offset.length().max(1e-4);
        let (yaw, pitch) = offset_to_yaw_pitch(offset / distance);
        Self {
            target,
            distance,
            yaw,
            pitch,
        }
    }
}

/// `Snapping` only lasts inside [`CameraViewController::update`]; between
/// updates the controller always reports `Orbiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Orbiting,
    Snapping(CameraView),
}

/// Orbit camera with one-shot snaps to canonical views.
///
/// Snaps arrive through [`ViewRequestSender`] and are applied on
/// [`CameraViewController::update`]; afterwards the controller is back in
/// `Orbiting` with the orbit parameters resynchronized to the snapped pose.
pub struct CameraViewController {
    position: Vec3,
    orbit: OrbitState,
    snap_distance: f32,
    zoom_limits: (f32, f32),
    state: ControllerState,
    requests: Receiver<CameraView>,
    sender: Sender<CameraView>,
}

impl CameraViewController {
    pub fn new(snap_distance: f32, zoom_limits: (f32, f32)) -> Self {
        let (sender, requests) = channel();
        let position = Vec3::new(0.0, 0.0, snap_distance);
        Self {
            position,
            orbit: OrbitState::from_pose(position, Vec3::ZERO),
            snap_distance,
            zoom_limits,
            state: ControllerState::Orbiting,
            requests,
            sender,
        }
    }

    pub fn view_sender(&self) -> ViewRequestSender {
        ViewRequestSender {
            sender: self.sender.clone(),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.orbit.target
    }

    pub fn orbit(&self) -> OrbitState {
        self.orbit
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Drain pending view requests. Returns the last view applied, if any.
    pub fn update(&mut self) -> Option<CameraView> {
        let mut applied = None;
        while let Ok(view) = self.requests.try_recv() {
            self.state = ControllerState::Snapping(view);
            self.snap(view);
            self.state = ControllerState::Orbiting;
            applied = Some(view);
        }
        applied
    }

    fn snap(&mut self, view: CameraView) {
        self.position = view.axis() * self.snap_distance;
        self.orbit = OrbitState::from_pose(self.position, Vec3::ZERO);
        log::debug!(
            "camera snapped to {} view at {:?} (yaw {:.3}, pitch {:.3})",
            view.tag(),
            self.position,
            self.orbit.yaw,
            self.orbit.pitch
        );
    }

    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        if yaw_delta == 0.0 && pitch_delta == 0.0 {
            return;
        }
        let limit = std::f32::consts::FRAC_PI_2 - POLE_MARGIN;
        self.orbit.yaw = wrap_angle(self.orbit.yaw + yaw_delta);
        self.orbit.pitch = (self.orbit.pitch + pitch_delta).clamp(-limit, limit);
        self.position = self.orbit.eye();
    }

    pub fn pan(&mut self, right: f32, up: f32) {
        let (_, right_dir, up_dir) = self.basis();
        let shift = (right_dir * right + up_dir * up) * self.orbit.distance;
        self.orbit.target += shift;
        self.position += shift;
    }

    /// Positive `delta` moves the camera closer.
    pub fn zoom(&mut self, delta: f32) {
        let (min, max) = self.zoom_limits;
        self.orbit.distance = (self.orbit.distance * (1.0 - delta * 0.1)).clamp(min, max);
        self.position = self.orbit.target + self.offset_dir() * self.orbit.distance;
    }

    /// Forward, right and up unit vectors of the current pose.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = -self.offset_dir();
        let up_hint = self.up();
        let right = forward.cross(up_hint).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        (forward, right, up)
    }

    /// Up vector for look-at; switches away from +Y when looking straight
    /// down or up.
    pub fn up(&self) -> Vec3 {
        let dir = self.offset_dir();
        if dir.cross(Vec3::Y).length_squared() < 1e-8 {
            if dir.y > 0.0 {
                Vec3::NEG_Z
            } else {
                Vec3::Z
            }
        } else {
            Vec3::Y
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.orbit.target, self.up())
    }

    fn offset_dir(&self) -> Vec3 {
        let offset = self.position - self.orbit.target;
        if offset.length_squared() > 1e-12 {
            offset.normalize()
        } else {
            Vec3::Z
        }
    }
}

fn offset_to_yaw_pitch(dir: Vec3) -> (f32, f32) {
    let yaw = dir.x.atan2(dir.z);
    let pitch = dir.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}

fn wrap_angle(angle: f32) -> f32 {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        (angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraView, CameraViewController, ControllerState};
    use glam::Vec3;

    fn controller() -> CameraViewController {
        CameraViewController::new(5.0, (0.1, 1000.0))
    }

    #[test]
    fn every_view_lands_on_its_axis() {
        let mut camera = controller();
        let sender = camera.view_sender();
        for view in CameraView::ALL {
            assert!(sender.send(view));
            assert_eq!(camera.update(), Some(view));
            assert_eq!(camera.position(), view.axis() * 5.0);
            assert_eq!(camera.target(), Vec3::ZERO);
            assert_eq!(camera.state(), ControllerState::Orbiting);
            assert!(camera.view_matrix().is_finite(), "{:?}", view);
        }
    }

    #[test]
    fn front_snap_is_idempotent() {
        let mut camera = controller();
        let sender = camera.view_sender();
        camera.rotate(1.2, 0.4);
        camera.pan(0.3, -0.2);

        sender.send(CameraView::Front);
        camera.update();
        let first = (camera.position(), camera.target(), camera.orbit());
        sender.send(CameraView::Front);
        camera.update();
        let second = (camera.position(), camera.target(), camera.orbit());
        assert_eq!(first, second);
    }

    #[test]
    fn orbit_after_snap_starts_from_snapped_pose() {
        let mut camera = controller();
        let sender = camera.view_sender();
        camera.rotate(2.0, 0.7);

        sender.send(CameraView::Right);
        camera.update();
        let orbit = camera.orbit();
        assert!(orbit.eye().abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));

        camera.rotate(0.1, 0.0);
        let yaw = std::f32::consts::FRAC_PI_2 + 0.1;
        let expected = Vec3::new(5.0 * yaw.sin(), 0.0, 5.0 * yaw.cos());
        assert!(camera.position().abs_diff_eq(expected, 1e-4), "{:?}", camera.position());
        assert!((camera.position().length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn orbit_from_top_view_stays_near_the_pole() {
        let mut camera = controller();
        let sender = camera.view_sender();
        sender.send(CameraView::Top);
        camera.update();
        assert_eq!(camera.up(), Vec3::NEG_Z);

        camera.rotate(0.05, 0.0);
        assert!(camera.position().y > 4.99);
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn requests_apply_in_order() {
        let mut camera = controller();
        let toolbar = camera.view_sender();
        toolbar.send(CameraView::Left);
        toolbar.send(CameraView::Bottom);
        assert_eq!(camera.update(), Some(CameraView::Bottom));
        assert_eq!(camera.position(), Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(camera.update(), None);
    }

    #[test]
    fn zoom_is_clamped_and_keeps_direction() {
        let mut camera = controller();
        camera.zoom(100.0);
        assert!((camera.orbit().distance - 0.1).abs() < 1e-6);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 0.1), 1e-6));
    }

    #[test]
    fn pan_moves_target_and_eye_together() {
        let mut camera = controller();
        let before = camera.position() - camera.target();
        camera.pan(0.1, 0.0);
        assert!(camera.target().x > 0.0);
        assert!((camera.position() - camera.target()).abs_diff_eq(before, 1e-5));
    }

    #[test]
    fn view_tags_parse() {
        assert_eq!("Front".parse::<CameraView>().unwrap(), CameraView::Front);
        assert_eq!(" bottom ".parse::<CameraView>().unwrap(), CameraView::Bottom);
        assert!("diagonal".parse::<CameraView>().is_err());
    }
}
