mod camera;

pub use camera::{
    CameraView, CameraViewController, ControllerState, OrbitState, ParseViewError,
    ViewRequestSender,
};
