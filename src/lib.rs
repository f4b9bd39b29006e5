//! Placer - headless staging area for imported 3D assets.
//!
//! Assets are imported in the background, normalized to a common size on a
//! shared ground plane, and placed with per-asset position, rotation and
//! scale. A small orbit camera can snap to the six canonical views.

pub mod app;
pub mod assets;
pub mod config;
pub mod render;
pub mod scene;
pub mod ui;
