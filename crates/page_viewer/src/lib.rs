//! Two-page book viewer.
//!
//! Pages are drawn as textured grids with wgpu; the turning page is curled by a
//! compute shader (or on the CPU with `--cpu-fold`). Page geometry, turn logic and
//! the texture pool live in `pagecurl`; this crate owns the window, the GPU and
//! the egui chrome.

pub mod app;
pub mod camera;
pub mod config;
pub mod loader;
pub mod preferences;
pub mod renderer;
pub mod ui;
