use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

pub const HOME_POSITION: Vec3 = Vec3::new(0.0, 0.5, 1.0);
pub const HOME_HALF_HEIGHT: f32 = 0.6;
pub const MIN_HALF_HEIGHT: f32 = 0.1;
pub const MAX_HALF_HEIGHT: f32 = 3.0;

/// Half-height change per wheel notch.
const ZOOM_STEP: f32 = 0.05;

/// Orthographic camera looking down `-z` at the spread. Pages span `y in [0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCamera {
    pub position: Vec3,
    /// Half of the visible height in page units.
    pub half_height: f32,
}

impl Default for PageCamera {
    fn default() -> Self {
        Self {
            position: HOME_POSITION,
            half_height: HOME_HALF_HEIGHT,
        }
    }
}

impl PageCamera {
    pub fn reset(&mut self) {
        *self = Self::default();
        log::info!("camera reset");
    }

    /// Positive `notches` zoom in.
    pub fn zoom(&mut self, notches: f32) {
        self.half_height =
            (self.half_height - notches * ZOOM_STEP).clamp(MIN_HALF_HEIGHT, MAX_HALF_HEIGHT);
    }

    /// Moves the view by a cursor drag of `(dx, dy)` pixels in a window `height`
    /// pixels tall, so the page follows the cursor.
    pub fn pan(&mut self, dx: f32, dy: f32, height: f32) {
        let units_per_px = 2.0 * self.half_height / height.max(1.0);
        self.position.x -= dx * units_per_px;
        self.position.y += dy * units_per_px;
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let hy = self.half_height;
        let hx = hy * aspect;
        let proj = Mat4::orthographic_rh(-hx, hx, -hy, hy, 1e-3, 100.0);
        let view = Mat4::look_at_rh(self.position, self.position - Vec3::Z, Vec3::Y);
        proj * view
    }
}

/// Middle-button drag pans, the wheel zooms.
#[derive(Default)]
pub struct CameraController {
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    window_height: f32,
}

impl CameraController {
    pub fn new(window_height: u32) -> Self {
        Self {
            window_height: window_height as f32,
            ..Self::default()
        }
    }

    /// Returns `true` when the event moved the camera.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut PageCamera) -> bool {
        match event {
            WindowEvent::Resized(size) => {
                self.window_height = size.height as f32;
                false
            }
            WindowEvent::MouseInput {
                button: MouseButton::Middle,
                state,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let xy = (position.x, position.y);
                let moved = match self.last_cursor {
                    Some(last) if self.dragging => {
                        camera.pan(
                            (xy.0 - last.0) as f32,
                            (xy.1 - last.1) as f32,
                            self.window_height,
                        );
                        true
                    }
                    _ => false,
                };
                self.last_cursor = Some(xy);
                moved
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                camera.zoom(notches);
                true
            }
            _ => false,
        }
    }

    /// Last known cursor position in physical pixels.
    pub fn cursor(&self) -> Option<(f64, f64)> {
        self.last_cursor
    }
}
