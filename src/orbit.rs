// orbit.rs - 轨道相机控制: 拖拽绕目标点旋转, 可选阻尼与缩放

use crate::camera::PerspectiveCamera;
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

const EPS: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct OrbitControls {
    /// Pointer input is ignored while false. Damping still settles.
    pub enabled: bool,
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub rotate_speed: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    pub(crate) delta_theta: f32,
    pub(crate) delta_phi: f32,
    pub(crate) scale: f32,
    pub(crate) last_pointer: Option<Vec2>,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enabled: true,
            target: Vec3::ZERO,
            enable_damping: false,
            damping_factor: 0.05,
            enable_zoom: true,
            zoom_speed: 1.0,
            rotate_speed: 1.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            last_pointer: None,
        }
    }
}

impl OrbitControls {
    pub fn is_rotating(&self) -> bool {
        self.last_pointer.is_some()
    }

    pub fn pointer_down(&mut self, pointer: Vec2) {
        if !self.enabled {
            return;
        }
        self.last_pointer = Some(pointer);
    }

    /// Full viewport height of drag equals one full turn.
    pub fn pointer_move(&mut self, pointer: Vec2, viewport: Vec2) {
        if !self.enabled || viewport.y <= 0.0 {
            return;
        }
        let Some(last) = self.last_pointer else {
            return;
        };
        let delta = pointer - last;
        self.delta_theta -= TAU * delta.x / viewport.y * self.rotate_speed;
        self.delta_phi -= TAU * delta.y / viewport.y * self.rotate_speed;
        self.last_pointer = Some(pointer);
    }

    pub fn pointer_up(&mut self) {
        self.last_pointer = None;
    }

    /// Positive `scroll` zooms in.
    pub fn wheel(&mut self, scroll: f32) {
        if !self.enabled || !self.enable_zoom || scroll == 0.0 {
            return;
        }
        let step = 0.95f32.powf(self.zoom_speed);
        if scroll > 0.0 {
            self.scale *= step;
        } else {
            self.scale /= step;
        }
    }

    /// Applies pending rotation/zoom to the camera. Returns whether the camera
    /// moved noticeably.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();
        if radius < EPS {
            camera.target = self.target;
            return false;
        }

        let factor = if self.enable_damping { self.damping_factor } else { 1.0 };
        let mut theta = offset.x.atan2(offset.z) + self.delta_theta * factor;
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos() + self.delta_phi * factor;

        // 用 max/min 而非 clamp: min > max 时不能 panic
        phi = phi.max(self.min_polar_angle).min(self.max_polar_angle);
        phi = phi.max(EPS).min(PI - EPS);
        if !theta.is_finite() {
            theta = 0.0;
        }

        let radius = (radius * self.scale).max(self.min_distance).min(self.max_distance);
        let sin_phi = phi.sin();
        let previous = camera.position;
        camera.position = self.target
            + Vec3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );
        camera.target = self.target;

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > EPS * EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(55.0, 800.0 / 600.0, 0.001, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 0.5);
        camera
    }

    fn polar(camera: &PerspectiveCamera) -> f32 {
        (camera.position.y / camera.position.length()).acos()
    }

    #[test]
    fn disabled_controls_ignore_drag() {
        let mut orbit = OrbitControls {
            enabled: false,
            ..Default::default()
        };
        let mut cam = camera();
        orbit.pointer_down(Vec2::new(100.0, 100.0));
        orbit.pointer_move(Vec2::new(300.0, 100.0), VIEWPORT);
        assert!(!orbit.update(&mut cam));
        assert!((cam.position - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn horizontal_drag_orbits_at_constant_radius() {
        let mut orbit = OrbitControls::default();
        let mut cam = camera();
        orbit.pointer_down(Vec2::new(100.0, 100.0));
        orbit.pointer_move(Vec2::new(250.0, 100.0), VIEWPORT);
        assert!(orbit.update(&mut cam));
        assert!((cam.position.length() - 0.5).abs() < 1e-5);
        // 600px 高的视口拖 150px 即四分之一圈
        assert!((cam.position.x + 0.5).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_respects_minimum() {
        let mut orbit = OrbitControls {
            min_polar_angle: PI / 3.0,
            ..Default::default()
        };
        let mut cam = camera();
        orbit.pointer_down(Vec2::new(100.0, 0.0));
        orbit.pointer_move(Vec2::new(100.0, 500.0), VIEWPORT);
        orbit.update(&mut cam);
        assert!(polar(&cam) >= PI / 3.0 - 1e-4);
    }

    #[test]
    fn damping_settles_gradually() {
        let mut orbit = OrbitControls {
            enable_damping: true,
            ..Default::default()
        };
        let mut cam = camera();
        orbit.pointer_down(Vec2::new(0.0, 0.0));
        orbit.pointer_move(Vec2::new(60.0, 0.0), VIEWPORT);
        orbit.pointer_up();
        orbit.update(&mut cam);
        let first = cam.position;
        assert!(orbit.update(&mut cam));
        assert_ne!(first, cam.position);
    }

    #[test]
    fn zoom_only_when_enabled() {
        let mut orbit = OrbitControls {
            enable_zoom: false,
            ..Default::default()
        };
        let mut cam = camera();
        orbit.wheel(1.0);
        orbit.update(&mut cam);
        assert!((cam.position.length() - 0.5).abs() < 1e-6);

        orbit.enable_zoom = true;
        orbit.wheel(1.0);
        orbit.update(&mut cam);
        assert!(cam.position.length() < 0.5);
    }
}
