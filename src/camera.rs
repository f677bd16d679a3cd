// camera.rs - 透视相机 (fov 为垂直视角, 单位: 度)

use glam::{Mat4, Vec2, Vec3};

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl PerspectiveCamera {
    pub fn new(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_deg,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    /// Keeps the aspect ratio in step with the window. Zero-sized (minimised)
    /// windows are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Inverse of projection * (view without translation). Maps a clip-space
    /// point to a world-space view direction, used for the skybox.
    pub fn inverse_sky_matrix(&self) -> Mat4 {
        let mut view = self.view_matrix();
        view.w_axis = glam::Vec4::W;
        (self.projection_matrix() * view).inverse()
    }

    /// World point to physical screen pixels (origin top-left). `None` when
    /// the point is behind the camera.
    pub fn project(&self, world: Vec3, viewport: Vec2) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x * 0.5 + 0.5) * viewport.x,
            (0.5 - ndc.y * 0.5) * viewport.y,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(55.0, 2.0, 0.001, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 0.5);
        camera
    }

    #[test]
    fn target_projects_to_center() {
        let p = camera().project(Vec3::ZERO, Vec2::new(200.0, 100.0)).unwrap();
        assert!((p - Vec2::new(100.0, 50.0)).length() < 1e-4);
    }

    #[test]
    fn screen_y_grows_downwards() {
        let cam = camera();
        let viewport = Vec2::new(200.0, 100.0);
        let right = cam.project(Vec3::new(0.05, 0.0, 0.0), viewport).unwrap();
        let up = cam.project(Vec3::new(0.0, 0.05, 0.0), viewport).unwrap();
        assert!(right.x > 100.0);
        assert!(up.y < 50.0);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        assert!(camera()
            .project(Vec3::new(0.0, 0.0, 2.0), Vec2::new(200.0, 100.0))
            .is_none());
    }

    #[test]
    fn zero_sized_viewport_keeps_aspect() {
        let mut cam = camera();
        cam.set_viewport(0, 720);
        assert_eq!(cam.aspect, 2.0);
        cam.set_viewport(1280, 720);
        assert!((cam.aspect - 1280.0 / 720.0).abs() < 1e-6);
    }
}
