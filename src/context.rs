// context.rs - 场景上下文: 代替全局的 scene / camera / controls
//
// 输入先交给 gizmo，其事件分发给编辑器之后轨道控制才看到同一输入，
// 所以抓住 gizmo 轴的按下已经关闭了轨道旋转。

use crate::camera::PerspectiveCamera;
use crate::config::ViewerConfig;
use crate::orbit::OrbitControls;
use crate::scene::{Fog, Node, NodeId, NodeKind, SceneGraph, Transform};
use crate::transform_edit::{
    ControllerState, EditIntent, TransformEditController, TransformEditError, TransformReport,
};
use crate::tween::{Timeline, TweenSpec, TweenTargets};
use glam::{Vec2, Vec3};

pub struct SceneContext {
    pub scene: SceneGraph,
    pub camera: PerspectiveCamera,
    pub orbit: OrbitControls,
    viewport: Vec2,
    sphere: Option<NodeId>,
    sphere_rotation: Vec3,
    intro_specs: Vec<TweenSpec>,
    intro: Option<Timeline>,
    controllers: Vec<TransformEditController>,
    last_report: Option<TransformReport>,
}

impl SceneContext {
    pub fn new(config: &ViewerConfig, width: u32, height: u32) -> Self {
        let aspect = if width > 0 && height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };
        let mut camera = PerspectiveCamera::new(
            config.camera.fov,
            aspect,
            config.camera.near,
            config.camera.far,
        );
        camera.position = Vec3::from_array(config.camera.position);

        let orbit = OrbitControls {
            enable_damping: config.orbit.enable_damping,
            damping_factor: config.orbit.damping_factor,
            enable_zoom: config.orbit.enable_zoom,
            rotate_speed: config.orbit.rotate_speed,
            min_polar_angle: config.orbit.min_polar_angle,
            max_polar_angle: config.orbit.max_polar_angle,
            ..Default::default()
        };

        let mut scene = SceneGraph::new();
        scene.fog = config.fog.as_ref().map(|f| Fog {
            color: f.color,
            near: f.near,
            far: f.far,
        });

        Self {
            scene,
            camera,
            orbit,
            viewport: Vec2::new(width as f32, height as f32),
            sphere: None,
            sphere_rotation: Vec3::from_array(config.panorama.initial_rotation),
            intro_specs: config.intro.clone(),
            intro: None,
            controllers: Vec::new(),
            last_report: None,
        }
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn sphere(&self) -> Option<NodeId> {
        self.sphere
    }

    pub fn controllers(&self) -> &[TransformEditController] {
        &self.controllers
    }

    pub fn last_report(&self) -> Option<&TransformReport> {
        self.last_report.as_ref()
    }

    /// True while any editor's gizmo is being dragged.
    pub fn is_dragging(&self) -> bool {
        self.controllers
            .iter()
            .any(|c| c.state() == ControllerState::DragActive)
    }

    pub fn intro_running(&self) -> bool {
        self.intro.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport = Vec2::new(width as f32, height as f32);
            self.camera.set_viewport(width, height);
        }
    }

    /// Adds the panorama sphere on the first successful load and starts the
    /// intro. Later loads only swap the texture and keep the sphere.
    pub fn spawn_panorama_sphere(&mut self) -> (NodeId, bool) {
        if let Some(id) = self.sphere.filter(|id| self.scene.contains(*id)) {
            return (id, false);
        }
        let mut node = Node::new("panorama", NodeKind::PanoramaSphere);
        node.transform = Transform {
            rotation: self.sphere_rotation,
            ..Transform::IDENTITY
        };
        let id = self.scene.add(node);
        self.sphere = Some(id);
        self.intro = Some(Timeline::new(&self.intro_specs));
        log::info!("panorama sphere {} added, intro started", id);
        (id, true)
    }

    pub fn update(&mut self, dt: f32) {
        if let Some(timeline) = self.intro.as_mut() {
            let sphere = self.sphere.and_then(|id| self.scene.transform_mut(id));
            timeline.advance(
                dt,
                &mut TweenTargets {
                    sphere,
                    camera: &mut self.camera,
                },
            );
        }
        self.orbit.update(&mut self.camera);
    }

    pub fn attach_editor(
        &mut self,
        target: NodeId,
        intent: EditIntent,
        group: bool,
    ) -> Result<(), TransformEditError> {
        let controller = TransformEditController::attach(&mut self.scene, target, intent, group)?;
        log::info!(
            "transform editor attached to {} ({:?})",
            target,
            controller.intent()
        );
        self.controllers.push(controller);
        Ok(())
    }

    pub fn detach_editors(&mut self) -> usize {
        let count = self.controllers.len();
        for controller in self.controllers.drain(..) {
            controller.detach(&mut self.scene, &mut self.orbit);
        }
        if count > 0 {
            log::info!(
                "detached {} transform editor(s), {} gizmo(s) left",
                count,
                self.scene.gizmo_count()
            );
        }
        count
    }

    /// Editors whose target or gizmo has vanished are detached.
    fn dispatch_gizmo_events(&mut self) {
        let Self {
            scene,
            orbit,
            controllers,
            last_report,
            ..
        } = self;

        let mut i = 0;
        while i < controllers.len() {
            match controllers[i].process_events(scene, orbit) {
                Ok(reports) => {
                    if let Some(report) = reports.into_iter().last() {
                        *last_report = Some(report);
                    }
                    i += 1;
                }
                Err(e) => {
                    log::warn!("detaching transform editor: {}", e);
                    controllers.remove(i).detach(scene, orbit);
                }
            }
        }
    }

    pub fn pointer_down(&mut self, pointer: Vec2) -> bool {
        let grabbed = self.scene.pointer_down(pointer, &self.camera, self.viewport);
        self.dispatch_gizmo_events();
        self.orbit.pointer_down(pointer);
        grabbed
    }

    pub fn pointer_move(&mut self, pointer: Vec2) {
        self.scene.pointer_move(pointer, &self.camera, self.viewport);
        self.dispatch_gizmo_events();
        self.orbit.pointer_move(pointer, self.viewport);
    }

    pub fn pointer_up(&mut self) {
        self.scene.pointer_up();
        self.dispatch_gizmo_events();
        self.orbit.pointer_up();
    }

    pub fn wheel(&mut self, scroll: f32) {
        self.orbit.wheel(scroll);
    }

    pub fn key_pressed(&mut self, key: char) -> bool {
        let handled = self.scene.key_pressed(key);
        self.dispatch_gizmo_events();
        handled
    }

    /// Drops editors, the sphere and the intro. Camera and orbit settings stay.
    pub fn teardown(&mut self) {
        self.detach_editors();
        if let Some(id) = self.sphere.take() {
            self.scene.remove(id);
        }
        self.intro = None;
        self.last_report = None;
        self.orbit.pointer_up();
        self.orbit.enabled = true;
    }
}
