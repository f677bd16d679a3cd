// gizmo.rs - 三轴变换手柄 (translate / rotate / scale)
//
// gizmo 自己持有拖拽状态和一张订阅表。只有存在对应订阅时事件才入队，
// 持有者每个输入步骤用 `take_events` 取走。

use crate::camera::PerspectiveCamera;
use crate::scene::{NodeId, Transform};
use glam::{Vec2, Vec3};

const PICK_RADIUS_PX: f32 = 8.0;
const ROTATE_RADIANS_PER_PX: f32 = 0.01;
pub const DEFAULT_AXIS_PIXELS: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoMode {
    Translate,
    Rotate,
    Scale,
}

impl GizmoMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GizmoMode::Translate => "translate",
            GizmoMode::Rotate => "rotate",
            GizmoMode::Scale => "scale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
}

impl GizmoAxis {
    pub const ALL: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

    pub fn index(self) -> usize {
        match self {
            GizmoAxis::X => 0,
            GizmoAxis::Y => 1,
            GizmoAxis::Z => 2,
        }
    }

    pub fn unit(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
        }
    }

    pub fn color(self) -> [u8; 3] {
        match self {
            GizmoAxis::X => [230, 60, 60],
            GizmoAxis::Y => [60, 200, 80],
            GizmoAxis::Z => [60, 110, 230],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoEventKind {
    DraggingChanged,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoEvent {
    /// Payload is "now dragging".
    DraggingChanged(bool),
    /// The target transform or the gizmo itself changed.
    Change,
}

impl GizmoEvent {
    pub fn kind(&self) -> GizmoEventKind {
        match self {
            GizmoEvent::DraggingChanged(_) => GizmoEventKind::DraggingChanged,
            GizmoEvent::Change => GizmoEventKind::Change,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

#[derive(Debug, Clone, Copy)]
struct Subscription {
    id: SubscriptionId,
    kind: GizmoEventKind,
}

/// One axis as it appears on screen, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisHandle {
    pub axis: GizmoAxis,
    pub origin: Vec2,
    pub tip: Vec2,
    /// Screen pixels covered by one world unit along this axis.
    pub px_per_unit: f32,
}

impl AxisHandle {
    fn direction(&self) -> Vec2 {
        (self.tip - self.origin).normalize_or_zero()
    }

    fn distance_to(&self, p: Vec2) -> f32 {
        let ab = self.tip - self.origin;
        let len_sq = ab.length_squared();
        if len_sq <= f32::EPSILON {
            return p.distance(self.origin);
        }
        let t = ((p - self.origin).dot(ab) / len_sq).clamp(0.0, 1.0);
        p.distance(self.origin + ab * t)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveDrag {
    handle: AxisHandle,
    start_pointer: Vec2,
    start: Transform,
}

#[derive(Debug)]
pub struct Gizmo {
    target: Option<NodeId>,
    mode: GizmoMode,
    dragging: bool,
    hovered: Option<GizmoAxis>,
    drag: Option<ActiveDrag>,
    pub axis_pixels: f32,
    subscriptions: Vec<Subscription>,
    next_subscription: u32,
    pending: Vec<GizmoEvent>,
}

impl Default for Gizmo {
    fn default() -> Self {
        Self::new()
    }
}

impl Gizmo {
    pub fn new() -> Self {
        Self {
            target: None,
            mode: GizmoMode::Translate,
            dragging: false,
            hovered: None,
            drag: None,
            axis_pixels: DEFAULT_AXIS_PIXELS,
            subscriptions: Vec::new(),
            next_subscription: 0,
            pending: Vec::new(),
        }
    }

    pub fn attach(&mut self, target: NodeId) {
        self.target = Some(target);
    }

    /// Unbinds the target. A drag in progress is ended first so listeners
    /// see the matching `DraggingChanged(false)`.
    pub fn detach(&mut self) -> Option<NodeId> {
        if self.drag.take().is_some() {
            self.set_dragging(false);
        }
        self.hovered = None;
        self.target.take()
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    pub fn hovered(&self) -> Option<GizmoAxis> {
        self.hovered
    }

    /// Changing the mode counts as a change of the gizmo; setting the same
    /// mode again is silent.
    pub fn set_mode(&mut self, mode: GizmoMode) {
        if self.mode != mode {
            self.mode = mode;
            self.emit(GizmoEvent::Change);
        }
    }

    pub fn subscribe(&mut self, kind: GizmoEventKind) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push(Subscription { id, kind });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        let kinds: Vec<GizmoEventKind> = self.subscriptions.iter().map(|s| s.kind).collect();
        self.pending.retain(|e| kinds.contains(&e.kind()));
        self.subscriptions.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn take_events(&mut self) -> Vec<GizmoEvent> {
        std::mem::take(&mut self.pending)
    }

    fn emit(&mut self, event: GizmoEvent) {
        if self.subscriptions.iter().any(|s| s.kind == event.kind()) {
            self.pending.push(event);
        }
    }

    fn set_dragging(&mut self, dragging: bool) {
        if self.dragging != dragging {
            self.dragging = dragging;
            self.emit(GizmoEvent::DraggingChanged(dragging));
            self.emit(GizmoEvent::Change);
        }
    }

    /// Screen-space axes anchored at the target. Axes pointing straight at
    /// the camera collapse to a point and are left out.
    pub fn handles(
        &self,
        target: &Transform,
        camera: &PerspectiveCamera,
        viewport: Vec2,
    ) -> Vec<AxisHandle> {
        let Some(origin) = camera.project(target.position, viewport) else {
            return Vec::new();
        };
        let probe = (camera.position.distance(target.position) * 0.1).max(1e-4);

        GizmoAxis::ALL
            .iter()
            .filter_map(|&axis| {
                let end = camera.project(target.position + axis.unit() * probe, viewport)?;
                let span = end - origin;
                let len = span.length();
                if len < 1e-3 {
                    return None;
                }
                Some(AxisHandle {
                    axis,
                    origin,
                    tip: origin + span / len * self.axis_pixels,
                    px_per_unit: len / probe,
                })
            })
            .collect()
    }

    fn pick(
        &self,
        pointer: Vec2,
        target: &Transform,
        camera: &PerspectiveCamera,
        viewport: Vec2,
    ) -> Option<AxisHandle> {
        self.handles(target, camera, viewport)
            .into_iter()
            .map(|h| (h.distance_to(pointer), h))
            .filter(|(d, _)| *d <= PICK_RADIUS_PX)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, h)| h)
    }

    pub fn pointer_down(
        &mut self,
        pointer: Vec2,
        target: &Transform,
        camera: &PerspectiveCamera,
        viewport: Vec2,
    ) -> bool {
        if self.target.is_none() || self.drag.is_some() {
            return false;
        }
        let Some(handle) = self.pick(pointer, target, camera, viewport) else {
            return false;
        };
        self.drag = Some(ActiveDrag {
            handle,
            start_pointer: pointer,
            start: *target,
        });
        self.hovered = Some(handle.axis);
        self.set_dragging(true);
        true
    }

    pub fn pointer_move(
        &mut self,
        pointer: Vec2,
        target: &mut Transform,
        camera: &PerspectiveCamera,
        viewport: Vec2,
    ) {
        let Some(drag) = self.drag else {
            self.hovered = self
                .pick(pointer, target, camera, viewport)
                .map(|h| h.axis);
            return;
        };

        let delta = pointer - drag.start_pointer;
        let dir = drag.handle.direction();
        let along = delta.dot(dir);
        let i = drag.handle.axis.index();

        *target = drag.start;
        match self.mode {
            GizmoMode::Translate => {
                target.position += drag.handle.axis.unit() * (along / drag.handle.px_per_unit);
            }
            GizmoMode::Rotate => {
                let perp = Vec2::new(-dir.y, dir.x);
                target.rotation[i] = drag.start.rotation[i] + delta.dot(perp) * ROTATE_RADIANS_PER_PX;
            }
            GizmoMode::Scale => {
                target.scale[i] = drag.start.scale[i] * (1.0 + along / self.axis_pixels);
            }
        }
        self.emit(GizmoEvent::Change);
    }

    pub fn pointer_up(&mut self) -> bool {
        if self.drag.take().is_some() {
            self.set_dragging(false);
            true
        } else {
            false
        }
    }

    /// W / E / R switch to translate / rotate / scale.
    pub fn key_pressed(&mut self, key: char) -> bool {
        if self.target.is_none() {
            return false;
        }
        let mode = match key.to_ascii_lowercase() {
            'w' => GizmoMode::Translate,
            'e' => GizmoMode::Rotate,
            'r' => GizmoMode::Scale,
            _ => return false,
        };
        self.set_mode(mode);
        true
    }
}
