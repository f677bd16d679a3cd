// scene.rs - 场景图: 节点、变换、雾以及挂在场景里的 gizmo

use crate::camera::PerspectiveCamera;
use crate::gizmo::{AxisHandle, Gizmo, GizmoAxis, GizmoMode};
use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a node or gizmo in a [`SceneGraph`]. Ids are never reused, so a
/// handle to a removed node stays invalid forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position, Euler rotation (XYZ order, radians) and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The inverted, textured panorama sphere.
    PanoramaSphere,
    /// Plain transform node with nothing to draw.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
        }
    }
}

/// Linear fog between `near` and `far` (view-space depth).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

/// What the overlay needs to draw one gizmo.
#[derive(Debug, Clone)]
pub struct GizmoOverlay {
    pub mode: GizmoMode,
    pub dragging: bool,
    pub hovered: Option<GizmoAxis>,
    pub handles: Vec<AxisHandle>,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, Node>,
    gizmos: BTreeMap<NodeId, Gizmo>,
    next_id: u32,
    pub fog: Option<Fog>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.allocate_id();
        self.nodes.insert(id, node);
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.nodes.get(&id).map(|n| &n.transform)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.nodes.get_mut(&id).map(|n| &mut n.transform)
    }

    pub fn add_gizmo(&mut self, gizmo: Gizmo) -> NodeId {
        let id = self.allocate_id();
        self.gizmos.insert(id, gizmo);
        id
    }

    pub fn remove_gizmo(&mut self, id: NodeId) -> Option<Gizmo> {
        self.gizmos.remove(&id)
    }

    pub fn gizmo(&self, id: NodeId) -> Option<&Gizmo> {
        self.gizmos.get(&id)
    }

    pub fn gizmo_mut(&mut self, id: NodeId) -> Option<&mut Gizmo> {
        self.gizmos.get_mut(&id)
    }

    pub fn gizmo_count(&self) -> usize {
        self.gizmos.len()
    }

    /// Offers a pointer press to every attached gizmo; the first one whose
    /// axis is under the pointer starts a drag.
    pub fn pointer_down(
        &mut self,
        pointer: Vec2,
        camera: &PerspectiveCamera,
        viewport: Vec2,
    ) -> bool {
        let Self { nodes, gizmos, .. } = self;
        for gizmo in gizmos.values_mut() {
            let Some(node) = gizmo.target().and_then(|id| nodes.get(&id)) else {
                continue;
            };
            if gizmo.pointer_down(pointer, &node.transform, camera, viewport) {
                return true;
            }
        }
        false
    }

    pub fn pointer_move(&mut self, pointer: Vec2, camera: &PerspectiveCamera, viewport: Vec2) {
        let Self { nodes, gizmos, .. } = self;
        for gizmo in gizmos.values_mut() {
            let Some(node) = gizmo.target().and_then(|id| nodes.get_mut(&id)) else {
                continue;
            };
            gizmo.pointer_move(pointer, &mut node.transform, camera, viewport);
        }
    }

    pub fn pointer_up(&mut self) -> bool {
        let mut released = false;
        for gizmo in self.gizmos.values_mut() {
            released |= gizmo.pointer_up();
        }
        released
    }

    pub fn key_pressed(&mut self, key: char) -> bool {
        let mut handled = false;
        for gizmo in self.gizmos.values_mut() {
            handled |= gizmo.key_pressed(key);
        }
        handled
    }

    pub fn gizmo_overlays(&self, camera: &PerspectiveCamera, viewport: Vec2) -> Vec<GizmoOverlay> {
        self.gizmos
            .values()
            .filter_map(|gizmo| {
                let node = gizmo.target().and_then(|t| self.nodes.get(&t))?;
                Some(GizmoOverlay {
                    mode: gizmo.mode(),
                    dragging: gizmo.dragging(),
                    hovered: gizmo.hovered(),
                    handles: gizmo.handles(&node.transform, camera, viewport),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_ids_are_not_reused() {
        let mut scene = SceneGraph::new();
        let a = scene.add(Node::new("a", NodeKind::Empty));
        assert!(scene.remove(a).is_some());
        let b = scene.add(Node::new("b", NodeKind::Empty));
        assert_ne!(a, b);
        assert!(!scene.contains(a));
        assert!(scene.contains(b));
    }

    #[test]
    fn gizmos_are_not_targets() {
        let mut scene = SceneGraph::new();
        let g = scene.add_gizmo(Gizmo::new());
        assert!(!scene.contains(g));
        assert!(scene.gizmo(g).is_some());
        assert_eq!(scene.gizmo_count(), 1);
    }

    #[test]
    fn transform_matrix_applies_scale_then_rotation_then_translation() {
        let t = Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let p = t.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }
}
