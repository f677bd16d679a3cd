// transform_edit.rs - 变换编辑控制器
//
// 把 gizmo 绑定到一个场景节点，并把它的模式固定为声明的意图。
// 没有拖拽时指针输入交还给轨道控制，每次变化都输出取整后的变换。

use crate::gizmo::{Gizmo, GizmoEvent, GizmoEventKind, GizmoMode, SubscriptionId};
use crate::orbit::OrbitControls;
use crate::scene::{NodeId, SceneGraph, Transform};
use glam::Vec3;
use serde::Deserialize;
use std::fmt;

/// Which part of the transform an editor works on. Parsed from the short
/// codes "P", "R" and "S"; anything else means translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum EditIntent {
    #[default]
    Translate,
    Rotate,
    Scale,
}

impl EditIntent {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "R" => EditIntent::Rotate,
            "S" => EditIntent::Scale,
            _ => EditIntent::Translate,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            EditIntent::Translate => "P",
            EditIntent::Rotate => "R",
            EditIntent::Scale => "S",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EditIntent::Translate => "New Position:",
            EditIntent::Rotate => "New Rotation:",
            EditIntent::Scale => "New Scale:",
        }
    }

    pub fn gizmo_mode(self) -> GizmoMode {
        match self {
            EditIntent::Translate => GizmoMode::Translate,
            EditIntent::Rotate => GizmoMode::Rotate,
            EditIntent::Scale => GizmoMode::Scale,
        }
    }

    fn component(self, transform: &Transform) -> Vec3 {
        match self {
            EditIntent::Translate => transform.position,
            EditIntent::Rotate => transform.rotation,
            EditIntent::Scale => transform.scale,
        }
    }
}

impl From<&str> for EditIntent {
    fn from(code: &str) -> Self {
        Self::from_code(code)
    }
}

impl From<String> for EditIntent {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransformEditError {
    #[error("invalid target: node {0} is not part of the scene graph")]
    InvalidTarget(NodeId),
    #[error("gizmo {0} was removed from the scene graph")]
    MissingGizmo(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    OrbitActive,
    DragActive,
}

/// Two-decimal rounding: scale by 100, round half away from zero, scale
/// back. Done in f64 so `1.005` stays `1.00` and `0.125` becomes `0.13`.
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedVec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for RoundedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ x: {}, y: {}, z: {} }}", self.x, self.y, self.z)
    }
}

/// A transform component that could not be shown and was replaced by 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MalformedComponent {
    pub axis: char,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    pub label: &'static str,
    pub value: RoundedVec3,
    pub malformed: Vec<MalformedComponent>,
}

impl TransformReport {
    pub fn capture(intent: EditIntent, transform: &Transform) -> Self {
        let raw = intent.component(transform);
        let mut malformed = Vec::new();
        let mut round = |axis: char, v: f32| {
            if v.is_finite() {
                round_hundredths(f64::from(v))
            } else {
                malformed.push(MalformedComponent { axis, value: v });
                0.0
            }
        };
        let value = RoundedVec3 {
            x: round('x', raw.x),
            y: round('y', raw.y),
            z: round('z', raw.z),
        };
        Self {
            label: intent.label(),
            value,
            malformed,
        }
    }

    fn emit(&self) {
        for m in &self.malformed {
            log::warn!(
                target: "transform_edit",
                "{} non-finite {} component ({}) replaced with 0",
                self.label,
                m.axis,
                m.value
            );
        }
        log::info!(target: "transform_edit", "{} {}", self.label, self.value);
    }
}

impl fmt::Display for TransformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label, self.value)
    }
}

#[derive(Debug)]
pub struct TransformEditController {
    target: NodeId,
    gizmo: NodeId,
    intent: EditIntent,
    group: bool,
    state: ControllerState,
    dragging_subscription: SubscriptionId,
    change_subscription: SubscriptionId,
}

impl TransformEditController {
    /// Creates a gizmo bound to `target`, adds it to the scene and subscribes
    /// to its events. `group` is stored but has no effect.
    pub fn attach(
        scene: &mut SceneGraph,
        target: NodeId,
        intent: EditIntent,
        group: bool,
    ) -> Result<Self, TransformEditError> {
        if !scene.contains(target) {
            return Err(TransformEditError::InvalidTarget(target));
        }

        let mut gizmo = Gizmo::new();
        // 此时还没有订阅者，不算一次变化
        gizmo.set_mode(intent.gizmo_mode());
        let dragging_subscription = gizmo.subscribe(GizmoEventKind::DraggingChanged);
        gizmo.attach(target);
        let change_subscription = gizmo.subscribe(GizmoEventKind::Change);
        let gizmo = scene.add_gizmo(gizmo);

        log::debug!(
            target: "transform_edit",
            "attached gizmo {} to node {} (intent {})",
            gizmo,
            target,
            intent.code()
        );

        Ok(Self {
            target,
            gizmo,
            intent,
            group,
            state: ControllerState::OrbitActive,
            dragging_subscription,
            change_subscription,
        })
    }

    /// Translate intent, group flag set.
    pub fn attach_default(
        scene: &mut SceneGraph,
        target: NodeId,
    ) -> Result<Self, TransformEditError> {
        Self::attach(scene, target, EditIntent::default(), true)
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn gizmo(&self) -> NodeId {
        self.gizmo
    }

    pub fn intent(&self) -> EditIntent {
        self.intent
    }

    pub fn group(&self) -> bool {
        self.group
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn handle_event(
        &mut self,
        scene: &mut SceneGraph,
        orbit: &mut OrbitControls,
        event: GizmoEvent,
    ) -> Result<Option<TransformReport>, TransformEditError> {
        match event {
            GizmoEvent::DraggingChanged(dragging) => {
                self.on_dragging_changed(orbit, dragging);
                Ok(None)
            }
            GizmoEvent::Change => self.on_change(scene).map(Some),
        }
    }

    /// Drains the gizmo until it stops producing events. Re-pinning the mode
    /// can queue one more change, so this may loop once more than expected.
    pub fn process_events(
        &mut self,
        scene: &mut SceneGraph,
        orbit: &mut OrbitControls,
    ) -> Result<Vec<TransformReport>, TransformEditError> {
        let mut reports = Vec::new();
        loop {
            let events = scene
                .gizmo_mut(self.gizmo)
                .ok_or(TransformEditError::MissingGizmo(self.gizmo))?
                .take_events();
            if events.is_empty() {
                return Ok(reports);
            }
            for event in events {
                if let Some(report) = self.handle_event(scene, orbit, event)? {
                    reports.push(report);
                }
            }
        }
    }

    fn on_dragging_changed(&mut self, orbit: &mut OrbitControls, dragging: bool) {
        orbit.enabled = !dragging;
        self.state = if dragging {
            ControllerState::DragActive
        } else {
            ControllerState::OrbitActive
        };
    }

    fn on_change(&mut self, scene: &mut SceneGraph) -> Result<TransformReport, TransformEditError> {
        let transform = scene
            .transform(self.target)
            .ok_or(TransformEditError::InvalidTarget(self.target))?;
        let report = TransformReport::capture(self.intent, transform);
        report.emit();

        scene
            .gizmo_mut(self.gizmo)
            .ok_or(TransformEditError::MissingGizmo(self.gizmo))?
            .set_mode(self.intent.gizmo_mode());
        Ok(report)
    }

    /// Unsubscribes, unbinds and removes the gizmo. Orbit input is handed
    /// back if the session ends mid-drag.
    pub fn detach(self, scene: &mut SceneGraph, orbit: &mut OrbitControls) {
        if let Some(mut gizmo) = scene.remove_gizmo(self.gizmo) {
            gizmo.unsubscribe(self.dragging_subscription);
            gizmo.unsubscribe(self.change_subscription);
            gizmo.detach();
            if gizmo.subscription_count() > 0 {
                log::warn!(target: "transform_edit", "gizmo {} still has foreign subscriptions", self.gizmo);
            }
        }
        if self.state == ControllerState::DragActive {
            orbit.enabled = true;
        }
        log::debug!(target: "transform_edit", "detached gizmo {}", self.gizmo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Node, NodeKind};

    fn scene_with_target() -> (SceneGraph, NodeId) {
        let mut scene = SceneGraph::new();
        let target = scene.add(Node::new("target", NodeKind::Empty));
        (scene, target)
    }

    fn fire(
        controller: &mut TransformEditController,
        scene: &mut SceneGraph,
        orbit: &mut OrbitControls,
        event: GizmoEvent,
    ) -> Option<TransformReport> {
        controller.handle_event(scene, orbit, event).unwrap()
    }

    #[test]
    fn intent_codes_fall_back_to_translate() {
        assert_eq!(EditIntent::from_code("P"), EditIntent::Translate);
        assert_eq!(EditIntent::from_code("R"), EditIntent::Rotate);
        assert_eq!(EditIntent::from_code("S"), EditIntent::Scale);
        assert_eq!(EditIntent::from_code("r"), EditIntent::Translate);
        assert_eq!(EditIntent::from_code("whatever"), EditIntent::Translate);
        assert_eq!(EditIntent::default(), EditIntent::Translate);
    }

    #[test]
    fn intent_deserializes_from_code() {
        let intent: EditIntent = serde_json::from_str("\"S\"").unwrap();
        assert_eq!(intent, EditIntent::Scale);
        let intent: EditIntent = serde_json::from_str("\"Q\"").unwrap();
        assert_eq!(intent, EditIntent::Translate);
    }

    #[test]
    fn rounding_is_pinned_to_half_away_from_zero() {
        assert_eq!(round_hundredths(1.005), 1.0);
        assert_eq!(round_hundredths(0.125), 0.13);
        assert_eq!(round_hundredths(-0.125), -0.13);
        assert_eq!(round_hundredths(2.675), 2.67);
        assert_eq!(round_hundredths(1.23456), 1.23);
        let once = round_hundredths(3.14159);
        assert_eq!(round_hundredths(once), once);
    }

    #[test]
    fn attach_rejects_missing_target() {
        let (mut scene, target) = scene_with_target();
        scene.remove(target);
        let err = TransformEditController::attach_default(&mut scene, target).unwrap_err();
        assert_eq!(err, TransformEditError::InvalidTarget(target));
        assert_eq!(scene.gizmo_count(), 0);
    }

    #[test]
    fn attach_inserts_bound_gizmo() {
        let (mut scene, target) = scene_with_target();
        let controller =
            TransformEditController::attach(&mut scene, target, EditIntent::Rotate, false).unwrap();
        let gizmo = scene.gizmo_mut(controller.gizmo()).unwrap();
        assert_eq!(gizmo.target(), Some(target));
        assert_eq!(gizmo.subscription_count(), 2);
        assert_eq!(controller.state(), ControllerState::OrbitActive);
        assert_eq!(gizmo.mode(), GizmoMode::Rotate);
        assert!(gizmo.take_events().is_empty());
        assert!(!controller.group());
    }

    #[test]
    fn default_attach_toggles_orbit_with_drag() {
        let (mut scene, target) = scene_with_target();
        let mut orbit = OrbitControls::default();
        let mut controller = TransformEditController::attach_default(&mut scene, target).unwrap();
        assert_eq!(controller.intent(), EditIntent::Translate);

        fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::DraggingChanged(true));
        assert!(!orbit.enabled);
        assert_eq!(controller.state(), ControllerState::DragActive);

        fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::DraggingChanged(false));
        assert!(orbit.enabled);
        assert_eq!(controller.state(), ControllerState::OrbitActive);
    }

    #[test]
    fn orbit_always_negates_latest_drag_payload() {
        let (mut scene, target) = scene_with_target();
        let mut orbit = OrbitControls::default();
        let mut controller = TransformEditController::attach_default(&mut scene, target).unwrap();
        for dragging in [true, true, false, true, false, false, true] {
            fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::DraggingChanged(dragging));
            assert_eq!(orbit.enabled, !dragging);
        }
    }

    #[test]
    fn scale_intent_reports_rounded_scale() {
        let (mut scene, target) = scene_with_target();
        scene.transform_mut(target).unwrap().scale = Vec3::new(1.23456, -0.001, 2.0);
        let mut orbit = OrbitControls::default();
        let mut controller =
            TransformEditController::attach(&mut scene, target, EditIntent::from_code("S"), true)
                .unwrap();

        let report = fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::Change).unwrap();
        assert_eq!(report.label, "New Scale:");
        assert_eq!(report.value.x, 1.23);
        assert_eq!(report.value.y, 0.0);
        assert!(report.value.y.is_sign_negative());
        assert_eq!(report.value.z, 2.0);
        assert!(report.malformed.is_empty());
        assert_eq!(report.to_string(), "New Scale: { x: 1.23, y: -0, z: 2 }");
        assert_eq!(scene.gizmo(controller.gizmo()).unwrap().mode(), GizmoMode::Scale);
    }

    #[test]
    fn rotate_intent_overrides_external_mode_changes() {
        let (mut scene, target) = scene_with_target();
        scene.transform_mut(target).unwrap().rotation = Vec3::new(0.5, 1.0, -1.5);
        let mut orbit = OrbitControls::default();
        let mut controller =
            TransformEditController::attach(&mut scene, target, EditIntent::Rotate, true).unwrap();

        for key in ['w', 'r', 'e', 'w'] {
            scene.gizmo_mut(controller.gizmo()).unwrap().key_pressed(key);
            let reports = controller.process_events(&mut scene, &mut orbit).unwrap();
            assert_eq!(scene.gizmo(controller.gizmo()).unwrap().mode(), GizmoMode::Rotate);
            for report in &reports {
                assert_eq!(report.label, "New Rotation:");
                assert_eq!(
                    report.value,
                    RoundedVec3 {
                        x: 0.5,
                        y: 1.0,
                        z: -1.5
                    }
                );
            }
        }
    }

    #[test]
    fn drift_is_corrected_in_one_pass() {
        let (mut scene, target) = scene_with_target();
        let mut orbit = OrbitControls::default();
        let mut controller =
            TransformEditController::attach(&mut scene, target, EditIntent::Scale, true).unwrap();

        scene.gizmo_mut(controller.gizmo()).unwrap().key_pressed('w');
        let reports = controller.process_events(&mut scene, &mut orbit).unwrap();
        // 漂移产生的变化 + 拉回 scale 产生的变化
        assert_eq!(reports.len(), 2);
        assert!(controller.process_events(&mut scene, &mut orbit).unwrap().is_empty());
        assert_eq!(scene.gizmo(controller.gizmo()).unwrap().mode(), GizmoMode::Scale);
    }

    #[test]
    fn translate_intent_reports_position() {
        let (mut scene, target) = scene_with_target();
        scene.transform_mut(target).unwrap().position = Vec3::new(0.004, 10.0, -3.333);
        let mut orbit = OrbitControls::default();
        let mut controller =
            TransformEditController::attach(&mut scene, target, EditIntent::from_code("?"), true)
                .unwrap();

        let first = fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::Change).unwrap();
        let second = fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::Change).unwrap();
        assert_eq!(first.label, "New Position:");
        assert_eq!(first, second);
        assert_eq!(first.value.z, -3.33);
        assert_eq!(scene.gizmo(controller.gizmo()).unwrap().mode(), GizmoMode::Translate);
    }

    #[test]
    fn non_finite_components_are_replaced() {
        let (mut scene, target) = scene_with_target();
        scene.transform_mut(target).unwrap().position = Vec3::new(f32::NAN, 1.0, f32::INFINITY);
        let mut orbit = OrbitControls::default();
        let mut controller = TransformEditController::attach_default(&mut scene, target).unwrap();

        let report = fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::Change).unwrap();
        assert_eq!(report.value, RoundedVec3 { x: 0.0, y: 1.0, z: 0.0 });
        let axes: Vec<char> = report.malformed.iter().map(|m| m.axis).collect();
        assert_eq!(axes, vec!['x', 'z']);
    }

    #[test]
    fn change_after_target_removal_fails() {
        let (mut scene, target) = scene_with_target();
        let mut orbit = OrbitControls::default();
        let mut controller = TransformEditController::attach_default(&mut scene, target).unwrap();
        scene.remove(target);
        let err = controller
            .handle_event(&mut scene, &mut orbit, GizmoEvent::Change)
            .unwrap_err();
        assert_eq!(err, TransformEditError::InvalidTarget(target));
    }

    #[test]
    fn detach_removes_gizmo_and_restores_orbit() {
        let (mut scene, target) = scene_with_target();
        let mut orbit = OrbitControls::default();
        let mut controller = TransformEditController::attach_default(&mut scene, target).unwrap();
        fire(&mut controller, &mut scene, &mut orbit, GizmoEvent::DraggingChanged(true));
        assert!(!orbit.enabled);

        let gizmo = controller.gizmo();
        controller.detach(&mut scene, &mut orbit);
        assert!(orbit.enabled);
        assert!(scene.gizmo(gizmo).is_none());
        assert_eq!(scene.gizmo_count(), 0);
        assert!(scene.contains(target));
    }

    #[test]
    fn repeated_attach_detach_does_not_accumulate() {
        let (mut scene, target) = scene_with_target();
        let mut orbit = OrbitControls::default();
        for _ in 0..5 {
            let controller = TransformEditController::attach_default(&mut scene, target).unwrap();
            controller.detach(&mut scene, &mut orbit);
        }
        assert_eq!(scene.gizmo_count(), 0);
    }
}
