// tween.rs - 入场动画: 延迟启动的属性补间

use crate::camera::PerspectiveCamera;
use crate::scene::Transform;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TweenProperty {
    SphereRotationX,
    SphereRotationY,
    SphereRotationZ,
    CameraPositionX,
    CameraPositionY,
    CameraPositionZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    Linear,
    /// Quadratic ease-in-out.
    #[default]
    InOut,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TweenSpec {
    pub property: TweenProperty,
    pub to: f32,
    #[serde(default)]
    pub delay: f32,
    pub duration: f32,
    #[serde(default)]
    pub ease: Ease,
}

/// The values an intro timeline is allowed to drive.
pub struct TweenTargets<'a> {
    pub sphere: Option<&'a mut Transform>,
    pub camera: &'a mut PerspectiveCamera,
}

impl TweenTargets<'_> {
    fn slot(&mut self, property: TweenProperty) -> Option<&mut f32> {
        match property {
            TweenProperty::SphereRotationX => self.sphere.as_deref_mut().map(|t| &mut t.rotation.x),
            TweenProperty::SphereRotationY => self.sphere.as_deref_mut().map(|t| &mut t.rotation.y),
            TweenProperty::SphereRotationZ => self.sphere.as_deref_mut().map(|t| &mut t.rotation.z),
            TweenProperty::CameraPositionX => Some(&mut self.camera.position.x),
            TweenProperty::CameraPositionY => Some(&mut self.camera.position.y),
            TweenProperty::CameraPositionZ => Some(&mut self.camera.position.z),
        }
    }
}

#[derive(Debug, Clone)]
struct Tween {
    spec: TweenSpec,
    // 延迟结束时记录起始值
    from: Option<f32>,
    done: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    tweens: Vec<Tween>,
    elapsed: f32,
}

impl Timeline {
    pub fn new(specs: &[TweenSpec]) -> Self {
        Self {
            tweens: specs
                .iter()
                .map(|spec| Tween {
                    spec: *spec,
                    from: None,
                    done: false,
                })
                .collect(),
            elapsed: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tweens.iter().all(|t| t.done)
    }

    pub fn advance(&mut self, dt: f32, targets: &mut TweenTargets<'_>) {
        self.elapsed += dt.max(0.0);

        for tween in self.tweens.iter_mut().filter(|t| !t.done) {
            let local = self.elapsed - tween.spec.delay;
            if local < 0.0 {
                continue;
            }
            let Some(slot) = targets.slot(tween.spec.property) else {
                continue;
            };

            let from = *tween.from.get_or_insert(*slot);
            let progress = if tween.spec.duration <= 0.0 {
                1.0
            } else {
                (local / tween.spec.duration).min(1.0)
            };

            if progress >= 1.0 {
                *slot = tween.spec.to;
                tween.done = true;
            } else {
                *slot = from + (tween.spec.to - from) * tween.spec.ease.apply(progress);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn intro() -> Vec<TweenSpec> {
        let spec = |property, to| TweenSpec {
            property,
            to,
            delay: 2.0,
            duration: 1.5,
            ease: Ease::InOut,
        };
        vec![
            spec(TweenProperty::SphereRotationX, 0.0),
            spec(TweenProperty::CameraPositionZ, 0.1),
            spec(TweenProperty::SphereRotationY, 3.0),
        ]
    }

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(55.0, 1.0, 0.001, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 0.5);
        camera
    }

    #[test]
    fn ease_in_out_is_symmetric() {
        assert_eq!(Ease::InOut.apply(0.0), 0.0);
        assert_eq!(Ease::InOut.apply(0.5), 0.5);
        assert_eq!(Ease::InOut.apply(1.0), 1.0);
        let a = Ease::InOut.apply(0.25);
        let b = Ease::InOut.apply(0.75);
        assert!((a + b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nothing_moves_before_delay() {
        let mut sphere = Transform {
            rotation: Vec3::new(1.37, 0.0, 0.0),
            ..Transform::IDENTITY
        };
        let mut cam = camera();
        let mut timeline = Timeline::new(&intro());
        timeline.advance(
            1.9,
            &mut TweenTargets {
                sphere: Some(&mut sphere),
                camera: &mut cam,
            },
        );
        assert_eq!(sphere.rotation.x, 1.37);
        assert_eq!(cam.position.z, 0.5);
        assert!(!timeline.is_finished());
    }

    #[test]
    fn intro_reaches_targets() {
        let mut sphere = Transform {
            rotation: Vec3::new(1.37, 0.0, 0.0),
            ..Transform::IDENTITY
        };
        let mut cam = camera();
        let mut timeline = Timeline::new(&intro());

        for (dt, check_mid) in [(2.0, false), (0.75, true), (1.0, false)] {
            timeline.advance(
                dt,
                &mut TweenTargets {
                    sphere: Some(&mut sphere),
                    camera: &mut cam,
                },
            );
            if check_mid {
                assert!((sphere.rotation.x - 0.685).abs() < 1e-5);
                assert!((sphere.rotation.y - 1.5).abs() < 1e-5);
                assert!((cam.position.z - 0.3).abs() < 1e-5);
            }
        }

        assert_eq!(sphere.rotation.x, 0.0);
        assert_eq!(sphere.rotation.y, 3.0);
        assert_eq!(cam.position.z, 0.1);
        assert!(timeline.is_finished());
    }

    #[test]
    fn sphere_tweens_wait_for_sphere() {
        let mut cam = camera();
        let mut timeline = Timeline::new(&intro());
        timeline.advance(
            5.0,
            &mut TweenTargets {
                sphere: None,
                camera: &mut cam,
            },
        );
        assert_eq!(cam.position.z, 0.1);
        assert!(!timeline.is_finished());
    }

    #[test]
    fn spec_parses_with_defaults() {
        let spec: TweenSpec =
            serde_json::from_str(r#"{ "property": "camera_position_z", "to": 0.1, "duration": 1.5 }"#)
                .unwrap();
        assert_eq!(spec.property, TweenProperty::CameraPositionZ);
        assert_eq!(spec.delay, 0.0);
        assert_eq!(spec.ease, Ease::InOut);
    }
}
