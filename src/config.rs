// config.rs - 场景配置 (JSON) 与命令行/环境变量覆盖
//
// 加载顺序:
// - 命令行 `--config <path>`，否则环境变量 `PANORAMA_CONFIG`
// - 没有配置文件: 使用内置默认值 (不加载图片, 不开雾)
// - 最后 `--image` / `--edit` / `--cubemap-dir` 覆盖单个字段

use crate::transform_edit::EditIntent;
use crate::tween::{Ease, TweenProperty, TweenSpec};
use serde::Deserialize;
use std::f32::consts::PI;
use std::path::{Path, PathBuf};

/// Cubemap faces in upload order: +X, -X, +Y, -Y, +Z, -Z.
pub const CUBEMAP_FACE_FILES: [&str; 6] = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PanoramaConfig {
    pub image: Option<PathBuf>,
    pub radius: f32,
    pub width_segments: usize,
    pub height_segments: usize,
    /// Sphere rotation (radians) when the intro starts.
    pub initial_rotation: [f32; 3],
    /// Distance fade: alpha *= clamp(5.4 - distance / 2, 0, 1) * opacity.
    pub fade: bool,
    pub opacity: f32,
}

impl Default for PanoramaConfig {
    fn default() -> Self {
        Self {
            image: None,
            radius: 0.1,
            width_segments: 360,
            height_segments: 64,
            initial_rotation: [1.37, 0.0, 0.0],
            fade: false,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 55.0,
            near: 0.001,
            far: 1000.0,
            position: [0.0, 0.0, 0.5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            enable_zoom: false,
            rotate_speed: 1.0,
            min_polar_angle: PI / 3.0,
            max_polar_angle: PI,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            color: [1.0, 0.0, 0.0],
            near: 0.0,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub clear_color: [f64; 4],
    pub cubemap: Option<[PathBuf; 6]>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            cubemap: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub intent: EditIntent,
    pub group: bool,
    /// Attach an editor to the sphere as soon as it appears.
    pub attach_on_load: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            intent: EditIntent::Translate,
            group: true,
            attach_on_load: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub panorama: PanoramaConfig,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    pub fog: Option<FogConfig>,
    pub background: BackgroundConfig,
    pub intro: Vec<TweenSpec>,
    pub edit: EditConfig,
}

fn default_intro() -> Vec<TweenSpec> {
    let tween = |property, to| TweenSpec {
        property,
        to,
        delay: 2.0,
        duration: 1.5,
        ease: Ease::InOut,
    };
    vec![
        tween(TweenProperty::SphereRotationX, 0.0),
        tween(TweenProperty::CameraPositionZ, 0.1),
        tween(TweenProperty::SphereRotationY, 3.0),
    ]
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            panorama: PanoramaConfig::default(),
            camera: CameraConfig::default(),
            orbit: OrbitConfig::default(),
            fog: None,
            background: BackgroundConfig::default(),
            intro: default_intro(),
            edit: EditConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)
    }
}

/// Values taken from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub edit: Option<EditIntent>,
    pub cubemap_dir: Option<PathBuf>,
}

impl CliArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut out = Self::default();
        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--config" => out.config = it.next().map(PathBuf::from),
                "--image" => out.image = it.next().map(PathBuf::from),
                "--edit" => out.edit = it.next().map(EditIntent::from),
                "--cubemap-dir" => out.cubemap_dir = it.next().map(PathBuf::from),
                _ => {}
            }
        }
        out
    }

    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(image) = &self.image {
            config.panorama.image = Some(image.clone());
        }
        if let Some(intent) = self.edit {
            config.edit.intent = intent;
            config.edit.attach_on_load = true;
        }
        if let Some(dir) = &self.cubemap_dir {
            config.background.cubemap = Some(CUBEMAP_FACE_FILES.map(|f| dir.join(f)));
        }
    }
}

/// Resolve config from CLI/env.
pub fn resolve_from_args() -> Result<ViewerConfig, ConfigError> {
    let cli = CliArgs::parse(std::env::args().skip(1));

    let path = cli.config.clone().or_else(|| {
        std::env::var("PANORAMA_CONFIG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });

    let mut config = match path {
        Some(p) => ViewerConfig::load(&p)?,
        None => ViewerConfig::default(),
    };
    cli.apply(&mut config);
    Ok(config)
}
