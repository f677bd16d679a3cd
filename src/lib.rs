// lib.rs - 全景查看器的场景、变换编辑与渲染模块

pub mod assets;
pub mod camera;
pub mod config;
pub mod context;
pub mod gizmo;
pub mod mesh;
pub mod orbit;
pub mod renderer;
pub mod scene;
pub mod transform_edit;
pub mod tween;
