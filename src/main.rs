// main.rs - 全景查看器 + 变换编辑器: 事件循环、菜单、状态栏与 gizmo 叠加层

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

use panorama_editor::assets::{self, AssetKind, LoadedAsset};
use panorama_editor::config::{self, ViewerConfig};
use panorama_editor::context::SceneContext;
use panorama_editor::gizmo::GizmoMode;
use panorama_editor::renderer::Renderer;
use panorama_editor::transform_edit::EditIntent;

use glam::{Vec2, Vec3};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Menu clicks are collected while egui runs and applied after the frame.
enum UiAction {
    OpenImage(PathBuf),
    ToggleEditor,
    ResetView,
    ToggleFullscreen,
    Exit,
}

struct UiState {
    intent: EditIntent,
    group: bool,
    show_fps: bool,
    is_fullscreen: bool,
    is_loading: bool,
    load_error: Option<String>,
    fps: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let viewer = config::resolve_from_args().unwrap_or_else(|e| {
        log::error!("{}, falling back to built-in defaults", e);
        ViewerConfig::default()
    });

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Panorama Editor")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone(), &viewer))?;
    let mut ctx = SceneContext::new(&viewer, renderer.size.width, renderer.size.height);

    let mut ui = UiState {
        intent: viewer.edit.intent,
        group: viewer.edit.group,
        show_fps: false,
        is_fullscreen: false,
        is_loading: false,
        load_error: None,
        fps: 0.0,
    };

    // 异步加载通道
    let (tx, rx): (Sender<LoadedAsset>, Receiver<LoadedAsset>) = channel();
    if let Some(path) = viewer.panorama.image.clone() {
        ui.is_loading = true;
        assets::spawn_panorama_load(path, tx.clone());
    }
    if let Some(faces) = viewer.background.cubemap.clone() {
        assets::spawn_cubemap_load(faces, tx.clone());
    }

    let mut cursor = Vec2::ZERO;

    // FPS 计算
    let mut last_fps_time = Instant::now();
    let mut last_update = Instant::now();
    let mut frame_count = 0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        // 检查是否有新加载的资源
        while let Ok(asset) = rx.try_recv() {
            match asset {
                LoadedAsset::Panorama(rgba) => {
                    renderer.load_panorama(rgba);
                    ui.is_loading = false;
                    ui.load_error = None;
                    let (sphere, fresh) = ctx.spawn_panorama_sphere();
                    if fresh && viewer.edit.attach_on_load {
                        if let Err(e) = ctx.attach_editor(sphere, ui.intent, ui.group) {
                            log::warn!("could not attach editor: {}", e);
                        }
                    }
                }
                LoadedAsset::Cubemap(faces) => renderer.load_cubemap(&faces),
                LoadedAsset::Failed { kind, error } => {
                    if kind == AssetKind::Panorama {
                        ui.is_loading = false;
                    }
                    ui.load_error = Some(error.to_string());
                }
            }
        }

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);

                // 松开左键或失去焦点总是结束拖拽, 不管指针是否在面板上
                let released = matches!(
                    event,
                    WindowEvent::MouseInput {
                        state: ElementState::Released,
                        button: MouseButton::Left,
                        ..
                    } | WindowEvent::Focused(false)
                );
                if released {
                    ctx.pointer_up();
                }

                // 拖拽 gizmo 时 egui 不能吞掉指针事件
                if response.consumed && !ctx.is_dragging() {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        ctx.resize(new_size.width, new_size.height);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                        ctx.resize(new_inner_size.width, new_inner_size.height);
                    }

                    // 键盘快捷键
                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::O) => {
                                    if let Some(path) = pick_image() {
                                        ui.is_loading = true;
                                        assets::spawn_panorama_load(path, tx.clone());
                                    }
                                }
                                Some(VirtualKeyCode::F11) => {
                                    toggle_fullscreen(&window, &mut ui);
                                }
                                Some(VirtualKeyCode::T) => {
                                    toggle_editor(&mut ctx, &ui);
                                }
                                Some(VirtualKeyCode::Escape) => {
                                    ctx.detach_editors();
                                }
                                Some(VirtualKeyCode::W) => {
                                    ctx.key_pressed('w');
                                }
                                Some(VirtualKeyCode::E) => {
                                    ctx.key_pressed('e');
                                }
                                Some(VirtualKeyCode::R) => {
                                    ctx.key_pressed('r');
                                }
                                _ => {}
                            }
                        }
                    }

                    // 鼠标交互: 先 gizmo, 后轨道控制
                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left && state == ElementState::Pressed {
                            ctx.pointer_down(cursor);
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = Vec2::new(position.x as f32, position.y as f32);
                        ctx.pointer_move(cursor);
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                        };
                        ctx.wheel(scroll);
                    }

                    WindowEvent::DroppedFile(path) => {
                        ui.is_loading = true;
                        assets::spawn_panorama_load(path, tx.clone());
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                let now = Instant::now();
                let dt = now.duration_since(last_update).as_secs_f32().min(0.1);
                last_update = now;

                // FPS 统计
                frame_count += 1;
                if now.duration_since(last_fps_time).as_secs_f32() >= 1.0 {
                    ui.fps = frame_count as f32 / now.duration_since(last_fps_time).as_secs_f32();
                    frame_count = 0;
                    last_fps_time = now;
                }

                ctx.update(dt);
                renderer.update_scene(&ctx);

                // 渲染 UI 和 场景
                let mut actions = Vec::new();
                let render_result = renderer.render_with_ui(&window, ctx.sphere().is_some(), |egui_ctx| {
                    draw_gizmos(egui_ctx, &ctx);
                    draw_ui(egui_ctx, &ctx, &mut ui, &mut actions);
                });

                for action in actions {
                    match action {
                        UiAction::OpenImage(path) => {
                            ui.is_loading = true;
                            assets::spawn_panorama_load(path, tx.clone());
                        }
                        UiAction::ToggleEditor => toggle_editor(&mut ctx, &ui),
                        UiAction::ResetView => {
                            ctx.camera.position = Vec3::from_array(viewer.camera.position);
                            ctx.camera.target = ctx.orbit.target;
                        }
                        UiAction::ToggleFullscreen => toggle_fullscreen(&window, &mut ui),
                        UiAction::Exit => *control_flow = ControlFlow::Exit,
                    }
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory, exiting");
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(e) => log::warn!("render error: {:?}", e),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            Event::LoopDestroyed => {
                ctx.teardown();
                log::info!("scene torn down");
            }

            _ => {}
        }
    })
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", &IMAGE_EXTENSIONS)
        .pick_file()
}

fn toggle_fullscreen(window: &Window, ui: &mut UiState) {
    ui.is_fullscreen = !ui.is_fullscreen;
    if ui.is_fullscreen {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    } else {
        window.set_fullscreen(None);
    }
}

/// Attaches an editor to the sphere, or detaches all editors if any exist.
fn toggle_editor(ctx: &mut SceneContext, ui: &UiState) {
    if !ctx.controllers().is_empty() {
        ctx.detach_editors();
        return;
    }
    match ctx.sphere() {
        Some(sphere) => {
            if let Err(e) = ctx.attach_editor(sphere, ui.intent, ui.group) {
                log::warn!("could not attach editor: {}", e);
            }
        }
        None => log::warn!("no panorama loaded, nothing to edit"),
    }
}

// gizmo 坐标是物理像素, egui 使用逻辑点
fn draw_gizmos(egui_ctx: &egui::Context, ctx: &SceneContext) {
    let painter = egui_ctx.layer_painter(egui::LayerId::new(
        egui::Order::Background,
        egui::Id::new("gizmo_overlay"),
    ));
    let ppp = egui_ctx.pixels_per_point();
    let to_pos = |v: Vec2| egui::pos2(v.x / ppp, v.y / ppp);

    for overlay in ctx.scene.gizmo_overlays(&ctx.camera, ctx.viewport()) {
        for handle in &overlay.handles {
            let [r, g, b] = handle.axis.color();
            let active = overlay.hovered == Some(handle.axis);
            let color = if active {
                egui::Color32::from_rgb(255, 255, 0)
            } else {
                egui::Color32::from_rgb(r, g, b)
            };
            let width = if active && overlay.dragging { 4.0 } else { 2.5 };
            let (origin, tip) = (to_pos(handle.origin), to_pos(handle.tip));

            painter.line_segment([origin, tip], egui::Stroke::new(width, color));
            match overlay.mode {
                GizmoMode::Translate => {
                    painter.circle_filled(tip, 5.0, color);
                }
                GizmoMode::Rotate => {
                    painter.circle_stroke(tip, 6.0, egui::Stroke::new(2.0, color));
                }
                GizmoMode::Scale => {
                    painter.rect_filled(egui::Rect::from_center_size(tip, egui::vec2(9.0, 9.0)), 0.0, color);
                }
            }
        }
    }
}

fn draw_ui(
    egui_ctx: &egui::Context,
    ctx: &SceneContext,
    ui_state: &mut UiState,
    actions: &mut Vec<UiAction>,
) {
    egui::TopBottomPanel::top("menu_bar").show(egui_ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            // 文件
            ui.menu_button("File", |ui| {
                if ui.button("Open Image... (O)").clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_image() {
                        actions.push(UiAction::OpenImage(path));
                    }
                }
                if ui.button("Exit").clicked() {
                    actions.push(UiAction::Exit);
                }
            });

            // 视图
            ui.menu_button("View", |ui| {
                if ui.button("Reset View").clicked() {
                    actions.push(UiAction::ResetView);
                    ui.close_menu();
                }
                let label = if ui_state.is_fullscreen {
                    "Exit Fullscreen (F11)"
                } else {
                    "Fullscreen (F11)"
                };
                if ui.button(label).clicked() {
                    actions.push(UiAction::ToggleFullscreen);
                    ui.close_menu();
                }
                ui.separator();
                if ui.checkbox(&mut ui_state.show_fps, "Show FPS").clicked() {
                    ui.close_menu();
                }
            });

            // 编辑
            ui.menu_button("Edit", |ui| {
                let label = if ctx.controllers().is_empty() {
                    "Attach Editor (T)"
                } else {
                    "Detach Editor (T)"
                };
                if ui
                    .add_enabled(ctx.sphere().is_some(), egui::Button::new(label))
                    .clicked()
                {
                    actions.push(UiAction::ToggleEditor);
                    ui.close_menu();
                }
                ui.separator();
                ui.label("Intent for the next editor:");
                for intent in [EditIntent::Translate, EditIntent::Rotate, EditIntent::Scale] {
                    ui.radio_value(&mut ui_state.intent, intent, format!("{:?} ({})", intent, intent.code()));
                }
                ui.checkbox(&mut ui_state.group, "Group");
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(egui_ctx, |ui| {
        ui.horizontal(|ui| {
            if ui_state.is_loading {
                ui.label(egui::RichText::new("Loading image...").color(egui::Color32::YELLOW));
                ui.label("|");
            }

            if let Some(error) = &ui_state.load_error {
                ui.label(egui::RichText::new(error).color(egui::Color32::RED));
                ui.label("|");
            }

            let orbit = match (ctx.orbit.enabled, ctx.orbit.is_rotating()) {
                (false, _) => "Orbit: off",
                (true, true) => "Orbit: rotating",
                (true, false) => "Orbit: on",
            };
            ui.label(orbit);

            if let Some(controller) = ctx.controllers().first() {
                ui.label("|");
                let name = ctx
                    .scene
                    .node(controller.target())
                    .map(|n| n.name.as_str())
                    .unwrap_or("?");
                let group = if controller.group() { " [group]" } else { "" };
                ui.label(format!("Editing {}{}: {:?}", name, group, controller.intent()));
                if let Some(gizmo) = ctx.scene.gizmo(controller.gizmo()) {
                    ui.label("|");
                    ui.label(format!("Gizmo: {}", gizmo.mode().as_str()));
                }
            }

            if ctx.intro_running() {
                ui.label("|");
                ui.label("Intro");
            }

            if let Some(report) = ctx.last_report() {
                ui.label("|");
                ui.label(report.to_string());
            }

            if ui_state.show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {:.1}", ui_state.fps)).color(egui::Color32::GREEN),
                );
            }
        });
    });
}
