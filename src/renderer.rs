mod control_panel;

use crossbeam_channel::Receiver;
use egui_macroquad::egui;
use image::RgbaImage;
use macroquad::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::controller::RunController;
use crate::events::{DisplayKind, EventBatch, JobOutcome, UiEvent};
use crate::input::pick_video_file;
use crate::panel::{NotificationSurface, Panel, PanelKind, ALL_CLEAR};
use control_panel::{ControlPanel, ControlPanelActions, ControlPanelStatus};

/// 界面线程: 唯一持有窗口、纹理和弹窗计时的地方
pub struct Renderer {
    controller: RunController,
    events: Receiver<UiEvent>,
    surface: NotificationSurface,
    control_panel: ControlPanel,

    // 当前显示的帧
    last_frame: Option<Texture2D>,
    frame_kind: Option<DisplayKind>,
    last_outcome: Option<(DisplayKind, JobOutcome)>,
    model_name: String,

    // 视频帧率统计
    video_count: u64,
    video_last: Instant,
    video_fps: f64,

    is_keyboard_over_ui: bool,
    shutdown: bool,

    // 中文字体
    chinese_font: Option<Font>,
}

impl Renderer {
    pub fn new(controller: RunController, events: Receiver<UiEvent>, config: &AppConfig) -> Self {
        log::info!("🎨 渲染器启动");
        install_egui_font(&config.font_path);

        let chinese_font = match std::fs::read(&config.font_path) {
            Ok(bytes) => match load_ttf_font_from_bytes(&bytes) {
                Ok(font) => {
                    log::info!("✅ 中文字体加载成功");
                    Some(font)
                }
                Err(e) => {
                    log::warn!("⚠️ 中文字体加载失败: {}", e);
                    None
                }
            },
            Err(_) => {
                log::warn!("⚠️ 未找到中文字体文件: {}", config.font_path.display());
                None
            }
        };

        let model_name = config
            .model_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| config.model_path.display().to_string());

        Self {
            controller,
            events,
            surface: NotificationSurface::new(Duration::from_millis(config.refresh_interval_ms)),
            control_panel: ControlPanel::new(),
            last_frame: None,
            frame_kind: None,
            last_outcome: None,
            model_name,
            video_count: 0,
            video_last: Instant::now(),
            video_fps: 0.0,
            is_keyboard_over_ui: false,
            shutdown: false,
            chinese_font,
        }
    }

    /// 收到停止请求后退出主循环
    pub fn should_quit(&self) -> bool {
        self.shutdown
    }

    /// 处理工作线程事件并刷新到期的弹窗
    pub fn update(&mut self) {
        let now = Instant::now();
        let batch = EventBatch::drain(&self.events);

        self.video_count += batch.video_frames;
        if let Some((kind, image)) = batch.latest {
            self.show_frame(kind, &image);
        }
        if batch.frames > 0 {
            // 每帧都请求警告面板, 已打开时不重复创建
            self.surface
                .alert
                .open(now, self.controller.tally().snapshot());
        }
        if let Some(finished) = batch.finished.into_iter().last() {
            self.last_outcome = Some(finished);
        }
        if batch.shutdown {
            self.shutdown = true;
        }

        self.update_video_fps();
        self.surface.tick(now, self.controller.tally().snapshot());
    }

    fn show_frame(&mut self, kind: DisplayKind, image: &RgbaImage) {
        let (width, height) = image.dimensions();
        // 只在分辨率变化时重建纹理, 否则更新像素数据
        let needs_rebuild = match &self.last_frame {
            Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(width as u16, height as u16, image.as_raw());
            texture.set_filter(FilterMode::Linear);
            self.last_frame = Some(texture);
        } else if let Some(tex) = &self.last_frame {
            tex.update(&Image {
                bytes: image.as_raw().clone(),
                width: width as u16,
                height: height as u16,
            });
        }
        self.frame_kind = Some(kind);
    }

    fn update_video_fps(&mut self) {
        let elapsed = self.video_last.elapsed();
        if elapsed.as_secs() >= 1 {
            self.video_fps = self.video_count as f64 / elapsed.as_secs_f64();
            self.video_count = 0;
            self.video_last = Instant::now();
        }
    }

    pub fn handle_input(&mut self) {
        // q: 结束视频循环
        if !self.is_keyboard_over_ui
            && is_key_pressed(KeyCode::Q)
            && self.frame_kind == Some(DisplayKind::Video)
        {
            self.controller.cancel_video_jobs();
        }
    }

    pub fn draw(&mut self) {
        clear_background(BLACK);

        let Some(texture) = &self.last_frame else {
            return;
        };

        // 等比缩放居中
        let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
        let w = texture.width() * scale;
        let h = texture.height() * scale;
        let x = (screen_width() - w) / 2.0;
        let y = (screen_height() - h) / 2.0;
        draw_texture_ex(
            texture,
            x,
            y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                ..Default::default()
            },
        );

        if let Some(kind) = self.frame_kind {
            let title = match kind {
                DisplayKind::Image => kind.title().to_string(),
                DisplayKind::Video => format!("{} ({:.1} fps)", kind.title(), self.video_fps),
            };
            draw_text_ex(
                &title,
                screen_width() - 360.0,
                28.0,
                TextParams {
                    font: self.chinese_font.as_ref(),
                    font_size: 20,
                    color: WHITE,
                    ..Default::default()
                },
            );
        }
    }

    pub fn draw_egui(&mut self) {
        let mut actions = ControlPanelActions::default();
        egui_macroquad::ui(|egui_ctx| {
            self.is_keyboard_over_ui = egui_ctx.wants_keyboard_input();

            let status = ControlPanelStatus {
                running: self.controller.is_running(),
                active_jobs: self.controller.active_jobs(),
                snapshot: self.controller.tally().snapshot(),
                last_outcome: self.last_outcome.as_ref(),
                model_name: &self.model_name,
            };
            actions = self.control_panel.show(egui_ctx, &status);

            let right = egui_ctx.screen_rect().right();
            show_popup(egui_ctx, &mut self.surface.alert, egui::pos2(right - 320.0, 60.0));
            show_popup(egui_ctx, &mut self.surface.stats, egui::pos2(right - 320.0, 240.0));
        });
        egui_macroquad::draw();

        self.apply_actions(actions);
    }

    fn apply_actions(&mut self, actions: ControlPanelActions) {
        if actions.detect_image {
            if let Err(e) = self.controller.start_image_detection() {
                log::error!("❌ 无法启动图片检测: {:#}", e);
            }
        }
        if actions.detect_video {
            if let Err(e) = self.controller.start_video_detection(pick_video_file) {
                log::error!("❌ 无法启动视频检测: {:#}", e);
            }
        }
        if actions.view_counts {
            self.surface
                .stats
                .open(Instant::now(), self.controller.tally().snapshot());
        }
        if actions.stop {
            self.controller.stop();
        }
    }
}

/// 弹窗: 用户点关闭时结束面板生命周期 (同时取消刷新)
fn show_popup(ctx: &egui::Context, panel: &mut Panel, pos: egui::Pos2) {
    let Some(text) = panel.text() else {
        return;
    };
    let text = text.to_string();
    let refreshed = panel.last_refresh_label();
    let color = if panel.kind() == PanelKind::Alert && text != ALL_CLEAR {
        egui::Color32::from_rgb(255, 80, 80)
    } else {
        egui::Color32::WHITE
    };

    let mut open = true;
    egui::Window::new(panel.kind().title())
        .open(&mut open)
        .default_pos(pos)
        .default_size(egui::vec2(300.0, 150.0))
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(text).size(16.0).strong().color(color));
            if let Some(label) = refreshed {
                ui.small(label);
            }
        });

    if !open {
        panel.close();
    }
}

/// 为 egui 加入中文字体 (作为各字体族的后备)
fn install_egui_font(font_path: &Path) {
    let bytes = match std::fs::read(font_path) {
        Ok(bytes) => bytes,
        Err(_) => {
            log::warn!("⚠️ 界面缺少中文字体: {}", font_path.display());
            return;
        }
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("cjk".to_owned(), egui::FontData::from_owned(bytes).into());
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push("cjk".to_owned());
    }
    egui_macroquad::cfg(|ctx| ctx.set_fonts(fonts.clone()));
}
