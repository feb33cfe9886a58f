use egui_macroquad::egui;

use crate::events::{DisplayKind, JobOutcome};
use crate::tally::TallySnapshot;

/// 本帧点击的按钮
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlPanelActions {
    pub detect_image: bool,
    pub detect_video: bool,
    pub view_counts: bool,
    pub stop: bool,
}

/// 控制面板显示的运行状态
pub struct ControlPanelStatus<'a> {
    pub running: bool,
    pub active_jobs: usize,
    pub snapshot: TallySnapshot,
    pub last_outcome: Option<&'a (DisplayKind, JobOutcome)>,
    pub model_name: &'a str,
}

/// 主窗口: 四个操作按钮 + 状态
pub struct ControlPanel {
    button_size: egui::Vec2,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            button_size: egui::vec2(200.0, 36.0),
        }
    }

    fn set_style(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(20, 24, 30, 230);
        visuals.widgets.inactive.corner_radius = 4.0.into();
        visuals.widgets.hovered.corner_radius = 4.0.into();
        visuals.widgets.active.corner_radius = 4.0.into();
        visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.5, egui::Color32::WHITE);
        visuals.selection.bg_fill = egui::Color32::from_rgba_premultiplied(100, 150, 255, 100);
        ctx.set_visuals(visuals);
    }

    pub fn show(&mut self, ctx: &egui::Context, status: &ControlPanelStatus) -> ControlPanelActions {
        self.set_style(ctx);

        let mut actions = ControlPanelActions::default();
        egui::Window::new("YOLO 物件偵測")
            .default_pos(egui::pos2(10.0, 10.0))
            .resizable(false)
            .collapsible(true)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.spacing_mut().item_spacing.y = 10.0;
                    actions.detect_image = self.button(ui, "🖼 偵測圖片");
                    actions.detect_video = self.button(ui, "🎬 偵測影片");
                    actions.view_counts = self.button(ui, "📊 查看偵測次數");
                    actions.stop = self.button(ui, "🛑 停止偵測");
                });

                ui.separator();
                self.status_ui(ui, status);
            });
        actions
    }

    fn button(&self, ui: &mut egui::Ui, text: &str) -> bool {
        ui.add_sized(self.button_size, egui::Button::new(text))
            .clicked()
    }

    fn status_ui(&self, ui: &mut egui::Ui, status: &ControlPanelStatus) {
        ui.horizontal(|ui| {
            ui.label("狀態:");
            if status.running {
                ui.colored_label(egui::Color32::GREEN, "運行中");
            } else {
                ui.colored_label(egui::Color32::GRAY, "已停止");
            }
            ui.label(format!("| 任務: {}", status.active_jobs));
        });
        ui.horizontal(|ui| {
            if status.snapshot.is_clear() {
                ui.colored_label(egui::Color32::GREEN, "✅");
            }
            ui.colored_label(
                egui::Color32::from_rgb(255, 120, 80),
                format!("🔥 {}", status.snapshot.fire),
            );
            ui.colored_label(
                egui::Color32::LIGHT_GRAY,
                format!("💨 {}", status.snapshot.smoke),
            );
        });
        if let Some((kind, outcome)) = status.last_outcome {
            let color = match outcome {
                JobOutcome::Failed(_) => egui::Color32::LIGHT_RED,
                _ => egui::Color32::LIGHT_BLUE,
            };
            ui.colored_label(color, format!("{}: {}", kind.title(), outcome));
        }
        ui.small(format!("模型: {}", status.model_name));
        ui.small("按 q 結束影片偵測");
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}
