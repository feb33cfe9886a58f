//! 标注器 (Annotator): 在帧上绘制检测框和标签

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::detection::types::Detection;

/// 类别颜色 (RGB)
pub const SMOKE_COLOR: [u8; 3] = [0, 255, 0]; // smoke → 绿色
pub const FIRE_COLOR: [u8; 3] = [255, 0, 0]; // fire → 红色
pub const OTHER_COLOR: [u8; 3] = [0, 0, 255]; // 其他类别 → 蓝色

/// 未登记类别的默认颜色
pub const DEFAULT_COLOR: [u8; 3] = OTHER_COLOR;

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;
const LABEL_OFFSET: i32 = 10;

/// 类别 → 颜色, 未登记的类别回退到默认颜色
pub fn class_color(class_id: usize) -> [u8; 3] {
    match class_id {
        0 => SMOKE_COLOR,
        1 => FIRE_COLOR,
        2 => OTHER_COLOR,
        _ => DEFAULT_COLOR,
    }
}

/// 标签文本: "<类别名>: <置信度两位小数>"
pub fn label_text(class_name: &str, confidence: f32) -> String {
    format!("{}: {:.2}", class_name, confidence)
}

pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// 不绘制文字的标注器
    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// 加载字体文件; 失败时只画框不画标签
    pub fn load(font_path: &Path) -> Self {
        let font = match std::fs::read(font_path) {
            Ok(bytes) => match FontVec::try_from_vec_and_index(bytes, 0) {
                Ok(font) => Some(font),
                Err(e) => {
                    log::warn!("⚠️ 标签字体解析失败 {}: {}", font_path.display(), e);
                    None
                }
            },
            Err(_) => {
                log::warn!("⚠️ 未找到标签字体文件: {}", font_path.display());
                None
            }
        };
        Self { font }
    }

    /// 绘制全部检测结果
    pub fn draw<F>(&self, frame: &mut RgbaImage, detections: &[Detection], class_name: F)
    where
        F: Fn(usize) -> String,
    {
        for det in detections {
            let [r, g, b] = class_color(det.class_id);
            let color = Rgba([r, g, b, 255]);
            self.draw_box(frame, det, color);

            if let Some(font) = &self.font {
                let label = label_text(&class_name(det.class_id), det.confidence);
                let x = det.bbox.x1 as i32;
                let y = (det.bbox.y1 as i32 - LABEL_OFFSET).max(0);
                draw_text_mut(frame, color, x, y, PxScale::from(LABEL_SCALE), font, &label);
            }
        }
    }

    fn draw_box(&self, frame: &mut RgbaImage, det: &Detection, color: Rgba<u8>) {
        let x1 = det.bbox.x1.round() as i32;
        let y1 = det.bbox.y1.round() as i32;
        let w = det.bbox.width().round() as i32;
        let h = det.bbox.height().round() as i32;

        // 线宽2: 向内逐圈绘制
        for t in 0..BOX_THICKNESS {
            let (rw, rh) = (w - 2 * t, h - 2 * t);
            if rw <= 0 || rh <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(frame, rect, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;

    #[test]
    fn test_palette() {
        assert_eq!(class_color(0), [0, 255, 0]);
        assert_eq!(class_color(1), [255, 0, 0]);
        assert_eq!(class_color(2), [0, 0, 255]);
        // 未登记类别不报错, 回退默认颜色
        assert_eq!(class_color(42), DEFAULT_COLOR);
    }

    #[test]
    fn test_label_text() {
        assert_eq!(label_text("fire", 0.876), "fire: 0.88");
        assert_eq!(label_text("smoke", 0.5), "smoke: 0.50");
    }

    #[test]
    fn test_draw_box_outline() {
        let mut frame = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let dets = vec![Detection::new(1, 0.9, BBox::new(10., 10., 30., 30.))];
        Annotator::without_font().draw(&mut frame, &dets, |id| id.to_string());

        // 外圈与内圈都是红色, 框内部不变
        assert_eq!(frame.get_pixel(10, 20), &Rgba([255, 0, 0, 255]));
        assert_eq!(frame.get_pixel(11, 20), &Rgba([255, 0, 0, 255]));
        assert_eq!(frame.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_degenerate_box_is_skipped() {
        let mut frame = RgbaImage::new(8, 8);
        let dets = vec![Detection::new(5, 0.3, BBox::new(4., 4., 4., 4.))];
        Annotator::without_font().draw(&mut frame, &dets, |id| id.to_string());
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
