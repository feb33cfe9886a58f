//! 检测提供者接口 (Detection Provider)
//!
//! 模型本身对上层是不透明的: 输入一帧图像, 输出检测列表。

use anyhow::Result;
use image::DynamicImage;
use std::path::{Path, PathBuf};

use super::types::Detection;

/// 图片模式的预测结果: 检测列表 + 模型自行保存标注图的目录
#[derive(Debug, Clone)]
pub struct SavedPrediction {
    pub detections: Vec<Detection>,
    pub save_dir: PathBuf,
}

/// 统一的检测接口
pub trait DetectionProvider: Send {
    /// 对单帧执行检测 (视频模式)
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>>;

    /// 对图片文件执行检测并把标注结果保存到新的输出目录 (图片模式)
    ///
    /// 保存的文件名与输入文件名相同。
    fn predict_and_save(&mut self, source: &Path) -> Result<SavedPrediction>;

    /// 类别名称, 未知类别返回 None
    fn class_name(&self, class_id: usize) -> Option<&str>;
}

/// 类别显示名: 优先模型名称, 否则使用数字索引
pub fn display_name(provider: &dyn DetectionProvider, class_id: usize) -> String {
    provider
        .class_name(class_id)
        .map(str::to_string)
        .unwrap_or_else(|| class_id.to_string())
}
