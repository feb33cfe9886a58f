/// 视频输入系统 (Frame Sources)
///
/// - ImageSource: 固定路径的单张图片
/// - VideoSource: 用户选择的视频文件, FFmpeg 独立线程解码
/// - dialog:      原生文件选择对话框
pub mod decode_filter;
pub mod decoder;
pub mod dialog;
pub mod image_source;

use image::RgbaImage;
use std::time::Duration;

pub use image_source::{load_for_display, ImageSource};
pub use decoder::{frame_delay_ms, VideoSource};
pub use dialog::pick_video_file;

/// 按固定节奏产出帧的来源 (有限序列)
pub trait FrameSource: Send {
    /// 每帧显示时长
    fn frame_delay(&self) -> Duration;

    /// 下一帧, 序列结束返回 None
    fn next_frame(&mut self) -> Option<RgbaImage>;
}
