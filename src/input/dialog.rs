/// 原生文件对话框
use std::path::PathBuf;

/// 视频文件扩展名过滤
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "avi"];

/// 弹出"打开文件"对话框选择视频; 用户取消时返回 None
pub fn pick_video_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("選擇影片")
        .add_filter("Video Files", &VIDEO_EXTENSIONS)
        .pick_file()
}
