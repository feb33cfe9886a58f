//! 输入错误分类
//!
//! 所有错误都只输出到控制台,任务结束后界面回到空闲状态,不弹出错误对话框。

use std::path::PathBuf;

/// 帧来源错误 (Frame source errors)
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// 预期的输入图片不存在
    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// 视频文件无法打开或没有视频流
    #[error("unreadable media {}: {reason}", .path.display())]
    UnreadableMedia { path: PathBuf, reason: String },
}

impl SourceError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::UnreadableMedia {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
