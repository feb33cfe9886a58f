/// 工作线程 → 界面线程 的消息
use crossbeam_channel::Receiver;
use image::RgbaImage;

/// 两种展示模式 (图片模式由模型自行标注, 视频模式逐帧标注)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayKind {
    Image,
    Video,
}

impl DisplayKind {
    /// 显示窗口标题
    pub fn title(&self) -> &'static str {
        match self {
            DisplayKind::Image => "YOLO Prediction",
            DisplayKind::Video => "YOLO Video Prediction",
        }
    }
}

/// 检测任务的结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { frames: u64 },
    /// 用户取消了文件选择
    NoSelection,
    Cancelled,
    Failed(String),
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Completed { frames } => write!(f, "完成 ({} 帧)", frames),
            JobOutcome::NoSelection => write!(f, "未选择文件"),
            JobOutcome::Cancelled => write!(f, "已取消"),
            JobOutcome::Failed(reason) => write!(f, "失败: {}", reason),
        }
    }
}

#[derive(Debug)]
pub enum UiEvent {
    /// 标注完成的帧; 界面显示并弹出警告面板
    Frame { kind: DisplayKind, image: RgbaImage },
    JobFinished { kind: DisplayKind, outcome: JobOutcome },
    /// 停止检测: 关闭界面
    Shutdown,
}

/// 一次界面刷新内取出的全部事件
///
/// 帧只保留最新的一张, 其余帧只计数, 避免积压的帧逐张上传纹理。
#[derive(Debug, Default)]
pub struct EventBatch {
    pub latest: Option<(DisplayKind, RgbaImage)>,
    /// 本批收到的视频帧数 (含被跳过的)
    pub video_frames: u64,
    pub frames: u64,
    pub finished: Vec<(DisplayKind, JobOutcome)>,
    pub shutdown: bool,
}

impl EventBatch {
    /// 非阻塞地取空通道
    pub fn drain(events: &Receiver<UiEvent>) -> Self {
        let mut batch = Self::default();
        for event in events.try_iter() {
            match event {
                UiEvent::Frame { kind, image } => {
                    batch.frames += 1;
                    if kind == DisplayKind::Video {
                        batch.video_frames += 1;
                    }
                    batch.latest = Some((kind, image));
                }
                UiEvent::JobFinished { kind, outcome } => batch.finished.push((kind, outcome)),
                UiEvent::Shutdown => batch.shutdown = true,
            }
        }
        batch
    }
}
