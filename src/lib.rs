//! 烟雾/火焰检测 (YOLOv8 ONNX + macroquad/egui)
pub mod annotate; // 检测框与标签绘制
pub mod cancel; // 任务取消令牌
pub mod config; // 命令行参数 + JSON配置
pub mod controller; // 检测任务调度
pub mod detection; // 检测模型
pub mod error; // 输入错误
pub mod events; // 工作线程 → 界面线程 消息
pub mod input; // 图片/视频输入
pub mod panel; // 警告与统计弹窗
pub mod renderer; // macroquad + egui 界面
pub mod tally; // 检测次数统计

pub use crate::config::{AppConfig, Args};
pub use crate::controller::{Backend, JobHandle, OnnxBackend, RunController};
pub use crate::events::{DisplayKind, JobOutcome, UiEvent};
pub use crate::renderer::Renderer;
pub use crate::tally::{DetectionTally, TallySnapshot};
