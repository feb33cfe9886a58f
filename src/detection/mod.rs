/// 检测系统 (Detection System)
///
/// - DetectionProvider: 统一检测接口 (模型对上层不透明)
/// - OnnxProvider:      YOLOv8 ONNX 实现
/// - types:             检测框与NMS
pub mod onnx;
pub mod provider;
pub mod types;

pub use onnx::OnnxProvider;
pub use provider::{display_name, DetectionProvider, SavedPrediction};
pub use types::{BBox, Detection, FIRE_CLASS, SMOKE_CLASS};
