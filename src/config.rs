//! 程序配置 - 命令行参数 + JSON配置文件

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 命令行参数 (覆盖配置文件中的同名字段)
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "烟雾/火焰检测 - YOLO 物件偵測", long_about = None)]
pub struct Args {
    /// JSON配置文件路径
    #[arg(short, long, default_value = "firewatch.json")]
    pub config: PathBuf,

    /// ONNX模型权重
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 图片模式的输入图片
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// 图片模式的结果保存根目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 中文字体 (界面与标签)
    #[arg(long)]
    pub font: Option<PathBuf>,
}

/// 应用配置参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    // === 模型 ===
    pub model_path: PathBuf,       // 训练结果权重
    pub class_names: Vec<String>,  // 模型未携带names时使用
    pub iou_threshold: f32,        // NMS IOU阈值

    // === 图片模式 ===
    pub image_path: PathBuf,       // 固定输入图片
    pub output_root: PathBuf,      // 结果保存根目录 (predict, predict2, ...)
    pub image_size: u32,           // 推理输入尺寸
    pub image_conf_threshold: f32, // 置信度阈值
    pub display_size: u32,         // 显示尺寸 (正方形)

    // === 视频模式 ===
    pub video_size: u32,
    pub video_conf_threshold: f32,
    pub fallback_fps: f64, // 视频未报告FPS时使用

    // === 界面 ===
    pub refresh_interval_ms: u64, // 弹窗刷新间隔
    pub font_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("Completeweight/8sbest100.onnx"),
            class_names: vec!["smoke".to_string(), "fire".to_string()],
            iou_threshold: 0.7,

            image_path: PathBuf::from("images.jpg"),
            output_root: PathBuf::from("runs/detect"),
            image_size: 320,
            image_conf_threshold: 0.5,
            display_size: 640,

            video_size: 640,
            video_conf_threshold: 0.25,
            fallback_fps: 30.0,

            refresh_interval_ms: 1000,
            font_path: PathBuf::from("assets/font/msyh.ttc"),
        }
    }
}

impl AppConfig {
    /// 从JSON文件加载配置,文件不存在时写入默认配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(mut config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config.sanitize();
                    config
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 尺寸为0时无法推理或显示, 换回默认值
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        for (name, value, default) in [
            ("image_size", &mut self.image_size, defaults.image_size),
            ("video_size", &mut self.video_size, defaults.video_size),
            ("display_size", &mut self.display_size, defaults.display_size),
        ] {
            if *value == 0 {
                log::warn!("⚠️  {} 不能为0, 使用默认值 {}", name, default);
                *value = default;
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::error!("❌ 保存配置失败: {}", e);
                } else {
                    log::info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => log::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 加载配置文件并应用命令行覆盖
    pub fn from_args(args: &Args) -> Self {
        let mut config = Self::load(&args.config);
        config.apply_overrides(args);
        config
    }

    pub fn apply_overrides(&mut self, args: &Args) {
        if let Some(model) = &args.model {
            self.model_path = model.clone();
        }
        if let Some(image) = &args.image {
            self.image_path = image.clone();
        }
        if let Some(output) = &args.output {
            self.output_root = output.clone();
        }
        if let Some(font) = &args.font {
            self.font_path = font.clone();
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!("🎛️  当前配置:");
        log::info!("  模型: {}", self.model_path.display());
        log::info!("  输入图片: {}", self.image_path.display());
        log::info!("  保存目录: {}", self.output_root.display());
        log::info!(
            "  置信度(图片/视频): {:.2} / {:.2}",
            self.image_conf_threshold,
            self.video_conf_threshold
        );
        log::info!("  弹窗刷新: {}ms", self.refresh_interval_ms);
    }
}
