// YOLOv8 ONNX 检测器
// 包含: 模型加载、预处理、推理、后处理、结果保存

use anyhow::{bail, Context, Result};
use fast_image_resize as fr;
use image::{DynamicImage, GenericImageView};
use ndarray::{s, ArrayViewD, Axis, IxDyn};
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;
use std::path::{Path, PathBuf};

use super::provider::{DetectionProvider, SavedPrediction};
use super::types::{non_max_suppression, BBox, Detection};
use crate::annotate::Annotator;
use crate::config::AppConfig;

const CXYWH_OFFSET: usize = 4;
/// 预处理填充灰度 (Ultralytics letterbox 使用 114)
const PAD_VALUE: f32 = 114.0 / 255.0;

/// 推理参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    pub size: u32,
    pub conf: f32,
    pub iou: f32,
}

/// YOLOv8 检测模型
pub struct OnnxProvider {
    session: Session,
    input_name: String,
    names: Vec<String>,
    video: InferenceParams,
    image: InferenceParams,
    output_root: PathBuf,
    annotator: Annotator,
}

impl OnnxProvider {
    /// 从配置创建检测模型
    pub fn new(config: &AppConfig) -> Result<Self> {
        let path = &config.model_path;
        if !path.exists() {
            bail!("模型文件不存在: {}", path.display());
        }

        let builder = Session::builder().context("创建 ORT SessionBuilder 失败")?;
        #[cfg(feature = "cuda")]
        let builder = builder
            .with_execution_providers([ort::execution_providers::CUDAExecutionProvider::default()
                .build()])
            .context("注册 CUDA 执行器失败")?;
        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("加载模型失败: {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("模型没有输入")?;

        // 类别名称: 优先模型元数据 (Ultralytics 导出的 names), 否则使用配置
        let names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .map(|raw| parse_names(&raw))
            .filter(|names| !names.is_empty())
            .unwrap_or_else(|| config.class_names.clone());

        log::info!("✅ YOLOv8 检测模型加载成功: {}", path.display());
        log::info!("🏷️ 类别: {:?}", names);

        Ok(Self {
            session,
            input_name,
            names,
            video: InferenceParams {
                size: config.video_size,
                conf: config.video_conf_threshold,
                iou: config.iou_threshold,
            },
            image: InferenceParams {
                size: config.image_size,
                conf: config.image_conf_threshold,
                iou: config.iou_threshold,
            },
            output_root: config.output_root.clone(),
            annotator: Annotator::load(&config.font_path),
        })
    }

    fn infer(&mut self, img: &DynamicImage, params: InferenceParams) -> Result<Vec<Detection>> {
        let t_pre = std::time::Instant::now();
        let (input, letterbox) = preprocess(img, params.size)?;
        log::debug!("[Model Preprocess]: {:?}", t_pre.elapsed());

        let t_run = std::time::Instant::now();
        let side = params.size as usize;
        let tensor = Tensor::from_array(([1usize, 3, side, side], input.into_boxed_slice()))
            .context("创建输入张量失败")?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .context("YOLOv8 推理失败")?;
        log::debug!("[Model Inference]: {:?}", t_run.elapsed());

        let (_, value) = outputs.iter().next().context("模型没有输出")?;
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .context("提取输出张量失败")?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let preds = ArrayViewD::from_shape(IxDyn(&dims), data).context("输出形状异常")?;

        let (w0, h0) = img.dimensions();
        Ok(postprocess(
            preds,
            letterbox,
            (w0 as f32, h0 as f32),
            params.conf,
            params.iou,
        ))
    }
}

impl DetectionProvider for OnnxProvider {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>> {
        let params = self.video;
        self.infer(frame, params)
    }

    fn predict_and_save(&mut self, source: &Path) -> Result<SavedPrediction> {
        let img = image::open(source)
            .with_context(|| format!("读取图片失败: {}", source.display()))?;
        let params = self.image;
        let detections = self.infer(&img, params)?;

        let save_dir = next_save_dir(&self.output_root, "predict")?;
        std::fs::create_dir_all(&save_dir)
            .with_context(|| format!("创建输出目录失败: {}", save_dir.display()))?;

        let mut canvas = img.to_rgba8();
        let names = &self.names;
        self.annotator.draw(&mut canvas, &detections, |id| {
            names.get(id).cloned().unwrap_or_else(|| id.to_string())
        });

        let file_name = source.file_name().context("输入路径没有文件名")?;
        let out_path = save_dir.join(file_name);
        DynamicImage::ImageRgba8(canvas)
            .to_rgb8()
            .save(&out_path)
            .with_context(|| format!("保存结果失败: {}", out_path.display()))?;
        log::info!("💾 结果已保存到 {}", out_path.display());

        Ok(SavedPrediction {
            detections,
            save_dir,
        })
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 预处理的缩放比例与四周填充, 后处理据此把框映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub ratio: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

/// 预处理: 等比缩放后居中, 四周填充灰色, 输出 NCHW 浮点数据
pub fn preprocess(img: &DynamicImage, size: u32) -> Result<(Vec<f32>, Letterbox)> {
    if size == 0 {
        bail!("推理尺寸不能为0");
    }
    let rgb = img.to_rgb8();
    let (w0, h0) = rgb.dimensions();
    if w0 == 0 || h0 == 0 {
        bail!("空图像");
    }
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, size as f32, size as f32);
    let w_new = (w_new as u32).clamp(1, size);
    let h_new = (h_new as u32).clamp(1, size);
    let letterbox = Letterbox {
        ratio,
        pad_x: (size - w_new) / 2,
        pad_y: (size - h_new) / 2,
    };

    let src = fr::images::ImageRef::new(w0, h0, rgb.as_raw(), fr::PixelType::U8x3)
        .context("创建缩放源图像失败")?;
    let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("缩放失败")?;
    let raw = dst.buffer();

    let side = size as usize;
    let plane = side * side;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    let mut data = vec![PAD_VALUE; 3 * plane];
    for y in 0..h_new as usize {
        for x in 0..w_new as usize {
            let src_idx = (y * w_new as usize + x) * 3;
            let dst_idx = (y + pad_y) * side + x + pad_x;
            data[dst_idx] = raw[src_idx] as f32 / 255.0;
            data[plane + dst_idx] = raw[src_idx + 1] as f32 / 255.0;
            data[2 * plane + dst_idx] = raw[src_idx + 2] as f32 / 255.0;
        }
    }
    Ok((data, letterbox))
}

/// 后处理: [1, 4 + nc, N] → 检测结果 (原图坐标)
pub fn postprocess(
    preds: ArrayViewD<'_, f32>,
    letterbox: Letterbox,
    original: (f32, f32),
    conf: f32,
    iou: f32,
) -> Vec<Detection> {
    let (width_original, height_original) = original;
    let mut data = Vec::new();
    if preds.ndim() != 3 || preds.shape()[1] <= CXYWH_OFFSET {
        log::warn!("⚠️ 未知的输出形状: {:?}", preds.shape());
        return data;
    }

    let Letterbox {
        ratio,
        pad_x,
        pad_y,
    } = letterbox;
    let anchor = preds.index_axis(Axis(0), 0);
    for pred in anchor.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < conf {
            continue;
        }

        let bbox = BBox::from_cxcywh(
            (bbox[0] - pad_x as f32) / ratio,
            (bbox[1] - pad_y as f32) / ratio,
            bbox[2] / ratio,
            bbox[3] / ratio,
        )
        .clamp(width_original, height_original);
        data.push(Detection::new(id, confidence, bbox));
    }

    non_max_suppression(&mut data, iou);
    data
}

/// 解析 Ultralytics 元数据中的类别表, 如 "{0: 'smoke', 1: 'fire'}"
pub fn parse_names(raw: &str) -> Vec<String> {
    let re = match Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    let mut pairs: Vec<(usize, String)> = re
        .captures_iter(raw)
        .filter_map(|cap| Some((cap[1].parse().ok()?, cap[2].to_string())))
        .collect();
    pairs.sort_by_key(|(id, _)| *id);

    let len = pairs.last().map(|(id, _)| id + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(|id| id.to_string()).collect();
    for (id, name) in pairs {
        names[id] = name;
    }
    names
}

/// 下一个未使用的保存目录: root/predict, root/predict2, root/predict3 ...
pub fn next_save_dir(root: &Path, name: &str) -> Result<PathBuf> {
    let first = root.join(name);
    if !first.exists() {
        return Ok(first);
    }
    for n in 2..10_000 {
        let candidate = root.join(format!("{}{}", name, n));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    bail!("保存目录已用尽: {}", root.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_names("{0: 'smoke', 1: 'fire'}"), vec!["smoke", "fire"]);
        assert_eq!(parse_names(r#"{1: "fire", 0: "smoke"}"#), vec!["smoke", "fire"]);
        assert_eq!(parse_names("{0: 'a', 2: 'c'}"), vec!["a", "1", "c"]);
        assert!(parse_names("garbage").is_empty());
    }

    #[test]
    fn test_next_save_dir() {
        let root = tempfile::tempdir().unwrap();
        let first = next_save_dir(root.path(), "predict").unwrap();
        assert_eq!(first, root.path().join("predict"));

        std::fs::create_dir_all(&first).unwrap();
        let second = next_save_dir(root.path(), "predict").unwrap();
        assert_eq!(second, root.path().join("predict2"));

        std::fs::create_dir_all(&second).unwrap();
        assert_eq!(
            next_save_dir(root.path(), "predict").unwrap(),
            root.path().join("predict3")
        );
    }

    #[test]
    fn test_preprocess_layout() {
        // 200x100 红色图 → 64x64: 有效区域 64x32 居中, 上下各填充 16 行
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            200,
            100,
            image::Rgb([255, 0, 0]),
        ));
        let (data, letterbox) = preprocess(&img, 64).unwrap();
        assert_eq!(data.len(), 3 * 64 * 64);
        assert!((letterbox.ratio - 0.32).abs() < 1e-6);
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0, 16));

        let plane = 64 * 64;
        assert_eq!(data[0], PAD_VALUE); // 第一行为填充
        assert_eq!(data[63 * 64], PAD_VALUE); // 最后一行为填充
        let center = 32 * 64 + 32;
        assert!((data[center] - 1.0).abs() < 1e-3); // R
        assert!(data[plane + center].abs() < 1e-3); // G
    }

    #[test]
    fn test_preprocess_rejects_zero_size() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(8, 8));
        assert!(preprocess(&img, 0).is_err());
    }

    fn preds_from(candidates: &[[f32; 6]]) -> Array3<f32> {
        // [1, 6, N]: cx, cy, w, h, smoke, fire
        let mut preds = Array3::<f32>::zeros((1, 6, candidates.len()));
        for (i, c) in candidates.iter().enumerate() {
            for (k, v) in c.iter().enumerate() {
                preds[[0, k, i]] = *v;
            }
        }
        preds
    }

    fn plain(ratio: f32) -> Letterbox {
        Letterbox {
            ratio,
            pad_x: 0,
            pad_y: 0,
        }
    }

    #[test]
    fn test_postprocess_decodes_and_filters() {
        let preds = preds_from(&[
            [50., 50., 20., 20., 0.9, 0.1],
            [52., 50., 20., 20., 0.8, 0.1], // 同类别重叠, 被NMS抑制
            [150., 150., 10., 10., 0.2, 0.3], // 低于阈值
        ]);

        let dets = postprocess(preds.view().into_dyn(), plain(0.5), (400., 400.), 0.5, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 0);
        assert_eq!(dets[0].bbox, BBox::new(80., 80., 120., 120.));
    }

    #[test]
    fn test_postprocess_keeps_smoke_over_fire() {
        let preds = preds_from(&[
            [100., 100., 80., 80., 0.9, 0.05],
            [102., 102., 80., 80., 0.05, 0.85],
        ]);

        let dets = postprocess(preds.view().into_dyn(), plain(1.0), (640., 640.), 0.25, 0.7);
        let mut classes: Vec<usize> = dets.iter().map(|d| d.class_id).collect();
        classes.sort();
        assert_eq!(classes, vec![0, 1]);
    }

    #[test]
    fn test_postprocess_removes_padding() {
        // 输入 64x64, 原图 200x100: ratio 0.32, 上方填充 16
        let preds = preds_from(&[[32., 32., 32., 16., 0.9, 0.0]]);
        let letterbox = Letterbox {
            ratio: 0.32,
            pad_x: 0,
            pad_y: 16,
        };
        let dets = postprocess(preds.view().into_dyn(), letterbox, (200., 100.), 0.5, 0.5);
        let b = dets[0].bbox;
        assert!((b.x1 - 50.).abs() < 1e-3 && (b.x2 - 150.).abs() < 1e-3);
        assert!((b.y1 - 25.).abs() < 1e-3 && (b.y2 - 75.).abs() < 1e-3);
    }

    #[test]
    fn test_postprocess_clamps_to_image() {
        let mut preds = Array3::<f32>::zeros((1, 5, 1));
        for (k, v) in [5., 5., 20., 20., 0.9].iter().enumerate() {
            preds[[0, k, 0]] = *v;
        }
        let dets = postprocess(preds.view().into_dyn(), plain(1.0), (100., 100.), 0.5, 0.5);
        assert_eq!(dets[0].bbox, BBox::new(0., 0., 15., 15.));
    }
}
