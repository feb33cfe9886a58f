/// 静态图片输入
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// 单张图片来源 (固定路径)
#[derive(Debug, Clone)]
pub struct ImageSource {
    path: PathBuf,
}

impl ImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 输入图片必须存在
    pub fn ensure_exists(&self) -> Result<&Path, SourceError> {
        if self.path.is_file() {
            Ok(&self.path)
        } else {
            Err(SourceError::MissingInput(self.path.clone()))
        }
    }

    pub fn load(&self) -> Result<DynamicImage, SourceError> {
        let path = self.ensure_exists()?;
        image::open(path).map_err(|e| SourceError::unreadable(path, e))
    }
}

/// 读取图片并缩放到 size×size 的展示尺寸
pub fn load_for_display(path: &Path, size: u32) -> Result<RgbaImage, SourceError> {
    let img = ImageSource::new(path).load()?;
    Ok(img.resize_exact(size, size, FilterType::Triangle).to_rgba8())
}
