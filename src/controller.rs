//! 运行控制器 (Run Controller)
//!
//! 每个界面操作启动一个后台检测线程并立即返回。线程之间共享:
//! - `Arc<DetectionTally>`: 原子计数
//! - `CancelToken`: 每个任务一个, `stop()` / `q` 键用来中断
//! - `Sender<UiEvent>`: 工作线程从不直接操作界面, 只发送事件

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::annotate::Annotator;
use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::detection::{display_name, DetectionProvider, OnnxProvider};
use crate::error::SourceError;
use crate::events::{DisplayKind, JobOutcome, UiEvent};
use crate::input::{load_for_display, FrameSource, ImageSource, VideoSource};
use crate::tally::DetectionTally;

/// 模型与视频解码的创建入口
pub trait Backend: Send + Sync + 'static {
    fn load_provider(&self) -> Result<Box<dyn DetectionProvider>>;

    fn open_video(
        &self,
        path: &Path,
        cancel: CancelToken,
    ) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// ONNX Runtime + FFmpeg
pub struct OnnxBackend {
    config: AppConfig,
}

impl OnnxBackend {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl Backend for OnnxBackend {
    fn load_provider(&self) -> Result<Box<dyn DetectionProvider>> {
        Ok(Box::new(OnnxProvider::new(&self.config)?))
    }

    fn open_video(
        &self,
        path: &Path,
        cancel: CancelToken,
    ) -> Result<Box<dyn FrameSource>, SourceError> {
        let source = VideoSource::open(path, self.config.fallback_fps, cancel)?;
        Ok(Box::new(source))
    }
}

struct JobEntry {
    id: u64,
    kind: DisplayKind,
    cancel: CancelToken,
}

/// 已启动任务的句柄, 可以忽略
pub struct JobHandle {
    thread: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// 等待任务结束
    pub fn join(self) -> JobOutcome {
        self.thread
            .join()
            .unwrap_or_else(|_| JobOutcome::Failed("detection thread panicked".to_string()))
    }
}

/// 单个任务线程持有的共享资源
struct JobContext {
    cancel: CancelToken,
    tally: Arc<DetectionTally>,
    events: Sender<UiEvent>,
    backend: Arc<dyn Backend>,
    config: Arc<AppConfig>,
    annotator: Arc<Annotator>,
}

impl JobContext {
    fn emit_frame(&self, kind: DisplayKind, image: image::RgbaImage) {
        // 界面已退出时丢弃
        let _ = self.events.send(UiEvent::Frame { kind, image });
    }
}

pub struct RunController {
    run_flag: Arc<AtomicBool>,
    next_id: AtomicU64,
    jobs: Arc<Mutex<Vec<JobEntry>>>,
    tally: Arc<DetectionTally>,
    backend: Arc<dyn Backend>,
    config: Arc<AppConfig>,
    annotator: Arc<Annotator>,
    events: Sender<UiEvent>,
}

impl RunController {
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        tally: Arc<DetectionTally>,
        events: Sender<UiEvent>,
    ) -> Self {
        let annotator = Arc::new(Annotator::load(&config.font_path));
        Self::with_annotator(config, backend, tally, events, annotator)
    }

    pub fn with_annotator(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        tally: Arc<DetectionTally>,
        events: Sender<UiEvent>,
        annotator: Arc<Annotator>,
    ) -> Self {
        Self {
            run_flag: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(1),
            jobs: Arc::new(Mutex::new(Vec::new())),
            tally,
            backend,
            config: Arc::new(config),
            annotator,
            events,
        }
    }

    pub fn tally(&self) -> &Arc<DetectionTally> {
        &self.tally
    }

    /// 运行标志 (仅用于显示, 实际中断依靠取消令牌)
    pub fn is_running(&self) -> bool {
        self.run_flag.load(Ordering::SeqCst)
    }

    pub fn active_jobs(&self) -> usize {
        lock_jobs(&self.jobs).len()
    }

    /// 图片检测: 固定输入图片 → 模型预测并保存 → 读回保存结果显示
    pub fn start_image_detection(&self) -> Result<JobHandle> {
        self.launch(DisplayKind::Image, run_image_job)
    }

    /// 视频检测: `picker` 在工作线程中调用, 返回 None 表示用户取消选择
    pub fn start_video_detection<P>(&self, picker: P) -> Result<JobHandle>
    where
        P: FnOnce() -> Option<PathBuf> + Send + 'static,
    {
        self.launch(DisplayKind::Video, move |ctx| run_video_job(ctx, picker))
    }

    /// 停止检测: 清除运行标志、取消全部任务并请求关闭界面, 空闲时调用同样安全
    pub fn stop(&self) {
        self.run_flag.store(false, Ordering::SeqCst);
        let jobs = lock_jobs(&self.jobs);
        for job in jobs.iter() {
            job.cancel.cancel();
        }
        log::info!("🛑 停止偵測 (取消 {} 个任务)", jobs.len());
        drop(jobs);
        let _ = self.events.send(UiEvent::Shutdown);
    }

    /// 结束所有视频循环 (`q` 键)
    pub fn cancel_video_jobs(&self) -> usize {
        let jobs = lock_jobs(&self.jobs);
        let mut cancelled = 0;
        for job in jobs.iter().filter(|job| job.kind == DisplayKind::Video) {
            job.cancel.cancel();
            cancelled += 1;
        }
        if cancelled > 0 {
            log::info!("⏹️ 结束视频检测 ({} 个任务)", cancelled);
        }
        cancelled
    }

    fn launch<F>(&self, kind: DisplayKind, work: F) -> Result<JobHandle>
    where
        F: FnOnce(&JobContext) -> Result<JobOutcome> + Send + 'static,
    {
        self.run_flag.store(true, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::new();
        lock_jobs(&self.jobs).push(JobEntry {
            id,
            kind,
            cancel: cancel.clone(),
        });

        let ctx = JobContext {
            cancel,
            tally: self.tally.clone(),
            events: self.events.clone(),
            backend: self.backend.clone(),
            config: self.config.clone(),
            annotator: self.annotator.clone(),
        };
        let jobs = self.jobs.clone();
        log::info!("▶️ 任务 #{} 启动: {}", id, kind.title());

        let spawned = std::thread::Builder::new()
            .name(format!("detect-{}", id))
            .spawn(move || {
                let outcome = match work(&ctx) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("❌ 任务 #{} 失败: {:#}", id, e);
                        JobOutcome::Failed(format!("{:#}", e))
                    }
                };
                lock_jobs(&jobs).retain(|job| job.id != id);
                log::info!("🏁 任务 #{} 结束: {}", id, outcome);
                let _ = ctx.events.send(UiEvent::JobFinished {
                    kind,
                    outcome: outcome.clone(),
                });
                outcome
            });

        match spawned {
            Ok(thread) => Ok(JobHandle { thread }),
            Err(e) => {
                lock_jobs(&self.jobs).retain(|job| job.id != id);
                Err(anyhow::Error::new(e).context("启动检测线程失败"))
            }
        }
    }
}

fn lock_jobs(jobs: &Mutex<Vec<JobEntry>>) -> MutexGuard<'_, Vec<JobEntry>> {
    match jobs.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn run_image_job(ctx: &JobContext) -> Result<JobOutcome> {
    let source = ImageSource::new(&ctx.config.image_path);
    let input = source.ensure_exists()?;

    let mut provider = ctx.backend.load_provider()?;
    if ctx.cancel.is_cancelled() {
        return Ok(JobOutcome::Cancelled);
    }
    let prediction = provider.predict_and_save(input)?;
    log::info!(
        "🔍 检测到 {} 个目标, 结果目录: {}",
        prediction.detections.len(),
        prediction.save_dir.display()
    );

    // 读回模型保存的标注图 (与输入同名)
    let file_name = input.file_name().context("输入路径没有文件名")?;
    let saved = prediction.save_dir.join(file_name);
    if !saved.is_file() {
        return Err(SourceError::MissingInput(saved).into());
    }
    let frame = load_for_display(&saved, ctx.config.display_size)?;

    ctx.tally.record_all(&prediction.detections);
    if ctx.cancel.is_cancelled() {
        return Ok(JobOutcome::Cancelled);
    }
    ctx.emit_frame(DisplayKind::Image, frame);
    Ok(JobOutcome::Completed { frames: 1 })
}

fn run_video_job<P>(ctx: &JobContext, picker: P) -> Result<JobOutcome>
where
    P: FnOnce() -> Option<PathBuf>,
{
    let Some(path) = picker() else {
        log::warn!("⚠️ 未選擇影片");
        return Ok(JobOutcome::NoSelection);
    };

    let mut source = ctx.backend.open_video(&path, ctx.cancel.clone())?;
    let mut provider = ctx.backend.load_provider()?;
    let delay = source.frame_delay();

    let mut frames = 0u64;
    while !ctx.cancel.is_cancelled() {
        let Some(frame) = source.next_frame() else {
            break;
        };
        let frame = DynamicImage::ImageRgba8(frame);
        let detections = provider.detect(&frame)?;

        let mut canvas = frame.into_rgba8();
        let named: &dyn DetectionProvider = &*provider;
        ctx.annotator
            .draw(&mut canvas, &detections, |id| display_name(named, id));
        ctx.tally.record_all(&detections);

        frames += 1;
        ctx.emit_frame(DisplayKind::Video, canvas);

        if ctx.cancel.wait(delay) {
            break;
        }
    }

    if ctx.cancel.is_cancelled() {
        log::info!("⏹️ 视频检测已中断: {} ({} 帧)", path.display(), frames);
        Ok(JobOutcome::Cancelled)
    } else {
        log::info!("✅ 视频播放结束: {} ({} 帧)", path.display(), frames);
        Ok(JobOutcome::Completed { frames })
    }
}
