/// 视频文件解码器
/// Video file decoder: 独立解码线程 + 有界帧通道
use crossbeam_channel::Receiver;
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbaImage;
use std::path::Path;
use std::time::Duration;

use super::decode_filter::DecodeFilter;
use super::FrameSource;
use crate::cancel::CancelToken;
use crate::error::SourceError;

/// 解码通道长度: 检测线程落后时解码线程阻塞等待
const FRAME_QUEUE: usize = 4;

/// 每帧显示时长(毫秒) = 1000 / fps, 至少1毫秒
///
/// 视频未报告有效帧率时使用 `fallback_fps`。
pub fn frame_delay_ms(fps: f64, fallback_fps: f64) -> u64 {
    let fps = if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        fallback_fps
    };
    if !(fps.is_finite() && fps > 0.0) {
        return 1;
    }
    ((1000.0 / fps) as u64).max(1)
}

/// 视频帧来源: 惰性、有限、不可重放
pub struct VideoSource {
    delay: Duration,
    // 解码线程在接收端关闭后的下一次发送时退出
    frames: Receiver<RgbaImage>,
}

impl VideoSource {
    /// 打开视频文件并启动解码线程
    pub fn open(path: &Path, fallback_fps: f64, cancel: CancelToken) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::unreadable(path, "file does not exist"));
        }
        let url = path.to_string_lossy().to_string();

        // 探测视频流, 获取帧率
        let fps = match find_video_stream_info(url.clone()) {
            Ok(Some(StreamInfo::Video { avg_frame_rate, .. })) => {
                if avg_frame_rate.den != 0 {
                    avg_frame_rate.num as f64 / avg_frame_rate.den as f64
                } else {
                    0.0
                }
            }
            Ok(_) => return Err(SourceError::unreadable(path, "no video stream")),
            Err(e) => return Err(SourceError::unreadable(path, e)),
        };
        let delay = Duration::from_millis(frame_delay_ms(fps, fallback_fps));

        let (frame_tx, frames) = crossbeam_channel::bounded(FRAME_QUEUE);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        std::thread::Builder::new()
            .name("video-decode".to_string())
            .spawn(move || {
                let filter = DecodeFilter::new(frame_tx, cancel);
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let ctx = match FfmpegContext::builder()
                    .input(Input::from(url))
                    .filter_desc("format=yuv420p")
                    .output(out)
                    .build()
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("构建失败: {}", e)));
                        return;
                    }
                };

                let sch = match ctx.start() {
                    Ok(sch) => sch,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("启动失败: {}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                if let Err(e) = sch.wait() {
                    log::debug!("解码结束: {}", e);
                }
            })
            .map_err(|e| SourceError::unreadable(path, e))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(SourceError::unreadable(path, reason)),
            Err(_) => return Err(SourceError::unreadable(path, "decoder exited")),
        }

        log::info!(
            "🎬 视频已打开: {} ({:.2} fps, 每帧 {}ms)",
            path.display(),
            fps,
            delay.as_millis()
        );

        Ok(Self { delay, frames })
    }
}

impl FrameSource for VideoSource {
    fn frame_delay(&self) -> Duration {
        self.delay
    }

    fn next_frame(&mut self) -> Option<RgbaImage> {
        self.frames.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_delay() {
        assert_eq!(frame_delay_ms(25.0, 30.0), 40);
        assert_eq!(frame_delay_ms(30.0, 30.0), 33);
        assert_eq!(frame_delay_ms(29.97, 30.0), 33);
        // 极高帧率至少1毫秒
        assert_eq!(frame_delay_ms(5000.0, 30.0), 1);
    }

    #[test]
    fn test_frame_delay_fallback() {
        assert_eq!(frame_delay_ms(0.0, 30.0), 33);
        assert_eq!(frame_delay_ms(f64::NAN, 25.0), 40);
        assert_eq!(frame_delay_ms(-1.0, 0.0), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let err = VideoSource::open(Path::new("no/such/clip.mp4"), 30.0, CancelToken::new())
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::UnreadableMedia { .. }));
    }
}
