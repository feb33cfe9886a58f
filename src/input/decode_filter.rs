/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbaImage;

use crate::cancel::CancelToken;

/// 解码过滤器: 视频文件 → RGBA帧 → 检测线程
///
/// 发送端是有界通道, 检测线程处理不过来时阻塞解码, 不丢帧。
pub struct DecodeFilter {
    tx: Sender<RgbaImage>,
    cancel: CancelToken,
    total_frames: usize,
    dropped_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbaImage>, cancel: CancelToken) -> Self {
        Self {
            tx,
            cancel,
            total_frames: 0,
            dropped_frames: 0,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.cancel.is_cancelled() {
            return Err("decode cancelled".to_string());
        }

        unsafe {
            self.total_frames += 1;

            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                log::debug!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.total_frames);
                return Ok(None);
            }

            let raw = &*frame.as_ptr();
            let w = raw.width.max(0) as u32;
            let h = raw.height.max(0) as u32;
            if w == 0 || h == 0 {
                self.dropped_frames += 1;
                log::debug!("⚠️ 丢弃帧 #{}: 非法分辨率 {}x{}", self.total_frames, w, h);
                return Ok(None);
            }

            // YUV420P数据指针 (上游 format=yuv420p 保证像素格式)
            let y_plane = raw.data[0];
            let u_plane = raw.data[1];
            let v_plane = raw.data[2];
            let y_stride = raw.linesize[0].max(0) as usize;
            let uv_stride = raw.linesize[1].max(0) as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize).div_ceil(2) {
                self.dropped_frames += 1;
                log::debug!(
                    "⚠️ 丢弃帧 #{}: 步长异常 y_stride={} uv_stride={}",
                    self.total_frames,
                    y_stride,
                    uv_stride
                );
                return Ok(None);
            }

            let mut buffer = vec![255u8; (w * h * 4) as usize];
            yuv420p_to_rgba(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut buffer,
                w as usize,
                h as usize,
            );

            let Some(image) = RgbaImage::from_raw(w, h, buffer) else {
                self.dropped_frames += 1;
                return Ok(None);
            };

            // 接收端已关闭 (任务结束/取消): 停止解码
            if self.tx.send(image).is_err() {
                return Err("frame receiver closed".to_string());
            }
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!(
            "✅ 解码线程退出: 总帧{} | 丢弃{}",
            self.total_frames,
            self.dropped_frames
        );
    }
}

/// BT.601 YUV420P → RGBA (整数系数)
#[inline]
#[allow(clippy::too_many_arguments)]
unsafe fn yuv420p_to_rgba(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let [r, g, b] = yuv_to_rgb(y_val, u_val, v_val);

            buffer[out_idx] = r;
            buffer[out_idx + 1] = g;
            buffer[out_idx + 2] = b;
            out_idx += 4;
        }
    }
}

#[inline]
fn yuv_to_rgb(y: i32, u: i32, v: i32) -> [u8; 3] {
    [
        (y + ((v * 179) >> 7)).clamp(0, 255) as u8,
        (y - ((u * 44) >> 7) - ((v * 91) >> 7)).clamp(0, 255) as u8,
        (y + ((u * 227) >> 7)).clamp(0, 255) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_to_rgb_gray() {
        // U/V 为中性值时输出灰度
        assert_eq!(yuv_to_rgb(128, 0, 0), [128, 128, 128]);
        assert_eq!(yuv_to_rgb(300, 0, 0), [255, 255, 255]);
    }

    #[test]
    fn test_yuv420p_plane_conversion() {
        // 2x2 图像, 一组色度样本
        let y = [16u8, 16, 235, 235];
        let u = [128u8];
        let v = [128u8];
        let mut out = vec![0u8; 2 * 2 * 4];
        unsafe {
            yuv420p_to_rgba(y.as_ptr(), u.as_ptr(), v.as_ptr(), 2, 1, &mut out, 2, 2);
        }
        assert_eq!(&out[0..3], &[16, 16, 16]);
        assert_eq!(&out[12..15], &[235, 235, 235]);
    }
}
