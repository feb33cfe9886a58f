/// 检测系统数据结构定义
/// Data structures for the detection system

// ========== 公共常量 ==========

/// 烟雾类别索引
pub const SMOKE_CLASS: usize = 0;
/// 火焰类别索引
pub const FIRE_CLASS: usize = 1;

// ========== 数据结构 ==========

/// 边界框 (像素坐标, 左上/右下)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// 单个检测结果 (每帧产生, 不保存)
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BBox,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 由中心点+宽高构造
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.,
            y1: cy - h / 2.,
            x2: cx + w / 2.,
            y2: cy + h / 2.,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// 裁剪到图像范围内
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0., width),
            y1: self.y1.clamp(0., height),
            x2: self.x2.clamp(0., width),
            y2: self.y2.clamp(0., height),
        }
    }

    pub fn intersection_area(&self, another: &BBox) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, another: &BBox) -> f32 {
        let inter = self.intersection_area(another);
        let union = self.area() + another.area() - inter;
        if union <= 0. {
            return 0.;
        }
        inter / union
    }
}

impl Detection {
    pub fn new(class_id: usize, confidence: f32, bbox: BBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// 按置信度降序的贪心NMS, 只在同类别之间抑制
///
/// 烟雾与火焰经常重叠出现, 不同类别的框互不影响。
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id == xs[index].class_id
                && xs[prev_index].bbox.iou(&xs[index].bbox) > iou_threshold
            {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou() {
        let a = BBox::new(0., 0., 10., 10.);
        let b = BBox::new(5., 0., 15., 10.);
        assert!((a.iou(&b) - 50. / 150.).abs() < 1e-6);
        assert_eq!(a.iou(&BBox::new(20., 20., 30., 30.)), 0.);
        assert_eq!(BBox::default().iou(&BBox::default()), 0.);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let mut dets = vec![
            Detection::new(0, 0.6, BBox::new(0., 0., 10., 10.)),
            Detection::new(0, 0.9, BBox::new(1., 1., 11., 11.)),
            Detection::new(1, 0.7, BBox::new(50., 50., 60., 60.)),
        ];
        non_max_suppression(&mut dets, 0.5);

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[1].class_id, 1);
    }

    #[test]
    fn test_nms_keeps_overlapping_boxes_of_different_classes() {
        // 火焰上方的烟雾: 几乎重合的两个框都要保留
        let mut dets = vec![
            Detection::new(0, 0.9, BBox::new(60., 60., 140., 140.)),
            Detection::new(1, 0.85, BBox::new(62., 62., 142., 142.)),
            Detection::new(1, 0.5, BBox::new(61., 61., 141., 141.)),
        ];
        non_max_suppression(&mut dets, 0.7);

        let classes: Vec<usize> = dets.iter().map(|d| d.class_id).collect();
        assert_eq!(classes, vec![0, 1]);
        assert_eq!(dets[1].confidence, 0.85);
    }
}
