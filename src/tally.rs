//! 检测次数统计 (Detection Tally)
//!
//! 整个程序生命周期内只增不减,由各个检测任务共享 (`Arc<DetectionTally>`)。

use std::sync::atomic::{AtomicU64, Ordering};

use crate::detection::types::{Detection, FIRE_CLASS, SMOKE_CLASS};

/// 烟雾/火焰计数器
#[derive(Debug, Default)]
pub struct DetectionTally {
    smoke: AtomicU64,
    fire: AtomicU64,
}

/// 某一时刻的计数快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TallySnapshot {
    pub smoke: u64,
    pub fire: u64,
}

impl DetectionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次检测: 0 → 烟雾, 1 → 火焰, 其他类别忽略
    pub fn record_detection(&self, class_id: usize) {
        match class_id {
            SMOKE_CLASS => {
                self.smoke.fetch_add(1, Ordering::Relaxed);
            }
            FIRE_CLASS => {
                self.fire.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_all(&self, detections: &[Detection]) {
        for det in detections {
            self.record_detection(det.class_id);
        }
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            smoke: self.smoke.load(Ordering::Relaxed),
            fire: self.fire.load(Ordering::Relaxed),
        }
    }
}

impl TallySnapshot {
    pub fn is_clear(&self) -> bool {
        self.smoke == 0 && self.fire == 0
    }
}
