//! 通知面板 (Notification Surface)
//!
//! 两个独立弹窗 (警告 / 统计), 生命周期相同:
//! `Closed → open() → Open → close() → Closed → ...`
//!
//! 刷新计划保存在 `Open` 状态里, 关闭即取消, 不存在关闭后仍在运行的定时器。
//! 所有方法只在界面线程调用, 时间由调用方传入便于测试。

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

use crate::tally::TallySnapshot;

pub const FIRE_WARNING: &str = "🔥 火焰警告！請立即檢查！🔥";
pub const SMOKE_WARNING: &str = "💨 煙霧警告！請立即檢查！💨";
pub const ALL_CLEAR: &str = "✅ 目前無危險";

/// 警告文本: 只取决于 (烟雾, 火焰) 计数
pub fn alert_text(snapshot: TallySnapshot) -> String {
    let mut lines = Vec::new();
    if snapshot.fire > 0 {
        lines.push(FIRE_WARNING);
    }
    if snapshot.smoke > 0 {
        lines.push(SMOKE_WARNING);
    }
    if lines.is_empty() {
        ALL_CLEAR.to_string()
    } else {
        lines.join("\n")
    }
}

/// 统计文本: 始终显示两个原始计数
pub fn stats_text(snapshot: TallySnapshot) -> String {
    format!(
        "🔥 火焰次數: {}\n💨 煙霧次數: {}",
        snapshot.fire, snapshot.smoke
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Alert,
    Statistics,
}

impl PanelKind {
    pub fn title(&self) -> &'static str {
        match self {
            PanelKind::Alert => "警告通知",
            PanelKind::Statistics => "偵測統計",
        }
    }

    pub fn render(&self, snapshot: TallySnapshot) -> String {
        match self {
            PanelKind::Alert => alert_text(snapshot),
            PanelKind::Statistics => stats_text(snapshot),
        }
    }
}

#[derive(Debug)]
enum PanelState {
    Closed,
    Open { next_refresh: Instant, text: String },
}

/// 单个弹窗的生命周期 + 定时刷新
#[derive(Debug)]
pub struct Panel {
    kind: PanelKind,
    interval: Duration,
    state: PanelState,
    refreshes: u64,
    last_refresh: Option<DateTime<Local>>,
}

impl Panel {
    pub fn new(kind: PanelKind, interval: Duration) -> Self {
        Self {
            kind,
            interval,
            state: PanelState::Closed,
            refreshes: 0,
            last_refresh: None,
        }
    }

    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PanelState::Open { .. })
    }

    /// 打开面板并立即渲染; 已打开时不做任何事 (不重复创建, 不重置刷新计划)
    ///
    /// 返回是否新打开。
    pub fn open(&mut self, now: Instant, snapshot: TallySnapshot) -> bool {
        if self.is_open() {
            return false;
        }
        self.state = PanelState::Open {
            next_refresh: now + self.interval,
            text: self.kind.render(snapshot),
        };
        self.mark_refreshed();
        log::debug!("🪟 打开面板: {}", self.kind.title());
        true
    }

    /// 关闭面板, 同时取消后续刷新; 返回之前是否打开
    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        self.state = PanelState::Closed;
        if was_open {
            log::debug!("🪟 关闭面板: {}", self.kind.title());
        }
        was_open
    }

    /// 到期时重新计算文本并安排下一次刷新; 返回本次是否刷新
    pub fn tick(&mut self, now: Instant, snapshot: TallySnapshot) -> bool {
        let interval = self.interval;
        let kind = self.kind;
        let PanelState::Open { next_refresh, text } = &mut self.state else {
            return false;
        };
        if now < *next_refresh {
            return false;
        }
        *text = kind.render(snapshot);
        *next_refresh = now + interval;
        self.mark_refreshed();
        true
    }

    pub fn text(&self) -> Option<&str> {
        match &self.state {
            PanelState::Open { text, .. } => Some(text),
            PanelState::Closed => None,
        }
    }

    #[cfg(test)]
    fn next_refresh(&self) -> Option<Instant> {
        match &self.state {
            PanelState::Open { next_refresh, .. } => Some(*next_refresh),
            PanelState::Closed => None,
        }
    }

    /// 累计渲染次数 (打开时的首次渲染也计入)
    #[cfg(test)]
    fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    pub fn last_refresh_label(&self) -> Option<String> {
        self.last_refresh
            .map(|t| format!("更新於 {}", t.format("%H:%M:%S")))
    }

    fn mark_refreshed(&mut self) {
        self.refreshes += 1;
        self.last_refresh = Some(Local::now());
    }
}

/// 两个弹窗的集合
#[derive(Debug)]
pub struct NotificationSurface {
    pub alert: Panel,
    pub stats: Panel,
}

impl NotificationSurface {
    pub fn new(interval: Duration) -> Self {
        Self {
            alert: Panel::new(PanelKind::Alert, interval),
            stats: Panel::new(PanelKind::Statistics, interval),
        }
    }

    pub fn tick(&mut self, now: Instant, snapshot: TallySnapshot) {
        self.alert.tick(now, snapshot);
        self.stats.tick(now, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_millis(1000);

    fn snap(smoke: u64, fire: u64) -> TallySnapshot {
        TallySnapshot { smoke, fire }
    }

    #[test]
    fn test_alert_text_truth_table() {
        assert_eq!(alert_text(snap(0, 0)), ALL_CLEAR);
        assert_eq!(alert_text(snap(3, 0)), SMOKE_WARNING);
        assert_eq!(alert_text(snap(0, 2)), FIRE_WARNING);
        assert_eq!(
            alert_text(snap(1, 1)),
            format!("{}\n{}", FIRE_WARNING, SMOKE_WARNING)
        );
    }

    #[test]
    fn test_stats_text_shows_raw_counts() {
        assert_eq!(stats_text(snap(0, 0)), "🔥 火焰次數: 0\n💨 煙霧次數: 0");
        assert_eq!(stats_text(snap(7, 4)), "🔥 火焰次數: 4\n💨 煙霧次數: 7");
    }

    #[test]
    fn test_open_renders_immediately() {
        let t0 = Instant::now();
        let mut panel = Panel::new(PanelKind::Alert, SECOND);
        assert!(panel.text().is_none());

        assert!(panel.open(t0, snap(0, 1)));
        assert_eq!(panel.text(), Some(FIRE_WARNING));
        assert_eq!(panel.refresh_count(), 1);
        assert_eq!(panel.next_refresh(), Some(t0 + SECOND));
    }

    #[test]
    fn test_open_is_idempotent() {
        let t0 = Instant::now();
        let mut panel = Panel::new(PanelKind::Statistics, SECOND);
        assert!(panel.open(t0, snap(0, 0)));
        // 第二次打开: 不重新渲染, 不重置计划
        assert!(!panel.open(t0 + Duration::from_millis(500), snap(5, 5)));
        assert_eq!(panel.refresh_count(), 1);
        assert_eq!(panel.next_refresh(), Some(t0 + SECOND));

        // 到期只刷新一次 (只有一条刷新链)
        assert!(panel.tick(t0 + SECOND, snap(5, 5)));
        assert!(!panel.tick(t0 + SECOND, snap(5, 5)));
        assert_eq!(panel.refresh_count(), 2);
    }

    #[test]
    fn test_refresh_follows_interval() {
        let t0 = Instant::now();
        let mut panel = Panel::new(PanelKind::Alert, SECOND);
        panel.open(t0, snap(0, 0));

        assert!(!panel.tick(t0 + Duration::from_millis(999), snap(1, 0)));
        assert_eq!(panel.text(), Some(ALL_CLEAR));

        assert!(panel.tick(t0 + SECOND, snap(1, 0)));
        assert_eq!(panel.text(), Some(SMOKE_WARNING));
        assert_eq!(panel.next_refresh(), Some(t0 + 2 * SECOND));
    }

    #[test]
    fn test_closed_panel_never_refreshes() {
        let t0 = Instant::now();
        let mut panel = Panel::new(PanelKind::Alert, SECOND);
        panel.open(t0, snap(0, 0));
        assert!(panel.close());
        assert!(!panel.close());

        for i in 1..5 {
            assert!(!panel.tick(t0 + i * SECOND, snap(9, 9)));
        }
        assert_eq!(panel.refresh_count(), 1);
        assert!(panel.next_refresh().is_none());

        // 重新打开后恢复刷新
        let t1 = t0 + 10 * SECOND;
        assert!(panel.open(t1, snap(9, 9)));
        assert!(panel.tick(t1 + SECOND, snap(9, 9)));
        assert_eq!(panel.refresh_count(), 3);
    }

    #[test]
    fn test_surface_panels_are_independent() {
        let t0 = Instant::now();
        let mut surface = NotificationSurface::new(SECOND);
        surface.stats.open(t0, snap(0, 0));

        surface.tick(t0 + SECOND, snap(2, 0));
        assert!(!surface.alert.is_open());
        assert_eq!(surface.stats.text(), Some("🔥 火焰次數: 0\n💨 煙霧次數: 2"));
    }
}
