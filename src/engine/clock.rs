// ==========================================
// 混凝土配方治理引擎 - 时钟注入
// ==========================================
// Instant 用于缓存过期判断；timestamp 用于版本 created_at
// 测试使用 ManualClock 控制时间推进
// ==========================================

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// 单调时钟
    fn now(&self) -> Instant;

    /// 墙上时间（UTC）
    fn timestamp(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn timestamp(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// 手动推进的时钟
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: NaiveDateTime,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(wall_origin: NaiveDateTime) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn timestamp(&self) -> NaiveDateTime {
        let offset = ChronoDuration::from_std(self.offset()).unwrap_or(ChronoDuration::zero());
        self.wall_origin + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_both_times() {
        let origin = NaiveDateTime::parse_from_str("2026-10-18 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let clock = ManualClock::new(origin);
        let start = clock.now();

        clock.advance(Duration::from_secs(86_400));

        assert_eq!(clock.now() - start, Duration::from_secs(86_400));
        assert_eq!(clock.timestamp().format("%Y-%m-%d").to_string(), "2026-10-19");
    }
}
