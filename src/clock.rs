//! # clock
//!
//! Time source abstraction สำหรับ Feed Cache และ Ledger
//!
//! Production ใช้ [`SystemClock`]; tests ใช้ [`ManualClock`] เพื่อเลื่อนเวลา
//! ได้เองโดยไม่ต้อง `sleep`

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// Port for reading the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// ─── SystemClock ──────────────────────────────────────────────────────────────

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ─── ManualClock ──────────────────────────────────────────────────────────────

/// Clock ที่หยุดนิ่งจนกว่าจะสั่ง [`ManualClock::advance`]
///
/// Clone แล้วยังชี้ไปที่เวลาเดียวกัน, test ถือไว้หนึ่งตัว ส่งอีกตัวให้ cache
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(RwLock::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self { Self::new(Utc::now()) }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
