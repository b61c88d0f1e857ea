//! Wall-clock helpers. Every packet field that carries wall time truncates to
//! milliseconds since the Unix epoch, the same way the teacher's client/server
//! net code stamps pings.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u32
}

pub fn now_ms_i64() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
