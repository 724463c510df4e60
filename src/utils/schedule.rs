// src/utils/schedule.rs
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Delay until the next candle-period boundary plus `offset`, so the exchange
/// has finalized the candle before it is fetched.
pub fn next_cycle_delay(now: DateTime<Utc>, period: Duration, offset: Duration) -> Duration {
    let period_ms = period.as_millis() as i64;
    if period_ms == 0 {
        return offset;
    }
    let elapsed = now.timestamp_millis().rem_euclid(period_ms);
    Duration::from_millis((period_ms - elapsed) as u64) + offset
}
