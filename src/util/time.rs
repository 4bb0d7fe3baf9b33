//! Time utilities for the game server.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default room tick rate in Hz. Overridable via `TICK_RATE`.
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Tick interval for a rate, floored at 20 ms so a misconfigured rate can
/// never spin the loop.
pub fn tick_interval_ms(tick_rate: u32) -> u64 {
    let rate = tick_rate.max(1) as u64;
    (1000 / rate).max(20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_is_floored() {
        assert_eq!(tick_interval_ms(20), 50);
        assert_eq!(tick_interval_ms(100), 20);
        assert_eq!(tick_interval_ms(1000), 20);
        assert_eq!(tick_interval_ms(0), 1000);
    }
}
