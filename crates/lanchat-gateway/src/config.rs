use std::time::Duration;

/// Maximum entries kept per history ring.
pub const HISTORY_CAPACITY: usize = 100;

/// Tunables for the coordination core.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a disconnected public user keeps their name before a "left"
    /// announcement goes out.
    pub reconnect_grace: Duration,
    /// Window in which repeated joins of one name are announced once.
    pub join_debounce: Duration,
    pub history_capacity: usize,
    /// Public history older than this is not replayed on connect and is
    /// pruned by the sweep. Zero keeps everything.
    pub history_retention: Duration,
    /// Interval of the history retention sweep. Zero disables it.
    pub sweep_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_millis(3000),
            join_debounce: Duration::from_millis(2000),
            history_capacity: HISTORY_CAPACITY,
            history_retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Parse a duration such as `"7d"`, `"24h"`, `"30m"` or `"60s"`.
///
/// The amount is plain ASCII digits: no sign, no padding. Anything else
/// yields zero, which callers treat as "disabled".
pub fn parse_duration(value: &str) -> Duration {
    let Some(unit) = value.chars().last() else {
        return Duration::ZERO;
    };
    let digits = &value[..value.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Duration::ZERO;
    }
    let Ok(amount) = digits.parse::<u64>() else {
        return Duration::ZERO;
    };

    let secs = match unit {
        'd' => amount.saturating_mul(24 * 60 * 60),
        'h' => amount.saturating_mul(60 * 60),
        'm' => amount.saturating_mul(60),
        's' => amount,
        _ => return Duration::ZERO,
    };
    Duration::from_secs(secs)
}
