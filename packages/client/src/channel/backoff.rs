//! Reconnection delay policy.
//!
//! Pure functions, no timers: the connection loop asks for the next delay and
//! sleeps on its own.

use std::time::Duration;

use crate::config::ClientConfig;

/// Compute the delay before the next connection attempt.
///
/// # Arguments
///
/// * `failed_attempts` - Consecutive failed attempts since the last successful open (0-indexed)
/// * `config` - Client configuration holding the min/max delay and growth factor
///
/// # Returns
///
/// `reconnect_min_delay * reconnect_growth ^ failed_attempts`, capped at
/// `reconnect_max_delay`
pub fn reconnect_delay(failed_attempts: u32, config: &ClientConfig) -> Duration {
    let min = config.reconnect_min_delay.as_secs_f64();
    let max = config.reconnect_max_delay.as_secs_f64();
    let exponent = i32::try_from(failed_attempts).unwrap_or(i32::MAX);
    let delay = min * config.reconnect_growth.powi(exponent);

    if delay.is_finite() && delay < max {
        Duration::from_secs_f64(delay.max(0.0))
    } else {
        config.reconnect_max_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_first_attempt_is_minimum() {
        // テスト項目: 初回の再接続待ち時間は最小値になる
        // given (前提条件):
        let config = ClientConfig::default();

        // when (操作):
        let delay = reconnect_delay(0, &config);

        // then (期待する結果):
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn test_reconnect_delay_grows_by_factor() {
        // テスト項目: 失敗するたびに待ち時間が増加率倍になる
        // given (前提条件):
        let config = ClientConfig::default();

        // when (操作):
        let delay = reconnect_delay(2, &config);

        // then (期待する結果):
        let expected = 1.3_f64 * 1.3;
        assert!((delay.as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_reconnect_delay_is_capped() {
        // テスト項目: 待ち時間は最大値を超えない
        // given (前提条件):
        let config = ClientConfig::default();

        // when (操作):
        let delay = reconnect_delay(50, &config);

        // then (期待する結果):
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn test_reconnect_delay_survives_huge_attempt_count() {
        // テスト項目: 非常に大きな試行回数でもオーバーフローせず最大値を返す
        // given (前提条件):
        let config = ClientConfig::default();

        // when (操作):
        let delay = reconnect_delay(u32::MAX, &config);

        // then (期待する結果):
        assert_eq!(delay, config.reconnect_max_delay);
    }
}
