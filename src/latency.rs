//! 延迟的人类可读格式
//!
//! 与 gin 访问日志一致：`850ns`、`12.5µs`、`1.234ms`、`2.5s`、`1m30s`。

use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SEC;

/// 格式化延迟
pub fn format_latency(d: Duration) -> String {
    let nanos = d.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    } else if nanos < NANOS_PER_MICRO {
        return format!("{}ns", nanos);
    } else if nanos < NANOS_PER_MILLI {
        return with_fraction(nanos, NANOS_PER_MICRO, "µs");
    } else if nanos < NANOS_PER_SEC {
        return with_fraction(nanos, NANOS_PER_MILLI, "ms");
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = with_fraction(nanos % NANOS_PER_MINUTE, NANOS_PER_SEC, "s");

    if hours > 0 {
        format!("{}h{}m{}", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}", minutes, seconds)
    } else {
        seconds
    }
}

/// 超过一分钟的延迟截断到整秒
pub fn truncate_latency(d: Duration) -> Duration {
    if d > Duration::from_secs(60) {
        Duration::from_secs(d.as_secs())
    } else {
        d
    }
}

fn with_fraction(value: u128, unit: u128, suffix: &str) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return format!("{}{}", whole, suffix);
    }

    let width = unit.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}{}", whole, digits.trim_end_matches('0'), suffix)
}

/// 为 [`Duration`] 提供日志格式的扩展方法
pub trait LatencyExt {
    /// 截断后按日志格式输出
    fn display_latency(&self) -> String;
}

impl LatencyExt for Duration {
    fn display_latency(&self) -> String {
        format_latency(truncate_latency(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_latency() {
        let cases = [
            (Duration::ZERO, "0s"),
            (Duration::from_nanos(850), "850ns"),
            (Duration::from_nanos(12_500), "12.5µs"),
            (Duration::from_micros(3), "3µs"),
            (Duration::from_nanos(1_234_000), "1.234ms"),
            (Duration::from_nanos(1_000_001), "1.000001ms"),
            (Duration::from_millis(2500), "2.5s"),
            (Duration::from_secs(90), "1m30s"),
            (Duration::from_secs(3600), "1h0m0s"),
            (Duration::from_millis(61_500), "1m1.5s"),
        ];
        for (input, expected) in cases {
            assert_eq!(format_latency(input), expected, "输入: {:?}", input);
        }
    }

    #[test]
    fn test_truncate_latency() {
        assert_eq!(
            truncate_latency(Duration::from_millis(61_500)),
            Duration::from_secs(61)
        );
        assert_eq!(
            truncate_latency(Duration::from_millis(1_500)),
            Duration::from_millis(1_500)
        );
        assert_eq!(Duration::from_millis(61_500).display_latency(), "1m1s");
    }
}
