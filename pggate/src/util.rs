//! Odds and ends.

use std::time::Duration;

/// Human-readable duration, for logs.
///
/// Storage round trips are usually well under a millisecond,
/// so those are shown in microseconds.
pub fn human_duration(duration: Duration) -> String {
    if duration == Duration::MAX {
        return "unlimited".into();
    }

    let micros = duration.as_micros();
    let ms = duration.as_millis();
    let second = 1000;
    let minute = second * 60;
    let hour = minute * 60;

    let ms_fmt = |unit: u128, name: &str| -> String {
        if ms % unit > 0 {
            format!("{}ms", ms)
        } else {
            format!("{}{}", ms / unit, name)
        }
    };

    if micros < 1000 {
        format!("{}µs", micros)
    } else if ms < second {
        format!("{}.{:03}ms", ms, micros % 1000)
    } else if ms < minute {
        ms_fmt(second, "s")
    } else if ms < hour {
        ms_fmt(minute, "m")
    } else {
        ms_fmt(hour, "h")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(Duration::from_micros(250)), "250µs");
        assert_eq!(human_duration(Duration::from_micros(1500)), "1.500ms");
        assert_eq!(human_duration(Duration::from_millis(500)), "500.000ms");
        assert_eq!(human_duration(Duration::from_millis(2000)), "2s");
        assert_eq!(human_duration(Duration::from_millis(2500)), "2500ms");
        assert_eq!(human_duration(Duration::from_secs(120)), "2m");
        assert_eq!(human_duration(Duration::from_secs(3600 * 3)), "3h");
        assert_eq!(human_duration(Duration::MAX), "unlimited");
    }
}
