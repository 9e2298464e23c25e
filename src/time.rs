use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

pub fn parse_tz(tz: &str) -> Result<chrono_tz::Tz> {
    tz.parse().map_err(|_| anyhow!("invalid tz: {tz}"))
}

/// `YYYY-MM-DD HH:MM:SS` in the given timezone.
pub fn stamp(at: DateTime<Utc>, tz: chrono_tz::Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn now_stamp(tz: chrono_tz::Tz) -> String {
    stamp(Utc::now(), tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamp_respects_timezone() {
        let at = Utc.with_ymd_and_hms(2026, 2, 20, 15, 4, 5).unwrap();
        assert_eq!(stamp(at, parse_tz("UTC").unwrap()), "2026-02-20 15:04:05");
        assert_eq!(
            stamp(at, parse_tz("America/Buenos_Aires").unwrap()),
            "2026-02-20 12:04:05"
        );
    }

    #[test]
    fn rejects_unknown_zone() {
        assert!(parse_tz("Nowhere/Land").is_err());
    }
}
