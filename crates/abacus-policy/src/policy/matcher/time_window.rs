//! Time-of-day window checks.

use time::{OffsetDateTime, UtcOffset};

use crate::policy::resources::TimeWindow;

/// Parse `HH:MM` into minutes after midnight.
#[must_use]
pub fn parse_clock(clock: &str) -> Option<u16> {
    let (hours, minutes) = clock.trim().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Parse `UTC`, `Z` or a fixed `±HH:MM` offset.
#[must_use]
pub fn parse_offset(timezone: &str) -> Option<UtcOffset> {
    let tz = timezone.trim();
    if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") || tz.eq_ignore_ascii_case("gmt")
    {
        return Some(UtcOffset::UTC);
    }

    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1i8, &tz[1..]),
        b'-' => (-1i8, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i8 = hours.parse().ok()?;
    let minutes: i8 = minutes.parse().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

impl TimeWindow {
    /// Returns `true` if `timestamp` falls inside the window.
    ///
    /// Unparseable bounds, day names or timezones never match. Equal bounds
    /// cover the whole day.
    #[must_use]
    pub fn contains(&self, timestamp: OffsetDateTime) -> bool {
        let (Some(start), Some(end)) = (parse_clock(&self.start), parse_clock(&self.end)) else {
            return false;
        };
        let offset = match self.timezone.as_deref() {
            Some(tz) => match parse_offset(tz) {
                Some(offset) => offset,
                None => return false,
            },
            None => UtcOffset::UTC,
        };

        let local = timestamp.to_offset(offset);

        if let Some(days) = &self.days {
            let today = local.weekday();
            let open_today = days.iter().any(|d| d.to_weekday() == Some(today));
            if !open_today {
                return false;
            }
        }

        let now = u16::from(local.hour()) * 60 + u16::from(local.minute());
        match start.cmp(&end) {
            std::cmp::Ordering::Less => now >= start && now < end,
            std::cmp::Ordering::Greater => now >= start || now < end,
            std::cmp::Ordering::Equal => true,
        }
    }
}
