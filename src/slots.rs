use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

// Times are local wall-clock "HH:MM" strings; no time-zone handling
// anywhere in slot math.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    pub day: String,
    pub start: String,
    pub end: String,
    pub slot_minutes: u32,
}

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn parse_hhmm(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

fn format_hhmm(minute_of_day: u32) -> String {
    format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60)
}

pub fn validate_windows(windows: &[AvailabilityWindow]) -> ApiResult<()> {
    let mut seen_days: Vec<&str> = Vec::new();
    for window in windows {
        if !WEEKDAYS.contains(&window.day.as_str()) {
            return Err(ApiError::Validation(format!(
                "unknown weekday '{}'",
                window.day
            )));
        }
        if seen_days.contains(&window.day.as_str()) {
            return Err(ApiError::Validation(format!(
                "duplicate availability entry for {}",
                window.day
            )));
        }
        seen_days.push(window.day.as_str());

        let start = parse_hhmm(&window.start).ok_or_else(|| {
            ApiError::Validation(format!("invalid start time '{}'", window.start))
        })?;
        let end = parse_hhmm(&window.end).ok_or_else(|| {
            ApiError::Validation(format!("invalid end time '{}'", window.end))
        })?;
        if start >= end {
            return Err(ApiError::Validation(format!(
                "start must be before end on {}",
                window.day
            )));
        }
        if window.slot_minutes == 0 {
            return Err(ApiError::Validation(format!(
                "slot duration must be positive on {}",
                window.day
            )));
        }
    }
    Ok(())
}

// Last slot starts strictly before the window end; a trailing slot that
// would run past the end is still offered.
pub fn generate_slots(window: &AvailabilityWindow) -> Vec<String> {
    let (Some(start), Some(end)) = (parse_hhmm(&window.start), parse_hhmm(&window.end)) else {
        return Vec::new();
    };
    if window.slot_minutes == 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut cursor = start;
    while cursor < end {
        slots.push(format_hhmm(cursor));
        cursor += window.slot_minutes;
    }
    slots
}

// None means no window on that weekday; callers surface a warning, not
// an error.
pub fn slots_for_date(windows: &[AvailabilityWindow], date: NaiveDate) -> Option<Vec<String>> {
    let day = weekday_key(date.weekday());
    windows
        .iter()
        .find(|window| window.day == day)
        .map(generate_slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(day: &str, start: &str, end: &str, slot_minutes: u32) -> AvailabilityWindow {
        AvailabilityWindow {
            day: day.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            slot_minutes,
        }
    }

    #[test]
    fn full_working_day_yields_eight_hourly_slots() {
        let slots = generate_slots(&window("monday", "09:00", "17:00", 60));
        assert_eq!(slots.len(), 8);
        assert_eq!(slots.first().map(String::as_str), Some("09:00"));
        assert_eq!(slots.last().map(String::as_str), Some("16:00"));
        assert!(!slots.contains(&"17:00".to_string()));
    }

    #[test]
    fn slots_are_congruent_to_start_modulo_duration() {
        let w = window("tuesday", "08:15", "12:00", 45);
        let start = parse_hhmm(&w.start).unwrap();
        for slot in generate_slots(&w) {
            let minute = parse_hhmm(&slot).unwrap();
            assert_eq!(minute % w.slot_minutes, start % w.slot_minutes);
            assert!(minute < parse_hhmm(&w.end).unwrap());
        }
    }

    #[test]
    fn trailing_partial_slot_is_offered() {
        let slots = generate_slots(&window("monday", "09:00", "10:30", 60));
        assert_eq!(slots, vec!["09:00".to_string(), "10:00".to_string()]);
    }

    #[test]
    fn missing_weekday_yields_none_not_error() {
        let windows = vec![window("monday", "09:00", "17:00", 60)];
        // 2026-09-08 is a Tuesday.
        let date = NaiveDate::from_ymd_opt(2026, 9, 8).unwrap();
        assert_eq!(slots_for_date(&windows, date), None);
    }

    #[test]
    fn matching_weekday_yields_slots() {
        let windows = vec![window("monday", "10:00", "12:00", 30)];
        // 2026-09-07 is a Monday.
        let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        let slots = slots_for_date(&windows, date).unwrap();
        assert_eq!(slots, vec!["10:00", "10:30", "11:00", "11:30"]);
    }

    #[test]
    fn rejects_duplicate_day_and_inverted_range() {
        let dup = vec![
            window("monday", "09:00", "12:00", 60),
            window("monday", "13:00", "17:00", 60),
        ];
        assert!(validate_windows(&dup).is_err());

        let inverted = vec![window("friday", "17:00", "09:00", 60)];
        assert!(validate_windows(&inverted).is_err());

        let zero = vec![window("friday", "09:00", "17:00", 0)];
        assert!(validate_windows(&zero).is_err());

        let bad_time = vec![window("friday", "9:00", "17:00", 60)];
        assert!(validate_windows(&bad_time).is_err());
    }
}
