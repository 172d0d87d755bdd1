// Number and date formatting shared by the schedule, exports and CLI

use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Group digits by thousands: 12900 -> "12,900"
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Month/day/year without padding: 2024-01-05 -> "1/5/2024"
pub fn short_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// Calendar date of a millisecond timestamp in the local time zone
pub fn stamp_date(ms: i64) -> Option<NaiveDate> {
    stamp_date_in(ms, &Local)
}

/// Calendar date of a millisecond timestamp as seen in `tz`
pub fn stamp_date_in<Tz: TimeZone>(ms: i64, tz: &Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(tz).date_naive())
}
