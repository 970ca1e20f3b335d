//! Attendance Entity
//!
//! One record per user per local calendar day. A record is created on
//! check-in and completed, once, on check-out.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Attendance lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    CheckedIn,
    CheckedOut,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::CheckedIn => "checked-in",
            AttendanceStatus::CheckedOut => "checked-out",
        }
    }
}

/// Stored attendance document.
///
/// Instants and day keys are epoch milliseconds in the store so range
/// queries on `checkInDate` compare integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub check_in_time: DateTime<Utc>,

    /// Local midnight of the check-in day
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub check_in_date: DateTime<Utc>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_out_time: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_out_date: Option<DateTime<Utc>>,

    pub status: AttendanceStatus,

    /// `"{h}h{m}m"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_minutes: Option<i64>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn check_in(
        user_id: impl Into<String>,
        check_in_time: DateTime<Utc>,
        check_in_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            check_in_time,
            check_in_date,
            check_out_time: None,
            check_out_date: None,
            status: AttendanceStatus::CheckedIn,
            work_duration: None,
            work_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_checked_out(&self) -> bool {
        self.status == AttendanceStatus::CheckedOut
    }

    /// Minutes counted towards a report. Open records count zero.
    pub fn counted_minutes(&self) -> i64 {
        self.work_minutes.unwrap_or(0)
    }
}

/// Fields written when a record is checked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOut {
    pub check_out_time: DateTime<Utc>,
    pub check_out_date: DateTime<Utc>,
    pub work_minutes: i64,
    pub work_duration: String,
    pub updated_at: DateTime<Utc>,
}

/// Whole minutes between two instants, rounded down
pub fn work_minutes_between(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    (check_out - check_in).num_milliseconds().div_euclid(60_000)
}

pub fn format_work_duration(minutes: i64) -> String {
    format!("{}h{}m", minutes / 60, minutes % 60)
}

/// Maps instants to local calendar days at a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkCalendar {
    offset: FixedOffset,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl WorkCalendar {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// `None` when the offset is outside the valid range
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar day of an instant. `None` at the edges of the
    /// representable range, where the offset cannot be applied.
    pub fn local_date(&self, instant: DateTime<Utc>) -> Option<NaiveDate> {
        instant
            .naive_utc()
            .checked_add_signed(self.offset_delta())
            .map(|local| local.date())
    }

    /// Instant of local midnight starting `date`
    pub fn start_of(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.local_to_utc(date.and_time(NaiveTime::default()))
    }

    /// Day key of an instant: its local day truncated to midnight
    pub fn day_key(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.start_of(self.local_date(instant)?)
    }

    pub fn first_of_month(&self, instant: DateTime<Utc>) -> Option<NaiveDate> {
        let today = self.local_date(instant)?;
        Some(today.with_day(1).unwrap_or(today))
    }

    /// Parse a timestamp given as epoch milliseconds or text.
    ///
    /// Accepted text forms: RFC 3339, a local date-time without offset, or a
    /// bare `YYYY-MM-DD` meaning local midnight.
    ///
    /// Instants without a representable day key are rejected.
    pub fn parse_instant(&self, value: &serde_json::Value) -> Option<DateTime<Utc>> {
        let instant = match value {
            serde_json::Value::Number(n) => {
                let millis = n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                        .map(|f| f.trunc() as i64)
                })?;
                DateTime::from_timestamp_millis(millis)
            }
            serde_json::Value::String(s) => self.parse_instant_str(s),
            _ => None,
        }?;
        self.day_key(instant).map(|_| instant)
    }

    pub fn parse_instant_str(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return self.local_to_utc(naive);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| self.start_of(date))
    }

    /// Parse a report bound into a local calendar day
    ///
    /// Days whose local midnight is not representable are rejected.
    pub fn parse_day(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        let day = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(day) => day,
            Err(_) => self.local_date(self.parse_instant_str(raw)?)?,
        };
        self.start_of(day).map(|_| day)
    }

    fn offset_delta(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    fn local_to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        local
            .checked_sub_signed(self.offset_delta())
            .map(|utc| Utc.from_utc_datetime(&utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_work_duration_formatting() {
        let minutes = work_minutes_between(at(2024, 3, 4, 9, 0), at(2024, 3, 4, 17, 30));
        assert_eq!(minutes, 510);
        assert_eq!(format_work_duration(minutes), "8h30m");
        assert_eq!(format_work_duration(185), "3h5m");
        assert_eq!(format_work_duration(0), "0h0m");
    }

    #[test]
    fn test_partial_minutes_round_down() {
        let check_in = at(2024, 3, 4, 9, 0);
        let check_out = check_in + chrono::Duration::seconds(119);
        assert_eq!(work_minutes_between(check_in, check_out), 1);
    }

    #[test]
    fn test_day_key_utc() {
        let calendar = WorkCalendar::utc();
        assert_eq!(calendar.day_key(at(2024, 3, 4, 23, 59)), Some(at(2024, 3, 4, 0, 0)));
    }

    #[test]
    fn test_day_key_with_offset() {
        // UTC+7: 2024-03-04 20:00Z is 03:00 local on the 5th
        let calendar = WorkCalendar::from_offset_minutes(7 * 60).unwrap();
        let key = calendar.day_key(at(2024, 3, 4, 20, 0)).unwrap();
        assert_eq!(key, at(2024, 3, 4, 17, 0));
        assert_eq!(calendar.local_date(key), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(WorkCalendar::from_offset_minutes(24 * 60).is_none());
    }

    #[test]
    fn test_parse_instant_forms() {
        let calendar = WorkCalendar::utc();
        let expected = at(2024, 3, 4, 9, 0);

        assert_eq!(calendar.parse_instant(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(calendar.parse_instant(&json!("2024-03-04T09:00:00Z")), Some(expected));
        assert_eq!(calendar.parse_instant(&json!("2024-03-04T11:00:00+02:00")), Some(expected));
        assert_eq!(calendar.parse_instant(&json!("2024-03-04T09:00:00")), Some(expected));
        assert_eq!(calendar.parse_instant(&json!("2024-03-04")), Some(at(2024, 3, 4, 0, 0)));

        assert_eq!(calendar.parse_instant(&json!("not a date")), None);
        assert_eq!(calendar.parse_instant(&json!("")), None);
        assert_eq!(calendar.parse_instant(&json!(true)), None);
    }

    #[test]
    fn test_extreme_years_are_rejected_not_panicking() {
        let west = WorkCalendar::from_offset_minutes(-300).unwrap();
        assert_eq!(west.parse_instant(&json!("+262142-12-31T23:00:00")), None);

        let east = WorkCalendar::from_offset_minutes(420).unwrap();
        assert_eq!(east.parse_instant(&json!("-262143-01-01T01:00:00")), None);
        assert_eq!(east.parse_instant(&json!(DateTime::<Utc>::MAX_UTC.timestamp_millis())), None);
        assert_eq!(east.day_key(DateTime::<Utc>::MAX_UTC), None);
        assert_eq!(east.local_date(DateTime::<Utc>::MAX_UTC), None);
        assert_eq!(east.start_of(NaiveDate::MIN), None);
        assert_eq!(east.parse_day("-262143-01-01"), None);

        // Ordinary instants are unaffected
        assert_eq!(
            east.parse_instant(&json!("2024-03-04T09:00:00Z")),
            Some(at(2024, 3, 4, 9, 0))
        );
    }

    #[test]
    fn test_parse_day() {
        let calendar = WorkCalendar::utc();
        assert_eq!(
            calendar.parse_day("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            calendar.parse_day("2024-03-01T22:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(calendar.parse_day("03/01/2024"), None);
    }

    #[test]
    fn test_status_wire_format() {
        let record = AttendanceRecord::check_in(
            "u1",
            at(2024, 3, 4, 9, 0),
            at(2024, 3, 4, 0, 0),
            at(2024, 3, 4, 9, 0),
        );
        let doc = bson::to_document(&record).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "checked-in");
        assert_eq!(doc.get_i64("checkInDate").unwrap(), at(2024, 3, 4, 0, 0).timestamp_millis());
        assert!(!doc.contains_key("checkOutTime"));
        assert_eq!(record.counted_minutes(), 0);
    }
}
