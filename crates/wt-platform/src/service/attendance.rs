//! Attendance Ledger
//!
//! Owns the check-in/check-out state machine. Day keys come from the
//! configured `WorkCalendar`, so "the same day" means the same local day.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::{
    format_work_duration, work_minutes_between, AttendanceRecord, CheckOut, WorkCalendar,
};
use crate::error::{PlatformError, Result};
use crate::repository::AttendanceRepository;
use crate::service::auth::ensure_user_id;
use crate::service::Clock;

/// Absent and JSON null are both "missing"
fn provided(value: Option<&serde_json::Value>) -> Option<&serde_json::Value> {
    value.filter(|v| match v {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

pub struct AttendanceService {
    records: Arc<dyn AttendanceRepository>,
    calendar: WorkCalendar,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(
        records: Arc<dyn AttendanceRepository>,
        calendar: WorkCalendar,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            calendar,
            clock,
        }
    }

    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn check_in(
        &self,
        user_id: &str,
        check_in_time: Option<&serde_json::Value>,
    ) -> Result<AttendanceRecord> {
        let raw = provided(check_in_time)
            .ok_or_else(|| PlatformError::validation("missing checkInTime"))?;
        let check_in_time = self.calendar
            .parse_instant(raw)
            .ok_or_else(|| PlatformError::validation("invalid checkInTime"))?;
        let day = self.calendar
            .day_key(check_in_time)
            .ok_or_else(|| PlatformError::validation("invalid checkInTime"))?;

        let record = AttendanceRecord::check_in(user_id, check_in_time, day, self.clock.now());

        if !self.records.insert_unique(&record).await? {
            return Err(PlatformError::conflict("already check in for the day"));
        }

        info!(
            user_id = %user_id,
            attendance_id = %record.id,
            day = %day,
            "Checked in"
        );
        Ok(record)
    }

    /// Complete an open record. Any authenticated caller may check out any record.
    pub async fn check_out(
        &self,
        record_id: &str,
        check_out_time: Option<&serde_json::Value>,
    ) -> Result<AttendanceRecord> {
        if record_id.trim().is_empty() {
            return Err(PlatformError::validation("missing id"));
        }
        let raw = provided(check_out_time)
            .ok_or_else(|| PlatformError::validation("missing checkOutTime"))?;
        let check_out_time = self.calendar
            .parse_instant(raw)
            .ok_or_else(|| PlatformError::validation("invalid checkOutTime"))?;
        let check_out_date = self.calendar
            .day_key(check_out_time)
            .ok_or_else(|| PlatformError::validation("invalid checkOutTime"))?;

        let record = self.records
            .find_by_id(record_id)
            .await?
            .ok_or_else(PlatformError::not_found)?;

        if record.is_checked_out() {
            return Err(PlatformError::conflict("already check out for the day"));
        }
        if check_out_time < record.check_in_time {
            return Err(PlatformError::validation("invalid checkOutTime"));
        }

        let work_minutes = work_minutes_between(record.check_in_time, check_out_time);
        let check_out = CheckOut {
            check_out_time,
            check_out_date,
            work_minutes,
            work_duration: format_work_duration(work_minutes),
            updated_at: self.clock.now(),
        };

        // A concurrent check-out that won the conditional update leaves nothing to update
        let updated = self.records
            .complete_check_out(record_id, &check_out)
            .await?
            .ok_or_else(|| PlatformError::conflict("already check out for the day"))?;

        info!(
            user_id = %updated.user_id,
            attendance_id = %updated.id,
            work_minutes,
            "Checked out"
        );
        Ok(updated)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.records.find_by_user(user_id).await
    }

    /// Admin listing of another user's records
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        if user_id.trim().is_empty() {
            return Err(PlatformError::validation("missing userId"));
        }
        ensure_user_id(user_id, "invalid userId")?;
        self.records.find_by_user(user_id).await
    }

    /// Records whose check-in day lies in `[from, to]`.
    ///
    /// `from` defaults to the first day of the current month and `to` to today.
    pub async fn list_for_user_in_range(
        &self,
        user_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<(Vec<AttendanceRecord>, NaiveDate, NaiveDate)> {
        let now = self.clock.now();
        let invalid = || PlatformError::validation("invalid param");
        let from = match from {
            Some(day) => day,
            None => self.calendar.first_of_month(now).ok_or_else(invalid)?,
        };
        let to = match to {
            Some(day) => day,
            None => self.calendar.local_date(now).ok_or_else(invalid)?,
        };
        if from > to {
            return Err(invalid());
        }
        let window_start = self.calendar.start_of(from).ok_or_else(invalid)?;
        let window_end = self.calendar.start_of(to).ok_or_else(invalid)?;

        debug!(user_id = %user_id, %from, %to, "Listing attendance range");
        let records = self.records
            .find_by_user_in_range(user_id, window_start, window_end)
            .await?;
        Ok((records, from, to))
    }
}
