//! Work-time report over a window of days

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{format_work_duration, AttendanceRecord};
use crate::error::{PlatformError, Result};
use crate::service::AttendanceService;

#[derive(Debug, Clone)]
pub struct WorkReport {
    pub list: Vec<AttendanceRecord>,
    pub total_work_minutes: i64,
    pub total_work_duration: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub struct ReportService {
    ledger: Arc<AttendanceService>,
}

impl ReportService {
    pub fn new(ledger: Arc<AttendanceService>) -> Self {
        Self { ledger }
    }

    fn parse_bound(&self, raw: Option<&str>, message: &str) -> Result<Option<NaiveDate>> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => self.ledger
                .calendar()
                .parse_day(s)
                .map(Some)
                .ok_or_else(|| PlatformError::validation(message)),
        }
    }

    pub async fn my_report(
        &self,
        user_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<WorkReport> {
        let from = self.parse_bound(from, "invalid from")?;
        let to = self.parse_bound(to, "invalid to")?;

        let (list, from, to) = self.ledger.list_for_user_in_range(user_id, from, to).await?;
        let total_work_minutes: i64 = list.iter().map(AttendanceRecord::counted_minutes).sum();

        Ok(WorkReport {
            total_work_duration: format_work_duration(total_work_minutes),
            total_work_minutes,
            list,
            from,
            to,
        })
    }
}
