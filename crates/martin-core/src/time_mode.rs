//! Day/night time-mode classification.
//!
//! The day window is expressed in local hours of a fixed configured
//! zone. When the window wraps midnight (`day_start >= day_end`), DAY
//! covers `hour >= day_start OR hour < day_end`.

use crate::error::CoreError;
use crate::trade::TimeMode;
use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Day-window configuration: local zone plus day start/end hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub tz: Tz,
    /// First hour of DAY, 0..=23.
    pub day_start_hour: u32,
    /// First hour of NIGHT, 0..=23.
    pub day_end_hour: u32,
}

impl DayWindow {
    pub fn new(tz: Tz, day_start_hour: u32, day_end_hour: u32) -> crate::Result<Self> {
        if day_start_hour > 23 || day_end_hour > 23 {
            return Err(CoreError::InvalidConfig(format!(
                "day window hours out of range: [{day_start_hour}, {day_end_hour})"
            )));
        }
        Ok(Self {
            tz,
            day_start_hour,
            day_end_hour,
        })
    }

    /// Classify a Unix-seconds instant as DAY or NIGHT.
    pub fn mode_at(&self, now_ts: i64) -> TimeMode {
        time_mode_at(now_ts, self.tz, self.day_start_hour, self.day_end_hour)
    }
}

/// Classify `now_ts` (Unix seconds, UTC) as DAY or NIGHT in `tz`.
pub fn time_mode_at(now_ts: i64, tz: Tz, day_start_hour: u32, day_end_hour: u32) -> TimeMode {
    let local = tz.from_utc_datetime(
        &Utc.timestamp_opt(now_ts, 0)
            .single()
            .unwrap_or_default()
            .naive_utc(),
    );
    let hour = local.hour();

    let is_day = if day_start_hour < day_end_hour {
        hour >= day_start_hour && hour < day_end_hour
    } else {
        // Day window wraps midnight.
        hour >= day_start_hour || hour < day_end_hour
    };

    if is_day {
        TimeMode::Day
    } else {
        TimeMode::Night
    }
}
