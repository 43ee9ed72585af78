//! Schedule descriptors.
//!
//! Agents carry a cron-looking schedule string, but only a fixed set of
//! presets is understood. Everything else resolves to no next run.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePreset {
    DailyAtNine,
    EveryFifteenMinutes,
    WeeklyMondayAtNine,
    MonthlyFirstAtNine,
}

pub const PRESETS: [SchedulePreset; 4] = [
    SchedulePreset::DailyAtNine,
    SchedulePreset::EveryFifteenMinutes,
    SchedulePreset::WeeklyMondayAtNine,
    SchedulePreset::MonthlyFirstAtNine,
];

impl SchedulePreset {
    pub fn parse(descriptor: &str) -> Option<Self> {
        match descriptor {
            "0 9 * * *" => Some(SchedulePreset::DailyAtNine),
            "*/15 * * * *" => Some(SchedulePreset::EveryFifteenMinutes),
            "0 9 * * 1" => Some(SchedulePreset::WeeklyMondayAtNine),
            "0 9 1 * *" => Some(SchedulePreset::MonthlyFirstAtNine),
            _ => None,
        }
    }

    pub fn descriptor(self) -> &'static str {
        match self {
            SchedulePreset::DailyAtNine => "0 9 * * *",
            SchedulePreset::EveryFifteenMinutes => "*/15 * * * *",
            SchedulePreset::WeeklyMondayAtNine => "0 9 * * 1",
            SchedulePreset::MonthlyFirstAtNine => "0 9 1 * *",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SchedulePreset::DailyAtNine => "Daily at 9:00 AM",
            SchedulePreset::EveryFifteenMinutes => "Every 15 minutes",
            SchedulePreset::WeeklyMondayAtNine => "Weekly on Monday at 9:00 AM",
            SchedulePreset::MonthlyFirstAtNine => "Monthly on 1st at 9:00 AM",
        }
    }

    /// Seconds-resolution expression accepted by `tokio-cron-scheduler`.
    pub fn cron_expression(self) -> &'static str {
        match self {
            SchedulePreset::DailyAtNine => "0 0 9 * * *",
            SchedulePreset::EveryFifteenMinutes => "0 */15 * * * *",
            SchedulePreset::WeeklyMondayAtNine => "0 0 9 * * Mon",
            SchedulePreset::MonthlyFirstAtNine => "0 0 9 1 * *",
        }
    }

    pub fn next_after(self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        let nine = NaiveTime::from_hms_opt(9, 0, 0)?;
        let today = now.date_naive();
        match self {
            SchedulePreset::EveryFifteenMinutes => Some(now + Duration::minutes(15)),
            SchedulePreset::DailyAtNine => at_local(today.succ_opt()?, nine),
            SchedulePreset::WeeklyMondayAtNine => {
                // A Monday rolls a full week forward, never to "later today".
                let from_monday = now.weekday().num_days_from_monday() as i64;
                let days_until = 7 - from_monday;
                at_local(today + Duration::days(days_until), nine)
            }
            SchedulePreset::MonthlyFirstAtNine => {
                let (year, month) = if today.month() == 12 {
                    (today.year() + 1, 1)
                } else {
                    (today.year(), today.month() + 1)
                };
                at_local(NaiveDate::from_ymd_opt(year, month, 1)?, nine)
            }
        }
    }
}

fn at_local(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    let naive = date.and_time(time);
    let local = Local.from_local_datetime(&naive);
    local.earliest().or_else(|| local.latest())
}

/// Next run for `descriptor`, or `None` when it is not a recognized preset.
pub fn next_run(descriptor: &str) -> Option<DateTime<Utc>> {
    next_run_from(descriptor, Local::now())
}

pub fn next_run_from(descriptor: &str, now: DateTime<Local>) -> Option<DateTime<Utc>> {
    SchedulePreset::parse(descriptor)?
        .next_after(now)
        .map(|dt| dt.with_timezone(&Utc))
}
