pub mod beat;
pub mod cron_utils;

pub use beat::{BeatScheduler, ScheduleEntry};
pub use cron_utils::CronSchedule;
