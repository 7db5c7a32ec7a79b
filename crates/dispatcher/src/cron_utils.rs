use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tracing::warn;

use shopd_core::{ShopError, ShopResult};

/// CRON表达式解析和触发判断工具
///
/// 表达式为六字段格式（秒 分 时 日 月 周）。
pub struct CronSchedule {
    schedule: Schedule,
    expression: String,
}

impl CronSchedule {
    pub fn new(cron_expr: &str) -> ShopResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| ShopError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            schedule,
            expression: cron_expr.to_string(),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 校验表达式是否合法
    pub fn validate(cron_expr: &str) -> ShopResult<()> {
        Schedule::from_str(cron_expr).map_err(|e| ShopError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// 判断当前时刻是否应该触发
    ///
    /// 上次触发之后的下一个预定时刻已经到达即触发；tick分辨率内
    /// 不会重复触发，因为触发后调用方会推进 `last_fired`。
    pub fn should_trigger(&self, last_fired: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let check_from = match last_fired {
            Some(last) => last,
            // 从未触发过时只回看一分钟，避免启动时补发大量历史任务
            None => now - Duration::minutes(1),
        };
        match self.schedule.after(&check_from).next() {
            Some(next_time) => next_time <= now,
            None => {
                warn!(expr = %self.expression, "无法计算下一次执行时间");
                false
            }
        }
    }

    /// 从指定时间开始的多个执行时间
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(CronSchedule::new("not a cron").is_err());
        assert!(CronSchedule::validate("0 0 * * * *").is_ok());
    }

    #[test]
    fn test_hourly_triggers_after_the_hour() {
        let cron = CronSchedule::new("0 0 * * * *").unwrap();
        // 上次09:00触发，10:00已过 -> 触发
        assert!(cron.should_trigger(Some(at(9, 0)), at(10, 0)));
        assert!(cron.should_trigger(Some(at(9, 0)), at(10, 30)));
        // 还没到下一个整点 -> 不触发
        assert!(!cron.should_trigger(Some(at(9, 0)), at(9, 59)));
    }

    #[test]
    fn test_no_double_fire_within_tick_resolution() {
        let cron = CronSchedule::new("0 0 * * * *").unwrap();
        let fire_time = at(10, 0);
        assert!(cron.should_trigger(Some(at(9, 0)), fire_time));
        // 触发后把 last_fired 推进到触发时刻，同一tick内不再触发
        assert!(!cron.should_trigger(Some(fire_time), fire_time + Duration::seconds(30)));
    }

    #[test]
    fn test_first_run_does_not_replay_history() {
        let cron = CronSchedule::new("0 0 3 * * *").unwrap();
        // 从未触发过且当前远离03:00，不应该触发
        assert!(!cron.should_trigger(None, at(12, 0)));
    }

    #[test]
    fn test_every_five_minutes() {
        let cron = CronSchedule::new("0 */5 * * * *").unwrap();
        assert!(cron.should_trigger(Some(at(9, 0)), at(9, 5)));
        assert!(!cron.should_trigger(Some(at(9, 5)), at(9, 9)));
    }

    #[test]
    fn test_next_occurrence_ordering() {
        let cron = CronSchedule::new("0 */30 * * * *").unwrap();
        let upcoming = cron.upcoming(at(9, 1), 2);
        assert_eq!(upcoming[0], at(9, 30));
        assert_eq!(upcoming[1], at(10, 0));
    }
}
