// Cron trigger parsing and next fire time calculation
//
// Expressions use the seconds-first syntax of the `cron` crate
// (sec min hour day-of-month month day-of-week [year]).

use crate::errors::ConfigurationError;
use chrono::{DateTime, TimeZone};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse and validate a cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ConfigurationError> {
    CronSchedule::from_str(expression).map_err(|e| ConfigurationError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Next fire time strictly after `after`, in the timezone of `after`
pub fn next_fire_time<Z: TimeZone>(schedule: &CronSchedule, after: &DateTime<Z>) -> Option<DateTime<Z>> {
    schedule.after(after).next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_valid_expression() {
        assert!(parse_cron_expression("0 * * * * *").is_ok());
        assert!(parse_cron_expression("0 */5 * * * *").is_ok());
    }

    #[test]
    fn test_parse_invalid_expression() {
        let err = parse_cron_expression("not a cron").unwrap_err();
        assert!(err.to_string().contains("not a cron"));
    }

    #[test]
    fn test_every_minute_fires_on_next_minute() {
        let schedule = parse_cron_expression("0 * * * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 15).unwrap();
        let next = next_fire_time(&schedule, &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 10, 1, 0).unwrap());
    }

    #[test]
    fn test_next_fire_is_strictly_after() {
        let schedule = parse_cron_expression("0 * * * * *").unwrap();
        let on_boundary = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let next = next_fire_time(&schedule, &on_boundary).unwrap();
        assert!(next > on_boundary);
    }
}
