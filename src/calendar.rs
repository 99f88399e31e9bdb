//! Trading-day arithmetic over weekends and the market_holiday table

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::collections::BTreeSet;

/// Weekday that is not a listed holiday
pub fn is_trading_day(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(&date)
}

/// Latest trading day on or before `date`
pub fn last_trading_day(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> NaiveDate {
    let mut day = date;
    while !is_trading_day(day, holidays) {
        day -= Duration::days(1);
    }
    day
}

/// Latest trading day strictly before `date`
pub fn previous_trading_day(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> NaiveDate {
    last_trading_day(date - Duration::days(1), holidays)
}

/// Close of the regular session, used for data stamped on a past day
pub fn market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 30, 0).unwrap_or(NaiveTime::MIN)
}

/// Which moment the current quotes describe.
///
/// Returns the data timestamp and whether the market is closed because
/// `now` falls on a weekend. When the walk back lands on an earlier day
/// the time is pinned to the 16:30 close.
pub fn data_datetime(now: NaiveDateTime, holidays: &BTreeSet<NaiveDate>) -> (NaiveDateTime, bool) {
    let today = now.date();
    let market_closed = matches!(today.weekday(), Weekday::Sat | Weekday::Sun);

    let data_date = last_trading_day(today, holidays);
    if data_date != today {
        (data_date.and_time(market_close()), market_closed)
    } else {
        (now, market_closed)
    }
}
