//! Date/time built-ins (§4.H). A `TDateTime` is represented the way
//! Delphi's RTL represents it: a `Float` counting whole days since
//! 1899-12-30, with the fractional part the time of day — `chrono` does
//! the calendar arithmetic, this module only converts at the boundary.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::ast::Position;
use crate::coerce::as_float;
use crate::errors::{EvalResult, RuntimeError};
use crate::eval::Evaluator;
use crate::value::Value;

use super::Builtin;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("1899-12-30 is a valid calendar date")
}

fn to_naive(days: f64) -> NaiveDateTime {
    let whole_days = days.floor() as i64;
    let frac = days - whole_days as f64;
    let midnight = epoch()
        .checked_add_signed(Duration::days(whole_days))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| epoch().and_hms_opt(0, 0, 0).unwrap());
    let seconds = (frac * 86_400.0).round() as i64;
    midnight + Duration::seconds(seconds)
}

fn from_naive(dt: NaiveDateTime) -> f64 {
    let days = (dt.date() - epoch()).num_days();
    let secs = dt.time().num_seconds_from_midnight() as f64;
    days as f64 + secs / 86_400.0
}

fn arg_datetime(args: &[Value], pos: Position, name: &str) -> EvalResult<NaiveDateTime> {
    let v = args.first().ok_or_else(|| RuntimeError::new(pos, format!("{name} requires a TDateTime argument")))?;
    Ok(to_naive(as_float(v, pos)?))
}

pub(crate) fn dispatch(ev: &Evaluator, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    match b {
        Now => Ok(Value::Float(from_naive(ev.clock_now()))),
        Date => Ok(Value::Float(from_naive(ev.clock_now()).floor())),
        Time => {
            let now = from_naive(ev.clock_now());
            Ok(Value::Float(now - now.floor()))
        }
        UTCDateTime => Ok(Value::Float(from_naive(ev.clock_now_utc()))),
        YearOf => Ok(Value::Integer(arg_datetime(args, pos, "YearOf")?.year() as i64)),
        MonthOf => Ok(Value::Integer(arg_datetime(args, pos, "MonthOf")?.month() as i64)),
        DayOf => Ok(Value::Integer(arg_datetime(args, pos, "DayOf")?.day() as i64)),
        HourOf => Ok(Value::Integer(arg_datetime(args, pos, "HourOf")?.hour() as i64)),
        MinuteOf => Ok(Value::Integer(arg_datetime(args, pos, "MinuteOf")?.minute() as i64)),
        SecondOf => Ok(Value::Integer(arg_datetime(args, pos, "SecondOf")?.second() as i64)),
        // 1 = Sunday .. 7 = Saturday, matching DWScript's `DayOfWeek`.
        DayOfWeek => Ok(Value::Integer(arg_datetime(args, pos, "DayOfWeek")?.weekday().num_days_from_sunday() as i64 + 1)),
        // 1 = Monday .. 7 = Sunday (ISO-style), DWScript's `DayOfTheWeek`.
        DayOfTheWeek => Ok(Value::Integer(arg_datetime(args, pos, "DayOfTheWeek")?.weekday().num_days_from_monday() as i64 + 1)),
        DayOfYear => Ok(Value::Integer(arg_datetime(args, pos, "DayOfYear")?.ordinal() as i64)),
        WeekNumber => Ok(Value::Integer(arg_datetime(args, pos, "WeekNumber")?.iso_week().week() as i64)),
        YearOfWeek => Ok(Value::Integer(arg_datetime(args, pos, "YearOfWeek")?.iso_week().year() as i64)),
        IsLeapYear => {
            let year = crate::coerce::as_integer(args.first().ok_or_else(|| RuntimeError::new(pos, "IsLeapYear requires a year argument"))?, pos)? as i32;
            Ok(Value::Boolean(NaiveDate::from_ymd_opt(year, 2, 29).is_some()))
        }
        FirstDayOfYear => {
            let dt = arg_datetime(args, pos, "FirstDayOfYear")?;
            let first = NaiveDate::from_ymd_opt(dt.year(), 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            Ok(Value::Float(from_naive(first)))
        }
        FirstDayOfMonth => {
            let dt = arg_datetime(args, pos, "FirstDayOfMonth")?;
            let first = NaiveDate::from_ymd_opt(dt.year(), dt.month(), 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            Ok(Value::Float(from_naive(first)))
        }
        FirstDayOfWeek => {
            let dt = arg_datetime(args, pos, "FirstDayOfWeek")?;
            let back = dt.weekday().num_days_from_monday() as i64;
            let first = (dt.date() - Duration::days(back)).and_hms_opt(0, 0, 0).unwrap();
            Ok(Value::Float(from_naive(first)))
        }
        FirstDayOfNextYear => {
            let dt = arg_datetime(args, pos, "FirstDayOfNextYear")?;
            let first = NaiveDate::from_ymd_opt(dt.year() + 1, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            Ok(Value::Float(from_naive(first)))
        }
        FirstDayOfNextMonth => {
            let dt = arg_datetime(args, pos, "FirstDayOfNextMonth")?;
            let (year, month) = if dt.month() == 12 { (dt.year() + 1, 1) } else { (dt.year(), dt.month() + 1) };
            let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            Ok(Value::Float(from_naive(first)))
        }
        _ => unreachable!("datetime::dispatch called with a non-date builtin"),
    }
}
