//! Date/time functions
//!
//! Dates are serial numbers counting days from a base date.
//!
//! Notes:
//! - In the 1900 date system serial 1 is 1900-01-01 and the calendar keeps the
//!   historical "1900 leap year" bug: serial 60 is the non-existent 1900-02-29,
//!   so real dates from 1900-03-01 on are one higher than a plain day count.
//! - In the 1904 date system serial 0 is 1904-01-01.

use super::{arg, boolean, cell_result, number, CellResult};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use sheetcalc_core::CellError;

/// Latest representable date
const MAX_YEAR: i32 = 9999;

/// Serial numbers beyond this are certainly past 9999-12-31
const MAX_SERIAL: f64 = 3_000_000.0;

fn is_leap_gregorian(year: i32) -> bool {
    (year % 4 == 0) && ((year % 100 != 0) || (year % 400 == 0))
}

/// Days in a month of the serial calendar (February 1900 has 29 days in the
/// 1900 system)
pub(crate) fn days_in_month(year: i32, month: u32, date_1904: bool) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_gregorian(year) || (year == 1900 && !date_1904) => 29,
        2 => 28,
        _ => 31,
    }
}

fn ymd(year: i32, month: u32, day: u32) -> CellResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(CellError::Num)
}

/// Serial number of the first day of a month
fn first_of_month_serial(year: i32, month: u32, date_1904: bool) -> CellResult<i64> {
    let date = ymd(year, month, 1)?;
    let base = if date_1904 {
        ymd(1904, 1, 1)?
    } else if date >= ymd(1900, 3, 1)? {
        ymd(1899, 12, 30)?
    } else {
        ymd(1899, 12, 31)?
    };
    Ok((date - base).num_days())
}

/// Serial number of a calendar date; `day` may overshoot the month
pub(crate) fn serial_from_ymd(year: i32, month: u32, day: i64, date_1904: bool) -> CellResult<f64> {
    let serial = first_of_month_serial(year, month, date_1904)? + day - 1;
    if serial < 0 {
        return Err(CellError::Num);
    }
    Ok(serial as f64)
}

/// Year, month and day of a serial number
///
/// Serial 0 reads as 1900-01-00 and serial 60 as 1900-02-29 in the 1900
/// system.
pub(crate) fn ymd_from_serial(serial: f64, date_1904: bool) -> CellResult<(i32, u32, u32)> {
    let serial = serial.floor();
    if !(0.0..=MAX_SERIAL).contains(&serial) {
        return Err(CellError::Num);
    }
    let days = serial as i64;

    let date = if date_1904 {
        ymd(1904, 1, 1)? + Duration::days(days)
    } else {
        match days {
            0 => return Ok((1900, 1, 0)),
            60 => return Ok((1900, 2, 29)),
            1..=59 => ymd(1899, 12, 31)? + Duration::days(days),
            _ => ymd(1899, 12, 30)? + Duration::days(days),
        }
    };

    if date.year() > MAX_YEAR {
        return Err(CellError::Num);
    }
    Ok((date.year(), date.month(), date.day()))
}

/// Serial number for a date-time
fn serial_from_datetime(dt: NaiveDateTime, date_1904: bool) -> CellResult<f64> {
    let date = dt.date();
    let day = serial_from_ymd(date.year(), date.month(), date.day() as i64, date_1904)?;
    let time = dt.time();
    let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 / 1e9;
    Ok(day + seconds / 86_400.0)
}

/// Date argument: a serial number, or text holding a number or an ISO date
fn serial_arg(value: &FormulaValue, date_1904: bool) -> CellResult<f64> {
    match value {
        FormulaValue::String(s) => {
            if let Some(n) = value.as_number() {
                return Ok(n);
            }
            let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y"))
                .map_err(|_| CellError::Value)?;
            serial_from_ymd(date.year(), date.month(), date.day() as i64, date_1904)
        }
        FormulaValue::Boolean(_) => Err(CellError::Value),
        other => {
            let n = number(other)?;
            if n < 0.0 {
                return Err(CellError::Num);
            }
            Ok(n)
        }
    }
}

/// Split a month offset into (year, month) after adding it to `year`/`month`
fn add_months(year: i32, month: u32, months: i64) -> CellResult<(i32, u32)> {
    let total = year as i64 * 12 + (month as i64 - 1) + months;
    let year = total.div_euclid(12);
    if !(0..=MAX_YEAR as i64).contains(&year) {
        return Err(CellError::Num);
    }
    Ok((year as i32, total.rem_euclid(12) as u32 + 1))
}

/// DATE(year, month, day)
///
/// Years below 1900 are offset by 1900. Months and days outside their usual
/// range roll over into neighbouring months and years.
pub fn fn_date(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let mut year = number(arg(args, 0))?.trunc();
        let month = number(arg(args, 1))?.trunc();
        let day = number(arg(args, 2))?.trunc();

        if !(0.0..=MAX_YEAR as f64).contains(&year) {
            return Err(CellError::Num);
        }
        if year < 1900.0 {
            year += 1900.0;
        }
        if month.abs() > MAX_SERIAL || day.abs() > MAX_SERIAL {
            return Err(CellError::Num);
        }

        let (y, m) = add_months(year as i32, 1, month as i64 - 1)?;
        Ok(FormulaValue::Number(serial_from_ymd(
            y,
            m,
            day as i64,
            ctx.date_1904(),
        )?))
    })
}

fn date_part(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    part: impl Fn((i32, u32, u32)) -> f64,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let serial = serial_arg(arg(args, 0), ctx.date_1904())?;
        Ok(FormulaValue::Number(part(ymd_from_serial(serial, ctx.date_1904())?)))
    })
}

/// YEAR(serial_number)
pub fn fn_year(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, ctx, |(y, _, _)| y as f64)
}

/// MONTH(serial_number)
pub fn fn_month(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, ctx, |(_, m, _)| m as f64)
}

/// DAY(serial_number)
pub fn fn_day(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, ctx, |(_, _, d)| d as f64)
}

/// TODAY() - current date as a serial number; volatile
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let today = Local::now().date_naive();
        Ok(FormulaValue::Number(serial_from_ymd(
            today.year(),
            today.month(),
            today.day() as i64,
            ctx.date_1904(),
        )?))
    })
}

/// NOW() - current date and time as a serial number; volatile
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let now = Local::now().naive_local();
        Ok(FormulaValue::Number(serial_from_datetime(now, ctx.date_1904())?))
    })
}

/// DAYS(end_date, start_date)
pub fn fn_days(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let end = serial_arg(arg(args, 0), ctx.date_1904())?.trunc();
        let start = serial_arg(arg(args, 1), ctx.date_1904())?.trunc();
        Ok(FormulaValue::Number(end - start))
    })
}

/// DAYS360(start_date, end_date, [method])
///
/// Days between two dates on a 360-day year. `method` FALSE (default) is the
/// US (NASD) convention, TRUE the European one.
pub fn fn_days360(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let date_1904 = ctx.date_1904();
        let start = ymd_from_serial(serial_arg(arg(args, 0), date_1904)?, date_1904)?;
        let end = ymd_from_serial(serial_arg(arg(args, 1), date_1904)?, date_1904)?;
        let european = match args.get(2) {
            Some(v) => boolean(v)?,
            None => false,
        };
        Ok(FormulaValue::Number(days360(start, end, european, date_1904)))
    })
}

pub(crate) fn days360(
    start: (i32, u32, u32),
    end: (i32, u32, u32),
    european: bool,
    date_1904: bool,
) -> f64 {
    let (y1, m1, mut d1) = start;
    let (y2, m2, mut d2) = end;
    let last_of_feb = |y: i32, m: u32, d: u32| m == 2 && d >= days_in_month(y, 2, date_1904);

    if european {
        d1 = d1.min(30);
        d2 = d2.min(30);
    } else {
        let start_last_of_feb = last_of_feb(y1, m1, d1);
        if start_last_of_feb && last_of_feb(y2, m2, d2) {
            d2 = 30;
        }
        if start_last_of_feb {
            d1 = 30;
        }
        if d2 == 31 && d1 >= 30 {
            d2 = 30;
        }
        if d1 == 31 {
            d1 = 30;
        }
    }

    ((y2 - y1) * 360) as f64 + (m2 as f64 - m1 as f64) * 30.0 + (d2 as f64 - d1 as f64)
}

/// EDATE(start_date, months) - same day `months` later, clamped to month end
pub fn fn_edate(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let date_1904 = ctx.date_1904();
        let (y, m, d) = ymd_from_serial(serial_arg(arg(args, 0), date_1904)?, date_1904)?;
        let months = number(arg(args, 1))?.trunc();
        if months.abs() > MAX_SERIAL {
            return Err(CellError::Num);
        }
        let (y, m) = add_months(y, m, months as i64)?;
        let d = d.min(days_in_month(y, m, date_1904));
        Ok(FormulaValue::Number(serial_from_ymd(y, m, d as i64, date_1904)?))
    })
}

/// EOMONTH(start_date, months) - last day of the month `months` later
pub fn fn_eomonth(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let date_1904 = ctx.date_1904();
        let (y, m, _) = ymd_from_serial(serial_arg(arg(args, 0), date_1904)?, date_1904)?;
        let months = number(arg(args, 1))?.trunc();
        if months.abs() > MAX_SERIAL {
            return Err(CellError::Num);
        }
        let (y, m) = add_months(y, m, months as i64)?;
        let last = days_in_month(y, m, date_1904);
        Ok(FormulaValue::Number(serial_from_ymd(y, m, last as i64, date_1904)?))
    })
}

/// WEEKDAY(serial_number, [return_type])
///
/// Return type 1 (default) numbers Sunday..Saturday as 1..7, 2 numbers
/// Monday..Sunday as 1..7, 3 numbers Monday..Sunday as 0..6 and 11 to 17 start
/// the week on Monday through Sunday.
pub fn fn_weekday(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let date_1904 = ctx.date_1904();
        let serial = serial_arg(arg(args, 0), date_1904)?.floor();
        if serial > MAX_SERIAL {
            return Err(CellError::Num);
        }
        // 0 = Sunday. Serial 1 (1900) is a Sunday, serial 0 (1904) a Friday.
        let offset = if date_1904 { 5 } else { 6 };
        let sunday_based = (serial as i64 + offset) % 7;

        let return_type = match args.get(1) {
            Some(v) => number(v)?.trunc() as i64,
            None => 1,
        };
        let result = match return_type {
            1 => sunday_based + 1,
            2 => (sunday_based + 6) % 7 + 1,
            3 => (sunday_based + 6) % 7,
            11..=17 => {
                let first = (return_type - 10) % 7;
                (sunday_based + 7 - first) % 7 + 1
            }
            _ => return Err(CellError::Num),
        };
        Ok(FormulaValue::Number(result as f64))
    })
}
