use crate::error::{EtlError, Result};
use chrono::NaiveDate;

/// Fast parse of a wide-format `"M/D/YY"` header, e.g. `1/22/20` → 2020-01-22.
/// Month and day may be one or two digits; the year is always two digits in
/// the 2000s.
pub fn parse_mdy(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('/');
    let (m, d, y) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some()
        || !(1..=2).contains(&m.len())
        || !(1..=2).contains(&d.len())
        || y.len() != 2
    {
        return None;
    }
    if ![m, d, y].iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    let year: i32 = 2000 + y.parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn parse_date_header(header: &str) -> Result<NaiveDate> {
    parse_mdy(header).ok_or_else(|| EtlError::DateParse {
        header: header.to_string(),
    })
}
