use chrono::{Datelike, Local};

use crate::error::{FinvalError, FinvalResult};

pub static MIN_YEAR: i32 = 1990;

/// Parses a year selection such as `2015-2025` or `2017,2018,2020`.
pub fn parse_years(s: Option<&str>) -> FinvalResult<Vec<i32>> {
    parse_years_until(s, Local::now().year())
}

pub fn parse_years_until(s: Option<&str>, current_year: i32) -> FinvalResult<Vec<i32>> {
    let s = s.map(str::trim).unwrap_or_default();
    if s.is_empty() {
        return Ok((MIN_YEAR..=current_year).collect());
    }

    let invalid = |part: &str| {
        FinvalError::Invalid(
            "INVALID_YEARS",
            format!("Can not parse '{part}' as year, try format like '2015-2025' or '2017,2018'"),
        )
    };

    let mut years: Vec<i32> = if let Some((start, end)) = s.split_once('-') {
        let start: i32 = start.trim().parse().map_err(|_| invalid(start))?;
        let end: i32 = end.trim().parse().map_err(|_| invalid(end))?;
        (start.max(MIN_YEAR)..=end.min(current_year)).collect()
    } else {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse().map_err(|_| invalid(part)))
            .collect::<FinvalResult<_>>()?
    };

    years.retain(|year| (MIN_YEAR..=current_year).contains(year));
    years.sort_unstable();
    years.dedup();

    if years.is_empty() {
        return Err(FinvalError::Invalid(
            "NO_VALID_YEARS",
            format!("No valid year left in '{s}' between {MIN_YEAR} and {current_year}"),
        ));
    }

    Ok(years)
}

/// Normalizes year-like keys ("2021", "2021-12-31", "FY2021") to an integer year.
pub fn year_from_str(s: &str) -> Option<i32> {
    let digits: String = s
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}
