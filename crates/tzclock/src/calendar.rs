//! Gregorian calendar helpers, unaware of timezone.
//!
//! These functions work on civil dates (year, month, day) rather than instants, so they can be
//! used both on UTC dates and on local dates produced by [`crate::get_time_parts`].

use chrono::{Datelike, NaiveDate};

/// Days before the first of each month in a non-leap year.
const DAYS_BEFORE_MONTH: [u16; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Check whether a given `year` is a leap year.
///
/// `year` is the absolute Gregorian calendar year (i.e. 2024).
///
/// # Examples
///
/// ```
/// # use tzclock::is_leap_year;
/// assert_eq!(is_leap_year(1900), false);
/// assert_eq!(is_leap_year(2000), true);
/// assert_eq!(is_leap_year(2023), false);
/// assert_eq!(is_leap_year(2024), true);
/// assert_eq!(is_leap_year(2100), false);
/// ```
#[inline(always)]
pub fn is_leap_year(year: i32) -> bool {
	(year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Get the 1-based ordinal day of the year for a given year, month, and day.
///
/// `month` is 1-indexed starting at January. Out of range months produce `0`, matching the
/// degenerate value used elsewhere in this crate.
///
/// # Examples
///
/// ```
/// # use tzclock::get_day_of_year;
/// assert_eq!(get_day_of_year(2024, 1, 1), 1);
/// assert_eq!(get_day_of_year(2024, 2, 29), 60);
/// assert_eq!(get_day_of_year(2024, 3, 1), 61);
/// assert_eq!(get_day_of_year(2023, 3, 1), 60);
/// ```
pub fn get_day_of_year(year: i32, month: u8, day: u8) -> u16 {
	match DAYS_BEFORE_MONTH.get(usize::from(month).wrapping_sub(1)) {
		Some(&before) => {
			let leap = (month > 2 && is_leap_year(year)) as u16;
			before + leap + u16::from(day)
		},
		None => 0
	}
}

/// Get the weekday (0-6 => Sunday-Saturday) for a given year, month, and day.
///
/// Invalid dates produce `0`.
///
/// # Examples
///
/// ```
/// # use tzclock::weekday_from_ymd;
/// assert_eq!(weekday_from_ymd(2024, 1, 1), 1);   // Monday
/// assert_eq!(weekday_from_ymd(2024, 10, 27), 0); // Sunday
/// ```
pub fn weekday_from_ymd(year: i32, month: u8, day: u8) -> u8 {
	NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
		.map(|d| d.weekday().num_days_from_sunday() as u8)
		.unwrap_or(0)
}
