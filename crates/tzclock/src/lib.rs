//! Local calendar time, UTC offsets, and daylight saving time status for an instant.
//!
//! Every function in this crate takes an instant (a UTC [`DateTime`]) and the name of an IANA
//! timezone (e.g. `"Europe/Berlin"`). Zones are resolved against the timezone database compiled
//! into [`chrono_tz`], so results do not depend on the host system.
//!
//! None of these functions fail. If `zone` cannot be resolved, numeric results are `0` and flags
//! are `false`; see [`TimeParts`] for the degenerate value. Callers that produce a time signal
//! from these values will transmit a meaningless (but well-formed) message rather than stop.
//!
//! # Examples
//!
//! ```
//! # use chrono::{TimeZone, Utc};
//! # use tzclock::{get_time_parts, TimeParts};
//! // Mon, Jan 1, 2024. 00:00:00 UTC is 09:00:00 in Tokyo.
//! let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let parts = get_time_parts(instant, "Asia/Tokyo");
//! assert_eq!(parts, TimeParts {
//! 	year: 2024, month: 1, day: 1, hour: 9, minute: 0, second: 0,
//! 	weekday: 1, day_of_year: 1, offset_minutes: 540, is_dst: false
//! });
//!
//! // Unknown zones degrade instead of failing
//! assert_eq!(get_time_parts(instant, "Not/AZone"), TimeParts::default());
//! ```

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

pub mod calendar;
pub use calendar::*;

/// Calendar fields of an instant in a given timezone.
///
/// The default value (all fields zero / `false`) is returned when the zone cannot be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeParts {
	/// Absolute Gregorian calendar year, e.g. 2024
	pub year: i32,
	/// Month of the year, ranged [1, 12]
	pub month: u8,
	/// Day of the month, ranged [1, 31]
	pub day: u8,
	/// Hours, ranged [0, 23]
	pub hour: u8,
	/// Minutes, ranged [0, 59]
	pub minute: u8,
	/// Seconds, ranged [0, 59]
	pub second: u8,
	/// Day of the week, ranged [0, 6] => [Sunday, Saturday]
	pub weekday: u8,
	/// Day of the year, ranged [1, 366]
	pub day_of_year: u16,
	/// UTC offset in minutes, added to UTC to get local time
	pub offset_minutes: i32,
	/// Whether daylight saving time is in effect
	pub is_dst: bool
}

/// DST status at both ends of a UTC calendar day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DayDst {
	/// DST in effect at 00:00:00 UTC of the day.
	pub start: bool,
	/// DST in effect at 00:00:00 UTC of the following day.
	pub end: bool
}

/// Resolve an IANA zone name, returning `None` if it is unknown.
#[inline]
pub fn resolve_zone(zone: &str) -> Option<Tz> {
	zone.parse().ok()
}

/// Get the calendar fields of `instant` in `zone`.
///
/// The weekday is computed from the local year, month, and day as a civil date rather than from
/// the zoned instant, so it always agrees with the transmitted date fields.
pub fn get_time_parts(instant: DateTime<Utc>, zone: &str) -> TimeParts {
	let Some(tz) = resolve_zone(zone) else {
		return TimeParts::default();
	};

	// Local times past either end of the representable range degrade like unknown zones
	let Some(local) = instant.naive_utc().checked_add_offset(fixed_offset(instant, &tz)) else {
		return TimeParts::default();
	};
	let year = local.year();
	let month = local.month() as u8;
	let day = local.day() as u8;
	let offset_minutes = offset_minutes(instant, &tz);

	TimeParts {
		year,
		month,
		day,
		hour: local.hour() as u8,
		minute: local.minute() as u8,
		second: local.second() as u8,
		weekday: weekday_from_ymd(year, month, day),
		day_of_year: get_day_of_year(year, month, day),
		offset_minutes,
		is_dst: offset_minutes != standard_offset_minutes(instant, &tz)
	}
}

/// Get the UTC offset of `zone` at `instant`, in minutes.
///
/// Historical offsets with a seconds part are rounded to whole minutes.
///
/// # Examples
///
/// ```
/// # use chrono::{TimeZone, Utc};
/// # use tzclock::get_time_zone_offset_minutes;
/// let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
/// let summer = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
/// assert_eq!(get_time_zone_offset_minutes(winter, "Europe/Berlin"), 60);
/// assert_eq!(get_time_zone_offset_minutes(summer, "Europe/Berlin"), 120);
/// assert_eq!(get_time_zone_offset_minutes(summer, "America/New_York"), -240);
/// ```
pub fn get_time_zone_offset_minutes(instant: DateTime<Utc>, zone: &str) -> i32 {
	resolve_zone(zone).map_or(0, |tz| offset_minutes(instant, &tz))
}

/// Get the standard (non-DST) UTC offset of `zone` for the year of `instant`, in minutes.
///
/// This is the smaller of the offsets on January 1 and July 1, which selects standard time in
/// both hemispheres.
pub fn get_standard_offset_minutes(instant: DateTime<Utc>, zone: &str) -> i32 {
	resolve_zone(zone).map_or(0, |tz| standard_offset_minutes(instant, &tz))
}

/// Check whether DST is in effect in `zone` at `instant`.
pub fn is_dst_at(instant: DateTime<Utc>, zone: &str) -> bool {
	resolve_zone(zone).is_some_and(|tz| dst_at(instant, &tz))
}

/// Check whether the UTC offset of `zone` one hour after `instant` differs from the offset at
/// `instant`.
///
/// Used for one-hour-ahead announcements of DST transitions.
///
/// # Examples
///
/// ```
/// # use chrono::{TimeZone, Utc};
/// # use tzclock::will_offset_change_within_hour;
/// // Berlin switches to CEST at 01:00 UTC on Mar 31, 2024
/// let before = Utc.with_ymd_and_hms(2024, 3, 31, 0, 30, 0).unwrap();
/// let after = Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap();
/// assert!(will_offset_change_within_hour(before, "Europe/Berlin"));
/// assert!(!will_offset_change_within_hour(after, "Europe/Berlin"));
/// ```
pub fn will_offset_change_within_hour(instant: DateTime<Utc>, zone: &str) -> bool {
	let Some(tz) = resolve_zone(zone) else {
		return false;
	};
	match instant.checked_add_signed(TimeDelta::hours(1)) {
		Some(later) => offset_minutes(instant, &tz) != offset_minutes(later, &tz),
		None => false
	}
}

/// Get the DST status of `zone` at the start and end of the UTC calendar day containing
/// `instant`.
///
/// The end of the day is 00:00:00 UTC of the following day.
pub fn get_dst_status_for_utc_day(instant: DateTime<Utc>, zone: &str) -> DayDst {
	let Some(tz) = resolve_zone(zone) else {
		return DayDst::default();
	};
	let Some(start) = instant.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc()) else {
		return DayDst::default();
	};

	DayDst {
		start: dst_at(start, &tz),
		end: start
			.checked_add_signed(TimeDelta::days(1))
			.is_some_and(|end| dst_at(end, &tz))
	}
}

fn fixed_offset(instant: DateTime<Utc>, tz: &Tz) -> FixedOffset {
	tz.offset_from_utc_datetime(&instant.naive_utc()).fix()
}

fn offset_minutes(instant: DateTime<Utc>, tz: &Tz) -> i32 {
	(f64::from(fixed_offset(instant, tz).local_minus_utc()) / 60.).round() as i32
}

fn standard_offset_minutes(instant: DateTime<Utc>, tz: &Tz) -> i32 {
	let year = instant.year();
	let at = |month| Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single();
	match (at(1), at(7)) {
		(Some(jan), Some(jul)) => offset_minutes(jan, tz).min(offset_minutes(jul, tz)),
		_ => offset_minutes(instant, tz)
	}
}

fn dst_at(instant: DateTime<Utc>, tz: &Tz) -> bool {
	offset_minutes(instant, tz) != standard_offset_minutes(instant, tz)
}
