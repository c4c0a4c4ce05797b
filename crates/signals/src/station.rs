//! Catalog of supported transmitters.
//!
//! Each station pairs an encoder with the audio parameters used to imitate it. Audio hardware
//! cannot produce a 40-77.5 kHz carrier directly, so stations are synthesized as a square wave at
//! `base_hz`, chosen so that one of its odd harmonics lands on `carrier_hz`.

use chrono::{DateTime, Timelike, TimeDelta, Utc};
use core::{fmt, str::FromStr};

use crate::{Encoder, SecondSignal};

/// A time signal station.
#[derive(Debug, PartialEq)]
pub struct Station {
	/// Unique identifier, e.g. `"dcf77"`.
	pub id: &'static str,
	/// Human readable name.
	pub label: &'static str,
	/// Frequency of the real transmitter. Informational only.
	pub carrier_hz: f64,
	/// Frequency of the synthesized square wave.
	pub base_hz: f64,
	/// IANA timezone of the encoded calendar fields.
	pub time_zone: &'static str,
	/// Amplitude during low windows, relative to full amplitude.
	pub low_ratio: f64,
	/// Short description of the station.
	pub description: &'static str,
	/// Encoder for the transmitted time code.
	pub encoder: Encoder
}

/// Identifies one entry of [`STATIONS`].
///
/// # Examples
/// ```
/// # use signals::StationId;
/// let id: StationId = "jjy-40".parse().unwrap();
/// assert_eq!(id, StationId::Jjy40);
/// assert_eq!(id.to_string(), "jjy-40");
/// assert!("jjy".parse::<StationId>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StationId {
	Jjy40,
	Jjy60,
	Bpc,
	Dcf77,
	Msf,
	Wwvb
}

impl StationId {
	/// All station ids, in catalog order.
	pub const ALL: [StationId; 6] = [
		StationId::Jjy40,
		StationId::Jjy60,
		StationId::Bpc,
		StationId::Dcf77,
		StationId::Msf,
		StationId::Wwvb
	];

	/// The identifier string.
	pub fn as_str(self) -> &'static str {
		match self {
			StationId::Jjy40 => "jjy-40",
			StationId::Jjy60 => "jjy-60",
			StationId::Bpc => "bpc",
			StationId::Dcf77 => "dcf77",
			StationId::Msf => "msf",
			StationId::Wwvb => "wwvb"
		}
	}

	/// The catalog entry for this id.
	pub fn station(self) -> &'static Station {
		// Catalog order matches `ALL`
		&STATIONS[self as usize]
	}
}

impl fmt::Display for StationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing an unknown station id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownStation(pub String);

impl fmt::Display for UnknownStation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown station: {}", self.0)
	}
}

impl std::error::Error for UnknownStation {}

impl FromStr for StationId {
	type Err = UnknownStation;

	fn from_str(s: &str) -> Result<StationId, UnknownStation> {
		StationId::ALL
			.into_iter()
			.find(|id| id.as_str() == s)
			.ok_or_else(|| UnknownStation(s.to_owned()))
	}
}

/// All supported stations.
pub static STATIONS: &[Station] = &[
	Station {
		id: "jjy-40",
		label: "JJY 40 kHz",
		carrier_hz: 40_000.,
		// 3rd harmonic
		base_hz: 40_000. / 3.,
		time_zone: "Asia/Tokyo",
		low_ratio: 0.1,
		description: "Ohtakadoya-yama, Fukushima, Japan",
		encoder: Encoder::Jjy
	},
	Station {
		id: "jjy-60",
		label: "JJY 60 kHz",
		carrier_hz: 60_000.,
		// 3rd harmonic
		base_hz: 20_000.,
		time_zone: "Asia/Tokyo",
		low_ratio: 0.1,
		description: "Hagane-yama, Fukuoka/Saga, Japan",
		encoder: Encoder::Jjy
	},
	Station {
		id: "bpc",
		label: "BPC 68.5 kHz",
		carrier_hz: 68_500.,
		// 5th harmonic
		base_hz: 13_700.,
		time_zone: "Asia/Shanghai",
		low_ratio: 0.1,
		description: "Shangqiu, Henan, China",
		encoder: Encoder::Bpc
	},
	Station {
		id: "dcf77",
		label: "DCF77 77.5 kHz",
		carrier_hz: 77_500.,
		// 5th harmonic
		base_hz: 15_500.,
		time_zone: "Europe/Berlin",
		low_ratio: 0.15,
		description: "Mainflingen, Germany",
		encoder: Encoder::Dcf77
	},
	Station {
		id: "msf",
		label: "MSF 60 kHz",
		carrier_hz: 60_000.,
		// 3rd harmonic
		base_hz: 20_000.,
		time_zone: "Europe/London",
		low_ratio: 0.,
		description: "Anthorn, Cumbria, United Kingdom",
		encoder: Encoder::Msf
	},
	Station {
		id: "wwvb",
		label: "WWVB 60 kHz",
		carrier_hz: 60_000.,
		// 3rd harmonic
		base_hz: 20_000.,
		time_zone: "UTC",
		// -17 dB
		low_ratio: 0.141,
		description: "Fort Collins, Colorado, United States",
		encoder: Encoder::Wwvb
	}
];

/// Look up a station by id.
///
/// # Examples
/// ```
/// # use signals::get_station_by_id;
/// let station = get_station_by_id("dcf77").unwrap();
/// assert_eq!(station.time_zone, "Europe/Berlin");
/// assert!(get_station_by_id("DCF77").is_none());
/// ```
pub fn get_station_by_id(id: &str) -> Option<&'static Station> {
	STATIONS.iter().find(|s| s.id == id)
}

impl Station {
	/// Encode the second containing `instant`.
	#[inline]
	pub fn signal_for_second(&self, instant: DateTime<Utc>) -> SecondSignal {
		self.encoder.signal_for_second(instant)
	}

	/// Symbols transmitted during each second of the minute containing `instant`.
	///
	/// Seconds past either end of the calendar read as the `"-"` placeholder.
	pub fn minute_symbols(&self, instant: DateTime<Utc>) -> Vec<&'static str> {
		let start = instant.checked_sub_signed(TimeDelta::seconds(i64::from(instant.second())));
		(0..60)
			.map(|i| {
				start
					.and_then(|s| s.checked_add_signed(TimeDelta::seconds(i)))
					.map_or("-", |t| self.signal_for_second(t).symbol)
			})
			.collect()
	}
}
