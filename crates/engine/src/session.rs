//! One playback session: the audio graph for a station plus the look-ahead scheduler state.

use chrono::{DateTime, TimeDelta, Utc};
use signals::{SecondSignal, Station, Window};
use smallvec::SmallVec;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audio::{AudioContext, Gain, Oscillator};
use crate::{AudioError, LOOKAHEAD};

/// Audio graph and scheduling state owned by the engine while a station is playing.
///
/// Second `k` of the session starts at audio clock `start_time + k` and transmits the signal for
/// wall clock instant `wall_base + k` seconds.
pub(crate) struct EngineSession<C: AudioContext> {
	/// Generation token of the `start` call that created this session.
	pub generation: u64,
	context: C,
	oscillator: C::Oscillator,
	gain: C::Gain,
	station: &'static Station,
	volume: f64,
	/// Audio clock time of the first whole second.
	start_time: f64,
	/// Wall clock instant transmitted at `start_time`.
	wall_base: DateTime<Utc>,
	/// Index of the next second that has not been scheduled.
	next_second: i64,
	/// Periodic scheduling task, once armed.
	pub ticker: Option<JoinHandle<()>>
}

impl<C: AudioContext> EngineSession<C> {
	/// Build the audio graph for `station` in `context`.
	///
	/// `target` is the wall clock instant to transmit right now (system time plus the user's
	/// offset), as returned by [`offset_target`]. The oscillator starts at the next whole second of
	/// `target`. If the graph cannot be built, the context is closed before returning the error.
	pub fn open(
		mut context: C,
		station: &'static Station,
		volume: f64,
		target: DateTime<Utc>,
		generation: u64
	) -> Result<EngineSession<C>, AudioError> {
		let now = context.current_time();
		let wall_base = next_whole_second(target).unwrap_or(target);
		let lead = (wall_base - target).num_microseconds().unwrap_or(0) as f64 / 1e6;
		let start_time = now + lead;

		let graph = context.create_gain().and_then(|mut gain| {
			let mut oscillator = context.create_oscillator(station.base_hz, &gain)?;
			gain.set_value_at_time(volume, start_time);
			oscillator.start(start_time)?;
			Ok((oscillator, gain))
		});
		let (oscillator, gain) = match graph {
			Ok(g) => g,
			Err(e) => {
				if let Err(close) = context.close() {
					debug!("ignoring error closing context: {}", close);
				}
				return Err(e);
			}
		};

		debug!(station = station.id, %wall_base, start_time, "session opened");
		Ok(EngineSession {
			generation,
			context,
			oscillator,
			gain,
			station,
			volume,
			start_time,
			wall_base,
			next_second: 0,
			ticker: None
		})
	}

	/// Access the context, e.g. to resume it.
	pub fn context(&self) -> &C {
		&self.context
	}

	/// Program gain changes for every second that starts before the look-ahead horizon.
	///
	/// Returns the number of seconds scheduled.
	pub fn schedule(&mut self) -> usize {
		let now = self.context.current_time();
		let horizon = now + LOOKAHEAD.as_secs_f64();
		let full = self.volume;
		let low = self.volume * self.station.low_ratio;
		let mut scheduled = 0;
		let mut skipped = 0;

		loop {
			let second_start = self.start_time + self.next_second as f64;
			if second_start >= horizon {
				break;
			}

			let k = self.next_second;
			self.next_second += 1;
			if second_start + 1. <= now {
				skipped += 1;
				continue;
			}

			// Seconds past the end of the calendar carry no modulation
			let signal = TimeDelta::try_seconds(k)
				.and_then(|offset| self.wall_base.checked_add_signed(offset))
				.map_or_else(SecondSignal::placeholder, |instant| self.station.signal_for_second(instant));
			for w in coalesce(&signal.windows) {
				self.gain.set_value_at_time(low, second_start + w.start);
				self.gain.set_value_at_time(full, second_start + w.end);
			}
			scheduled += 1;
		}

		if skipped > 0 {
			warn!(skipped, "scheduler fell behind, skipping seconds already played");
		}
		scheduled
	}

	/// Change the full amplitude, effective immediately.
	pub fn set_volume(&mut self, volume: f64) {
		self.volume = volume;
		let now = self.context.current_time();
		self.gain.set_value_at_time(volume, now);
	}

	/// Tear down the audio graph.
	///
	/// Faults while stopping or closing are logged and otherwise ignored.
	pub fn destroy(mut self) {
		if let Some(ticker) = self.ticker.take() {
			ticker.abort();
		}
		if let Err(e) = self.oscillator.stop() {
			debug!("ignoring error stopping oscillator: {}", e);
		}
		self.oscillator.disconnect();
		self.gain.disconnect();
		if let Err(e) = self.context.close() {
			debug!("ignoring error closing context: {}", e);
		}
		debug!(station = self.station.id, generation = self.generation, "session destroyed");
	}
}

/// The instant to transmit at `now` shifted by `offset_ms`.
///
/// Returns `None` if the shifted instant, or the whole second after it, is out of range.
pub(crate) fn offset_target(now: DateTime<Utc>, offset_ms: i64) -> Option<DateTime<Utc>> {
	let target = now.checked_add_signed(TimeDelta::try_milliseconds(offset_ms)?)?;
	next_whole_second(target)?;
	Some(target)
}

/// Round `instant` up to a whole second. Whole seconds are returned unchanged.
fn next_whole_second(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
	let nanos = instant.timestamp_subsec_nanos();
	if nanos == 0 {
		Some(instant)
	} else {
		instant.checked_add_signed(TimeDelta::nanoseconds(1_000_000_000 - i64::from(nanos)))
	}
}

/// Merge windows that touch or overlap.
///
/// Windows must be sorted by start time.
pub(crate) fn coalesce(windows: &[Window]) -> SmallVec<[Window; 3]> {
	let mut merged: SmallVec<[Window; 3]> = SmallVec::new();
	for &w in windows {
		match merged.last_mut() {
			Some(last) if w.start <= last.end => last.end = last.end.max(w.end),
			_ => merged.push(w)
		}
	}
	merged
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audio::mock::{approx, Event, MockFactory};
	use crate::audio::ContextFactory;
	use chrono::TimeZone;
	use signals::get_station_by_id;
	use std::time::Duration;

	#[test]
	fn coalesce_test() {
		let w = coalesce(&[Window::new(0., 0.1), Window::new(0.1, 0.2), Window::new(0.2, 0.3)]);
		assert_eq!(w.as_slice(), &[Window::new(0., 0.3)]);

		let w = coalesce(&[Window::new(0., 0.1), Window::new(0.2, 0.3)]);
		assert_eq!(w.as_slice(), &[Window::new(0., 0.1), Window::new(0.2, 0.3)]);

		let w = coalesce(&[Window::new(0., 0.1), Window::new(0.1, 0.2), Window::new(0.5, 1.)]);
		assert_eq!(w.as_slice(), &[Window::new(0., 0.2), Window::new(0.5, 1.)]);

		assert!(coalesce(&[]).is_empty());
	}

	#[test]
	fn next_whole_second_test() {
		let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(next_whole_second(t), Some(t));
		assert_eq!(next_whole_second(t + TimeDelta::milliseconds(1)), Some(t + TimeDelta::seconds(1)));
		assert_eq!(next_whole_second(t + TimeDelta::milliseconds(999)), Some(t + TimeDelta::seconds(1)));
		assert_eq!(next_whole_second(t - TimeDelta::milliseconds(250)), Some(t));
		assert_eq!(next_whole_second(DateTime::<Utc>::MAX_UTC), None);
	}

	#[test]
	fn offset_target_test() {
		let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(offset_target(t, 1500), Some(t + TimeDelta::milliseconds(1500)));
		assert_eq!(offset_target(t, -250), Some(t - TimeDelta::milliseconds(250)));
		assert_eq!(offset_target(t, i64::MAX), None);
		assert_eq!(offset_target(t, i64::MIN), None);
		assert_eq!(offset_target(DateTime::<Utc>::MAX_UTC, 0), None);
	}

	#[tokio::test(start_paused = true)]
	async fn skip_test() {
		let (factory, recorder) = MockFactory::new();
		let station = get_station_by_id("jjy-60").unwrap();
		let target = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::milliseconds(250);
		let mut session = EngineSession::open(factory.create().unwrap(), station, 0.5, target, 1).unwrap();
		assert_eq!(session.schedule(), 1);
		assert_eq!(session.schedule(), 0);

		// Seconds 1 to 3 already ended; 4 and 5 start within the look-ahead
		tokio::time::advance(Duration::from_secs(5)).await;
		let before = recorder.gains().len();
		assert_eq!(session.schedule(), 2);
		let gains = recorder.gains();
		assert_eq!(gains.len(), before + 4);
		assert!(approx(gains[before].0, 0.05) && approx(gains[before].1, 5.55), "{:?}", gains);
		assert!(approx(gains[before + 1].0, 0.5) && approx(gains[before + 1].1, 5.75), "{:?}", gains);

		session.destroy();
		assert_eq!(recorder.count(&Event::Stop), 1);
		assert_eq!(recorder.count(&Event::Close), 1);
	}
}
