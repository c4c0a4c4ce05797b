//! Drive an audio oscillator with a time signal.
//!
//! [`SignalEngine`] plays one station at a time. It owns a square wave oscillator tuned to the
//! station's base frequency and a gain node that shapes the amplitude envelope. Every
//! [`TICK_PERIOD`] it asks the station's encoder for each second starting within the next
//! [`LOOKAHEAD`] of audio and schedules the gain changes for those seconds on the audio clock.
//! Scheduling ahead keeps the envelope sample-accurate even when the tick itself is late.
//!
//! The audio graph is abstracted by the traits in [`audio`]; [`audio::cpal`] provides the real
//! implementation.
//!
//! # Examples
//! ```no_run
//! # async fn run() -> Result<(), engine::EngineError> {
//! use engine::{SignalEngine, StartRequest};
//! use engine::audio::cpal::CpalFactory;
//!
//! let engine = SignalEngine::new(CpalFactory::default());
//! engine.start(StartRequest::new("dcf77", 0.8)).await?;
//! // ...
//! engine.stop();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};

pub mod audio;
mod engine;
mod error;
mod session;

pub use engine::{Phase, SignalEngine};
pub use error::{AudioError, EngineError};

/// Period of the scheduling task.
pub const TICK_PERIOD: Duration = Duration::from_millis(120);

/// How far ahead of the audio clock gain changes are scheduled.
pub const LOOKAHEAD: Duration = Duration::from_millis(1200);

/// Parameters of [`SignalEngine::start`].
#[derive(Clone, Debug, PartialEq)]
pub struct StartRequest {
	/// Station id, see [`signals::STATIONS`].
	pub station: String,
	/// Full amplitude, clamped to [0, 1].
	pub volume: f64,
	/// Offset added to the wall clock before encoding, in milliseconds. Positive values transmit
	/// a later time.
	pub offset_ms: i64
}

impl StartRequest {
	/// Create a request without a clock offset.
	pub fn new(station: impl Into<String>, volume: f64) -> StartRequest {
		StartRequest {
			station: station.into(),
			volume,
			offset_ms: 0
		}
	}

	/// Set the clock offset.
	pub fn with_offset_ms(mut self, offset_ms: i64) -> StartRequest {
		self.offset_ms = offset_ms;
		self
	}
}

/// Source of wall clock time.
pub trait WallClock: Send + Sync + 'static {
	fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
	#[inline]
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clamp a volume to [0, 1], mapping NaN to 0.
#[inline]
fn clamp_volume(volume: f64) -> f64 {
	if volume.is_nan() { 0. } else { volume.clamp(0., 1.) }
}
