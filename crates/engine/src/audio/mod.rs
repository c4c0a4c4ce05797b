//! Minimal audio graph used by the engine.
//!
//! The engine needs exactly one voice: a square wave oscillator feeding a gain node, which feeds
//! the output. Times are measured in seconds on the context's own audio clock, which only advances
//! while audio is being rendered. Gain changes are scheduled ahead of time and applied by the
//! backend when the audio clock reaches them; if two changes share the same time, the one
//! scheduled last wins.
//!
//! [`cpal`] implements these traits on top of the default output device.

use core::future::Future;
use core::pin::Pin;

use crate::AudioError;

#[cfg(feature = "cpal")]
pub mod cpal;
#[cfg(test)]
pub(crate) mod mock;

/// Future returned by [`AudioContext::resume`].
pub type ResumeFuture = Pin<Box<dyn Future<Output = Result<(), AudioError>> + Send + 'static>>;

/// A running (or suspended) audio output.
pub trait AudioContext: Send + 'static {
	type Oscillator: Oscillator;
	type Gain: Gain;

	/// Current position of the audio clock, in seconds.
	fn current_time(&self) -> f64;

	/// Whether the context is waiting for [`AudioContext::resume`] before producing audio.
	fn is_suspended(&self) -> bool;

	/// Start producing audio. The returned future does not borrow the context.
	fn resume(&self) -> ResumeFuture;

	/// Create a gain node connected to the output.
	fn create_gain(&mut self) -> Result<Self::Gain, AudioError>;

	/// Create a square wave oscillator at `frequency` Hz, connected to `output`.
	fn create_oscillator(&mut self, frequency: f64, output: &Self::Gain) -> Result<Self::Oscillator, AudioError>;

	/// Release the output. Closing twice is an error.
	fn close(&mut self) -> Result<(), AudioError>;
}

/// A scheduled square wave source.
pub trait Oscillator: Send + 'static {
	/// Start the oscillator at audio clock `time`.
	fn start(&mut self, time: f64) -> Result<(), AudioError>;

	/// Stop the oscillator immediately. Stopping twice is an error.
	fn stop(&mut self) -> Result<(), AudioError>;

	/// Disconnect from the gain node.
	fn disconnect(&mut self);
}

/// An automated amplitude stage.
pub trait Gain: Send + 'static {
	/// Change the gain to `value` at audio clock `time`.
	fn set_value_at_time(&mut self, value: f64, time: f64);

	/// Disconnect from the output.
	fn disconnect(&mut self);
}

/// Creates a fresh [`AudioContext`] for each engine session.
pub trait ContextFactory: Send + Sync + 'static {
	type Context: AudioContext;

	/// Open a new context. Contexts may start out suspended.
	fn create(&self) -> Result<Self::Context, AudioError>;
}
