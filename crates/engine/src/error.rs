//! Error types for the signal engine and its audio backends.

use thiserror::Error;

/// Errors raised by an audio backend.
#[derive(Error, Debug)]
pub enum AudioError {
	/// No output device is available.
	#[error("no audio output device available")]
	NoDevice,
	/// The output stream could not be created.
	#[cfg(feature = "cpal")]
	#[error("failed to build audio stream: {0}")]
	BuildStream(#[from] cpal::BuildStreamError),
	/// The output stream could not be started.
	#[cfg(feature = "cpal")]
	#[error("failed to play audio stream: {0}")]
	PlayStream(#[from] cpal::PlayStreamError),
	/// The context was already closed.
	#[error("audio context is closed")]
	Closed,
	/// The node was already stopped.
	#[error("oscillator already stopped")]
	AlreadyStopped,
	/// Any other backend failure.
	#[error("audio backend unavailable: {0}")]
	Unavailable(String)
}

/// Errors returned by [`crate::SignalEngine`].
#[derive(Error, Debug)]
pub enum EngineError {
	/// The requested station is not in the catalog.
	#[error("unknown station: {0}")]
	UnknownStation(String),
	/// The clock offset moves the transmitted time out of the representable range.
	#[error("clock offset out of range: {0} ms")]
	InvalidOffset(i64),
	/// The audio graph could not be created or resumed.
	#[error(transparent)]
	Audio(#[from] AudioError)
}
