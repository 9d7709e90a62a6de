//! Error kinds for the engine (§7 of the design).
//!
//! Tasks and the job layer communicate failures through `anyhow::Error` so
//! that user-process errors (which may be anything) and engine-internal
//! errors share one type. The three outcomes the engine must tell apart —
//! no-data, cancellation, and "everything else" — are modeled as concrete
//! types that can be matched with `downcast_ref` against the error chain,
//! rather than a closed enum every call site has to match exhaustively.

use std::fmt;

pub type Result<T> = anyhow::Result<T>;

/// A distinguished "no output to write" outcome. Not a failure: the tile is
/// skipped and progress still advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDataError;

impl fmt::Display for NoDataError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("no data")
	}
}

impl std::error::Error for NoDataError {}

/// Raised by a task or an observer to terminate the job. Cancellation is
/// terminal and re-raises at the job boundary once the executor has drained.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelledError;

impl fmt::Display for CancelledError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("job cancelled")
	}
}

impl std::error::Error for CancelledError {}

/// All other error kinds named in §7 that the engine needs to reason about
/// structurally (as opposed to opaque user-process panics, which just ride
/// along as `anyhow::Error`).
#[derive(Debug)]
pub enum EngineError {
	/// Invalid job configuration; raised during `parsing`, terminal.
	Config(String),
	/// Malformed preprocessing-task key or unknown input key (§4.3).
	DependencyKey(String),
	/// The user process returned an empty/invalid output (§4.5 step 6).
	ProcessOutput(String),
	/// Transport/backend failure in an executor.
	Executor(String),
}

impl fmt::Display for EngineError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EngineError::Config(msg) => write!(f, "config error: {msg}"),
			EngineError::DependencyKey(msg) => write!(f, "dependency key error: {msg}"),
			EngineError::ProcessOutput(msg) => write!(f, "process output error: {msg}"),
			EngineError::Executor(msg) => write!(f, "executor error: {msg}"),
		}
	}
}

impl std::error::Error for EngineError {}

/// True if `err` (or any error in its chain) is the no-data sentinel.
pub fn is_nodata(err: &anyhow::Error) -> bool {
	err.chain().any(|e| e.downcast_ref::<NoDataError>().is_some())
}

/// True if `err` (or any error in its chain) is the cancellation signal.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
	err.chain().any(|e| e.downcast_ref::<CancelledError>().is_some())
}
