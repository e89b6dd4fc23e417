// std
use std::sync::OnceLock;
// self
use crate::{_prelude::*, redact::Redactor};

/// Severity attached to a log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	/// Verbose diagnostics.
	Debug,
	/// Normal lifecycle events.
	Info,
	/// Degraded but recoverable behavior, such as a discovery fallback.
	Warn,
	/// Failures surfaced to callers.
	Error,
}
impl LogLevel {
	/// Returns a stable lowercase label.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
		}
	}
}
impl Display for LogLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Destination for already-redacted log records.
pub trait LogSink: Send + Sync {
	/// Emits one record.
	fn log(&self, level: LogLevel, message: &str);
}

/// Sink forwarding records to `tracing` events under the `oauth2_cc` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
#[cfg(feature = "tracing")]
impl LogSink for TracingSink {
	fn log(&self, level: LogLevel, message: &str) {
		match level {
			LogLevel::Debug => tracing::debug!(target: "oauth2_cc", "{message}"),
			LogLevel::Info => tracing::info!(target: "oauth2_cc", "{message}"),
			LogLevel::Warn => tracing::warn!(target: "oauth2_cc", "{message}"),
			LogLevel::Error => tracing::error!(target: "oauth2_cc", "{message}"),
		}
	}
}

/// Sink that drops every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;
impl LogSink for NoopSink {
	fn log(&self, _: LogLevel, _: &str) {}
}

static DEFAULT_SINK: OnceLock<RwLock<Arc<dyn LogSink>>> = OnceLock::new();

fn default_slot() -> &'static RwLock<Arc<dyn LogSink>> {
	DEFAULT_SINK.get_or_init(|| {
		#[cfg(feature = "tracing")]
		let sink: Arc<dyn LogSink> = Arc::new(TracingSink);
		#[cfg(not(feature = "tracing"))]
		let sink: Arc<dyn LogSink> = Arc::new(NoopSink);

		RwLock::new(sink)
	})
}

/// Replaces the process-wide sink used by clients without an injected logger.
pub fn set_default_logger(sink: Arc<dyn LogSink>) {
	*default_slot().write() = sink;
}

/// Returns the process-wide sink, initializing it on first use.
pub fn default_logger() -> Arc<dyn LogSink> {
	default_slot().read().clone()
}

/// Redacting handle used by the client internals.
///
/// Without an injected sink every record resolves the process-wide default at emit time, so a
/// later [`set_default_logger`] call still takes effect.
#[derive(Clone, Default)]
pub struct Logger {
	sink: Option<Arc<dyn LogSink>>,
	redactor: Redactor,
}
impl Logger {
	/// Logger bound to an explicit sink.
	pub fn new(sink: Arc<dyn LogSink>) -> Self {
		Self { sink: Some(sink), redactor: Redactor::new() }
	}

	/// Redacts `message` and forwards it to the sink.
	pub fn log(&self, level: LogLevel, message: &str) {
		let message = self.redactor.redact(message);

		match &self.sink {
			Some(sink) => sink.log(level, &message),
			None => default_logger().log(level, &message),
		}
	}

	/// Emits a debug record.
	pub fn debug(&self, message: &str) {
		self.log(LogLevel::Debug, message);
	}

	/// Emits an info record.
	pub fn info(&self, message: &str) {
		self.log(LogLevel::Info, message);
	}

	/// Emits a warning record.
	pub fn warn(&self, message: &str) {
		self.log(LogLevel::Warn, message);
	}

	/// Emits an error record.
	pub fn error(&self, message: &str) {
		self.log(LogLevel::Error, message);
	}
}
impl Debug for Logger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Logger").field("injected", &self.sink.is_some()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Default)]
	struct Capture(Mutex<Vec<(LogLevel, String)>>);
	impl LogSink for Capture {
		fn log(&self, level: LogLevel, message: &str) {
			self.0.lock().push((level, message.to_owned()));
		}
	}

	#[test]
	fn logger_redacts_before_forwarding() {
		let sink = Arc::new(Capture::default());
		let logger = Logger::new(sink.clone());

		logger.warn("token request failed: client_secret=hunter2hunter2");
		logger.debug("plain");

		let records = sink.0.lock().clone();

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].0, LogLevel::Warn);
		assert_eq!(records[0].1, "token request failed: client_secret=[REDACTED]");
		assert_eq!(records[1], (LogLevel::Debug, "plain".to_owned()));
	}

	#[test]
	fn levels_order_by_severity() {
		assert!(LogLevel::Debug < LogLevel::Warn);
		assert_eq!(LogLevel::Error.to_string(), "error");
	}
}
