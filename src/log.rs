//! Leveled, PII-gated logger tagged with a correlation id.
//!
//! Lines are written to one process-wide [`LogSink`]. The active level and the PII flag
//! live in [`LogSettings`], installed with [`configure`]; the default settings emit only
//! errors and route them to [`TracingSink`].

// std
use std::sync::LazyLock;
// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

static SETTINGS: LazyLock<RwLock<LogSettings>> =
	LazyLock::new(|| RwLock::new(LogSettings::default()));

/// Installs process-wide log settings.
pub fn configure(settings: LogSettings) {
	*SETTINGS.write() = settings;
}

/// Returns a snapshot of the process-wide log settings.
pub fn settings() -> LogSettings {
	SETTINGS.read().clone()
}

/// Severity levels; a line is emitted when its level is at most the active level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
	/// Failures.
	#[default]
	Error = 0,
	/// Recoverable anomalies and usage errors.
	Warn = 1,
	/// Flow milestones.
	Info = 2,
	/// Protocol details such as expected states and navigation URLs.
	Verbose = 3,
}
impl LogLevel {
	/// Tag placed in front of the message.
	pub const fn tag(self) -> &'static str {
		match self {
			LogLevel::Error => "ERROR:",
			LogLevel::Warn => "WARNING:",
			LogLevel::Info => "INFO:",
			LogLevel::Verbose => "VERBOSE:",
		}
	}
}

/// Destination for formatted log lines.
pub trait LogSink
where
	Self: Send + Sync,
{
	/// Writes one fully formatted line.
	fn write(&self, level: LogLevel, line: &str);
}

/// Sink forwarding lines to `tracing` events when the `tracing` feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
impl LogSink for TracingSink {
	fn write(&self, level: LogLevel, line: &str) {
		#[cfg(feature = "tracing")]
		match level {
			LogLevel::Error => tracing::error!(target: "oauth2_implicit", "{line}"),
			LogLevel::Warn => tracing::warn!(target: "oauth2_implicit", "{line}"),
			LogLevel::Info => tracing::info!(target: "oauth2_implicit", "{line}"),
			LogLevel::Verbose => tracing::debug!(target: "oauth2_implicit", "{line}"),
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (level, line);
		}
	}
}

/// Process-wide logging switches.
#[derive(Clone)]
pub struct LogSettings {
	/// Most verbose level that is still emitted.
	pub level: LogLevel,
	/// Whether lines that may contain personal data are emitted.
	pub pii_logging_enabled: bool,
	/// Destination for emitted lines.
	pub sink: Arc<dyn LogSink>,
}
impl LogSettings {
	/// Returns `true` when a line at `level` passes the level and PII gates.
	pub fn allows(&self, level: LogLevel, contains_pii: bool) -> bool {
		level <= self.level && (self.pii_logging_enabled || !contains_pii)
	}
}
impl Default for LogSettings {
	fn default() -> Self {
		Self { level: LogLevel::Error, pii_logging_enabled: false, sink: Arc::new(TracingSink) }
	}
}
impl Debug for LogSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LogSettings")
			.field("level", &self.level)
			.field("pii_logging_enabled", &self.pii_logging_enabled)
			.finish_non_exhaustive()
	}
}

/// Per-context logger carrying the correlation id and library version.
#[derive(Clone, Debug)]
pub struct Logger {
	correlation_id: String,
	lib_version: String,
}
impl Logger {
	/// Creates a logger; an empty correlation id is omitted from lines.
	pub fn new(correlation_id: impl Into<String>, lib_version: impl Into<String>) -> Self {
		Self { correlation_id: correlation_id.into(), lib_version: lib_version.into() }
	}

	/// Correlation id stamped on every line.
	pub fn correlation_id(&self) -> &str {
		&self.correlation_id
	}

	/// Logs at [`LogLevel::Error`], appending the error chain when supplied.
	pub fn error(&self, message: &str, error: Option<&dyn StdError>) {
		self.log(LogLevel::Error, message, error, false);
	}

	/// Logs at [`LogLevel::Warn`].
	pub fn warn(&self, message: &str) {
		self.log(LogLevel::Warn, message, None, false);
	}

	/// Logs at [`LogLevel::Info`].
	pub fn info(&self, message: &str) {
		self.log(LogLevel::Info, message, None, false);
	}

	/// Logs at [`LogLevel::Verbose`].
	pub fn verbose(&self, message: &str) {
		self.log(LogLevel::Verbose, message, None, false);
	}

	/// PII variant of [`error`](Self::error).
	pub fn error_pii(&self, message: &str, error: Option<&dyn StdError>) {
		self.log(LogLevel::Error, message, error, true);
	}

	/// PII variant of [`warn`](Self::warn).
	pub fn warn_pii(&self, message: &str) {
		self.log(LogLevel::Warn, message, None, true);
	}

	/// PII variant of [`info`](Self::info).
	pub fn info_pii(&self, message: &str) {
		self.log(LogLevel::Info, message, None, true);
	}

	/// PII variant of [`verbose`](Self::verbose).
	pub fn verbose_pii(&self, message: &str) {
		self.log(LogLevel::Verbose, message, None, true);
	}

	/// Formats a line as `{timestamp}:{correlation_id}-{version}-{TAG} {message}`.
	pub fn format_line(
		&self,
		timestamp: OffsetDateTime,
		level: LogLevel,
		message: &str,
		error: Option<&dyn StdError>,
	) -> String {
		let stamp =
			timestamp.format(&Rfc2822).unwrap_or_else(|_| timestamp.unix_timestamp().to_string());
		let mut line = if self.correlation_id.is_empty() {
			format!("{stamp}:{}-{} {message}", self.lib_version, level.tag())
		} else {
			format!("{stamp}:{}-{}-{} {message}", self.correlation_id, self.lib_version, level.tag())
		};

		if let Some(error) = error {
			line.push_str("\nstack:\n");
			line.push_str(&error.to_string());

			let mut source = error.source();

			while let Some(cause) = source {
				line.push_str("\ncaused by: ");
				line.push_str(&cause.to_string());

				source = cause.source();
			}
		}

		line
	}

	fn log(&self, level: LogLevel, message: &str, error: Option<&dyn StdError>, contains_pii: bool) {
		let sink = {
			let settings = SETTINGS.read();

			if !settings.allows(level, contains_pii) {
				return;
			}

			Arc::clone(&settings.sink)
		};

		sink.write(level, &self.format_line(OffsetDateTime::now_utc(), level, message, error));
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::error::ConfigError;

	#[derive(Default)]
	struct CaptureSink(Mutex<Vec<(LogLevel, String)>>);
	impl LogSink for CaptureSink {
		fn write(&self, level: LogLevel, line: &str) {
			self.0.lock().push((level, line.to_owned()));
		}
	}

	#[test]
	fn gates_by_level_and_pii_flag() {
		let settings = LogSettings { level: LogLevel::Info, ..Default::default() };

		assert!(settings.allows(LogLevel::Error, false));
		assert!(settings.allows(LogLevel::Info, false));
		assert!(!settings.allows(LogLevel::Verbose, false));
		assert!(!settings.allows(LogLevel::Info, true));

		let settings = LogSettings { pii_logging_enabled: true, ..settings };

		assert!(settings.allows(LogLevel::Warn, true));
	}

	#[test]
	fn lines_carry_correlation_version_and_tag() {
		let at = datetime!(2025-03-04 05:06:07 UTC);
		let logger = Logger::new("cid-1", "0.1.0");

		assert_eq!(
			logger.format_line(at, LogLevel::Warn, "hello", None),
			"Tue, 04 Mar 2025 05:06:07 +0000:cid-1-0.1.0-WARNING: hello"
		);

		let anonymous = Logger::new("", "0.1.0");

		assert_eq!(
			anonymous.format_line(at, LogLevel::Verbose, "hi", None),
			"Tue, 04 Mar 2025 05:06:07 +0000:0.1.0-VERBOSE: hi"
		);
	}

	#[test]
	fn errors_append_their_source_chain() {
		let at = datetime!(2025-03-04 05:06:07 UTC);
		let source = url::Url::parse("::").expect_err("Fixture URL should fail to parse.");
		let error = ConfigError::invalid_url("redirect_uri", source);
		let line = Logger::new("c", "v").format_line(at, LogLevel::Error, "boom", Some(&error));

		assert!(line.starts_with("Tue, 04 Mar 2025 05:06:07 +0000:c-v-ERROR: boom\nstack:\n"));
		assert!(line.contains("The redirect_uri URL is invalid."));
		assert!(line.contains("\ncaused by: "));
	}

	#[test]
	fn configured_sink_receives_allowed_lines() {
		let sink = Arc::new(CaptureSink::default());

		configure(LogSettings {
			level: LogLevel::Info,
			pii_logging_enabled: false,
			sink: sink.clone(),
		});

		let logger = Logger::new("cid-sink", "v");

		logger.info("visible");
		logger.info_pii("hidden");
		logger.verbose("too chatty");
		configure(LogSettings::default());

		let lines = sink.0.lock();
		let ours: Vec<_> = lines.iter().filter(|(_, line)| line.contains("cid-sink")).collect();

		assert_eq!(ours.len(), 1);
		assert_eq!(ours[0].0, LogLevel::Info);
		assert!(ours[0].1.ends_with("INFO: visible"));
	}
}
