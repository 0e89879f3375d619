//! Config for the dispatcher behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive: set them to `"true"` to enable them.
//!
//! - `SWEEP_VERBOSE`: print dispatch progress to stdout (default: `true`)
//! - `SWEEP_LOG`: enable logging to a file (default: `false`)
//! - `SWEEP_ALLOW_UNCONTAINED`: run without cgroups when they are unavailable (default: `false`)
//! - `SWEEP_SUBMIT_RETRIES`: retries of a transiently failing submission (default: `0`)
//! - `SWEEP_RETRY_BACKOFF_MS`: pause between two retries, in milliseconds (default: `500`)

use std::time::Duration;

/// Configuration for dispatcher behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) allow_uncontained: bool,
    pub(crate) submit_retries: u32,
    pub(crate) retry_backoff: Duration,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Dispatch progress is printed to stdout.
    /// - Logging to file is disabled.
    /// - Runs are never started outside of a cgroup.
    /// - Failed submissions are not retried.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            allow_uncontained: false,
            submit_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the [module documentation](self) for the recognized variables. Any unparsable value
    /// (including unset) falls back to the default.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_number(var: &str) -> Option<u64> {
            std::env::var(var).ok()?.trim().parse().ok()
        }

        let default = Self::new();
        Self {
            verbose: get_env_flag("SWEEP_VERBOSE", default.verbose),
            log: get_env_flag("SWEEP_LOG", default.log),
            allow_uncontained: get_env_flag("SWEEP_ALLOW_UNCONTAINED", default.allow_uncontained),
            submit_retries: get_env_number("SWEEP_SUBMIT_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(default.submit_retries),
            retry_backoff: get_env_number("SWEEP_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.retry_backoff),
        }
    }

    /// Enable or disable progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Allow or forbid running a process without its cgroup.
    pub fn with_allow_uncontained(mut self, value: bool) -> Self {
        self.allow_uncontained = value;
        self
    }

    /// Number of times a transient submission failure is retried. Zero disables retries.
    pub fn with_submit_retries(mut self, retries: u32) -> Self {
        self.submit_retries = retries;
        self
    }

    /// Pause between two submission attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Whether progress is printed to stdout.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether logs go to a file.
    pub fn log(&self) -> bool {
        self.log
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
