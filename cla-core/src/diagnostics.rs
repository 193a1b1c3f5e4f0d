//! Environment-driven diagnostics.
//!
//! `CLA_DIAGNOSTICS=1` prints a progress line per sampled simplex step and
//! corner, and installs a [`crate::StderrTrace`] when the caller gave no
//! trace sink. `CLA_DIAGNOSTICS_EVERY=N` samples every N-th simplex step and
//! corner; the simplex state dumps sent to the trace are thinned the same way.

use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    /// Sampling period for steps and corners (at least 1)
    pub every: usize,
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(false)
}

impl DiagnosticsConfig {
    pub fn from_env() -> Self {
        let every = env::var("CLA_DIAGNOSTICS_EVERY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1);
        Self::default()
            .with_enabled(flag("CLA_DIAGNOSTICS"))
            .with_every(every)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Zero is treated as 1.
    pub fn with_every(mut self, every: usize) -> Self {
        self.every = every.max(1);
        self
    }

    /// Whether step or corner `iter` (1-based) is sampled.
    #[inline]
    pub fn samples(&self, iter: usize) -> bool {
        iter % self.every == 0
    }

    /// Whether step or corner `iter` gets a progress line on stderr.
    #[inline]
    pub fn should_log(&self, iter: usize) -> bool {
        self.enabled && self.samples(iter)
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { enabled: false, every: 1 }
    }
}
