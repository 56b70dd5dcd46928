//! Video extension chain arithmetic.
//!
//! A fresh video is at most `base_duration_secs` long; every extension adds
//! `increment_secs`. A chain may be extended at most `max_extensions` times.

use serde::Serialize;

use crate::params::VideoResolution;

/// Default length of a fresh extendable clip, in seconds.
pub const DEFAULT_BASE_DURATION_SECS: u32 = 8;

/// Default length added by one extension, in seconds.
pub const DEFAULT_INCREMENT_SECS: u32 = 7;

/// Default maximum number of extensions per chain.
pub const DEFAULT_MAX_EXTENSIONS: u32 = 20;

/// Limits applied to video extension chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionPolicy {
    pub base_duration_secs: u32,
    pub increment_secs: u32,
    pub max_extensions: u32,
    /// The only resolution tier the provider can extend.
    pub extendable_resolution: VideoResolution,
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self {
            base_duration_secs: DEFAULT_BASE_DURATION_SECS,
            increment_secs: DEFAULT_INCREMENT_SECS,
            max_extensions: DEFAULT_MAX_EXTENSIONS,
            extendable_resolution: VideoResolution::P720,
        }
    }
}

impl ExtensionPolicy {
    /// Longest chain the policy allows (148 s with the defaults).
    pub fn max_total_duration_secs(&self) -> u32 {
        self.base_duration_secs + self.max_extensions * self.increment_secs
    }

    /// Number of extensions already spent by a chain of `total_duration_secs`.
    pub fn extensions_used(&self, total_duration_secs: u32) -> u32 {
        if self.increment_secs == 0 {
            return 0;
        }
        total_duration_secs.saturating_sub(self.base_duration_secs) / self.increment_secs
    }

    pub fn extensions_remaining(&self, total_duration_secs: u32) -> u32 {
        self.max_extensions
            .saturating_sub(self.extensions_used(total_duration_secs))
    }

    /// Total length after one more extension.
    pub fn next_total_duration_secs(&self, total_duration_secs: u32) -> u32 {
        total_duration_secs + self.increment_secs
    }

    /// Whether a chain of this length still has room for one extension.
    pub fn has_room(&self, total_duration_secs: u32) -> bool {
        self.extensions_used(total_duration_secs) < self.max_extensions
            && self.next_total_duration_secs(total_duration_secs) <= self.max_total_duration_secs()
    }
}
