//! Task watchdog configuration.

use crate::entity::CoreMask;
use crate::error::{TwdtError, TwdtResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default watchdog timeout.
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

/// Configuration applied by `init` and `reconfigure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WdtConfig {
    /// Period within which every subscribed entity must check in.
    pub timeout_ms: u32,
    /// Cores whose idle task is subscribed automatically.
    pub idle_core_mask: u32,
    /// Abort the process after reporting a timeout.
    pub trigger_panic: bool,
}

impl Default for WdtConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            idle_core_mask: 0,
            trigger_panic: false,
        }
    }
}

impl WdtConfig {
    /// Configuration with the given timeout and no idle subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `timeout_ms` is zero.
    pub fn new(timeout_ms: u32) -> TwdtResult<Self> {
        let config = Self {
            timeout_ms,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> WdtConfigBuilder {
        WdtConfigBuilder::default()
    }

    /// Check the fields that do not depend on the platform.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `timeout_ms` is zero.
    pub fn validate(&self) -> TwdtResult<()> {
        if self.timeout_ms == 0 {
            return Err(TwdtError::invalid_argument("timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Check the configuration against a platform with `core_count` cores.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if [`validate`](Self::validate) fails or the
    /// idle mask names a core the platform does not have.
    pub fn validate_for_cores(&self, core_count: u32) -> TwdtResult<()> {
        self.validate()?;
        let available = CoreMask::all(core_count);
        if !available.is_superset_of(self.idle_cores()) {
            return Err(TwdtError::invalid_argument(format!(
                "idle_core_mask {:#x} names cores beyond the {core_count} available",
                self.idle_core_mask
            )));
        }
        Ok(())
    }

    /// Timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Idle subscription mask.
    #[must_use]
    pub const fn idle_cores(&self) -> CoreMask {
        CoreMask::from_bits(self.idle_core_mask)
    }
}

/// Builder for [`WdtConfig`].
#[derive(Debug, Clone, Default)]
pub struct WdtConfigBuilder {
    config: WdtConfig,
}

impl WdtConfigBuilder {
    /// Set the timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Set the timeout, saturating at `u32::MAX` milliseconds.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        self
    }

    /// Subscribe the idle task of `core`.
    #[must_use]
    pub fn idle_core(mut self, core: u32) -> Self {
        self.config.idle_core_mask |= CoreMask::single(core).bits();
        self
    }

    /// Replace the idle subscription mask.
    #[must_use]
    pub fn idle_core_mask(mut self, mask: u32) -> Self {
        self.config.idle_core_mask = mask;
        self
    }

    /// Abort after reporting a timeout.
    #[must_use]
    pub fn trigger_panic(mut self, trigger_panic: bool) -> Self {
        self.config.trigger_panic = trigger_panic;
        self
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the timeout is zero.
    pub fn build(self) -> TwdtResult<WdtConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
