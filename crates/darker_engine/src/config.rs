//! Engine and load configuration.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::queue::ActionCompleted;

/// Default scheduler rate.
pub const DEFAULT_TICKS_PER_SECOND: f64 = 60.0;

/// Default latency above which a batched `add_entity` logs a warning.
pub const DEFAULT_SLOW_ADD_THRESHOLD: Duration = Duration::from_millis(500);

/// Observer invoked once per scheduler iteration with the drained action, if
/// any.
pub type TickObserver<T> = Box<dyn FnMut(Option<&ActionCompleted<T>>) + Send>;

/// Construction-time engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A batched `add_entity` taking longer than this logs a warning.
    pub slow_add_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slow_add_threshold: DEFAULT_SLOW_ADD_THRESHOLD,
        }
    }
}

/// The serialisable part of a load configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickSettings {
    /// Scheduler iterations per second.
    pub ticks_per_second: f64,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

impl TickSettings {
    /// Check the settings and return the tick interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTickRate`] unless `ticks_per_second` is
    /// positive and finite, and yields a non-zero interval that fits in a
    /// [`Duration`].
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let rate = self.ticks_per_second;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::InvalidTickRate(rate));
        }
        match Duration::try_from_secs_f64(1.0 / rate) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(ConfigError::InvalidTickRate(rate)),
        }
    }
}

/// Configuration passed to `load`.
pub struct LoadConfig<T> {
    /// Scheduler settings.
    pub settings: TickSettings,
    /// Optional tick observer.
    pub on_tick: Option<TickObserver<T>>,
}

impl<T> LoadConfig<T> {
    /// A configuration with the default rate and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::from_settings(TickSettings::default())
    }

    /// A configuration built from deserialised settings.
    #[must_use]
    pub fn from_settings(settings: TickSettings) -> Self {
        Self {
            settings,
            on_tick: None,
        }
    }

    /// Override the scheduler rate.
    #[must_use]
    pub fn with_ticks_per_second(mut self, ticks_per_second: f64) -> Self {
        self.settings.ticks_per_second = ticks_per_second;
        self
    }

    /// Register the tick observer.
    #[must_use]
    pub fn on_tick<F>(mut self, observer: F) -> Self
    where
        F: FnMut(Option<&ActionCompleted<T>>) + Send + 'static,
    {
        self.on_tick = Some(Box::new(observer));
        self
    }
}

impl<T> Default for LoadConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LoadConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("settings", &self.settings)
            .field("on_tick", &self.on_tick.is_some())
            .finish()
    }
}
