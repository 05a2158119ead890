use config::{Config, File};
use serde::Deserialize;
use std::time::Duration;

/// What to do with recognition-engine error events during a listen call.
///
/// The default preserves the long-standing behavior of dropping them on the
/// floor: continuous sessions emit transient errors (no speech, audio
/// glitches) that the supervisor masks by keeping the session running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Drop the event entirely.
    Ignore,
    /// Drop the event after logging a warning.
    Log,
    /// Finalize the listen call early, under the same rules as a timeout.
    Surface,
}

/// Timing and policy knobs for the coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// How long error cues stay visible before auto-clearing.
    pub cue_autoclear_ms: u64,
    /// How long the result cue is held after a listen call finalizes,
    /// before the lock is released.
    pub grace_period_ms: u64,
    /// Interval of the progress tick driving the cue's fill fraction.
    pub progress_tick_ms: u64,
    /// Volume of the one-time engine warm-up utterance.
    pub warmup_volume: f32,
    pub error_policy: ErrorPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cue_autoclear_ms: 5000,
            grace_period_ms: 2500,
            progress_tick_ms: 50,
            warmup_volume: 0.01,
            error_policy: ErrorPolicy::Ignore,
        }
    }
}

impl CoordinatorConfig {
    /// Load settings from `Voiceturn.toml` (working directory, optional) and
    /// `VOICETURN_*` environment variables, layered over the defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = Config::builder()
            .set_default("cue_autoclear_ms", 5000)?
            .set_default("grace_period_ms", 2500)?
            .set_default("progress_tick_ms", 50)?
            .set_default("warmup_volume", 0.01)?
            .set_default("error_policy", "ignore")?
            .add_source(File::with_name("Voiceturn").required(false))
            .add_source(config::Environment::with_prefix("VOICETURN"));

        let settings: CoordinatorConfig = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.progress_tick_ms == 0 {
            return Err(config::ConfigError::Message(
                "progress_tick_ms must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.warmup_volume) {
            return Err(config::ConfigError::Message(format!(
                "Invalid warmup_volume: {}. Must be between 0.0 and 1.0",
                self.warmup_volume
            )));
        }
        Ok(())
    }

    pub fn cue_autoclear(&self) -> Duration {
        Duration::from_millis(self.cue_autoclear_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.cue_autoclear(), Duration::from_millis(5000));
        assert_eq!(config.grace_period(), Duration::from_millis(2500));
        assert_eq!(config.progress_tick(), Duration::from_millis(50));
        assert_eq!(config.error_policy, ErrorPolicy::Ignore);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let config = CoordinatorConfig {
            progress_tick_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_warmup_volume() {
        let config = CoordinatorConfig {
            warmup_volume: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
