// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ProcsyncError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ProcsyncError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_orchestrator(cfg)?;
    validate_worker_defaults(cfg)?;
    validate_sampler(cfg)?;
    validate_event_log(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> ProcsyncError {
    ProcsyncError::ConfigError(msg.into())
}

fn validate_orchestrator(cfg: &RawConfigFile) -> Result<()> {
    let o = &cfg.orchestrator;

    if o.max_workers == 0 {
        return Err(config_error("[orchestrator].max_workers must be >= 1 (got 0)"));
    }
    if o.poll_interval_ms == 0 {
        return Err(config_error("[orchestrator].poll_interval_ms must be > 0"));
    }
    if o.status_channel_ceiling == 0 {
        return Err(config_error(
            "[orchestrator].status_channel_ceiling must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_worker_defaults(cfg: &RawConfigFile) -> Result<()> {
    // speed, priority and kind are strongly typed and validated during
    // deserialization.
    let w = &cfg.worker;

    if w.total_units == 0 {
        return Err(config_error("[worker].total_units must be >= 1 (got 0)"));
    }
    check_probability("[worker].log_probability", w.log_probability)?;
    Ok(())
}

fn validate_sampler(cfg: &RawConfigFile) -> Result<()> {
    let s = &cfg.sampler;

    if s.interval_ms == 0 {
        return Err(config_error("[sampler].interval_ms must be > 0"));
    }
    if s.read_timeout_ms == 0 {
        return Err(config_error("[sampler].read_timeout_ms must be > 0"));
    }
    check_probability("[sampler].stats_log_probability", s.stats_log_probability)?;
    Ok(())
}

fn validate_event_log(cfg: &RawConfigFile) -> Result<()> {
    if cfg.event_log.capacity < 2 {
        return Err(config_error(format!(
            "[event_log].capacity must be >= 2 (got {})",
            cfg.event_log.capacity
        )));
    }
    Ok(())
}

fn check_probability(key: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(config_error(format!(
            "{key} must be between 0.0 and 1.0 (got {value})"
        )));
    }
    Ok(())
}
