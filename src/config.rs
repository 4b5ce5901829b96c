//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// What the Poll stage does when a status-check call itself fails
/// (transport or API error, as opposed to an `Error` job status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheckFailurePolicy {
    /// Log and abandon the job.
    Drop,
    /// Re-schedule the job on the re-check queue. The job is dropped when
    /// the call fails again after `max_retries` consecutive retries.
    Retry { max_retries: u32 },
}

impl StatusCheckFailurePolicy {
    /// Build a policy from a retry count; `0` means [`Self::Drop`].
    ///
    /// `n` retries allow `n + 1` consecutive failed calls before the job is dropped.
    pub fn from_retries(retries: u32) -> Self {
        if retries == 0 {
            Self::Drop
        } else {
            Self::Retry {
                max_retries: retries,
            }
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How often the Fetch stage asks the email source for new mail.
    pub fetch_interval: Duration,
    /// Pause between two items in the Submit, Poll and Collect stages, and the
    /// delay before a Pending job is checked again.
    pub job_interval: Duration,
    /// Filter handed verbatim to the email source.
    pub mail_filter: String,
    /// Capacity of each inter-stage queue. A full queue blocks its producer.
    pub queue_capacity: usize,
    /// Maximum number of Pending jobs waiting for a re-check at once.
    pub max_outstanding_rechecks: usize,
    /// Behaviour when a status-check call fails.
    pub status_failure_policy: StatusCheckFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_secs(600), // 10 minutes
            job_interval: Duration::from_secs(15),
            mail_filter: "unread".to_string(),
            queue_capacity: 16,
            max_outstanding_rechecks: 1024,
            status_failure_policy: StatusCheckFailurePolicy::Retry { max_retries: 3 },
        }
    }
}

const ENV_FETCH_INTERVAL: &str = "TRIP_PIPELINE_FETCH_INTERVAL_SECS";
const ENV_JOB_INTERVAL: &str = "TRIP_PIPELINE_JOB_INTERVAL_SECS";
const ENV_MAIL_FILTER: &str = "TRIP_PIPELINE_MAIL_FILTER";
const ENV_QUEUE_CAPACITY: &str = "TRIP_PIPELINE_QUEUE_CAPACITY";
const ENV_MAX_RECHECKS: &str = "TRIP_PIPELINE_MAX_RECHECKS";
const ENV_STATUS_RETRIES: &str = "TRIP_PIPELINE_STATUS_RETRIES";

impl PipelineConfig {
    /// Build config from environment variables, keeping defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_FETCH_INTERVAL)? {
            config.fetch_interval = Duration::from_secs(at_least_one(ENV_FETCH_INTERVAL, secs)?);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_JOB_INTERVAL)? {
            config.job_interval = Duration::from_secs(secs);
        }
        if let Some(filter) = lookup(ENV_MAIL_FILTER) {
            config.mail_filter = filter;
        }
        if let Some(capacity) = parse_var::<usize, _>(&lookup, ENV_QUEUE_CAPACITY)? {
            config.queue_capacity = at_least_one(ENV_QUEUE_CAPACITY, capacity)?;
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, ENV_MAX_RECHECKS)? {
            config.max_outstanding_rechecks = at_least_one(ENV_MAX_RECHECKS, max)?;
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, ENV_STATUS_RETRIES)? {
            config.status_failure_policy = StatusCheckFailurePolicy::from_retries(retries);
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}

fn at_least_one<T>(key: &str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8>,
{
    if value < T::from(1) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
