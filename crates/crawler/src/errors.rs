//! Crawler error types
//!
//! Only run-level failures live here. Per-publication failures never abort a
//! run; they are collected into the report as [`FailureReason`]s.

use citeforge_common::errors::{AppError, SourceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid seed {seed:?}: {message}")]
    InvalidSeed { seed: String, message: String },

    #[error("Scheduler already ran; create a new one per run")]
    AlreadyRun,

    #[error("Seed source failed: {0}")]
    SeedSource(String),
}

impl CrawlError {
    /// Classify an error raised while producing seeds
    pub fn from_seed_source(e: AppError) -> Self {
        if e.is_fatal() {
            CrawlError::Configuration(e.to_string())
        } else {
            CrawlError::SeedSource(e.to_string())
        }
    }
}

/// Why a publication ended in the Failed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The identifier does not resolve
    NotFound,
    /// Transient failures persisted through every retry
    Transient { attempts: u32, message: String },
    /// The provider answered with something unusable
    Malformed { message: String },
    /// The worker processing the publication crashed
    Internal { message: String },
}

impl FailureReason {
    /// Map the last error of a call that used `attempts` attempts
    pub fn from_source(err: &SourceError, attempts: u32) -> Self {
        match err {
            SourceError::NotFound => FailureReason::NotFound,
            SourceError::Transient { .. } | SourceError::Timeout { .. } => {
                FailureReason::Transient {
                    attempts,
                    message: err.to_string(),
                }
            }
            SourceError::Malformed { message } => FailureReason::Malformed {
                message: message.clone(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => write!(f, "NotFound"),
            FailureReason::Transient { attempts, message } => {
                write!(f, "TransientError after {} attempts: {}", attempts, message)
            }
            FailureReason::Malformed { message } => write!(f, "Malformed: {}", message),
            FailureReason::Internal { message } => write!(f, "Internal: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_from_source() {
        assert_eq!(
            FailureReason::from_source(&SourceError::NotFound, 1),
            FailureReason::NotFound
        );

        let reason = FailureReason::from_source(&SourceError::Timeout { timeout_ms: 50 }, 4);
        assert!(matches!(reason, FailureReason::Transient { attempts: 4, .. }));
        assert_eq!(reason.to_string(), "TransientError after 4 attempts: timed out after 50ms");
    }

    #[test]
    fn test_seed_source_errors() {
        let err = CrawlError::from_seed_source(AppError::InvalidIdentifier { raw: "".into() });
        assert!(matches!(err, CrawlError::Configuration(_)));

        let err = CrawlError::from_seed_source(AppError::Store {
            message: "connection reset".into(),
        });
        assert!(matches!(err, CrawlError::SeedSource(_)));
        assert_eq!(err.to_string(), "Seed source failed: Store rejected write: connection reset");
    }
}
