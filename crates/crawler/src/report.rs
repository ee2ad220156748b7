//! Final report of a crawl run

use crate::errors::FailureReason;
use chrono::{DateTime, Utc};
use citeforge_common::PublicationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left to process
    FrontierExhausted,
    /// The node budget was reached; remaining ids stay queued
    NodeBudgetReached,
    Cancelled,
    DeadlineExceeded,
}

impl StopReason {
    pub fn status(self) -> RunStatus {
        match self {
            StopReason::FrontierExhausted | StopReason::NodeBudgetReached => RunStatus::Completed,
            StopReason::Cancelled | StopReason::DeadlineExceeded => RunStatus::Aborted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub status: RunStatus,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Ids that reached Done or Failed
    pub processed: usize,
    pub failures: BTreeMap<PublicationId, FailureReason>,
    pub partial_failures: BTreeMap<PublicationId, String>,

    /// Claimed but never processed (budget truncation or abort)
    pub queued: Vec<PublicationId>,

    /// Writes still rejected after the final retry
    pub store_failures: BTreeMap<PublicationId, String>,

    pub node_count: usize,
    pub edge_count: usize,
}

impl CrawlReport {
    pub fn is_degraded(&self) -> bool {
        !self.store_failures.is_empty()
    }
}
