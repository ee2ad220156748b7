//! Frontier scheduler
//!
//! The traversal engine. One dispatcher loop owns the frontier and spawns
//! at most `concurrency` workers into a [`JoinSet`]. Workers claim the ids
//! they discover through the [`VisitLedger`] and hand them back as their
//! task result, so the frontier itself is never shared.
//!
//! Run states: `Idle -> Running -> {Completed, Aborted}`. A scheduler runs
//! once; build a new one for the next run.

use crate::errors::{CrawlError, FailureReason};
use crate::extractor::extract_references;
use crate::fetcher::{RecordFetcher, TextOutcome};
use crate::frontier::{Frontier, FrontierItem};
use crate::graph::{CitationGraph, GraphAssembler, GraphNode};
use crate::ledger::VisitLedger;
use crate::persistence::PersistenceGateway;
use crate::report::{CrawlReport, RunStatus, StopReason};
use chrono::Utc;
use citeforge_common::config::{CrawlConfig, TraversalDiscipline};
use citeforge_common::metrics::{record_frontier_size, record_processed};
use citeforge_common::{PublicationId, SeedSource, VersionPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Budgets and policies of one run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_nodes: usize,
    pub max_depth: u32,
    pub concurrency: usize,
    pub traversal: TraversalDiscipline,
    pub version_policy: VersionPolicy,
    pub max_run: Option<Duration>,
}

impl From<&CrawlConfig> for CrawlOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            max_nodes: config.max_nodes,
            max_depth: config.max_depth,
            concurrency: config.concurrency.max(1),
            traversal: config.traversal,
            version_policy: config.version_policy,
            max_run: config.max_run_duration(),
        }
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

/// Atomic node budget; a slot is reserved before a worker is spawned
#[derive(Debug)]
struct NodeBudget {
    limit: usize,
    reserved: AtomicUsize,
}

impl NodeBudget {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            reserved: AtomicUsize::new(0),
        }
    }

    fn try_reserve(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    fn exhausted(&self) -> bool {
        self.reserved.load(Ordering::Acquire) >= self.limit
    }
}

/// Everything a worker needs, shared by all workers of a run
struct WorkerContext {
    fetcher: RecordFetcher,
    ledger: VisitLedger,
    assembler: GraphAssembler,
    gateway: PersistenceGateway,
    max_depth: u32,
    version_policy: VersionPolicy,
}

/// Children a worker claimed, to be pushed one level deeper
struct WorkerOutcome {
    depth: u32,
    children: Vec<PublicationId>,
}

pub struct FrontierScheduler {
    options: CrawlOptions,
    context: Arc<WorkerContext>,
    cancel: CancellationToken,
    state: Mutex<RunState>,
}

impl FrontierScheduler {
    pub fn new(options: CrawlOptions, fetcher: RecordFetcher, gateway: PersistenceGateway) -> Self {
        let context = WorkerContext {
            fetcher,
            ledger: VisitLedger::new(),
            assembler: GraphAssembler::new(),
            gateway,
            max_depth: options.max_depth,
            version_policy: options.version_policy,
        };

        Self {
            options,
            context: Arc::new(context),
            cancel: CancellationToken::new(),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Use an externally owned token instead of a private one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancelling this token aborts the run after in-flight work settles
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn ledger(&self) -> &VisitLedger {
        &self.context.ledger
    }

    pub fn graph(&self) -> CitationGraph {
        self.context.assembler.snapshot()
    }

    /// Crawl from seeds produced by `source`
    pub async fn run_from_source(&self, source: &dyn SeedSource) -> Result<CrawlReport, CrawlError> {
        match source.seeds().await {
            Ok(seeds) => self.run(&seeds).await,
            Err(e) => {
                if self.begin().is_ok() {
                    self.set_state(RunState::Aborted);
                    self.close_gateway().await;
                }
                Err(CrawlError::from_seed_source(e))
            }
        }
    }

    /// Crawl from raw seed identifiers.
    ///
    /// Only an invalid seed, unusable options or a second call is fatal. Per-publication
    /// failures land in the report. The gateway is closed whatever happens.
    #[instrument(skip(self, seeds), fields(seeds = seeds.len()))]
    pub async fn run(&self, seeds: &[String]) -> Result<CrawlReport, CrawlError> {
        self.begin()?;

        let result = match self.check_options().and_then(|()| self.parse_seeds(seeds)) {
            Ok(seeds) => Ok(self.execute(seeds).await),
            Err(e) => Err(e),
        };

        self.set_state(match &result {
            Ok(report) if report.status == RunStatus::Completed => RunState::Completed,
            _ => RunState::Aborted,
        });
        self.close_gateway().await;

        result
    }

    fn begin(&self) -> Result<(), CrawlError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != RunState::Idle {
            return Err(CrawlError::AlreadyRun);
        }
        *state = RunState::Running;
        Ok(())
    }

    async fn close_gateway(&self) {
        if let Err(e) = self.context.gateway.close().await {
            warn!(error = %e, "Failed to close stores");
        }
    }

    fn check_options(&self) -> Result<(), CrawlError> {
        if self.options.concurrency == 0 {
            return Err(CrawlError::Configuration("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    fn parse_seeds(&self, seeds: &[String]) -> Result<Vec<PublicationId>, CrawlError> {
        if seeds.is_empty() {
            return Err(CrawlError::Configuration("at least one seed is required".into()));
        }

        seeds
            .iter()
            .map(|raw| {
                PublicationId::parse(raw, self.options.version_policy).map_err(|e| {
                    CrawlError::InvalidSeed {
                        seed: raw.clone(),
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    }

    async fn execute(&self, seeds: Vec<PublicationId>) -> CrawlReport {
        let started_at = Utc::now();
        let ctx = &self.context;

        let mut frontier = Frontier::new(self.options.traversal);
        for id in seeds {
            if ctx.ledger.try_claim(&id) {
                frontier.push(id, 0);
            }
        }

        info!(
            seeds = frontier.len(),
            max_nodes = self.options.max_nodes,
            max_depth = self.options.max_depth,
            concurrency = self.options.concurrency,
            traversal = ?self.options.traversal,
            "Crawl started"
        );

        // Deadline expiry cancels this child token only, so it stays distinguishable
        let run_token = self.cancel.child_token();
        let deadline = self.options.max_run.map(|d| Instant::now() + d);
        let mut deadline_hit = false;

        let budget = NodeBudget::new(self.options.max_nodes);
        let mut workers: JoinSet<WorkerOutcome> = JoinSet::new();
        // Lets a crashed task be traced back to its item
        let mut running: HashMap<Id, FrontierItem> = HashMap::new();

        let stop_reason = loop {
            while workers.len() < self.options.concurrency
                && !run_token.is_cancelled()
                && !frontier.is_empty()
                && budget.try_reserve()
            {
                // Children are only claimed below max_depth, so every item is within it
                let Some(item) = frontier.pop() else { break };

                let task = workers.spawn(process(Arc::clone(ctx), run_token.clone(), item.clone()));
                running.insert(task.id(), item);
            }
            record_frontier_size(frontier.len());

            if workers.is_empty() {
                break if deadline_hit {
                    StopReason::DeadlineExceeded
                } else if run_token.is_cancelled() {
                    StopReason::Cancelled
                } else if budget.exhausted() && !frontier.is_empty() {
                    StopReason::NodeBudgetReached
                } else {
                    StopReason::FrontierExhausted
                };
            }

            let deadline_sleep = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                joined = workers.join_next_with_id() => match joined {
                    Some(Ok((task, outcome))) => {
                        running.remove(&task);
                        frontier.extend_children(outcome.children, outcome.depth + 1);
                    }
                    Some(Err(e)) => {
                        if let Some(item) = running.remove(&e.id()) {
                            settle_crashed(ctx, &item, &e);
                        }
                    }
                    None => {}
                },
                _ = run_token.cancelled(), if !run_token.is_cancelled() => {
                    info!(in_flight = workers.len(), "Cancellation requested, draining in-flight work");
                }
                _ = deadline_sleep, if !deadline_hit => {
                    warn!(in_flight = workers.len(), "Run deadline exceeded, draining in-flight work");
                    deadline_hit = true;
                    run_token.cancel();
                }
            }
        };

        let store_failures = ctx.gateway.flush_pending().await;
        let counts = ctx.ledger.counts();
        let (node_count, edge_count, partial_failures) = ctx.assembler.read(|g| {
            let partial = g
                .nodes()
                .filter_map(|n| n.partial_failure.clone().map(|m| (n.id.clone(), m)))
                .collect();
            (g.node_count(), g.edge_count(), partial)
        });

        let report = CrawlReport {
            status: stop_reason.status(),
            stop_reason,
            started_at,
            finished_at: Utc::now(),
            processed: counts.done + counts.failed,
            failures: ctx.ledger.failures(),
            partial_failures,
            queued: ctx.ledger.queued(),
            store_failures,
            node_count,
            edge_count,
        };

        info!(
            status = ?report.status,
            stop_reason = ?report.stop_reason,
            processed = report.processed,
            failed = report.failures.len(),
            queued = report.queued.len(),
            nodes = report.node_count,
            edges = report.edge_count,
            degraded = report.is_degraded(),
            "Crawl finished"
        );

        report
    }
}

/// Record a worker that panicked or was aborted as a failed publication
fn settle_crashed(ctx: &WorkerContext, item: &FrontierItem, e: &JoinError) {
    error!(id = %item.id, depth = item.depth, error = %e, "Worker task failed");

    // The crash may have come before the worker marked the item in flight
    ctx.ledger.mark_in_flight(&item.id);
    ctx.ledger.mark_failed(
        &item.id,
        FailureReason::Internal {
            message: e.to_string(),
        },
    );
    record_processed("failed", 0);
}

/// Fetch, extract, claim, record, flush, then settle the ledger state
#[instrument(skip_all, fields(id = %item.id, depth = item.depth))]
async fn process(
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
    item: FrontierItem,
) -> WorkerOutcome {
    let FrontierItem { id, depth } = item;
    ctx.ledger.mark_in_flight(&id);

    // Leaf visits at the depth budget fetch metadata only
    let expand = depth < ctx.max_depth;

    let fetched = match ctx.fetcher.fetch(&id, expand).await {
        Ok(fetched) => fetched,
        Err(reason) => {
            warn!(reason = %reason, "Publication failed");
            ctx.ledger.mark_failed(&id, reason);
            record_processed("failed", 0);
            return WorkerOutcome {
                depth,
                children: Vec::new(),
            };
        }
    };

    let (mut references, partial_failure) = match fetched.text {
        TextOutcome::Text(text) => (extract_references(&text, ctx.version_policy), None),
        TextOutcome::Skipped => (Vec::new(), None),
        TextOutcome::Failed(reason) => (Vec::new(), Some(reason.to_string())),
    };
    references.retain(|to| *to != id);

    let children = if expand && !cancel.is_cancelled() {
        references
            .iter()
            .filter(|to| ctx.ledger.try_claim(to))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    debug!(
        references = references.len(),
        claimed = children.len(),
        "References extracted"
    );

    let node = GraphNode {
        id: id.clone(),
        record: fetched.record,
        references,
        depth,
        expanded: expand && partial_failure.is_none(),
        partial_failure,
    };
    let outcome = if node.partial_failure.is_some() { "partial" } else { "done" };
    let edges = node.references.len();

    ctx.assembler.record(node.clone());
    // A rejected write is remembered by the gateway and retried at the end
    let _ = ctx.gateway.flush(&node).await;

    ctx.ledger.mark_done(&id);
    record_processed(outcome, edges);

    WorkerOutcome { depth, children }
}
