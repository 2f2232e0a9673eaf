//! Concurrent batch processing of ledger commands
//!
//! This module provides the `BatchProcessor`, which runs a batch of commands
//! against a shared `Ledger` while producing the same results as running them
//! one by one in input order.
//!
//! # Design
//!
//! A batch is split into waves:
//!
//! ```text
//! open, open, deposit, transfer, deposit, loan, repay, repay
//! └─┬─┘ └─┬─┘ └──────────┬─────────────┘ └─┬─┘ └────┬────┘
//!  ordered ordered     concurrent        ordered  concurrent
//! ```
//!
//! Commands that create rows run alone, in input order, so store ids are
//! assigned deterministically. A concurrent wave is further partitioned into
//! groups of commands whose row-lock sets overlap (transitively); each group
//! runs sequentially on a blocking task and groups run in parallel. Commands
//! in different groups touch disjoint rows, so their interleaving cannot
//! change any result.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::error;

use super::ledger::{CommandOutcome, Ledger, LedgerCommand};
use super::traits::LockKey;
use crate::types::LedgerError;

/// Result of processing a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was processed
    pub command: LedgerCommand,

    /// The result of processing (success or error)
    pub result: Result<CommandOutcome, LedgerError>,
}

/// A slice of a batch that runs as one unit
#[derive(Debug, Clone, PartialEq)]
pub enum Wave {
    /// A row-creating command that must run on its own
    Ordered(LedgerCommand),
    /// Consecutive commands over existing rows
    Concurrent(Vec<LedgerCommand>),
}

/// Commands tagged with their position in the batch
type Indexed = Vec<(usize, LedgerCommand)>;

/// Batch processor with lock-set partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    ledger: Arc<Ledger>,
    max_concurrent: usize,
}

impl BatchProcessor {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `ledger` - Shared ledger the commands run against
    /// * `max_concurrent` - Upper bound on groups running at once (min 1)
    pub fn new(ledger: Arc<Ledger>, max_concurrent: usize) -> Self {
        Self {
            ledger,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Split a batch into ordered and concurrent waves, preserving input order
    pub fn split_into_waves(&self, batch: Vec<LedgerCommand>) -> Vec<Wave> {
        let mut waves = Vec::new();
        let mut pending: Vec<LedgerCommand> = Vec::new();

        for command in batch {
            if command.creates_rows() {
                if !pending.is_empty() {
                    waves.push(Wave::Concurrent(std::mem::take(&mut pending)));
                }
                waves.push(Wave::Ordered(command));
            } else {
                pending.push(command);
            }
        }
        if !pending.is_empty() {
            waves.push(Wave::Concurrent(pending));
        }

        waves
    }

    /// Partition commands into groups with pairwise disjoint lock sets
    ///
    /// # Guarantees
    ///
    /// - Each command appears in exactly one group
    /// - Commands within a group keep their original relative order
    /// - Two commands sharing a lock key (directly or through a chain of
    ///   other commands) land in the same group
    pub fn partition_by_rows(&self, commands: Vec<LedgerCommand>) -> Vec<Vec<LedgerCommand>> {
        let mut groups: Vec<Option<(Indexed, Vec<LockKey>)>> = Vec::new();
        let mut owner: HashMap<LockKey, usize> = HashMap::new();

        for (index, command) in commands.into_iter().enumerate() {
            let keys = command.lock_keys();

            let mut touched: Vec<usize> =
                keys.iter().filter_map(|k| owner.get(k).copied()).collect();
            touched.sort_unstable();
            touched.dedup();

            let target = match touched.first() {
                Some(&first) => first,
                None => {
                    groups.push(Some((Vec::new(), Vec::new())));
                    groups.len() - 1
                }
            };

            // Fold every other touched group into the target
            for &other in touched.iter().skip(1) {
                if let Some((other_commands, other_keys)) = groups[other].take() {
                    for key in &other_keys {
                        owner.insert(*key, target);
                    }
                    if let Some((commands, group_keys)) = groups[target].as_mut() {
                        commands.extend(other_commands);
                        group_keys.extend(other_keys);
                    }
                }
            }

            if let Some((commands, group_keys)) = groups[target].as_mut() {
                commands.push((index, command));
                for key in keys {
                    if owner.insert(key, target).is_none() {
                        group_keys.push(key);
                    }
                }
            }
        }

        groups
            .into_iter()
            .flatten()
            .map(|(mut commands, _)| {
                commands.sort_by_key(|(index, _)| *index);
                commands.into_iter().map(|(_, command)| command).collect()
            })
            .collect()
    }

    /// Run a group of commands sequentially on a blocking task
    ///
    /// If the task dies, every command of the group is reported as a store
    /// failure. Scopes left open by the panic were rolled back.
    pub async fn process_group(&self, group: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let ledger = Arc::clone(&self.ledger);
        let submitted = group.clone();

        let task = tokio::task::spawn_blocking(move || {
            group
                .into_iter()
                .map(|command| {
                    let result = ledger.execute(command.clone());
                    ProcessingResult { command, result }
                })
                .collect::<Vec<_>>()
        });

        match task.await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, commands = submitted.len(), "command task panicked");
                abandoned(submitted, &e.to_string())
            }
        }
    }

    /// Process a batch of commands
    ///
    /// # Returns
    ///
    /// One `ProcessingResult` per command. Ordered waves are reported in input
    /// order; results of a concurrent wave are grouped by partition.
    ///
    /// # Guarantees
    ///
    /// - Row-creating commands run one at a time, in input order
    /// - Commands over shared rows run in input order
    /// - Every command gets a result, even if some fail
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let mut results = Vec::new();

        for wave in self.split_into_waves(batch) {
            match wave {
                Wave::Ordered(command) => {
                    results.extend(self.process_group(vec![command]).await);
                }
                Wave::Concurrent(commands) => {
                    let groups = self.partition_by_rows(commands);
                    let wave_results: Vec<Vec<ProcessingResult>> = stream::iter(groups)
                        .map(|group| self.process_group(group))
                        .buffered(self.max_concurrent)
                        .collect()
                        .await;
                    results.extend(wave_results.into_iter().flatten());
                }
            }
        }

        results
    }
}

/// Results for a group whose task died before reporting
fn abandoned(group: Vec<LedgerCommand>, reason: &str) -> Vec<ProcessingResult> {
    group
        .into_iter()
        .map(|command| ProcessingResult {
            command,
            result: Err(LedgerError::store_failure(format!(
                "command task failed: {}",
                reason
            ))),
        })
        .collect()
}
