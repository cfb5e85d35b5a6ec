//! Snapshot orchestration
//!
//! Compile the schema, assemble the plan, hand it to the engine, and write
//! the metadata row once the engine has succeeded.

use crate::config::SnapshotConfig;
use crate::db::{self, SnapshotMetadata};
use crate::engine::{EngineInvocation, QueryEngine};
use crate::error::Result;
use crate::plan::QueryPlan;
use crate::report;
use crate::schema::SchemaPlan;
use humansize::{format_size, BINARY};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a snapshot run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Engine succeeded and the metadata row was written
    Completed {
        /// Columns in the summary table
        columns: usize,
        duration: Duration,
    },
    /// Engine exited non-zero; the store was left as the engine left it
    EngineFailed { code: i32 },
}

impl SnapshotOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::EngineFailed { code } => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// One snapshot run
pub struct Snapshot {
    config: SnapshotConfig,
}

impl Snapshot {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Compile the schema and assemble the engine plan
    pub fn build_plan(&self) -> Result<(SchemaPlan, QueryPlan)> {
        let params = self.config.stat_params()?;
        debug!(
            reftime = params.reftime,
            size_buckets = params.size_buckets,
            name_len_buckets = params.name_len_buckets,
            "Statistic parameters"
        );

        let schema = SchemaPlan::compile(&params)?;
        let plan = QueryPlan::assemble(&schema, self.config.replace);
        Ok((schema, plan))
    }

    /// Run the snapshot with `engine`.
    ///
    /// A non-zero engine exit is returned as [`SnapshotOutcome::EngineFailed`]
    /// and nothing is written to the store afterwards.
    pub fn run(&self, engine: &dyn QueryEngine) -> Result<SnapshotOutcome> {
        let start = Instant::now();
        let (schema, plan) = self.build_plan()?;
        for (fragment, sql) in plan.fragments() {
            debug!(
                flag = fragment.flag(),
                fragment = fragment.label(),
                bytes = sql.len(),
                "Assembled fragment"
            );
        }

        let invocation = EngineInvocation {
            index: &self.config.index,
            output: &self.config.output_path,
            threads: self.config.threads,
            plan: &plan,
        };

        if self.config.verbose {
            report::print_command(&engine.command_line(&invocation));
        }

        info!(
            index = %self.config.index.display(),
            output = %self.config.output_path.display(),
            threads = self.config.threads,
            columns = schema.len(),
            "Starting snapshot"
        );

        let code = engine.execute(&invocation)?;
        if code != 0 {
            warn!(code, "Query engine failed, store not finalized");
            return Ok(SnapshotOutcome::EngineFailed { code });
        }

        let metadata = SnapshotMetadata {
            timestamp: self.config.timestamp,
            src: source_label(&self.config.index),
            notes: self.config.notes.clone(),
        };
        db::finalize(&self.config.output_path, &metadata, self.config.replace)?;

        let duration = start.elapsed();
        if let Ok(m) = std::fs::metadata(&self.config.output_path) {
            info!(
                size = %format_size(m.len(), BINARY),
                elapsed_ms = duration.as_millis() as u64,
                "Snapshot complete"
            );
        }

        Ok(SnapshotOutcome::Completed {
            columns: schema.len(),
            duration,
        })
    }
}

/// Index path as stored in the metadata row. The column is TEXT, so a
/// path that is not valid UTF-8 is stored lossily.
fn source_label(index: &Path) -> String {
    match index.to_str() {
        Some(src) => src.to_owned(),
        None => {
            let lossy = index.to_string_lossy().into_owned();
            warn!(
                index = %index.display(),
                stored = %lossy,
                "Index path is not valid UTF-8, metadata src is lossy"
            );
            lossy
        }
    }
}
