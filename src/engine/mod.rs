//! Query engine seam
//!
//! The tree walk itself is delegated to an external engine that runs the
//! plan's fragments at every node, in parallel. This module only describes an
//! invocation; [`ProcessEngine`] runs it as a child process.

pub mod process;

pub use process::ProcessEngine;

use crate::error::EngineResult;
use crate::plan::{Fragment, QueryPlan};
use std::ffi::OsString;
use std::path::Path;

/// Everything the engine needs for one snapshot run
#[derive(Debug, Clone, Copy)]
pub struct EngineInvocation<'a> {
    /// Index to walk
    pub index: &'a Path,
    /// Output store the engine creates and merges into
    pub output: &'a Path,
    /// Worker count
    pub threads: usize,
    pub plan: &'a QueryPlan,
}

impl<'a> EngineInvocation<'a> {
    /// Engine arguments, program name excluded.
    ///
    /// `-x` selects per-node execution over the tree, `-O` names the output
    /// store, then each fragment follows its flag in execution order.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(6 + 2 * Fragment::ORDER.len());
        args.push(self.index.as_os_str().to_owned());
        args.push("-n".into());
        args.push(self.threads.to_string().into());
        args.push("-x".into());
        args.push("-O".into());
        args.push(self.output.as_os_str().to_owned());
        for (fragment, sql) in self.plan.fragments() {
            args.push(fragment.flag().into());
            args.push(sql.into());
        }
        args
    }
}

/// Something that can execute a [`QueryPlan`] over an index
pub trait QueryEngine {
    /// Run to completion and return the engine's exit code. A non-zero code
    /// is a normal return, not an error.
    fn execute(&self, invocation: &EngineInvocation<'_>) -> EngineResult<i32>;

    /// Executable the invocation is handed to
    fn program(&self) -> &Path;

    /// Full command line for display, program first
    fn command_line(&self, invocation: &EngineInvocation<'_>) -> Vec<OsString> {
        let mut cmd = vec![self.program().as_os_str().to_owned()];
        cmd.extend(invocation.args());
        cmd
    }
}
