//! Query plan assembly
//!
//! Turns a compiled [`SchemaPlan`] into the six SQL fragments the
//! tree-walking engine runs. Order matters: later fragments reference
//! tables created by earlier ones.
//!
//! ```text
//!  per worker    -I  create intermediate_treesummary, intermediate_summary
//!  per node      -T  copy the node's treesummary row(s), if any
//!                -E  aggregate vrxsummary LEFT JOIN vrxpentries
//!  output store  -K  create treesummary, summary
//!                -J  merge intermediate_* into the final tables
//!                -G  create the snapshot view
//! ```

use crate::schema::{treesummary, SchemaPlan, INODE, PINODE, VRXPENTRIES, VRXSUMMARY};

/// Final per-node statistics table
pub const SUMMARY: &str = "summary";

/// Tree-rollup table, in the index and in the snapshot
pub const TREESUMMARY: &str = "treesummary";

/// Per-worker staging table for [`SUMMARY`]
pub const INTERMEDIATE_SUMMARY: &str = "intermediate_summary";

/// Per-worker staging table for [`TREESUMMARY`]
pub const INTERMEDIATE_TREESUMMARY: &str = "intermediate_treesummary";

/// View joining [`SUMMARY`] with the renamed tree-rollup columns
pub const SNAPSHOT: &str = "snapshot";

/// One-row table describing the snapshot
pub const METADATA: &str = "metadata";

/// Role of a SQL fragment in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// Create intermediate tables
    Init,
    /// Copy the node's tree-rollup row into the intermediate table
    TreeCopy,
    /// Compute per-node statistics into the intermediate table
    NodeSelect,
    /// Create the final tables in the output store
    FinalCreate,
    /// Copy intermediate rows into the final tables
    Merge,
    /// Create the snapshot view
    View,
}

impl Fragment {
    /// Execution order
    pub const ORDER: [Fragment; 6] = [
        Fragment::Init,
        Fragment::TreeCopy,
        Fragment::NodeSelect,
        Fragment::FinalCreate,
        Fragment::Merge,
        Fragment::View,
    ];

    /// Engine flag carrying this fragment
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Init => "-I",
            Self::TreeCopy => "-T",
            Self::NodeSelect => "-E",
            Self::FinalCreate => "-K",
            Self::Merge => "-J",
            Self::View => "-G",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "schema-init",
            Self::TreeCopy => "tree-rollup-copy",
            Self::NodeSelect => "per-node-select",
            Self::FinalCreate => "final-schema-create",
            Self::Merge => "merge-copy",
            Self::View => "view-create",
        }
    }
}

/// The six fragments handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    init: String,
    tree_copy: String,
    node_select: String,
    final_create: String,
    merge: String,
    view: String,
}

impl QueryPlan {
    /// Assemble the plan. With `replace`, the final tables and the view are
    /// dropped before being recreated so a re-run against the same output
    /// does not fail on existing tables.
    pub fn assemble(schema: &SchemaPlan, replace: bool) -> Self {
        let init = format!(
            "{}; {};",
            treesummary::create_table_sql(INTERMEDIATE_TREESUMMARY),
            schema.create_table_sql(INTERMEDIATE_SUMMARY),
        );

        // The trailing SELECT gives the engine a result row so it keeps
        // descending whether or not this node carried rollup data. The index
        // root of several trees may hold one rollup row with no summary row,
        // so treesummary can end up one row longer than summary.
        let tree_copy = format!(
            "INSERT INTO {} SELECT * FROM {}; SELECT 1;",
            INTERMEDIATE_TREESUMMARY, TREESUMMARY
        );

        // The outer join keeps one row for a node with no entries. Grouping
        // by the summary row means a node without a summary row, such as the
        // common parent of several indexes, contributes nothing.
        let from = format!(
            "{s} LEFT JOIN {e} ON {s}.{INODE} == {e}.{PINODE}",
            s = VRXSUMMARY,
            e = VRXPENTRIES
        );
        let group_by = format!("{}.{}", VRXSUMMARY, INODE);
        let node_select = format!(
            "INSERT INTO {} {};",
            INTERMEDIATE_SUMMARY,
            build_query(&schema.select_list(), &from, Some(&group_by))
        );

        let mut final_create = format!(
            "{}; {};",
            treesummary::create_table_sql(TREESUMMARY),
            schema.create_table_sql(SUMMARY),
        );
        if replace {
            final_create = format!(
                "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {}; {}",
                TREESUMMARY, SUMMARY, final_create
            );
        }

        let merge = format!(
            "INSERT INTO {} SELECT * FROM {}; INSERT INTO {} SELECT * FROM {};",
            TREESUMMARY, INTERMEDIATE_TREESUMMARY, SUMMARY, INTERMEDIATE_SUMMARY
        );

        let mut view = format!(
            "CREATE VIEW {view} AS SELECT * FROM {sum} LEFT JOIN ({ts_select}) AS {alias} \
             ON {sum}.{INODE} == {alias}.{prefix}{INODE};",
            view = SNAPSHOT,
            sum = SUMMARY,
            ts_select = treesummary::renamed_select_sql(TREESUMMARY),
            alias = treesummary::VIEW_ALIAS,
            prefix = treesummary::VIEW_PREFIX,
        );
        if replace {
            view = format!("DROP VIEW IF EXISTS {}; {}", SNAPSHOT, view);
        }

        Self {
            init,
            tree_copy,
            node_select,
            final_create,
            merge,
            view,
        }
    }

    /// SQL for one fragment
    pub fn get(&self, fragment: Fragment) -> &str {
        match fragment {
            Fragment::Init => &self.init,
            Fragment::TreeCopy => &self.tree_copy,
            Fragment::NodeSelect => &self.node_select,
            Fragment::FinalCreate => &self.final_create,
            Fragment::Merge => &self.merge,
            Fragment::View => &self.view,
        }
    }

    /// Fragments in execution order
    pub fn fragments(&self) -> impl Iterator<Item = (Fragment, &str)> {
        Fragment::ORDER.into_iter().map(move |f| (f, self.get(f)))
    }
}

fn build_query(columns: &str, from: &str, group_by: Option<&str>) -> String {
    let mut sql = format!("SELECT {} FROM {}", columns, from);
    if let Some(group_by) = group_by {
        sql.push_str(" GROUP BY ");
        sql.push_str(group_by);
    }
    sql
}
