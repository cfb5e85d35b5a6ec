//! Schema compiler
//!
//! Flattens [`SUMMARY_FIELDS`] and the family descriptor tables into a
//! single ordered list of columns. Each [`PlannedColumn`] carries its name,
//! storage type and expression together, so the `CREATE TABLE` column list
//! and the `SELECT` expression list are two views of one vector and always
//! line up positionally.

use super::stats::{Family, StatParams, SUMMARY_FIELDS};
use super::{Source, StorageType, Template};
use crate::error::SchemaError;
use std::collections::HashSet;

/// One compiled column of the per-node summary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    /// Bare summary field name, or `{family}_{statistic}`
    pub name: String,
    pub storage: StorageType,
    pub template: Template,
    pub source: Source,
}

impl PlannedColumn {
    /// `name TYPE` for a column list
    pub fn definition(&self) -> String {
        format!("{} {}", self.name, self.storage)
    }

    /// Value expression bound to the concrete index table
    pub fn select_expr(&self) -> String {
        self.template.render(self.source.alias())
    }
}

/// Ordered column plan shared by the intermediate and final summary tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    columns: Vec<PlannedColumn>,
}

impl SchemaPlan {
    /// Compile the full fixed descriptor set
    pub fn compile(params: &StatParams) -> Result<Self, SchemaError> {
        Self::compile_families(&Family::ALL, params)
    }

    /// Compile the summary fields followed by the given families
    pub fn compile_families(families: &[Family], params: &StatParams) -> Result<Self, SchemaError> {
        let mut columns = Vec::with_capacity(SUMMARY_FIELDS.len() + families.len() * 8);

        for f in SUMMARY_FIELDS {
            columns.push(PlannedColumn {
                name: f.name.to_string(),
                storage: f.storage,
                template: f.template.clone(),
                source: Source::Summary,
            });
        }

        for family in families {
            for stat in family.statistics(params) {
                columns.push(PlannedColumn {
                    name: format!("{}_{}", family.name(), stat.name),
                    storage: stat.storage,
                    template: stat.template,
                    source: Source::Entries,
                });
            }
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[PlannedColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// `name TYPE` pairs in table order
    pub fn column_definitions(&self) -> Vec<String> {
        self.columns.iter().map(PlannedColumn::definition).collect()
    }

    /// Select expressions in table order
    pub fn select_expressions(&self) -> Vec<String> {
        self.columns.iter().map(PlannedColumn::select_expr).collect()
    }

    /// `CREATE TABLE {table}(...)` using this plan's columns
    pub fn create_table_sql(&self, table: &str) -> String {
        format!("CREATE TABLE {}({})", table, self.column_definitions().join(", "))
    }

    /// Comma-separated select list
    pub fn select_list(&self) -> String {
        self.select_expressions().join(", ")
    }
}
