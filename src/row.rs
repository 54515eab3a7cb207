use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::sqlite::Value;
use crate::types::FetchStyle;

/// One fetched row, shaped by the [`FetchStyle`] it was fetched with.
///
/// Associative rows keep column order; when a result has duplicate
/// column names the last one wins, as it does in the engine's own
/// associative fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Row {
    Numeric(Vec<Value>),
    Associative(IndexMap<String, Value>),
    Both {
        columns: Arc<[String]>,
        values: Vec<Value>,
    },
}

impl Row {
    pub(crate) fn build(style: FetchStyle, columns: &Arc<[String]>, values: Vec<Value>) -> Self {
        match style {
            FetchStyle::Numeric => Row::Numeric(values),
            FetchStyle::Associative => {
                Row::Associative(columns.iter().cloned().zip(values).collect())
            }
            FetchStyle::Both => Row::Both {
                columns: Arc::clone(columns),
                values,
            },
        }
    }

    pub fn style(&self) -> FetchStyle {
        match self {
            Row::Numeric(_) => FetchStyle::Numeric,
            Row::Associative(_) => FetchStyle::Associative,
            Row::Both { .. } => FetchStyle::Both,
        }
    }

    /// Value at a 0-based column position. Associative rows have none.
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Row::Numeric(values) | Row::Both { values, .. } => values.get(index),
            Row::Associative(_) => None,
        }
    }

    /// Value of the named column. Numeric rows have none.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Numeric(_) => None,
            Row::Associative(map) => map.get(name),
            Row::Both { columns, values } => columns
                .iter()
                .rposition(|c| c == name)
                .and_then(|i| values.get(i)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Numeric(values) | Row::Both { values, .. } => values.len(),
            Row::Associative(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in column order, dropping any names.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Row::Numeric(values) | Row::Both { values, .. } => values,
            Row::Associative(map) => map.into_values().collect(),
        }
    }
}
