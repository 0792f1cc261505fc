// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Table topology: how many tables exist, and for each table how many rows and
//! how many columns per row.
//!
//! Built once and immutable; validation fails fast and reports every offending
//! `(table, row)` coordinate rather than the first one found. The wire encoding
//! joins tables with `|` and each table's per-row column counts with `:`
//! (e.g. `"3:4|5"` is two tables, the first with rows of 3 and 4 columns).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

/// Validated, immutable description of the parameter tables.
///
/// Element `(i, j)` of the backing matrix is the column count of row `j` of
/// table `i`; the row count of table `i` is the length of inner vector `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTopology {
    columns: Vec<Vec<u32>>,
}

impl TableTopology {
    /// Build a topology, rejecting empty table lists, zero-row tables and
    /// zero-column rows. All violations are enumerated in the error.
    pub fn new(columns: Vec<Vec<u32>>) -> Result<Self, CoordinationError> {
        let mut violations = Vec::new();

        if columns.is_empty() {
            violations.push("table list is empty".to_string());
        }

        let empty_tables: Vec<String> = columns
            .iter()
            .enumerate()
            .filter(|(_, rows)| rows.is_empty())
            .map(|(i, _)| i.to_string())
            .collect();
        if !empty_tables.is_empty() {
            violations.push(format!("tables with zero rows: {}", empty_tables.join(",")));
        }

        let empty_rows: Vec<String> = columns
            .iter()
            .enumerate()
            .flat_map(|(i, rows)| {
                rows.iter()
                    .enumerate()
                    .filter(|(_, cols)| **cols == 0)
                    .map(move |(j, _)| format!("({i},{j})"))
            })
            .collect();
        if !empty_rows.is_empty() {
            violations.push(format!("rows with zero columns: {}", empty_rows.join(", ")));
        }

        if !violations.is_empty() {
            return Err(CoordinationError::Configuration { violations });
        }
        Ok(Self { columns })
    }

    pub fn table_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self, table: usize) -> Option<usize> {
        self.columns.get(table).map(Vec::len)
    }

    /// Column count of a single row, or `None` if the coordinate is out of range.
    pub fn row_width(&self, table: usize, row: usize) -> Option<usize> {
        self.columns
            .get(table)
            .and_then(|rows| rows.get(row))
            .map(|cols| *cols as usize)
    }

    /// Sum of column counts over every row of the table; the buffer length for
    /// a whole-table read.
    pub fn table_width(&self, table: usize) -> Option<usize> {
        self.columns
            .get(table)
            .map(|rows| rows.iter().map(|cols| *cols as usize).sum())
    }

    /// Total number of parameters across all tables; used for resource sizing.
    pub fn total_parameter_count(&self) -> u64 {
        self.columns
            .iter()
            .flat_map(|rows| rows.iter())
            .map(|cols| u64::from(*cols))
            .sum()
    }
}

impl fmt::Display for TableTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables: Vec<String> = self
            .columns
            .iter()
            .map(|rows| {
                rows.iter()
                    .map(|cols| cols.to_string())
                    .collect::<Vec<_>>()
                    .join(":")
            })
            .collect();
        write!(f, "{}", tables.join("|"))
    }
}

impl FromStr for TableTopology {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut columns = Vec::new();
        for (i, table) in s.split('|').enumerate() {
            let mut rows = Vec::new();
            for (j, cols) in table.split(':').enumerate() {
                let cols: u32 = cols.parse().map_err(|_| {
                    CoordinationError::invalid_argument(format!(
                        "malformed column count {cols:?} at table {i}, row {j}"
                    ))
                })?;
                rows.push(cols);
            }
            columns.push(rows);
        }
        Self::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_table_list() {
        let err = TableTopology::new(vec![]).unwrap_err();
        assert!(matches!(err, CoordinationError::Configuration { .. }));
        assert!(err.to_string().contains("table list is empty"));
    }

    #[test]
    fn rejects_zero_row_table() {
        let err = TableTopology::new(vec![vec![]]).unwrap_err();
        assert!(err.to_string().contains("tables with zero rows: 0"));
    }

    #[test]
    fn rejects_zero_column_row_naming_the_coordinate() {
        let err = TableTopology::new(vec![vec![3, 0]]).unwrap_err();
        assert!(err.to_string().contains("rows with zero columns: (0,1)"));
    }

    #[test]
    fn enumerates_all_violations_at_once() {
        let err = TableTopology::new(vec![vec![], vec![0, 2, 0]]).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("tables with zero rows: 0"));
        assert!(rendered.contains("(1,0)"));
        assert!(rendered.contains("(1,2)"));
    }

    #[test]
    fn counts_parameters() {
        let topo = TableTopology::new(vec![vec![3, 4]]).unwrap();
        assert_eq!(topo.total_parameter_count(), 7);
        assert_eq!(topo.table_width(0), Some(7));
        assert_eq!(topo.row_width(0, 1), Some(4));
        assert_eq!(topo.row_count(0), Some(2));
        assert_eq!(topo.table_width(1), None);
    }

    #[test]
    fn wire_round_trip_is_exact() {
        let topo = TableTopology::new(vec![vec![3, 4], vec![5]]).unwrap();
        let encoded = topo.to_string();
        assert_eq!(encoded, "3:4|5");
        let decoded: TableTopology = encoded.parse().unwrap();
        assert_eq!(decoded, topo);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "3:x|5".parse::<TableTopology>().unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidArgument(_)));
    }
}
