//! Duplicate Marker
//!
//! Rows with the same entity and identical duplicate fields describe the
//! same state. The lowest-id row of each such partition stays canonical,
//! and becomes an addition if any row of its partition was one. All other
//! rows are flagged `is_duplicate` and skipped downstream.

use crate::models::LogRow;
use gcd_common::Result;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    pub partitions: usize,
    pub duplicates: usize,
}

pub fn mark_duplicates(rows: &mut [LogRow]) -> Result<DuplicateReport> {
    let mut partitions: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        partitions.entry(row.fingerprint()?).or_default().push(index);
    }

    let mut report = DuplicateReport {
        partitions: partitions.len(),
        duplicates: 0,
    };

    for members in partitions.values() {
        let Some(&canonical) = members.iter().min_by_key(|&&i| rows[i].id) else {
            continue;
        };
        let any_addition = members.iter().any(|&i| rows[i].is_addition);

        for &i in members {
            if i == canonical {
                rows[i].is_duplicate = false;
                rows[i].is_addition |= any_addition;
            } else {
                rows[i].is_duplicate = true;
                report.duplicates += 1;
            }
        }
    }

    info!(
        "Marked {} duplicate rows across {} distinct states",
        report.duplicates, report.partitions
    );
    Ok(report)
}
