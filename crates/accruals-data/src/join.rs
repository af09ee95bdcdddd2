//! Left join of accounting records onto the master security table.

use crate::{
    month::MonthId,
    record::{AccountingRecord, JoinedRecord, MasterRecord, Permno},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{info, warn};

/// Row counts from [`join_master`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    /// Accounting rows offered to the join
    pub input_rows: usize,
    /// Rows without a permno
    pub missing_permno: usize,
    /// Rows with no master row for (permno, time_avail_m)
    pub unmatched: usize,
    /// Rows whose master row has no exchange code
    pub missing_exchcd: usize,
    /// Master rows ignored because their key was already seen
    pub duplicate_master_keys: usize,
    /// Rows kept
    pub joined: usize,
}

/// Join accounting records to the master table on (permno, time_avail_m).
///
/// Only rows whose master match carries an exchange code survive. Unmatched
/// rows are a filter, not an error. When the master table repeats a key the
/// first occurrence is used.
pub fn join_master(
    accounting: Vec<AccountingRecord>,
    master: &[MasterRecord],
) -> (Vec<JoinedRecord>, JoinStats) {
    let mut stats = JoinStats {
        input_rows: accounting.len(),
        ..Default::default()
    };

    let mut lookup: HashMap<(Permno, MonthId), Option<i32>> = HashMap::with_capacity(master.len());
    for row in master {
        match lookup.entry((row.permno, row.time_avail_m)) {
            Entry::Occupied(_) => stats.duplicate_master_keys += 1,
            Entry::Vacant(slot) => {
                slot.insert(row.exchcd);
            }
        }
    }
    if stats.duplicate_master_keys > 0 {
        warn!(
            duplicates = stats.duplicate_master_keys,
            "master table repeats (permno, time_avail_m) keys; first occurrence used"
        );
    }

    let mut joined = Vec::with_capacity(accounting.len());
    for record in accounting {
        let Some(permno) = record.permno else {
            stats.missing_permno += 1;
            continue;
        };
        match lookup.get(&(permno, record.time_avail_m)) {
            None => stats.unmatched += 1,
            Some(None) => stats.missing_exchcd += 1,
            Some(&Some(exchcd)) => joined.push(JoinedRecord {
                accounting: record,
                permno,
                exchcd,
            }),
        }
    }
    stats.joined = joined.len();

    info!(
        input = stats.input_rows,
        joined = stats.joined,
        unmatched = stats.unmatched,
        missing_permno = stats.missing_permno,
        missing_exchcd = stats.missing_exchcd,
        "joined accounting records to master table"
    );
    (joined, stats)
}
