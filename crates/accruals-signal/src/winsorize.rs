//! Within-year percentile buckets and tail capping of the panel ratios.
//!
//! Each fiscal year's values of a ratio are sorted into an arena and ranked
//! by binary search. With `n` values, `below` of them strictly smaller and
//! `above` strictly larger, a value's bucket is
//!
//! ```text
//! floor(B * below / n)              if below <= above
//! B - 1 - floor(B * above / n)      otherwise
//! ```
//!
//! so tied values share a bucket and the two tails are treated
//! symmetrically. Buckets `0` and `B - 1` are the extreme tails.

use crate::panel::{PanelRow, RatioKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What to do with values in the extreme buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinsorMode {
    /// Replace tail values with the nearest value outside the tails
    #[default]
    Clamp,
    /// Rank only; leave values unchanged
    PassThrough,
}

/// Sorted values of one ratio within one year.
#[derive(Debug, Clone)]
pub struct PercentileBuckets {
    sorted: Vec<f64>,
    buckets: usize,
}

impl PercentileBuckets {
    /// Build the arena. Non-finite values are ignored.
    pub fn new(values: impl IntoIterator<Item = f64>, buckets: usize) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        Self { sorted, buckets }
    }

    /// Number of values in the arena.
    pub const fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Whether the arena is empty.
    pub const fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    fn below(&self, value: f64) -> usize {
        self.sorted.partition_point(|x| *x < value)
    }

    fn above(&self, value: f64) -> usize {
        self.sorted.len() - self.sorted.partition_point(|x| *x <= value)
    }

    fn in_bottom(&self, value: f64) -> bool {
        let below = self.below(value);
        below <= self.above(value) && self.buckets * below < self.len()
    }

    fn in_top(&self, value: f64) -> bool {
        let above = self.above(value);
        self.below(value) > above && self.buckets * above < self.len()
    }

    /// Bucket of `value`, `0..buckets`.
    pub fn bucket(&self, value: f64) -> usize {
        let n = self.len().max(1);
        let below = self.below(value);
        let above = self.above(value);
        if below <= above {
            self.buckets * below / n
        } else {
            self.buckets - 1 - self.buckets * above / n
        }
    }

    /// Smallest and largest values outside both tails.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let lo = self.sorted.partition_point(|x| self.in_bottom(*x));
        let hi = self.sorted.partition_point(|x| !self.in_top(*x));
        (lo < hi).then(|| (self.sorted[lo], self.sorted[hi - 1]))
    }

    /// Apply `mode` to one value.
    pub fn cap(&self, value: f64, mode: WinsorMode) -> f64 {
        if mode == WinsorMode::PassThrough {
            return value;
        }
        match self.bounds() {
            Some((lo, hi)) => value.clamp(lo, hi),
            None => value,
        }
    }
}

/// Counts from [`winsorize_by_year`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinsorStats {
    /// Fiscal years processed
    pub years: usize,
    /// Values found in a tail bucket, per ratio
    pub tail_values: BTreeMap<String, usize>,
    /// Values actually changed, per ratio
    pub capped_values: BTreeMap<String, usize>,
}

/// Winsorize the four ratios independently within each fiscal year.
pub fn winsorize_by_year(
    mut rows: Vec<PanelRow>,
    buckets: usize,
    mode: WinsorMode,
) -> (Vec<PanelRow>, WinsorStats) {
    let mut by_year: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_year.entry(row.fyear()).or_default().push(i);
    }

    let mut stats = WinsorStats {
        years: by_year.len(),
        ..Default::default()
    };

    for (fyear, members) in &by_year {
        for kind in RatioKind::ALL {
            let arena =
                PercentileBuckets::new(members.iter().map(|&i| rows[i].ratios.get(kind)), buckets);
            let bounds = arena.bounds();

            let mut tails = 0;
            let mut capped = 0;
            for &i in members {
                let value = rows[i].ratios.get(kind);
                let bucket = arena.bucket(value);
                if bucket != 0 && bucket != buckets - 1 {
                    continue;
                }
                tails += 1;
                if mode == WinsorMode::PassThrough {
                    continue;
                }
                if let Some((lo, hi)) = bounds {
                    let clamped = value.clamp(lo, hi);
                    if clamped != value {
                        rows[i].ratios.set(kind, clamped);
                        capped += 1;
                    }
                }
            }

            if tails > 0 {
                debug!(fyear, ratio = %kind, tails, capped, "winsorized ratio");
            }
            *stats.tail_values.entry(kind.name().to_string()).or_default() += tails;
            *stats.capped_values.entry(kind.name().to_string()).or_default() += capped;
        }
    }

    info!(
        years = stats.years,
        capped = stats.capped_values.values().sum::<usize>(),
        ?mode,
        "winsorized panel ratios"
    );
    (rows, stats)
}
