use serde::Serialize;
use std::time::Duration;

use crate::{Error, Result};

/// One cadence bucket and the range of monitor intervals it owns.
///
/// A monitor runs in the smallest bucket whose period is at least its own
/// interval. Bucket `B` therefore owns intervals in `(previous, B]`, and the
/// largest bucket also takes every interval above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub period_secs: i64,
    pub lower_exclusive: i64,
    pub upper_inclusive: Option<i64>,
}

impl Bucket {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs as u64)
    }

    pub fn contains(&self, interval: i32) -> bool {
        let interval = interval as i64;
        interval > self.lower_exclusive
            && self.upper_inclusive.is_none_or(|upper| interval <= upper)
    }
}

#[derive(Debug, Clone)]
pub struct CadenceBuckets {
    buckets: Vec<Bucket>,
}

impl CadenceBuckets {
    pub fn new(periods: &[i64]) -> Result<Self> {
        let mut periods = periods.to_vec();
        periods.sort_unstable();
        periods.dedup();

        if periods.is_empty() {
            return Err(Error::validation("at least one cadence bucket is required"));
        }
        if let Some(bad) = periods.iter().find(|p| **p <= 0) {
            return Err(Error::validation(format!("bucket period must be positive, got {bad}")));
        }
        if let Some(bad) = periods.iter().find(|p| **p > i64::from(i32::MAX)) {
            return Err(Error::validation(format!(
                "bucket period {bad}s exceeds the longest monitor interval"
            )));
        }

        let last = periods.len() - 1;
        let buckets = periods
            .iter()
            .enumerate()
            .map(|(i, &period)| Bucket {
                period_secs: period,
                lower_exclusive: if i == 0 { 0 } else { periods[i - 1] },
                upper_inclusive: if i == last { None } else { Some(period) },
            })
            .collect();

        Ok(Self { buckets })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns `None` only for non-positive intervals, which CRUD rejects.
    pub fn bucket_for(&self, interval: i32) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.contains(interval))
    }
}
