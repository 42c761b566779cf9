use log::debug;
use rand::Rng;

use crate::models::AttendanceRecord;
use crate::reduce::uniform_draw;

/// What one batch added to each pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchContribution {
    pub minority: usize,
    pub majority: usize,
    /// Majority rows the batch offered before subsampling.
    pub majority_available: usize,
}

/// Streaming class balancer.
///
/// Every minority row is kept. Each batch may add at most
/// `majority_ratio` majority rows per minority row it carried itself, so a
/// batch without minority rows adds nothing. The running totals play no part
/// in the per-batch cap.
#[derive(Debug)]
pub struct ClassBalancer {
    majority_ratio: usize,
    minority: Vec<AttendanceRecord>,
    majority: Vec<AttendanceRecord>,
    batches: usize,
}

/// The two frozen pools after the stream is exhausted.
#[derive(Debug, Clone, Default)]
pub struct LabelPools {
    pub minority: Vec<AttendanceRecord>,
    pub majority: Vec<AttendanceRecord>,
}

impl LabelPools {
    pub fn len(&self) -> usize {
        self.minority.len() + self.majority.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClassBalancer {
    pub fn new(majority_ratio: usize) -> Self {
        Self {
            majority_ratio,
            minority: Vec::new(),
            majority: Vec::new(),
            batches: 0,
        }
    }

    pub fn minority_len(&self) -> usize {
        self.minority.len()
    }

    pub fn majority_len(&self) -> usize {
        self.majority.len()
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Partitions a validated batch by label and appends to the pools.
    pub fn absorb<R: Rng + ?Sized>(
        &mut self,
        records: Vec<AttendanceRecord>,
        rng: &mut R,
    ) -> BatchContribution {
        let (absent, present): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|record| record.status.is_minority());

        let majority_available = present.len();
        let quota = absent
            .len()
            .saturating_mul(self.majority_ratio)
            .min(majority_available);
        let kept = if quota == 0 {
            Vec::new()
        } else {
            uniform_draw(present, quota, rng)
        };

        let contribution = BatchContribution {
            minority: absent.len(),
            majority: kept.len(),
            majority_available,
        };
        self.minority.extend(absent);
        self.majority.extend(kept);
        self.batches += 1;

        debug!(
            "batch {}: +{} minority, +{}/{} majority (pools {}/{})",
            self.batches,
            contribution.minority,
            contribution.majority,
            contribution.majority_available,
            self.minority.len(),
            self.majority.len()
        );
        contribution
    }

    pub fn finish(self) -> LabelPools {
        LabelPools {
            minority: self.minority,
            majority: self.majority,
        }
    }
}
