use log::info;
use rand::Rng;

use crate::balance::LabelPools;
use crate::error::{PipelineError, Result};
use crate::models::LabeledRecord;

/// Uniform draw of `amount` items without replacement. Survivors keep their
/// input order. When `amount` covers everything the input comes back as is
/// and the generator is left untouched.
pub fn uniform_draw<T, R: Rng + ?Sized>(items: Vec<T>, amount: usize, rng: &mut R) -> Vec<T> {
    if amount >= items.len() {
        return items;
    }
    let mut keep = vec![false; items.len()];
    for index in rand::seq::index::sample(rng, items.len(), amount) {
        keep[index] = true;
    }
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, kept)| kept.then_some(item))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub records: Vec<LabeledRecord>,
    /// Rows in both pools before the cap.
    pub pooled: usize,
    pub capped: bool,
}

/// Joins minority ++ majority, caps the result at `sample_size`, and labels
/// each row. Counts are only used to describe an empty result.
pub fn reduce<R: Rng + ?Sized>(
    pools: LabelPools,
    sample_size: usize,
    rng: &mut R,
    rows_read: u64,
    rows_rejected: u64,
) -> Result<Sample> {
    if pools.is_empty() {
        return Err(PipelineError::EmptyDataset {
            rows_read,
            rows_rejected,
        });
    }

    let LabelPools {
        mut minority,
        majority,
    } = pools;
    minority.extend(majority);
    let combined = minority;
    let pooled = combined.len();
    let capped = pooled > sample_size;

    let drawn = uniform_draw(combined, sample_size, rng);
    if capped {
        info!("pooled {pooled} rows; drew {} uniformly", drawn.len());
    } else {
        info!("pooled {pooled} rows; under the cap of {sample_size}, kept all");
    }

    Ok(Sample {
        records: drawn.into_iter().map(LabeledRecord::new).collect(),
        pooled,
        capped,
    })
}
