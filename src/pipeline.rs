use std::path::{Path, PathBuf};
use std::sync::mpsc;

use log::{debug, info};
use rand::{prelude::StdRng, SeedableRng as _};
use serde::Serialize;
use uuid::Uuid;

use crate::archive::AttendanceArchive;
use crate::balance::ClassBalancer;
use crate::config::SamplingConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::features::derive_features;
use crate::models::FeatureRecord;
use crate::reduce::reduce;
use crate::stream::ChunkedRows;
use crate::validate::{validate_batch, RejectCounts, ValidatedBatch};

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub archive: PathBuf,
    pub member: String,
    /// Data rows found by the optional pre-pass.
    pub counted_rows: Option<u64>,
    pub batches: usize,
    pub rows_read: u64,
    pub rejected: RejectCounts,
    pub minority_pool: usize,
    pub majority_pool: usize,
    pub sample_rows: usize,
    pub capped: bool,
    pub config: SamplingConfig,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub features: Vec<FeatureRecord>,
    pub stats: RunStats,
}

/// Single owner of the pools and the generator for one run.
struct Accumulation {
    balancer: ClassBalancer,
    rng: StdRng,
    rows_read: u64,
    rejected: RejectCounts,
    expected_rows: Option<u64>,
}

impl Accumulation {
    fn new(config: &SamplingConfig, expected_rows: Option<u64>) -> Self {
        Self {
            balancer: ClassBalancer::new(config.majority_ratio),
            rng: StdRng::seed_from_u64(config.random_seed),
            rows_read: 0,
            rejected: RejectCounts::default(),
            expected_rows,
        }
    }

    fn accept(&mut self, batch: ValidatedBatch) {
        self.rows_read += batch.rows_read as u64;
        self.rejected.absorb(&batch.rejected);
        self.balancer.absorb(batch.records, &mut self.rng);

        match self.expected_rows {
            Some(total) => info!(
                "batch {}: {}/{total} rows read, pools {}/{}",
                batch.index,
                self.rows_read,
                self.balancer.minority_len(),
                self.balancer.majority_len()
            ),
            None => debug!("batch {}: {} rows read", batch.index, self.rows_read),
        }
    }
}

/// Runs archive → batches → validation → balancing → reduction → features.
pub fn run(archive_path: &Path, config: &SamplingConfig) -> Result<PipelineOutput> {
    config.validate()?;

    let mut archive = AttendanceArchive::open(archive_path, &config.member_extension)?;
    let counted_rows = if config.count_rows {
        let rows = archive.count_rows()?;
        info!("{} holds {rows} data rows", archive.member_name());
        Some(rows)
    } else {
        None
    };

    let mut acc = Accumulation::new(config, counted_rows);
    if config.prefetch_batches == 0 {
        decode_batches(&mut archive, config, |batch| {
            acc.accept(batch);
            true
        })?;
    } else {
        decode_prefetched(&mut archive, config, |batch| acc.accept(batch))?;
    }
    let member = archive.member_name().to_string();
    drop(archive);

    let Accumulation {
        balancer,
        mut rng,
        rows_read,
        rejected,
        ..
    } = acc;
    let batches = balancer.batches();
    let pools = balancer.finish();
    let minority_pool = pools.minority.len();
    let majority_pool = pools.majority.len();
    info!(
        "streamed {rows_read} rows in {batches} batches; rejected {}; pools {minority_pool} minority / {majority_pool} majority",
        rejected.total()
    );

    let sample = reduce(pools, config.sample_size, &mut rng, rows_read, rejected.total())?;
    let features = derive_features(&sample.records);
    debug!(
        "derived {} feature rows from {} pooled rows",
        features.len(),
        sample.pooled
    );

    let stats = RunStats {
        run_id: Uuid::new_v4(),
        archive: archive_path.to_path_buf(),
        member,
        counted_rows,
        batches,
        rows_read,
        rejected,
        minority_pool,
        majority_pool,
        sample_rows: features.len(),
        capped: sample.capped,
        config: config.clone(),
    };
    Ok(PipelineOutput { features, stats })
}

/// Decodes and validates every batch of the member, handing each to `sink`
/// until it returns `false`.
fn decode_batches(
    archive: &mut AttendanceArchive,
    config: &SamplingConfig,
    mut sink: impl FnMut(ValidatedBatch) -> bool,
) -> Result<()> {
    let member = archive.member_name().to_string();
    let source = archive.member()?;
    let batches = ChunkedRows::new(source, &config.columns, &member, config.chunk_size)?;
    for batch in batches {
        if !sink(validate_batch(batch?, config.day_first)) {
            break;
        }
    }
    Ok(())
}

/// Decode and validation run on a worker thread that stays at most
/// `prefetch_batches` batches ahead. `sink` runs on the calling thread in
/// stream order, so results match the synchronous path.
fn decode_prefetched(
    archive: &mut AttendanceArchive,
    config: &SamplingConfig,
    mut sink: impl FnMut(ValidatedBatch),
) -> Result<()> {
    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::sync_channel::<Result<ValidatedBatch>>(config.prefetch_batches);
        let producer = scope.spawn(move || {
            let outcome = decode_batches(archive, config, |batch| tx.send(Ok(batch)).is_ok());
            if let Err(err) = outcome {
                let _ = tx.send(Err(err));
            }
        });

        let mut failure = None;
        for message in rx.iter() {
            match message {
                Ok(batch) => sink(batch),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        drop(rx);

        producer.join().map_err(|_| {
            PipelineError::io(
                Stage::Prefetch,
                std::io::Error::other("decode worker panicked"),
            )
        })?;
        failure.map_or(Ok(()), Err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use crate::test_support::{
        attendance_archive, attendance_csv, corrupted_archive, mixed_archive, status_archive,
        write_archive, ATTENDANCE_HEADER,
    };

    fn config() -> SamplingConfig {
        SamplingConfig {
            sample_size: 1_000_000,
            ..SamplingConfig::default()
        }
    }

    #[test]
    fn single_chunk_ten_absent_thousand_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = attendance_archive(dir.path(), 10, 1000);

        let output = run(&path, &config()).unwrap();
        assert_eq!(output.stats.minority_pool, 10);
        assert_eq!(output.stats.majority_pool, 50);
        assert_eq!(output.features.len(), 60);
        assert_eq!(output.stats.batches, 1);
        assert!(!output.stats.capped);

        let absent: Vec<_> = output.features.iter().filter(|f| f.is_absent == 1).collect();
        assert_eq!(absent.len(), 10);
        assert!(absent.iter().all(|f| f.status == AttendanceStatus::Absent));
        assert!(output
            .features
            .iter()
            .filter(|f| f.is_absent == 0)
            .all(|f| f.status == AttendanceStatus::Present));
    }

    #[test]
    fn empty_member_fails_with_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let header_only = format!("{ATTENDANCE_HEADER}\n");
        let path = write_archive(dir.path(), &[("attendance.csv", header_only.as_str())]);

        let err = run(&path, &config()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyDataset { rows_read: 0, .. }
        ));
    }

    #[test]
    fn all_rows_rejected_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{ATTENDANCE_HEADER}\n\
             Lagos,Ikeja,Male,JSS1,someday,Absent\n\
             Lagos,Ikeja,Male,JSS1,2023-10-02,Late\n"
        );
        let path = write_archive(dir.path(), &[("attendance.csv", body.as_str())]);

        match run(&path, &config()).unwrap_err() {
            PipelineError::EmptyDataset {
                rows_read,
                rows_rejected,
            } => {
                assert_eq!(rows_read, 2);
                assert_eq!(rows_rejected, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_date_row_is_excluded_from_both_pools() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = attendance_csv(3, 6);
        body.push_str("Lagos,Ikeja,Female,JSS2,31/31/2023,Absent\n");
        let path = write_archive(dir.path(), &[("attendance.csv", body.as_str())]);

        let output = run(&path, &config()).unwrap();
        assert_eq!(output.stats.rows_read, 10);
        assert_eq!(output.stats.rejected.unparseable_date, 1);
        assert_eq!(output.stats.minority_pool, 3);
        assert_eq!(output.stats.majority_pool, 6);
        assert_eq!(output.features.len(), 9);
    }

    #[test]
    fn small_input_round_trips_every_surviving_row() {
        let dir = tempfile::tempdir().unwrap();
        // Ratio 5 with 20 absent rows admits all 60 present rows.
        let path = attendance_archive(dir.path(), 20, 60);
        let config = SamplingConfig {
            chunk_size: 1_000,
            ..config()
        };

        let output = run(&path, &config).unwrap();
        assert_eq!(output.features.len(), 80);
        let lgas: std::collections::HashSet<_> =
            output.features.iter().map(|f| f.lga.clone()).collect();
        assert_eq!(lgas.len(), 80);
    }

    #[test]
    fn sample_is_capped_at_sample_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = attendance_archive(dir.path(), 40, 400);
        let config = SamplingConfig {
            sample_size: 100,
            ..SamplingConfig::default()
        };

        let output = run(&path, &config).unwrap();
        assert_eq!(output.features.len(), 100);
        assert!(output.stats.capped);
        assert_eq!(output.stats.minority_pool + output.stats.majority_pool, 240);
    }

    #[test]
    fn same_seed_same_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = mixed_archive(dir.path(), 930, 11);
        let config = SamplingConfig {
            chunk_size: 97,
            sample_size: 120,
            ..SamplingConfig::default()
        };

        let first = run(&path, &config).unwrap();
        let second = run(&path, &config).unwrap();
        assert!(first.stats.capped);
        assert_eq!(first.features, second.features);

        let reseeded = SamplingConfig {
            random_seed: 7,
            ..config
        };
        assert_ne!(first.features, run(&path, &reseeded).unwrap().features);
    }

    #[test]
    fn prefetch_matches_synchronous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = mixed_archive(dir.path(), 725, 7);
        let sync = SamplingConfig {
            chunk_size: 64,
            sample_size: 90,
            ..SamplingConfig::default()
        };
        let prefetched = SamplingConfig {
            prefetch_batches: 2,
            ..sync.clone()
        };

        let a = run(&path, &sync).unwrap();
        let b = run(&path, &prefetched).unwrap();
        assert_eq!(a.features, b.features);
        assert_eq!(a.stats.batches, b.stats.batches);
        assert_eq!(a.stats.rows_read, 725);
    }

    #[test]
    fn row_count_pre_pass_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = attendance_archive(dir.path(), 5, 50);
        let config = SamplingConfig {
            count_rows: true,
            ..config()
        };
        let output = run(&path, &config).unwrap();
        assert_eq!(output.stats.counted_rows, Some(55));
        assert_eq!(output.stats.rows_read, 55);
    }

    #[test]
    fn invalid_config_fails_before_opening_archive() {
        let config = SamplingConfig {
            chunk_size: 0,
            ..SamplingConfig::default()
        };
        let err = run(Path::new("/does/not/exist.zip"), &config).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn missing_archive_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("missing.zip"), &config()).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveNotFound { .. }));
    }

    #[test]
    fn balancing_is_gated_per_batch_through_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut statuses = vec!["Absent", "Absent"];
        statuses.extend(["Present"; 8]);
        statuses.extend(["Present"; 10]);
        statuses.push("Absent");
        statuses.extend(["Present"; 9]);
        let path = status_archive(dir.path(), &statuses);
        let config = SamplingConfig {
            chunk_size: 10,
            majority_ratio: 3,
            ..config()
        };

        let output = run(&path, &config).unwrap();
        assert_eq!(output.stats.batches, 3);
        assert_eq!(output.stats.minority_pool, 3);
        assert_eq!(output.stats.majority_pool, 6 + 0 + 3);
        assert_eq!(output.features.len(), 12);

        let inputs: std::collections::HashSet<String> =
            (0..statuses.len()).map(|i| format!("LGA-{i}")).collect();
        let lgas: std::collections::HashSet<String> =
            output.features.iter().map(|f| f.lga.clone()).collect();
        assert_eq!(lgas.len(), output.features.len());
        assert!(lgas.is_subset(&inputs));
        // The all-present middle batch contributes nothing.
        assert!((10..20).all(|i| !lgas.contains(&format!("LGA-{i}"))));
        for i in [0, 1, 20] {
            assert!(lgas.contains(&format!("LGA-{i}")));
        }
    }

    #[test]
    fn prefetch_surfaces_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let body = "state,lga,gender,class,date
Lagos,Ikeja,Male,JSS1,2023-10-02
";
        let path = write_archive(dir.path(), &[("attendance.csv", body)]);
        let config = SamplingConfig {
            prefetch_batches: 2,
            ..config()
        };

        let err = run(&path, &config).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn prefetch_surfaces_decode_failure_after_batches_were_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let body = attendance_csv(100, 900);
        let path = corrupted_archive(dir.path(), &body, "LGA-999");
        let config = SamplingConfig {
            chunk_size: 10,
            prefetch_batches: 2,
            ..config()
        };

        let mut archive = AttendanceArchive::open(&path, "csv").unwrap();
        let mut delivered = 0;
        let err = decode_prefetched(&mut archive, &config, |_| delivered += 1).unwrap_err();
        assert!(delivered > 0);
        assert!(matches!(
            err,
            PipelineError::Csv {
                stage: Stage::Decode,
                ..
            }
        ));

        // No partial output from either path.
        assert!(run(&path, &config).is_err());
        let sync = SamplingConfig {
            prefetch_batches: 0,
            ..config
        };
        assert!(run(&path, &sync).is_err());
    }
}
