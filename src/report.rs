use std::collections::HashMap;
use std::fmt::Write;

use crate::features::KEY_SEPARATOR;
use crate::models::{AcademicPeriod, FeatureRecord, GroupSummary};
use crate::pipeline::RunStats;

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn summarize<K, F>(features: &[FeatureRecord], key: F) -> HashMap<K, (usize, usize)>
where
    K: std::hash::Hash + Eq,
    F: Fn(&FeatureRecord) -> K,
{
    let mut map: HashMap<K, (usize, usize)> = HashMap::new();
    for feature in features {
        let entry = map.entry(key(feature)).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += usize::from(feature.is_absent);
    }
    map
}

fn group_summary(label: String, count: usize, absent: usize) -> GroupSummary {
    GroupSummary {
        label,
        count,
        absent,
        absence_rate: if count == 0 {
            0.0
        } else {
            absent as f64 / count as f64
        },
    }
}

/// Periods in calendar order; `other` only appears when present.
pub fn summarize_by_period(features: &[FeatureRecord]) -> Vec<GroupSummary> {
    let map = summarize(features, |f| f.academic_period);
    AcademicPeriod::ALL
        .iter()
        .filter_map(|period| {
            let (count, absent) = map.get(period).copied()?;
            Some(group_summary(period.as_str().to_string(), count, absent))
        })
        .collect()
}

pub fn summarize_by_weekday(features: &[FeatureRecord]) -> Vec<GroupSummary> {
    let map = summarize(features, |f| f.weekday_index);
    (0u32..7)
        .filter_map(|day| {
            let (count, absent) = map.get(&day).copied()?;
            Some(group_summary(WEEKDAYS[day as usize].to_string(), count, absent))
        })
        .collect()
}

/// Gender×class groups ordered by absence rate, then size.
pub fn summarize_by_interaction(features: &[FeatureRecord]) -> Vec<GroupSummary> {
    let map = summarize(features, |f| f.gender_class_key.clone());
    let mut summaries: Vec<GroupSummary> = map
        .into_iter()
        .map(|(key, (count, absent))| group_summary(key, count, absent))
        .collect();

    summaries.sort_by(|a, b| {
        b.absence_rate
            .partial_cmp(&a.absence_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.count.cmp(&a.count))
            .then_with(|| a.label.cmp(&b.label))
    });
    summaries
}

fn write_groups(output: &mut String, summaries: &[GroupSummary]) {
    if summaries.is_empty() {
        let _ = writeln!(output, "No rows in the sample.");
        return;
    }
    for summary in summaries {
        let _ = writeln!(
            output,
            "- {}: {} rows, {} absent ({:.1}%)",
            summary.label,
            summary.count,
            summary.absent,
            summary.absence_rate * 100.0
        );
    }
}

pub fn build_report(stats: &RunStats, features: &[FeatureRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Sample Report");
    let _ = writeln!(
        output,
        "Run {} over {} ({})",
        stats.run_id,
        stats.archive.display(),
        stats.member
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ingestion");
    if let Some(counted) = stats.counted_rows {
        let _ = writeln!(output, "- rows in member: {counted}");
    }
    let _ = writeln!(
        output,
        "- rows read: {} in {} batches of up to {}",
        stats.rows_read, stats.batches, stats.config.chunk_size
    );
    let _ = writeln!(
        output,
        "- rows rejected: {} (missing field {}, bad date {}, unknown status {})",
        stats.rejected.total(),
        stats.rejected.missing_field,
        stats.rejected.unparseable_date,
        stats.rejected.unknown_status
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Balance");
    let _ = writeln!(
        output,
        "- pools: {} absent, {} present (ratio cap {}:1 per batch)",
        stats.minority_pool, stats.majority_pool, stats.config.majority_ratio
    );
    let absent = features.iter().filter(|f| f.is_absent == 1).count();
    let _ = writeln!(
        output,
        "- sample: {} rows, {} absent, {} present{}",
        features.len(),
        absent,
        features.len() - absent,
        if stats.capped {
            format!(" (capped at {})", stats.config.sample_size)
        } else {
            String::new()
        }
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Academic Periods");
    write_groups(&mut output, &summarize_by_period(features));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekdays");
    write_groups(&mut output, &summarize_by_weekday(features));

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Highest Absence Gender{}Class Groups",
        KEY_SEPARATOR
    );
    let interactions = summarize_by_interaction(features);
    write_groups(&mut output, &interactions[..interactions.len().min(10)]);

    output
}
