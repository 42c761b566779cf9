use chrono::Datelike;
use log::warn;

use crate::models::{AcademicPeriod, FeatureRecord, LabeledRecord};

/// Joins gender and class in the interaction key.
pub const KEY_SEPARATOR: char = '|';

pub fn gender_class_key(gender: &str, class: &str) -> String {
    format!("{gender}{KEY_SEPARATOR}{class}")
}

/// Pure one-to-one derivation; weekdays count from Monday = 0.
pub fn derive_features(sample: &[LabeledRecord]) -> Vec<FeatureRecord> {
    sample.iter().map(derive_one).collect()
}

/// Buckets a month; `Other` means a month outside 1..=12 got this far.
pub fn academic_period(month: u32) -> AcademicPeriod {
    let period = AcademicPeriod::from_month(month);
    if period == AcademicPeriod::Other {
        warn!("month {month} has no academic period; dates upstream are invalid");
    }
    period
}

fn derive_one(labeled: &LabeledRecord) -> FeatureRecord {
    let record = &labeled.record;
    let weekday_index = record.date.weekday().num_days_from_monday();
    let month_index = record.date.month();

    FeatureRecord {
        state: record.region.state.clone(),
        lga: record.region.lga.clone(),
        gender: record.gender.clone(),
        class: record.class.clone(),
        date: record.date,
        status: record.status,
        is_absent: labeled.is_absent,
        weekday_index,
        month_index,
        is_weekend: weekday_index >= 5,
        academic_period: academic_period(month_index),
        gender_class_key: gender_class_key(&record.gender, &record.class),
    }
}
