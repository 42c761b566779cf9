use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus, Batch, RawRow, Region};

const ISO_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%d %b %Y", "%d %B %Y", "%b %d %Y", "%B %d %Y",
];
const MONTH_FIRST_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y", "%d-%m-%Y"];
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y", "%m-%d-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Outcome of the tolerant date parser. A bad string is a value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Valid(NaiveDate),
    Unparseable,
}

impl ParsedDate {
    pub fn valid(self) -> Option<NaiveDate> {
        match self {
            ParsedDate::Valid(date) => Some(date),
            ParsedDate::Unparseable => None,
        }
    }
}

/// Tries the common textual date layouts in turn. With slash or dash
/// separated day/month pairs, `day_first` decides which one is tried first;
/// the other still applies when the first cannot be a real date.
pub fn parse_date(raw: &str, day_first: bool) -> ParsedDate {
    let raw = raw.trim();
    if raw.is_empty() {
        return ParsedDate::Unparseable;
    }

    let ambiguous = if day_first {
        DAY_FIRST_FORMATS
    } else {
        MONTH_FIRST_FORMATS
    };
    for format in ISO_DATE_FORMATS.iter().chain(ambiguous) {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return ParsedDate::Valid(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, format) {
            return ParsedDate::Valid(stamp.date());
        }
    }
    ParsedDate::Unparseable
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingField,
    UnparseableDate,
    UnknownStatus,
}

/// Per-batch counts of dropped rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectCounts {
    pub missing_field: u64,
    pub unparseable_date: u64,
    pub unknown_status: u64,
}

impl RejectCounts {
    pub fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::MissingField => self.missing_field += 1,
            RejectReason::UnparseableDate => self.unparseable_date += 1,
            RejectReason::UnknownStatus => self.unknown_status += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.missing_field + self.unparseable_date + self.unknown_status
    }

    pub fn absorb(&mut self, other: &RejectCounts) {
        self.missing_field += other.missing_field;
        self.unparseable_date += other.unparseable_date;
        self.unknown_status += other.unknown_status;
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub index: usize,
    pub rows_read: usize,
    pub records: Vec<AttendanceRecord>,
    pub rejected: RejectCounts,
}

pub fn validate_row(row: RawRow, day_first: bool) -> Result<AttendanceRecord, RejectReason> {
    if row.status.trim().is_empty() || row.date.trim().is_empty() {
        return Err(RejectReason::MissingField);
    }
    let date = parse_date(&row.date, day_first)
        .valid()
        .ok_or(RejectReason::UnparseableDate)?;
    let status = AttendanceStatus::parse(&row.status).ok_or(RejectReason::UnknownStatus)?;

    Ok(AttendanceRecord {
        region: Region {
            state: row.state,
            lga: row.lga,
        },
        gender: row.gender,
        class: row.class,
        date,
        status,
    })
}

/// Drops rows with a bad date or label. Consumes the batch.
pub fn validate_batch(batch: Batch, day_first: bool) -> ValidatedBatch {
    let rows_read = batch.rows.len();
    let mut records = Vec::with_capacity(rows_read);
    let mut rejected = RejectCounts::default();

    for row in batch.rows {
        match validate_row(row, day_first) {
            Ok(record) => records.push(record),
            Err(reason) => rejected.record(reason),
        }
    }

    if rejected.total() > 0 {
        debug!(
            "batch {}: dropped {} of {rows_read} rows ({rejected:?})",
            batch.index,
            rejected.total()
        );
    }

    ValidatedBatch {
        index: batch.index,
        rows_read,
        records,
        rejected,
    }
}
