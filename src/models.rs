use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// One decoded CSV row, restricted to the six columns the pipeline reads.
/// Fields are kept as raw text; nothing has been checked yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub state: String,
    pub lga: String,
    pub gender: String,
    pub class: String,
    pub date: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based position of the batch in the stream.
    pub index: usize,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// The rarer label; every row carrying it is kept.
    pub const MINORITY: AttendanceStatus = AttendanceStatus::Absent;

    /// Case-sensitive match against the two known labels.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Present" => Some(AttendanceStatus::Present),
            "Absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    pub fn is_minority(self) -> bool {
        self == Self::MINORITY
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub state: String,
    pub lga: String,
}

/// A row that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceRecord {
    pub region: Region,
    pub gender: String,
    pub class: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRecord {
    pub record: AttendanceRecord,
    /// 1 when the status is the minority label, else 0.
    pub is_absent: u8,
}

impl LabeledRecord {
    pub fn new(record: AttendanceRecord) -> Self {
        let is_absent = u8::from(record.status.is_minority());
        Self { record, is_absent }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicPeriod {
    Term1,
    Term2,
    Term3,
    Vacation,
    /// Only reachable with a month outside 1..=12, which means an upstream bug.
    Other,
}

impl AcademicPeriod {
    pub const ALL: [AcademicPeriod; 5] = [
        AcademicPeriod::Term1,
        AcademicPeriod::Term2,
        AcademicPeriod::Term3,
        AcademicPeriod::Vacation,
        AcademicPeriod::Other,
    ];

    pub fn from_month(month: u32) -> Self {
        match month {
            9..=11 => AcademicPeriod::Term1,
            12 | 1 | 2 => AcademicPeriod::Term2,
            3..=5 => AcademicPeriod::Term3,
            6..=8 => AcademicPeriod::Vacation,
            _ => AcademicPeriod::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AcademicPeriod::Term1 => "term1",
            AcademicPeriod::Term2 => "term2",
            AcademicPeriod::Term3 => "term3",
            AcademicPeriod::Vacation => "vacation",
            AcademicPeriod::Other => "other",
        }
    }
}

/// Model-ready row. Field order is the column order of the exported table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRecord {
    pub state: String,
    pub lga: String,
    pub gender: String,
    pub class: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub is_absent: u8,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday_index: u32,
    pub month_index: u32,
    pub is_weekend: bool,
    pub academic_period: AcademicPeriod,
    pub gender_class_key: String,
}

#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub label: String,
    pub count: usize,
    pub absent: usize,
    pub absence_rate: f64,
}
