use std::io::Read;

use crate::config::ColumnNames;
use crate::error::{PipelineError, Result, Stage};
use crate::models::{Batch, RawRow};

const MAX_PREALLOCATED_ROWS: usize = 65_536;

/// Lazily decodes a CSV byte stream into batches of at most `chunk_size`
/// rows. Only the six configured columns are copied out of each record.
///
/// Field-level problems (short rows, bad dates, odd labels) pass through as
/// raw text for the validator; only I/O failures end the stream early.
pub struct ChunkedRows<R: Read> {
    reader: csv::Reader<R>,
    positions: Option<[usize; 6]>,
    chunk_size: usize,
    next_index: usize,
    record: csv::ByteRecord,
    done: bool,
}

impl<R: Read> ChunkedRows<R> {
    pub fn new(source: R, columns: &ColumnNames, member: &str, chunk_size: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);
        let headers = reader
            .byte_headers()
            .map_err(|err| PipelineError::csv(Stage::Decode, err))?
            .clone();

        // A member with no header line at all has no rows either.
        let positions = if headers.is_empty() {
            None
        } else {
            Some(resolve_positions(&headers, columns, member)?)
        };

        Ok(Self {
            reader,
            done: positions.is_none(),
            positions,
            chunk_size,
            next_index: 0,
            record: csv::ByteRecord::new(),
        })
    }

    fn read_batch(&mut self, positions: [usize; 6]) -> Result<Vec<RawRow>> {
        let mut rows = Vec::with_capacity(self.chunk_size.min(MAX_PREALLOCATED_ROWS));
        while rows.len() < self.chunk_size {
            let more = self
                .reader
                .read_byte_record(&mut self.record)
                .map_err(|err| PipelineError::csv(Stage::Decode, err))?;
            if !more {
                self.done = true;
                break;
            }
            rows.push(extract_row(&self.record, positions));
        }
        Ok(rows)
    }
}

impl<R: Read> Iterator for ChunkedRows<R> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let positions = self.positions?;
        match self.read_batch(positions) {
            Ok(rows) if rows.is_empty() => None,
            Ok(rows) => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Batch { index, rows }))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Lowercases and folds spaces and hyphens into underscores, so
/// `Attendance Status` and `attendance_status` name the same column.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn resolve_positions(
    headers: &csv::ByteRecord,
    columns: &ColumnNames,
    member: &str,
) -> Result<[usize; 6]> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|field| normalize_header(&String::from_utf8_lossy(field)))
        .collect();

    let mut positions = [0usize; 6];
    for (slot, wanted) in positions.iter_mut().zip(columns.ordered()) {
        let key = normalize_header(wanted);
        *slot = normalized
            .iter()
            .position(|name| *name == key)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: wanted.to_string(),
                member: member.to_string(),
            })?;
    }
    Ok(positions)
}

fn extract_row(record: &csv::ByteRecord, positions: [usize; 6]) -> RawRow {
    let field = |pos: usize| {
        record
            .get(pos)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    };
    RawRow {
        state: field(positions[0]),
        lga: field(positions[1]),
        gender: field(positions[2]),
        class: field(positions[3]),
        date: field(positions[4]),
        status: field(positions[5]),
    }
}
