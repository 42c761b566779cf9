use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::RawRow;

pub const ATTENDANCE_HEADER: &str = "state,lga,gender,class,date,attendance_status";

/// Writes `attendance.zip` under `dir` with the given members.
pub fn write_archive(dir: &Path, members: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("attendance.zip");
    let file = File::create(&path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, body) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// CSV body with `absent` Absent rows followed by `present` Present rows.
/// Dates cycle through September and October 2023 so every row is distinct.
pub fn attendance_csv(absent: usize, present: usize) -> String {
    let mut body = String::from(ATTENDANCE_HEADER);
    body.push('\n');
    for i in 0..absent {
        let _ = writeln!(body, "{}", csv_line(i, "Absent"));
    }
    for i in 0..present {
        let _ = writeln!(body, "{}", csv_line(absent + i, "Present"));
    }
    body
}

/// Archive holding a single `attendance.csv` built by [`attendance_csv`].
pub fn attendance_archive(dir: &Path, absent: usize, present: usize) -> PathBuf {
    let body = attendance_csv(absent, present);
    write_archive(dir, &[("attendance.csv", body.as_str())])
}

fn csv_line(i: usize, status: &str) -> String {
    let gender = if i % 2 == 0 { "Male" } else { "Female" };
    let day = i % 28 + 1;
    let month = if i % 56 < 28 { 9 } else { 10 };
    format!("Lagos,LGA-{i},{gender},JSS{},2023-{month:02}-{day:02},{status}", i % 3 + 1)
}

pub fn raw_row(date: &str, status: &str) -> RawRow {
    RawRow {
        state: "Lagos".to_string(),
        lga: "Ikeja".to_string(),
        gender: "Female".to_string(),
        class: "JSS2".to_string(),
        date: date.to_string(),
        status: status.to_string(),
    }
}

/// Archive of `rows` rows where every `absent_every`-th row is Absent, so
/// each batch carries some minority rows.
pub fn mixed_archive(dir: &Path, rows: usize, absent_every: usize) -> PathBuf {
    let statuses: Vec<&str> = (0..rows)
        .map(|i| if i % absent_every == 0 { "Absent" } else { "Present" })
        .collect();
    status_archive(dir, &statuses)
}

/// Archive with one row per status; row `i` carries lga `LGA-{i}`.
pub fn status_archive(dir: &Path, statuses: &[&str]) -> PathBuf {
    let mut body = String::from(ATTENDANCE_HEADER);
    body.push('\n');
    for (i, status) in statuses.iter().enumerate() {
        let _ = writeln!(body, "{}", csv_line(i, status));
    }
    write_archive(dir, &[("attendance.csv", body.as_str())])
}

/// Uncompressed archive whose member fails its checksum: `needle` is
/// rewritten in place after the CRC was recorded, so the damage only
/// surfaces once the reader reaches the end of the member.
pub fn corrupted_archive(dir: &Path, body: &str, needle: &str) -> PathBuf {
    let path = dir.join("attendance.zip");
    let file = File::create(&path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("attendance.csv", options).unwrap();
    writer.write_all(body.as_bytes()).unwrap();
    writer.finish().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let at = bytes
        .windows(needle.len())
        .position(|window| window == needle.as_bytes())
        .unwrap();
    let last = at + needle.len() - 1;
    bytes[last] = if bytes[last] == b'9' { b'8' } else { b'9' };
    std::fs::write(&path, bytes).unwrap();
    path
}
