use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::{info, warn};
use zip::read::ZipArchive;

use crate::error::{PipelineError, Result, Stage};

/// An opened zip container and the tabular member chosen inside it.
///
/// The file handle lives as long as this value; dropping it on any path
/// (including `?` early returns) closes the file.
pub struct AttendanceArchive {
    path: PathBuf,
    member_name: String,
    inner: ZipArchive<BufReader<File>>,
}

impl AttendanceArchive {
    pub fn open(path: &Path, extension: &str) -> Result<Self> {
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => PipelineError::ArchiveNotFound {
                path: path.to_path_buf(),
            },
            _ => PipelineError::io(Stage::Archive, err),
        })?;
        let inner = ZipArchive::new(BufReader::new(file)).map_err(|source| PipelineError::Zip {
            path: path.to_path_buf(),
            source,
        })?;

        let candidates: Vec<String> = inner
            .file_names()
            .filter(|name| is_tabular_member(name, extension))
            .map(str::to_string)
            .collect();

        let Some(member_name) = candidates.first().cloned() else {
            return Err(PipelineError::NoTabularMember {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            });
        };
        if candidates.len() > 1 {
            warn!(
                "{} holds {} `.{extension}` members; using {member_name}",
                path.display(),
                candidates.len()
            );
        }
        info!("reading {member_name} from {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            member_name,
            inner,
        })
    }

    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    /// A fresh byte stream positioned at the start of the member.
    pub fn member(&mut self) -> Result<impl Read + '_> {
        let path = &self.path;
        self.inner
            .by_name(&self.member_name)
            .map_err(|source| PipelineError::Zip {
                path: path.clone(),
                source,
            })
    }

    /// Counts data rows (header excluded) with one pass over the member.
    pub fn count_rows(&mut self) -> Result<u64> {
        let member = self.member()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(member);
        let mut record = csv::ByteRecord::new();
        let mut rows = 0u64;
        while reader
            .read_byte_record(&mut record)
            .map_err(|err| PipelineError::csv(Stage::Count, err))?
        {
            rows += 1;
        }
        Ok(rows)
    }
}

fn is_tabular_member(name: &str, extension: &str) -> bool {
    if name.ends_with('/') || name.starts_with("__MACOSX/") {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
        .unwrap_or(false)
}
