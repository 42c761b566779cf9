use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, Result, Stage};
use crate::models::FeatureRecord;
use crate::pipeline::RunStats;

/// Writes the feature table with a header row; column order follows
/// [`FeatureRecord`]'s fields.
pub fn write_features<W: Write>(writer: W, features: &[FeatureRecord]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for feature in features {
        out.serialize(feature)
            .map_err(|err| PipelineError::csv(Stage::Export, err))?;
    }
    out.flush().map_err(|err| PipelineError::io(Stage::Export, err))
}

pub fn write_features_csv(path: &Path, features: &[FeatureRecord]) -> Result<()> {
    let file = File::create(path).map_err(|err| PipelineError::io(Stage::Export, err))?;
    write_features(BufWriter::new(file), features)
}

pub fn write_summary_json(path: &Path, stats: &RunStats) -> Result<()> {
    let file = File::create(path).map_err(|err| PipelineError::io(Stage::Export, err))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, stats)
        .map_err(|err| PipelineError::io(Stage::Export, err.into()))?;
    writer
        .flush()
        .map_err(|err| PipelineError::io(Stage::Export, err))
}
