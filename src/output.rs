//! CSV persistence of batch results

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::Result;
use crate::record::{SessionResult, RESULT_FIELDS};

/// Write the batch as CSV: a header row of the 12 field names, then one
/// row per result in the order given. Absent optionals render as empty
/// cells.
pub fn write_results(path: &Path, results: &[SessionResult]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(RESULT_FIELDS)?;
    for result in results {
        writer.write_record(result.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Timestamped default output path, e.g.
/// `data/stress_test_20250601_120000_sess=4.csv`.
pub fn default_output_path(dir: &Path, session_count: usize) -> PathBuf {
    dir.join(format!(
        "stress_test_{}_sess={}.csv",
        Local::now().format("%Y%m%d_%H%M%S"),
        session_count
    ))
}
