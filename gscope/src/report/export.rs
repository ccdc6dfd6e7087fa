//! JSON export of scan reports
//!
//! The export mirrors [`Report`] field for field so scripts can diff two runs
//! or feed the line hits into an editor.

use super::Report;
use crate::domain::ExportError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serialize `report` as pretty-printed JSON into `writer`
///
/// # Errors
/// Returns an error if serialization or writing fails
pub fn write_json<W: Write>(report: &Report, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write `report` to the file at `path`
///
/// # Errors
/// Returns `WriteFailed` if the file cannot be created
pub fn export_json(report: &Report, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
    write_json(report, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnitIndex;
    use crate::report::UnitReport;

    #[test]
    fn test_write_json_structure() {
        let report = Report {
            target: "bo3".to_string(),
            module_base: 0x1000,
            frames_scanned: 1,
            unresolved_positions: 0,
            units: vec![UnitReport { index: UnitIndex(3), file: "a.gsc".to_string(), usage_count: 2, lines: vec![5] }],
        };

        let mut buffer = Vec::new();
        write_json(&report, &mut buffer).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed["target"], "bo3");
        assert_eq!(parsed["module_base"], 4096);
        assert_eq!(parsed["units"][0]["index"], 3);
        assert_eq!(parsed["units"][0]["lines"][0], 5);
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let report = Report {
            target: "bo3".to_string(),
            module_base: 0,
            frames_scanned: 0,
            unresolved_positions: 0,
            units: Vec::new(),
        };
        let err = export_json(&report, Path::new("/nonexistent/dir/report.json")).unwrap_err();
        assert!(matches!(err, ExportError::WriteFailed(_)));
    }
}
