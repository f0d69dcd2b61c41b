use std::fs;
use std::io::Write;
use std::path::Path;

use seizure_scoring::Report;

/// Pretty JSON to `path`, or to standard output when no path is given. The
/// document is serialized in full before anything is written.
pub fn write_report(path: Option<&Path>, report: &Report) -> Result<(), String> {
    let mut buffer = serde_json::to_vec_pretty(report)
        .map_err(|err| format!("Failed to serialize report JSON: {err}"))?;
    buffer.push(b'\n');

    let Some(path) = path else {
        return std::io::stdout()
            .lock()
            .write_all(&buffer)
            .map_err(|err| format!("Failed to write report: {err}"));
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }
    fs::write(path, buffer)
        .map_err(|err| format!("Failed to write report file '{}': {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use seizure_scoring::{
        Algorithm, AlgorithmReport, ConfusionRecord, Meta, REPORT_SCHEMA_VERSION,
    };

    use super::*;

    #[test]
    fn writes_one_complete_document_into_a_new_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reports").join("score.json");
        let mut record = ConfusionRecord::with_labels(["seiz", "bckg"]);
        record.add_duration(60.0);
        let report = Report {
            schema_version: REPORT_SCHEMA_VERSION,
            meta: Meta {
                generated_at: "2026-01-01T00:00:00+00:00".to_string(),
                reference_list: "ref.list".to_string(),
                hypothesis_list: "hyp.list".to_string(),
                file_count: 1,
            },
            results: vec![AlgorithmReport::new(Algorithm::Overlap, record.finalize())],
        };

        write_report(Some(&path), &report).expect("report written");

        let text = fs::read_to_string(&path).expect("report file");
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["schema_version"], REPORT_SCHEMA_VERSION);
        assert_eq!(value["results"][0]["algorithm"], "overlap");
    }
}
