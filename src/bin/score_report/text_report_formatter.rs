use std::fs;
use std::io::Write;
use std::path::Path;

use seizure_scoring::scoring::report::write_text_report;
use seizure_scoring::Report;

/// Renders into memory before the destination is touched.
pub fn write_report(path: Option<&Path>, report: &Report) -> Result<(), String> {
    let mut buffer = Vec::new();
    write_text_report(&mut buffer, report).map_err(|err| err.to_string())?;

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
