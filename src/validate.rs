//! Cell filename validation.

use std::path::Path;

use crate::models::{Cell, Session};

/// Extensions accepted for code cell scripts.
const ALLOWED_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts"];

/// Validate a proposed filename for a code cell.
///
/// Rules: non-empty, a plain filename (no path components), an allowed
/// script extension, and unique among the session's other code cells.
///
/// # Errors
///
/// Returns a human-readable description of the first rule violated.
pub fn validate_filename(
    session: &Session,
    cell_id: &str,
    filename: &str,
) -> std::result::Result<(), String> {
    if filename.trim().is_empty() {
        return Err("filename must not be empty".into());
    }

    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err("filename must not contain path separators".into());
    }

    let extension = Path::new(filename).extension().and_then(|e| e.to_str());
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext) => {}
        _ => {
            return Err(format!(
                "filename must end in one of: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ));
        }
    }

    let taken = session.cells.iter().any(|cell| match cell {
        Cell::Code {
            id, filename: f, ..
        } => id.as_str() != cell_id && f.as_str() == filename,
        _ => false,
    });
    if taken {
        return Err(format!("filename {filename} is already in use"));
    }

    Ok(())
}
