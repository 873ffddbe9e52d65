use std::path::Path;
use thiserror::Error;

/// Why an upload was refused. `Display` is the message returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("no file uploaded")]
    NoFile,

    #[error("disallowed file type")]
    DisallowedType,

    #[error("file too large")]
    TooLarge,
}

/// Returns the lower-cased extension if it is on the allow-list
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<String, UploadRejection> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or(UploadRejection::DisallowedType)?;

    if allowed.iter().any(|a| a == &ext) {
        Ok(ext)
    } else {
        Err(UploadRejection::DisallowedType)
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), UploadRejection> {
    if size > max_size {
        return Err(UploadRejection::TooLarge);
    }
    Ok(())
}

/// Sanitizes a client-supplied filename for display.
///
/// Strips any path component, replaces control and reserved characters and
/// limits the length to 255 bytes.
pub fn sanitize_filename(filename: &str) -> String {
    // Get only the filename component (remove any path)
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if filename.contains("..") || name.len() != filename.len() {
        tracing::warn!("Path components stripped from uploaded filename: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.trim().is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}
