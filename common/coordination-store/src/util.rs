use crate::error::{Error, Result};

/// Validate that an identifier is safe for use in store key paths.
///
/// Identifiers (subscription ids, topics, partitions, stream ids) are
/// interpolated into key paths. Without validation, a name like
/// `../../sessions/x` could address arbitrary keys.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 {
        return Err(Error::InvalidState(
            "identifier must be 1-128 characters".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidState(format!(
            "identifier {name:?} contains invalid characters (only alphanumeric, dash, underscore allowed)"
        )));
    }
    Ok(())
}

/// Validate a single key-path segment taken from outside the store, such as a
/// topic or partition name.
///
/// Looser than [`validate_identifier`]: dots are allowed (`orders.v1`), but a
/// segment can never contain `/` or be `.` or `..`, so it always addresses
/// exactly one level of the key path.
pub fn validate_key_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.len() > 249 {
        return Err(Error::InvalidState(
            "key segment must be 1-249 characters".to_string(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(Error::InvalidState(format!(
            "key segment {segment:?} is a relative path"
        )));
    }
    if segment
        .chars()
        .any(|c| c == '/' || c.is_control() || c.is_whitespace())
    {
        return Err(Error::InvalidState(format!(
            "key segment {segment:?} contains '/', whitespace or control characters"
        )));
    }
    Ok(())
}
