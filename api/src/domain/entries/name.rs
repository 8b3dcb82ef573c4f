use thiserror::Error;

pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name must be at most {MAX_NAME_LEN} characters")]
    TooLong,
    #[error("name must not contain '/', '\\' or control characters")]
    InvalidCharacter,
    #[error("name must not be '.' or '..'")]
    Reserved,
}

/// Trims and checks an entry name. Returns the name as it will be stored.
pub fn validate_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(NameError::InvalidCharacter);
    }
    if name == "." || name == ".." {
        return Err(NameError::Reserved);
    }
    Ok(name.to_string())
}

/// Reduces a name (or any identifier) to a single safe path segment for blob keys.
pub fn sanitize_segment(raw: &str) -> String {
    let mut s: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            ' ' => '_',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    if s.len() > 100 {
        let mut cut = 100;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    if s.is_empty() || s == "." || s == ".." {
        s = "untitled".into();
    }
    s
}
