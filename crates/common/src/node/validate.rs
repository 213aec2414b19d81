/// Maximum number of tags on a file
pub const MAX_TAGS: usize = 5;

/// Maximum file content size, in UTF-8 bytes
pub const MAX_TEXT_BYTES: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("maximum of {} tags allowed", MAX_TAGS)]
    TooManyTags,
    #[error("tags must be alphanumeric words: {0:?}")]
    InvalidTag(String),
    #[error("file content exceeds maximum size of {max} bytes ({size} bytes)")]
    TextTooLarge { size: usize, max: usize },
    #[error("name is required")]
    EmptyName,
    #[error("symlink can point at most at one node")]
    InvalidSymlink,
}

/// Validate tags and normalise them to lowercase.
pub fn validate_tags<S: AsRef<str>>(tags: &[S]) -> Result<Vec<String>, ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags);
    }

    tags.iter()
        .map(|tag| {
            let tag = tag.as_ref();
            if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ValidationError::InvalidTag(tag.to_string()));
            }
            Ok(tag.to_ascii_lowercase())
        })
        .collect()
}

/// Parse a comma separated tag field as submitted by a form, then validate it.
pub fn parse_tags(raw: &str) -> Result<Vec<String>, ValidationError> {
    let tags: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect();
    validate_tags(&tags)
}

pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.len() > MAX_TEXT_BYTES {
        return Err(ValidationError::TextTooLarge {
            size: text.len(),
            max: MAX_TEXT_BYTES,
        });
    }
    Ok(())
}

/// Trim a node name, rejecting blank ones
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_lowercased() {
        let tags = validate_tags(&["Rust", "notes", "V2"]).unwrap();
        assert_eq!(tags, vec!["rust", "notes", "v2"]);
    }

    #[test]
    fn test_tag_limits() {
        assert_eq!(
            validate_tags(&["a", "b", "c", "d", "e", "f"]),
            Err(ValidationError::TooManyTags)
        );
        assert_eq!(
            validate_tags(&["two words"]),
            Err(ValidationError::InvalidTag("two words".to_string()))
        );
        assert_eq!(
            validate_tags(&["émoji"]),
            Err(ValidationError::InvalidTag("émoji".to_string()))
        );
    }

    #[test]
    fn test_parse_tags_from_form() {
        assert_eq!(parse_tags(" a, B ,,c ").unwrap(), vec!["a", "b", "c"]);
        assert!(parse_tags("").unwrap().is_empty());
    }

    #[test]
    fn test_text_size_is_bytes() {
        assert!(validate_text(&"a".repeat(MAX_TEXT_BYTES)).is_ok());
        // 'é' is two bytes in UTF-8
        let text = "é".repeat(MAX_TEXT_BYTES / 2 + 1);
        assert_eq!(
            validate_text(&text),
            Err(ValidationError::TextTooLarge {
                size: MAX_TEXT_BYTES + 2,
                max: MAX_TEXT_BYTES
            })
        );
    }

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(validate_name("  notes.md ").unwrap(), "notes.md");
        assert_eq!(validate_name("   "), Err(ValidationError::EmptyName));
    }
}
