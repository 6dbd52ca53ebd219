//! Sound name sanitization
//!
//! User-supplied names become filenames, so they are reduced to ASCII letters, digits,
//! spaces, hyphens and underscores before use.

use crate::error::LibraryError;
use crate::services::library_fs::SOUND_EXTENSION;

/// Longest sanitized name accepted, keeps filenames well under filesystem limits
pub const MAX_NAME_LEN: usize = 100;

/// Drop every character outside the allow-list and trim surrounding whitespace
///
/// Returns `None` when nothing usable is left.
///
/// ```
/// use soundboard_server::services::naming::sanitize_sound_name;
///
/// assert_eq!(sanitize_sound_name("My Sound!").as_deref(), Some("My Sound"));
/// assert_eq!(sanitize_sound_name("!!!"), None);
/// ```
pub fn sanitize_sound_name(raw: &str) -> Option<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();

    let trimmed: String = kept.trim().chars().take(MAX_NAME_LEN).collect();
    let trimmed = trimmed.trim_end();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Strip a trailing `.mp3` (any case) so "clip.mp3" and "clip" name the same sound
pub fn strip_sound_extension(raw: &str) -> &str {
    let trimmed = raw.trim();
    let suffix_len = SOUND_EXTENSION.len() + 1;

    if trimmed.len() > suffix_len && trimmed.is_char_boundary(trimmed.len() - suffix_len) {
        let (stem, ext) = trimmed.split_at(trimmed.len() - suffix_len);
        if ext.eq_ignore_ascii_case(".mp3") {
            return stem;
        }
    }
    trimmed
}

/// Library filename for a sanitized name
pub fn sound_filename(sanitized: &str) -> String {
    format!("{}.{}", sanitized, SOUND_EXTENSION)
}

/// Sanitize a requested name into `(display name, filename)`
pub fn target_for(raw: &str) -> Result<(String, String), LibraryError> {
    let sanitized = sanitize_sound_name(strip_sound_extension(raw)).ok_or_else(|| {
        LibraryError::InvalidName {
            name: raw.to_string(),
            reason: "name must contain letters, numbers, spaces, hyphens or underscores"
                .to_string(),
        }
    })?;

    let filename = sound_filename(&sanitized);
    Ok((sanitized, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_punctuation() {
        assert_eq!(sanitize_sound_name("My Sound!").as_deref(), Some("My Sound"));
        assert_eq!(
            sanitize_sound_name("air-horn_2 (loud)").as_deref(),
            Some("air-horn_2 loud")
        );
        assert_eq!(sanitize_sound_name("../../etc/passwd").as_deref(), Some("etcpasswd"));
    }

    #[test]
    fn test_sanitize_trims_and_rejects_empty() {
        assert_eq!(sanitize_sound_name("   spaced   ").as_deref(), Some("spaced"));
        assert_eq!(sanitize_sound_name(""), None);
        assert_eq!(sanitize_sound_name("   "), None);
        assert_eq!(sanitize_sound_name("★☆★"), None);
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_sound_name(&long).unwrap().len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_strip_sound_extension() {
        assert_eq!(strip_sound_extension("clip.mp3"), "clip");
        assert_eq!(strip_sound_extension("clip.MP3"), "clip");
        assert_eq!(strip_sound_extension("clip"), "clip");
        assert_eq!(strip_sound_extension(".mp3"), ".mp3");
        assert_eq!(strip_sound_extension("clip.wav"), "clip.wav");
    }

    #[test]
    fn test_target_for() {
        assert_eq!(
            target_for("My Sound!").unwrap(),
            ("My Sound".to_string(), "My Sound.mp3".to_string())
        );
        assert_eq!(target_for("b.mp3").unwrap().1, "b.mp3");
        assert!(matches!(
            target_for("?!"),
            Err(LibraryError::InvalidName { .. })
        ));
    }
}
