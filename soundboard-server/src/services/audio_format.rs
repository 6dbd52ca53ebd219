//! Upload format acceptance and MP3 detection

use std::path::Path;

/// MIME types accepted for upload (parameters stripped, lowercase)
const ALLOWED_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/mpeg3",
    "audio/x-mpeg-3",
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/vnd.wave",
    "audio/flac",
    "audio/x-flac",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
    "audio/aac",
    "audio/x-aac",
    "audio/aacp",
    "audio/ogg",
    "audio/vorbis",
    "audio/opus",
    "audio/x-ms-wma",
    "audio/webm",
];

/// Extensions accepted for upload (lowercase, no dot)
const ALLOWED_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "mp4", "aac", "ogg", "oga", "opus", "wma", "webm",
];

const MP3_MIME_TYPES: &[&str] = &["audio/mpeg", "audio/mp3", "audio/mpeg3", "audio/x-mpeg-3"];

/// Lowercased MIME essence without parameters ("audio/ogg; codecs=opus" → "audio/ogg")
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Accept when either the declared MIME type or the extension is on the allow-list
pub fn is_supported_upload(content_type: Option<&str>, filename: Option<&str>) -> bool {
    let mime_ok = content_type
        .map(mime_essence)
        .is_some_and(|m| ALLOWED_MIME_TYPES.contains(&m.as_str()));

    let ext_ok = filename
        .and_then(extension_of)
        .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()));

    mime_ok || ext_ok
}

/// The client says this is an MP3 (by MIME type or extension)
pub fn is_declared_mp3(content_type: Option<&str>, filename: Option<&str>) -> bool {
    let mime_mp3 = content_type
        .map(mime_essence)
        .is_some_and(|m| MP3_MIME_TYPES.contains(&m.as_str()));

    let ext_mp3 = filename
        .and_then(extension_of)
        .is_some_and(|e| e == "mp3");

    mime_mp3 || ext_mp3
}

/// Magic-byte check that the file content really is MP3
pub fn sniff_mp3(path: &Path) -> bool {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => kind.mime_type() == "audio/mpeg",
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot sniff upload type");
            false
        }
    }
}

/// Extension worth keeping on the spooled upload, helps the encoder's format probe
pub fn spool_extension(filename: Option<&str>) -> Option<String> {
    filename
        .and_then(extension_of)
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_by_mime_or_extension() {
        assert!(is_supported_upload(Some("audio/wav"), Some("clip.wav")));
        assert!(is_supported_upload(Some("application/octet-stream"), Some("clip.FLAC")));
        assert!(is_supported_upload(Some("audio/ogg; codecs=opus"), Some("blob")));
        assert!(is_supported_upload(None, Some("voice.m4a")));
        assert!(is_supported_upload(Some("audio/webm"), None));
    }

    #[test]
    fn test_rejects_non_audio() {
        assert!(!is_supported_upload(Some("text/plain"), Some("notes.txt")));
        assert!(!is_supported_upload(Some("image/png"), Some("cover.png")));
        assert!(!is_supported_upload(None, None));
        assert!(!is_supported_upload(Some("video/mp4"), Some("movie.mkv")));
    }

    #[test]
    fn test_declared_mp3() {
        assert!(is_declared_mp3(Some("audio/mpeg"), Some("upload")));
        assert!(is_declared_mp3(Some("application/octet-stream"), Some("x.MP3")));
        assert!(!is_declared_mp3(Some("audio/wav"), Some("x.wav")));
    }

    #[test]
    fn test_sniff_mp3() {
        let dir = tempfile::tempdir().unwrap();

        let mp3 = dir.path().join("real.bin");
        std::fs::write(&mp3, b"ID3\x03\x00\x00\x00\x00\x00\x00fake_mp3_data").unwrap();
        assert!(sniff_mp3(&mp3));

        let wav = dir.path().join("fake.mp3");
        std::fs::write(&wav, b"RIFF\x24\x00\x00\x00WAVEfmt ").unwrap();
        assert!(!sniff_mp3(&wav));

        assert!(!sniff_mp3(&dir.path().join("missing")));
    }

    #[test]
    fn test_spool_extension() {
        assert_eq!(spool_extension(Some("a.WAV")).as_deref(), Some("wav"));
        assert_eq!(spool_extension(Some("a.exe")), None);
        assert_eq!(spool_extension(None), None);
    }
}
