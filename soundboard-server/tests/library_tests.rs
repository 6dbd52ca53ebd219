//! Library service tests: reconciliation properties and concurrent mutations

use std::sync::Arc;
use std::time::Duration;

use soundboard_server::services::encoder::{AudioEncoder, EncodeRequest, EncoderError};
use soundboard_server::services::favorites::FavoritesStore;
use soundboard_server::services::upload::{ReceivedUpload, UploadSpool};
use soundboard_server::services::SoundLibrary;
use soundboard_server::LibraryError;

const FAKE_WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt fake_wav_data";

/// Copies after a delay, so concurrent uploads overlap
struct SlowCopyEncoder;

#[async_trait::async_trait]
impl AudioEncoder for SlowCopyEncoder {
    fn name(&self) -> &'static str {
        "slow-copy"
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::copy(&request.input, &request.output).map_err(EncoderError::Spawn)?;
        Ok(())
    }
}

fn setup() -> (tempfile::TempDir, Arc<SoundLibrary>) {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("sfx")).unwrap();

    let library = SoundLibrary::new(
        root.path().join("sfx"),
        root.path().join("favorites.json"),
        Arc::new(SlowCopyEncoder),
        1024 * 1024,
    );
    (root, Arc::new(library))
}

async fn received(root: &tempfile::TempDir) -> ReceivedUpload {
    let mut spool = UploadSpool::create(
        &root.path().join("tmp"),
        Some("clip.wav".to_string()),
        Some("audio/wav".to_string()),
        1024 * 1024,
    )
    .await
    .unwrap();
    spool.write_chunk(FAKE_WAV).await.unwrap();
    spool.finish().await.unwrap()
}

#[tokio::test]
async fn test_list_keys_match_files_after_filesystem_changes() {
    let (root, library) = setup();
    let sfx = root.path().join("sfx");
    std::fs::write(sfx.join("a.mp3"), b"ID3").unwrap();
    std::fs::write(sfx.join("b.mp3"), b"ID3").unwrap();

    library.toggle_favorite("a.mp3").await.unwrap();
    library.list().await.unwrap();

    // Changes made behind the server's back
    std::fs::remove_file(sfx.join("a.mp3")).unwrap();
    std::fs::write(sfx.join("c.MP3"), b"ID3").unwrap();

    let listing = library.list().await.unwrap();
    let keys: Vec<&String> = listing.favorites.keys().collect();
    assert_eq!(listing.sounds, vec!["b.mp3".to_string(), "c.MP3".to_string()]);
    assert_eq!(keys, vec!["b.mp3", "c.MP3"]);

    let stored = FavoritesStore::new(root.path().join("favorites.json"))
        .load()
        .unwrap();
    assert_eq!(stored, listing.favorites);
}

#[tokio::test]
async fn test_concurrent_uploads_to_same_name_commit_once() {
    let (root, library) = setup();

    let first = received(&root).await;
    let second = received(&root).await;

    let (a, b) = tokio::join!(
        library.upload(first, "Same Name"),
        library.upload(second, "Same Name")
    );

    let results = [a, b];
    let committed = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(LibraryError::DuplicateName { .. })))
        .count();

    assert_eq!(committed, 1);
    assert_eq!(duplicates, 1);
    assert!(root.path().join("sfx/Same Name.mp3").is_file());
    assert_eq!(std::fs::read_dir(root.path().join("tmp")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_concurrent_mutations_keep_favorites_consistent() {
    let (root, library) = setup();
    let sfx = root.path().join("sfx");
    for i in 0..8 {
        std::fs::write(sfx.join(format!("clip{}.mp3", i)), b"ID3").unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..8 {
        let library = library.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                library.toggle_favorite(&format!("clip{}.mp3", i)).await.map(|_| ())
            } else {
                library.delete(&format!("clip{}.mp3", i)).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let listing = library.list().await.unwrap();
    assert_eq!(listing.sounds.len(), 4);
    for i in (0..8).step_by(2) {
        assert_eq!(listing.favorites.get(&format!("clip{}.mp3", i)), Some(&true));
    }
}
