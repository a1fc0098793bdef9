//! File and folder transfer pipeline.
//!
//! Outbound, a file becomes a single [`Message::File`] carrying its whole
//! content base64-encoded; a folder is first rolled into one deflate zip
//! archive preserving paths relative to the folder root, then sent through
//! the same path. Inbound, payloads are decoded and persisted under the
//! sync folder with deterministic collision renaming, never overwriting.
//!
//! Archiving is a blocking, whole-in-memory step by design; it hides
//! behind the same message-producing interface so a streaming
//! implementation could replace it without touching the protocol.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::error::{Error, Result};
use crate::protocol::Message;

/// Fallback name for received files whose name has no usable component.
const FALLBACK_FILE_NAME: &str = "received.bin";

/// Build a `file` message from a file on disk.
///
/// Reads the whole file into memory and base64-encodes it.
///
/// # Errors
///
/// Returns [`Error::FileUnreadable`] if the path does not exist or cannot
/// be opened.
pub async fn file_message(path: &Path) -> Result<Message> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| Error::FileUnreadable(format!("{}: {e}", path.display())))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string();

    tracing::debug!("encoded file '{}' ({} bytes)", name, content.len());

    Ok(Message::File {
        name,
        size: content.len() as u64,
        data: BASE64_STANDARD.encode(&content),
    })
}

/// Build a `file` message from a folder, archiving it first.
///
/// The archive is named `<folder>.zip`, built in a private temporary
/// directory that is removed on every exit path, success or failure.
///
/// # Errors
///
/// Returns [`Error::Archive`] if the walk or the zip write fails, or
/// [`Error::FileUnreadable`] if the finished archive cannot be read back.
pub async fn folder_message(path: &Path) -> Result<Message> {
    let temp = tempfile::tempdir().map_err(|e| Error::Archive(e.to_string()))?;
    folder_message_in(path, temp.path()).await
    // `temp` dropped here removes the archive no matter how we exited
}

/// Archive `path` into a zip under `temp_root` and encode it as a message.
///
/// Split out from [`folder_message`] so tests can observe the temporary
/// directory.
pub(crate) async fn folder_message_in(path: &Path, temp_root: &Path) -> Result<Message> {
    let folder_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("folder")
        .to_string();

    let archive_path = temp_root.join(format!("{folder_name}.zip"));
    archive_folder(path, &archive_path).await?;
    file_message(&archive_path).await
}

/// Create a zip archive of `src` at `dest`, preserving relative paths.
///
/// # Errors
///
/// Returns [`Error::Archive`] if `src` is not a directory or archiving
/// fails.
pub async fn archive_folder(src: &Path, dest: &Path) -> Result<()> {
    if !src.is_dir() {
        return Err(Error::Archive(format!(
            "'{}' is not a directory",
            src.display()
        )));
    }

    let src = src.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&dest).map_err(|e| Error::Archive(e.to_string()))?;
        let mut zip = zip::ZipWriter::new(file);

        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for entry in walkdir::WalkDir::new(&src) {
            let entry = entry.map_err(|e| Error::Archive(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&src)
                .map_err(|e| Error::Archive(e.to_string()))?;
            let name = relative.to_string_lossy().replace('\\', "/");

            zip.start_file(&name, options)
                .map_err(|e| Error::Archive(e.to_string()))?;
            let mut f =
                std::fs::File::open(entry.path()).map_err(|e| Error::Archive(e.to_string()))?;
            std::io::copy(&mut f, &mut zip).map_err(|e| Error::Archive(e.to_string()))?;
        }

        zip.finish()
            .and_then(|mut f| f.flush().map_err(Into::into))
            .map_err(|e| Error::Archive(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(format!("archive task panicked: {e}")))?
}

/// Persist a received file payload under the sync folder.
///
/// The incoming name is reduced to its final path component, so a peer
/// cannot write outside the sync folder. Name collisions resolve to
/// `{base}_{n}{ext}` with `n` counting up from 1; existing files are
/// never overwritten. The check-then-write sequence is not atomic, which
/// is acceptable because a single receive loop serializes all transfers.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is not valid base64, or an
/// I/O error if the write fails.
///
/// Returns the resolved file name on success.
pub async fn receive_file(sync_folder: &Path, name: &str, data: &str) -> Result<String> {
    let content = BASE64_STANDARD
        .decode(data)
        .map_err(|e| Error::Decode(e.to_string()))?;

    tokio::fs::create_dir_all(sync_folder).await?;

    let destination = resolve_collision(sync_folder, name);
    tokio::fs::write(&destination, &content).await?;

    let resolved = destination
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string();

    tracing::info!("received '{}' ({} bytes)", resolved, content.len());
    Ok(resolved)
}

/// Pick a destination path under `dir` that does not collide.
///
/// `name` is sanitized to its final component first. If `dir/name`
/// exists, tries `{base}_1{ext}`, `{base}_2{ext}`, ... until a free name
/// is found.
#[must_use]
pub fn resolve_collision(dir: &Path, name: &str) -> PathBuf {
    let safe_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_FILE_NAME);

    let candidate = dir.join(safe_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = Path::new(safe_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(safe_name);
    let ext = Path::new(safe_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn file_message_carries_name_size_and_content() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"meeting at noon").expect("write");

        let message = file_message(&path).await.expect("file message");
        match message {
            Message::File { name, size, data } => {
                assert_eq!(name, "notes.txt");
                assert_eq!(size, 15);
                assert_eq!(BASE64_STANDARD.decode(data).unwrap(), b"meeting at noon");
            }
            other => panic!("expected file message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = TempDir::new().expect("temp dir");
        let result = file_message(&dir.path().join("nope.txt")).await;
        assert!(matches!(result, Err(Error::FileUnreadable(_))));
    }

    #[tokio::test]
    async fn receive_roundtrips_sent_content() {
        let src_dir = TempDir::new().expect("temp dir");
        let sync_dir = TempDir::new().expect("temp dir");
        let path = src_dir.path().join("photo.jpg");
        let content: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).expect("write");

        let Message::File { name, data, .. } = file_message(&path).await.expect("message") else {
            panic!("expected file message");
        };

        let resolved = receive_file(sync_dir.path(), &name, &data)
            .await
            .expect("receive");
        assert_eq!(resolved, "photo.jpg");
        assert_eq!(
            std::fs::read(sync_dir.path().join("photo.jpg")).unwrap(),
            content
        );
    }

    #[tokio::test]
    async fn invalid_base64_is_decode_error() {
        let sync_dir = TempDir::new().expect("temp dir");
        let result = receive_file(sync_dir.path(), "x.bin", "not/base64!!").await;
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn collisions_rename_and_never_overwrite() {
        let sync_dir = TempDir::new().expect("temp dir");
        std::fs::write(sync_dir.path().join("report.pdf"), b"original").expect("write");

        let payload = BASE64_STANDARD.encode(b"incoming");
        let first = receive_file(sync_dir.path(), "report.pdf", &payload)
            .await
            .expect("receive");
        assert_eq!(first, "report_1.pdf");

        let second = receive_file(sync_dir.path(), "report.pdf", &payload)
            .await
            .expect("receive");
        assert_eq!(second, "report_2.pdf");

        assert_eq!(
            std::fs::read(sync_dir.path().join("report.pdf")).unwrap(),
            b"original"
        );
    }

    #[test]
    fn collision_resolution_without_extension() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("Makefile"), b"x").expect("write");
        let resolved = resolve_collision(dir.path(), "Makefile");
        assert_eq!(resolved, dir.path().join("Makefile_1"));
    }

    #[test]
    fn traversal_components_are_stripped() {
        let dir = TempDir::new().expect("temp dir");
        let resolved = resolve_collision(dir.path(), "../../etc/passwd");
        assert_eq!(resolved, dir.path().join("passwd"));
    }

    #[tokio::test]
    async fn folder_archive_preserves_relative_paths() {
        let folder = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(folder.path().join("a")).expect("mkdir");
        std::fs::create_dir_all(folder.path().join("b")).expect("mkdir");
        std::fs::write(folder.path().join("a/x.txt"), b"alpha").expect("write");
        std::fs::write(folder.path().join("b/y.txt"), b"beta").expect("write");

        let message = folder_message(folder.path()).await.expect("folder message");
        let Message::File { name, data, .. } = message else {
            panic!("expected file message");
        };
        assert!(name.ends_with(".zip"));

        let bytes = BASE64_STANDARD.decode(data).expect("decode");
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("open archive");

        let mut alpha = String::new();
        archive
            .by_name("a/x.txt")
            .expect("entry a/x.txt")
            .read_to_string(&mut alpha)
            .expect("read");
        assert_eq!(alpha, "alpha");

        let mut beta = String::new();
        archive
            .by_name("b/y.txt")
            .expect("entry b/y.txt")
            .read_to_string(&mut beta)
            .expect("read");
        assert_eq!(beta, "beta");
    }

    #[tokio::test]
    async fn archive_temp_dir_is_left_empty() {
        let folder = TempDir::new().expect("temp dir");
        std::fs::write(folder.path().join("f.txt"), b"data").expect("write");
        let temp_root = TempDir::new().expect("temp dir");

        folder_message_in(folder.path(), temp_root.path())
            .await
            .expect("folder message");

        // The archive itself stays until the caller drops its temp dir;
        // folder_message owns that drop. Here we only verify nothing else
        // leaked beside the archive.
        let entries: Vec<_> = std::fs::read_dir(temp_root.path())
            .expect("read dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn archiving_a_file_path_fails() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"x").expect("write");

        let result = archive_folder(&path, &dir.path().join("out.zip")).await;
        assert!(matches!(result, Err(Error::Archive(_))));
    }
}
