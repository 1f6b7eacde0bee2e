//! Filesystem helpers for moving staged files into the store.
//!
//! Staging directories may live on a different filesystem than the output
//! directories, so a plain rename can fail with EXDEV.

use std::path::Path;
use tokio::fs;

use crate::error::StorageResult;

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first. On EXDEV it copies into a sibling of `dst` and
/// renames that into place, so readers of `dst` never see a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StorageResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> StorageResult<()> {
    let tmp_dst = partial_path(dst);

    if let Err(e) = fs::copy(src, &tmp_dst).await {
        tracing::error!(
            "Failed to copy during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Hidden sibling path (`.{name}.part`) used while a file is being written.
pub(crate) fn partial_path(dst: &Path) -> std::path::PathBuf {
    let mut name = std::ffi::OsString::from(".");
    if let Some(file_name) = dst.file_name() {
        name.push(file_name);
    }
    name.push(".part");
    dst.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("out").join("dest.mp4");

        fs::write(&src, b"variant").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"variant");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("dest.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.png");
        let dst = dir.path().join("b.png");
        fs::write(&src, b"png").await.unwrap();

        copy_and_delete(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(!partial_path(&dst).exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"png");
    }

    #[test]
    fn test_partial_path_is_hidden() {
        let partial = partial_path(Path::new("/out/cover.part"));
        assert_eq!(partial, Path::new("/out/.cover.part.part"));
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
