use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// Copy a single file, keeping its permissions and modification time
///
/// Source permissions are applied last, so read-only sources copy cleanly. An
/// existing destination is replaced rather than truncated in place.
pub async fn copy_file_preserving(src: &Path, dest: &Path) -> Result<u64> {
    let copy_context = || format!("Failed to copy {} to {}", src.display(), dest.display());

    let mut source = fs::File::open(src).await.with_context(copy_context)?;
    let metadata = source
        .metadata()
        .await
        .with_context(|| format!("Failed to read metadata of {}", src.display()))?;
    let modified = metadata
        .modified()
        .with_context(|| format!("Failed to read modification time of {}", src.display()))?;

    match fs::remove_file(dest).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to replace existing {}", dest.display()));
        }
    }

    let mut target = fs::File::create(dest).await.with_context(copy_context)?;
    let bytes = tokio::io::copy(&mut source, &mut target)
        .await
        .with_context(copy_context)?;
    target.flush().await.with_context(copy_context)?;

    let target = target.into_std().await;
    target
        .set_modified(modified)
        .with_context(|| format!("Failed to set modification time on {}", dest.display()))?;
    target
        .set_permissions(metadata.permissions())
        .with_context(|| format!("Failed to set permissions on {}", dest.display()))?;

    Ok(bytes)
}

/// Copy the contents of `src` into `dest`, creating directories as needed
///
/// Existing files at the destination are overwritten. Returns the number of
/// files copied.
pub async fn copy_tree_to(src: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest)
        .await
        .with_context(|| format!("Failed to create directory {}", dest.display()))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .context("Walked entry outside of source tree")?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .await
                .with_context(|| format!("Failed to create directory {}", target.display()))?;
        } else {
            copy_file_preserving(entry.path(), &target).await?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Turn a path written with either `/` or `\` into a platform path
pub fn normalize_separators(path: &str) -> PathBuf {
    let native = std::path::MAIN_SEPARATOR_STR;
    PathBuf::from(path.replace(['/', '\\'], native))
}

/// List every file under `root`, skipping entries that cannot be read
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}
