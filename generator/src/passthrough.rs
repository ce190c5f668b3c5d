use std::{fs, path::Path};

use anyhow::Context as _;

use crate::config::Passthrough;

/// Copy every passthrough entry from `in_dir` to `out_dir`.
/// Returns the number of files copied. Missing sources are skipped.
pub fn copy_all(
    entries: &[Passthrough],
    in_dir: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
) -> anyhow::Result<usize> {
    let in_dir = in_dir.as_ref();
    let out_dir = out_dir.as_ref();

    let mut copied = 0;

    for entry in entries {
        let src = in_dir.join(entry.from());
        let dst = out_dir.join(entry.to());

        if !src.try_exists()? {
            log::warn!("passthrough source not found, skip: {}", src.display());
            continue;
        }

        log::info!("copy: {} -> {}", entry.from().display(), entry.to().display());

        let res = if src.is_dir() {
            copy_dir(&src, &dst)
        } else {
            copy_file(&src, &dst)
        };
        copied += res.with_context(|| format!("failed to copy {}", src.display()))?;
    }

    Ok(copied)
}

fn copy_dir(source_dir: &Path, dest_dir: &Path) -> std::io::Result<usize> {
    let mut copied = 0;

    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;
        let ty = entry.file_type()?;

        if ty.is_dir() {
            copied += copy_dir(&entry.path(), &dest_dir.join(entry.file_name()))?;
        } else {
            copied += copy_file(&entry.path(), &dest_dir.join(entry.file_name()))?;
        }
    }

    Ok(copied)
}

fn copy_file(src: &Path, dst: &Path) -> std::io::Result<usize> {
    // only create dir when needed
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(1)
}
