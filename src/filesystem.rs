//! On-disk component tree helpers
//!
//! Components live as plain directories under the work directory. The local
//! SCM handler copies them in, the templating engine duplicates them, and
//! the finder probes them; the shared primitives are here.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Kind of filesystem entry a search expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    /// True if `path` exists and is of this kind.
    pub fn matches(self, path: &Path) -> bool {
        match self {
            PathKind::File => path.is_file(),
            PathKind::Directory => path.is_dir(),
        }
    }
}

/// Recursively copies `src` into `dst`, preserving file permissions.
///
/// `dst` is created if missing. When `skip_git` is set, `.git` directories
/// are left behind. When `dst` lies inside `src`, the directory holding it
/// is left out, so a tree is never copied into itself.
pub fn copy_tree(src: &Path, dst: &Path, skip_git: bool) -> Result<usize> {
    if !src.is_dir() {
        return Err(Error::Filesystem {
            message: format!("{} is not a directory", src.display()),
        });
    }
    let src = src.canonicalize()?;
    fs::create_dir_all(dst)?;
    let dst = dst.canonicalize()?;
    if dst == src {
        return Err(Error::Filesystem {
            message: format!("cannot copy {} onto itself", src.display()),
        });
    }

    let mut copied = 0;
    let walker = WalkDir::new(&src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            !dst.starts_with(entry.path()) && !(skip_git && entry.file_name() == ".git")
        });
    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(&src)
            .map_err(|e| Error::Filesystem {
                message: format!("{}: {}", entry.path().display(), e),
            })?;
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            fs::set_permissions(&target, entry.metadata()?.permissions())?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            // fs::copy carries the permission bits over.
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        }
    }
    debug!(
        "Copied {} files from {} to {}",
        copied,
        src.display(),
        dst.display()
    );
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}

/// Removes `path` and everything below it; a missing path is not an error.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Filesystem {
            message: format!("cannot remove {}: {}", path.display(), e),
        }),
    }
}

/// Lists the files below `root`, as paths relative to it, sorted.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}
