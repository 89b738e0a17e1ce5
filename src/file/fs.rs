//! Operating system primitives used by the file writer.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
};

/// Status of a file, as far as the writer is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    /// Permission bits, plus the file type bits on Unix.
    pub mode: u32,
}

/// The file system operations the writer performs.
///
/// [`OsFileSystem`] is the real implementation; others can be substituted,
/// e.g. to inject failures in tests.
pub trait FileSystem {
    type File: io::Write;

    /// Opens `path` read-write, creating it with `mode` if missing, without
    /// following a symbolic link in last position.
    fn open_nofollow(&self, path: &Path, mode: u32) -> io::Result<Self::File>;
    /// Creates `path` read-write with `mode`, failing if it exists.
    fn create_new(&self, path: &Path, mode: u32) -> io::Result<Self::File>;
    /// Follows symbolic links.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
    /// Does not follow a symbolic link in last position.
    fn lstat(&self, path: &Path) -> io::Result<FileStat>;
    fn set_mode(&self, file: &Self::File, mode: u32) -> io::Result<()>;
    /// Truncates the file to zero length.
    fn truncate(&self, file: &Self::File) -> io::Result<()>;
    fn fsync(&self, file: &Self::File) -> io::Result<()>;
    /// Closes the file, reporting the close error if any.
    fn close(&self, file: Self::File) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn unlink(&self, path: &Path) -> io::Result<()>;
    /// Flushes the directory entries of `dir` to storage.
    fn fsync_dir(&self, dir: &Path) -> io::Result<()>;
}

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

fn to_stat(metadata: &fs::Metadata) -> FileStat {
    #[cfg(unix)]
    let mode = std::os::unix::fs::MetadataExt::mode(metadata);
    #[cfg(not(unix))]
    let mode = if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    };
    FileStat {
        size: metadata.len(),
        mode,
    }
}

impl FileSystem for OsFileSystem {
    type File = File;

    fn open_nofollow(&self, path: &Path, mode: u32) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options
                .mode(mode)
                .custom_flags(libc::O_NOFOLLOW | libc::O_CLOEXEC);
        }
        #[cfg(not(unix))]
        let _ = mode;
        options.open(path)
    }

    fn create_new(&self, path: &Path, mode: u32) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode).custom_flags(libc::O_CLOEXEC);
        }
        #[cfg(not(unix))]
        let _ = mode;
        options.open(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        fs::metadata(path).map(|metadata| to_stat(&metadata))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStat> {
        fs::symlink_metadata(path).map(|metadata| to_stat(&metadata))
    }

    fn set_mode(&self, file: &File, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
        }
        #[cfg(not(unix))]
        {
            let mut permissions = file.metadata()?.permissions();
            permissions.set_readonly(mode & 0o222 == 0);
            file.set_permissions(permissions)
        }
    }

    fn truncate(&self, file: &File) -> io::Result<()> {
        file.set_len(0)
    }

    fn fsync(&self, file: &File) -> io::Result<()> {
        file.sync_all()
    }

    fn close(&self, file: File) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::io::IntoRawFd;
            let fd = file.into_raw_fd();
            // SAFETY: `fd` is owned, and not used after this call
            if unsafe { libc::close(fd) } != 0 {
                let err = io::Error::last_os_error();
                // the descriptor is released even when interrupted
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            drop(file);
            Ok(())
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn fsync_dir(&self, dir: &Path) -> io::Result<()> {
        File::open(dir)?.sync_all()
    }
}

/// Returns `true` if opening with `O_NOFOLLOW` failed because the path is a symbolic link.
pub(crate) fn is_symlink_error(err: &io::Error) -> bool {
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))] {
            err.raw_os_error() == Some(libc::EMLINK)
        } else if #[cfg(target_os = "netbsd")] {
            err.raw_os_error() == Some(libc::EFTYPE)
        } else if #[cfg(unix)] {
            err.raw_os_error() == Some(libc::ELOOP)
        } else {
            let _ = err;
            false
        }
    }
}
