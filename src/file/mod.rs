//! Crash-consistent file writes.
//!
//! [`set_contents_full`] replaces the contents of a file, with guarantees
//! chosen by [`SetContentsFlags`]:
//!
//! - without [`CONSISTENT`](SetContentsFlags::CONSISTENT), the file is
//!   truncated and written in place: a failure or a crash midway leaves it
//!   partially written;
//! - with it, the contents are written to a temporary file in the same
//!   directory, which is then renamed over the target: readers see either the
//!   old or the new contents, and a failure leaves the target untouched;
//! - [`DURABLE`](SetContentsFlags::DURABLE) adds `fsync` calls, so the new
//!   contents survive a crash right after the call returns;
//! - [`ONLY_EXISTING`](SetContentsFlags::ONLY_EXISTING) skips `fsync` when the
//!   target is missing or empty, as there is nothing to lose.

use std::{
    borrow::ToOwned,
    fmt,
    format,
    fs::File,
    io::{self, Read, Write},
    ops::BitOr,
    path::{Path, PathBuf},
};

use crate::{
    byte_array::ByteArray,
    error::{FileError, FileErrorKind},
    growth::MAX_ELEMENTS,
    macros::{debug, trace, warn},
};

mod fs;
mod tmp;

pub use self::fs::{FileStat, FileSystem, OsFileSystem};
use self::{
    fs::is_symlink_error,
    tmp::{create_temp, Template},
};

/// Guarantees requested from [`set_contents_full`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SetContentsFlags(u8);

impl SetContentsFlags {
    /// Write in place, without `fsync`.
    pub const NONE: Self = Self(0);
    /// Write to a temporary file and rename it over the target.
    pub const CONSISTENT: Self = Self(1 << 0);
    /// `fsync` the written data, and the directory after a rename.
    pub const DURABLE: Self = Self(1 << 1);
    /// Only `fsync` if the target exists and is not empty.
    pub const ONLY_EXISTING: Self = Self(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if all flags of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for SetContentsFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SetContentsFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::CONSISTENT, "CONSISTENT"),
            (Self::DURABLE, "DURABLE"),
            (Self::ONLY_EXISTING, "ONLY_EXISTING"),
        ];
        let mut set = names.iter().filter(|(flag, _)| self.contains(*flag));
        match set.next() {
            None => f.write_str("NONE"),
            Some((_, first)) => {
                f.write_str(first)?;
                set.try_for_each(|(_, name)| write!(f, " | {name}"))
            }
        }
    }
}

/// Default creation mode of [`set_contents`], before the umask.
pub const DEFAULT_MODE: u32 = 0o666;

/// Replaces the contents of `path` consistently, with `fsync` only if the
/// file already holds data.
pub fn set_contents(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), FileError> {
    set_contents_full(
        path,
        contents,
        SetContentsFlags::CONSISTENT | SetContentsFlags::ONLY_EXISTING,
        DEFAULT_MODE,
    )
}

/// Replaces the contents of `path`; `mode` is used when the file is created.
///
/// ```rust
/// use arc_array::file::{get_contents, set_contents_full, SetContentsFlags};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("settings.ini");
/// let flags = SetContentsFlags::CONSISTENT | SetContentsFlags::DURABLE;
/// set_contents_full(&path, b"[main]\n", flags, 0o600).unwrap();
/// assert_eq!(get_contents(&path).unwrap(), b"[main]\n");
/// ```
pub fn set_contents_full(
    path: impl AsRef<Path>,
    contents: &[u8],
    flags: SetContentsFlags,
    mode: u32,
) -> Result<(), FileError> {
    set_contents_with(&OsFileSystem, path.as_ref(), contents, flags, mode)
}

/// [`set_contents_full`] over the given file system.
pub fn set_contents_with<F: FileSystem>(
    fs: &F,
    path: &Path,
    contents: &[u8],
    flags: SetContentsFlags,
    mode: u32,
) -> Result<(), FileError> {
    if flags.contains(SetContentsFlags::CONSISTENT) {
        set_contents_consistent(fs, path, contents, flags, mode)
    } else {
        set_contents_direct(fs, path, contents, flags, mode)
    }
}

fn set_contents_consistent<F: FileSystem>(
    fs: &F,
    path: &Path,
    contents: &[u8],
    flags: SetContentsFlags,
    mode: u32,
) -> Result<(), FileError> {
    let template_path = temp_template(path);
    let template = Template::parse(&template_path).map_err(|err| create_error(&template_path, err))?;
    let (tmp_path, file) = create_temp(fs, &template, mode);
    let file = file.map_err(|err| create_error(&tmp_path, err))?;
    debug!(path = %path.display(), tmp_path = %tmp_path.display(), ?flags, "writing through temporary file");
    let res = replace_with(fs, path, &tmp_path, file, contents, flags);
    if res.is_err() {
        if let Err(_err) = fs.unlink(&tmp_path) {
            warn!(tmp_path = %tmp_path.display(), error = %_err, "failed to remove temporary file");
        }
    }
    res
}

fn temp_template(path: &Path) -> PathBuf {
    let mut template = path.as_os_str().to_owned();
    template.push(".XXXXXX");
    template.into()
}

fn create_error(path: &Path, err: io::Error) -> FileError {
    FileError::from_io(
        format!("Failed to create file “{}”: {err}", path.display()),
        err,
    )
}

fn replace_with<F: FileSystem>(
    fs: &F,
    path: &Path,
    tmp_path: &Path,
    file: F::File,
    contents: &[u8],
    flags: SetContentsFlags,
) -> Result<(), FileError> {
    if let Ok(old) = fs.stat(path) {
        fs.set_mode(&file, old.mode).map_err(|err| {
            FileError::from_io(
                format!("Failed to set permissions of “{}”: {err}", tmp_path.display()),
                err,
            )
        })?;
    }
    let do_fsync = should_fsync(fs, path, flags);
    write_to_file(fs, file, contents, tmp_path, do_fsync)?;
    fs.rename(tmp_path, path).map_err(|err| {
        FileError::from_io(
            format!(
                "Failed to rename file “{}” to “{}”: rename() failed: {err}",
                tmp_path.display(),
                path.display()
            ),
            err,
        )
    })?;
    if do_fsync && flags.contains(SetContentsFlags::DURABLE) {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // the contents are already in place, a failure here is not reported
        if let Err(_err) = fs.fsync_dir(dir) {
            debug!(dir = %dir.display(), error = %_err, "directory fsync failed");
        }
    }
    Ok(())
}

fn set_contents_direct<F: FileSystem>(
    fs: &F,
    path: &Path,
    contents: &[u8],
    flags: SetContentsFlags,
    mode: u32,
) -> Result<(), FileError> {
    let file = match fs.open_nofollow(path, mode) {
        Ok(file) => file,
        Err(err) if is_symlink_error(&err) => {
            debug!(path = %path.display(), "target is a symbolic link, writing consistently");
            return set_contents_with(fs, path, contents, flags | SetContentsFlags::CONSISTENT, mode);
        }
        Err(err) => {
            return Err(FileError::from_io(
                format!("Failed to open file “{}”: {err}", path.display()),
                err,
            ))
        }
    };
    let do_fsync = should_fsync(fs, path, flags);
    debug!(path = %path.display(), ?flags, do_fsync, "writing in place");
    retry_interrupted(|| fs.truncate(&file)).map_err(|err| write_error(path, "ftruncate", err))?;
    write_to_file(fs, file, contents, path, do_fsync)
}

/// Decides whether the written data must be flushed before the call returns.
fn should_fsync<F: FileSystem>(fs: &F, path: &Path, flags: SetContentsFlags) -> bool {
    if !flags.intersects(SetContentsFlags::CONSISTENT | SetContentsFlags::DURABLE) {
        return false;
    }
    if !flags.contains(SetContentsFlags::ONLY_EXISTING) {
        return true;
    }
    match fs.lstat(path) {
        Ok(stat) => stat.size > 0,
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(_) => true,
    }
}

fn retry_interrupted<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                trace!("interrupted, retrying");
            }
            res => return res,
        }
    }
}

fn write_error(path: &Path, call: &str, err: io::Error) -> FileError {
    FileError::from_io(
        format!("Failed to write file “{}”: {call}() failed: {err}", path.display()),
        err,
    )
}

/// Writes all of `contents`, optionally `fsync`s, and closes the file.
fn write_to_file<F: FileSystem>(
    fs: &F,
    mut file: F::File,
    contents: &[u8],
    path: &Path,
    do_fsync: bool,
) -> Result<(), FileError> {
    let mut remaining = contents;
    while !remaining.is_empty() {
        match retry_interrupted(|| file.write(remaining)) {
            Ok(0) => return Err(write_error(path, "write", io::ErrorKind::WriteZero.into())),
            Ok(written) => remaining = &remaining[written..],
            Err(err) => return Err(write_error(path, "write", err)),
        }
    }
    if do_fsync {
        fs.fsync(&file)
            .map_err(|err| write_error(path, "fsync", err))?;
    }
    fs.close(file)
        .map_err(|err| write_error(path, "close", err))
}

/// Reads the whole contents of `path`.
pub fn get_contents(path: impl AsRef<Path>) -> Result<ByteArray, FileError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|err| {
        FileError::from_io(format!("Failed to open file “{}”: {err}", path.display()), err)
    })?;
    let too_large = || {
        FileError::new(
            FileErrorKind::Failed,
            format!("File “{}” is too large", path.display()),
            io::Error::new(io::ErrorKind::Other, "file too large"),
        )
    };
    let read_error = |err: io::Error| {
        FileError::from_io(
            format!("Failed to read from file “{}”: {err}", path.display()),
            err,
        )
    };
    let size = file
        .metadata()
        .map_err(|err| {
            FileError::from_io(
                format!(
                    "Failed to get attributes of file “{}”: fstat() failed: {err}",
                    path.display()
                ),
                err,
            )
        })?
        .len();
    let limit = MAX_ELEMENTS as u64;
    if size > limit {
        return Err(too_large());
    }
    let mut contents = ByteArray::sized_new(size as usize);
    io::copy(&mut (&mut file).take(limit), &mut contents).map_err(read_error)?;
    if contents.len() as u64 == limit
        && retry_interrupted(|| file.read(&mut [0])).map_err(read_error)? != 0
    {
        return Err(too_large());
    }
    Ok(contents)
}

/// Creates a new file from `template`, whose last `XXXXXX` is replaced to
/// form a name that does not exist yet.
///
/// Up to 100 names are tried. The names are predictable: this is not a
/// secure temporary file facility.
pub fn mkstemp_full(template: impl AsRef<Path>, mode: u32) -> Result<(PathBuf, File), FileError> {
    let template_path = template.as_ref();
    let template = Template::parse(template_path).map_err(|err| create_error(template_path, err))?;
    let (path, file) = create_temp(&OsFileSystem, &template, mode);
    match file {
        Ok(file) => Ok((path, file)),
        Err(err) => Err(create_error(&path, err)),
    }
}
