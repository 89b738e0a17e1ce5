//! The errors.

use std::{fmt, io, string::String};

/// Portable classification of a file operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileErrorKind {
    /// The file already exists.
    Exist,
    /// The file is a directory, and a regular file was expected.
    IsDirectory,
    /// Permission denied.
    PermissionDenied,
    /// The file name is too long.
    NameTooLong,
    /// The file does not exist.
    NotFound,
    /// A path component is not a directory.
    NotDirectory,
    /// No such device or address.
    NoDeviceOrAddress,
    /// The device does not support the operation.
    NoDevice,
    /// The file system is read-only.
    ReadOnlyFilesystem,
    /// The file is an executable being run.
    TextFileBusy,
    /// A pointer to memory outside the process was passed.
    BadAddress,
    /// Too many levels of symbolic links.
    TooManySymlinks,
    /// No space left on device.
    NoSpace,
    /// Out of memory.
    OutOfMemory,
    /// The process has too many open files.
    TooManyOpenFiles,
    /// The system has too many open files.
    TooManyOpenFilesInSystem,
    /// Bad file descriptor.
    BadDescriptor,
    /// Invalid argument.
    InvalidArgument,
    /// Broken pipe.
    BrokenPipe,
    /// Resource temporarily unavailable.
    WouldBlock,
    /// Interrupted system call.
    Interrupted,
    /// Input/output error.
    Io,
    /// Operation not permitted.
    NotPermitted,
    /// Function not implemented.
    NotImplemented,
    /// Any other failure.
    Failed,
}

impl FileErrorKind {
    /// Classifies an OS error code; unknown codes are [`Failed`](Self::Failed).
    #[cfg(unix)]
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::EEXIST => Self::Exist,
            libc::EISDIR => Self::IsDirectory,
            libc::EACCES => Self::PermissionDenied,
            libc::ENAMETOOLONG => Self::NameTooLong,
            libc::ENOENT => Self::NotFound,
            libc::ENOTDIR => Self::NotDirectory,
            libc::ENXIO => Self::NoDeviceOrAddress,
            libc::ENODEV => Self::NoDevice,
            libc::EROFS => Self::ReadOnlyFilesystem,
            libc::ETXTBSY => Self::TextFileBusy,
            libc::EFAULT => Self::BadAddress,
            libc::ELOOP => Self::TooManySymlinks,
            libc::ENOSPC => Self::NoSpace,
            libc::ENOMEM => Self::OutOfMemory,
            libc::EMFILE => Self::TooManyOpenFiles,
            libc::ENFILE => Self::TooManyOpenFilesInSystem,
            libc::EBADF => Self::BadDescriptor,
            libc::EINVAL => Self::InvalidArgument,
            libc::EPIPE => Self::BrokenPipe,
            libc::EAGAIN => Self::WouldBlock,
            libc::EINTR => Self::Interrupted,
            libc::EIO => Self::Io,
            libc::EPERM => Self::NotPermitted,
            libc::ENOSYS => Self::NotImplemented,
            _ => Self::Failed,
        }
    }

    fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::AlreadyExists => Self::Exist,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::InvalidInput => Self::InvalidArgument,
            io::ErrorKind::BrokenPipe => Self::BrokenPipe,
            io::ErrorKind::WouldBlock => Self::WouldBlock,
            io::ErrorKind::Interrupted => Self::Interrupted,
            io::ErrorKind::OutOfMemory => Self::OutOfMemory,
            io::ErrorKind::Unsupported => Self::NotImplemented,
            _ => Self::Failed,
        }
    }
}

impl From<&io::Error> for FileErrorKind {
    fn from(err: &io::Error) -> Self {
        #[cfg(unix)]
        if let Some(errno) = err.raw_os_error() {
            return Self::from_errno(errno);
        }
        Self::from_io_kind(err.kind())
    }
}

impl fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exist => "file exists",
            Self::IsDirectory => "is a directory",
            Self::PermissionDenied => "permission denied",
            Self::NameTooLong => "file name too long",
            Self::NotFound => "no such file or directory",
            Self::NotDirectory => "not a directory",
            Self::NoDeviceOrAddress => "no such device or address",
            Self::NoDevice => "no such device",
            Self::ReadOnlyFilesystem => "read-only file system",
            Self::TextFileBusy => "text file busy",
            Self::BadAddress => "bad address",
            Self::TooManySymlinks => "too many levels of symbolic links",
            Self::NoSpace => "no space left on device",
            Self::OutOfMemory => "out of memory",
            Self::TooManyOpenFiles => "too many open files",
            Self::TooManyOpenFilesInSystem => "too many open files in system",
            Self::BadDescriptor => "bad file descriptor",
            Self::InvalidArgument => "invalid argument",
            Self::BrokenPipe => "broken pipe",
            Self::WouldBlock => "resource temporarily unavailable",
            Self::Interrupted => "interrupted system call",
            Self::Io => "input/output error",
            Self::NotPermitted => "operation not permitted",
            Self::NotImplemented => "function not implemented",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A failed file operation.
///
/// The message names the file and the failing step, followed by the OS error text.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct FileError {
    kind: FileErrorKind,
    message: String,
    #[source]
    source: io::Error,
}

impl FileError {
    pub fn new(kind: FileErrorKind, message: impl Into<String>, source: io::Error) -> Self {
        Self {
            kind,
            message: message.into(),
            source,
        }
    }

    pub(crate) fn from_io(message: String, source: io::Error) -> Self {
        Self::new(FileErrorKind::from(&source), message, source)
    }

    pub fn kind(&self) -> FileErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn io_error(&self) -> &io::Error {
        &self.source
    }

    pub fn into_io_error(self) -> io::Error {
        self.source
    }
}

impl From<FileError> for io::Error {
    fn from(err: FileError) -> Self {
        io::Error::new(err.source.kind(), err)
    }
}
