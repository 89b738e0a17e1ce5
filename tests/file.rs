#![cfg(feature = "std")]

use std::{
    cell::{Cell, RefCell},
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use arc_array::{
    error::FileErrorKind,
    file::{
        get_contents, mkstemp_full, set_contents, set_contents_full, set_contents_with, FileStat,
        FileSystem, OsFileSystem, SetContentsFlags,
    },
};

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn consistent_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.txt");
    set_contents(&path, b"hello").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"hello");
    set_contents(&path, b"world, again").unwrap();
    assert_eq!(get_contents(&path).unwrap(), b"world, again");
    assert_eq!(entries(dir.path()), ["hello.txt"]);
}

#[test]
fn direct_write_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");
    fs::write(&path, b"a much longer previous content").unwrap();
    set_contents_full(&path, b"short", SetContentsFlags::NONE, 0o644).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"short");
    set_contents_full(&path, b"", SetContentsFlags::DURABLE, 0o644).unwrap();
    assert!(fs::read(&path).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn consistent_write_keeps_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret");
    fs::write(&path, b"old").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
    let flags = SetContentsFlags::CONSISTENT | SetContentsFlags::DURABLE;
    set_contents_full(&path, b"new", flags, 0o666).unwrap();
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn direct_write_to_symlink_replaces_link() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    let link = dir.path().join("link");
    fs::write(&target, b"target").unwrap();
    std::os::unix::fs::symlink(&target, &link).unwrap();
    set_contents_full(&link, b"replaced", SetContentsFlags::NONE, 0o644).unwrap();
    // the write falls back to rename, which replaces the link itself
    assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read(&link).unwrap(), b"replaced");
    assert_eq!(fs::read(&target).unwrap(), b"target");
}

#[test]
fn open_error_reports_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("file");
    let err = set_contents_full(&path, b"x", SetContentsFlags::NONE, 0o644).unwrap_err();
    assert_eq!(err.kind(), FileErrorKind::NotFound);
    assert!(err.message().starts_with("Failed to open file “"), "{err}");
    let err = set_contents(&path, b"x").unwrap_err();
    assert_eq!(err.kind(), FileErrorKind::NotFound);
    assert!(err.message().starts_with("Failed to create file “"), "{err}");
    let err = get_contents(&path).unwrap_err();
    assert_eq!(err.kind(), FileErrorKind::NotFound);
}

#[test]
fn mkstemp_creates_unique_files() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("tmp-XXXXXX.log");
    let (first, _) = mkstemp_full(&template, 0o600).unwrap();
    let (second, _) = mkstemp_full(&template, 0o600).unwrap();
    assert_ne!(first, second);
    for path in [&first, &second] {
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tmp-") && name.ends_with(".log"), "{name}");
        assert!(!name.contains("XXXXXX"));
    }
    let err = mkstemp_full(dir.path().join("no-placeholder"), 0o600).unwrap_err();
    assert_eq!(err.kind(), FileErrorKind::InvalidArgument);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Write,
    Fsync,
    Close,
    Rename,
}

/// Real file system failing at a chosen step, recording the calls made.
#[derive(Debug)]
struct FailingFs {
    fail: Option<Step>,
    /// 1-based index of the `write` call that fails.
    failing_write: usize,
    writes: Cell<usize>,
    calls: RefCell<Vec<String>>,
}

impl FailingFs {
    fn new(fail: Option<Step>) -> Self {
        Self {
            fail,
            failing_write: 1,
            writes: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn failing_write(nth: usize) -> Self {
        Self {
            failing_write: nth,
            ..Self::new(Some(Step::Write))
        }
    }

    fn check(&self, step: Step) -> io::Result<()> {
        self.calls.borrow_mut().push(format!("{step:?}"));
        if step == Step::Write {
            self.writes.set(self.writes.get() + 1);
            if self.writes.get() != self.failing_write {
                return Ok(());
            }
        }
        if self.fail == Some(step) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        Ok(())
    }

    fn called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == name)
    }
}

struct FailingFile<'a> {
    file: File,
    fs: &'a FailingFs,
}

impl io::Write for FailingFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.fs.check(Step::Write)?;
        // short writes exercise the write loop
        let len = buf.len().min(3);
        self.file.write(&buf[..len])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl<'a> FileSystem for &'a FailingFs {
    type File = FailingFile<'a>;

    fn open_nofollow(&self, path: &Path, mode: u32) -> io::Result<Self::File> {
        let file = OsFileSystem.open_nofollow(path, mode)?;
        Ok(FailingFile { file, fs: *self })
    }

    fn create_new(&self, path: &Path, mode: u32) -> io::Result<Self::File> {
        let file = OsFileSystem.create_new(path, mode)?;
        Ok(FailingFile { file, fs: *self })
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        OsFileSystem.stat(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStat> {
        OsFileSystem.lstat(path)
    }

    fn set_mode(&self, file: &Self::File, mode: u32) -> io::Result<()> {
        OsFileSystem.set_mode(&file.file, mode)
    }

    fn truncate(&self, file: &Self::File) -> io::Result<()> {
        OsFileSystem.truncate(&file.file)
    }

    fn fsync(&self, file: &Self::File) -> io::Result<()> {
        self.check(Step::Fsync)?;
        OsFileSystem.fsync(&file.file)
    }

    fn close(&self, file: Self::File) -> io::Result<()> {
        self.check(Step::Close)?;
        OsFileSystem.close(file.file)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(Step::Rename)?;
        OsFileSystem.rename(from, to)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        self.calls.borrow_mut().push("Unlink".into());
        OsFileSystem.unlink(path)
    }

    fn fsync_dir(&self, dir: &Path) -> io::Result<()> {
        self.calls.borrow_mut().push("FsyncDir".into());
        OsFileSystem.fsync_dir(dir)
    }
}

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config");
    fs::write(&path, b"original").unwrap();
    (dir, path)
}

#[test]
fn consistent_failure_keeps_original() {
    let flags = SetContentsFlags::CONSISTENT | SetContentsFlags::DURABLE;
    for (step, call) in [
        (Step::Write, "write"),
        (Step::Fsync, "fsync"),
        (Step::Close, "close"),
    ] {
        let (dir, path) = setup();
        let failing = FailingFs::new(Some(step));
        let err = set_contents_with(&&failing, &path, b"replacement", flags, 0o644).unwrap_err();
        assert!(
            err.message()
                .contains(&format!("Failed to write file “{}", dir.path().display())),
            "{err}"
        );
        assert!(err.message().contains(&format!("{call}() failed")), "{err}");
        assert_eq!(err.kind(), FileErrorKind::Failed);
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert!(failing.called("Unlink"));
        assert_eq!(entries(dir.path()), ["config"]);
    }
    let (dir, path) = setup();
    let failing = FailingFs::new(Some(Step::Rename));
    let err = set_contents_with(&&failing, &path, b"replacement", flags, 0o644).unwrap_err();
    assert!(err.message().starts_with("Failed to rename file “"), "{err}");
    assert_eq!(fs::read(&path).unwrap(), b"original");
    assert_eq!(entries(dir.path()), ["config"]);
}

#[test]
fn direct_failure_leaves_partial_content() {
    let (_dir, path) = setup();
    let failing = FailingFs::new(Some(Step::Fsync));
    let err = set_contents_with(&&failing, &path, b"replacement", SetContentsFlags::DURABLE, 0o644)
        .unwrap_err();
    assert!(err.message().contains("fsync() failed"), "{err}");
    assert_eq!(fs::read(&path).unwrap(), b"replacement");
    assert!(!failing.called("Unlink"));
}

#[test]
fn fsync_follows_flags() {
    let (_dir, path) = setup();
    let failing = FailingFs::new(None);
    let flags = SetContentsFlags::CONSISTENT | SetContentsFlags::DURABLE;
    set_contents_with(&&failing, &path, b"durable", flags, 0o644).unwrap();
    assert!(failing.called("Fsync"));
    assert!(failing.called("FsyncDir"));

    let failing = FailingFs::new(None);
    set_contents_with(&&failing, &path, b"consistent", SetContentsFlags::CONSISTENT, 0o644).unwrap();
    assert!(failing.called("Fsync"));
    assert!(!failing.called("FsyncDir"));

    let failing = FailingFs::new(None);
    set_contents_with(&&failing, &path, b"direct", SetContentsFlags::NONE, 0o644).unwrap();
    assert!(!failing.called("Fsync"));

    let dir = tempfile::tempdir().unwrap();
    let new_path = dir.path().join("new");
    let failing = FailingFs::new(None);
    let flags = flags | SetContentsFlags::ONLY_EXISTING;
    set_contents_with(&&failing, &new_path, b"fresh", flags, 0o644).unwrap();
    assert!(!failing.called("Fsync"));
    assert!(!failing.called("FsyncDir"));
    assert_eq!(fs::read(&new_path).unwrap(), b"fresh");
}

#[test]
fn write_failure_mid_stream() {
    let payload = b"replacement";
    // writes are at most 3 bytes long: the third call fails after 6 bytes
    let (_dir, path) = setup();
    let failing = FailingFs::failing_write(3);
    let err = set_contents_with(&&failing, &path, payload, SetContentsFlags::NONE, 0o644)
        .unwrap_err();
    assert!(err.message().contains("write() failed"), "{err}");
    assert_eq!(err.kind(), FileErrorKind::Failed);
    let written = fs::read(&path).unwrap();
    assert!(written.len() < payload.len());
    assert_eq!(written, payload[..written.len()]);
    assert_eq!(written, b"replac");

    let (dir, path) = setup();
    let failing = FailingFs::failing_write(3);
    let flags = SetContentsFlags::CONSISTENT | SetContentsFlags::DURABLE;
    let err = set_contents_with(&&failing, &path, payload, flags, 0o644).unwrap_err();
    assert!(err.message().contains("write() failed"), "{err}");
    assert_eq!(fs::read(&path).unwrap(), b"original");
    assert!(failing.called("Unlink"));
    assert!(!failing.called("Rename"));
    assert_eq!(entries(dir.path()), ["config"]);
}
