//! Unique file names from `XXXXXX` templates.
//!
//! Names are derived from the wall clock and a process-wide counter. They are
//! unique enough for temporary files created exclusively, but predictable:
//! never use them where an attacker must not guess the name.

use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
    vec::Vec,
};

use super::fs::FileSystem;
use crate::macros::trace;

const LETTERS: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PLACEHOLDER: &[u8; 6] = b"XXXXXX";
const ATTEMPTS: usize = 100;
const STEP: u64 = 7777;
const USEC_PER_SEC: u64 = 1_000_000;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sequence of candidate suffixes.
#[derive(Debug, Clone)]
pub(crate) struct TempNames {
    value: u64,
    remaining: usize,
}

impl TempNames {
    pub(crate) fn new() -> Self {
        let now_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_micros() as u64);
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::with_seed(((now_us % USEC_PER_SEC) ^ (now_us / USEC_PER_SEC)).wrapping_add(counter))
    }

    pub(crate) fn with_seed(value: u64) -> Self {
        Self {
            value,
            remaining: ATTEMPTS,
        }
    }
}

impl Iterator for TempNames {
    type Item = [u8; 6];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let mut value = self.value;
        let mut name = [0; 6];
        for letter in &mut name {
            *letter = LETTERS[(value % LETTERS.len() as u64) as usize];
            value /= LETTERS.len() as u64;
        }
        self.value = self.value.wrapping_add(STEP);
        Some(name)
    }
}

/// A path template, with the position of its last `XXXXXX`.
#[derive(Debug)]
pub(crate) struct Template {
    bytes: Vec<u8>,
    placeholder: usize,
}

impl Template {
    pub(crate) fn parse(path: &Path) -> io::Result<Self> {
        let invalid = || io::Error::new(io::ErrorKind::InvalidInput, "template has no XXXXXX");
        let bytes = path_to_bytes(path).ok_or_else(invalid)?;
        let placeholder = bytes
            .windows(PLACEHOLDER.len())
            .rposition(|window| window == PLACEHOLDER)
            .ok_or_else(invalid)?;
        Ok(Self { bytes, placeholder })
    }

    pub(crate) fn with_suffix(&self, name: &[u8; 6]) -> PathBuf {
        let mut bytes = self.bytes.clone();
        bytes[self.placeholder..self.placeholder + PLACEHOLDER.len()].copy_from_slice(name);
        path_from_bytes(bytes)
    }

    pub(crate) fn path(&self) -> PathBuf {
        path_from_bytes(self.bytes.clone())
    }
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Option<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Some(path.as_os_str().as_bytes().to_vec())
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Option<Vec<u8>> {
    path.to_str().map(|s| s.as_bytes().to_vec())
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    std::ffi::OsString::from_vec(bytes).into()
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    // only ASCII letters are substituted, the template was valid UTF-8
    std::string::String::from_utf8_lossy(&bytes).into_owned().into()
}

/// Creates a new file from `template`, trying successive names while they exist.
///
/// Returns the last path tried along with the outcome.
pub(crate) fn create_temp<F: FileSystem>(
    fs: &F,
    template: &Template,
    mode: u32,
) -> (PathBuf, io::Result<F::File>) {
    let mut path = template.path();
    for name in TempNames::new() {
        path = template.with_suffix(&name);
        match fs.create_new(&path, mode) {
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                trace!(path = %path.display(), "temporary file exists, trying another name");
            }
            res => return (path, res),
        }
    }
    (path, Err(exhausted()))
}

fn exhausted() -> io::Error {
    #[cfg(unix)]
    return io::Error::from_raw_os_error(libc::EEXIST);
    #[cfg(not(unix))]
    return io::Error::from(io::ErrorKind::AlreadyExists);
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_use_alphabet_and_step() {
        let names: Vec<_> = TempNames::with_seed(0).collect();
        assert_eq!(names.len(), ATTEMPTS);
        assert_eq!(&names[0], b"AAAAAA");
        // 7777 = 6 * 36^2 + 0 * 36 + 1
        assert_eq!(&names[1], b"BAGAAA");
        assert!(names
            .iter()
            .flatten()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), ATTEMPTS);
    }

    #[test]
    fn template_replaces_last_placeholder() {
        let template = Template::parse(Path::new("/tmp/XXXXXX/fileXXXXXX.txt")).unwrap();
        assert_eq!(
            template.with_suffix(b"ABC123"),
            Path::new("/tmp/XXXXXX/fileABC123.txt")
        );
        let err = Template::parse(Path::new("/tmp/fileXXXXX")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
