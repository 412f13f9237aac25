//! Inspecting a destination before writing to it.

use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

const COMPARE_CHUNK: usize = 64 * 1024;

/// What currently sits at a destination path, relative to a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    Absent,
    /// Zero-length file, the mark of an interrupted earlier run
    ZeroByte,
    /// Same bytes as the source
    Identical,
    /// Different bytes
    Different,
}

impl DestinationState {
    pub fn probe(source: &Path, destination: &Path) -> io::Result<Self> {
        let dest_meta = match fs::metadata(destination) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DestinationState::Absent),
            Err(e) => return Err(e),
        };

        if dest_meta.len() == 0 {
            return Ok(DestinationState::ZeroByte);
        }

        if files_identical(source, destination)? {
            Ok(DestinationState::Identical)
        } else {
            Ok(DestinationState::Different)
        }
    }

    /// Whether a planner may target this destination without renaming
    pub fn is_free(self) -> bool {
        !matches!(self, DestinationState::Different)
    }
}

/// Byte-for-byte comparison, sizes first
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::with_capacity(COMPARE_CHUNK, File::open(a)?);
    let mut reader_b = BufReader::with_capacity(COMPARE_CHUNK, File::open(b)?);
    let mut buf_a = vec![0u8; COMPARE_CHUNK];
    let mut buf_b = vec![0u8; COMPARE_CHUNK];

    loop {
        let read = read_full(&mut reader_a, &mut buf_a)?;
        if read != read_full(&mut reader_b, &mut buf_b)? {
            return Ok(false);
        }
        if read == 0 {
            return Ok(true);
        }
        if buf_a[..read] != buf_b[..read] {
            return Ok(false);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of file
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"data").unwrap();
        let state = DestinationState::probe(&src, &dir.path().join("b.jpg")).unwrap();
        assert_eq!(state, DestinationState::Absent);
        assert!(state.is_free());
    }

    #[test]
    fn zero_byte_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        let dest = dir.path().join("b.jpg");
        fs::write(&src, b"data").unwrap();
        fs::write(&dest, b"").unwrap();
        assert_eq!(
            DestinationState::probe(&src, &dest).unwrap(),
            DestinationState::ZeroByte
        );
    }

    #[test]
    fn identical_and_different_destinations() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        let same = dir.path().join("same.jpg");
        let other = dir.path().join("other.jpg");
        fs::write(&src, b"data").unwrap();
        fs::write(&same, b"data").unwrap();
        fs::write(&other, b"dat4").unwrap();

        assert_eq!(
            DestinationState::probe(&src, &same).unwrap(),
            DestinationState::Identical
        );
        let state = DestinationState::probe(&src, &other).unwrap();
        assert_eq!(state, DestinationState::Different);
        assert!(!state.is_free());
    }

    #[test]
    fn large_files_compare_across_chunks() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.orf");
        let b = dir.path().join("b.orf");
        let mut content = vec![7u8; COMPARE_CHUNK * 3 + 17];
        fs::write(&a, &content).unwrap();
        fs::write(&b, &content).unwrap();
        assert!(files_identical(&a, &b).unwrap());

        content[COMPARE_CHUNK * 2 + 5] = 8;
        fs::write(&b, &content).unwrap();
        assert!(!files_identical(&a, &b).unwrap());
    }
}
