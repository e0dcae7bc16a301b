//! Append-only delivery ledger.
//!
//! Undelivered records are kept as newline-delimited payloads in a single
//! file. The write path only ever appends; the read path drains entries
//! oldest-first and compacts by rewriting the surviving tail to a temporary
//! file and renaming it into place, so an interruption at any point leaves
//! either the old file or the new one, never a torn mix. Payloads must not
//! contain a newline (compact JSON satisfies this).

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

#[derive(Debug)]
pub enum LedgerError {
    /// Appending would exceed the configured capacity. Existing entries are
    /// never overwritten to make room.
    CacheFull { needed: u64, max: u64 },
    Io(io::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::CacheFull { needed, max } => {
                write!(f, "cache full: {needed} bytes needed, capacity {max}")
            }
            LedgerError::Io(e) => write!(f, "ledger I/O error: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<io::Error> for LedgerError {
    fn from(e: io::Error) -> Self {
        LedgerError::Io(e)
    }
}

/// One undelivered record plus its insertion position (0-based, oldest
/// first). Positions are stable for the duration of a single drain; they
/// are not persisted separately from the entries themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub position: u64,
    pub payload: Vec<u8>,
}

/// Append-only cache of serialized records awaiting delivery.
pub struct CacheLedger {
    path: PathBuf,
    max_bytes: u64,
}

impl CacheLedger {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one payload. Fails with [`LedgerError::CacheFull`] when the
    /// write would push the file past capacity.
    pub fn append(&self, payload: &[u8]) -> Result<(), LedgerError> {
        debug_assert!(!payload.contains(&b'\n'));

        let current = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        // An interrupted write can leave the last line unterminated; a
        // repair newline keeps the torn entry from merging with this one.
        let torn_tail = current > 0 && !self.ends_with_newline()?;

        let mut line = Vec::with_capacity(payload.len() + 2);
        if torn_tail {
            line.push(b'\n');
        }
        line.extend_from_slice(payload);
        line.push(b'\n');

        let needed = line.len() as u64;
        if current + needed > self.max_bytes {
            return Err(LedgerError::CacheFull {
                needed,
                max: self.max_bytes,
            });
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(LedgerError::Io)?;
            }
        }

        // A single write, so a crash leaves at most one torn line behind.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;

        debug!("cached {} bytes at {}", payload.len(), self.path.display());
        Ok(())
    }

    fn ends_with_newline(&self) -> io::Result<bool> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    /// Lazy iterator over cached entries, oldest first. Restartable from the
    /// start by calling `drain` again; a missing file drains as empty.
    pub fn drain(&self) -> io::Result<Drain> {
        let file = match File::open(&self.path) {
            Ok(file) => Some(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        Ok(Drain {
            lines: file.map(|f| BufReader::new(f).lines()),
            position: 0,
        })
    }

    /// Number of cached entries.
    pub fn len(&self) -> io::Result<u64> {
        let mut count = 0;
        for entry in self.drain()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes entries up to and including `position` (as reported by the
    /// most recent full drain). The surviving tail is written to a temporary
    /// file and renamed over the ledger, so a crash in between leaves the
    /// original entries intact; already-delivered entries are then replayed
    /// once more, which at-least-once delivery tolerates.
    pub fn remove_up_to(&self, position: u64) -> Result<(), LedgerError> {
        let mut survivors: Vec<Vec<u8>> = Vec::new();
        for entry in self.drain()? {
            let entry = entry?;
            if entry.position > position {
                survivors.push(entry.payload);
            }
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            for payload in &survivors {
                file.write_all(payload)?;
                file.write_all(b"\n")?;
            }
        }
        fs::rename(&tmp, &self.path)?;

        debug!(
            "compacted ledger through position {position}, {} entries remain",
            survivors.len()
        );
        Ok(())
    }
}

/// Iterator returned by [`CacheLedger::drain`].
pub struct Drain {
    lines: Option<io::Lines<BufReader<File>>>,
    position: u64,
}

impl Iterator for Drain {
    type Item = io::Result<CacheEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;

        loop {
            match lines.next()? {
                Ok(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    let entry = CacheEntry {
                        position: self.position,
                        payload: line.into_bytes(),
                    };
                    self.position += 1;
                    return Some(Ok(entry));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ledger(max_bytes: u64) -> CacheLedger {
        let path = std::env::temp_dir().join(format!("ledger-test-{}.log", uuid::Uuid::new_v4()));
        CacheLedger::open(path, max_bytes)
    }

    fn cleanup(ledger: &CacheLedger) {
        fs::remove_file(ledger.path()).ok();
    }

    #[test]
    fn appended_entries_drain_in_insertion_order() {
        let ledger = temp_ledger(4096);

        for i in 0..5 {
            ledger.append(format!("record-{i}").as_bytes()).unwrap();
        }

        let entries: Vec<CacheEntry> = ledger.drain().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.position, i as u64);
            assert_eq!(entry.payload, format!("record-{i}").into_bytes());
        }

        cleanup(&ledger);
    }

    #[test]
    fn empty_ledger_drains_empty() {
        let ledger = temp_ledger(4096);

        assert_eq!(ledger.drain().unwrap().count(), 0);
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn drain_is_restartable_from_start() {
        let ledger = temp_ledger(4096);
        ledger.append(b"a").unwrap();
        ledger.append(b"b").unwrap();

        let first: Vec<_> = ledger.drain().unwrap().map(|e| e.unwrap()).collect();
        let second: Vec<_> = ledger.drain().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(first, second);

        cleanup(&ledger);
    }

    #[test]
    fn full_ledger_rejects_append_and_keeps_old_entries() {
        let ledger = temp_ledger(20);
        ledger.append(b"0123456789").unwrap(); // 11 bytes on disk

        match ledger.append(b"0123456789") {
            Err(LedgerError::CacheFull { .. }) => {}
            other => panic!("expected CacheFull, got {other:?}"),
        }

        let entries: Vec<_> = ledger.drain().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, b"0123456789".to_vec());

        cleanup(&ledger);
    }

    #[test]
    fn append_after_torn_tail_keeps_records_separate() {
        let ledger = temp_ledger(4096);
        // An interrupted write left an entry without its newline.
        fs::write(ledger.path(), b"torn").unwrap();

        ledger.append(b"fresh").unwrap();

        let entries: Vec<_> = ledger.drain().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload, b"torn".to_vec());
        assert_eq!(entries[1].payload, b"fresh".to_vec());

        cleanup(&ledger);
    }

    #[test]
    fn remove_up_to_keeps_tail() {
        let ledger = temp_ledger(4096);
        for i in 0..4 {
            ledger.append(format!("r{i}").as_bytes()).unwrap();
        }

        ledger.remove_up_to(1).unwrap();

        let entries: Vec<_> = ledger.drain().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 2);
        // Positions restart from zero after compaction.
        assert_eq!(entries[0].position, 0);
        assert_eq!(entries[0].payload, b"r2".to_vec());
        assert_eq!(entries[1].payload, b"r3".to_vec());

        cleanup(&ledger);
    }

    #[test]
    fn remove_everything_leaves_empty_ledger_that_accepts_appends() {
        let ledger = temp_ledger(4096);
        ledger.append(b"only").unwrap();

        ledger.remove_up_to(0).unwrap();
        assert!(ledger.is_empty().unwrap());

        ledger.append(b"fresh").unwrap();
        assert_eq!(ledger.len().unwrap(), 1);

        cleanup(&ledger);
    }

    #[test]
    fn remove_on_missing_file_is_ok() {
        let ledger = temp_ledger(4096);
        ledger.remove_up_to(10).unwrap();
        assert!(ledger.is_empty().unwrap());
        cleanup(&ledger);
    }
}
