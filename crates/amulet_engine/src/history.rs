use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use amulet_core::{Entry, Rarity};
use amulet_logging::amulet_debug;

use crate::persist::PersistError;
use crate::record::decode_entry;

/// What a history load saw, for the startup log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryReport {
    pub loaded: usize,
    pub below_threshold: usize,
    pub malformed: usize,
}

/// Read the match log and return entries at or above `min_rarity`, oldest first.
///
/// A missing log is an empty history. Lines that fail to parse are skipped.
pub fn load_history(path: &Path, min_rarity: Rarity) -> Result<Vec<Entry>, PersistError> {
    load_history_with_report(path, min_rarity).map(|(entries, _)| entries)
}

pub fn load_history_with_report(
    path: &Path,
    min_rarity: Rarity,
) -> Result<(Vec<Entry>, HistoryReport), PersistError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok((Vec::new(), HistoryReport::default()));
        }
        Err(err) => return Err(err.into()),
    };

    let mut reader = BufReader::new(file);
    let mut report = HistoryReport::default();
    let mut entries = Vec::new();
    let mut line = Vec::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        if line.trim_ascii().is_empty() {
            continue;
        }
        match decode_entry(&line) {
            Ok(entry) if entry.rarity >= min_rarity => {
                report.loaded += 1;
                entries.push(entry);
            }
            Ok(_) => report.below_threshold += 1,
            Err(err) => {
                amulet_debug!("Skipping malformed line {} in {:?}: {}", line_no, path, err);
                report.malformed += 1;
            }
        }
    }

    // Batched writes mean disk order is not time order.
    entries.sort_by_key(|entry| entry.observed_at);
    Ok((entries, report))
}
