//! Historic journal scan
//!
//! Replays every journal file in a directory through [`SessionState`] and
//! the normalizer. All I/O here is blocking; callers run it off the async
//! runtime.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::progress::ProgressThrottle;
use crate::config::defaults::JOURNAL_EXTENSION;
use crate::normalizer::normalize;
use crate::session::{CommanderFilter, SessionState, StateChange};
use crate::types::{JournalEvent, KillRecord};

/// What to scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub journal_dir: PathBuf,
    pub filter: CommanderFilter,
    /// Inclusive modification-time bounds, unix seconds.
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl ScanOptions {
    pub fn new(journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: journal_dir.into(),
            filter: CommanderFilter::default(),
            lower: None,
            upper: None,
        }
    }

    pub fn with_filter(mut self, filter: CommanderFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_bounds(mut self, lower: Option<i64>, upper: Option<i64>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    fn in_window(&self, mtime: i64) -> bool {
        self.lower.map_or(true, |l| mtime >= l) && self.upper.map_or(true, |u| mtime <= u)
    }
}

/// Result of replaying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Records {
        deaths: Vec<KillRecord>,
        kills: Vec<KillRecord>,
    },
    /// The file belongs to a commander outside the allow-list.
    Excluded { commander: String },
    NoCommander,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileScan {
    pub outcome: FileOutcome,
    pub skipped_lines: usize,
}

/// Aggregate over all files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub deaths: Vec<KillRecord>,
    pub kills: Vec<KillRecord>,
    pub files_total: usize,
    pub files_with_records: usize,
    pub skipped_lines: usize,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.deaths.is_empty() && self.kills.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deaths.len() + self.kills.len()
    }

    /// Deaths followed by kills.
    pub fn into_records(self) -> Vec<KillRecord> {
        let mut records = self.deaths;
        records.extend(self.kills);
        records
    }
}

/// Journal files directly inside the directory whose mtime is in the
/// window, sorted by name. An unreadable directory yields nothing.
pub fn list_journal_files(options: &ScanOptions) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(&options.journal_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %options.journal_dir.display(), error = %e, "Cannot read journal directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JOURNAL_EXTENSION) {
                return None;
            }
            // Follows symlinks, unlike DirEntry::metadata.
            let meta = std::fs::metadata(&path).ok()?;
            if !meta.is_file() {
                return None;
            }
            let mtime = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_secs();
            let mtime = i64::try_from(mtime).ok()?;
            options.in_window(mtime).then_some(path)
        })
        .collect();
    files.sort();
    files
}

/// Replay one journal file.
pub fn scan_file(path: &Path, filter: &CommanderFilter) -> std::io::Result<FileScan> {
    let file = File::open(path)?;
    let origin = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(scan_reader(BufReader::new(file), &origin, filter))
}

/// Replay newline-delimited journal events from any reader.
///
/// Bad lines are skipped. The first commander outside the allow-list ends
/// the file and drops everything collected from it.
pub fn scan_reader<R: BufRead>(reader: R, origin: &str, filter: &CommanderFilter) -> FileScan {
    let mut state = SessionState::new();
    let mut seen_commander = false;
    let mut deaths = Vec::new();
    let mut kills = Vec::new();
    let mut skipped_lines = 0;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                debug!(file = origin, line_no, "Skipping non UTF-8 line");
                skipped_lines += 1;
                continue;
            }
            Err(e) => {
                warn!(file = origin, line_no, error = %e, "Read error, stopping file");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event = match JournalEvent::from_line(trimmed) {
            Ok(event) => event,
            Err(e) => {
                debug!(file = origin, line_no, error = %e, "Skipping malformed line");
                skipped_lines += 1;
                continue;
            }
        };

        if state.apply(&event) == StateChange::Commander {
            seen_commander = true;
            let commander = state.commander().unwrap_or_default();
            if !filter.matches(commander) {
                info!(file = origin, commander, "Commander not in allow-list, skipping file");
                return FileScan {
                    outcome: FileOutcome::Excluded {
                        commander: commander.to_string(),
                    },
                    skipped_lines,
                };
            }
        }

        if !event.is_kill_event() {
            continue;
        }
        match normalize(&event, &state.kill_context()) {
            Ok(Some(mut record)) => {
                record.set_origin(origin);
                match event {
                    JournalEvent::Died(_) => deaths.push(record),
                    _ => kills.push(record),
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(file = origin, line_no, error = %e, "Skipping unusable kill event");
                skipped_lines += 1;
            }
        }
    }

    let outcome = if !seen_commander {
        FileOutcome::NoCommander
    } else if deaths.is_empty() && kills.is_empty() {
        FileOutcome::Empty
    } else {
        FileOutcome::Records { deaths, kills }
    };
    FileScan {
        outcome,
        skipped_lines,
    }
}

/// Scan every matching file. `on_progress(current, total)` is throttled.
pub fn scan<F>(options: &ScanOptions, mut on_progress: F) -> ScanResult
where
    F: FnMut(usize, usize),
{
    let files = list_journal_files(options);
    let total = files.len();
    info!(dir = %options.journal_dir.display(), files = total, "Historic scan started");

    let mut result = ScanResult {
        files_total: total,
        ..ScanResult::default()
    };
    let mut throttle = ProgressThrottle::default();

    for (index, path) in files.iter().enumerate() {
        match scan_file(path, &options.filter) {
            Ok(scan) => {
                result.skipped_lines += scan.skipped_lines;
                match scan.outcome {
                    FileOutcome::Records { deaths, kills } => {
                        debug!(file = %path.display(), deaths = deaths.len(), kills = kills.len(), "File scanned");
                        result.files_with_records += 1;
                        result.deaths.extend(deaths);
                        result.kills.extend(kills);
                    }
                    FileOutcome::NoCommander => {
                        debug!(file = %path.display(), "No commander in file, discarded");
                    }
                    FileOutcome::Excluded { .. } | FileOutcome::Empty => {}
                }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Cannot read journal file");
            }
        }

        if throttle.should_report(Instant::now(), index, total) {
            on_progress(index + 1, total);
        }
    }

    info!(
        deaths = result.deaths.len(),
        kills = result.kills.len(),
        skipped_lines = result.skipped_lines,
        "Historic scan finished"
    );
    result
}
