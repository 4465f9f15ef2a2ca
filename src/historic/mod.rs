//! Historic journal replay: scan a directory of journal files and submit
//! every reconstructed kill in one bulk request.

pub mod progress;
pub mod runner;
pub mod scanner;

pub use progress::ProgressThrottle;
pub use runner::HistoricRun;
pub use scanner::{
    list_journal_files, scan, scan_file, scan_reader, FileOutcome, FileScan, ScanOptions, ScanResult,
};
