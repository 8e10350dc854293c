//! Onset extraction for the emotion-reactivity task.
//!
//! Reads the tab-delimited log exported by the presentation software and
//! writes three-column `onset duration weight` files, with times in seconds
//! relative to each run's trigger.

mod reader;
pub mod pipeline;
pub mod timing;
pub mod types;
pub mod writer;

use std::path::Path;

// Re-export types
pub use pipeline::{extract_all, run, ExtractionConfig, ExtractionSummary};
pub use reader::{read_table, sanitize_field_name};
pub use types::*;

/// Loads a behavioral log and returns its record table
///
/// # Examples
///
/// ```no_run
/// use emo_onsets::load;
///
/// let result = load("path/to/subject_log.txt");
/// match result {
///     Ok(table) => println!("Rows: {}", table.num_rows()),
///     Err(e) => println!("Error loading file: {}", e),
/// }
/// ```
pub fn load<P: AsRef<Path>>(file_path: P) -> Result<RecordTable, EmoError> {
    reader::load_file(file_path)
}
