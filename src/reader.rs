use csv::{ReaderBuilder, Trim};
use ndarray::Array1;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::types::*;

// Characters removed from header names
const DELETED_HEADER_CHARS: &str = "~!@#$%^&*()-=+\\|]}[{';: /?.>,<";

/// Loads a tab-delimited behavioral log into a [`RecordTable`].
///
/// # Arguments
///
/// * `file_path` - Path to the exported text file
///
/// # Returns
///
/// A `Result` containing either the loaded table or an error.
pub fn load_file<P: AsRef<Path>>(file_path: P) -> Result<RecordTable, EmoError> {
    let file = File::open(file_path.as_ref())?;
    let reader = BufReader::with_capacity(65536, file); // 64KB buffer

    let table = read_table(reader)?;

    tracing::info!(
        path = %file_path.as_ref().display(),
        rows = table.num_rows(),
        fields = table.field_names().len(),
        "Loaded behavioral log"
    );

    Ok(table)
}

/// Reads tab-delimited text with a header row from any reader
pub fn read_table<R: Read>(reader: R) -> Result<RecordTable, EmoError> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader);

    let names = unique_field_names(csv_reader.headers()?.iter().map(sanitize_field_name));

    // Collect cells column by column
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in csv_reader.records() {
        let record = record?;
        for (column, value) in cells.iter_mut().zip(record.iter()) {
            column.push(value.to_string());
        }
    }

    RecordTable::from_columns(
        names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| (name, infer_column(values))),
    )
}

/// Normalizes a header into a plain field name.
///
/// Surrounding whitespace is trimmed, inner spaces become underscores and
/// punctuation such as brackets and dots is removed, so `Procedure[Block]`
/// reads as `ProcedureBlock`.
pub fn sanitize_field_name(raw: &str) -> String {
    raw.trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| !DELETED_HEADER_CHARS.contains(*c))
        .collect()
}

/// Appends `_1`, `_2`, ... to repeated names
fn unique_field_names<I: Iterator<Item = String>>(names: I) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{}_{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

/// Numeric when every non-empty cell parses as a number, text otherwise
fn infer_column(values: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = values
        .iter()
        .map(|value| {
            if value.is_empty() {
                Some(f64::NAN)
            } else {
                value.parse::<f64>().ok()
            }
        })
        .collect();

    match parsed {
        Some(numbers) => Column::Numeric(Array1::from(numbers)),
        None => Column::Text(values),
    }
}
