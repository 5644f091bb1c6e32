//! Row formatting for exported CSV chunks
//!
//! This module turns source field values into CSV-safe text:
//! - [`Value`]: the crate's field value model, convertible from BSON
//! - [`ValueConverter`]: per-kind rendering hooks
//! - [`CsvValueConverter`]: the rendering used for warehouse-bound files
//! - [`format_row`]: renders one row as a comma-joined, escaped line

pub mod converter;
pub mod value;

pub use converter::{CsvValueConverter, DATETIME_FORMAT, ValueConverter};
pub use value::{Row, Value};

/// Escape a CSV field if necessary
///
/// Fields containing a comma, quote, or line break are wrapped in quotes with
/// internal quotes doubled; everything else is emitted as is.
pub fn escape_csv_value(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render one row as a CSV line (no line terminator)
pub fn format_row<C: ValueConverter>(converter: &C, row: &[Value]) -> String {
    row.iter()
        .map(|value| escape_csv_value(&converter.convert(value)))
        .collect::<Vec<_>>()
        .join(",")
}
