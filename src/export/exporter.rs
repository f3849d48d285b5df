// Row normalization and per-table CSV file writing.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::db::models::{FoxProTable, SEPARATOR};
use crate::db::session::FoxProSession;
use crate::error::{ExtractError, Result};

/// Normalizes one cell value for output.
///
/// The value is trimmed, every literal backslash is doubled, and the exact
/// strings "True" and "False" become "1" and "0". No other boolean-like
/// spellings are recognized.
pub fn safe_value(raw: &str) -> String {
    let escaped = raw.trim().replace('\\', "\\\\");

    match escaped.as_str() {
        "True" => "1".to_string(),
        "False" => "0".to_string(),
        _ => escaped,
    }
}

/// Joins one raw row into an output line, in column order.
///
/// A null cell is fatal: the caller must not export a missing value, and no
/// sentinel is substituted. A row whose cell count differs from the column
/// list is rejected rather than silently producing a short or long line.
pub fn joined_row(table: &FoxProTable, cells: &[Option<String>]) -> Result<String> {
    if cells.len() != table.columns.len() {
        return Err(ExtractError::SchemaIntrospection(format!(
            "table '{}' returned {} cells for {} columns",
            table.name,
            cells.len(),
            table.columns.len()
        )));
    }

    let mut values = Vec::with_capacity(cells.len());
    for (cell, column) in cells.iter().zip(&table.columns) {
        let raw = cell.as_deref().ok_or_else(|| ExtractError::NullValue {
            table: table.name.clone(),
            column: column.name.clone(),
        })?;
        values.push(safe_value(raw));
    }
    Ok(values.join(SEPARATOR))
}

/// Writes one table: header line 1 (type tags), header line 2 (column
/// names), then one line per data row.
pub fn write_table<W: Write>(
    writer: &mut W,
    table: &FoxProTable,
    rows: impl Iterator<Item = Result<Vec<Option<String>>>>,
) -> Result<()> {
    writeln!(writer, "{}", table.joined_column_types())?;
    writeln!(writer, "{}", table.joined_column_names())?;

    for row in rows {
        writeln!(writer, "{}", joined_row(table, &row?)?)?;
    }

    Ok(())
}

/// Creates or overwrites `path` with the table's export.
pub fn export_table_to_file(
    path: &Path,
    table: &FoxProTable,
    rows: impl Iterator<Item = Result<Vec<Option<String>>>>,
) -> Result<()> {
    if path.exists() {
        info!(file = %path.display(), "file exists, deleting");
        fs::remove_file(path)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    write_table(&mut writer, table, rows)?;
    writer.flush()?;

    Ok(())
}

/// Exports every table of the session into `target_dir`, one file per
/// table, sequentially. Files already written stay in place if a later
/// table fails; each finished file is complete and independent.
pub fn export_tables(session: &FoxProSession, target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir)?;

    for table in session.tables() {
        let path = target_dir.join(format!("{}.csv", table.name));
        info!(table = %table.name, file = %path.display(), "writing table export");

        let rows = session.rows(table)?;
        export_table_to_file(&path, table, rows)?;

        info!(file = %path.display(), "finished writing file");
    }

    Ok(())
}
