// Connection handling and schema discovery for a FoxPro database container.

use std::collections::VecDeque;
use std::path::Path;

use odbc_api::buffers::TextRowSet;
use odbc_api::handles::StatementImpl;
use odbc_api::{BlockCursor, Connection, ConnectionOptions, Cursor, CursorImpl};
use tracing::{debug, info, warn};

use super::models::{DataType, FoxProColumn, FoxProTable};
use crate::error::{ExtractError, Result};

/// Rows fetched per round trip when streaming table data.
const ROW_BATCH_SIZE: usize = 1000;
/// Upper bound on the textual length of a single data cell. Memo and VarChar
/// fields share the Character code, so long text must fit; a cell exceeding
/// the bound fails the export instead of being truncated.
const MAX_DATA_CELL_BYTES: usize = 65536;
/// Upper bound on the textual length of a schema result cell.
const MAX_SCHEMA_CELL_BYTES: usize = 4096;

/// SQLTables result set: TABLE_NAME is the third column.
const TABLE_NAME_INDEX: usize = 2;
/// SQLColumns result set: COLUMN_NAME and DATA_TYPE are the fourth and fifth.
const COLUMN_NAME_INDEX: usize = 3;
const DATA_TYPE_INDEX: usize = 4;

/// An open connection to a FoxPro database together with the descriptors of
/// every user table it contains.
///
/// The session exclusively owns the single live connection; dropping the
/// session releases it. Construction fails as a whole if any table's columns
/// cannot be introspected, so a partially discovered session is never
/// exposed to callers.
pub struct FoxProSession {
    conn: Connection<'static>,
    tables: Vec<FoxProTable>,
}

impl FoxProSession {
    /// Opens the database at `database` through the Visual FoxPro ODBC
    /// driver and discovers all user tables.
    pub fn open(database: &Path) -> Result<Self> {
        let env = odbc_api::environment()
            .map_err(|e| ExtractError::Connection(format!("ODBC environment: {e}")))?;

        let connection_string = format!(
            "Driver={{Microsoft Visual FoxPro Driver}};SourceType=DBC;SourceDB={};Exclusive=No;",
            database.display()
        );

        info!(database = %database.display(), "opening FoxPro database");

        let conn = env
            .connect_with_connection_string(&connection_string, ConnectionOptions::default())
            .map_err(|e| {
                ExtractError::Connection(format!("cannot open '{}': {e}", database.display()))
            })?;

        // Any failure from here on drops `conn`, releasing the connection
        // before the error propagates.
        let tables = discover_tables(&conn)?;
        info!(tables = tables.len(), "schema discovery finished");

        Ok(Self { conn, tables })
    }

    /// The descriptors of every discovered user table, in driver order.
    pub fn tables(&self) -> &[FoxProTable] {
        &self.tables
    }

    /// Executes the table's select statement and returns a lazy iterator
    /// over its raw rows.
    ///
    /// The statement is executed exactly once; the returned sequence is
    /// finite and cannot be restarted.
    pub fn rows(&self, table: &FoxProTable) -> Result<RowIter<'_>> {
        let statement = table.select_statement();
        debug!(table = %table.name, %statement, "executing table query");

        let cursor = self
            .conn
            .execute(&statement, ())
            .map_err(|e| {
                ExtractError::Connection(format!("query failed for table '{}': {e}", table.name))
            })?;

        let cursor = match cursor {
            Some(mut cursor) => {
                let buffers =
                    TextRowSet::for_cursor(ROW_BATCH_SIZE, &mut cursor, Some(MAX_DATA_CELL_BYTES))
                    .map_err(|e| {
                        ExtractError::Connection(format!(
                            "cannot allocate row buffer for table '{}': {e}",
                            table.name
                        ))
                    })?;
                let block = cursor.bind_buffer(buffers).map_err(|e| {
                    ExtractError::Connection(format!(
                        "cannot bind row buffer for table '{}': {e}",
                        table.name
                    ))
                })?;
                Some(block)
            }
            None => None,
        };

        Ok(RowIter {
            cursor,
            pending: VecDeque::new(),
            table: table.name.clone(),
        })
    }
}

impl Drop for FoxProSession {
    fn drop(&mut self) {
        debug!("closing the database connection");
    }
}

/// Lists the user tables via the driver's schema facility and builds one
/// descriptor per table.
fn discover_tables(conn: &Connection<'_>) -> Result<Vec<FoxProTable>> {
    let cursor = conn
        .tables("", "", "", "TABLE")
        .map_err(|e| ExtractError::SchemaIntrospection(format!("table listing failed: {e}")))?;
    let rows = fetch_schema_rows(cursor, "table listing")?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row
            .get(TABLE_NAME_INDEX)
            .and_then(|cell| cell.clone())
            .ok_or_else(|| {
                ExtractError::SchemaIntrospection(
                    "table listing returned a row without TABLE_NAME".to_string(),
                )
            })?;

        info!(table = %name, "extracting table");
        let columns = discover_columns(conn, &name)?;
        tables.push(FoxProTable { name, columns });
    }

    Ok(tables)
}

/// Introspects one table's columns, in ordinal order.
fn discover_columns(conn: &Connection<'_>, table: &str) -> Result<Vec<FoxProColumn>> {
    let cursor = conn.columns("", "", table, "").map_err(|e| {
        ExtractError::SchemaIntrospection(format!("column listing failed for '{table}': {e}"))
    })?;
    let rows = fetch_schema_rows(cursor, "column listing")?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row
            .get(COLUMN_NAME_INDEX)
            .and_then(|cell| cell.clone())
            .ok_or_else(|| {
                ExtractError::SchemaIntrospection(format!(
                    "column listing for '{table}' returned a row without COLUMN_NAME"
                ))
            })?;
        let code = row
            .get(DATA_TYPE_INDEX)
            .and_then(|cell| cell.as_deref())
            .and_then(|text| text.trim().parse::<i32>().ok())
            .ok_or_else(|| {
                ExtractError::SchemaIntrospection(format!(
                    "column '{table}.{name}' has no readable DATA_TYPE"
                ))
            })?;

        debug!(column = %name, code, "extracting column");
        let data_type = DataType::from_code(code)?;
        columns.push(FoxProColumn { name, data_type });
    }

    Ok(columns)
}

/// Drains a schema cursor into memory. Schema result sets are small, so
/// materializing them is fine; table data goes through `RowIter` instead.
fn fetch_schema_rows(
    mut cursor: impl Cursor,
    what: &str,
) -> Result<Vec<Vec<Option<String>>>> {
    let column_count = cursor
        .num_result_cols()
        .map_err(|e| ExtractError::SchemaIntrospection(format!("{what}: column count: {e}")))?
        as usize;

    let buffers = TextRowSet::for_cursor(ROW_BATCH_SIZE, &mut cursor, Some(MAX_SCHEMA_CELL_BYTES))
        .map_err(|e| ExtractError::SchemaIntrospection(format!("{what}: row buffer: {e}")))?;
    let mut block = cursor
        .bind_buffer(buffers)
        .map_err(|e| ExtractError::SchemaIntrospection(format!("{what}: bind buffer: {e}")))?;

    let mut rows = Vec::new();
    while let Some(batch) = block
        .fetch_with_truncation_check(true)
        .map_err(|e| ExtractError::SchemaIntrospection(format!("{what}: fetch: {e}")))?
    {
        for row_index in 0..batch.num_rows() {
            rows.push(copy_row(batch, column_count, row_index));
        }
    }

    Ok(rows)
}

fn copy_row(batch: &TextRowSet, column_count: usize, row_index: usize) -> Vec<Option<String>> {
    (0..column_count)
        .map(|column_index| {
            batch
                .at(column_index, row_index)
                .map(|bytes| decode_cell(bytes, column_index))
        })
        .collect()
}

/// Decodes one cell. Legacy FoxPro data is frequently code-page encoded, so
/// non-UTF-8 bytes do occur; they are replaced with U+FFFD and reported, so
/// mangled exports are diagnosable.
fn decode_cell(bytes: &[u8], column_index: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!(
                column_index,
                "cell holds non-UTF-8 bytes, replacing them with U+FFFD"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Lazy iterator over one table's raw rows.
///
/// Rows are fetched from the driver in bounded batches; the full result set
/// is never held in memory. The sequence can be consumed once. A cell too
/// large for the batch buffer surfaces as an error item rather than a
/// silently shortened value.
pub struct RowIter<'c> {
    cursor: Option<BlockCursor<CursorImpl<StatementImpl<'c>>, TextRowSet>>,
    pending: VecDeque<Vec<Option<String>>>,
    table: String,
}

impl Iterator for RowIter<'_> {
    type Item = Result<Vec<Option<String>>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }

            let cursor = self.cursor.as_mut()?;
            match cursor.fetch_with_truncation_check(true) {
                Ok(Some(batch)) => {
                    let column_count = batch.num_cols();
                    for row_index in 0..batch.num_rows() {
                        self.pending.push_back(copy_row(batch, column_count, row_index));
                    }
                }
                Ok(None) => {
                    self.cursor = None;
                    return None;
                }
                Err(e) => {
                    self.cursor = None;
                    return Some(Err(ExtractError::Connection(format!(
                        "row fetch failed for table '{}': {e}",
                        self.table
                    ))));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cell_keeps_valid_utf8() {
        assert_eq!(decode_cell(b"hello", 0), "hello");
        assert_eq!(decode_cell("árbol".as_bytes(), 1), "árbol");
        assert_eq!(decode_cell(b"", 2), "");
    }

    #[test]
    fn test_decode_cell_replaces_invalid_bytes() {
        // 0xE9 is 'e acute' in the common FoxPro code pages, not valid UTF-8.
        assert_eq!(decode_cell(b"caf\xE9", 0), "caf\u{FFFD}");
        assert_eq!(decode_cell(b"\xFF\xFE", 3), "\u{FFFD}\u{FFFD}");
    }
}
