//! Row sources: the streaming input of a mapping call.

use rowgraph_value::{ColumnMeta, SqlValue};

/// Failure reported by a row source while reading or closing.
#[derive(Debug, thiserror::Error)]
#[error("row source error: {message}")]
pub struct RowSourceError {
    message: String,
}

impl RowSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for RowSourceError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            message: format!("{value:#}"),
        }
    }
}

/// A forward-only cursor over a query result.
///
/// The mapper reads `columns()` once, pulls rows until `next_row` returns
/// `None`, and calls `close()` exactly once whether or not mapping succeeded.
pub trait RowSource {
    fn columns(&self) -> &[ColumnMeta];

    /// The next row, one value per column, or `None` when exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, RowSourceError>;

    fn close(&mut self) -> Result<(), RowSourceError>;
}

/// In-memory result set.
#[derive(Debug, Clone)]
pub struct MemoryRows {
    columns: Vec<ColumnMeta>,
    rows: std::vec::IntoIter<Vec<SqlValue>>,
    closed: bool,
}

impl MemoryRows {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Columns without type information, from bare names.
    pub fn untyped<S: AsRef<str>>(names: &[S], rows: Vec<Vec<SqlValue>>) -> Self {
        let columns = names
            .iter()
            .map(|name| ColumnMeta::untyped(name.as_ref()))
            .collect();
        Self::new(columns, rows)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RowSource for MemoryRows {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, RowSourceError> {
        if self.closed {
            return Err(RowSourceError::new("read after close"));
        }
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<(), RowSourceError> {
        if self.closed {
            return Err(RowSourceError::new("already closed"));
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_rows_stream_then_close_once() {
        let mut rows = MemoryRows::untyped(&["id"], vec![vec![SqlValue::Int(1)]]);
        assert_eq!(rows.columns()[0].name, "id");
        assert!(rows.next_row().unwrap().is_some());
        assert!(rows.next_row().unwrap().is_none());
        rows.close().unwrap();
        assert!(rows.is_closed());
        assert!(rows.close().is_err());
        assert!(rows.next_row().is_err());
    }

    #[test]
    fn anyhow_errors_keep_their_context() {
        let err: RowSourceError = anyhow::anyhow!("socket reset")
            .context("reading row 3")
            .into();
        assert_eq!(err.message(), "reading row 3: socket reset");
    }
}
