//! Rewindable row reader for whitespace-separated numeric grids

use std::io::{BufRead, Seek, SeekFrom};

use crate::error::{ExportError, GridKind, Result};

/// Reads a text grid one numeric row at a time
///
/// Step detection peeks at the first rows and then rewinds, so the source
/// must be seekable (a `BufReader<File>` or an in-memory `Cursor`).
pub struct GridReader<R> {
    inner: R,
    kind: GridKind,
    line: usize,
    buf: String,
}

impl<R: BufRead + Seek> GridReader<R> {
    pub fn new(inner: R, kind: GridKind) -> Self {
        Self {
            inner,
            kind,
            line: 0,
            buf: String::new(),
        }
    }

    /// 1-based number of the last line read (0 before the first read)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Go back to the first row
    pub fn rewind(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.line = 0;
        Ok(())
    }

    /// Read the next non-blank line, returning false at end of input
    fn next_line(&mut self) -> Result<bool> {
        loop {
            self.buf.clear();
            if self.inner.read_line(&mut self.buf)? == 0 {
                return Ok(false);
            }
            self.line += 1;
            if !self.buf.trim().is_empty() {
                return Ok(true);
            }
        }
    }

    /// Parse the next row into its numeric fields
    pub fn next_row(&mut self) -> Result<Option<Vec<f64>>> {
        if !self.next_line()? {
            return Ok(None);
        }
        let mut values = Vec::new();
        for (i, field) in self.buf.split_whitespace().enumerate() {
            let value = field.parse::<f64>().map_err(|e| ExportError::Parse {
                grid: self.kind,
                line: self.line,
                detail: format!("field {} ('{}'): {}", i + 1, field, e),
            })?;
            values.push(value);
        }
        Ok(Some(values))
    }

    /// Count the fields of the next row without converting them
    pub fn next_field_count(&mut self) -> Result<Option<usize>> {
        if !self.next_line()? {
            return Ok(None);
        }
        Ok(Some(self.buf.split_whitespace().count()))
    }

    /// Discard up to `n` rows, returning how many were actually skipped
    pub fn skip_rows(&mut self, n: usize) -> Result<usize> {
        let mut skipped = 0;
        while skipped < n && self.next_line()? {
            skipped += 1;
        }
        Ok(skipped)
    }
}
