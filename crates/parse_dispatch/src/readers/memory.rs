use crate::error::ParseError;
use crate::example::Example;
use crate::pool::RecordPool;
use crate::source::{ReadScratch, Reader, ResetSource};
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves text lines held in memory.
///
/// Workers claim lines with a shared atomic cursor, so every line is read by
/// exactly one worker per pass and each worker sees its lines in input order.
/// `reset` rewinds the cursor for the next pass.
///
/// # Example
/// ```ignore
/// let reader = MemoryReader::new(["1 | a", "0 | b"]).with_records_per_read(2);
/// ```
pub struct MemoryReader {
    lines: Arc<[String]>,
    cursor: AtomicUsize,
    records_per_read: usize,
    name: String,
}

impl MemoryReader {
    /// Creates a reader that returns one record per read.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
            records_per_read: 1,
            name: "<memory>".to_string(),
        }
    }

    /// Sets how many lines one `read` call may turn into records.
    pub fn with_records_per_read(mut self, records_per_read: usize) -> Self {
        self.records_per_read = records_per_read.max(1);
        self
    }

    /// Sets the name reported in parse errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of lines in one pass.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Reader<Example> for MemoryReader {
    fn read(
        &self,
        batch: &mut Vec<Example>,
        limit: usize,
        pool: &dyn RecordPool<Example>,
        scratch: &mut ReadScratch,
    ) -> Result<usize> {
        let claim = self.records_per_read.min(limit);
        if claim == 0 {
            return Ok(0);
        }
        let start = self.cursor.fetch_add(claim, Ordering::SeqCst);
        if start >= self.lines.len() {
            return Ok(0);
        }
        let end = (start + claim).min(self.lines.len());

        for (offset, index) in (start..end).enumerate() {
            if offset > 0 {
                batch.push(pool.acquire());
            }
            let slot = batch
                .last_mut()
                .ok_or_else(|| anyhow!("reader called without a record slot"))?;
            slot.parse_line(&self.lines[index])
                .map_err(|e| ParseError::new(&self.name, index + 1, format!("{e:#}")))?;
        }

        scratch.records_read += end - start;
        Ok(end - start)
    }
}

impl ResetSource for MemoryReader {
    fn reset(&self) -> Result<()> {
        self.cursor.store(0, Ordering::SeqCst);
        Ok(())
    }
}
