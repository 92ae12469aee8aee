use crate::error::ParseError;
use crate::example::Example;
use crate::pool::RecordPool;
use crate::source::{ReadScratch, Reader, ResetSource};
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Reads examples from a text file, one per line. Skips blank lines.
///
/// The open file is shared by all workers behind a mutex; only the line read
/// happens under the lock, parsing runs on the worker's own scratch buffer.
/// `reset` reopens the file for the next pass.
///
/// # Example
/// ```ignore
/// let reader = TxtReader::open("train.txt")?;
/// ```
pub struct TxtReader {
    path: PathBuf,
    input: Mutex<TxtInput>,
}

struct TxtInput {
    reader: BufReader<File>,
    line_number: usize,
}

impl TxtInput {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open text file: {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            line_number: 0,
        })
    }
}

impl TxtReader {
    /// Opens a text file for reading
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let input = TxtInput::open(&path)?;
        Ok(Self {
            path,
            input: Mutex::new(input),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next non-blank line into `scratch.line`.
    /// Returns its 1-based line number, or `None` at end of file.
    fn next_line(&self, scratch: &mut ReadScratch) -> Result<Option<usize>> {
        let mut input = self.input.lock();
        loop {
            scratch.line.clear();
            let line_number = input.line_number + 1;
            let n = input.reader.read_line(&mut scratch.line).with_context(|| {
                format!(
                    "Error reading line {} of {}",
                    line_number,
                    self.path.display()
                )
            })?;
            if n == 0 {
                return Ok(None);
            }
            input.line_number = line_number;
            if !scratch.line.trim().is_empty() {
                return Ok(Some(line_number));
            }
        }
    }
}

impl Reader<Example> for TxtReader {
    fn read(
        &self,
        batch: &mut Vec<Example>,
        _limit: usize,
        _pool: &dyn RecordPool<Example>,
        scratch: &mut ReadScratch,
    ) -> Result<usize> {
        let Some(line_number) = self.next_line(scratch)? else {
            return Ok(0);
        };

        let slot = batch
            .last_mut()
            .ok_or_else(|| anyhow!("reader called without a record slot"))?;
        slot.parse_line(scratch.line.trim_end()).map_err(|e| {
            ParseError::new(
                self.path.display().to_string(),
                line_number,
                format!("{e:#}"),
            )
        })?;

        scratch.records_read += 1;
        Ok(1)
    }
}

impl ResetSource for TxtReader {
    fn reset(&self) -> Result<()> {
        let input = TxtInput::open(&self.path)?;
        *self.input.lock() = input;
        Ok(())
    }
}
