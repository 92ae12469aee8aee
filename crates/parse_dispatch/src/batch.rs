use crate::example::Record;

/// The `Batch` struct is the unit handed to the dispatch callback.
///
/// A batch is built privately by one worker from a single read attempt and
/// moved into the callback, so no batch is ever visible to two threads.
/// Each batch carries the pass index that was settled when the worker began
/// the read that produced it.
///
/// Pass-boundary markers are batches holding exactly one record with the
/// end-of-pass flag set; their `pass_index` is the pass they close.
#[derive(Debug)]
pub struct Batch<R> {
    records: Vec<R>,
    pass_index: u64,
}

impl<R: Record> Batch<R> {
    pub(crate) fn new(records: Vec<R>, pass_index: u64) -> Self {
        Self {
            records,
            pass_index,
        }
    }

    /// Builds the singleton marker batch that closes `pass_index`.
    pub(crate) fn end_of_pass(mut marker: R, pass_index: u64) -> Self {
        marker.default_label();
        marker.set_end_pass(true);
        Self {
            records: vec![marker],
            pass_index,
        }
    }

    /// Pass this batch belongs to.
    pub fn pass_index(&self) -> u64 {
        self.pass_index
    }

    /// Returns the number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True for the marker batch dispatched at a pass boundary.
    pub fn is_end_pass(&self) -> bool {
        self.records.len() == 1 && self.records[0].is_end_pass()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }

    /// Takes ownership of the records, e.g. to release them to the pool.
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R> IntoIterator for Batch<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[cfg(test)]
mod batch_test {
    use super::*;
    use crate::example::Example;

    #[test]
    fn test_end_of_pass_marker() -> anyhow::Result<()> {
        let mut record = Example::default();
        record.parse_line("1 2.0 | a")?;

        let marker = Batch::end_of_pass(record, 3);
        assert!(marker.is_end_pass());
        assert_eq!(marker.pass_index(), 3);
        assert_eq!(marker.len(), 1);
        assert_eq!(marker.records()[0].label, None);
        Ok(())
    }

    #[test]
    fn test_regular_batch_is_not_marker() {
        let batch = Batch::new(vec![Example::default(), Example::default()], 0);
        assert!(!batch.is_end_pass());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.into_iter().count(), 2);
    }
}
