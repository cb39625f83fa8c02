//! Row accumulators that build Arrow `RecordBatch`es for a [`ParquetSink`]

use arrow::array::RecordBatch;
use arrow::error::ArrowError;

use crate::sink::ParquetSink;

/// Default batch size for flushing accumulated rows into a `RecordBatch`.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Column-wise buffer of rows destined for one parquet file.
pub trait Accumulator {
    type Row;

    /// Push a row into the accumulator
    fn push(&mut self, row: Self::Row);

    /// Number of rows currently buffered
    fn len(&self) -> usize;

    /// Check if buffer is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full and should be flushed
    fn is_full(&self) -> bool {
        self.len() >= DEFAULT_BATCH_SIZE
    }

    /// Take buffered rows as a RecordBatch, resetting internal state
    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError>;

    /// Move buffered rows (if any) into `sink`
    fn flush_to(&mut self, sink: &mut ParquetSink) -> std::io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let batch = self.take_batch().map_err(std::io::Error::other)?;
        sink.write_batch(&batch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use tempfile::TempDir;

    use super::*;

    struct Ids {
        schema: Arc<Schema>,
        ids: Vec<i64>,
    }

    impl Accumulator for Ids {
        type Row = i64;

        fn push(&mut self, row: i64) {
            self.ids.push(row);
        }

        fn len(&self) -> usize {
            self.ids.len()
        }

        fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
            let ids = std::mem::take(&mut self.ids);
            RecordBatch::try_new(self.schema.clone(), vec![Arc::new(Int64Array::from(ids))])
        }
    }

    fn ids() -> Ids {
        Ids {
            schema: Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)])),
            ids: Vec::new(),
        }
    }

    #[test]
    fn full_at_default_batch_size() {
        let mut acc = ids();
        for i in 0..DEFAULT_BATCH_SIZE as i64 - 1 {
            acc.push(i);
        }
        assert!(!acc.is_full());
        acc.push(0);
        assert!(acc.is_full());
    }

    #[test]
    fn flush_to_drains_buffer() {
        let dir = TempDir::new().unwrap();
        let mut acc = ids();
        let mut sink =
            ParquetSink::create(dir.path(), "ids.parquet", acc.schema.as_ref(), 3).unwrap();

        acc.flush_to(&mut sink).unwrap();
        assert_eq!(sink.row_count(), 0, "empty flush writes nothing");

        acc.push(1);
        acc.push(2);
        acc.flush_to(&mut sink).unwrap();
        assert!(acc.is_empty());
        assert_eq!(sink.finalize().unwrap(), 2);
    }
}
