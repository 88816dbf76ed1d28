use anyhow::{Context, Result};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use crate::tables::Table;
use crate::CHUNK;

/// Batch-at-a-time reader over a Parquet file.
pub struct Scan<T> {
    reader: ParquetRecordBatchReader,
    _table: PhantomData<T>,
}

impl<T: Table> Iterator for Scan<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next().map(|batch| T::from_batch(&batch?))
    }
}

fn open(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    ParquetRecordBatchReaderBuilder::try_new(file).with_context(|| format!("reading {}", path.display()))
}

pub fn scan_columnar<T: Table>(path: &Path) -> Result<Scan<T>> {
    let reader = open(path)?.with_batch_size(CHUNK).build()?;
    Ok(Scan { reader, _table: PhantomData })
}

pub fn read_columnar<T: Table>(path: &Path) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for batch in scan_columnar::<T>(path)? {
        rows.extend(batch.with_context(|| format!("decoding {}", path.display()))?);
    }
    Ok(rows)
}

pub fn column_names(path: &Path) -> Result<Vec<String>> {
    Ok(open(path)?.schema().fields().iter().map(|f| f.name().clone()).collect())
}

/// Decode every batch and count rows.
pub fn count_rows(path: &Path) -> Result<usize> {
    let mut n = 0;
    for batch in open(path)?.with_batch_size(CHUNK).build()? {
        n += batch?.num_rows();
    }
    Ok(n)
}
