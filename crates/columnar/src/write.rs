use anyhow::{Context, Result};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression as Codec, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Deserialize;
use std::fs::{self, File};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::read::count_rows;
use crate::tables::Table;
use crate::CHUNK;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Zstd,
    Snappy,
    None,
}

impl Compression {
    fn codec(self) -> Codec {
        match self {
            Compression::Gzip => Codec::GZIP(GzipLevel::default()),
            Compression::Zstd => Codec::ZSTD(ZstdLevel::default()),
            Compression::Snappy => Codec::SNAPPY,
            Compression::None => Codec::UNCOMPRESSED,
        }
    }
}

pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Streaming Parquet writer for one table type.
///
/// Rows go to `<path>.tmp`; [`ColumnarWriter::close`] moves the finished file
/// into place, so `path` never holds a partial file.
pub struct ColumnarWriter<T> {
    inner: ArrowWriter<File>,
    path: PathBuf,
    tmp: PathBuf,
    rows: usize,
    _table: PhantomData<T>,
}

impl<T: Table> ColumnarWriter<T> {
    pub fn create(path: &Path, compression: Compression) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = tmp_path(path);
        let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let props = WriterProperties::builder().set_compression(compression.codec()).build();
        let inner = ArrowWriter::try_new(file, T::schema(), Some(props))?;
        Ok(ColumnarWriter { inner, path: path.to_path_buf(), tmp, rows: 0, _table: PhantomData })
    }

    pub fn write(&mut self, rows: &[T]) -> Result<()> {
        for chunk in rows.chunks(CHUNK) {
            self.inner.write(&T::to_batch(chunk)?)?;
            self.rows += chunk.len();
        }
        Ok(())
    }

    /// Finish the file and return the number of rows written.
    pub fn close(self) -> Result<usize> {
        self.inner.close()?;
        fs::rename(&self.tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(self.rows)
    }
}

pub fn write_columnar<T: Table>(rows: &[T], path: &Path, compression: Compression) -> Result<()> {
    let mut writer = ColumnarWriter::<T>::create(path, compression)?;
    writer.write(rows)?;
    writer.close()?;
    Ok(())
}

/// Replace a persisted reference table.
///
/// Writes `<path>.tmp`, reads it back in full to prove it decodes with the
/// expected row count, then swaps it over `path`. On a failed check the
/// canonical file is left untouched and the temp file removed.
pub fn persist_atomically<T: Table>(rows: &[T], path: &Path, compression: Compression) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(path);
    {
        let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let props = WriterProperties::builder().set_compression(compression.codec()).build();
        let mut writer = ArrowWriter::try_new(file, T::schema(), Some(props))?;
        for chunk in rows.chunks(CHUNK) {
            writer.write(&T::to_batch(chunk)?)?;
        }
        writer.close()?;
    }
    let verified = count_rows(&tmp);
    match verified {
        Ok(n) if n == rows.len() => {}
        Ok(n) => {
            let _ = fs::remove_file(&tmp);
            anyhow::bail!(edgar_core::Error::Schema(format!(
                "{} read back {n} rows, expected {}",
                tmp.display(),
                rows.len()
            )));
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e.context(format!("verifying {}", tmp.display())));
        }
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    log::debug!("persisted {} rows to {}", rows.len(), path.display());
    Ok(())
}
