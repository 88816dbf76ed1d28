//! Column extraction that tolerates foreign writers.
//!
//! Files written by other tools may store a column with a wider or different
//! type (floats for flags, microsecond timestamps, large strings). Everything
//! is cast to the type we expect; a missing optional column reads as nulls.

use anyhow::Result;
use arrow::array::{ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampSecondType};
use arrow::record_batch::RecordBatch;
use edgar_core::Error;

fn column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<Option<ArrayRef>> {
    match batch.column_by_name(name) {
        Some(col) => Ok(Some(cast(col, to)?)),
        None => Ok(None),
    }
}

pub(crate) fn require(batch: &RecordBatch, names: &[&str]) -> Result<()> {
    for name in names {
        if batch.column_by_name(name).is_none() {
            return Err(Error::Schema(format!("missing column {name}")).into());
        }
    }
    Ok(())
}

pub(crate) fn strings(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    Ok(match column(batch, name, &DataType::Utf8)? {
        Some(arr) => arr.as_string::<i32>().iter().map(|v| v.map(str::to_string)).collect(),
        None => vec![None; batch.num_rows()],
    })
}

pub(crate) fn ints(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    Ok(match column(batch, name, &DataType::Int64)? {
        Some(arr) => arr.as_primitive::<Int64Type>().iter().collect(),
        None => vec![None; batch.num_rows()],
    })
}

pub(crate) fn floats(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(match column(batch, name, &DataType::Float64)? {
        Some(arr) => arr.as_primitive::<Float64Type>().iter().collect(),
        None => vec![None; batch.num_rows()],
    })
}

pub(crate) fn bools(batch: &RecordBatch, name: &str) -> Result<Vec<Option<bool>>> {
    Ok(match column(batch, name, &DataType::Boolean)? {
        Some(arr) => arr.as_boolean().iter().collect(),
        None => vec![None; batch.num_rows()],
    })
}

/// Epoch seconds.
pub(crate) fn seconds(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    Ok(match column(batch, name, &DataType::Timestamp(TimeUnit::Second, None))? {
        Some(arr) => arr.as_primitive::<TimestampSecondType>().iter().collect(),
        None => vec![None; batch.num_rows()],
    })
}

pub(crate) fn ip_keys(batch: &RecordBatch, name: &str) -> Result<Vec<Option<u32>>> {
    Ok(ints(batch, name)?.into_iter().map(|v| v.and_then(|i| u32::try_from(i).ok())).collect())
}
