use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use std::{fs, fs::File, path::Path, sync::Arc};
use tracing::info;

use super::{ConditionSummary, COLUMNS};
use crate::output::{csv_float, write_csv_atomic};

/// Summary as BOM-prefixed CSV; an undefined std is an empty field.
pub fn write_summary_csv<P: AsRef<Path>>(path: P, rows: &[ConditionSummary]) -> Result<()> {
    let path = path.as_ref();
    let records = rows.iter().map(|r| {
        vec![
            r.condition.to_string(),
            r.n_trials.to_string(),
            csv_float(r.accuracy_pct),
            csv_float(r.mean_rt_ms),
            r.std_rt_ms.map(csv_float).unwrap_or_default(),
            csv_float(r.median_rt_ms),
        ]
    });
    write_csv_atomic(path, &COLUMNS, records)
        .with_context(|| format!("writing summary CSV {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "summary CSV written");
    Ok(())
}

fn summary_schema() -> Schema {
    Schema::new(vec![
        Field::new("condition", DataType::Int64, false),
        Field::new("n_trials", DataType::Int64, false),
        Field::new("accuracy_pct", DataType::Float64, false),
        Field::new("mean_rt_ms", DataType::Float64, false),
        Field::new("std_rt_ms", DataType::Float64, true),
        Field::new("median_rt_ms", DataType::Float64, false),
    ])
}

/// Same table as Parquet. Returns the size of the written file.
pub fn write_summary_parquet<P: AsRef<Path>>(path: P, rows: &[ConditionSummary]) -> Result<u64> {
    let path = path.as_ref();
    let schema = Arc::new(summary_schema());

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.condition))),
        Arc::new(Int64Array::from_iter_values(
            rows.iter().map(|r| r.n_trials as i64),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.accuracy_pct),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.mean_rt_ms))),
        Arc::new(rows.iter().map(|r| r.std_rt_ms).collect::<Float64Array>()),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.median_rt_ms),
        )),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .context("building summary record batch")?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("creating file {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3)?))
        .build();
    let mut writer =
        ArrowWriter::try_new(file, schema, Some(props)).context("creating parquet writer")?;
    writer.write(&batch).context("writing summary batch")?;
    writer.close().context("closing parquet writer")?;

    let bytes = fs::metadata(path).context("getting file metadata")?.len();
    info!(path = %path.display(), bytes, "summary parquet written");
    Ok(bytes)
}
