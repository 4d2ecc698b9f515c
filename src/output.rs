use anyhow::{Context, Result};
use std::{
    fs,
    io::{BufWriter, Write},
    path::Path,
};
use tempfile::NamedTempFile;

/// UTF-8 byte-order mark, so spreadsheet applications detect the encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write a CSV file (BOM first) atomically: the rows go to a temporary file
/// next to `path`, which is renamed over `path` once fully written.
pub fn write_csv_atomic<P, I, R>(path: P, header: &[&str], rows: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        out.write_all(UTF8_BOM)?;
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(header).context("writing CSV header")?;
        for row in rows {
            wtr.write_record(row).context("writing CSV row")?;
        }
        wtr.flush().context("flushing CSV writer")?;
    }

    tmp.persist(path)
        .with_context(|| format!("renaming temporary file onto {}", path.display()))?;
    Ok(())
}

/// CSV text for a float: empty for undefined values, shortest round-trip otherwise.
pub fn csv_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bom_then_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("out.csv");
        write_csv_atomic(
            &path,
            &["a", "b"],
            vec![vec!["1".to_string(), csv_float(f64::NAN)], vec!["x,y".into(), csv_float(2.5)]],
        )?;

        let bytes = fs::read(&path)?;
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec())?;
        assert_eq!(text, "a,b\n1,\n\"x,y\",2.5\n");

        let leftovers = fs::read_dir(path.parent().unwrap())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }
}
