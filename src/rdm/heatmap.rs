use anyhow::{anyhow, bail, Context, Result};
use plotters::prelude::*;
use std::{fs, path::Path};
use tracing::info;

use super::LabeledMatrix;
use crate::output::write_csv_atomic;

const MARGIN: u32 = 20;
const TARGET_GRID_PX: u32 = 600;
const MIN_CELL_PX: u32 = 8;
const BAR_GAP_PX: u32 = 20;
const BAR_WIDTH_PX: u32 = 24;

const UNDEFINED: RGBColor = RGBColor(200, 200, 200);

/// Viridis anchor colours, low to high.
const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Colour of `t` in [0, 1] on the viridis ramp (clamped).
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let f = scaled - i as f64;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("drawing heatmap: {}", e)
}

/// Render `matrix` as a PNG: one square per entry plus a vertical colour bar
/// (top = largest finite value). Undefined entries are grey.
pub fn render_heatmap(matrix: &LabeledMatrix, path: &Path) -> Result<()> {
    let n = matrix.labels.len() as u32;
    if n == 0 {
        bail!("cannot render an empty matrix");
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let cell = (TARGET_GRID_PX / n).max(MIN_CELL_PX);
    let grid = cell * n;
    let size = (MARGIN * 2 + grid + BAR_GAP_PX + BAR_WIDTH_PX, MARGIN * 2 + grid);

    let (lo, hi) = matrix.finite_range().unwrap_or((0.0, 1.0));
    let span = if hi > lo { hi - lo } else { 1.0 };

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    for (i, row) in matrix.values.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            let color = if v.is_finite() {
                viridis((v - lo) / span)
            } else {
                UNDEFINED
            };
            let x0 = (MARGIN + j as u32 * cell) as i32;
            let y0 = (MARGIN + i as u32 * cell) as i32;
            root.draw(&Rectangle::new(
                [(x0, y0), (x0 + cell as i32, y0 + cell as i32)],
                color.filled(),
            ))
            .map_err(draw_err)?;
        }
    }

    let bar_x = (MARGIN + grid + BAR_GAP_PX) as i32;
    for k in 0..grid {
        let t = 1.0 - k as f64 / (grid - 1).max(1) as f64;
        let y = (MARGIN + k) as i32;
        root.draw(&Rectangle::new(
            [(bar_x, y), (bar_x + BAR_WIDTH_PX as i32, y + 1)],
            viridis(t).filled(),
        ))
        .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)?;
    info!(path = %path.display(), lo, hi, "heatmap written");
    Ok(())
}

/// The PNG carries no text, so the task order of its rows (top to bottom) and
/// columns (left to right) is written alongside it.
pub fn write_heatmap_labels<P: AsRef<Path>>(labels: &[String], path: P) -> Result<()> {
    let path = path.as_ref();
    let rows = labels
        .iter()
        .enumerate()
        .map(|(i, label)| vec![i.to_string(), label.clone()]);
    write_csv_atomic(path, &["position", "task"], rows)
        .with_context(|| format!("writing heatmap labels {}", path.display()))
}
