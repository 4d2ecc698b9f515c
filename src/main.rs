use anyhow::Result;
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use trialstats::{
    config::{Config, CONFIG_FILE},
    pipeline,
    summary::render_table,
};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let cfg = Config::load_or_default(CONFIG_FILE)?;
    info!(input = %cfg.input.display(), output = %cfg.output_csv.display(), "configured");

    // ─── 3) load, clean, aggregate, save ─────────────────────────────
    let report = pipeline::run(&cfg)?;
    info!(
        conditions = report.summary.len(),
        dropped_missing = report.dropped.missing_field,
        dropped_rt = report.dropped.invalid_rt,
        dropped_condition = report.dropped.no_condition,
        "summary complete"
    );

    // ─── 4) report ───────────────────────────────────────────────────
    print!("{}", render_table(&report.summary));
    let saved = env::current_dir()?.join(&cfg.output_csv);
    println!("\nSaved: {}", saved.display());
    if let Some(pq) = &cfg.output_parquet {
        println!("Saved: {}", env::current_dir()?.join(pq).display());
    }
    Ok(())
}
