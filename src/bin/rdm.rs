use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use trialstats::{
    config::default_na_tokens,
    rdm::{run_rdm, RdmOptions},
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Task correlation and dissimilarity matrix (RDM) from a participant-by-task table"
)]
struct Args {
    /// Participants in rows, tasks in columns, first column = participant id.
    #[arg(short, long, default_value = "participant_task_matrix.csv")]
    input: PathBuf,
    #[arg(short, long, default_value = "rdm_outputs")]
    output_dir: PathBuf,
    /// Drop participants with any missing task score before correlating.
    #[arg(long)]
    drop_incomplete: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    info!("Starting RDM pipeline for {}", args.input.display());

    let opts = RdmOptions {
        drop_incomplete: args.drop_incomplete,
    };
    let rdm = run_rdm(&args.input, &args.output_dir, &default_na_tokens(), &opts)?;

    info!("{} tasks compared", rdm.labels.len());
    println!("Files saved to: {}", args.output_dir.display());
    Ok(())
}
