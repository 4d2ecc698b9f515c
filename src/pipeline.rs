use anyhow::Result;
use tracing::{info, instrument};

use crate::config::Config;
use crate::roles::{resolve_roles, ColumnRoleMap};
use crate::summary::{summarize, write_summary_csv, write_summary_parquet, ConditionSummary};
use crate::table::load_table;
use crate::trials::{clean_trials, DropCounts};

/// Everything a trial summary run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub header_row: Option<usize>,
    pub roles: ColumnRoleMap,
    pub rows_read: usize,
    pub dropped: DropCounts,
    pub summary: Vec<ConditionSummary>,
}

/// Load → map roles → clean → aggregate. Writes nothing.
#[instrument(level = "info", skip_all, fields(input = %cfg.input.display()))]
pub fn summarize_trials(cfg: &Config) -> Result<RunReport> {
    let table = load_table(&cfg.input, &cfg.aliases, cfg.max_header_row, &cfg.na_tokens)?;
    let roles = resolve_roles(&table, &cfg.aliases, &cfg.heuristics())?;
    let cleaned = clean_trials(&table, &roles, &cfg.trial_options());

    info!(
        rows = table.rows.len(),
        kept = cleaned.trials.len(),
        dropped = cleaned.dropped.total(),
        "trials cleaned"
    );

    Ok(RunReport {
        header_row: table.header_row,
        roles,
        rows_read: table.rows.len(),
        dropped: cleaned.dropped,
        summary: summarize(&cleaned.trials),
    })
}

/// Full run: summarize, then persist the CSV (and the Parquet copy if configured).
pub fn run(cfg: &Config) -> Result<RunReport> {
    let report = summarize_trials(cfg)?;
    write_summary_csv(&cfg.output_csv, &report.summary)?;
    if let Some(pq) = &cfg.output_parquet {
        write_summary_parquet(pq, &report.summary)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::roles::Role;
    use std::{fs, path::Path};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,trialstats=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn config_for(dir: &Path, input: &str) -> Result<Config> {
        let path = dir.join("trials.csv");
        fs::write(&path, input)?;
        Ok(Config {
            input: path,
            output_csv: dir.join("accuracy_rt_by_condition.csv"),
            ..Config::default()
        })
    }

    #[test]
    fn two_trial_scenario() -> Result<()> {
        init_test_logging();
        let dir = tempfile::tempdir()?;
        let cfg = config_for(
            dir.path(),
            "answer,env,rt,correct\nleft,shifty_2.jpg,450,left\nright,shifty_-2.jpg,500,left\n",
        )?;
        let report = run(&cfg)?;

        assert_eq!(report.summary.len(), 1);
        let row = &report.summary[0];
        assert_eq!(row.condition, 2);
        assert_eq!(row.n_trials, 2);
        assert_eq!(row.accuracy_pct, 50.0);
        assert_eq!(row.mean_rt_ms, 475.0);
        assert_eq!(row.median_rt_ms, 475.0);
        assert!((row.std_rt_ms.unwrap() - 35.35533905932738).abs() < 1e-9);

        let written = fs::read_to_string(&cfg.output_csv)?;
        assert!(written.contains("\n2,2,50,475,"));
        Ok(())
    }

    #[test]
    fn messy_export_with_preamble_and_losses() -> Result<()> {
        init_test_logging();
        let dir = tempfile::tempdir()?;
        let cfg = config_for(
            dir.path(),
            "Experiment export,,,,\n\
             participant,07,,,\n\
             Trial,Response,Stimulus File,RT (ms),GT\n\
             1,left,img/shifty_0.jpg,401,left\n\
             2,right,img/shifty_4.jpg,530,right\n\
             3,up,img/shifty_-4.jpg,610,up\n\
             4,left,img/shifty_4.jpg,,left\n\
             5,left,img/practice.jpg,420,left\n\
             6,right,img/shifty_0.jpg,timeout,right\n",
        )?;
        let report = run(&cfg)?;

        assert_eq!(report.header_row, Some(2));
        // "Stimulus File" is not an alias; env is found by content
        assert_eq!(report.roles.get(Role::Env).label, "Stimulus File");
        assert_eq!(report.roles.get(Role::Rt).label, "RT (ms)");
        assert_eq!(
            report.dropped,
            DropCounts {
                missing_field: 1,
                invalid_rt: 1,
                no_condition: 1,
            }
        );
        let total: usize = report.summary.iter().map(|r| r.n_trials).sum();
        assert_eq!(total + report.dropped.total(), report.rows_read);

        let conditions: Vec<i64> = report.summary.iter().map(|r| r.condition).collect();
        assert_eq!(conditions, vec![0, 4]);
        assert_eq!(report.summary[0].std_rt_ms, None);
        // "up" == "up" is never scored correct
        assert_eq!(report.summary[1].accuracy_pct, 50.0);
        Ok(())
    }

    #[test]
    fn workbook_with_notes_above_header() -> Result<()> {
        init_test_logging();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("book1.xlsx");

        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        // rows 0-2 blank, six notes, a blank spacer, then the header at row 10
        for (i, row) in (3u32..9).enumerate() {
            sheet.write_string(row, 0, format!("Session note {}", i + 1))?;
        }
        for (col, label) in (0u16..).zip(["Answer", "Env", "RT", "Correct"]) {
            sheet.write_string(10, col, label)?;
        }
        let trials = [
            ("left", "stim/shifty_1.jpg", 450.0, "left"),
            ("right", "stim/shifty_-1.jpg", 510.0, "left"),
            ("right", "stim/shifty_3.jpg", 620.0, "right"),
        ];
        for (row, (answer, env, rt, correct)) in (11u32..).zip(trials) {
            sheet.write_string(row, 0, answer)?;
            sheet.write_string(row, 1, env)?;
            sheet.write_number(row, 2, rt)?;
            sheet.write_string(row, 3, correct)?;
        }
        book.save(&path)?;

        let cfg = Config {
            input: path,
            output_csv: dir.path().join("accuracy_rt_by_condition.csv"),
            ..Config::default()
        };
        let report = run(&cfg)?;

        assert_eq!(report.header_row, Some(6));
        assert_eq!(report.roles.get(Role::Rt).label, "RT");
        assert_eq!(report.dropped.total(), 0);
        let conditions: Vec<(i64, usize, f64)> = report
            .summary
            .iter()
            .map(|r| (r.condition, r.n_trials, r.accuracy_pct))
            .collect();
        assert_eq!(conditions, vec![(1, 2, 50.0), (3, 1, 100.0)]);
        assert_eq!(report.summary[0].mean_rt_ms, 480.0);
        assert_eq!(report.summary[1].std_rt_ms, None);

        let written = fs::read_to_string(&cfg.output_csv)?;
        assert!(written.contains("\n3,1,100,620,,620"));
        Ok(())
    }

    #[test]
    fn keeping_sign_splits_conditions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = config_for(
            dir.path(),
            "answer,env,rt,correct\nleft,shifty_2.jpg,450,left\nright,shifty_-2.jpg,500,left\n",
        )?;
        cfg.collapse_sign = false;
        let report = summarize_trials(&cfg)?;
        let conditions: Vec<i64> = report.summary.iter().map(|r| r.condition).collect();
        assert_eq!(conditions, vec![-2, 2]);
        Ok(())
    }

    #[test]
    fn parquet_copy_is_optional() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = config_for(
            dir.path(),
            "answer,env,rt,correct\nleft,shifty_1.jpg,450,left\n",
        )?;
        cfg.output_parquet = Some(dir.path().join("out").join("summary.parquet"));
        run(&cfg)?;
        assert!(cfg.output_parquet.as_ref().map(|p| p.is_file()).unwrap_or(false));
        Ok(())
    }

    #[test]
    fn unresolved_role_fails_without_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = config_for(
            dir.path(),
            "answer,env,rt,outcome\nleft,shifty_2.jpg,450,left\n",
        )?;
        let err = run(&cfg).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::RoleResolution { missing, .. }) => {
                assert_eq!(missing, &vec![Role::Correct])
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!cfg.output_csv.exists());
        Ok(())
    }

    #[test]
    fn missing_input_is_unreadable() {
        let cfg = Config {
            input: "/nonexistent/book1.xlsx".into(),
            ..Config::default()
        };
        let err = summarize_trials(&cfg).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::SourceUnreadable { .. })
        ));
    }
}
