use std::path::{Path, PathBuf};

use chrono::Local;
use common::{
    config::Config,
    driver::ProcessDriver,
    plot,
    sweep::{ResultTable, SweepRunner, sweep_and_plot},
};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::fs::{copy, create_dir_all, read_dir, read_to_string, remove_dir_all, write};
use tracing::{debug, warn};

const REPORT_FILE: &str = "results.json";

/// Everything needed to list or re-plot a finished sweep
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepReport {
    pub config: Config,
    pub table: ResultTable,
}

pub async fn run_sweep(config_file: &str, no_progress: bool, skip_plot: bool) -> Result<()> {
    let config = Config::load(config_file).await?;

    let file_prefix = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    println!(
        "Results created in folder: results/{}-{file_prefix}",
        config.name
    );
    let results_path = PathBuf::from("results").join(format!("{}-{file_prefix}", config.name));
    let plot_path = results_path.join("plots");
    create_dir_all(&plot_path).await?;

    let config_name = Path::new(config_file)
        .file_name()
        .map(|name| name.to_owned())
        .unwrap_or_else(|| "config.yaml".into());
    copy(config_file, results_path.join(config_name)).await?;

    let progress = if no_progress {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(config.sweep.total_invocations() as u64).with_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}",
            )?,
        )
    };

    let driver = ProcessDriver::from_settings(&config.settings);
    debug!(
        "Driver {} delay={:?} timeout={:?}",
        driver.program.display(),
        config.settings.delay(),
        driver.timeout
    );
    let runner = SweepRunner::new(driver)
        .with_delay(config.settings.delay())
        .with_progress(progress.clone());
    let plots = if skip_plot {
        Vec::new()
    } else {
        config.plots()
    };

    let result = sweep_and_plot(&runner, &config.sweep, &plots, &plot_path).await;
    progress.finish_and_clear();
    let table = result?;

    for pair in &table.pairs {
        println!("{} {} {:?}", pair.sketch, pair.metric, pair.values);
    }

    let report = SweepReport { config, table };
    write(
        results_path.join(REPORT_FILE),
        serde_json::to_string(&report)?,
    )
    .await?;

    debug!("Exiting");
    Ok(())
}

pub async fn print_commands(config_file: &str) -> Result<()> {
    let config = Config::load(config_file).await?;
    let driver = ProcessDriver::from_settings(&config.settings);
    for invocation in config.sweep.invocations() {
        println!("{}", driver.command_line(&invocation));
    }
    Ok(())
}

pub async fn list_sweeps() -> Result<()> {
    for (name, folder) in get_sweeps(Path::new("results")).await? {
        println!(
            "{} -> {}",
            name,
            folder
                .file_name()
                .map(|x| x.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Finished sweeps under `base`. A folder whose report cannot be read is
/// logged and left out.
async fn get_sweeps(base: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut results = Vec::new();
    let Ok(mut items) = read_dir(base).await else {
        return Ok(results);
    };
    while let Ok(Some(entry)) = items.next_entry().await {
        if entry.file_type().await?.is_dir() {
            let report_file = entry.path().join(REPORT_FILE);
            if report_file.exists() {
                match read_report(&report_file).await {
                    Ok(report) => results.push((report.config.name, entry.path())),
                    Err(e) => warn!("Skipping {}: {e:#}", entry.path().display()),
                }
            }
        }
    }
    results.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(results)
}

async fn read_report(path: &Path) -> Result<SweepReport> {
    serde_json::from_str(&read_to_string(path).await?)
        .context(format!("Parse {}", path.display()))
}

pub async fn plot(folder: &str) -> Result<()> {
    let base_path = PathBuf::from(folder);
    let plot_path = base_path.join("plots");
    _ = remove_dir_all(&plot_path).await;
    create_dir_all(&plot_path).await?;

    let report = read_report(&base_path.join(REPORT_FILE)).await?;
    let plots = report.config.plots();
    for series in report.table.series() {
        plot::plot(&plots, &series, &plot_path).await?;
    }
    Ok(())
}
