use core::fmt::Debug;
use std::path::{Path, PathBuf};

use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result, bail, eyre};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{create_dir_all, write},
    process::Command,
};
use tracing::debug;

/// Values collected for one (sketch, metric) pair, aligned with `memory_sizes`
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub sketch: &'a str,
    pub metric: &'a str,
    pub memory_sizes: &'a [String],
    pub values: &'a [f64],
}

impl Series<'_> {
    /// `{sketch}-{metric}`, shared by every file produced for the pair
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.sketch, self.metric)
    }
}

#[typetag::serde(tag = "type")]
#[async_trait::async_trait]
pub trait Plot: Debug + DynClone + Send + Sync {
    fn name(&self) -> &'static str;
    /// Renders one completed series
    ///
    /// Arguments:
    /// * `series` - The sketch, metric and values to plot
    /// * `plot_path` - The folder to write into, ie. /plots
    async fn plot(&self, series: &Series<'_>, plot_path: &Path) -> Result<()>;
}
clone_trait_object!(Plot);

/// Line chart of value against memory size, drawn by an external plotting script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineChart {
    pub python: String,
    pub script: PathBuf,
    pub ext: String,
    /// Matplotlib format string
    pub style: String,
}

impl Default for LineChart {
    fn default() -> Self {
        Self {
            python: "python3".to_owned(),
            script: PathBuf::from("plots/line_chart.py"),
            ext: "jpg".to_owned(),
            style: "--*m".to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LineChartData<'a> {
    x: &'a [String],
    y: &'a [f64],
    x_label: &'a str,
    y_label: &'a str,
    title: &'a str,
    style: &'a str,
}

impl LineChart {
    pub fn chart_path(&self, series: &Series<'_>, plot_path: &Path) -> PathBuf {
        plot_path.join(format!("{}.{}", series.file_stem(), self.ext))
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for LineChart {
    fn name(&self) -> &'static str {
        "line-chart"
    }

    async fn plot(&self, series: &Series<'_>, plot_path: &Path) -> Result<()> {
        let plot_data_dir = plot_path.join("plot_data");
        create_dir_all(&plot_data_dir).await?;

        let data_path = plot_data_dir.join(format!("{}.json", series.file_stem()));
        let data = LineChartData {
            x: series.memory_sizes,
            y: series.values,
            x_label: "Memory",
            y_label: series.metric,
            title: series.sketch,
            style: &self.style,
        };
        write(&data_path, serde_json::to_string(&data)?).await?;

        let filepath = self.chart_path(series, plot_path);
        debug!("Plotting {}", filepath.display());
        let output = Command::new(&self.python)
            .arg(&self.script)
            .arg("--data")
            .arg(&data_path)
            .arg("--filepath")
            .arg(&filepath)
            .kill_on_drop(true)
            .output()
            .await
            .context(format!("Run plotting script {}", self.script.display()))?;

        if !output.status.success() {
            bail!(
                "Plotting {} failed: {}",
                filepath.display(),
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(())
    }
}

/// Writes the series as `memory,value` rows
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CsvSeries;

impl CsvSeries {
    pub fn csv_path(series: &Series<'_>, plot_path: &Path) -> PathBuf {
        plot_path.join(format!("{}.csv", series.file_stem()))
    }

    pub fn render(series: &Series<'_>) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["memory", "value"])?;
        for (size, value) in series.memory_sizes.iter().zip(series.values) {
            let value = value.to_string();
            writer.write_record([size.as_str(), value.as_str()])?;
        }
        writer
            .into_inner()
            .map_err(|err| eyre!("Flush csv series: {err}"))
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for CsvSeries {
    fn name(&self) -> &'static str {
        "csv-series"
    }

    async fn plot(&self, series: &Series<'_>, plot_path: &Path) -> Result<()> {
        create_dir_all(plot_path).await?;
        let path = Self::csv_path(series, plot_path);
        write(&path, Self::render(series)?)
            .await
            .context(format!("Write {}", path.display()))?;
        Ok(())
    }
}

/// Hands one series to every plot
pub async fn plot(plots: &[Box<dyn Plot>], series: &Series<'_>, plot_path: &Path) -> Result<()> {
    if plots.is_empty() {
        debug!("No plots");
        return Ok(());
    }
    if series.values.is_empty() {
        debug!("Nothing to plot for {}", series.file_stem());
        return Ok(());
    }

    for res in join_all(plots.iter().map(|p| p.plot(series, plot_path))).await {
        res?;
    }
    Ok(())
}
