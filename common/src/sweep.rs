use std::{path::Path, time::Duration};

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    config::{DEFAULT_DELAY_MS, Invocation, SweepSpec},
    driver::Driver,
    error::SweepError,
    plot::{self, Plot, Series},
    util::parse_driver_output,
};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(DEFAULT_DELAY_MS);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub sketch: String,
    pub metric: String,
    pub memory_size: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    pub sketch: String,
    pub metric: String,
    pub values: Vec<f64>,
}

/// Values per (sketch, metric) pair, each aligned with `memory_sizes`.
/// Pairs are kept in the order they completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub memory_sizes: Vec<String>,
    pub pairs: Vec<PairResult>,
}

impl ResultTable {
    pub fn new(memory_sizes: Vec<String>) -> Self {
        Self {
            memory_sizes,
            pairs: Vec::new(),
        }
    }

    pub fn get(&self, sketch: &str, metric: &str) -> Option<&[f64]> {
        self.pairs
            .iter()
            .find(|p| p.sketch == sketch && p.metric == metric)
            .map(|p| p.values.as_slice())
    }

    pub fn insert(&mut self, sketch: &str, metric: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.memory_sizes.len());
        match self
            .pairs
            .iter_mut()
            .find(|p| p.sketch == sketch && p.metric == metric)
        {
            Some(pair) => pair.values = values,
            None => self.pairs.push(PairResult {
                sketch: sketch.to_owned(),
                metric: metric.to_owned(),
                values,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn series(&self) -> impl Iterator<Item = Series<'_>> {
        self.pairs.iter().map(|p| Series {
            sketch: &p.sketch,
            metric: &p.metric,
            memory_sizes: &self.memory_sizes,
            values: &p.values,
        })
    }
}

/// Runs a sweep one invocation at a time, pausing before each one
pub struct SweepRunner<D> {
    driver: D,
    delay: Duration,
    progress: Option<ProgressBar>,
}

impl<D: Driver> SweepRunner<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            delay: DEFAULT_DELAY,
            progress: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub async fn run_one(&self, invocation: &Invocation) -> Result<InvocationResult, SweepError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let stdout = self.driver.invoke(invocation).await?;
        let value = parse_driver_output(&stdout).map_err(|failure| SweepError::Parse {
            invocation: invocation.clone(),
            output: stdout.clone(),
            failure,
        })?;
        debug!("{invocation} -> {value}");

        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        Ok(InvocationResult {
            sketch: invocation.sketch.clone(),
            metric: invocation.metric.clone(),
            memory_size: invocation.memory_size.clone(),
            value,
        })
    }

    /// Values for one pair, in `memory_sizes` order
    pub async fn run_pair(
        &self,
        sketch: &str,
        metric: &str,
        memory_sizes: &[String],
    ) -> Result<Vec<f64>, SweepError> {
        if let Some(progress) = &self.progress {
            progress.set_message(format!("{sketch} {metric}"));
        }
        let mut values = Vec::with_capacity(memory_sizes.len());
        for size in memory_sizes {
            let result = self
                .run_one(&Invocation::new(sketch, metric, size))
                .await?;
            values.push(result.value);
        }
        info!("{sketch} {metric} {values:?}");
        Ok(values)
    }

    /// Runs every invocation of `spec`, stopping at the first failure
    pub async fn run(&self, spec: &SweepSpec) -> Result<ResultTable, SweepError> {
        let mut table = ResultTable::new(spec.memory_sizes.clone());
        for (sketch, metric) in spec.pairs() {
            let values = self.run_pair(sketch, metric, &spec.memory_sizes).await?;
            table.insert(sketch, metric, values);
        }
        Ok(table)
    }
}

/// Like [`SweepRunner::run`], plotting each pair as soon as it completes.
/// A pair that fails is never plotted.
pub async fn sweep_and_plot<D: Driver>(
    runner: &SweepRunner<D>,
    spec: &SweepSpec,
    plots: &[Box<dyn Plot>],
    plot_path: &Path,
) -> eyre::Result<ResultTable> {
    let mut table = ResultTable::new(spec.memory_sizes.clone());
    for (sketch, metric) in spec.pairs() {
        let values = runner.run_pair(sketch, metric, &spec.memory_sizes).await?;
        let series = Series {
            sketch,
            metric,
            memory_sizes: &spec.memory_sizes,
            values: &values,
        };
        plot::plot(plots, &series, plot_path).await?;
        table.insert(sketch, metric, values);
    }
    Ok(table)
}
