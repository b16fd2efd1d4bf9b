use std::{collections::HashMap, fmt, path::Path, path::PathBuf, time::Duration};

use eyre::{Context, Result, bail};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;

use crate::plot::{LineChart, Plot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    pub sweep: SweepSpec,
    pub plots: Option<Vec<Box<dyn Plot>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Driver executable, run once per invocation
    pub driver: PathBuf,
    /// Arguments placed before `-n<sketch> -m <metric> -s <size>`
    pub driver_args: Option<Vec<String>>,
    /// Pause before every invocation
    pub delay_ms: u64,
    pub timeout_secs: Option<u64>,
    pub env: Option<HashMap<String, String>>,
}

/// The three axes of a sweep. The capitalised aliases accept legacy
/// `config.json` sweep files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSpec {
    #[serde(alias = "Sketch")]
    pub sketches: Vec<String>,
    #[serde(alias = "Metric")]
    pub metrics: Vec<String>,
    #[serde(alias = "Memory")]
    pub memory_sizes: Vec<String>,
}

/// One point of the sweep cross product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invocation {
    pub sketch: String,
    pub metric: String,
    pub memory_size: String,
}

/// Pause before each invocation unless `delay_ms` overrides it
pub const DEFAULT_DELAY_MS: u64 = 500;

fn default_name() -> String {
    "sweep".to_owned()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver: PathBuf::from("./driver"),
            driver_args: None,
            delay_ms: DEFAULT_DELAY_MS,
            timeout_secs: None,
            env: None,
        }
    }
}

impl Settings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_spec(sweep: SweepSpec) -> Self {
        Self {
            name: default_name(),
            settings: Settings::default(),
            sweep,
            plots: None,
        }
    }

    /// Reads a YAML config, or a JSON file holding either a full config or
    /// just the `Sketch`/`Metric`/`Memory` lists.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = read_to_string(path)
            .await
            .context(format!("Read config {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&contents)?
        } else {
            serde_yml::from_str(&contents).context("Parse YAML config")?
        };
        config.sweep.validate()?;
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(contents).context("Parse JSON")?;
        if value.get("sweep").is_some() {
            Ok(serde_json::from_value(value).context("Parse JSON config")?)
        } else {
            Ok(Self::from_spec(
                serde_json::from_value(value).context("Parse JSON sweep lists")?,
            ))
        }
    }

    /// Configured plots, or a single line chart when none are given
    pub fn plots(&self) -> Vec<Box<dyn Plot>> {
        match &self.plots {
            Some(plots) => plots.clone(),
            None => vec![Box::new(LineChart::default())],
        }
    }
}

impl SweepSpec {
    /// Sketch and metric names end up in chart file names
    pub fn validate(&self) -> Result<()> {
        for name in self.sketches.iter().chain(self.metrics.iter()) {
            if name.is_empty() {
                bail!("Sketch and metric names must not be empty");
            }
            if name.contains(['/', '\\', '\0']) {
                bail!("Invalid sketch or metric name {name:?}");
            }
        }
        Ok(())
    }

    /// Every invocation in sweep order: sketch, then metric, then memory size
    pub fn invocations(&self) -> impl Iterator<Item = Invocation> + '_ {
        iproduct!(
            self.sketches.iter(),
            self.metrics.iter(),
            self.memory_sizes.iter()
        )
        .map(|(sketch, metric, size)| Invocation::new(sketch, metric, size))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        iproduct!(self.sketches.iter(), self.metrics.iter())
            .map(|(sketch, metric)| (sketch.as_str(), metric.as_str()))
    }

    pub fn total_invocations(&self) -> usize {
        self.sketches.len() * self.metrics.len() * self.memory_sizes.len()
    }
}

impl Invocation {
    pub fn new(sketch: &str, metric: &str, memory_size: &str) -> Self {
        Self {
            sketch: sketch.to_owned(),
            metric: metric.to_owned(),
            memory_size: memory_size.to_owned(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.sketch, self.metric, self.memory_size)
    }
}
