//! Configuration files read by the sketch test suite and the packet parser.

use std::{fmt::Write as _, path::Path};

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio::fs::write;

/// `[Common]` plus one section of `key = value` parameters for a sketch test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchTestConfig {
    pub sketch_name: String,
    pub parameters: Vec<(String, String)>,
}

impl SketchTestConfig {
    pub fn new(sketch_name: &str, raw_parameters: &str) -> Result<Self> {
        if sketch_name.trim().is_empty() {
            bail!("Missing sketch name");
        }
        Ok(Self {
            sketch_name: sketch_name.trim().to_owned(),
            parameters: Self::parse_parameters(raw_parameters)?,
        })
    }

    /// Parses `key=value` entries separated by `;`
    pub fn parse_parameters(raw: &str) -> Result<Vec<(String, String)>> {
        raw.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let Some((key, value)) = entry.split_once('=') else {
                    bail!("Parameter {entry:?} is not of the form key=value");
                };
                let key = key.trim();
                if key.is_empty() {
                    bail!("Parameter {entry:?} has no name");
                }
                Ok((key.to_owned(), value.trim().to_owned()))
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = format!("[Common]\n\n[{}]\n\n", self.sketch_name);
        for (key, value) in &self.parameters {
            _ = writeln!(out, "{key} = {value}");
        }
        out
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write(path, self.render())
            .await
            .context(format!("Write {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    pub packet_count: u64,
    pub flow_count: u64,
    pub epoch_num: u32,
    pub epoch_len: u64,
    pub write_to_binary_file: bool,
    pub write_to_txt_file: bool,
    pub write_to_pcap_file: bool,
    pub network_endian: bool,
    pub key_len: u32,
    pub val_timestamp: bool,
    pub val_length: bool,
    pub input_path: String,
    pub output_path: String,
}

impl ParserConfig {
    pub fn render(&self) -> String {
        let mut out = String::from("[parser]\n");
        let fields = [
            ("packet_count", self.packet_count.to_string()),
            ("flow_count", self.flow_count.to_string()),
            ("epoch_num", self.epoch_num.to_string()),
            ("epoch_len", self.epoch_len.to_string()),
            ("write_to_binary_file", self.write_to_binary_file.to_string()),
            ("write_to_txt_file", self.write_to_txt_file.to_string()),
            ("write_to_pcap_file", self.write_to_pcap_file.to_string()),
            ("network_endian", self.network_endian.to_string()),
            ("key_len", self.key_len.to_string()),
            ("val_timestamp", self.val_timestamp.to_string()),
            ("val_length", self.val_length.to_string()),
        ];
        for (key, value) in fields {
            _ = writeln!(out, "{key} = {value}");
        }
        _ = write!(
            out,
            "\ninput_path = {}\noutput_path = {}\n",
            self.input_path, self.output_path
        );
        out
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write(path, self.render())
            .await
            .context(format!("Write {}", path.display()))
    }
}
