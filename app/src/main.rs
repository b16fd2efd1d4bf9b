use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use common::ini::ParserConfig;
use eyre::Result;
use tokio::fs::create_dir_all;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod sweep;
mod tools;

const MODULES: &[&str] = &["common"];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = false)]
    no_progress: bool,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List finished sweeps
    Ls,
    /// Run a sweep
    Sweep {
        #[arg(short, long, default_value = "config.yaml")]
        config_file: String,
        /// Do not generate plots
        #[arg(long, default_value_t = false)]
        skip_plot: bool,
    },
    /// Print the driver commands a sweep would run
    Print {
        #[arg(short, long, default_value = "config.yaml")]
        config_file: String,
    },
    /// Generate plots for a finished sweep
    Plot {
        /// Sweep folder
        #[arg(short, long)]
        folder: String,
    },
    /// Write a sketch test config and run the test through ctest
    TestConfig {
        #[arg(long)]
        sketch_name: String,
        /// `key=value` pairs separated by `;`
        #[arg(long, default_value = "")]
        parameters: String,
        /// ctest name filter
        #[arg(long)]
        test_name: String,
        #[arg(long, default_value = "../test/config.ini")]
        config_path: PathBuf,
        #[arg(long, default_value = "../build")]
        build_dir: PathBuf,
        #[arg(long, default_value = "result.log")]
        log_file: PathBuf,
    },
    /// Write a packet parser config, optionally running the parser
    ParserConfig {
        #[command(flatten)]
        config: ParserArgs,
        #[arg(long, default_value = "parser.conf")]
        conf_path: PathBuf,
        #[arg(long, default_value_t = false)]
        run: bool,
        #[arg(long, default_value = "../bin/parser")]
        parser: String,
    },
}

#[derive(Args)]
struct ParserArgs {
    #[arg(long)]
    packet_count: u64,
    #[arg(long)]
    flow_count: u64,
    #[arg(long, default_value_t = 1)]
    epoch_num: u32,
    #[arg(long)]
    epoch_len: u64,
    #[arg(long, default_value_t = false)]
    write_to_binary_file: bool,
    #[arg(long, default_value_t = false)]
    write_to_txt_file: bool,
    #[arg(long, default_value_t = false)]
    write_to_pcap_file: bool,
    #[arg(long, default_value_t = false)]
    network_endian: bool,
    #[arg(long, default_value_t = 13)]
    key_len: u32,
    #[arg(long, default_value_t = false)]
    val_timestamp: bool,
    #[arg(long, default_value_t = false)]
    val_length: bool,
    #[arg(long)]
    input_path: String,
    #[arg(long)]
    output_path: String,
}

impl From<ParserArgs> for ParserConfig {
    fn from(args: ParserArgs) -> Self {
        ParserConfig {
            packet_count: args.packet_count,
            flow_count: args.flow_count,
            epoch_num: args.epoch_num,
            epoch_len: args.epoch_len,
            write_to_binary_file: args.write_to_binary_file,
            write_to_txt_file: args.write_to_txt_file,
            write_to_pcap_file: args.write_to_pcap_file,
            network_endian: args.network_endian,
            key_len: args.key_len,
            val_timestamp: args.val_timestamp,
            val_length: args.val_length,
            input_path: args.input_path,
            output_path: args.output_path,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("sketch_bench={log_level}"));

    if !args.log.is_empty() {
        for log in &args.log {
            env_filter = env_filter.add_directive(log.parse()?);
        }
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    match args.command {
        Commands::Ls => sweep::list_sweeps().await?,
        Commands::Sweep {
            config_file,
            skip_plot,
        } => {
            create_dir_all("results").await?;
            if let Err(err) = sweep::run_sweep(&config_file, args.no_progress, skip_plot).await {
                error!("{err:#?}");
                return Err(err);
            }
        }
        Commands::Print { config_file } => sweep::print_commands(&config_file).await?,
        Commands::Plot { folder } => sweep::plot(&folder).await?,
        Commands::TestConfig {
            sketch_name,
            parameters,
            test_name,
            config_path,
            build_dir,
            log_file,
        } => {
            tools::test_config(
                &sketch_name,
                &parameters,
                &test_name,
                &config_path,
                &build_dir,
                &log_file,
            )
            .await?
        }
        Commands::ParserConfig {
            config,
            conf_path,
            run,
            parser,
        } => tools::parser_config(config.into(), &conf_path, run.then_some(parser.as_str())).await?,
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn sweep_defaults_to_config_yaml() {
        let cli = Cli::try_parse_from(["sketch-bench", "--no-progress", "sweep"]).unwrap();
        assert!(cli.no_progress);
        match cli.command {
            Commands::Sweep {
                config_file,
                skip_plot,
            } => {
                assert_eq!(config_file, "config.yaml");
                assert!(!skip_plot);
            }
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn parser_flags_map_onto_the_config() {
        let cli = Cli::try_parse_from([
            "sketch-bench",
            "parser-config",
            "--packet-count",
            "1000",
            "--flow-count",
            "10",
            "--epoch-len",
            "500",
            "--write-to-pcap-file",
            "--input-path",
            "trace.pcap",
            "--output-path",
            "out",
        ])
        .unwrap();
        let Commands::ParserConfig {
            config, run, parser, ..
        } = cli.command
        else {
            panic!("expected parser-config");
        };
        assert!(!run);
        assert_eq!(parser, "../bin/parser");
        let config = ParserConfig::from(config);
        assert!(config.write_to_pcap_file);
        assert!(!config.write_to_txt_file);
        assert_eq!(config.epoch_num, 1);
        assert_eq!(config.input_path, "trace.pcap");
    }
}
