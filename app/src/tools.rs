use std::path::Path;

use common::{
    ini::{ParserConfig, SketchTestConfig},
    tool::run_to_log,
};
use eyre::{Context, Result, bail};
use tracing::debug;

pub async fn test_config(
    sketch_name: &str,
    parameters: &str,
    test_name: &str,
    config_path: &Path,
    build_dir: &Path,
    log_file: &Path,
) -> Result<()> {
    let config = SketchTestConfig::new(sketch_name, parameters)?;
    config.write(config_path).await?;
    debug!(
        "Wrote {} parameters for {sketch_name} to {}",
        config.parameters.len(),
        config_path.display()
    );

    let args = ["-R".to_owned(), test_name.to_owned(), "-VV".to_owned()];
    let status = run_to_log("ctest", &args, Some(build_dir), Some(log_file))
        .await
        .context("Run ctest")?;
    if !status.success() {
        bail!("ctest failed for {test_name}: {status}");
    }
    println!("Test output written to {}", log_file.display());
    Ok(())
}

pub async fn parser_config(config: ParserConfig, conf_path: &Path, run: Option<&str>) -> Result<()> {
    config.write(conf_path).await?;
    debug!("Wrote parser config to {}", conf_path.display());

    if let Some(parser) = run {
        let args = ["-c".to_owned(), conf_path.to_string_lossy().into_owned()];
        let status = run_to_log(parser, &args, None, None)
            .await
            .context("Run parser")?;
        if !status.success() {
            bail!("Parser exited with {status}");
        }
    }
    Ok(())
}
