//! `chatloom run`: Run the pipeline described by `chatloom.toml`.

use std::path::PathBuf;

use chatloom_config::PipelineConfig;

use super::{CmdResult, InputArgs, read_messages, write_messages};

pub async fn run(args: InputArgs, config_path: Option<PathBuf>) -> CmdResult {
    let config = match config_path {
        Some(path) => PipelineConfig::load_with_env(&path),
        None => PipelineConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    let pipeline = config.build_pipeline()?;
    if pipeline.is_empty() {
        tracing::info!("No stages configured, passing history through unchanged");
    }

    let messages = read_messages(&args)?;
    write_messages(&pipeline.run(&messages).await?)
}
