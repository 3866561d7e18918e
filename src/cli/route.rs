//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::batch::BatchRunner;
use crate::checkpoint::CheckpointStore;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_checkpoint_summary, format_plan, format_provider_list, format_report,
    format_validation_result,
};
use crate::config::{AdConfig, ConfigLoader};
use crate::error::ApiError;
use crate::feed::load_products;
use crate::output::OutputWriter;
use crate::progress::TracingProgressSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Checkpoint location inside the output directory when none is configured.
const DEFAULT_CHECKPOINT_FILE: &str = "logs/checkpoint.json";

/// Options of one `process` invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessArgs {
    pub feed: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub checkpoint: Option<PathBuf>,
    pub dry_run: bool,
    pub format: String,
}

/// Runtime context for CLI execution: workspace and the loaded configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: AdConfig,
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: AdConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &AdConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = match command {
            Commands::Process {
                feed,
                output_dir,
                concurrency,
                max_retries,
                checkpoint,
                dry_run,
                format,
            } => self.handle_process(ProcessArgs {
                feed: feed.clone(),
                output_dir: output_dir.clone(),
                concurrency: *concurrency,
                max_retries: *max_retries,
                checkpoint: checkpoint.clone(),
                dry_run: *dry_run,
                format: format.clone(),
            }),
            Commands::ValidateConfig => self.handle_validate_config(),
            Commands::Providers { format } => format_provider_list(&self.config, format),
            Commands::Checkpoint { file, format } => self.handle_checkpoint(file, format),
        };
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    /// Relative paths from the command line and config resolve against the workspace.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    /// Config with command-line overrides applied.
    pub fn effective_config(&self, args: &ProcessArgs) -> AdConfig {
        let mut config = self.config.clone();
        if let Some(dir) = &args.output_dir {
            config.output.dir = dir.clone();
        }
        config.output.dir = self.resolve(&config.output.dir);
        if let Some(n) = args.concurrency {
            config.dispatch.concurrency = n;
        }
        if let Some(n) = args.max_retries {
            config.dispatch.max_retries = n;
        }
        let checkpoint = args
            .checkpoint
            .clone()
            .or_else(|| config.dispatch.checkpoint_path.clone())
            .map(|p| self.resolve(&p))
            .unwrap_or_else(|| config.output.dir.join(DEFAULT_CHECKPOINT_FILE));
        config.dispatch.checkpoint_path = Some(checkpoint);
        config
    }

    fn handle_process(&self, args: ProcessArgs) -> Result<String, ApiError> {
        let config = self.effective_config(&args);
        let products = load_products(&self.resolve(&args.feed))?;
        let runner = BatchRunner::from_config(Arc::new(config))?;

        if args.dry_run {
            return format_plan(&runner.plan(&products), &args.format);
        }

        if let Err(errors) = runner.config().validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            )));
        }

        let writer = OutputWriter::new(&runner.config().output);
        writer.prepare()?;

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::DispatchFailed(format!("Failed to create runtime: {}", e)))?;
        let report = rt.block_on(async {
            let prepared = runner.prepare(&products)?;
            prepared
                .dispatcher
                .set_progress_sink(Arc::new(TracingProgressSink));

            let pause = prepared.dispatcher.pause_handle();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing in-flight items and pausing");
                    pause.pause();
                }
            });

            let mut report = runner.execute(prepared).await;
            interrupt.abort();

            writer
                .download_results(&mut report.results, runner.registry())
                .await;
            Ok::<_, ApiError>(report)
        })?;

        writer.write_reports(&report.results, &report.summary, &report.brands)?;
        format_report(&report, writer.root(), &args.format)
    }

    fn handle_validate_config(&self) -> Result<String, ApiError> {
        let result = self.config.validate();
        let text = format_validation_result(&result);
        match result {
            Ok(_) => Ok(text),
            Err(_) => Err(ApiError::ConfigError(text)),
        }
    }

    fn handle_checkpoint(&self, file: &Path, format: &str) -> Result<String, ApiError> {
        let path = self.resolve(file);
        let checkpoint = CheckpointStore::read(&path)?;
        format_checkpoint_summary(&path, &checkpoint, format)
    }
}
