//! lanegen - lane command compiler
//!
//! Reads the camera-to-workload and workload-to-pipeline documents and prints
//! one launcher command per lane.
//!
//! Usage:
//!   lanegen                          Print the lane map as JSON
//!   lanegen --multiline              Print every branch one element per line
//!   lanegen --render --timestamp T   Include display sinks, fixed result names

use clap::Parser;
use lanegen::config::{
    CameraDocument, CompilerSettings, DEFAULT_CAMERA_CONFIG, DEFAULT_WORKLOAD_CONFIG, RenderMode,
    WorkloadDocument, load_json,
};
use lanegen::device::DeviceProfiles;
use lanegen::locator::ModelStore;
use lanegen::observability::TracingConfig;
use lanegen::pipeline::{Compiler, LaneCommands, format_multiline, split_lane};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "lanegen")]
#[command(about = "Compile camera and workload configs into per-lane launch commands")]
#[command(version)]
struct Cli {
    /// Camera-to-workload document
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CAMERA_CONFIG)]
    camera_config: PathBuf,

    /// Workload-to-pipeline document
    #[arg(long, value_name = "PATH", default_value = DEFAULT_WORKLOAD_CONFIG)]
    workload_config: PathBuf,

    /// Root of the model tree
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// Root of the benchmark video tree
    #[arg(long, value_name = "DIR")]
    videos_dir: Option<PathBuf>,

    /// Directory result files are written to
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// Directory holding all-{cpu,gpu,npu}.env
    #[arg(long, value_name = "DIR")]
    profiles_dir: Option<PathBuf>,

    /// Add a live display sink to every branch (overrides RENDER_MODE)
    #[arg(long)]
    render: bool,

    /// Timestamp used in result file names [default: now]
    #[arg(long, value_name = "YYYYMMDD_HHMMSS")]
    timestamp: Option<String>,

    /// Print each branch one element per line instead of the JSON map
    #[arg(long)]
    multiline: bool,

    /// Debug logging on stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> CompilerSettings {
        let mut settings = CompilerSettings::from_env();
        if let Some(dir) = &self.models_dir {
            settings = settings.with_models_dir(dir);
        }
        if let Some(dir) = &self.videos_dir {
            settings = settings.with_videos_dir(dir);
        }
        if let Some(dir) = &self.results_dir {
            settings = settings.with_results_dir(dir);
        }
        if let Some(dir) = &self.profiles_dir {
            settings = settings.with_profiles_dir(dir);
        }
        if self.render {
            settings = settings.with_render_mode(RenderMode::Display);
        }
        let timestamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
        settings.with_timestamp(timestamp)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logging = if cli.verbose {
        TracingConfig::verbose()
    } else {
        TracingConfig::default()
    };
    logging.init();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "compilation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> lanegen::Result<String> {
    let settings = cli.settings();
    tracing::debug!(?settings, "resolved settings");

    let cameras: CameraDocument = load_json(&cli.camera_config).unwrap_or_default();
    let workloads: WorkloadDocument = load_json(&cli.workload_config).unwrap_or_default();
    let profiles = DeviceProfiles::load(&settings.profiles_dir);
    let models = ModelStore::new(&settings.models_dir);

    let commands = Compiler::new(&settings, &profiles, &models).compile(&cameras, &workloads)?;
    if cli.multiline {
        Ok(multiline(&commands))
    } else {
        commands.to_json_pretty()
    }
}

/// Every branch of every lane, wrapped, under a `# lane` header.
///
/// A branch carrying profile text the launch grammar does not cover is
/// printed on one line.
fn multiline(commands: &LaneCommands) -> String {
    let mut sections = Vec::new();
    for (lane, command) in commands.iter() {
        let mut section = vec![format!("# {lane}")];
        for branch in split_lane(command) {
            match format_multiline(branch) {
                Ok(text) => section.push(text),
                Err(e) => {
                    tracing::warn!(lane, error = %e, "branch not wrapped");
                    section.push(branch.to_string());
                }
            }
        }
        sections.push(section.join("\n"));
    }
    sections.join("\n\n")
}
