use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use xunit_workitem_runner::runner::{
    ORCHESTRATION_FAILURE_EXIT_CODE, SettingsLayer, WorkItemArgs, run_work_item,
};

/// Stage, run and report an xunit work item
#[derive(Parser, Clone, Debug)]
#[command(version)]
struct Args {
    /// Test module to run, relative to the work item root
    #[arg(long)]
    dll: PathBuf,

    /// Framework assemblies are on the TPA list (informational)
    #[arg(long)]
    tpaframework: bool,

    /// Perf runner to use (informational)
    #[arg(long)]
    perf_runner: Option<String>,

    /// Assembly manifest, relative to the work item root (default: $HELIX_ASSEMBLY_LIST)
    #[arg(long = "assemblylist")]
    assembly_list: Option<PathBuf>,

    /// Runner flavor (netcore, desktop)
    #[arg(long, default_value = "netcore")]
    xunit_test_type: String,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Setting override as name=value, applied last (repeatable)
    #[arg(long = "setting")]
    settings: Vec<String>,

    #[arg(long, env = "HELIX_WORKITEM_ID")]
    workitem_id: Option<String>,

    #[arg(long, env = "HELIX_WORKITEM_FRIENDLYNAME")]
    workitem_friendly_name: Option<String>,

    #[arg(long, env = "HELIX_CORRELATION_ID")]
    correlation_id: Option<String>,

    /// Work item root directory
    #[arg(long, env = "HELIX_WORKITEM_ROOT")]
    workitem_working_dir: Option<String>,

    /// Shared correlation payload directory
    #[arg(long, env = "HELIX_CORRELATION_PAYLOAD")]
    correlation_payload_dir: Option<String>,

    /// Output destination (local path, file:// or s3://bucket/prefix)
    #[arg(long, env = "HELIX_OUTPUT_URI")]
    output_uri: Option<String>,

    /// Event destination (http(s)://, file:// or local path)
    #[arg(long, env = "HELIX_EVENT_URI")]
    event_uri: Option<String>,

    /// AWS region for s3:// output (default chain if not specified)
    #[arg(long, env = "HELIX_OUTPUT_REGION")]
    output_region: Option<String>,

    /// Quiet mode - only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing based on quiet mode; RUST_LOG takes precedence
    let default_filter = if args.quiet {
        "xunit_workitem_runner=warn"
    } else {
        "xunit_workitem_runner=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let work_item_args = WorkItemArgs {
        config_file: args.config,
        settings: SettingsLayer {
            workitem_id: args.workitem_id,
            workitem_friendly_name: args.workitem_friendly_name,
            correlation_id: args.correlation_id,
            workitem_working_dir: args.workitem_working_dir,
            correlation_payload_dir: args.correlation_payload_dir,
            output_uri: args.output_uri,
            event_uri: args.event_uri,
            output_region: args.output_region,
        },
        setting_overrides: args.settings,
        test_dll: args.dll,
        assembly_list: args.assembly_list,
        xunit_test_type: args.xunit_test_type,
        framework_in_tpa: args.tpaframework,
        perf_runner: args.perf_runner,
    };

    let exit_code = run_work_item(work_item_args).await;
    ExitCode::from(u8::try_from(exit_code).unwrap_or(ORCHESTRATION_FAILURE_EXIT_CODE as u8))
}
