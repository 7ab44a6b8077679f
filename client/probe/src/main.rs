use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use channel_probe::{
    load_config, EventKind, Overrides, Probe, ProbeConfig, Result, SendOptions, Suite,
};
use clap::{Args, Parser, Subcommand};
use probe_common::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "channel-probe", version, about = "Probe the channel stats API")]
struct Cli {
    /// TOML config file (default: PROBE_CONFIG_PATH, then ./config.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    #[arg(long, value_name = "CODE", global = true)]
    channel: Option<String>,

    /// Per-request timeout for every call.
    #[arg(long, value_name = "SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Pause between smoke cases.
    #[arg(long, value_name = "MS", global = true)]
    delay_ms: Option<u64>,

    /// Suffix scripted device ids so reruns look like new devices.
    #[arg(long, global = true)]
    unique_devices: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install, activate and download with bare payloads.
    Smoke,
    /// Smart install tracking and duplicate prevention.
    Install,
    /// Gallery-triggered install tracking.
    Gallery,
    /// Activation, download and multi-channel tracking.
    Tracking,
    /// Every suite in order.
    All,
    /// Send a single event.
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(long, value_name = "KIND")]
    kind: EventKind,

    #[arg(long, value_name = "ID")]
    device_id: Option<String>,

    #[arg(long)]
    real_install: bool,

    #[arg(long, value_name = "LABEL")]
    trigger_context: Option<String>,

    #[arg(long, value_name = "KEY")]
    license_key: Option<String>,

    /// Leave out the device descriptor.
    #[arg(long)]
    no_device_info: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guards = init_tracing("channel-probe");

    let overrides = Overrides {
        base_url: cli.base_url.clone(),
        channel: cli.channel.clone(),
        timeout_secs: cli.timeout_secs,
        delay_ms: cli.delay_ms,
        unique_devices: cli.unique_devices,
    };
    // File, then env, then flags; flags win.
    let config = match load_config(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config");
            return ExitCode::from(2);
        }
    };

    let mut out = io::stdout();
    match run(cli.command, &config, &mut out).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(error = %err, "probe run aborted");
            ExitCode::from(2)
        }
    }
}

impl From<SendArgs> for SendOptions {
    fn from(args: SendArgs) -> Self {
        Self {
            kind: args.kind,
            device_id: args.device_id,
            real_install: args.real_install,
            trigger_context: args.trigger_context,
            license_key: args.license_key,
            device_info: !args.no_device_info,
        }
    }
}

async fn run<W: Write>(command: Command, config: &ProbeConfig, out: &mut W) -> Result<bool> {
    let runner = Probe::new(config)?;
    let suites: Vec<Suite> = match command {
        Command::Smoke => vec![Suite::Smoke],
        Command::Install => vec![Suite::Install],
        Command::Gallery => vec![Suite::Gallery],
        Command::Tracking => vec![Suite::Tracking],
        Command::All => Suite::ALL.to_vec(),
        Command::Send(args) => return runner.send_event(out, &args.into()).await,
    };
    runner.run_suites(&suites, out).await
}
