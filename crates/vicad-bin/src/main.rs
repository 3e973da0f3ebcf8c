//! vicad entrypoint.
//!
//! Runs a `.vicad.ts` script through the full IPC path and reports the
//! result as a single JSON line on stdout; worker lifecycle events go to
//! stderr as structured JSON. Exit code 0 means the script executed and
//! (when requested) exported; 1 means it failed.
//!
//! Usage:
//!   vicad <path/to/script.vicad.ts>
//!   vicad model.vicad.ts --export build/model.3mf
//!   vicad model.vicad.ts --watch

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use core_replay::{LodProfile, ReplayLodPolicy};
use core_session::SceneSession;
use core_transport::{RuntimeLauncher, WorkerClient};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vicad", version, about = "vicad script runner")]
struct Args {
    /// Script to execute (.vicad.ts).
    pub script: PathBuf,
    /// Optional configuration file path (overrides discovery of `vicad.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Export the merged scene as 3MF after a successful run.
    #[arg(long = "export")]
    pub export: Option<PathBuf>,
    /// Keep polling the script and re-run it whenever its mtime advances.
    #[arg(long = "watch")]
    pub watch: bool,
    /// Poll interval for --watch, in milliseconds.
    #[arg(long = "poll-ms", default_value_t = 250)]
    pub poll_ms: u64,
}

/// File-based tracing, enabled by `VICAD_LOG_DIR`. stderr stays reserved
/// for the NDJSON event stream.
fn init_tracing() -> Option<WorkerGuard> {
    let dir = std::env::var("VICAD_LOG_DIR").ok()?;
    let appender = tracing_appender::rolling::never(dir, "vicad.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn report_pass(script: &PathBuf, objects: usize) {
    let line = serde_json::json!({
        "result": "pass",
        "script": script.display().to_string(),
        "objects": objects,
    });
    println!("{line}");
}

fn report_fail(script: &PathBuf, error: &str) {
    let line = serde_json::json!({
        "result": "fail",
        "script": script.display().to_string(),
        "error": error,
    });
    println!("{line}");
}

fn run_once(args: &Args, client: &mut WorkerClient) -> Result<usize> {
    let lod = ReplayLodPolicy {
        profile: LodProfile::Model,
        ..Default::default()
    };
    let outcome = client.execute_script_scene(&args.script, &lod)?;
    if let Some(out_path) = &args.export {
        core_session::export_scene_3mf(client, &args.script, out_path)?;
    }
    Ok(outcome.objects.len())
}

fn run_watch(args: &Args, client: &mut WorkerClient) -> ExitCode {
    let mut session = SceneSession::new(&args.script);
    let lod = ReplayLodPolicy {
        profile: LodProfile::Model,
        ..Default::default()
    };
    let mut seen_generation = 0;
    loop {
        match session.reload_if_changed(client, &lod) {
            Ok(()) => {
                if session.generation != seen_generation {
                    seen_generation = session.generation;
                    report_pass(&args.script, session.scene_objects.len());
                }
            }
            Err(e) => report_fail(&args.script, &format!("{e:#}")),
        }
        if session.ipc_start_failed {
            // The worker could never be launched; polling further is noise.
            return ExitCode::FAILURE;
        }
        std::thread::sleep(Duration::from_millis(args.poll_ms.max(10)));
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = init_tracing();

    let config = match core_config::load_from(args.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            report_fail(&args.script, &format!("config: {e:#}"));
            return ExitCode::FAILURE;
        }
    };
    let launcher = RuntimeLauncher {
        program: config.worker.runtime.clone(),
        worker_script: config.worker.script.clone(),
    };
    let mut client =
        WorkerClient::with_launcher(Box::new(launcher), config.worker.shm_capacity_bytes());

    let code = if args.watch {
        run_watch(&args, &mut client)
    } else {
        match run_once(&args, &mut client) {
            Ok(objects) => {
                report_pass(&args.script, objects);
                ExitCode::SUCCESS
            }
            Err(e) => {
                report_fail(&args.script, &format!("{e:#}"));
                ExitCode::FAILURE
            }
        }
    };
    client.shutdown();
    code
}
