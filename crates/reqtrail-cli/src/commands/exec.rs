//! `reqtrail exec` command implementation
//!
//! Runs a program as a console audit entry: the invocation is recorded
//! before the program starts, a failure becomes an audit error, and the
//! entry is finalized once the program exits.
//!
//! Recording is best effort. When the audit database cannot be opened the
//! program still runs and its exit code is returned unchanged.

use crate::config::open_store;
use crate::error::{CliError, Result, EXIT_SPAWN_FAILED};
use reqtrail_core::context::{CaptureContext, ConsoleRequest, RequestKind, ValueMap};
use reqtrail_core::probe::now_seconds;
use reqtrail_core::types::NewAuditError;
use reqtrail_core::AuditRecorder;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Run `program` under audit and return its exit code
///
/// `database` is `None` when no database location could be resolved; the
/// program then runs unrecorded.
pub async fn run(
    database: Option<&Path>,
    program: &str,
    args: &[String],
    capture_env: bool,
) -> Result<i32> {
    let started_at = now_seconds();
    let recorder = database.and_then(recorder_for);

    let mut entry = match &recorder {
        Some(recorder) => {
            let env = if capture_env {
                environment()
            } else {
                ValueMap::new()
            };
            let mut context = CaptureContext::new(
                started_at,
                RequestKind::Console(ConsoleRequest {
                    script_file: program.to_string(),
                    params: args.to_vec(),
                    env,
                }),
            );
            context.route = program_name(program);

            let entry = recorder.begin(&context).await;
            debug!(entry_id = ?entry.id(), program, "Recorded invocation");
            Some(entry)
        },
        None => None,
    };

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await;

    let (result, failure) = match status {
        Ok(status) => {
            let code = exit_code(status);
            let failure = (!status.success()).then(|| {
                NewAuditError::new(format!("{program} exited with {status}"))
                    .with_code(i64::from(code))
            });
            (Ok(code), failure)
        },
        Err(source) => {
            let failure = NewAuditError::new(format!("failed to start {program}: {source}"))
                .with_code(i64::from(EXIT_SPAWN_FAILED));
            let err = CliError::Spawn {
                program: program.to_string(),
                source,
            };
            (Err(err), Some(failure))
        },
    };

    if let Some(entry) = entry.as_mut() {
        if let Some(failure) = &failure {
            entry.add_error(failure).await;
        }
        entry.finalize(None).await;
        info!(
            entry_id = ?entry.id(),
            duration = ?entry.entry().duration,
            "Invocation audited"
        );
    }

    result
}

fn recorder_for(database: &Path) -> Option<AuditRecorder> {
    match open_store(database) {
        Ok(store) => Some(AuditRecorder::new(Arc::new(store))),
        Err(e) => {
            warn!(
                database = %database.display(),
                error = %e,
                "Audit database unavailable, running without recording"
            );
            None
        },
    }
}

fn environment() -> ValueMap {
    std::env::vars_os()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                JsonValue::String(value.to_string_lossy().into_owned()),
            )
        })
        .collect()
}

/// File name of the program, used as the entry's route
fn program_name(program: &str) -> Option<String> {
    Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
