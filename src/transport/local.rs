//! Local process runner.
//!
//! `exec_streaming` forwards the child's stdout and stderr to a sink as soon
//! as bytes arrive, so prompts without a trailing newline show up at once.
//! A copy is kept only when the caller asks for one. stdin is inherited so
//! interactive tools still work. `exec_captured` is the quiet variant used by
//! `cb exec --silent`.

use super::{CommandSpec, ExecOutput};
use crate::core::error::{RecipeError, Result};
use std::io::{ErrorKind, Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Run a command, streaming its output to `sink` while it runs. With
/// `capture` set the combined output is also returned in `ExecOutput::output`.
pub fn exec_streaming(
    spec: &CommandSpec,
    sink: &mut dyn Write,
    capture: bool,
) -> Result<ExecOutput> {
    let mut child = command(spec)?
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(spec, e))?;
    debug!(pid = child.id(), command = %spec.display(), "spawned");

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_chunks(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_chunks(stderr, tx.clone()));
    }
    drop(tx);

    let mut captured = Vec::new();
    let mut bytes = 0;
    let mut write_result = Ok(());
    for chunk in rx {
        if write_result.is_ok() {
            write_result = sink.write_all(&chunk).and_then(|_| sink.flush());
        }
        bytes += chunk.len();
        if capture {
            captured.extend_from_slice(&chunk);
        }
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait().map_err(|e| spawn_error(spec, e))?;
    write_result.map_err(RecipeError::Output)?;

    Ok(ExecOutput {
        exit_code: status.code().unwrap_or(-1),
        bytes,
        output: String::from_utf8_lossy(&captured).into_owned(),
    })
}

/// Run a command to completion without echoing anything.
pub fn exec_captured(spec: &CommandSpec) -> Result<ExecOutput> {
    let output = command(spec)?
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(spec, e))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        bytes: output.stdout.len() + output.stderr.len(),
        output: combined,
    })
}

fn command(spec: &CommandSpec) -> Result<Command> {
    let (program, args) = spec.argv.split_first().ok_or_else(|| RecipeError::Spawn {
        command: String::new(),
        reason: "empty command".to_string(),
    })?;
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(spec.cwd).envs(spec.env);
    Ok(cmd)
}

/// Pump a pipe into the channel in whatever chunks the reads return.
fn forward_chunks<R: Read + Send + 'static>(mut pipe: R, tx: Sender<Vec<u8>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> RecipeError {
    RecipeError::Spawn {
        command: spec.display(),
        reason: e.to_string(),
    }
}
