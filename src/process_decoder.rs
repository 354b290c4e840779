//! Decoder adapter that talks to a separate decoder program.
//!
//! The program gets the path of a DEM file as its only positional argument,
//! reads one syndrome per line on stdin (`0`/`1` tokens) and must print one
//! line of fault output per syndrome before exiting with status 0.
//!
//! DEM files handed to a running decoder are tracked process-wide so an
//! interrupt handler can delete them with [`remove_live_artifacts`].

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::decoder::{Decoder, FaultVector, OutputFormat};
use crate::error::{CrosscheckError, Result};
use crate::syndrome_sampler::{format_syndrome, Bitstring};

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDecoderConfig {
    pub program : PathBuf,
    /// Passed before the DEM path, e.g. `["-c", script, "sh"]` to drive a shell script
    pub leading_args : Vec<String>,
    pub output_format : OutputFormat,
}

impl ProcessDecoderConfig {
    pub fn new(program : impl Into<PathBuf>, output_format : OutputFormat) -> Self {
        ProcessDecoderConfig { program: program.into(), leading_args: Vec::new(), output_format }
    }
}

#[derive(Debug)]
pub struct ProcessDecoder {
    config : ProcessDecoderConfig,
    last_artifact : Option<PathBuf>,
}

impl ProcessDecoder {
    pub fn new(config : ProcessDecoderConfig) -> Self {
        ProcessDecoder { config, last_artifact: None }
    }

    /// Where the DEM of the most recent call was written. The file is gone once the call returns.
    pub fn last_artifact(self : &Self) -> Option<&Path> {
        self.last_artifact.as_deref()
    }

    fn run_child(self : &Self, dem_path : &Path, request : &str) -> Result<Output> {
        let program = self.config.program.display().to_string();
        let mut child = Command::new(&self.config.program)
            .args(&self.config.leading_args)
            .arg(dem_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CrosscheckError::process(format!("failed to start {}: {}", program, e), ""))?;
        debug!(program = %program, pid = child.id(), "decoder started");

        let mut stdin = child.stdin.take()
            .ok_or_else(|| CrosscheckError::process(format!("no stdin pipe to {}", program), ""))?;

        // Feed stdin from a second thread so a chatty decoder cannot fill its stdout pipe and stall us
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(request.as_bytes()));
            let output = child.wait_with_output();
            (output, writer.join())
        });
        let output = output?;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                warn!(program = %program, "decoder closed stdin before reading the whole batch");
            }
            Ok(Err(e)) => {
                return Err(CrosscheckError::process(format!("writing syndromes to {}: {}", program, e), stderr_text(&output)));
            }
            Err(_) => return Err(CrosscheckError::process("stdin writer thread panicked", stderr_text(&output))),
        }

        debug!(program = %program, status = %output.status, "decoder exited");
        if !output.status.success() {
            return Err(CrosscheckError::process(format!("{} exited with {}", program, output.status), stderr_text(&output)));
        }
        Ok(output)
    }
}

impl Decoder for ProcessDecoder {
    fn decode_batch(self : &mut Self, dem_text : &str, syndromes : &[Bitstring]) -> Result<Vec<FaultVector>> {
        // Deleted when dropped, whichever way we leave this function
        let artifact = LiveArtifact::create(dem_text)?;
        self.last_artifact = Some(artifact.path.clone());

        let request = encode_request(syndromes);
        let output = self.run_child(&artifact.path, &request)?;
        parse_response(&output, syndromes.len(), self.config.output_format)
    }

    fn name(self : &Self) -> String {
        self.config.program.display().to_string()
    }
}

static LIVE_ARTIFACTS : Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn live_artifacts() -> MutexGuard<'static, Vec<PathBuf>> {
    LIVE_ARTIFACTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Delete every DEM file currently handed to a decoder program.
/// Returns how many were removed.
pub fn remove_live_artifacts() -> usize {
    live_artifacts().drain(..).filter(|path| fs::remove_file(path).is_ok()).count()
}

/// Temp DEM file, listed in `LIVE_ARTIFACTS` for as long as it exists on disk
struct LiveArtifact {
    file : Option<NamedTempFile>,
    path : PathBuf,
}

impl LiveArtifact {
    fn create(dem_text : &str) -> Result<Self> {
        let file = tempfile::Builder::new().prefix("crosscheck-").suffix(".dem").tempfile()?;
        let path = file.path().to_path_buf();
        live_artifacts().push(path.clone());
        let mut artifact = LiveArtifact { file: Some(file), path };

        if let Some(file) = artifact.file.as_mut() {
            file.write_all(dem_text.as_bytes())?;
            file.flush()?;
        }
        Ok(artifact)
    }
}

impl Drop for LiveArtifact {
    fn drop(&mut self) {
        // Delete before unlisting so an interrupt never sees an unlisted file
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                // Already gone if an interrupt handler got there first
                debug!(path = %self.path.display(), error = %e, "DEM artifact not closed cleanly");
            }
        }
        live_artifacts().retain(|p| p != &self.path);
    }
}

fn encode_request(syndromes : &[Bitstring]) -> String {
    let mut request = String::new();
    for syndrome in syndromes {
        request.push_str(&format_syndrome(syndrome));
        request.push('\n');
    }
    request
}

fn parse_response(output : &Output, expected : usize, format : OutputFormat) -> Result<Vec<FaultVector>> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = stdout.lines().collect::<Vec<_>>();
    if lines.len() != expected {
        return Err(CrosscheckError::process(
            format!("expected {} output lines, got {}", expected, lines.len()),
            stderr_text(output),
        ));
    }
    lines.iter().enumerate()
        .map(|(i, line)| format.parse_line(line)
            .map_err(|reason| CrosscheckError::process(format!("output line {}: {}", i + 1, reason), stderr_text(output))))
        .collect()
}

fn stderr_text(output : &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
