// ============================================================================
// RECONSTRUCTION — launching the external mesh reconstruction executable
// ============================================================================

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::error::SketchError;
use crate::settings::SketchSettings;

/// One invocation of the reconstruction executable.
///
/// argv: `[stage_id, view_id, hires_dir, output_dir, reconstruct_dir, view_file]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconstructionJob {
    pub executable: PathBuf,
    pub stage_id: String,
    pub view_id: String,
    pub hires_dir: PathBuf,
    pub output_dir: PathBuf,
    pub reconstruct_dir: PathBuf,
    pub view_file: PathBuf,
}

/// What the executable reported on a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuseReport {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u128,
}

impl ReconstructionJob {
    /// Build the job from settings; paths are made absolute against the
    /// current directory.
    pub fn from_settings(settings: &SketchSettings) -> Self {
        Self {
            executable: settings.reconstruction_exe.clone(),
            stage_id: settings.stage_id.clone(),
            view_id: settings.view_id.clone(),
            hires_dir: absolute(&settings.hires_dir()),
            output_dir: absolute(&settings.output_dir()),
            reconstruct_dir: absolute(&settings.reconstruct_dir()),
            view_file: absolute(&settings.view_file()),
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            self.stage_id.clone(),
            self.view_id.clone(),
            self.hires_dir.display().to_string(),
            self.output_dir.display().to_string(),
            self.reconstruct_dir.display().to_string(),
            self.view_file.display().to_string(),
        ]
    }

    /// Run to completion, blocking the calling thread.
    pub fn run(&self) -> Result<FuseReport, SketchError> {
        if !self.executable.is_file() {
            return Err(SketchError::MissingExecutable(self.executable.clone()));
        }

        crate::log_info!(
            "running {} {}",
            self.executable.display(),
            self.args().join(" ")
        );
        let start = Instant::now();
        let output = Command::new(&self.executable)
            .args(self.args())
            .output()
            .map_err(|source| SketchError::ProcessLaunch {
                path: self.executable.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code();
        log_stream("stdout", &stdout);
        log_stream("stderr", &stderr);

        if !output.status.success() {
            return Err(SketchError::ExternalProcess {
                code,
                stdout: tail(&stdout, OUTPUT_TAIL),
                stderr: tail(&stderr, OUTPUT_TAIL),
            });
        }

        Ok(FuseReport {
            code,
            stdout,
            stderr,
            elapsed_ms: start.elapsed().as_millis(),
        })
    }
}

/// Bytes of each stream kept in a failure report. The session log gets
/// everything.
const OUTPUT_TAIL: usize = 400;

fn log_stream(name: &str, text: &str) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        crate::log_info!("reconstruction {}: {}", name, line);
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Last `max` bytes of `text`, trimmed, cut on a char boundary.
fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &text[start..])
}
