use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineAction;

/// Every failure the session can report. None of these are fatal: the
/// controller logs them, shows them in the status bar and carries on.
#[derive(Debug, Error)]
pub enum SketchError {
    /// Bad or missing image path; the target buffer is left unchanged.
    #[error("could not decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Export failed; the export is skipped.
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The reconstruction binary is not where the settings say it is.
    #[error("reconstruction executable not found at {}", .0.display())]
    MissingExecutable(PathBuf),

    /// The reconstruction binary exists but could not be started.
    #[error("could not launch {}: {source}", path.display())]
    ProcessLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reconstruction binary ran and exited unsuccessfully. Both streams
    /// are kept, trimmed to their tails.
    #[error(
        "reconstruction exited with {}: {}",
        exit_code_label(*.code),
        output_summary(.stdout, .stderr)
    )]
    ExternalProcess {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The settings file could not be written.
    #[error("could not save settings to {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ML graph library failed to load, build or compute.
    #[error("graph collaborator failed: {0}")]
    GraphCollaborator(String),

    /// A pipeline job panicked on its worker thread.
    #[error("{action} stopped unexpectedly: {message}")]
    JobPanicked {
        action: PipelineAction,
        message: String,
    },

    /// The pipeline state machine rejected the action.
    #[error("{action} is not available while the pipeline is {state}")]
    ActionUnavailable {
        action: PipelineAction,
        state: &'static str,
    },
}

pub(crate) fn exit_code_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("code {}", c),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn output_summary(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => "no output".to_string(),
        (true, false) => format!("stderr: {}", stderr),
        (false, true) => format!("stdout: {}", stdout),
        (false, false) => format!("stderr: {} | stdout: {}", stderr, stdout),
    }
}
