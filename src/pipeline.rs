// ============================================================================
// PIPELINE — build graph → compute graph → fuse
// ============================================================================
//
// The three pipeline buttons gate each other. Each action is checked against
// the current state before it starts, runs as a job (synchronously from the
// CLI, on the rayon pool from the GUI) and only moves the state forward when
// its outcome is a success.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::SketchError;
use crate::ops::graph::{GraphBackend, GraphHandle};
use crate::ops::reconstruct::{FuseReport, ReconstructionJob};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineAction {
    BuildGraph,
    ComputeGraph,
    Fuse,
}

impl PipelineAction {
    pub const ALL: [PipelineAction; 3] = [
        PipelineAction::BuildGraph,
        PipelineAction::ComputeGraph,
        PipelineAction::Fuse,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PipelineAction::BuildGraph => "Build Graph",
            PipelineAction::ComputeGraph => "Compute Graph",
            PipelineAction::Fuse => "Fuse",
        }
    }
}

impl fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    GraphBuilt { graph: GraphHandle },
    GraphComputed { graph: GraphHandle },
    Fused { graph: GraphHandle },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::GraphBuilt { .. } => "graph built",
            PipelineState::GraphComputed { .. } => "graph computed",
            PipelineState::Fused { .. } => "fused",
        }
    }

    pub fn graph(&self) -> Option<&GraphHandle> {
        match self {
            PipelineState::Idle => None,
            PipelineState::GraphBuilt { graph }
            | PipelineState::GraphComputed { graph }
            | PipelineState::Fused { graph } => Some(graph),
        }
    }

    /// Whether `action` may start from this state.
    pub fn allows(&self, action: PipelineAction) -> bool {
        matches!(
            (self, action),
            (PipelineState::Idle, PipelineAction::BuildGraph)
                | (PipelineState::GraphBuilt { .. }, PipelineAction::ComputeGraph)
                | (PipelineState::GraphComputed { .. }, PipelineAction::Fuse)
                | (PipelineState::Fused { .. }, PipelineAction::Fuse)
        )
    }
}

/// A prepared unit of pipeline work. Owns everything it needs so it can be
/// moved to a worker thread.
pub enum PipelineJob {
    Build {
        backend: Arc<dyn GraphBackend>,
        dataset_id: String,
    },
    Compute {
        backend: Arc<dyn GraphBackend>,
        graph: GraphHandle,
    },
    Fuse {
        job: ReconstructionJob,
    },
}

impl PipelineJob {
    fn action(&self) -> PipelineAction {
        match self {
            PipelineJob::Build { .. } => PipelineAction::BuildGraph,
            PipelineJob::Compute { .. } => PipelineAction::ComputeGraph,
            PipelineJob::Fuse { .. } => PipelineAction::Fuse,
        }
    }

    /// Execute, blocking the calling thread. A panic inside the job (for
    /// example in the graph library) becomes a failed outcome so the
    /// in-flight slot is always released.
    pub fn run(self) -> PipelineOutcome {
        let action = self.action();
        panic::catch_unwind(AssertUnwindSafe(|| self.execute())).unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            crate::log_err!("{} panicked: {}", action, message);
            PipelineOutcome::failed(action, SketchError::JobPanicked { action, message })
        })
    }

    fn execute(self) -> PipelineOutcome {
        match self {
            PipelineJob::Build {
                backend,
                dataset_id,
            } => PipelineOutcome::GraphBuilt(backend.build(&dataset_id)),
            PipelineJob::Compute { backend, graph } => {
                PipelineOutcome::GraphComputed(backend.compute(&graph))
            }
            PipelineJob::Fuse { job } => PipelineOutcome::Fused(job.run()),
        }
    }
}

/// Result of a finished [`PipelineJob`].
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum PipelineOutcome {
    GraphBuilt(Result<GraphHandle, SketchError>),
    GraphComputed(Result<(), SketchError>),
    Fused(Result<FuseReport, SketchError>),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl PipelineOutcome {
    /// Failed outcome for `action`.
    pub fn failed(action: PipelineAction, err: SketchError) -> Self {
        match action {
            PipelineAction::BuildGraph => PipelineOutcome::GraphBuilt(Err(err)),
            PipelineAction::ComputeGraph => PipelineOutcome::GraphComputed(Err(err)),
            PipelineAction::Fuse => PipelineOutcome::Fused(Err(err)),
        }
    }

    pub fn action(&self) -> PipelineAction {
        match self {
            PipelineOutcome::GraphBuilt(_) => PipelineAction::BuildGraph,
            PipelineOutcome::GraphComputed(_) => PipelineAction::ComputeGraph,
            PipelineOutcome::Fused(_) => PipelineAction::Fuse,
        }
    }
}

/// Explicit state machine plus the single in-flight slot.
#[derive(Debug, Default)]
pub struct Pipeline {
    state: PipelineState,
    in_flight: Option<PipelineAction>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn in_flight(&self) -> Option<PipelineAction> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the button for `action` should be enabled.
    pub fn can(&self, action: PipelineAction) -> bool {
        self.in_flight.is_none() && self.state.allows(action)
    }

    pub fn check(&self, action: PipelineAction) -> Result<(), SketchError> {
        if self.can(action) {
            Ok(())
        } else {
            Err(SketchError::ActionUnavailable {
                action,
                state: if self.is_busy() { "busy" } else { self.state.name() },
            })
        }
    }

    /// Mark `action` as started.
    pub fn begin(&mut self, action: PipelineAction) -> Result<(), SketchError> {
        self.check(action)?;
        self.in_flight = Some(action);
        Ok(())
    }

    /// Apply a finished job. The state only advances on success; on failure
    /// it is left as it was and the error is handed back.
    pub fn finish(&mut self, outcome: PipelineOutcome) -> Result<String, SketchError> {
        let action = outcome.action();
        if self.in_flight != Some(action) {
            crate::log_warn!("dropping {} result: no matching job in flight", action);
            return Err(SketchError::ActionUnavailable {
                action,
                state: self.state.name(),
            });
        }
        self.in_flight = None;

        match outcome {
            PipelineOutcome::GraphBuilt(result) => {
                let graph = result?;
                let msg = format!("Built {}", graph);
                self.state = PipelineState::GraphBuilt { graph };
                Ok(msg)
            }
            PipelineOutcome::GraphComputed(result) => {
                result?;
                let Some(graph) = self.state.graph().cloned() else {
                    return Err(SketchError::GraphCollaborator(
                        "computed without a graph".into(),
                    ));
                };
                let msg = format!("Computed {}", graph);
                self.state = PipelineState::GraphComputed { graph };
                Ok(msg)
            }
            PipelineOutcome::Fused(result) => {
                let report = result?;
                let Some(graph) = self.state.graph().cloned() else {
                    return Err(SketchError::GraphCollaborator("fused without a graph".into()));
                };
                self.state = PipelineState::Fused { graph };
                Ok(format!(
                    "Reconstruction finished with {} in {} ms{}",
                    crate::error::exit_code_label(report.code),
                    report.elapsed_ms,
                    last_line(&report.stdout)
                        .map(|l| format!(": {}", l))
                        .unwrap_or_default()
                ))
            }
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> GraphHandle {
        GraphHandle {
            id: 7,
            dataset_id: "Character".into(),
        }
    }

    fn report() -> FuseReport {
        FuseReport {
            code: Some(0),
            stdout: "loading\nmesh written\n\n".into(),
            stderr: String::new(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn only_build_is_available_at_start() {
        let p = Pipeline::new();
        assert!(p.can(PipelineAction::BuildGraph));
        assert!(!p.can(PipelineAction::ComputeGraph));
        assert!(!p.can(PipelineAction::Fuse));
    }

    #[test]
    fn happy_path_walks_every_state() {
        let mut p = Pipeline::new();
        p.begin(PipelineAction::BuildGraph).unwrap();
        assert!(p.is_busy());
        assert!(!p.can(PipelineAction::BuildGraph));
        p.finish(PipelineOutcome::GraphBuilt(Ok(graph()))).unwrap();
        assert_eq!(p.state(), &PipelineState::GraphBuilt { graph: graph() });

        p.begin(PipelineAction::ComputeGraph).unwrap();
        assert_eq!(p.state().graph(), Some(&graph()));
        p.finish(PipelineOutcome::GraphComputed(Ok(()))).unwrap();
        assert_eq!(p.state().name(), "graph computed");

        p.begin(PipelineAction::Fuse).unwrap();
        let msg = p.finish(PipelineOutcome::Fused(Ok(report()))).unwrap();
        assert!(msg.ends_with(": mesh written"), "{msg}");
        assert_eq!(p.state(), &PipelineState::Fused { graph: graph() });

        // Fuse can be repeated
        assert!(p.can(PipelineAction::Fuse));
        assert!(!p.can(PipelineAction::BuildGraph));
    }

    #[test]
    fn second_build_is_rejected() {
        let mut p = Pipeline::new();
        p.begin(PipelineAction::BuildGraph).unwrap();
        p.finish(PipelineOutcome::GraphBuilt(Ok(graph()))).unwrap();

        let err = p.begin(PipelineAction::BuildGraph).unwrap_err();
        assert!(matches!(
            err,
            SketchError::ActionUnavailable {
                action: PipelineAction::BuildGraph,
                state: "graph built"
            }
        ));
        assert!(!p.is_busy());
    }

    #[test]
    fn failures_do_not_advance() {
        let mut p = Pipeline::new();
        p.begin(PipelineAction::BuildGraph).unwrap();
        let err = p
            .finish(PipelineOutcome::GraphBuilt(Err(SketchError::GraphCollaborator(
                "boom".into(),
            ))))
            .unwrap_err();
        assert!(matches!(err, SketchError::GraphCollaborator(_)));
        assert_eq!(p.state(), &PipelineState::Idle);
        assert!(p.can(PipelineAction::BuildGraph));

        p.begin(PipelineAction::BuildGraph).unwrap();
        p.finish(PipelineOutcome::GraphBuilt(Ok(graph()))).unwrap();
        p.begin(PipelineAction::ComputeGraph).unwrap();
        p.finish(PipelineOutcome::GraphComputed(Ok(()))).unwrap();

        p.begin(PipelineAction::Fuse).unwrap();
        let err = p
            .finish(PipelineOutcome::Fused(Err(SketchError::ExternalProcess {
                code: Some(1),
                stdout: String::new(),
                stderr: String::new(),
            })))
            .unwrap_err();
        assert!(matches!(err, SketchError::ExternalProcess { .. }));
        assert_eq!(p.state().name(), "graph computed");
    }

    #[test]
    fn fuse_before_compute_is_unavailable() {
        let mut p = Pipeline::new();
        assert!(p.begin(PipelineAction::Fuse).is_err());
        p.begin(PipelineAction::BuildGraph).unwrap();
        p.finish(PipelineOutcome::GraphBuilt(Ok(graph()))).unwrap();
        assert!(p.begin(PipelineAction::Fuse).is_err());
    }

    #[test]
    fn stray_outcome_is_ignored() {
        let mut p = Pipeline::new();
        assert!(p.finish(PipelineOutcome::GraphBuilt(Ok(graph()))).is_err());
        assert_eq!(p.state(), &PipelineState::Idle);
    }

    struct PanickingGraph;

    impl GraphBackend for PanickingGraph {
        fn build(&self, _dataset_id: &str) -> Result<GraphHandle, SketchError> {
            panic!("native library crashed")
        }

        fn compute(&self, _graph: &GraphHandle) -> Result<(), SketchError> {
            Ok(())
        }
    }

    #[test]
    fn panicking_job_becomes_a_failed_outcome() {
        let job = PipelineJob::Build {
            backend: Arc::new(PanickingGraph),
            dataset_id: "Character".into(),
        };
        let outcome = job.run();
        assert_eq!(outcome.action(), PipelineAction::BuildGraph);

        let mut p = Pipeline::new();
        p.begin(PipelineAction::BuildGraph).unwrap();
        let err = p.finish(outcome).unwrap_err();
        assert!(err.to_string().contains("native library crashed"), "{err}");
        assert!(!p.is_busy());
        assert!(p.can(PipelineAction::BuildGraph));
    }

    #[test]
    fn busy_state_is_reported() {
        let mut p = Pipeline::new();
        p.begin(PipelineAction::BuildGraph).unwrap();
        let err = p.check(PipelineAction::BuildGraph).unwrap_err();
        assert!(err.to_string().contains("busy"));
    }
}
