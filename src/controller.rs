// ============================================================================
// SESSION CONTROLLER — button actions over the canvas pair and the pipeline
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;

use crate::canvas::CanvasId;
use crate::error::SketchError;
use crate::ops::graph::{GraphBackend, LibraryGraphBackend};
use crate::ops::reconstruct::ReconstructionJob;
use crate::pipeline::{Pipeline, PipelineAction, PipelineJob, PipelineOutcome};
use crate::session::Session;
use crate::settings::SketchSettings;

pub struct SessionController {
    session: Session,
    pipeline: Pipeline,
    settings: SketchSettings,
    graph: Arc<dyn GraphBackend>,
}

impl SessionController {
    /// Controller using the graph library named in `settings`.
    pub fn new(settings: SketchSettings) -> Self {
        let graph = Arc::new(LibraryGraphBackend::new(settings.graph_library.clone()));
        Self::with_backend(settings, graph)
    }

    pub fn with_backend(settings: SketchSettings, graph: Arc<dyn GraphBackend>) -> Self {
        Self {
            session: Session::new(),
            pipeline: Pipeline::new(),
            settings,
            graph,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn settings(&self) -> &SketchSettings {
        &self.settings
    }

    /// Report `result` into the status log and pass it through.
    fn report<T>(
        &mut self,
        result: Result<T, SketchError>,
        ok: impl FnOnce(&T) -> String,
    ) -> Result<T, SketchError> {
        match &result {
            Ok(v) => self.session.info(ok(v)),
            Err(e) => self.session.error(e.to_string()),
        }
        result
    }

    // ---- canvas actions -----------------------------------------------------

    pub fn clear(&mut self, id: CanvasId) {
        self.session.canvas_mut(id).clear();
        self.session.mark_changed();
    }

    pub fn clear_left(&mut self) {
        self.clear(CanvasId::Front);
    }

    pub fn clear_right(&mut self) {
        self.clear(CanvasId::Side);
    }

    /// Symmetry: mirror the front view's left half onto its right half.
    pub fn mirror(&mut self) {
        self.session.canvas_mut(CanvasId::Front).mirror_horizontally();
        self.session.mark_changed();
        self.session.info("Applied symmetry to the front view");
    }

    pub fn load_guide(&mut self, id: CanvasId, path: &Path) -> Result<(), SketchError> {
        let result = self.session.canvas_mut(id).load_guide(path);
        if result.is_ok() {
            self.session.mark_changed();
        }
        self.report(result, |_| format!("Loaded {} guide {}", id.label(), path.display()))
    }

    pub fn load_drawing(&mut self, id: CanvasId, path: &Path) -> Result<(), SketchError> {
        let result = self.session.canvas_mut(id).load_drawing(path);
        if result.is_ok() {
            self.session.mark_changed();
        }
        self.report(result, |_| format!("Loaded {} drawing {}", id.label(), path.display()))
    }

    /// Export both views: low-res into the sketch dir, full-res into the
    /// hi-res dir. Each failed export is reported and skipped.
    ///
    /// Returns the number of failed exports.
    pub fn save(&mut self) -> usize {
        let mut failures = 0;
        for id in CanvasId::ALL {
            let low = self.settings.sketch_path(id);
            let high = self.settings.hires_path(id);
            let canvas = self.session.canvas(id);
            let results = [
                canvas.export_scaled(&low, self.settings.export_width),
                canvas.export_full_resolution(&high),
            ];
            for result in results {
                if let Err(e) = result {
                    failures += 1;
                    self.session.error(e.to_string());
                }
            }
        }
        if failures == 0 {
            self.session.info(format!(
                "Saved views to {} and {}",
                self.settings.sketch_dir().display(),
                self.settings.hires_dir().display()
            ));
        }
        failures
    }

    /// Write the settings in use to `path`, creating its directory.
    pub fn save_settings(&mut self, path: &Path) -> Result<(), SketchError> {
        let result = self
            .settings
            .save_to(path)
            .map_err(|source| SketchError::Settings {
                path: path.to_path_buf(),
                source,
            });
        self.report(result, |_| format!("Settings saved to {}", path.display()))
    }

    // ---- pipeline -----------------------------------------------------------

    /// Check `action` against the state machine, do its UI-thread part and
    /// mark it in flight.
    fn prepare(&mut self, action: PipelineAction) -> Result<PipelineJob, SketchError> {
        self.pipeline.check(action)?;

        let job = match action {
            PipelineAction::BuildGraph => PipelineJob::Build {
                backend: Arc::clone(&self.graph),
                dataset_id: self.settings.dataset_id.clone(),
            },
            PipelineAction::ComputeGraph => {
                let graph = self.pipeline.state().graph().cloned().ok_or_else(|| {
                    SketchError::GraphCollaborator("no graph has been built".into())
                })?;
                // Inference runs on what was last saved, so show exactly that.
                // Both files must decode before either canvas is replaced.
                let mut drawings = Vec::with_capacity(CanvasId::ALL.len());
                for id in CanvasId::ALL {
                    let path = self.settings.sketch_path(id);
                    drawings.push((id, self.session.canvas(id).decode_drawing(&path)?));
                }
                for (id, drawing) in drawings {
                    self.session.canvas_mut(id).commit_drawing(drawing);
                }
                self.session.mark_changed();
                PipelineJob::Compute {
                    backend: Arc::clone(&self.graph),
                    graph,
                }
            }
            PipelineAction::Fuse => {
                let job = ReconstructionJob::from_settings(&self.settings);
                if !job.executable.is_file() {
                    return Err(SketchError::MissingExecutable(job.executable));
                }
                PipelineJob::Fuse { job }
            }
        };

        self.pipeline.begin(action)?;
        Ok(job)
    }

    /// Run `action` to completion on the calling thread.
    pub fn run_blocking(&mut self, action: PipelineAction) -> Result<String, SketchError> {
        let job = match self.prepare(action) {
            Ok(job) => job,
            Err(e) => return self.report(Err(e), |_| String::new()),
        };
        self.session.info(format!("{}…", action));
        let outcome = job.run();
        self.complete(outcome)
    }

    /// Start `action` on the rayon pool. The outcome is sent on `tx`, after
    /// which `on_done` runs (the GUI uses it to request a repaint). Feed the
    /// received outcome to [`SessionController::complete`].
    pub fn dispatch<F>(
        &mut self,
        action: PipelineAction,
        tx: mpsc::Sender<PipelineOutcome>,
        on_done: F,
    ) -> Result<(), SketchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let job = match self.prepare(action) {
            Ok(job) => job,
            Err(e) => return self.report(Err(e), |_| String::new()),
        };
        self.session.info(format!("{}…", action));
        rayon::spawn(move || {
            let outcome = job.run();
            let _ = tx.send(outcome);
            on_done();
        });
        Ok(())
    }

    /// Apply a finished job's outcome to the state machine and report it.
    pub fn complete(&mut self, outcome: PipelineOutcome) -> Result<String, SketchError> {
        if let PipelineOutcome::Fused(Ok(report)) = &outcome
            && !report.stderr.trim().is_empty()
        {
            crate::log_warn!("reconstruction stderr: {}", report.stderr.trim());
        }
        let result = self.pipeline.finish(outcome);
        self.report(result, |msg| msg.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PointerButton;
    use crate::ops::graph::GraphHandle;
    use crate::pipeline::PipelineState;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGraph {
        calls: Mutex<Vec<String>>,
        fail_build: bool,
        panic_build: bool,
    }

    impl GraphBackend for FakeGraph {
        fn build(&self, dataset_id: &str) -> Result<GraphHandle, SketchError> {
            self.calls.lock().unwrap().push(format!("build {dataset_id}"));
            if self.fail_build {
                return Err(SketchError::GraphCollaborator("no GPU".into()));
            }
            if self.panic_build {
                panic!("graph library aborted");
            }
            Ok(GraphHandle {
                id: 1,
                dataset_id: dataset_id.to_string(),
            })
        }

        fn compute(&self, graph: &GraphHandle) -> Result<(), SketchError> {
            self.calls.lock().unwrap().push(format!("compute {}", graph.id));
            Ok(())
        }
    }

    fn settings_in(root: &Path) -> SketchSettings {
        SketchSettings {
            data_root: root.to_path_buf(),
            reconstruction_exe: root.join("missing-exe"),
            ..Default::default()
        }
    }

    fn make_dirs(settings: &SketchSettings) {
        std::fs::create_dir_all(settings.sketch_dir()).unwrap();
        std::fs::create_dir_all(settings.hires_dir()).unwrap();
    }

    #[test]
    fn save_writes_both_resolutions() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        make_dirs(&settings);
        let mut ctl = SessionController::with_backend(settings.clone(), Arc::new(FakeGraph::default()));

        assert_eq!(ctl.save(), 0);
        for id in CanvasId::ALL {
            assert_eq!(image::image_dimensions(settings.sketch_path(id)).unwrap(), (256, 256));
            assert_eq!(image::image_dimensions(settings.hires_path(id)).unwrap(), (512, 512));
        }
        assert_eq!(ctl.pipeline().state(), &PipelineState::Idle);
    }

    #[test]
    fn save_without_directories_reports_each_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = SessionController::with_backend(
            settings_in(dir.path()),
            Arc::new(FakeGraph::default()),
        );
        assert_eq!(ctl.save(), 4);
        assert_eq!(ctl.session().error_count(), 4);
    }

    #[test]
    fn clear_and_mirror_bump_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = SessionController::with_backend(
            settings_in(dir.path()),
            Arc::new(FakeGraph::default()),
        );
        let g0 = ctl.session().generation();
        ctl.clear_left();
        ctl.clear_right();
        ctl.mirror();
        assert_eq!(ctl.session().generation(), g0 + 3);
    }

    #[test]
    fn build_twice_is_rejected_and_backend_called_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeGraph::default());
        let mut ctl = SessionController::with_backend(settings_in(dir.path()), backend.clone());

        ctl.run_blocking(PipelineAction::BuildGraph).unwrap();
        let err = ctl.run_blocking(PipelineAction::BuildGraph).unwrap_err();
        assert!(matches!(err, SketchError::ActionUnavailable { .. }));
        assert_eq!(backend.calls.lock().unwrap().as_slice(), ["build Character"]);
    }

    #[test]
    fn failed_build_stays_idle() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeGraph {
            fail_build: true,
            ..Default::default()
        });
        let mut ctl = SessionController::with_backend(settings_in(dir.path()), backend);
        assert!(ctl.run_blocking(PipelineAction::BuildGraph).is_err());
        assert_eq!(ctl.pipeline().state(), &PipelineState::Idle);
        assert!(ctl.pipeline().can(PipelineAction::BuildGraph));
    }

    #[test]
    fn compute_reloads_saved_sketches() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        make_dirs(&settings);
        let backend = Arc::new(FakeGraph::default());
        let mut ctl = SessionController::with_backend(settings, backend.clone());

        let front = ctl.session_mut().canvas_mut(CanvasId::Front);
        front.begin_stroke((100, 100), PointerButton::Primary);
        front.continue_stroke((100, 300), true);
        assert_eq!(ctl.save(), 0);
        ctl.clear_left();

        ctl.run_blocking(PipelineAction::BuildGraph).unwrap();
        ctl.run_blocking(PipelineAction::ComputeGraph).unwrap();
        assert_eq!(ctl.pipeline().state().name(), "graph computed");

        // The saved stroke came back through the 256 px export
        let p = ctl.session().canvas(CanvasId::Front).buffer().get_pixel(100, 200)[0];
        assert!(p < 128, "p = {p}");
        assert_eq!(
            backend.calls.lock().unwrap().as_slice(),
            ["build Character", "compute 1"]
        );
    }

    #[test]
    fn compute_without_saved_sketches_is_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeGraph::default());
        let mut ctl = SessionController::with_backend(settings_in(dir.path()), backend.clone());
        ctl.run_blocking(PipelineAction::BuildGraph).unwrap();

        let err = ctl.run_blocking(PipelineAction::ComputeGraph).unwrap_err();
        assert!(matches!(err, SketchError::Decode { .. }));
        assert_eq!(ctl.pipeline().state().name(), "graph built");
        assert!(!ctl.pipeline().is_busy());
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn compute_with_one_sketch_missing_leaves_both_canvases_alone() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        make_dirs(&settings);
        let mut ctl = SessionController::with_backend(settings.clone(), Arc::new(FakeGraph::default()));
        assert_eq!(ctl.save(), 0);
        std::fs::remove_file(settings.sketch_path(CanvasId::Side)).unwrap();

        let front = ctl.session_mut().canvas_mut(CanvasId::Front);
        front.begin_stroke((50, 50), PointerButton::Primary);
        front.continue_stroke((300, 300), true);
        let before = ctl.session().canvas(CanvasId::Front).buffer().clone();
        let generation = ctl.session().generation();

        ctl.run_blocking(PipelineAction::BuildGraph).unwrap();
        let err = ctl.run_blocking(PipelineAction::ComputeGraph).unwrap_err();
        assert!(matches!(err, SketchError::Decode { .. }));
        assert_eq!(ctl.session().canvas(CanvasId::Front).buffer(), &before);
        assert_eq!(ctl.session().generation(), generation);
        assert_eq!(ctl.pipeline().state().name(), "graph built");
    }

    #[test]
    fn fuse_without_executable_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        make_dirs(&settings);
        let mut ctl = SessionController::with_backend(settings, Arc::new(FakeGraph::default()));
        assert_eq!(ctl.save(), 0);
        ctl.run_blocking(PipelineAction::BuildGraph).unwrap();
        ctl.run_blocking(PipelineAction::ComputeGraph).unwrap();

        let err = ctl.run_blocking(PipelineAction::Fuse).unwrap_err();
        assert!(matches!(err, SketchError::MissingExecutable(_)));
        assert_eq!(ctl.pipeline().state().name(), "graph computed");
        assert!(ctl.pipeline().can(PipelineAction::Fuse));
    }

    #[test]
    fn dispatch_delivers_outcome_over_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = SessionController::with_backend(
            settings_in(dir.path()),
            Arc::new(FakeGraph::default()),
        );
        let (tx, rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        ctl.dispatch(PipelineAction::BuildGraph, tx, move || {
            let _ = done_tx.send(());
        })
        .unwrap();
        assert!(ctl.pipeline().is_busy());
        assert!(!ctl.pipeline().can(PipelineAction::BuildGraph));

        let outcome = rx.recv().unwrap();
        done_rx.recv().unwrap();
        ctl.complete(outcome).unwrap();
        assert_eq!(ctl.pipeline().state().name(), "graph built");
        assert!(ctl.pipeline().can(PipelineAction::ComputeGraph));
    }

    #[test]
    fn panic_on_worker_releases_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeGraph {
            panic_build: true,
            ..Default::default()
        });
        let mut ctl = SessionController::with_backend(settings_in(dir.path()), backend);
        let (tx, rx) = mpsc::channel();
        ctl.dispatch(PipelineAction::BuildGraph, tx, || {}).unwrap();

        let err = ctl.complete(rx.recv().unwrap()).unwrap_err();
        assert!(matches!(err, SketchError::JobPanicked { .. }));
        assert!(!ctl.pipeline().is_busy());
        assert!(ctl.pipeline().can(PipelineAction::BuildGraph));
    }
}
