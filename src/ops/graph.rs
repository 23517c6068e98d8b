// ============================================================================
// SKETCH GRAPH — bridge to the external ML graph library
// ============================================================================
//
// Uses `libloading` to load the graph library at runtime so the binary has NO
// compile-time dependency on it. The library exports two C entry points:
//
//   int64_t sketch_graph_build(const char *dataset_id);   // handle, < 0 on error
//   int32_t sketch_graph_compute(int64_t handle);         // 0 on success
//
// `compute` writes its inferred images into the dataset's output directory;
// nothing is read back here.

use std::ffi::{CString, c_char};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::SketchError;

type BuildFn = unsafe extern "C" fn(*const c_char) -> i64;
type ComputeFn = unsafe extern "C" fn(i64) -> i32;

const BUILD_SYMBOL: &[u8] = b"sketch_graph_build\0";
const COMPUTE_SYMBOL: &[u8] = b"sketch_graph_compute\0";

/// Opaque graph built for one dataset, reused for inference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphHandle {
    pub id: i64,
    pub dataset_id: String,
}

impl fmt::Display for GraphHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph #{} ({})", self.id, self.dataset_id)
    }
}

/// The two calls the session makes into the ML collaborator.
pub trait GraphBackend: Send + Sync {
    fn build(&self, dataset_id: &str) -> Result<GraphHandle, SketchError>;
    fn compute(&self, graph: &GraphHandle) -> Result<(), SketchError>;
}

/// [`GraphBackend`] backed by a dynamically loaded shared library.
///
/// The library is opened on the first `build` and stays loaded for the rest
/// of the session, since graph handles live inside it.
pub struct LibraryGraphBackend {
    path: PathBuf,
    library: Mutex<Option<libloading::Library>>,
}

impl LibraryGraphBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            library: Mutex::new(None),
        }
    }

    fn with_library<T>(
        &self,
        load: bool,
        f: impl FnOnce(&libloading::Library) -> Result<T, SketchError>,
    ) -> Result<T, SketchError> {
        let mut guard = self
            .library
            .lock()
            .map_err(|_| SketchError::GraphCollaborator("graph library lock poisoned".into()))?;
        if guard.is_none() {
            if !load {
                return Err(SketchError::GraphCollaborator(
                    "graph library is not loaded; build the graph first".into(),
                ));
            }
            if !self.path.is_file() {
                return Err(SketchError::GraphCollaborator(format!(
                    "graph library not found: {}",
                    self.path.display()
                )));
            }
            // SAFETY: loading runs the library's initialisers; the path comes
            // from the user's settings.
            let lib = unsafe { libloading::Library::new(&self.path) }.map_err(|e| {
                SketchError::GraphCollaborator(format!(
                    "failed to load {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            crate::log_info!("graph library loaded from {}", self.path.display());
            *guard = Some(lib);
        }
        match guard.as_ref() {
            Some(lib) => f(lib),
            None => Err(SketchError::GraphCollaborator("graph library unavailable".into())),
        }
    }
}

fn missing_symbol(name: &[u8], e: libloading::Error) -> SketchError {
    let name = String::from_utf8_lossy(&name[..name.len() - 1]);
    SketchError::GraphCollaborator(format!("symbol {} not found: {}", name, e))
}

impl GraphBackend for LibraryGraphBackend {
    fn build(&self, dataset_id: &str) -> Result<GraphHandle, SketchError> {
        let c_dataset = CString::new(dataset_id).map_err(|_| {
            SketchError::GraphCollaborator(format!("invalid dataset id {:?}", dataset_id))
        })?;
        self.with_library(true, |lib| {
            // SAFETY: signature fixed by the library's C header.
            let id = unsafe {
                let build: libloading::Symbol<BuildFn> =
                    lib.get(BUILD_SYMBOL).map_err(|e| missing_symbol(BUILD_SYMBOL, e))?;
                build(c_dataset.as_ptr())
            };
            if id < 0 {
                return Err(SketchError::GraphCollaborator(format!(
                    "sketch_graph_build({}) returned {}",
                    dataset_id, id
                )));
            }
            Ok(GraphHandle {
                id,
                dataset_id: dataset_id.to_string(),
            })
        })
    }

    fn compute(&self, graph: &GraphHandle) -> Result<(), SketchError> {
        self.with_library(false, |lib| {
            // SAFETY: as above.
            let status = unsafe {
                let compute: libloading::Symbol<ComputeFn> =
                    lib.get(COMPUTE_SYMBOL).map_err(|e| missing_symbol(COMPUTE_SYMBOL, e))?;
                compute(graph.id)
            };
            if status != 0 {
                return Err(SketchError::GraphCollaborator(format!(
                    "sketch_graph_compute({}) returned {}",
                    graph, status
                )));
            }
            Ok(())
        })
    }
}
