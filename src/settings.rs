use std::path::{Path, PathBuf};

use crate::canvas::CanvasId;

/// File name shared by the low-res and hi-res export of one view.
pub fn sketch_file_name(id: CanvasId) -> String {
    format!("sketch-{}-0.png", id.file_tag())
}

/// Persistent session settings: dataset selection, pipeline paths and the
/// external collaborators' locations.
#[derive(Clone, Debug, PartialEq)]
pub struct SketchSettings {
    /// Dataset identifier passed to the graph library and used in paths.
    pub dataset_id: String,
    /// Root of the per-dataset directory trees.
    pub data_root: PathBuf,
    /// First positional argument of the reconstruction executable.
    pub stage_id: String,
    /// Two-view identifier (front + side).
    pub view_id: String,
    /// Width of the low-res sketch exports.
    pub export_width: u32,
    /// Reconstruction executable, relative to the working directory.
    pub reconstruction_exe: PathBuf,
    /// Shared library exposing the sketch graph entry points.
    pub graph_library: PathBuf,
    /// Reference view file passed to the reconstruction. Empty means
    /// `<dataset>/view/view.off`.
    pub view_file: Option<PathBuf>,
}

impl Default for SketchSettings {
    fn default() -> Self {
        Self {
            dataset_id: "Character".to_string(),
            data_root: PathBuf::from("Data"),
            stage_id: "test".to_string(),
            view_id: "FS".to_string(),
            export_width: 256,
            reconstruction_exe: PathBuf::from("Reconstruction")
                .join(format!("ReconstructMesh{}", std::env::consts::EXE_SUFFIX)),
            graph_library: PathBuf::from("Network").join(libloading::library_filename("sketchgraph")),
            view_file: None,
        }
    }
}

impl SketchSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/sketchpair/sketchpair_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\SketchPair\sketchpair_settings.cfg
    /// On macOS:   ~/Library/Application Support/SketchPair/sketchpair_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("sketchpair");
            return Some(config_dir.join("sketchpair_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("SketchPair").join("sketchpair_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("SketchPair")
                    .join("sketchpair_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("sketchpair_settings.cfg")))
        }
    }

    // ---- derived paths ------------------------------------------------------

    pub fn dataset_dir(&self) -> PathBuf {
        self.data_root.join(&self.dataset_id)
    }

    /// Low-res sketch exports, read back by the graph step.
    pub fn sketch_dir(&self) -> PathBuf {
        self.dataset_dir().join("sketch")
    }

    /// Full-resolution sketch exports, read by the reconstruction.
    pub fn hires_dir(&self) -> PathBuf {
        self.dataset_dir().join("hires")
    }

    /// Images inferred by the graph step.
    pub fn output_dir(&self) -> PathBuf {
        self.dataset_dir().join("output")
    }

    pub fn reconstruct_dir(&self) -> PathBuf {
        self.dataset_dir().join("reconstruction")
    }

    pub fn view_file(&self) -> PathBuf {
        self.view_file
            .clone()
            .unwrap_or_else(|| self.dataset_dir().join("view").join("view.off"))
    }

    pub fn sketch_path(&self, id: CanvasId) -> PathBuf {
        self.sketch_dir().join(sketch_file_name(id))
    }

    pub fn hires_path(&self, id: CanvasId) -> PathBuf {
        self.hires_dir().join(sketch_file_name(id))
    }

    // ---- persistence --------------------------------------------------------

    pub fn to_config_string(&self) -> String {
        format!(
            "dataset_id={}\n\
             data_root={}\n\
             stage_id={}\n\
             view_id={}\n\
             export_width={}\n\
             reconstruction_exe={}\n\
             graph_library={}\n\
             view_file={}\n",
            self.dataset_id,
            self.data_root.display(),
            self.stage_id,
            self.view_id,
            self.export_width,
            self.reconstruction_exe.display(),
            self.graph_library.display(),
            self.view_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
    }

    /// Parse `key=value` lines over the defaults. Unknown keys and bad values
    /// are ignored.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "dataset_id" if !val.is_empty() => s.dataset_id = val.to_string(),
                "data_root" if !val.is_empty() => s.data_root = PathBuf::from(val),
                "stage_id" if !val.is_empty() => s.stage_id = val.to_string(),
                "view_id" if !val.is_empty() => s.view_id = val.to_string(),
                "export_width" => {
                    if let Ok(w) = val.parse::<u32>()
                        && w > 0
                    {
                        s.export_width = w;
                    }
                }
                "reconstruction_exe" if !val.is_empty() => {
                    s.reconstruction_exe = PathBuf::from(val)
                }
                "graph_library" if !val.is_empty() => s.graph_library = PathBuf::from(val),
                "view_file" => {
                    s.view_file = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }

    /// Load from `path` (returns defaults if the file is missing).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                crate::log_info!("settings loaded from {}", path.display());
                Self::parse(&content)
            }
            Err(e) => {
                crate::log_warn!("settings not read from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from the platform settings path.
    pub fn load() -> Self {
        Self::settings_path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}
