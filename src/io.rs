use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageEncoder, ImageError, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::SketchError;

/// Extensions offered by the open dialogs.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Encoders used for sketch exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Bmp,
}

impl ExportFormat {
    /// Pick the encoder from the path's extension, defaulting to PNG.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "jpg" | "jpeg" => ExportFormat::Jpeg,
            "bmp" => ExportFormat::Bmp,
            _ => ExportFormat::Png,
        }
    }
}

/// Decode any supported raster file into RGBA.
pub fn decode_image(path: &Path) -> Result<RgbaImage, SketchError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| SketchError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Smooth resample to `width`, height following the aspect ratio.
pub fn resize_to_width(image: &RgbaImage, width: u32) -> RgbaImage {
    let width = width.max(1);
    let height = ((image.height() as f64 * width as f64 / image.width().max(1) as f64).round()
        as u32)
        .max(1);
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Encode `image` to `path`; the format follows the extension.
pub fn write_image(image: &RgbaImage, path: &Path) -> Result<(), SketchError> {
    encode_and_write(image, path, ExportFormat::from_path(path)).map_err(|source| {
        SketchError::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;
    crate::log_info!(
        "wrote {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

/// Encode and write an image to a file. The parent directory must exist.
fn encode_and_write(image: &RgbaImage, path: &Path, format: ExportFormat) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, 95).encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        ExportFormat::Bmp => {
            BmpEncoder::new(&mut writer).encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }

    Ok(())
}

// ============================================================================
// FILE HANDLER
// ============================================================================

/// Native open dialogs for guide and drawing images. Remembers the last
/// directory so consecutive picks start in the same place.
#[derive(Default)]
pub struct FileHandler {
    pub last_dir: Option<PathBuf>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the open dialog. `None` means the user cancelled.
    pub fn pick_image(&mut self, title: &str) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .set_title(title)
            .add_filter("Image Files", IMAGE_EXTENSIONS)
            .add_filter("All Files", &["*"]);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.pick_file()?;
        self.last_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }
}
