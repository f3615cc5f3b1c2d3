use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use image::ColorType;
use image::DynamicImage;
use image::ImageError;
use image::codecs::jpeg::JpegEncoder;

use super::compose;
use super::compose::FrameGeometry;
use super::compose::anchor::EyeAnchor;
use super::error::FrameError;
use super::error::FrameResult;


/// Quality the OpenCV-based predecessor wrote by default.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub struct FrameOptions {
    geometry: FrameGeometry,
    quality: u8,
    frame_root: Option<PathBuf>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            geometry: Default::default(),
            quality: DEFAULT_JPEG_QUALITY,
            frame_root: None,
        }
    }
}

impl FrameOptions {

    pub fn geometry_mut(&mut self) -> &mut FrameGeometry {
        &mut self.geometry
    }

    pub fn set_geometry(&mut self, geometry: FrameGeometry) {
        self.geometry = geometry;
    }

    pub fn set_quality(&mut self, quality: u8) {
        if quality >= 1 && quality <= 100 {
            self.quality = quality;
        }
    }

    /// Confine `frame` paths to this directory.
    pub fn set_frame_root(&mut self, path: &str) {
        self.frame_root = Some(PathBuf::from(path));
    }
}


pub fn decode_upload(bytes: &[u8]) -> FrameResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(FrameError::Decode)
}

pub fn load_frame(path: &Path) -> FrameResult<DynamicImage> {
    image::open(path).map_err(|source| FrameError::FrameLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// JPEG has no alpha, so it is dropped here.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> FrameResult<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut ofile = Vec::with_capacity((rgb.width() * rgb.height() / 4) as usize);
    JpegEncoder::new_with_quality(&mut ofile, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(FrameError::Encode)?;
    Ok(ofile)
}


pub struct Application {
    options: FrameOptions,
}

impl Application {

    pub fn new(options: FrameOptions) -> Self {
        Application {
            options
        }
    }

    pub fn resolve_frame(&self, requested: &str) -> FrameResult<PathBuf> {
        let root = match &self.options.frame_root {
            Some(root) => root,
            None => return Ok(PathBuf::from(requested)),
        };
        let load_error = |e: io::Error| FrameError::FrameLoad {
            path: PathBuf::from(requested),
            source: ImageError::IoError(e),
        };
        let root = root.canonicalize().map_err(load_error)?;
        let path = root.join(requested).canonicalize().map_err(load_error)?;
        if path.starts_with(&root) {
            Ok(path)
        } else {
            Err(FrameError::FrameOutsideRoot { path: PathBuf::from(requested) })
        }
    }

    /// Upload bytes in, JPEG bytes out.
    pub fn apply_frame(&self, upload: &[u8], frame: &str) -> FrameResult<Vec<u8>> {
        self.apply_frame_at(upload, frame, None)
    }

    /// With eyes given the frame follows them, otherwise the fixed geometry applies.
    pub fn apply_frame_at(&self, upload: &[u8], frame: &str, anchor: Option<&EyeAnchor>) -> FrameResult<Vec<u8>> {
        let base = decode_upload(upload)?;
        let overlay = load_frame(self.resolve_frame(frame)?.as_path())?;
        log::debug!("base {}x{} {:?}, frame {}x{} {:?}", base.width(), base.height(), base.color(), overlay.width(), overlay.height(), overlay.color());
        let merged = match anchor {
            Some(anchor) => compose::anchor::compose_anchored(&base, &overlay, anchor, self.options.geometry.filter())?,
            None => compose::compose(&base, &overlay, &self.options.geometry)?,
        };
        encode_jpeg(&merged, self.options.quality)
    }

    pub fn apply_file(&self, src: &Path, frame: &str, anchor: Option<&EyeAnchor>, tgt: &Path) -> FrameResult<()> {
        let upload = fs::read(src)?;
        let jpeg = self.apply_frame_at(upload.as_slice(), frame, anchor)?;
        if let Some(parent) = tgt.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(tgt, jpeg)?;
        Ok(())
    }
}
