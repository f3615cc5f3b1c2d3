use std::path::PathBuf;

use image::ColorType;
use image::ImageError;
use thiserror::Error;

use crate::compose::Placement;


pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("cannot decode uploaded image: {0}")]
    Decode(#[source] ImageError),

    #[error("cannot load frame {}: {source}", .path.display())]
    FrameLoad {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("frame {} is outside the frame root", .path.display())]
    FrameOutsideRoot { path: PathBuf },

    #[error("frame has no alpha channel (color type {color:?})")]
    MissingAlpha { color: ColorType },

    #[error("frame footprint {placement} does not fit into {width}x{height} image")]
    OutOfBounds {
        placement: Placement,
        width: u32,
        height: u32,
    },

    #[error("cannot encode jpeg: {0}")]
    Encode(#[source] ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid geometry config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("built without the `{0}` feature")]
    MissingFeature(&'static str),
}
