use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

/// Serves a single image, or every image in a directory sorted by file
/// name, as consecutive RGB frames.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn open(path: &Path) -> Result<Self, FrameSourceError> {
        let paths = if path.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_file(p))
                .collect();
            if paths.is_empty() {
                return Err(FrameSourceError::NoImages(path.to_path_buf()));
            }
            paths.sort();
            paths
        } else {
            // Surface a missing file as an I/O error before decoding.
            std::fs::metadata(path)?;
            vec![path.to_path_buf()]
        };

        log::debug!("Image source {} holds {} frame(s)", path.display(), paths.len());
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };

        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        let frame = Frame::new(img.into_raw(), width, height, 3, self.next);
        self.next += 1;
        Ok(Some(frame))
    }
}

/// True when `path` has one of the supported still-image extensions.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
