//! Directory replay source
//!
//! Plays back every JPEG/PNG file in a directory in file-name order and
//! loops forever. Frames not already at the display size are resized.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;

use super::{Pacer, SourceConfig};
use crate::error::CaptureError;

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Loops over the images of one directory
#[derive(Debug)]
pub struct ReplaySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    width: u32,
    height: u32,
    pacer: Pacer,
}

impl ReplaySource {
    pub fn open(dir: &Path, config: &SourceConfig) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CaptureError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::Open(format!(
                "{}: no .jpg or .png files",
                dir.display()
            )));
        }

        tracing::debug!(dir = %dir.display(), files = files.len(), "Replay source opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            width: config.width,
            height: config.height,
            pacer: Pacer::new(config.fps),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl super::FrameSource for ReplaySource {
    fn describe(&self) -> String {
        format!("dir://{} ({} files)", self.dir.display(), self.files.len())
    }

    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();

        self.pacer.wait();
        let frame = image::open(path)
            .map_err(|e| CaptureError::Read(format!("{}: {}", path.display(), e)))?
            .to_rgb8();

        if frame.dimensions() == (self.width, self.height) {
            Ok(frame)
        } else {
            Ok(imageops::resize(
                &frame,
                self.width,
                self.height,
                FilterType::Triangle,
            ))
        }
    }
}
