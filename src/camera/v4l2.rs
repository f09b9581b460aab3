//! V4L2 capture device
//!
//! Requests RGB3 at the configured size and frame rate; if the driver
//! insists on another size the frames are resized to the display size.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ouroboros::self_referencing;

use super::SourceConfig;
use crate::error::CaptureError;

#[self_referencing]
struct DeviceStream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Local camera, e.g. `/dev/video0` or `v4l2:///dev/video0`
pub struct V4l2Source {
    path: String,
    state: DeviceStream,
    active_width: u32,
    active_height: u32,
    width: u32,
    height: u32,
}

impl V4l2Source {
    pub fn open(config: &SourceConfig) -> Result<Self, CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = config
            .uri
            .strip_prefix("v4l2://")
            .unwrap_or(&config.uri)
            .to_string();

        let device = v4l::Device::with_path(&path)
            .map_err(|e| CaptureError::Open(format!("{}: {}", path, e)))?;

        let mut format = device
            .format()
            .map_err(|e| CaptureError::Open(format!("{}: read format: {}", path, e)))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(e) => {
                tracing::warn!(device = %path, error = %e, "Failed to set format");
                device
                    .format()
                    .map_err(|e| CaptureError::Open(format!("{}: read format: {}", path, e)))?
            }
        };

        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(CaptureError::Open(format!(
                "{}: device does not deliver RGB3 (got {})",
                path, format.fourcc
            )));
        }

        if config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.fps);
            if let Err(e) = device.set_params(&params) {
                tracing::warn!(device = %path, error = %e, "Failed to set frame rate");
            }
        }

        let state = DeviceStreamTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| CaptureError::Open(format!("create buffer stream: {}", e)))
            },
        }
        .try_build()?;

        tracing::info!(
            device = %path,
            width = format.width,
            height = format.height,
            "Camera opened"
        );

        Ok(Self {
            path,
            state,
            active_width: format.width,
            active_height: format.height,
            width: config.width,
            height: config.height,
        })
    }
}

impl super::FrameSource for V4l2Source {
    fn describe(&self) -> String {
        format!(
            "{} ({}x{})",
            self.path, self.active_width, self.active_height
        )
    }

    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let raw = self
            .state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|e| CaptureError::Read(format!("{}: {}", self.path, e)))?;

        let expected = (self.active_width * self.active_height * 3) as usize;
        if raw.len() < expected {
            return Err(CaptureError::Read(format!(
                "{}: short frame ({} of {} bytes)",
                self.path,
                raw.len(),
                expected
            )));
        }

        let frame = RgbImage::from_raw(
            self.active_width,
            self.active_height,
            raw[..expected].to_vec(),
        )
        .ok_or_else(|| CaptureError::Read(format!("{}: bad frame buffer", self.path)))?;

        if (self.active_width, self.active_height) == (self.width, self.height) {
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
