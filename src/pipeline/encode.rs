use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::EncodeError;

/// Encode an RGB frame as baseline JPEG
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Bytes, EncodeError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError(format!("empty frame {}x{}", width, height)));
    }

    // Typical camera frames compress to roughly a tenth of raw size
    let mut buf = Vec::with_capacity(frame.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(frame)
        .map_err(|e| EncodeError(e.to_string()))?;

    Ok(Bytes::from(buf))
}
