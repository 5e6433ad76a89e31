//! Caller-facing frames and the decoder that produces them from raw
//! capture planes.

use rayon::prelude::*;
use yuv::{YuvPackedImage, YuvRange, YuvStandardMatrix, yuyv422_to_bgra};

use crate::{
    error::SensorError,
    types::{Calibration, Image, PixelFormat},
};

/// Pixel layout of extracted frames. Every decode path lands in packed
/// BGRA so callers see one format regardless of the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePixelFormat {
    Bgra32,
}

/// A decoded frame. Ownership moves to the caller on each pull.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: FramePixelFormat,
    pub data: Vec<u8>,
}

/// Decoder fixed to the session's calibration: color dimensions, source
/// pixel format, depth dimensions and range.
pub(crate) struct FrameDecoder {
    color_width: u32,
    color_height: u32,
    source_format: PixelFormat,
    depth_width: u32,
    depth_height: u32,
    depth_range_mm: Option<(u16, u16)>,
}

impl FrameDecoder {
    pub(crate) fn new(
        calibration: &Calibration,
        source_format: PixelFormat,
    ) -> Result<Self, SensorError> {
        let (color_width, color_height) = calibration.color_dimensions();
        if color_width == 0 || color_height == 0 {
            return Err(SensorError::device_unavailable(
                "calibration has no color resolution",
            ));
        }
        match source_format {
            PixelFormat::Bgra32 | PixelFormat::Yuy2 => {}
            other => {
                return Err(SensorError::UnsupportedFormat { format: other });
            }
        }

        let (depth_width, depth_height) = calibration.depth_mode.dimensions();
        Ok(FrameDecoder {
            color_width,
            color_height,
            source_format,
            depth_width,
            depth_height,
            depth_range_mm: calibration.depth_mode.operating_range_mm(),
        })
    }

    /// Decodes the color plane into a fresh BGRA frame. The image must
    /// match the configured dimensions exactly; no truncation or padding.
    pub(crate) fn decode_color(&self, image: &Image) -> Result<Frame, SensorError> {
        if image.format != self.source_format {
            return Err(SensorError::UnsupportedFormat {
                format: image.format,
            });
        }
        if image.dimensions() != (self.color_width, self.color_height) {
            return Err(SensorError::SizeMismatch {
                got: image.dimensions(),
                expected: (self.color_width, self.color_height),
            });
        }

        let pixels = self.color_width as usize * self.color_height as usize;
        let data = match self.source_format {
            PixelFormat::Bgra32 => {
                let expected = pixels * 4;
                if image.data.len() < expected {
                    return Err(SensorError::MalformedImage {
                        reason: format!(
                            "BGRA buffer too small: got {}, expected {expected}",
                            image.data.len()
                        ),
                    });
                }
                image.data[..expected].to_vec()
            }
            PixelFormat::Yuy2 => {
                let expected = pixels * 2;
                if image.data.len() < expected {
                    return Err(SensorError::MalformedImage {
                        reason: format!(
                            "YUY2 buffer too small: got {}, expected {expected}",
                            image.data.len()
                        ),
                    });
                }
                let packed = YuvPackedImage {
                    yuy: &image.data,
                    yuy_stride: self.color_width * 2,
                    width: self.color_width,
                    height: self.color_height,
                };
                let mut bgra = vec![0u8; pixels * 4];
                yuyv422_to_bgra(
                    &packed,
                    &mut bgra,
                    self.color_width * 4,
                    YuvRange::Full,
                    YuvStandardMatrix::Bt709,
                )
                .map_err(|err| SensorError::MalformedImage {
                    reason: format!("YUY2 decode failed: {err:?}"),
                })?;
                bgra
            }
            PixelFormat::Depth16 => unreachable!("rejected at construction"),
        };

        Ok(Frame {
            width: self.color_width,
            height: self.color_height,
            format: FramePixelFormat::Bgra32,
            data,
        })
    }

    /// Colorizes the 16-bit depth plane into a viewable BGRA frame, near
    /// depths warm and far depths cool. Pixels outside the operating range
    /// (including the sensor's zero = invalid marker) come out black.
    pub(crate) fn decode_depth(&self, image: &Image) -> Result<Frame, SensorError> {
        if image.format != PixelFormat::Depth16 {
            return Err(SensorError::UnsupportedFormat {
                format: image.format,
            });
        }
        if image.dimensions() != (self.depth_width, self.depth_height) {
            return Err(SensorError::SizeMismatch {
                got: image.dimensions(),
                expected: (self.depth_width, self.depth_height),
            });
        }
        let Some((near, far)) = self.depth_range_mm else {
            return Err(SensorError::UnsupportedFormat {
                format: PixelFormat::Depth16,
            });
        };

        let width = self.depth_width as usize;
        let expected = width * self.depth_height as usize * 2;
        if image.data.len() < expected {
            return Err(SensorError::MalformedImage {
                reason: format!(
                    "depth buffer too small: got {}, expected {expected}",
                    image.data.len()
                ),
            });
        }

        let span = (far - near).max(1) as f32;
        let mut bgra = vec![0u8; width * self.depth_height as usize * 4];
        bgra.par_chunks_mut(width * 4)
            .zip(image.data.par_chunks(width * 2))
            .for_each(|(dst_row, src_row)| {
                for (dst, src) in dst_row.chunks_mut(4).zip(src_row.chunks_exact(2)) {
                    let depth = u16::from_le_bytes([src[0], src[1]]);
                    if depth < near || depth > far {
                        dst.copy_from_slice(&[0, 0, 0, 255]);
                        continue;
                    }
                    let t = (depth - near) as f32 / span;
                    let [r, g, b] = depth_color(t);
                    dst.copy_from_slice(&[b, g, r, 255]);
                }
            });

        Ok(Frame {
            width: self.depth_width,
            height: self.depth_height,
            format: FramePixelFormat::Bgra32,
            data: bgra,
        })
    }
}

/// Gradient from warm (near, t=0) to cool (far, t=1): red, yellow, green,
/// cyan, blue. Red never increases with t and blue never decreases.
pub(crate) fn depth_color(t: f32) -> [u8; 3] {
    const STOPS: [[f32; 3]; 5] = [
        [255.0, 0.0, 0.0],
        [255.0, 255.0, 0.0],
        [0.0, 255.0, 0.0],
        [0.0, 255.0, 255.0],
        [0.0, 0.0, 255.0],
    ];
    let t = t.clamp(0.0, 1.0) * (STOPS.len() - 1) as f32;
    let lower = (t.floor() as usize).min(STOPS.len() - 2);
    let frac = t - lower as f32;
    let a = STOPS[lower];
    let b = STOPS[lower + 1];
    [
        (a[0] + (b[0] - a[0]) * frac) as u8,
        (a[1] + (b[1] - a[1]) * frac) as u8,
        (a[2] + (b[2] - a[2]) * frac) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::test_calibration;

    #[test]
    fn bgra_passthrough_preserves_pixels() {
        let calibration = test_calibration();
        let decoder = FrameDecoder::new(&calibration, PixelFormat::Bgra32).unwrap();
        let (w, h) = calibration.color_dimensions();

        let image = Image::new(w, h, PixelFormat::Bgra32, vec![0xAB; (w * h * 4) as usize]);
        let frame = decoder.decode_color(&image).unwrap();

        assert_eq!((frame.width, frame.height), (w, h));
        assert_eq!(frame.format, FramePixelFormat::Bgra32);
        assert!(frame.data.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn yuy2_decodes_to_full_size_bgra() {
        let calibration = test_calibration();
        let decoder = FrameDecoder::new(&calibration, PixelFormat::Yuy2).unwrap();
        let (w, h) = calibration.color_dimensions();

        let image = Image::new(w, h, PixelFormat::Yuy2, vec![0x80; (w * h * 2) as usize]);
        let frame = decoder.decode_color(&image).unwrap();
        assert_eq!(frame.data.len(), (w * h * 4) as usize);
    }

    #[test]
    fn depth_source_format_is_rejected_at_construction() {
        let calibration = test_calibration();
        assert!(matches!(
            FrameDecoder::new(&calibration, PixelFormat::Depth16),
            Err(SensorError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn mismatched_dimensions_never_truncate() {
        let calibration = test_calibration();
        let decoder = FrameDecoder::new(&calibration, PixelFormat::Bgra32).unwrap();

        let image = Image::new(16, 16, PixelFormat::Bgra32, vec![0; 16 * 16 * 4]);
        match decoder.decode_color(&image) {
            Err(SensorError::SizeMismatch { got, expected }) => {
                assert_eq!(got, (16, 16));
                assert_eq!(expected, calibration.color_dimensions());
            }
            other => panic!("expected SizeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn short_buffer_is_malformed_not_truncated() {
        let calibration = test_calibration();
        let decoder = FrameDecoder::new(&calibration, PixelFormat::Bgra32).unwrap();
        let (w, h) = calibration.color_dimensions();

        let image = Image::new(w, h, PixelFormat::Bgra32, vec![0; 8]);
        assert!(matches!(
            decoder.decode_color(&image),
            Err(SensorError::MalformedImage { .. })
        ));
    }

    #[test]
    fn depth_colorization_runs_warm_to_cool() {
        let near = depth_color(0.0);
        let far = depth_color(1.0);
        assert!(near[0] > near[2], "near end is warm");
        assert!(far[2] > far[0], "far end is cool");

        // Red never increases, blue never decreases across the ramp.
        let mut last = depth_color(0.0);
        for step in 1..=20 {
            let c = depth_color(step as f32 / 20.0);
            assert!(c[0] <= last[0]);
            assert!(c[2] >= last[2]);
            last = c;
        }
    }

    #[test]
    fn depth_frame_matches_depth_dimensions() {
        let calibration = test_calibration();
        let decoder = FrameDecoder::new(&calibration, PixelFormat::Bgra32).unwrap();
        let (dw, dh) = calibration.depth_mode.dimensions();

        let mm = 1500u16.to_le_bytes();
        let data: Vec<u8> = std::iter::repeat(mm)
            .take((dw * dh) as usize)
            .flatten()
            .collect();
        let image = Image::new(dw, dh, PixelFormat::Depth16, data);

        let frame = decoder.decode_depth(&image).unwrap();
        assert_eq!((frame.width, frame.height), (dw, dh));
        assert_eq!(frame.data.len(), (dw * dh * 4) as usize);
        // 1500mm sits inside the narrow-unbinned range, so not black.
        assert!(frame.data[..4].iter().take(3).any(|&b| b > 0));
    }
}
