//! Synthetic frame generation

use crate::frame::{PixelLayout, RawFrame};

/// Create a synthetic frame with a gradient that varies per frame number,
/// so temporal paths (encoders, sinks) see changing content.
pub fn synthetic_frame(frame_number: u64, width: u32, height: u32, layout: PixelLayout) -> RawFrame {
    let bpp = layout.bytes_per_pixel();
    let mut data = vec![0u8; width as usize * height as usize * bpp];

    let base = (frame_number % 256) as u8;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let idx = (y * width as usize + x) * bpp;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
            if bpp == 4 {
                data[idx + 3] = 255;
            }
        }
    }

    RawFrame::new(width, height, layout, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_frame_sizes() {
        let rgb = synthetic_frame(0, 8, 4, PixelLayout::Rgb);
        assert_eq!(rgb.data.len(), 8 * 4 * 3);

        let rgba = synthetic_frame(0, 8, 4, PixelLayout::Rgba);
        assert_eq!(rgba.data.len(), 8 * 4 * 4);
        assert_eq!(rgba.to_rgb().len(), 8 * 4 * 3);
    }

    #[test]
    fn test_frames_vary_by_number() {
        let a = synthetic_frame(1, 4, 4, PixelLayout::Rgb);
        let b = synthetic_frame(2, 4, 4, PixelLayout::Rgb);
        assert_ne!(a.data, b.data);
    }
}
