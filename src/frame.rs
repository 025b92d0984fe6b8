//! Raw video frames and pixel normalisation
//!
//! Sources may deliver frames with an alpha channel depending on the backend
//! and platform. The session's write path always encodes 3-channel RGB, so
//! every frame is normalised before it reaches a sink.

/// Pixel layout of a raw frame as delivered by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb,
    Rgba,
    Bgra,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba | PixelLayout::Bgra => 4,
        }
    }
}

/// One raw frame from a source.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Expected buffer length for the frame's dimensions and layout.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }

    /// Normalise to tightly-packed 3-channel RGB, dropping any alpha.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.layout {
            PixelLayout::Rgb => self.data.clone(),
            PixelLayout::Rgba => strip_alpha(&self.data, false),
            PixelLayout::Bgra => strip_alpha(&self.data, true),
        }
    }
}

fn strip_alpha(data: &[u8], swap_rb: bool) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 4 * 3);
    for px in data.chunks_exact(4) {
        if swap_rb {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        } else {
            rgb.extend_from_slice(&[px[0], px[1], px[2]]);
        }
    }
    rgb
}
