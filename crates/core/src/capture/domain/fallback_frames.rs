use std::path::Path;

use ndarray::s;

use crate::shared::frame::Frame;

const PLACEHOLDER_RGB: [u8; 3] = [240, 240, 250];
const LABEL_RGB: [u8; 3] = [40, 40, 40];
const LABEL_BACKGROUND_RGB: [u8; 3] = [255, 255, 255];
const GLYPH_SCALE: usize = 4;
const LABEL_MARGIN: usize = 10;

/// 3x5 bitmaps for the digits 0-9, one row per byte, low three bits used.
const DIGIT_GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Synthetic frame source used when no camera validates.
///
/// Every frame is a copy of a base image stamped with a sequence number
/// that increases by one per call.
pub struct FallbackFrames {
    base: Frame,
    sequence: usize,
}

impl FallbackFrames {
    /// Uses the static image at `path` when it exists and decodes, otherwise
    /// a plain placeholder of `width` x `height`.
    pub fn load(path: Option<&Path>, width: u32, height: u32) -> Self {
        if let Some(path) = path {
            match std::fs::read(path).map(|bytes| Frame::decode(&bytes, 0)) {
                Ok(Ok(frame)) => {
                    log::info!("Using static fallback image {}", path.display());
                    return Self::from_frame(frame);
                }
                Ok(Err(e)) => log::warn!("Cannot decode fallback image {}: {e}", path.display()),
                Err(e) => log::debug!("No fallback image at {}: {e}", path.display()),
            }
        }
        log::info!("Using generated {width}x{height} placeholder frames");
        Self::placeholder(width, height)
    }

    pub fn placeholder(width: u32, height: u32) -> Self {
        Self::from_frame(Frame::filled(width, height, PLACEHOLDER_RGB, 0))
    }

    pub fn from_frame(base: Frame) -> Self {
        Self { base, sequence: 0 }
    }

    pub fn next_frame(&mut self) -> Frame {
        self.sequence += 1;
        let mut frame = self.base.clone().with_index(self.sequence);
        stamp_number(&mut frame, self.sequence);
        frame
    }

    /// Sequence number of the most recently produced frame.
    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

/// Draws `value` in the top-left corner on a light backing box, clipped to
/// the frame.
fn stamp_number(frame: &mut Frame, value: usize) {
    if frame.channels() < 3 {
        return;
    }
    let digits: Vec<usize> = value
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let glyph_w = 3 * GLYPH_SCALE;
    let glyph_h = 5 * GLYPH_SCALE;
    let advance = glyph_w + GLYPH_SCALE;
    let box_w = digits.len() * advance + GLYPH_SCALE;
    let box_h = glyph_h + 2 * GLYPH_SCALE;

    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let mut arr = frame.as_ndarray_mut();
    let mut fill = |x0: usize, y0: usize, x1: usize, y1: usize, rgb: [u8; 3]| {
        let (x1, y1) = (x1.min(w), y1.min(h));
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        for (c, value) in rgb.iter().enumerate() {
            arr.slice_mut(s![y0..y1, x0..x1, c]).fill(*value);
        }
    };

    fill(
        LABEL_MARGIN,
        LABEL_MARGIN,
        LABEL_MARGIN + box_w,
        LABEL_MARGIN + box_h,
        LABEL_BACKGROUND_RGB,
    );

    let origin_y = LABEL_MARGIN + GLYPH_SCALE;
    for (i, digit) in digits.iter().enumerate() {
        let origin_x = LABEL_MARGIN + GLYPH_SCALE + i * advance;
        for (row, bits) in DIGIT_GLYPHS[*digit].iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    let x = origin_x + col * GLYPH_SCALE;
                    let y = origin_y + row * GLYPH_SCALE;
                    fill(x, y, x + GLYPH_SCALE, y + GLYPH_SCALE, LABEL_RGB);
                }
            }
        }
    }
}
