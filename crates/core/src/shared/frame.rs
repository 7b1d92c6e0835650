use std::io::Cursor;

use ndarray::{s, ArrayView3, ArrayViewMut3};

use crate::shared::embedding::FaceLocation;

/// A single captured frame: contiguous RGB bytes in row-major order.
///
/// `index` is the capture sequence number within a session. Format
/// conversion (device pixel formats, JPEG) happens at I/O boundaries only.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Solid-colour RGB frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width as usize) * (height as usize) * 3)
            .collect();
        Self::new(data, width, height, 3, index)
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    /// Decodes any format the `image` crate understands into an RGB frame.
    pub fn decode(bytes: &[u8], index: usize) -> Result<Self, image::ImageError> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        Ok(Self::from_rgb_image(rgb, index))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mean over every byte of every channel, in `0.0..=255.0`.
    pub fn mean_brightness(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let total: u64 = self.data.iter().map(|&b| b as u64).sum();
        total as f64 / self.data.len() as f64
    }

    /// Encodes the frame as a baseline JPEG.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let image = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        let mut out = Cursor::new(Vec::new());
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&image)?;
        Ok(out.into_inner())
    }

    /// Draws a rectangle outline around `location`, clipped to the frame.
    pub fn outline(&mut self, location: &FaceLocation, rgb: [u8; 3], thickness: u32) {
        if self.width == 0 || self.height == 0 || self.channels < 3 {
            return;
        }
        let max_x = self.width as usize - 1;
        let max_y = self.height as usize - 1;
        let left = (location.left.max(0) as usize).min(max_x);
        let right = (location.right.max(0) as usize).min(max_x);
        let top = (location.top.max(0) as usize).min(max_y);
        let bottom = (location.bottom.max(0) as usize).min(max_y);
        if left > right || top > bottom {
            return;
        }
        let t = thickness.max(1) as usize;

        let mut arr = self.as_ndarray_mut();
        for (c, value) in rgb.iter().enumerate() {
            let top_end = (top + t).min(bottom + 1);
            let bottom_start = bottom.saturating_sub(t - 1).max(top);
            let left_end = (left + t).min(right + 1);
            let right_start = right.saturating_sub(t - 1).max(left);
            arr.slice_mut(s![top..top_end, left..=right, c]).fill(*value);
            arr.slice_mut(s![bottom_start..=bottom, left..=right, c]).fill(*value);
            arr.slice_mut(s![top..=bottom, left..left_end, c]).fill(*value);
            arr.slice_mut(s![top..=bottom, right_start..=right, c]).fill(*value);
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
