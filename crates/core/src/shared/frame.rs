use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use ndarray::{Array2, ArrayView3};
use thiserror::Error;

use crate::shared::geometry::Rect;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("frame buffer does not match {width}x{height}x{channels}")]
    BufferMismatch { width: u32, height: u32, channels: u8 },
}

/// A single video frame: contiguous interleaved bytes in row-major order.
///
/// One channel is treated as gray, three as RGB. Format conversion happens at
/// I/O boundaries only; detection and matching read pixels through
/// [`Frame::as_ndarray`] or [`Frame::to_luma`].
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

    /// A 0x0 frame, used for "no template".
    pub fn empty(channels: u8) -> Self {
        Self::new(Vec::new(), 0, 0, channels, 0)
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

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the part of `rect` that lies inside the frame.
    ///
    /// Portions outside the frame are dropped, so the result may be smaller
    /// than `rect` or empty. The frame index is carried over.
    pub fn crop(&self, rect: &Rect) -> Frame {
        let r = rect.intersect(&self.bounds());
        if r.is_empty() {
            return Frame::new(Vec::new(), 0, 0, self.channels, self.index);
        }

        let c = self.channels as usize;
        let row_len = r.width as usize * c;
        let stride = self.width as usize * c;
        let mut data = Vec::with_capacity(row_len * r.height as usize);
        for y in r.y as usize..(r.y + r.height) as usize {
            let start = y * stride + r.x as usize * c;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Frame::new(data, r.width as u32, r.height as u32, self.channels, self.index)
    }

    /// Resamples to `width` x `height` with a triangle (bilinear) filter.
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame, FrameError> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        let data = match self.channels {
            1 => self.resize_as::<Luma<u8>>(width, height)?,
            2 => self.resize_as::<LumaA<u8>>(width, height)?,
            3 => self.resize_as::<Rgb<u8>>(width, height)?,
            4 => self.resize_as::<Rgba<u8>>(width, height)?,
            c => return Err(FrameError::UnsupportedChannels(c)),
        };
        Ok(Frame::new(data, width, height, self.channels, self.index))
    }

    /// Luma plane as `[height, width]` floats, BT.601 weights for color input.
    pub fn to_luma(&self) -> Array2<f32> {
        let pixels = self.as_ndarray();
        Array2::from_shape_fn((self.height as usize, self.width as usize), |(y, x)| {
            match self.channels {
                1 | 2 => pixels[[y, x, 0]] as f32,
                _ => {
                    0.299 * pixels[[y, x, 0]] as f32
                        + 0.587 * pixels[[y, x, 1]] as f32
                        + 0.114 * pixels[[y, x, 2]] as f32
                }
            }
        })
    }

    fn resize_as<P>(&self, width: u32, height: u32) -> Result<Vec<u8>, FrameError>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        let src = ImageBuffer::<P, Vec<u8>>::from_raw(self.width, self.height, self.data.clone())
            .ok_or(FrameError::BufferMismatch {
                width: self.width,
                height: self.height,
                channels: self.channels,
            })?;
        Ok(imageops::resize(&src, width, height, FilterType::Triangle).into_raw())
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
