//! Multi-channel raster representation for the transform pipeline.
//!
//! Pixels are stored planar: one typed buffer per channel, row-major.
//! Transforms read channels as `f64` and write their results back through
//! [`PixelBuffer::from_f64_saturating`], so the sample type of the source
//! survives the round trip.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{DynamicImage, ImageBuffer};
use serde::{Deserialize, Serialize};

use crate::error::ImageError;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_image_id() -> u64 {
    NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Sample type of every channel in an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}

impl DataType {
    /// Whether samples can hold negative values.
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::U8 | Self::U16)
    }

    /// Whether samples are floating point.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Size of one sample in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Lowest value of the nominal range. Floats are nominally `[0, 1]`.
    pub fn nominal_min(self) -> f64 {
        match self {
            Self::I16 => f64::from(i16::MIN),
            Self::I32 => f64::from(i32::MIN),
            _ => 0.0,
        }
    }

    /// Highest value of the nominal range. Used as the "on" value of masks.
    pub fn nominal_max(self) -> f64 {
        match self {
            Self::U8 => f64::from(u8::MAX),
            Self::U16 => f64::from(u16::MAX),
            Self::I16 => f64::from(i16::MAX),
            Self::I32 => f64::from(i32::MAX),
            Self::F32 | Self::F64 => 1.0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "8-bit unsigned"),
            Self::U16 => write!(f, "16-bit unsigned"),
            Self::I16 => write!(f, "16-bit signed"),
            Self::I32 => write!(f, "32-bit signed"),
            Self::F32 => write!(f, "32-bit float"),
            Self::F64 => write!(f, "64-bit float"),
        }
    }
}

/// One channel's samples.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl PixelBuffer {
    /// A zero-filled buffer of `len` samples.
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U8 => Self::U8(vec![0; len]),
            DataType::U16 => Self::U16(vec![0; len]),
            DataType::I16 => Self::I16(vec![0; len]),
            DataType::I32 => Self::I32(vec![0; len]),
            DataType::F32 => Self::F32(vec![0.0; len]),
            DataType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::I16(_) => DataType::I16,
            Self::I32(_) => DataType::I32,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `index` widened to `f64`.
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Self::U8(v) => v.get(index).map(|&s| f64::from(s)),
            Self::U16(v) => v.get(index).map(|&s| f64::from(s)),
            Self::I16(v) => v.get(index).map(|&s| f64::from(s)),
            Self::I32(v) => v.get(index).map(|&s| f64::from(s)),
            Self::F32(v) => v.get(index).map(|&s| f64::from(s)),
            Self::F64(v) => v.get(index).copied(),
        }
    }

    /// All samples widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::U8(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Self::U16(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Self::I16(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Self::I32(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Self::F32(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Self::F64(v) => v.clone(),
        }
    }

    /// Narrow `values` into `data_type`, rounding and clamping integer types
    /// to their range. NaN becomes 0 for integer types.
    pub fn from_f64_saturating(data_type: DataType, values: &[f64]) -> Self {
        // Float-to-int `as` casts saturate at the type bounds and map NaN to 0.
        match data_type {
            DataType::U8 => Self::U8(values.iter().map(|v| v.round() as u8).collect()),
            DataType::U16 => Self::U16(values.iter().map(|v| v.round() as u16).collect()),
            DataType::I16 => Self::I16(values.iter().map(|v| v.round() as i16).collect()),
            DataType::I32 => Self::I32(values.iter().map(|v| v.round() as i32).collect()),
            DataType::F32 => Self::F32(values.iter().map(|&v| v as f32).collect()),
            DataType::F64 => Self::F64(values.to_vec()),
        }
    }

    fn from_ne_bytes(data_type: DataType, bytes: &[u8]) -> Self {
        match data_type {
            DataType::U8 => Self::U8(bytes.to_vec()),
            DataType::U16 => Self::U16(bytemuck::pod_collect_to_vec(bytes)),
            DataType::I16 => Self::I16(bytemuck::pod_collect_to_vec(bytes)),
            DataType::I32 => Self::I32(bytemuck::pod_collect_to_vec(bytes)),
            DataType::F32 => Self::F32(bytemuck::pod_collect_to_vec(bytes)),
            DataType::F64 => Self::F64(bytemuck::pod_collect_to_vec(bytes)),
        }
    }
}

/// A planar multi-channel raster.
///
/// Every image carries a process-unique identity used by
/// [`ArrayCache`](crate::cache::ArrayCache) fingerprints. Cloning an image or
/// borrowing a channel mutably gives it a new identity, so cached extractions
/// never outlive the pixels they were taken from.
#[derive(Debug)]
pub struct Image {
    id: u64,
    width: u32,
    height: u32,
    data_type: DataType,
    channels: Vec<PixelBuffer>,
}

impl Clone for Image {
    fn clone(&self) -> Self {
        Self {
            id: next_image_id(),
            width: self.width,
            height: self.height,
            data_type: self.data_type,
            channels: self.channels.clone(),
        }
    }
}

impl Image {
    /// A zero-filled image.
    pub fn new(width: u32, height: u32, channel_count: usize, data_type: DataType) -> Self {
        let len = width as usize * height as usize;
        Self {
            id: next_image_id(),
            width,
            height,
            data_type,
            channels: (0..channel_count)
                .map(|_| PixelBuffer::zeros(data_type, len))
                .collect(),
        }
    }

    /// Build an image from existing channel buffers.
    pub fn from_channels(
        width: u32,
        height: u32,
        data_type: DataType,
        channels: Vec<PixelBuffer>,
    ) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize;
        for (channel, buffer) in channels.iter().enumerate() {
            if buffer.data_type() != data_type {
                return Err(ImageError::MixedDataTypes {
                    channel,
                    expected: data_type,
                    actual: buffer.data_type(),
                });
            }
            if buffer.len() != expected {
                return Err(ImageError::BufferLength {
                    channel,
                    expected,
                    actual: buffer.len(),
                });
            }
        }
        Ok(Self {
            id: next_image_id(),
            width,
            height,
            data_type,
            channels,
        })
    }

    /// Build an image of `data_type` from `f64` planes, saturating each sample.
    pub fn from_f64_planes(
        width: u32,
        height: u32,
        data_type: DataType,
        planes: &[Vec<f64>],
    ) -> Result<Self, ImageError> {
        let channels = planes
            .iter()
            .map(|plane| PixelBuffer::from_f64_saturating(data_type, plane))
            .collect();
        Self::from_channels(width, height, data_type, channels)
    }

    /// Build an image from an externally owned planar byte buffer.
    ///
    /// `bytes` holds `channel_count` consecutive planes of native-endian
    /// samples. No alignment is required.
    pub fn from_raw_bytes(
        width: u32,
        height: u32,
        channel_count: usize,
        data_type: DataType,
        bytes: &[u8],
    ) -> Result<Self, ImageError> {
        let plane_bytes = width as usize * height as usize * data_type.byte_size();
        let expected = plane_bytes * channel_count;
        if bytes.len() != expected {
            return Err(ImageError::RawLength {
                expected,
                actual: bytes.len(),
            });
        }
        let channels = if plane_bytes == 0 {
            (0..channel_count)
                .map(|_| PixelBuffer::zeros(data_type, 0))
                .collect()
        } else {
            bytes
                .chunks_exact(plane_bytes)
                .map(|plane| PixelBuffer::from_ne_bytes(data_type, plane))
                .collect()
        };
        Self::from_channels(width, height, data_type, channels)
    }

    /// Convert a decoded `image` crate frame into planar channels.
    ///
    /// 8-bit, 16-bit and 32-bit float layouts keep their sample type; anything
    /// else is converted to 8-bit RGB first.
    pub fn from_dynamic(source: &DynamicImage) -> Self {
        let (width, height) = (source.width(), source.height());
        let (data_type, channels) = match source {
            DynamicImage::ImageLuma8(buf) => {
                (DataType::U8, planar(buf.as_raw(), 1, PixelBuffer::U8))
            }
            DynamicImage::ImageLumaA8(buf) => {
                (DataType::U8, planar(buf.as_raw(), 2, PixelBuffer::U8))
            }
            DynamicImage::ImageRgb8(buf) => {
                (DataType::U8, planar(buf.as_raw(), 3, PixelBuffer::U8))
            }
            DynamicImage::ImageRgba8(buf) => {
                (DataType::U8, planar(buf.as_raw(), 4, PixelBuffer::U8))
            }
            DynamicImage::ImageLuma16(buf) => {
                (DataType::U16, planar(buf.as_raw(), 1, PixelBuffer::U16))
            }
            DynamicImage::ImageLumaA16(buf) => {
                (DataType::U16, planar(buf.as_raw(), 2, PixelBuffer::U16))
            }
            DynamicImage::ImageRgb16(buf) => {
                (DataType::U16, planar(buf.as_raw(), 3, PixelBuffer::U16))
            }
            DynamicImage::ImageRgba16(buf) => {
                (DataType::U16, planar(buf.as_raw(), 4, PixelBuffer::U16))
            }
            DynamicImage::ImageRgb32F(buf) => {
                (DataType::F32, planar(buf.as_raw(), 3, PixelBuffer::F32))
            }
            DynamicImage::ImageRgba32F(buf) => {
                (DataType::F32, planar(buf.as_raw(), 4, PixelBuffer::F32))
            }
            other => {
                let rgb = other.to_rgb8();
                (DataType::U8, planar(rgb.as_raw(), 3, PixelBuffer::U8))
            }
        };
        Self {
            id: next_image_id(),
            width,
            height,
            data_type,
            channels,
        }
    }

    /// Convert to an `image` crate frame for display or encoding.
    ///
    /// Supports 1, 3 and 4 channel images of 8-bit and 16-bit unsigned
    /// samples, and 3 or 4 channel 32-bit float images.
    pub fn to_dynamic(&self) -> Result<DynamicImage, ImageError> {
        self.check_layout()?;
        let (w, h) = (self.width, self.height);
        let unsupported = || ImageError::UnsupportedLayout {
            data_type: self.data_type,
            channels: self.channels.len(),
        };
        let dynamic = match (self.data_type, self.channels.len()) {
            (DataType::U8, 1) => {
                ImageBuffer::from_raw(w, h, self.interleave_u8()).map(DynamicImage::ImageLuma8)
            }
            (DataType::U8, 3) => {
                ImageBuffer::from_raw(w, h, self.interleave_u8()).map(DynamicImage::ImageRgb8)
            }
            (DataType::U8, 4) => {
                ImageBuffer::from_raw(w, h, self.interleave_u8()).map(DynamicImage::ImageRgba8)
            }
            (DataType::U16, 1) => {
                ImageBuffer::from_raw(w, h, self.interleave_u16()).map(DynamicImage::ImageLuma16)
            }
            (DataType::U16, 3) => {
                ImageBuffer::from_raw(w, h, self.interleave_u16()).map(DynamicImage::ImageRgb16)
            }
            (DataType::U16, 4) => {
                ImageBuffer::from_raw(w, h, self.interleave_u16()).map(DynamicImage::ImageRgba16)
            }
            (DataType::F32, 3) => {
                ImageBuffer::from_raw(w, h, self.interleave_f32()).map(DynamicImage::ImageRgb32F)
            }
            (DataType::F32, 4) => {
                ImageBuffer::from_raw(w, h, self.interleave_f32()).map(DynamicImage::ImageRgba32F)
            }
            _ => None,
        };
        dynamic.ok_or_else(unsupported)
    }

    /// Check that every channel still matches the image's type and size.
    ///
    /// Buffers replaced through [`Image::channel_mut`] are not checked when
    /// they are written, so consumers call this before indexing samples.
    pub fn check_layout(&self) -> Result<(), ImageError> {
        let expected = self.pixel_count();
        for (channel, buffer) in self.channels.iter().enumerate() {
            if buffer.data_type() != self.data_type {
                return Err(ImageError::MixedDataTypes {
                    channel,
                    expected: self.data_type,
                    actual: buffer.data_type(),
                });
            }
            if buffer.len() != expected {
                return Err(ImageError::BufferLength {
                    channel,
                    expected,
                    actual: buffer.len(),
                });
            }
        }
        Ok(())
    }

    /// Process-unique identity, renewed on clone and mutable channel access.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of pixels per channel.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major offset of pixel `(x, y)`.
    #[inline]
    pub fn offset(&self, x: usize, y: usize) -> usize {
        y * self.width as usize + x
    }

    pub fn channel(&self, channel: usize) -> Option<&PixelBuffer> {
        self.channels.get(channel)
    }

    /// Mutable access to one channel. The image gets a new identity.
    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut PixelBuffer> {
        self.id = next_image_id();
        self.channels.get_mut(channel)
    }

    pub fn channels(&self) -> &[PixelBuffer] {
        &self.channels
    }

    /// Channel `channel` widened to `f64`.
    pub fn channel_f64(&self, channel: usize) -> Option<Vec<f64>> {
        self.channels.get(channel).map(PixelBuffer::to_f64_vec)
    }

    fn interleave_u8(&self) -> Vec<u8> {
        let planes: Vec<&[u8]> = self
            .channels
            .iter()
            .filter_map(|c| match c {
                PixelBuffer::U8(v) => Some(v.as_slice()),
                _ => None,
            })
            .collect();
        interleave(&planes, self.pixel_count())
    }

    fn interleave_u16(&self) -> Vec<u16> {
        let planes: Vec<&[u16]> = self
            .channels
            .iter()
            .filter_map(|c| match c {
                PixelBuffer::U16(v) => Some(v.as_slice()),
                _ => None,
            })
            .collect();
        interleave(&planes, self.pixel_count())
    }

    fn interleave_f32(&self) -> Vec<f32> {
        let planes: Vec<&[f32]> = self
            .channels
            .iter()
            .filter_map(|c| match c {
                PixelBuffer::F32(v) => Some(v.as_slice()),
                _ => None,
            })
            .collect();
        interleave(&planes, self.pixel_count())
    }
}

fn planar<T: Copy>(
    raw: &[T],
    channels: usize,
    wrap: fn(Vec<T>) -> PixelBuffer,
) -> Vec<PixelBuffer> {
    (0..channels)
        .map(|c| wrap(raw.iter().skip(c).step_by(channels).copied().collect()))
        .collect()
}

fn interleave<T: Copy>(planes: &[&[T]], pixel_count: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(pixel_count * planes.len());
    for i in 0..pixel_count {
        for plane in planes {
            out.push(plane[i]);
        }
    }
    out
}
