//! Uncompressed BMP decoding into RGBA pixels.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not a BMP image")]
    NotBmp,

    #[error("image data is truncated")]
    Truncated,

    #[error("unsupported BMP: {0}")]
    Unsupported(String),
}

/// Decoded pixels, row-major from the top-left, four bytes (RGBA) each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(at..at + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

fn read<const N: usize>(bytes: &[u8], at: usize) -> Result<[u8; N], DecodeError> {
    bytes
        .get(at..at + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DecodeError::Truncated)
}

fn u16_at(bytes: &[u8], at: usize) -> Result<u16, DecodeError> {
    read(bytes, at).map(u16::from_le_bytes)
}

fn u32_at(bytes: &[u8], at: usize) -> Result<u32, DecodeError> {
    read(bytes, at).map(u32::from_le_bytes)
}

fn i32_at(bytes: &[u8], at: usize) -> Result<i32, DecodeError> {
    read(bytes, at).map(i32::from_le_bytes)
}

/// Decode a 24- or 32-bit `BI_RGB` bitmap with a `BITMAPINFOHEADER` or
/// later header. Bottom-up and top-down row orders are both accepted; the
/// unused fourth byte of 32-bit pixels is ignored.
pub fn decode_bmp(bytes: &[u8]) -> Result<ImageData, DecodeError> {
    if bytes.get(0..2) != Some(b"BM".as_slice()) {
        return Err(DecodeError::NotBmp);
    }

    let pixel_offset = u32_at(bytes, 10)? as usize;
    let header_size = u32_at(bytes, 14)?;
    if header_size < 40 {
        return Err(DecodeError::Unsupported(format!("{header_size}-byte info header")));
    }

    let width = i32_at(bytes, 18)?;
    let height = i32_at(bytes, 22)?;
    let bits = u16_at(bytes, 28)?;
    let compression = u32_at(bytes, 30)?;

    if width <= 0 || height == 0 {
        return Err(DecodeError::Unsupported(format!("{width}x{height} image")));
    }
    if compression != 0 {
        return Err(DecodeError::Unsupported(format!("compression method {compression}")));
    }
    let channels = match bits {
        24 => 3,
        32 => 4,
        other => return Err(DecodeError::Unsupported(format!("{other} bits per pixel"))),
    };

    let width = width as usize;
    let rows = height.unsigned_abs() as usize;
    let top_down = height < 0;
    let stride = (usize::from(bits) * width).div_ceil(32) * 4;

    let end = stride
        .checked_mul(rows - 1)
        .and_then(|n| n.checked_add(width * channels))
        .and_then(|n| n.checked_add(pixel_offset))
        .ok_or(DecodeError::Truncated)?;
    if end > bytes.len() {
        return Err(DecodeError::Truncated);
    }

    let mut data = Vec::with_capacity(width * rows * 4);
    for y in 0..rows {
        let source_row = if top_down { y } else { rows - 1 - y };
        let row = &bytes[pixel_offset + source_row * stride..];
        for pixel in row[..width * channels].chunks_exact(channels) {
            data.extend_from_slice(&[pixel[2], pixel[1], pixel[0], 255]);
        }
    }

    Ok(ImageData {
        width: width as u32,
        height: rows as u32,
        data,
    })
}
