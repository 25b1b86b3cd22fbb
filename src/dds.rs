//! Reader for DirectDraw Surface containers holding uncompressed float data.
//!
//! The LTC lookup tables ship as 64x64 float DDS files. Only the formats
//! those tables use are understood; block compressed data is rejected.

use half::f16;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: u32 = 124;
const HEADER_END: usize = 4 + HEADER_SIZE as usize;
const DX10_HEADER_SIZE: usize = 20;

const PIXEL_FORMAT_FOURCC: u32 = 0x4;
const FOURCC_DX10: u32 = u32::from_le_bytes(*b"DX10");

// Legacy D3DFMT codes stored directly in the FourCC field.
const D3DFMT_R16F: u32 = 111;
const D3DFMT_G16R16F: u32 = 112;
const D3DFMT_A16B16G16R16F: u32 = 113;
const D3DFMT_R32F: u32 = 114;
const D3DFMT_G32R32F: u32 = 115;
const D3DFMT_A32B32G32R32F: u32 = 116;

const DXGI_R32G32B32A32_FLOAT: u32 = 2;
const DXGI_R16G16B16A16_FLOAT: u32 = 10;
const DXGI_R32G32_FLOAT: u32 = 16;
const DXGI_R16G16_FLOAT: u32 = 34;
const DXGI_R32_FLOAT: u32 = 41;
const DXGI_R16_FLOAT: u32 = 54;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DdsError {
    #[error("DDS data too short to contain a header (len={len})")]
    TooShort { len: usize },
    #[error("invalid DDS magic: expected \"DDS \", found {found:?}")]
    BadMagic { found: [u8; 4] },
    #[error("unexpected DDS header size {size}, expected 124")]
    BadHeaderSize { size: u32 },
    #[error("unsupported DDS pixel format ({0})")]
    UnsupportedFormat(String),
    #[error("DDS pixel data truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("invalid DDS dimensions {width}x{height}")]
    BadDimensions { width: u32, height: u32 },
}

/// Storage type of one channel in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    F16,
    F32,
}

impl ChannelType {
    fn size(self) -> usize {
        match self {
            ChannelType::F16 => 2,
            ChannelType::F32 => 4,
        }
    }
}

/// Decoded top-level mip of a DDS file, widened to `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct DdsImage {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub source_type: ChannelType,
    /// Row-major texels, `channels` floats per texel.
    pub texels: Vec<f32>,
}

impl DdsImage {
    /// Parses a DDS file from memory.
    pub fn parse(data: &[u8]) -> Result<Self, DdsError> {
        if data.len() < HEADER_END {
            return Err(DdsError::TooShort { len: data.len() });
        }
        let magic: [u8; 4] = [data[0], data[1], data[2], data[3]];
        if &magic != MAGIC {
            return Err(DdsError::BadMagic { found: magic });
        }

        let mut cursor = 4;
        let size = read_u32(data, &mut cursor);
        if size != HEADER_SIZE {
            return Err(DdsError::BadHeaderSize { size });
        }
        let _flags = read_u32(data, &mut cursor);
        let height = read_u32(data, &mut cursor);
        let width = read_u32(data, &mut cursor);
        if width == 0 || height == 0 {
            return Err(DdsError::BadDimensions { width, height });
        }

        // Pixel format block starts at byte 76 of the file.
        cursor = 80;
        let pf_flags = read_u32(data, &mut cursor);
        let fourcc = read_u32(data, &mut cursor);
        if pf_flags & PIXEL_FORMAT_FOURCC == 0 {
            return Err(DdsError::UnsupportedFormat(
                "pixel format has no FourCC code".into(),
            ));
        }

        let mut offset = HEADER_END;
        let (channels, source_type) = if fourcc == FOURCC_DX10 {
            if data.len() < HEADER_END + DX10_HEADER_SIZE {
                return Err(DdsError::TooShort { len: data.len() });
            }
            let mut dx10 = HEADER_END;
            let dxgi_format = read_u32(data, &mut dx10);
            offset += DX10_HEADER_SIZE;
            dxgi_layout(dxgi_format).ok_or_else(|| {
                DdsError::UnsupportedFormat(format!("DXGI format {dxgi_format}"))
            })?
        } else {
            legacy_layout(fourcc).ok_or_else(|| {
                DdsError::UnsupportedFormat(format!("FourCC {}", describe_fourcc(fourcc)))
            })?
        };

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|texels| texels.checked_mul(channels as usize * source_type.size()))
            .ok_or(DdsError::BadDimensions { width, height })?;
        let available = data.len() - offset;
        if available < expected {
            return Err(DdsError::Truncated {
                expected,
                actual: available,
            });
        }

        let payload = &data[offset..offset + expected];
        let texels = match source_type {
            ChannelType::F32 => payload
                .chunks_exact(4)
                .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                .collect(),
            ChannelType::F16 => payload
                .chunks_exact(2)
                .map(|bytes| f16::from_le_bytes([bytes[0], bytes[1]]).to_f32())
                .collect(),
        };

        Ok(Self {
            width,
            height,
            channels,
            source_type,
            texels,
        })
    }

    /// Returns the channels of the texel at (`x`, `y`), or `None` outside the image.
    pub fn texel(&self, x: u32, y: u32) -> Option<&[f32]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * channels;
        self.texels.get(start..start + channels)
    }
}

fn legacy_layout(fourcc: u32) -> Option<(u32, ChannelType)> {
    Some(match fourcc {
        D3DFMT_R16F => (1, ChannelType::F16),
        D3DFMT_G16R16F => (2, ChannelType::F16),
        D3DFMT_A16B16G16R16F => (4, ChannelType::F16),
        D3DFMT_R32F => (1, ChannelType::F32),
        D3DFMT_G32R32F => (2, ChannelType::F32),
        D3DFMT_A32B32G32R32F => (4, ChannelType::F32),
        _ => return None,
    })
}

fn dxgi_layout(format: u32) -> Option<(u32, ChannelType)> {
    Some(match format {
        DXGI_R32G32B32A32_FLOAT => (4, ChannelType::F32),
        DXGI_R16G16B16A16_FLOAT => (4, ChannelType::F16),
        DXGI_R32G32_FLOAT => (2, ChannelType::F32),
        DXGI_R16G16_FLOAT => (2, ChannelType::F16),
        DXGI_R32_FLOAT => (1, ChannelType::F32),
        DXGI_R16_FLOAT => (1, ChannelType::F16),
        _ => return None,
    })
}

fn describe_fourcc(fourcc: u32) -> String {
    let bytes = fourcc.to_le_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic()) {
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        fourcc.to_string()
    }
}

// Callers check bounds against HEADER_END before reading header fields.
fn read_u32(data: &[u8], cursor: &mut usize) -> u32 {
    let at = *cursor;
    *cursor += 4;
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a DDS file around `payload`, using a DX10 header when `dxgi` is set.
    pub(crate) fn encode(width: u32, height: u32, fourcc: u32, dxgi: Option<u32>, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        let mut header = [0u32; 31];
        header[0] = HEADER_SIZE;
        header[1] = 0x1 | 0x2 | 0x4 | 0x1000;
        header[2] = height;
        header[3] = width;
        // Pixel format block: size, flags, fourcc.
        header[18] = 32;
        header[19] = PIXEL_FORMAT_FOURCC;
        header[20] = if dxgi.is_some() { FOURCC_DX10 } else { fourcc };
        header[26] = 0x1000;
        for word in header {
            data.extend_from_slice(&word.to_le_bytes());
        }
        if let Some(format) = dxgi {
            for word in [format, 3, 0, 1, 0] {
                data.extend_from_slice(&word.to_le_bytes());
            }
        }
        data.extend_from_slice(payload);
        data
    }

    fn f32_payload(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn parses_legacy_rg32f() {
        let values = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];
        let data = encode(2, 2, D3DFMT_G32R32F, None, &f32_payload(&values));
        let image = DdsImage::parse(&data).unwrap();
        assert_eq!((image.width, image.height, image.channels), (2, 2, 2));
        assert_eq!(image.source_type, ChannelType::F32);
        assert_eq!(image.texel(1, 1), Some(&[1.75, 2.0][..]));
        assert_eq!(image.texel(2, 0), None);
    }

    #[test]
    fn parses_dx10_rgba32f() {
        let values: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let data = encode(2, 2, 0, Some(DXGI_R32G32B32A32_FLOAT), &f32_payload(&values));
        let image = DdsImage::parse(&data).unwrap();
        assert_eq!(image.channels, 4);
        assert_eq!(image.texel(1, 0), Some(&[4.0, 5.0, 6.0, 7.0][..]));
        assert_eq!(image.texels, values);
    }

    #[test]
    fn widens_half_floats() {
        let payload: Vec<u8> = [0.5f32, -2.0]
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_le_bytes())
            .collect();
        let data = encode(1, 1, D3DFMT_G16R16F, None, &payload);
        let image = DdsImage::parse(&data).unwrap();
        assert_eq!(image.source_type, ChannelType::F16);
        assert_eq!(image.texels, vec![0.5, -2.0]);
    }

    #[test]
    fn rejects_block_compressed_data() {
        let data = encode(4, 4, u32::from_le_bytes(*b"DXT1"), None, &[0; 8]);
        assert_eq!(
            DdsImage::parse(&data),
            Err(DdsError::UnsupportedFormat("FourCC DXT1".into()))
        );
    }

    #[test]
    fn reports_truncated_payload() {
        let data = encode(2, 2, D3DFMT_A32B32G32R32F, None, &[0; 12]);
        assert_eq!(
            DdsImage::parse(&data),
            Err(DdsError::Truncated {
                expected: 64,
                actual: 12
            })
        );
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        assert_eq!(DdsImage::parse(b"DDS"), Err(DdsError::TooShort { len: 3 }));
        let mut data = encode(1, 1, D3DFMT_R32F, None, &[0; 4]);
        data[0] = b'X';
        assert!(matches!(
            DdsImage::parse(&data),
            Err(DdsError::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_empty_images() {
        let data = encode(0, 0, D3DFMT_A32B32G32R32F, None, &[]);
        assert_eq!(
            DdsImage::parse(&data),
            Err(DdsError::BadDimensions {
                width: 0,
                height: 0
            })
        );
        let data = encode(4, 0, D3DFMT_R32F, None, &[]);
        assert!(matches!(
            DdsImage::parse(&data),
            Err(DdsError::BadDimensions { width: 4, height: 0 })
        ));
    }

    #[test]
    fn oversized_dimensions_are_an_error_not_a_panic() {
        let data = encode(u32::MAX, u32::MAX, D3DFMT_A32B32G32R32F, None, &[0; 16]);
        assert!(matches!(
            DdsImage::parse(&data),
            Err(DdsError::BadDimensions { .. } | DdsError::Truncated { .. })
        ));
    }
}
