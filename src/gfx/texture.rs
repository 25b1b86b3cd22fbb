use std::sync::Arc;

use log::info;

use super::next_resource_id;
use crate::dds::DdsImage;

/// Texel layout the texture is stored with on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    Rg32Float,
    Rgba32Float,
}

impl InternalFormat {
    pub fn channels(self) -> usize {
        match self {
            InternalFormat::Rg32Float => 2,
            InternalFormat::Rgba32Float => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
}

/// Filtering, wrapping and storage format of a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureFormat {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap: Wrap,
    pub internal_format: InternalFormat,
}

impl TextureFormat {
    /// Linear filtering with clamped edges.
    pub fn new(internal_format: InternalFormat) -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            wrap: Wrap::ClampToEdge,
            internal_format,
        }
    }

    pub fn min_filter(mut self, filter: Filter) -> Self {
        self.min_filter = filter;
        self
    }

    pub fn mag_filter(mut self, filter: Filter) -> Self {
        self.mag_filter = filter;
        self
    }

    pub fn wrap(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }
}

/// CPU copy of a float texture waiting to be uploaded by the renderer.
#[derive(Debug)]
pub struct Texture2d {
    id: u64,
    label: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    texels: Vec<f32>,
}

impl Texture2d {
    /// Builds a texture from a decoded DDS image.
    ///
    /// Channels the image lacks are filled with 0, alpha with 1. Extra
    /// channels are dropped.
    pub fn from_dds(label: &str, image: &DdsImage, format: TextureFormat) -> Arc<Self> {
        let src_channels = image.channels as usize;
        let dst_channels = format.internal_format.channels();
        let texel_count = image.width as usize * image.height as usize;
        let mut texels = Vec::with_capacity(texel_count * dst_channels);
        for texel in image.texels.chunks_exact(src_channels).take(texel_count) {
            for channel in 0..dst_channels {
                let fill = if channel == 3 { 1.0 } else { 0.0 };
                texels.push(texel.get(channel).copied().unwrap_or(fill));
            }
        }
        info!(
            "loaded texture {label} ({}x{}, {} -> {:?})",
            image.width, image.height, src_channels, format.internal_format
        );
        Arc::new(Self {
            id: next_resource_id(),
            label: label.to_string(),
            width: image.width,
            height: image.height,
            format,
            texels,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Row-major texels with `format().internal_format.channels()` floats each.
    pub fn texels(&self) -> &[f32] {
        &self.texels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::ChannelType;

    fn image(channels: u32, texels: Vec<f32>) -> DdsImage {
        DdsImage {
            width: 1,
            height: 2,
            channels,
            source_type: ChannelType::F32,
            texels,
        }
    }

    #[test]
    fn widening_fills_zero_and_opaque_alpha() {
        let texture = Texture2d::from_dds(
            "amp",
            &image(2, vec![0.1, 0.2, 0.3, 0.4]),
            TextureFormat::new(InternalFormat::Rgba32Float),
        );
        assert_eq!(
            texture.texels(),
            &[0.1, 0.2, 0.0, 1.0, 0.3, 0.4, 0.0, 1.0]
        );
    }

    #[test]
    fn narrowing_drops_extra_channels() {
        let texture = Texture2d::from_dds(
            "mat",
            &image(4, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
            TextureFormat::new(InternalFormat::Rg32Float),
        );
        assert_eq!(texture.texels(), &[1.0, 2.0, 5.0, 6.0]);
        assert_eq!((texture.width(), texture.height()), (1, 2));
    }

    #[test]
    fn format_defaults_to_linear_clamp() {
        let format = TextureFormat::new(InternalFormat::Rg32Float);
        assert_eq!(format.min_filter, Filter::Linear);
        assert_eq!(format.mag_filter, Filter::Linear);
        assert_eq!(format.wrap, Wrap::ClampToEdge);
        let nearest = format.min_filter(Filter::Nearest).wrap(Wrap::Repeat);
        assert_eq!(nearest.min_filter, Filter::Nearest);
        assert_eq!(nearest.wrap, Wrap::Repeat);
    }
}
