use std::io::Cursor;

use gltf_json::validation::Checked;
use gltf_json::Index;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{debug, warn};

use crate::config::TextureConfig;
use crate::error::{ConvertError, Result};
use crate::types::{MaterialSettings, PixelFormat, TextureImage};

use super::Model;

/// Edge length of the substitute for unreadable textures.
pub const PLACEHOLDER_SIZE: u32 = 256;
/// Gray level of the substitute.
pub const PLACEHOLDER_SHADE: u8 = 128;

/// Encodes textures into the model buffer, one material per texture.
pub struct TexturePacker {
    quality: u8,
    material: MaterialSettings,
    sampler: Option<Index<gltf_json::texture::Sampler>>,
}

impl TexturePacker {
    pub fn new(config: &TextureConfig) -> Self {
        Self {
            quality: config.quality.clamp(1, 100),
            material: MaterialSettings {
                unlit: config.unlit,
                ..Default::default()
            },
            sampler: None,
        }
    }

    pub fn unlit(&self) -> bool {
        self.material.unlit
    }

    /// Encode `source` as JPEG into the buffer and emit its image, texture
    /// and material. Returns the material index.
    pub fn pack(&mut self, model: &mut Model, source: &TextureImage) -> Result<Index<gltf_json::Material>> {
        let rgb = match normalize_to_rgb(source) {
            Some(rgb) => rgb,
            None => {
                warn!(
                    texture = %source.name,
                    format = ?source.format,
                    width = source.width,
                    height = source.height,
                    "Unreadable texture pixels, substituting placeholder"
                );
                placeholder()
            }
        };

        let jpeg = encode_jpeg(&rgb, self.quality)?;
        debug!(texture = %source.name, bytes = jpeg.len(), "Encoded texture");

        let view = model.buffer.push_image(&mut model.root, &jpeg);
        let image = model.root.push(gltf_json::Image {
            buffer_view: Some(view),
            mime_type: Some(gltf_json::image::MimeType("image/jpeg".into())),
            uri: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        let sampler = self.sampler(&mut model.root);
        let texture = model.root.push(gltf_json::Texture {
            sampler: Some(sampler),
            source: image,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        Ok(model.root.push(self.build_material(texture)))
    }

    /// The one sampler shared by every texture, created on first use.
    fn sampler(&mut self, root: &mut gltf_json::Root) -> Index<gltf_json::texture::Sampler> {
        *self.sampler.get_or_insert_with(|| {
            root.push(gltf_json::texture::Sampler {
                mag_filter: Some(Checked::Valid(gltf_json::texture::MagFilter::Linear)),
                min_filter: Some(Checked::Valid(gltf_json::texture::MinFilter::LinearMipmapLinear)),
                wrap_s: Checked::Valid(gltf_json::texture::WrappingMode::Repeat),
                wrap_t: Checked::Valid(gltf_json::texture::WrappingMode::Repeat),
                name: None,
                extensions: Default::default(),
                extras: Default::default(),
            })
        })
    }

    fn build_material(&self, texture: Index<gltf_json::Texture>) -> gltf_json::Material {
        let settings = &self.material;
        let pbr = gltf_json::material::PbrMetallicRoughness {
            base_color_factor: gltf_json::material::PbrBaseColorFactor(settings.base_color),
            metallic_factor: gltf_json::material::StrengthFactor(settings.metallic),
            roughness_factor: gltf_json::material::StrengthFactor(settings.roughness),
            base_color_texture: Some(gltf_json::texture::Info {
                index: texture,
                tex_coord: 0,
                extensions: Default::default(),
                extras: Default::default(),
            }),
            metallic_roughness_texture: None,
            extensions: Default::default(),
            extras: Default::default(),
        };

        let extensions = settings.unlit.then(|| gltf_json::extensions::material::Material {
            unlit: Some(gltf_json::extensions::material::Unlit {}),
            ..Default::default()
        });

        gltf_json::Material {
            pbr_metallic_roughness: pbr,
            alpha_mode: Checked::Valid(gltf_json::material::AlphaMode::Opaque),
            alpha_cutoff: None,
            double_sided: false,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: gltf_json::material::EmissiveFactor([0.0, 0.0, 0.0]),
            name: None,
            extensions,
            extras: Default::default(),
        }
    }
}

/// Convert any readable layout to tightly packed RGB, honoring row stride.
///
/// `None` when the layout is unknown or the data is too short.
pub fn normalize_to_rgb(source: &TextureImage) -> Option<RgbImage> {
    let channels = source.format.channels()?;
    let (width, height) = (source.width as usize, source.height as usize);
    if width == 0 || height == 0 {
        return None;
    }
    let packed_row = width * channels;
    let stride = if source.row_stride == 0 {
        packed_row
    } else {
        source.row_stride
    };
    if stride < packed_row {
        return None;
    }
    let needed = stride.checked_mul(height - 1)?.checked_add(packed_row)?;
    if source.data.len() < needed {
        return None;
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let line = &source.data[row * stride..row * stride + packed_row];
        for px in line.chunks_exact(channels) {
            match source.format {
                PixelFormat::Luminance => out.extend_from_slice(&[px[0], px[0], px[0]]),
                PixelFormat::Rgb | PixelFormat::Rgba => out.extend_from_slice(&px[..3]),
                PixelFormat::Bgr | PixelFormat::Bgra => out.extend_from_slice(&[px[2], px[1], px[0]]),
                PixelFormat::Other(_) => return None,
            }
        }
    }

    RgbImage::from_raw(source.width, source.height, out)
}

/// Flat gray stand-in for textures that cannot be read.
pub fn placeholder() -> RgbImage {
    RgbImage::from_pixel(
        PLACEHOLDER_SIZE,
        PLACEHOLDER_SIZE,
        image::Rgb([PLACEHOLDER_SHADE; 3]),
    )
}

/// Baseline JPEG at the given quality.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| ConvertError::Texture(format!("JPEG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}
