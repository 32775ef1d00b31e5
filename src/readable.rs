//! Readable copies of live textures and their export to disk.
//!
//! A texture bound to a material is not necessarily CPU-readable.  When the
//! main-world copy still holds pixels, [`blit_to_rgba`] converts its base mip
//! level to RGBA8 on the CPU.  When the pixels only live on the GPU, a host
//! may instead queue a [`GpuSnapshot`]: the texture is copied back through
//! Bevy's [`Readback`](bevy::render::gpu_readback::Readback) and the bytes
//! that arrive are decoded by [`decode_gpu_copy`].  Either way [`save_png`]
//! writes the result out losslessly.
//!
//! Block-compressed formats are not converted by either path.

use std::{
    fmt, fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use bevy::{
    asset::{Assets, RenderAssetUsages},
    color::ColorToPacked,
    image::TextureFormatPixelInfo,
    prelude::{Component, Handle, Image},
    render::{
        render_resource::{Extent3d, TextureDimension, TextureFormat},
        renderer::RenderDevice,
    },
};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::SkinError;

/// Which stock texture a snapshot exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    FlightTexture,
    IvaEmissive,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SnapshotKind::FlightTexture => "stock navball texture",
            SnapshotKind::IvaEmissive => "stock cabin emissive texture",
        })
    }
}

/// A pending GPU copy of a stock texture, exported to `path` once the
/// pixels arrive.
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct GpuSnapshot {
    pub kind: SnapshotKind,
    pub path: PathBuf,
}

/// Produces a CPU-side RGBA8 copy of a texture.
pub trait TextureReadback<T> {
    fn read_rgba(&self, texture: &T) -> Result<RgbaImage, SkinError>;

    /// Queue an asynchronous GPU copy of a texture that [`read_rgba`] reported
    /// as [`SkinError::NotReadable`].
    ///
    /// Hosts without GPU readback keep this default, which declines.
    ///
    /// [`read_rgba`]: TextureReadback::read_rgba
    fn queue_gpu_readback(
        &mut self,
        _texture: &T,
        _snapshot: GpuSnapshot,
    ) -> Result<(), SkinError> {
        Err(SkinError::NotReadable)
    }
}

/// Dimension guard for readback.
///
/// A zero-sized source has nothing to copy.
#[inline]
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), SkinError> {
    if width == 0 || height == 0 {
        return Err(SkinError::InvalidDimensions { width, height });
    }
    Ok(())
}

fn unsupported(format: TextureFormat) -> SkinError {
    SkinError::UnsupportedFormat {
        format: format!("{format:?}"),
    }
}

/// Convert the base mip level of `source` into an RGBA8 sRGB image on the
/// CPU.
///
/// 8-bit RGBA and BGRA sources are copied byte for byte (BGRA is swizzled);
/// any other format is sampled texel by texel and re-encoded as sRGB.
pub fn blit_to_rgba(source: &Image) -> Result<RgbaImage, SkinError> {
    let (width, height) = (source.width(), source.height());
    validate_dimensions(width, height)?;
    let format = source.texture_descriptor.format;
    if format.is_compressed() {
        return Err(unsupported(format));
    }
    let data = source.data.as_deref().ok_or(SkinError::NotReadable)?;
    let texels = width as usize * height as usize;

    match format {
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => {
            let base = data.get(..texels * 4).ok_or(SkinError::NotReadable)?;
            RgbaImage::from_raw(width, height, base.to_vec()).ok_or(SkinError::NotReadable)
        }
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => {
            let base = data.get(..texels * 4).ok_or(SkinError::NotReadable)?;
            let swizzled = base
                .chunks_exact(4)
                .flat_map(|p| [p[2], p[1], p[0], p[3]])
                .collect();
            RgbaImage::from_raw(width, height, swizzled).ok_or(SkinError::NotReadable)
        }
        _ => {
            let mut target = RgbaImage::new(width, height);
            for (x, y, texel) in target.enumerate_pixels_mut() {
                let color = source.get_color_at(x, y).map_err(|_| unsupported(format))?;
                *texel = Rgba(color.to_srgba().to_u8_array());
            }
            Ok(target)
        }
    }
}

/// Decode the bytes of a GPU texture copy into an RGBA8 image.
///
/// GPU copies pad every row to the copy alignment; both padded and tightly
/// packed buffers are accepted.
pub fn decode_gpu_copy(
    data: &[u8],
    width: u32,
    height: u32,
    format: TextureFormat,
) -> Result<RgbaImage, SkinError> {
    validate_dimensions(width, height)?;
    let pixel_size = format.pixel_size().map_err(|_| unsupported(format))?;
    let row = width as usize * pixel_size;
    let padded_row = RenderDevice::align_copy_bytes_per_row(row);
    let rows = height as usize;

    let packed = if data.len() == row * rows {
        data.to_vec()
    } else if data.len() == padded_row * rows {
        data.chunks_exact(padded_row)
            .flat_map(|r| &r[..row])
            .copied()
            .collect()
    } else {
        return Err(SkinError::NotReadable);
    };

    let image = Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        packed,
        format,
        RenderAssetUsages::MAIN_WORLD,
    );
    blit_to_rgba(&image)
}

impl TextureReadback<Handle<Image>> for Assets<Image> {
    fn read_rgba(&self, texture: &Handle<Image>) -> Result<RgbaImage, SkinError> {
        let image = self.get(texture).ok_or(SkinError::NotReadable)?;
        blit_to_rgba(image)
    }
}

/// Encode `image` as PNG and write it to `path`.
///
/// Missing parent directories are created and a `.png` extension is added
/// when `path` has none.  Encoding happens in memory first so a failed
/// encode never leaves a truncated file behind.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), SkinError> {
    let path = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("png")) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".png");
        name.into()
    };

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SkinError::io(parent, e))?;
    }
    fs::write(&path, bytes).map_err(|e| SkinError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::*;

    fn make_image(data: Vec<u8>, width: u32, height: u32, format: TextureFormat) -> Image {
        Image::new(
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            data,
            format,
            RenderAssetUsages::default(),
        )
    }

    fn noise_pixels(width: u32, height: u32) -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        (0..width * height * 4).map(|_| rng.random::<u8>()).collect()
    }

    #[test]
    fn zero_extent_is_rejected() {
        assert!(matches!(
            validate_dimensions(0, 8),
            Err(SkinError::InvalidDimensions { width: 0, height: 8 })
        ));
        assert!(validate_dimensions(1, 1).is_ok());
    }

    #[test]
    fn image_without_cpu_data_is_not_readable() {
        let mut image = Image::default();
        image.data = None;
        assert!(matches!(blit_to_rgba(&image), Err(SkinError::NotReadable)));
    }

    #[test]
    fn rgba_source_is_copied_exactly() {
        let pixels = noise_pixels(8, 4);
        let image = make_image(pixels.clone(), 8, 4, TextureFormat::Rgba8UnormSrgb);

        let copy = blit_to_rgba(&image).unwrap();

        assert_eq!(copy.dimensions(), (8, 4));
        assert_eq!(copy.into_raw(), pixels);
    }

    #[test]
    fn bgra_source_is_swizzled() {
        let image = make_image(vec![10, 20, 30, 40], 1, 1, TextureFormat::Bgra8UnormSrgb);
        let copy = blit_to_rgba(&image).unwrap();
        assert_eq!(copy.get_pixel(0, 0).0, [30, 20, 10, 40]);
    }

    #[test]
    fn single_channel_source_is_sampled_as_grey() {
        let image = make_image(vec![0, 255], 2, 1, TextureFormat::R8Unorm);
        let copy = blit_to_rgba(&image).unwrap();
        assert_eq!(copy.into_raw(), vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn float_source_is_reencoded_as_srgb() {
        let texels: [[f32; 4]; 2] = [[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 0.5]];
        let data = texels
            .iter()
            .flatten()
            .flat_map(|c| c.to_le_bytes())
            .collect();
        let image = make_image(data, 2, 1, TextureFormat::Rgba32Float);

        let copy = blit_to_rgba(&image).unwrap();

        assert_eq!(copy.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(copy.get_pixel(1, 0).0, [0, 0, 255, 128]);
    }

    #[test]
    fn compressed_source_is_unsupported() {
        let mut image = make_image(vec![0; 4], 1, 1, TextureFormat::Rgba8UnormSrgb);
        image.texture_descriptor.format = TextureFormat::Bc1RgbaUnormSrgb;
        assert!(matches!(
            blit_to_rgba(&image),
            Err(SkinError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn padded_gpu_copy_is_unpadded() {
        // 3 texels of 4 bytes pad to a 256 byte row.
        let mut data = vec![0xEE; 256 * 2];
        data[..12].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        data[256..268].copy_from_slice(&[13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24]);

        let copy = decode_gpu_copy(&data, 3, 2, TextureFormat::Rgba8UnormSrgb).unwrap();

        assert_eq!(copy.into_raw(), (1..=24).collect::<Vec<u8>>());
    }

    #[test]
    fn packed_bgra_gpu_copy_is_swizzled() {
        let copy = decode_gpu_copy(&[10, 20, 30, 40], 1, 1, TextureFormat::Bgra8UnormSrgb).unwrap();
        assert_eq!(copy.get_pixel(0, 0).0, [30, 20, 10, 40]);
    }

    #[test]
    fn truncated_gpu_copy_is_rejected() {
        assert!(matches!(
            decode_gpu_copy(&[0; 7], 2, 1, TextureFormat::Rgba8UnormSrgb),
            Err(SkinError::NotReadable)
        ));
        assert!(matches!(
            decode_gpu_copy(&[0; 8], 1, 1, TextureFormat::Bc1RgbaUnormSrgb),
            Err(SkinError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn assets_readback_misses_unknown_handle() {
        let mut images = Assets::<Image>::default();
        let handle = images.add(Image::default());
        images.remove(&handle);
        assert!(matches!(
            images.read_rgba(&handle),
            Err(SkinError::NotReadable)
        ));
    }

    #[test]
    fn exported_png_round_trips_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = noise_pixels(32, 16);
        let image = make_image(pixels, 32, 16, TextureFormat::Rgba8UnormSrgb);
        let readable = blit_to_rgba(&image).unwrap();

        let target = dir.path().join("skins").join("stock");
        save_png(&readable, &target).unwrap();

        let reloaded = image::open(dir.path().join("skins").join("stock.png"))
            .unwrap()
            .into_rgba8();
        assert_eq!(reloaded, readable);
    }
}
