//! Image decoding.

use conetrace_core::{pack_rgba8, AllocatorTag, Asset, ImageAsset, LinearAllocator};

use crate::error::{DecodeError, Result};

/// Scale a normalized channel to 8 bits, truncating.
#[inline]
fn quantize(channel: f32) -> u8 {
    // `as` saturates, so out-of-range HDR values clamp to 0 or 255.
    (channel * 255.0) as u8
}

/// Decode an encoded image (PNG, JPEG, TGA, ...) into a single-mip image asset.
///
/// The image is converted to RGBA floats with linear scaling, flipped
/// vertically so the first row is the bottom of the picture, then each
/// channel is scaled by 255 and truncated into packed RGBA8 texels.
pub fn decode_image(data: &[u8]) -> Result<ImageAsset> {
    let decoded = image::load_from_memory(data)?;
    let mut rgba = decoded.to_rgba32f();
    image::imageops::flip_vertical_in_place(&mut rgba);

    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }

    let pixels = rgba
        .pixels()
        .map(|p| pack_rgba8(quantize(p[0]), quantize(p[1]), quantize(p[2]), quantize(p[3])))
        .collect();

    Ok(ImageAsset::from_pixels(width, height, pixels)?)
}

/// Decode an encoded image and store it in `allocator` under `tag`.
///
/// Nothing is allocated unless decoding succeeds.
pub fn convert_image_asset(
    data: &[u8],
    allocator: &mut LinearAllocator,
    tag: AllocatorTag,
) -> Result<Asset> {
    let image = decode_image(data).inspect_err(|e| {
        tracing::warn!(bytes = data.len(), "image decode failed: {e}");
    })?;

    let asset = image.write_into(allocator, tag)?;
    tracing::debug!(
        width = image.width,
        height = image.height,
        size = asset.size,
        ?tag,
        "image asset converted"
    );
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use conetrace_core::{unpack_rgba8, ImageDesc, MipDesc};
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn encode_png(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    /// Two columns, two rows: red/green on top, blue/white below.
    fn fixture() -> RgbaImage {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([0, 255, 0, 128]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        image.put_pixel(1, 1, Rgba([255, 255, 255, 0]));
        image
    }

    fn expected_channel(c: u8) -> u8 {
        ((f32::from(c) / 255.0) * 255.0) as u8
    }

    #[test]
    fn decode_flips_and_packs() {
        conetrace_test::init_tracing();
        let asset = decode_image(&encode_png(&fixture())).unwrap();
        assert_eq!((asset.width, asset.height), (2, 2));
        assert_eq!(asset.pixels.len(), 4);

        // Bottom row of the source comes first.
        assert_eq!(unpack_rgba8(asset.pixels[0]), [0, 0, 255, 255]);
        assert_eq!(unpack_rgba8(asset.pixels[1]), [255, 255, 255, 0]);
        assert_eq!(unpack_rgba8(asset.pixels[2]), [255, 0, 0, 255]);
        assert_eq!(
            unpack_rgba8(asset.pixels[3]),
            [0, 255, 0, expected_channel(128)]
        );
    }

    #[test]
    fn every_channel_value_truncates_consistently() {
        let mut image = RgbaImage::new(256, 1);
        for x in 0..256u32 {
            let v = x as u8;
            image.put_pixel(x, 0, Rgba([v, v, v, v]));
        }
        let asset = decode_image(&encode_png(&image)).unwrap();
        for (x, texel) in asset.pixels.iter().enumerate() {
            let c = expected_channel(x as u8);
            assert_eq!(unpack_rgba8(*texel), [c, c, c, c], "channel value {x}");
        }
    }

    #[test]
    fn convert_writes_blob() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::AssetData, 1024);
        let asset =
            convert_image_asset(&encode_png(&fixture()), &mut alloc, AllocatorTag::AssetData)
                .unwrap();

        assert_eq!(asset.size, ImageDesc::SIZE + MipDesc::SIZE + 4 * 4);
        assert_eq!(asset.kind.fourcc(), *b"IMG\0");
        let back = ImageAsset::read_from(&alloc, &asset).unwrap();
        assert_eq!(back.mips.len(), 1);
        assert_eq!(back.mips[0].offset, 0);
        assert_eq!(unpack_rgba8(back.pixels[0]), [0, 0, 255, 255]);
    }

    #[test]
    fn garbage_writes_nothing() {
        conetrace_test::init_tracing();
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::AssetData, 1024);
        let result = convert_image_asset(b"not an image", &mut alloc, AllocatorTag::AssetData);
        assert!(matches!(result, Err(DecodeError::Unparsable(_))));
        assert_eq!(alloc.used(AllocatorTag::AssetData).unwrap(), 0);
    }

    #[test]
    fn full_allocator_is_reported() {
        let mut alloc = LinearAllocator::new().with_region(AllocatorTag::AssetData, 16);
        let result =
            convert_image_asset(&encode_png(&fixture()), &mut alloc, AllocatorTag::AssetData);
        assert!(matches!(result, Err(DecodeError::Asset(_))));
        assert_eq!(alloc.used(AllocatorTag::AssetData).unwrap(), 0);
    }
}
