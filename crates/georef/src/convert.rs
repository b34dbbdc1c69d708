use georef_core::RgbImage;

/// Adapt a decoded `image` crate buffer into the workspace raster type.
pub fn rgb_from_image(img: &image::RgbImage) -> RgbImage {
    RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Wrap a workspace raster for encoding with the `image` crate.
pub fn image_from_rgb(img: &RgbImage) -> Option<image::RgbImage> {
    image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_image_crate() {
        let mut src = RgbImage::zeroed(3, 2);
        src.set(1, 1, [10, 20, 30]);
        let encoded = image_from_rgb(&src).expect("valid buffer");
        let back = rgb_from_image(&encoded);
        assert_eq!(back, src);
    }
}
