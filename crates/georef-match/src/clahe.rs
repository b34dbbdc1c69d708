use georef_core::GrayImage;

use crate::ClaheParams;

/// Contrast-limited adaptive histogram equalization.
///
/// The image is divided into `tiles x tiles` regions; each region gets a
/// clipped, redistributed histogram CDF, and output values are bilinearly
/// interpolated between the four surrounding region mappings.
pub fn equalize_adaptive(img: &GrayImage, params: &ClaheParams) -> GrayImage {
    let tiles = params.tiles.max(1);
    let (w, h) = (img.width, img.height);
    if w == 0 || h == 0 {
        return img.clone();
    }

    let tile_w = w.div_ceil(tiles);
    let tile_h = h.div_ceil(tiles);
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    // Per-tile lookup tables.
    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            luts[ty * tiles_x + tx] = tile_lut(img, x0, y0, x1, y1, params.clip_limit);
        }
    }

    let mut out = GrayImage::zeroed(w, h);
    for y in 0..h {
        for x in 0..w {
            // Position relative to tile centers.
            let fx = (x as f32 - tile_w as f32 / 2.0) / tile_w as f32;
            let fy = (y as f32 - tile_h as f32 / 2.0) / tile_h as f32;
            let tx0 = fx.floor().max(0.0) as usize;
            let ty0 = fy.floor().max(0.0) as usize;
            let tx0 = tx0.min(tiles_x - 1);
            let ty0 = ty0.min(tiles_y - 1);
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let ty1 = (ty0 + 1).min(tiles_y - 1);
            let ax = (fx - fx.floor()).clamp(0.0, 1.0);
            let ay = (fy - fy.floor()).clamp(0.0, 1.0);

            let v = img.get(x, y) as usize;
            let v00 = luts[ty0 * tiles_x + tx0][v] as f32;
            let v10 = luts[ty0 * tiles_x + tx1][v] as f32;
            let v01 = luts[ty1 * tiles_x + tx0][v] as f32;
            let v11 = luts[ty1 * tiles_x + tx1][v] as f32;

            let top = v00 + ax * (v10 - v00);
            let bottom = v01 + ax * (v11 - v01);
            out.set(x, y, (top + ay * (bottom - top)).round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

fn tile_lut(img: &GrayImage, x0: usize, y0: usize, x1: usize, y1: usize, clip: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get(x, y) as usize] += 1;
        }
    }
    let total = ((x1 - x0) * (y1 - y0)) as u32;
    if total == 0 {
        let mut identity = [0u8; 256];
        for (i, v) in identity.iter_mut().enumerate() {
            *v = i as u8;
        }
        return identity;
    }

    // Clip and redistribute the excess uniformly.
    let limit = ((clip * total as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256;
    let mut remainder = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += share;
        if remainder > 0 {
            *bin += 1;
            remainder -= 1;
        }
    }

    let mut lut = [0u8; 256];
    let mut cum = 0u32;
    for i in 0..256 {
        cum += hist[i];
        lut[i] = ((cum as f32 / total as f32) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
