use georef_core::{sample_bilinear_rgb, RgbImage};

const LINE_COLOR: [u8; 3] = [255, 50, 50];
const LINE_ALPHA: f32 = 0.63;
const LABEL_BG: [u8; 3] = [255, 255, 255];
const LABEL_FG: [u8; 3] = [200, 0, 0];

/// 5x7 digit glyphs, one row per byte, bit 4 leftmost.
const DIGITS: [[u8; 7]; 10] = [
    [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
    [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
    [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
    [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
    [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
    [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
    [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
    [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
    [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
    [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
];

const GLYPH_W: usize = 5;
const GLYPH_H: usize = 7;
const GLYPH_GAP: usize = 1;

/// Uniformly downsample so the longest side is at most `max_dim`.
///
/// Returns the image and the ratio mapping downsampled pixels back to
/// original ones (>= 1).
pub fn shrink_rgb_to_max_dim(img: &RgbImage, max_dim: usize) -> (RgbImage, f64) {
    let longest = img.width.max(img.height);
    if longest <= max_dim || longest == 0 {
        return (img.clone(), 1.0);
    }
    let scale = max_dim as f64 / longest as f64;
    let out_w = ((img.width as f64 * scale).round() as usize).max(1);
    let out_h = ((img.height as f64 * scale).round() as usize).max(1);
    let ratio = longest as f64 / max_dim as f64;

    let mut out = RgbImage::zeroed(out_w, out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let sx = ox as f64 * ratio;
            let sy = oy as f64 * ratio;
            out.set(ox, oy, sample_bilinear_rgb(img, sx, sy, [0, 0, 0]));
        }
    }
    (out, ratio)
}

/// Draw a labeled pixel coordinate grid over a copy of the image.
///
/// Red grid lines every `spacing` pixels, coordinate labels along the top
/// (x axis) and left (y axis) edges. The labels give the model a concrete
/// frame for reporting pixel positions.
pub fn draw_grid_overlay(img: &RgbImage, spacing: usize) -> RgbImage {
    let mut out = img.clone();
    if spacing == 0 || img.width == 0 || img.height == 0 {
        return out;
    }

    for x in (0..img.width).step_by(spacing) {
        for y in 0..img.height {
            blend(&mut out, x, y, LINE_COLOR, LINE_ALPHA);
        }
        draw_label(&mut out, x.saturating_add(3), 2, x);
    }
    for y in (0..img.height).step_by(spacing) {
        for x in 0..img.width {
            blend(&mut out, x, y, LINE_COLOR, LINE_ALPHA);
        }
        draw_label(&mut out, 2, y.saturating_add(3), y);
    }
    out
}

#[inline]
fn blend(img: &mut RgbImage, x: usize, y: usize, color: [u8; 3], alpha: f32) {
    let p = img.get(x, y);
    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = (p[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha).round() as u8;
    }
    img.set(x, y, out);
}

/// Render `value` in the builtin digit font at (x, y), over a white box.
fn draw_label(img: &mut RgbImage, x: usize, y: usize, value: usize) {
    let digits: Vec<usize> = value
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let text_w = digits.len() * (GLYPH_W + GLYPH_GAP);

    for dy in 0..GLYPH_H + 2 {
        for dx in 0..text_w + 2 {
            let (px, py) = (x + dx, y + dy);
            if px < img.width && py < img.height {
                img.set(px, py, LABEL_BG);
            }
        }
    }

    for (i, &d) in digits.iter().enumerate() {
        let gx = x + 1 + i * (GLYPH_W + GLYPH_GAP);
        let gy = y + 1;
        for (row, bits) in DIGITS[d].iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits >> (GLYPH_W - 1 - col) & 1 == 1 {
                    let (px, py) = (gx + col, gy + row);
                    if px < img.width && py < img.height {
                        img.set(px, py, LABEL_FG);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_is_identity_below_limit() {
        let img = RgbImage::zeroed(100, 60);
        let (out, ratio) = shrink_rgb_to_max_dim(&img, 2000);
        assert_eq!(ratio, 1.0);
        assert_eq!((out.width, out.height), (100, 60));
    }

    #[test]
    fn shrink_caps_longest_side_and_reports_ratio() {
        let img = RgbImage::zeroed(4000, 3000);
        let (out, ratio) = shrink_rgb_to_max_dim(&img, 2000);
        assert_eq!(out.width, 2000);
        assert_eq!(out.height, 1500);
        assert_eq!(ratio, 2.0);
    }

    #[test]
    fn grid_lines_land_on_spacing_multiples() {
        let mut img = RgbImage::zeroed(500, 400);
        for i in 0..img.data.len() {
            img.data[i] = 100;
        }
        let out = draw_grid_overlay(&img, 200);
        // On a grid line the red channel dominates.
        let on_line = out.get(200, 150);
        assert!(on_line[0] > on_line[1] + 50);
        // Between lines (away from labels) pixels are untouched.
        assert_eq!(out.get(150, 150), [100, 100, 100]);
    }

    #[test]
    fn labels_render_over_a_white_box() {
        let out = draw_grid_overlay(&RgbImage::zeroed(300, 300), 200);
        // Label box at the origin intersection.
        assert_eq!(out.get(4, 3), [255, 255, 255]);
        // Some dark-red glyph pixel exists near it.
        let mut found = false;
        for y in 2..12 {
            for x in 2..12 {
                if out.get(x, y) == [200, 0, 0] {
                    found = true;
                }
            }
        }
        assert!(found, "no glyph pixels rendered");
    }
}
