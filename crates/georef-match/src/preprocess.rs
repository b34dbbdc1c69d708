use georef_core::{sample_bilinear, GrayImage};

use crate::MaskParams;

/// Downsample so the longest side fits `max_dim`.
///
/// Returns the working image and the ratio that maps working pixels back to
/// original ones (1.0 when no resize happened).
pub fn shrink_to_max_dim(img: &GrayImage, max_dim: usize) -> (GrayImage, f64) {
    let longest = img.width.max(img.height);
    if longest <= max_dim {
        return (img.clone(), 1.0);
    }
    let scale = max_dim as f64 / longest as f64;
    let out_w = ((img.width as f64 * scale).round() as usize).max(1);
    let out_h = ((img.height as f64 * scale).round() as usize).max(1);

    let view = img.view();
    let mut out = GrayImage::zeroed(out_w, out_h);
    let inv = 1.0 / scale;
    for y in 0..out_h {
        for x in 0..out_w {
            let sx = (x as f64 + 0.5) * inv - 0.5;
            let sy = (y as f64 + 0.5) * inv - 0.5;
            out.set(x, y, sample_bilinear(&view, sx.max(0.0) as f32, sy.max(0.0) as f32) as u8);
        }
    }
    (out, inv)
}

/// Binary content mask excluding no-data borders.
///
/// Thresholds near-black pixels, closes small gaps with an elliptical kernel,
/// and keeps only the largest 4-connected foreground region.
pub fn border_mask(img: &GrayImage, params: &MaskParams) -> GrayImage {
    let mut mask = GrayImage::zeroed(img.width, img.height);
    for i in 0..img.data.len() {
        mask.data[i] = if img.data[i] > params.threshold { 255 } else { 0 };
    }

    let closed = erode(&dilate(&mask, params.close_radius), params.close_radius);
    largest_component(&closed)
}

fn disk_offsets(radius: usize) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let r2 = r * r;
    let mut out = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r2 {
                out.push((dx, dy));
            }
        }
    }
    out
}

pub(crate) fn dilate(mask: &GrayImage, radius: usize) -> GrayImage {
    morph(mask, radius, true)
}

pub(crate) fn erode(mask: &GrayImage, radius: usize) -> GrayImage {
    morph(mask, radius, false)
}

fn morph(mask: &GrayImage, radius: usize, grow: bool) -> GrayImage {
    let offsets = disk_offsets(radius);
    let (w, h) = (mask.width as i32, mask.height as i32);
    let mut out = GrayImage::zeroed(mask.width, mask.height);
    for y in 0..h {
        for x in 0..w {
            let mut hit = !grow;
            for &(dx, dy) in &offsets {
                let nx = x + dx;
                let ny = y + dy;
                // Outside the frame counts as background.
                let v = if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    0
                } else {
                    mask.data[(ny * w + nx) as usize]
                };
                if grow && v > 0 {
                    hit = true;
                    break;
                }
                if !grow && v == 0 {
                    hit = false;
                    break;
                }
            }
            out.data[(y * w + x) as usize] = if hit { 255 } else { 0 };
        }
    }
    out
}

/// Keep only the largest 4-connected foreground region.
fn largest_component(mask: &GrayImage) -> GrayImage {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![0u32; w * h];
    let mut next_label = 1u32;
    let mut best_label = 0u32;
    let mut best_size = 0usize;
    let mut stack = Vec::new();

    for start in 0..w * h {
        if mask.data[start] == 0 || labels[start] != 0 {
            continue;
        }
        let label = next_label;
        next_label += 1;
        let mut size = 0usize;
        stack.push(start);
        labels[start] = label;
        while let Some(i) = stack.pop() {
            size += 1;
            let x = i % w;
            let y = i / w;
            let mut push = |j: usize| {
                if mask.data[j] > 0 && labels[j] == 0 {
                    labels[j] = label;
                    stack.push(j);
                }
            };
            if x > 0 {
                push(i - 1);
            }
            if x + 1 < w {
                push(i + 1);
            }
            if y > 0 {
                push(i - w);
            }
            if y + 1 < h {
                push(i + w);
            }
        }
        if size > best_size {
            best_size = size;
            best_label = label;
        }
    }

    let mut out = GrayImage::zeroed(w, h);
    for i in 0..w * h {
        if labels[i] == best_label && best_label != 0 {
            out.data[i] = 255;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_resize_below_limit() {
        let img = GrayImage::zeroed(100, 50);
        let (out, ratio) = shrink_to_max_dim(&img, 4000);
        assert_eq!(ratio, 1.0);
        assert_eq!(out.width, 100);
    }

    #[test]
    fn resize_preserves_aspect_and_reports_ratio() {
        let img = GrayImage::zeroed(800, 400);
        let (out, ratio) = shrink_to_max_dim(&img, 200);
        assert_eq!(out.width, 200);
        assert_eq!(out.height, 100);
        assert_eq!(ratio, 4.0);
    }

    #[test]
    fn mask_keeps_largest_region_only() {
        // Bright block on the left, small bright speck far right.
        let mut img = GrayImage::zeroed(40, 20);
        for y in 2..18 {
            for x in 2..20 {
                img.set(x, y, 200);
            }
        }
        img.set(38, 10, 200);

        let mask = border_mask(
            &img,
            &MaskParams {
                threshold: 15,
                close_radius: 1,
            },
        );
        assert_eq!(mask.get(10, 10), 255);
        assert_eq!(mask.get(38, 10), 0);
        // The black border stays excluded.
        assert_eq!(mask.get(0, 0), 0);
    }

    #[test]
    fn closing_fills_small_holes() {
        let mut img = GrayImage::zeroed(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                img.set(x, y, 200);
            }
        }
        img.set(15, 15, 0); // pinhole

        let mask = border_mask(
            &img,
            &MaskParams {
                threshold: 15,
                close_radius: 2,
            },
        );
        assert_eq!(mask.get(15, 15), 255);
    }
}
