use georef_core::GrayImage;

use crate::preprocess::dilate;
use crate::EdgeParams;

/// Edge map: Gaussian smoothing, Sobel gradient magnitude, hysteresis
/// thresholding, then dilation so binary descriptors have some support
/// around each edge.
pub fn edge_map(img: &GrayImage, params: &EdgeParams) -> GrayImage {
    let blurred = gaussian3(img);
    let (gx, gy) = sobel(&blurred);

    let (w, h) = (img.width, img.height);
    let mut mag = vec![0.0f32; w * h];
    for i in 0..w * h {
        mag[i] = (gx[i] * gx[i] + gy[i] * gy[i]).sqrt();
    }

    let strong = params.high_threshold;
    let weak = params.low_threshold;

    // Strong pixels seed the edge set; weak pixels join when 8-connected to it.
    let mut edges = GrayImage::zeroed(w, h);
    let mut stack = Vec::new();
    for i in 0..w * h {
        if mag[i] >= strong {
            edges.data[i] = 255;
            stack.push(i);
        }
    }
    while let Some(i) = stack.pop() {
        let x = (i % w) as i32;
        let y = (i / w) as i32;
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if edges.data[j] == 0 && mag[j] >= weak {
                    edges.data[j] = 255;
                    stack.push(j);
                }
            }
        }
    }

    if params.dilate_radius > 0 {
        dilate(&edges, params.dilate_radius)
    } else {
        edges
    }
}

fn gaussian3(img: &GrayImage) -> GrayImage {
    // Separable [1 2 1]/4 kernel.
    let (w, h) = (img.width, img.height);
    let mut tmp = vec![0.0f32; w * h];
    let mut out = GrayImage::zeroed(w, h);
    let at = |x: i32, y: i32| -> f32 {
        let x = x.clamp(0, w as i32 - 1);
        let y = y.clamp(0, h as i32 - 1);
        img.data[y as usize * w + x as usize] as f32
    };
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            tmp[y as usize * w + x as usize] =
                (at(x - 1, y) + 2.0 * at(x, y) + at(x + 1, y)) / 4.0;
        }
    }
    let att = |x: i32, y: i32| -> f32 {
        let x = x.clamp(0, w as i32 - 1);
        let y = y.clamp(0, h as i32 - 1);
        tmp[y as usize * w + x as usize]
    };
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let v = (att(x, y - 1) + 2.0 * att(x, y) + att(x, y + 1)) / 4.0;
            out.data[y as usize * w + x as usize] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

pub(crate) fn sobel(img: &GrayImage) -> (Vec<f32>, Vec<f32>) {
    let (w, h) = (img.width, img.height);
    let at = |x: i32, y: i32| -> f32 {
        let x = x.clamp(0, w as i32 - 1);
        let y = y.clamp(0, h as i32 - 1);
        img.data[y as usize * w + x as usize] as f32
    };
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let i = y as usize * w + x as usize;
            gx[i] = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            gy[i] = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
        }
    }
    (gx, gy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_step_produces_vertical_edge() {
        let mut img = GrayImage::zeroed(20, 20);
        for y in 0..20 {
            for x in 10..20 {
                img.set(x, y, 200);
            }
        }
        let edges = edge_map(&img, &EdgeParams::default());
        // Edge response near the step, none far from it.
        assert_eq!(edges.get(10, 10), 255);
        assert_eq!(edges.get(2, 10), 0);
        assert_eq!(edges.get(17, 10), 0);
    }

    #[test]
    fn flat_image_has_no_edges() {
        let img = GrayImage {
            width: 16,
            height: 16,
            data: vec![90; 256],
        };
        let edges = edge_map(&img, &EdgeParams::default());
        assert!(edges.data.iter().all(|&v| v == 0));
    }
}
