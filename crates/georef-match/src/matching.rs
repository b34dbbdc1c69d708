use crate::Feature;

/// Index pair accepted by the ratio test, with the winning Hamming distance.
#[derive(Clone, Copy, Debug)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
    pub distance: f32,
}

#[inline]
fn hamming(a: &[u64; 4], b: &[u64; 4]) -> u32 {
    (a[0] ^ b[0]).count_ones()
        + (a[1] ^ b[1]).count_ones()
        + (a[2] ^ b[2]).count_ones()
        + (a[3] ^ b[3]).count_ones()
}

/// Exhaustive two-nearest-neighbor matching with Lowe's ratio test.
///
/// A query descriptor is kept only when its best distance is below
/// `ratio` times the second-best. 256-bit Hamming space has no useful
/// tree acceleration, so both profiles share this exhaustive scan.
pub fn match_ratio_test(query: &[Feature], train: &[Feature], ratio: f32) -> Vec<DescriptorMatch> {
    if train.len() < 2 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for (qi, q) in query.iter().enumerate() {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut best_ti = 0usize;
        for (ti, t) in train.iter().enumerate() {
            let d = hamming(&q.descriptor, &t.descriptor);
            if d < best {
                second = best;
                best = d;
                best_ti = ti;
            } else if d < second {
                second = d;
            }
        }
        if (best as f32) < ratio * second as f32 {
            out.push(DescriptorMatch {
                query: qi,
                train: best_ti,
                distance: best as f32,
            });
        }
    }
    out
}
