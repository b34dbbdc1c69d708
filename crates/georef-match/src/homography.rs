use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Projective mapping used only as the RANSAC consensus model; the final
/// georeferencing transform is the affine fit over GCPs, not this matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    /// Squared reprojection error for a correspondence.
    #[inline]
    pub fn reproj_error_sq(&self, src: Point2<f64>, dst: Point2<f64>) -> f64 {
        let p = self.apply(src);
        let dx = p.x - dst.x;
        let dy = p.y - dst.y;
        dx * dx + dy * dy
    }

    /// Minimal four-point fit, `dst ~ H * src`.
    ///
    /// Uses Hartley normalization before solving the 8x8 linear system with
    /// `h33 = 1`; `None` when the configuration is degenerate.
    pub fn from_four_points(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Self> {
        let (src_n, t_src) = normalize4(src);
        let (dst_n, t_dst) = normalize4(dst);

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for k in 0..4 {
            let x = src_n[k].x;
            let y = src_n[k].y;
            let u = dst_n[k].x;
            let v = dst_n[k].y;

            let r0 = 2 * k;
            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = 1.0;
            a[(r0, 6)] = -u * x;
            a[(r0, 7)] = -u * y;
            b[r0] = u;

            let r1 = 2 * k + 1;
            a[(r1, 3)] = x;
            a[(r1, 4)] = y;
            a[(r1, 5)] = 1.0;
            a[(r1, 6)] = -v * x;
            a[(r1, 7)] = -v * y;
            b[r1] = v;
        }

        let x = a.lu().solve(&b)?;
        let hn = Matrix3::new(
            x[0], x[1], x[2], //
            x[3], x[4], x[5], //
            x[6], x[7], 1.0,
        );

        // Denormalize: H = T_dst^{-1} * Hn * T_src, scaled so h33 = 1.
        let h = t_dst.try_inverse()? * hn * t_src;
        let s = h[(2, 2)];
        if s.abs() < 1e-12 {
            return None;
        }
        Some(Self::new(h / s))
    }
}

/// Hartley normalization: translate to the centroid and scale so the mean
/// distance from it is sqrt(2).
fn normalize4(pts: &[Point2<f64>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= 4.0;
    cy /= 4.0;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= 4.0;

    let s = if mean_dist > 1e-12 {
        2.0_f64.sqrt() / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let mut out = [Point2::new(0.0, 0.0); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }
    (out, t)
}
