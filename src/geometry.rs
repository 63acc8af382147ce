//! Quadrilateral validation, quad-to-quad projective transforms and
//! inverse-mapped warp sampling on top of `imageproc`'s projections.

use image::{Rgba, Rgba32FImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into_with};
use serde::{Deserialize, Serialize};

use crate::color::LinearImage;
use crate::error::GeometryError;

/// Smallest quadrilateral area, in square pixels, that can be warped onto.
pub const MIN_QUAD_AREA: f64 = 1.0;
/// Sine of the smallest corner angle tolerated before corners count as collinear.
const COLLINEAR_SINE: f64 = 1e-3;

/// A point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    fn len(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        self.sub(other).len()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Integer pixel rectangle `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBounds {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Four corners ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad {
    pub points: [Point; 4],
}

impl Quad {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle from `(x, y)` with the given size.
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    /// Signed shoelace area; positive for clockwise order in y-down pixel space.
    pub fn signed_area(&self) -> f64 {
        let p = &self.points;
        (0..4)
            .map(|i| p[i].cross(p[(i + 1) % 4]))
            .sum::<f64>()
            / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Reject quads that cannot be the image of a rectangle under a projective map.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let p = &self.points;
        if p.iter().any(|pt| !pt.x.is_finite() || !pt.y.is_finite()) {
            return Err(GeometryError::NonFinite);
        }

        let area = self.area();
        if area < MIN_QUAD_AREA {
            return Err(GeometryError::Degenerate { area });
        }

        let mut turns = [0f64; 4];
        for i in 0..4 {
            let prev = p[(i + 3) % 4];
            let next = p[(i + 1) % 4];
            let a = p[i].sub(prev);
            let b = next.sub(p[i]);
            let norm = a.len() * b.len();
            if norm <= f64::EPSILON || (a.cross(b) / norm).abs() < COLLINEAR_SINE {
                return Err(GeometryError::Collinear { index: i });
            }
            turns[i] = a.cross(b);
        }

        if segments_cross(p[0], p[1], p[2], p[3]) || segments_cross(p[1], p[2], p[3], p[0]) {
            return Err(GeometryError::SelfIntersecting);
        }

        let positive = turns.iter().filter(|t| **t > 0.0).count();
        if positive != 0 && positive != 4 {
            return Err(GeometryError::NonConvex);
        }
        Ok(())
    }

    /// Minimum and maximum corner coordinates.
    pub fn extent(&self) -> (Point, Point) {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Pixel bounding box grown by `pad` and clipped to a `width`×`height` canvas.
    pub fn bounds(&self, pad: u32, width: u32, height: u32) -> PixelBounds {
        let (min, max) = self.extent();
        let pad = f64::from(pad);
        let x0 = (min.x - pad).floor().clamp(0.0, f64::from(width)) as u32;
        let y0 = (min.y - pad).floor().clamp(0.0, f64::from(height)) as u32;
        let x1 = (max.x + pad).ceil().clamp(0.0, f64::from(width)) as u32;
        let y1 = (max.y + pad).ceil().clamp(0.0, f64::from(height)) as u32;
        PixelBounds::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = b.sub(a).cross(c.sub(a));
    let d2 = b.sub(a).cross(d.sub(a));
    let d3 = d.sub(c).cross(a.sub(c));
    let d4 = d.sub(c).cross(b.sub(c));
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Source rectangle `(0, 0)-(width, height)` of a creative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &LinearImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn corners(&self) -> [Point; 4] {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ]
    }
}

fn to_f32_pair(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Projective transform fixed by four corner correspondences.
///
/// Serialises as its corner pairs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Homography {
    pub source: [Point; 4],
    pub destination: [Point; 4],
    #[serde(skip)]
    projection: Projection,
}

impl Homography {
    /// Solve the transform taking each `source[i]` to `destination[i]`.
    pub fn from_corners(source: [Point; 4], destination: [Point; 4]) -> Result<Self, GeometryError> {
        let projection =
            Projection::from_control_points(source.map(to_f32_pair), destination.map(to_f32_pair))
                .ok_or(GeometryError::Singular)?;
        Ok(Self {
            source,
            destination,
            projection,
        })
    }

    /// Map a point; `None` when it lands on the line at infinity.
    pub fn apply(&self, p: Point) -> Option<Point> {
        let (x, y) = self.projection * to_f32_pair(p);
        (x.is_finite() && y.is_finite()).then(|| Point::new(f64::from(x), f64::from(y)))
    }

    /// The reverse mapping.
    pub fn invert(&self) -> Homography {
        Homography {
            source: self.destination,
            destination: self.source,
            projection: self.projection.invert(),
        }
    }

    /// The same mapping into a buffer whose origin is `origin` and which
    /// holds `factor` pixels per destination pixel.
    pub fn rescaled(&self, origin: Point, factor: f64) -> Homography {
        let to_local = Projection::scale(factor as f32, factor as f32)
            * Projection::translate(-origin.x as f32, -origin.y as f32);
        Homography {
            source: self.source,
            destination: self
                .destination
                .map(|p| Point::new((p.x - origin.x) * factor, (p.y - origin.y) * factor)),
            projection: to_local * self.projection,
        }
    }
}

impl PartialEq for Homography {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.destination == other.destination
    }
}

/// Compute the transform taking the corners of `src` onto `dst` in
/// top-left, top-right, bottom-right, bottom-left order.
pub fn compute_homography(src: SourceRect, dst: &Quad) -> Result<Homography, GeometryError> {
    if src.width == 0 || src.height == 0 {
        return Err(GeometryError::EmptySource {
            width: src.width,
            height: src.height,
        });
    }
    dst.validate()?;
    Homography::from_corners(src.corners(), dst.points)
}

/// Border around a creative in its warp buffer: one ring of edge pixels, then
/// two transparent rings that keep the edge colour.
const RING: u32 = 3;

/// A creative laid out for repeated warping.
pub struct WarpSource {
    rect: SourceRect,
    pixels: Rgba32FImage,
}

impl WarpSource {
    pub fn new(image: &LinearImage) -> Result<Self, GeometryError> {
        let rect = SourceRect::of(image);
        let (w, h) = (rect.width, rect.height);
        if w == 0 || h == 0 {
            return Err(GeometryError::EmptySource {
                width: w,
                height: h,
            });
        }
        let pixels = Rgba32FImage::from_fn(w + 2 * RING, h + 2 * RING, |x, y| {
            let sx = x.saturating_sub(RING).min(w - 1);
            let sy = y.saturating_sub(RING).min(h - 1);
            let mut px = image.get(sx, sy);
            let opaque = (RING - 1..=w + RING).contains(&x) && (RING - 1..=h + RING).contains(&y);
            if !opaque {
                px[3] = 0.0;
            }
            Rgba(px)
        });
        Ok(Self { rect, pixels })
    }

    pub fn rect(&self) -> SourceRect {
        self.rect
    }

    /// Render `bounds` of the destination space by inverse-mapping every
    /// pixel centre into the creative and sampling bilinearly.
    pub fn sample(&self, transform: &Homography, bounds: PixelBounds) -> LinearImage {
        let to_source = transform.invert().projection;
        let (ox, oy) = (bounds.x as f32 + 0.5, bounds.y as f32 + 0.5);
        let (w, h) = (self.rect.width as f32, self.rect.height as f32);
        let ring = RING as f32;
        // Creative coordinate `t` to a buffer coordinate. Points off the
        // creative land exactly on a transparent ring pixel.
        let place = |t: f32, size: f32| {
            if t < 0.0 {
                ring - 2.0
            } else if t >= size {
                size + ring + 1.0
            } else {
                t + ring - 0.5
            }
        };

        let mut out = Rgba32FImage::new(bounds.width, bounds.height);
        warp_into_with(
            &self.pixels,
            |x, y| {
                let (u, v) = to_source * (x + ox, y + oy);
                (place(u, w), place(v, h))
            },
            Interpolation::Bilinear,
            Rgba([0.0; 4]),
            &mut out,
        );
        LinearImage::from_rgba32f(&out)
    }
}

/// Render `bounds` of the destination space from `image` under `transform`.
///
/// The result is `bounds`-sized. Pixels whose centre maps outside the source
/// rectangle get alpha 0; their colour is the nearest edge colour so that
/// later averaging does not pull in black.
pub fn warp_sample(
    image: &LinearImage,
    transform: &Homography,
    bounds: PixelBounds,
) -> Result<LinearImage, GeometryError> {
    Ok(WarpSource::new(image)?.sample(transform, bounds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point, tol: f64) -> bool {
        a.distance(b) < tol
    }

    mod quad_validate {
        use super::*;

        #[test]
        fn rectangle_is_valid() {
            assert!(Quad::rect(10.0, 10.0, 40.0, 30.0).validate().is_ok());
        }

        #[test]
        fn counter_clockwise_order_is_valid() {
            let mut q = Quad::rect(0.0, 0.0, 10.0, 10.0);
            q.points.reverse();
            assert!(q.validate().is_ok());
        }

        #[test]
        fn collinear_points_rejected() {
            let q = Quad::new([
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(50.0, 40.0),
            ]);
            assert_eq!(q.validate(), Err(GeometryError::Collinear { index: 1 }));
        }

        #[test]
        fn all_points_on_a_line_is_degenerate() {
            let q = Quad::new([
                Point::new(0.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(20.0, 20.0),
                Point::new(30.0, 30.0),
            ]);
            assert!(matches!(
                q.validate(),
                Err(GeometryError::Degenerate { .. })
            ));
        }

        #[test]
        fn bowtie_rejected() {
            let q = Quad::new([
                Point::new(0.0, 0.0),
                Point::new(40.0, 0.0),
                Point::new(0.0, 40.0),
                Point::new(60.0, 30.0),
            ]);
            assert_eq!(q.validate(), Err(GeometryError::SelfIntersecting));
        }

        #[test]
        fn dart_rejected_as_non_convex() {
            let q = Quad::new([
                Point::new(0.0, 0.0),
                Point::new(40.0, 20.0),
                Point::new(80.0, 0.0),
                Point::new(40.0, 60.0),
            ]);
            assert_eq!(q.validate(), Err(GeometryError::NonConvex));
        }

        #[test]
        fn nan_rejected() {
            let mut q = Quad::rect(0.0, 0.0, 10.0, 10.0);
            q.points[2].x = f64::NAN;
            assert_eq!(q.validate(), Err(GeometryError::NonFinite));
        }
    }

    mod bounds {
        use super::*;

        #[test]
        fn padded_and_clipped() {
            let q = Quad::rect(2.5, 3.0, 10.0, 10.0);
            assert_eq!(q.bounds(0, 100, 100), PixelBounds::new(2, 3, 11, 10));
            assert_eq!(q.bounds(5, 100, 100), PixelBounds::new(0, 0, 18, 18));
            assert_eq!(q.bounds(0, 8, 8), PixelBounds::new(2, 3, 6, 5));
        }

        #[test]
        fn outside_canvas_is_empty() {
            let q = Quad::rect(200.0, 200.0, 10.0, 10.0);
            assert!(q.bounds(0, 100, 100).is_empty());
        }
    }

    mod compute_homography {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn maps_corners_in_order() {
                let dst = Quad::new([
                    Point::new(120.0, 40.0),
                    Point::new(410.0, 75.0),
                    Point::new(400.0, 260.0),
                    Point::new(110.0, 300.0),
                ]);
                let src = SourceRect::new(1920, 1080);
                let h = compute_homography(src, &dst).unwrap();
                for (s, d) in src.corners().iter().zip(dst.points.iter()) {
                    let mapped = h.apply(*s).unwrap();
                    assert!(close(mapped, *d, 1e-2), "{s:?} -> {mapped:?}, want {d:?}");
                }
            }

            #[test]
            fn axis_aligned_target_is_a_plain_scale() {
                let h = compute_homography(SourceRect::new(10, 10), &Quad::rect(0.0, 0.0, 20.0, 40.0))
                    .unwrap();
                for (x, y) in [(2.5, 2.5), (5.0, 7.5), (9.0, 1.0)] {
                    let mapped = h.apply(Point::new(x, y)).unwrap();
                    assert!(close(mapped, Point::new(x * 2.0, y * 4.0), 1e-3), "{mapped:?}");
                }
            }

            #[test]
            fn empty_source_rejected() {
                let err = compute_homography(SourceRect::new(0, 5), &Quad::rect(0.0, 0.0, 5.0, 5.0))
                    .unwrap_err();
                assert_eq!(err, GeometryError::EmptySource { width: 0, height: 5 });
            }

            #[test]
            fn degenerate_destination_rejected() {
                let dst = Quad::new([Point::new(5.0, 5.0); 4]);
                assert!(compute_homography(SourceRect::new(10, 10), &dst).is_err());
            }

            #[test]
            fn inverse_round_trips() {
                let dst = Quad::new([
                    Point::new(10.0, 12.0),
                    Point::new(90.0, 20.0),
                    Point::new(85.0, 70.0),
                    Point::new(15.0, 60.0),
                ]);
                let h = compute_homography(SourceRect::new(300, 200), &dst).unwrap();
                let inv = h.invert();
                let p = Point::new(40.0, 40.0);
                let back = h.apply(inv.apply(p).unwrap()).unwrap();
                assert!(close(back, p, 1e-3));
                assert_eq!(inv.source, dst.points);
            }

            #[test]
            fn rescaled_maps_into_the_local_buffer() {
                let dst = Quad::new([
                    Point::new(110.0, 52.0),
                    Point::new(190.0, 60.0),
                    Point::new(185.0, 110.0),
                    Point::new(115.0, 100.0),
                ]);
                let src = SourceRect::new(64, 48);
                let h = compute_homography(src, &dst).unwrap();
                let local = h.rescaled(Point::new(100.0, 50.0), 4.0);
                let p = Point::new(20.0, 30.0);
                let global = h.apply(p).unwrap();
                let expected = Point::new((global.x - 100.0) * 4.0, (global.y - 50.0) * 4.0);
                assert!(close(local.apply(p).unwrap(), expected, 1e-2));
                assert_eq!(local.destination[0], Point::new(40.0, 8.0));
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// compute_homography: every source corner lands on its destination corner
                #[test]
                fn corners_map_exactly(
                    w in 1u32..4000,
                    h in 1u32..4000,
                    dx in proptest::array::uniform4(-30.0f64..30.0),
                    dy in proptest::array::uniform4(-30.0f64..30.0)
                ) {
                    // Jittered rectangle corners stay convex for jitter below a quarter side.
                    let base = Quad::rect(200.0, 150.0, 400.0, 300.0);
                    let mut dst = base;
                    for i in 0..4 {
                        dst.points[i].x += dx[i];
                        dst.points[i].y += dy[i];
                    }
                    let src = SourceRect::new(w, h);
                    let hm = compute_homography(src, &dst).unwrap();
                    for (s, d) in src.corners().iter().zip(dst.points.iter()) {
                        let mapped = hm.apply(*s).unwrap();
                        prop_assert!(close(mapped, *d, 1e-2));
                    }
                }
            }
        }
    }

    mod warp_sample {
        use super::*;

        #[test]
        fn uniform_creative_fills_quad_centre() {
            let creative = LinearImage::from_pixel(100, 100, [0.8, 0.1, 0.05, 1.0]);
            let dst = Quad::new([
                Point::new(20.0, 10.0),
                Point::new(70.0, 18.0),
                Point::new(72.0, 60.0),
                Point::new(18.0, 55.0),
            ]);
            let h = compute_homography(SourceRect::of(&creative), &dst).unwrap();
            let out = warp_sample(&creative, &h, PixelBounds::new(0, 0, 90, 80)).unwrap();
            let px = out.get(45, 35);
            assert!((px[0] - 0.8).abs() < 1e-5 && (px[3] - 1.0).abs() < 1e-5);
            assert_eq!(out.get(2, 2)[3], 0.0);
        }

        #[test]
        fn orientation_is_preserved() {
            // Left half red, right half blue; the warp must not mirror or transpose it.
            let mut creative = LinearImage::new(10, 10);
            for y in 0..10 {
                for x in 0..10 {
                    let px = if x < 5 {
                        [1.0, 0.0, 0.0, 1.0]
                    } else {
                        [0.0, 0.0, 1.0, 1.0]
                    };
                    creative.put(x, y, px);
                }
            }
            let dst = Quad::rect(0.0, 0.0, 40.0, 20.0);
            let h = compute_homography(SourceRect::of(&creative), &dst).unwrap();
            let out = warp_sample(&creative, &h, PixelBounds::new(0, 0, 40, 20)).unwrap();
            assert!(out.get(5, 10)[0] > 0.99);
            assert!(out.get(35, 10)[2] > 0.99);
        }

        #[test]
        fn outside_pixels_keep_edge_colour_but_no_alpha() {
            let creative = LinearImage::from_pixel(8, 8, [0.3, 0.2, 0.1, 1.0]);
            let h = compute_homography(SourceRect::of(&creative), &Quad::rect(10.0, 10.0, 8.0, 8.0))
                .unwrap();
            let out = warp_sample(&creative, &h, PixelBounds::new(0, 0, 30, 30)).unwrap();
            for (x, y) in [(0, 0), (9, 14), (25, 12), (29, 29)] {
                let px = out.get(x, y);
                assert_eq!(px[3], 0.0, "({x}, {y})");
                assert!((px[0] - 0.3).abs() < 1e-5 && (px[2] - 0.1).abs() < 1e-5, "({x}, {y}) {px:?}");
            }
            assert!((out.get(10, 10)[3] - 1.0).abs() < 1e-5);
            assert!((out.get(17, 17)[3] - 1.0).abs() < 1e-5);
        }

        #[test]
        fn empty_creative_rejected() {
            let h = compute_homography(SourceRect::new(3, 3), &Quad::rect(0.0, 0.0, 3.0, 3.0)).unwrap();
            let err = warp_sample(&LinearImage::new(0, 3), &h, PixelBounds::new(0, 0, 3, 3)).unwrap_err();
            assert_eq!(err, GeometryError::EmptySource { width: 0, height: 3 });
        }

        #[test]
        fn bounds_offset_applies() {
            let creative = LinearImage::from_pixel(4, 4, [0.5, 0.5, 0.5, 1.0]);
            let h = compute_homography(SourceRect::of(&creative), &Quad::rect(10.0, 10.0, 4.0, 4.0))
                .unwrap();
            let out = warp_sample(&creative, &h, PixelBounds::new(10, 10, 6, 6)).unwrap();
            assert_eq!(out.dimensions(), (6, 6));
            assert!((out.get(0, 0)[3] - 1.0).abs() < 1e-5);
            assert!((out.get(3, 3)[3] - 1.0).abs() < 1e-5);
            assert_eq!(out.get(4, 4)[3], 0.0);
        }
    }
}
