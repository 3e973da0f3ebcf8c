//! Filled 2-D regions.
//!
//! A cross-section is a list of closed contours: counter-clockwise contours
//! are shells, clockwise contours are holes. All constructors produce
//! shells in counter-clockwise order so downstream triangulation and
//! offsetting can rely on the orientation convention.

use glam::DVec2;

/// Join style for contour offsetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Arc joins at outward corners; the count is the full-circle segment
    /// resolution the arcs are cut from.
    Round { arc_segments: u32 },
    /// Straight miter joins, capped by a miter limit, falling back to a
    /// bevel when the corner is too sharp.
    Miter,
}

/// A filled planar region.
#[derive(Debug, Clone, Default)]
pub struct CrossSection {
    contours: Vec<Vec<DVec2>>,
}

/// Signed area of a closed contour (positive = counter-clockwise).
pub fn signed_area(contour: &[DVec2]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..contour.len() {
        let a = contour[i];
        let b = contour[(i + 1) % contour.len()];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

impl CrossSection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_polygons(contours: Vec<Vec<DVec2>>) -> Self {
        let contours = contours
            .into_iter()
            .filter(|c| c.len() >= 3 && signed_area(c).abs() > 1e-12)
            .collect();
        Self { contours }
    }

    /// Circle of `radius` with `segments` chords, centered at the origin.
    pub fn circle(radius: f64, segments: u32) -> Self {
        if !radius.is_finite() || radius <= 0.0 || segments < 3 {
            return Self::empty();
        }
        let n = segments as usize;
        let mut pts = Vec::with_capacity(n);
        for k in 0..n {
            let a = std::f64::consts::TAU * k as f64 / n as f64;
            pts.push(DVec2::new(radius * a.cos(), radius * a.sin()));
        }
        Self { contours: vec![pts] }
    }

    /// Axis-aligned rectangle, origin-anchored or centered.
    pub fn rect(w: f64, h: f64, centered: bool) -> Self {
        if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
            return Self::empty();
        }
        let (x0, y0) = if centered { (-w * 0.5, -h * 0.5) } else { (0.0, 0.0) };
        let (x1, y1) = (x0 + w, y0 + h);
        Self {
            contours: vec![vec![
                DVec2::new(x0, y0),
                DVec2::new(x1, y0),
                DVec2::new(x1, y1),
                DVec2::new(x0, y1),
            ]],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn contours(&self) -> &[Vec<DVec2>] {
        &self.contours
    }

    pub fn translate(&self, d: DVec2) -> Self {
        Self {
            contours: self
                .contours
                .iter()
                .map(|c| c.iter().map(|&p| p + d).collect())
                .collect(),
        }
    }

    pub fn rotate(&self, degrees: f64) -> Self {
        let r = degrees.to_radians();
        let (s, c) = r.sin_cos();
        let rot = |p: DVec2| DVec2::new(c * p.x - s * p.y, s * p.x + c * p.y);
        Self {
            contours: self
                .contours
                .iter()
                .map(|poly| poly.iter().map(|&p| rot(p)).collect())
                .collect(),
        }
    }

    /// Offset every contour by `delta` (positive grows the filled region).
    /// Contours that collapse under a negative offset are dropped.
    pub fn offset(&self, delta: f64, join: JoinKind) -> Self {
        if !delta.is_finite() || delta == 0.0 {
            return self.clone();
        }
        let contours = self
            .contours
            .iter()
            .filter_map(|c| offset_contour(c, delta, join))
            .collect();
        Self { contours }
    }

    /// Round all corners with `radius`: shrink by the radius with miter
    /// joins, then grow back with round joins. The arcs inherit the given
    /// full-circle segment resolution.
    pub fn fillet(&self, radius: f64, arc_segments: u32) -> Self {
        if !radius.is_finite() || radius <= 0.0 {
            return self.clone();
        }
        self.offset(-radius, JoinKind::Miter)
            .offset(radius, JoinKind::Round { arc_segments })
    }

    pub fn bounds(&self) -> Option<(DVec2, DVec2)> {
        let mut mn = DVec2::splat(f64::INFINITY);
        let mut mx = DVec2::splat(f64::NEG_INFINITY);
        let mut any = false;
        for c in &self.contours {
            for &p in c {
                if !p.is_finite() {
                    continue;
                }
                mn = mn.min(p);
                mx = mx.max(p);
                any = true;
            }
        }
        any.then_some((mn, mx))
    }

    /// Greatest radial extent from the origin, used by callers deriving
    /// circular tessellation for twisted extrusion.
    pub fn max_radius(&self) -> f64 {
        self.contours
            .iter()
            .flatten()
            .map(|p| p.length())
            .fold(0.0, f64::max)
    }
}

fn offset_contour(contour: &[DVec2], delta: f64, join: JoinKind) -> Option<Vec<DVec2>> {
    let n = contour.len();
    if n < 3 {
        return None;
    }
    let area_in = signed_area(contour);
    let mut out: Vec<DVec2> = Vec::with_capacity(n * 2);

    for i in 0..n {
        let prev = contour[(i + n - 1) % n];
        let v = contour[i];
        let next = contour[(i + 1) % n];
        let dir_a = (v - prev).normalize_or_zero();
        let dir_b = (next - v).normalize_or_zero();
        if dir_a == DVec2::ZERO || dir_b == DVec2::ZERO {
            continue;
        }
        // Right-hand normals: outward for CCW shells, hole-shrinking for CW
        // holes, so one rule covers both.
        let na = DVec2::new(dir_a.y, -dir_a.x);
        let nb = DVec2::new(dir_b.y, -dir_b.x);
        let turn = dir_a.perp_dot(dir_b);

        let a_end = v + na * delta;
        let b_start = v + nb * delta;

        if turn * delta < -1e-12 {
            // Offset edges cross; a single intersection point keeps the
            // contour simple.
            out.push(line_intersect(a_end, dir_a, b_start, dir_b).unwrap_or((a_end + b_start) * 0.5));
        } else if (a_end - b_start).length_squared() <= 1e-18 {
            out.push(a_end);
        } else {
            match join {
                JoinKind::Round { arc_segments } => {
                    out.push(a_end);
                    push_arc(&mut out, v, na * delta.signum(), nb * delta.signum(), delta.abs(), arc_segments);
                    out.push(b_start);
                }
                JoinKind::Miter => {
                    match line_intersect(a_end, dir_a, b_start, dir_b) {
                        Some(m) if (m - v).length() <= 4.0 * delta.abs() + 1e-9 => out.push(m),
                        _ => {
                            out.push(a_end);
                            out.push(b_start);
                        }
                    }
                }
            }
        }
    }

    if out.len() < 3 {
        return None;
    }
    let area_out = signed_area(&out);
    // A sign flip means the contour inverted under a shrinking offset.
    if area_out.abs() < 1e-12 || area_out.signum() != area_in.signum() {
        return None;
    }
    Some(out)
}

/// Intersection of two lines given in point + direction form.
fn line_intersect(p0: DVec2, d0: DVec2, p1: DVec2, d1: DVec2) -> Option<DVec2> {
    let denom = d0.perp_dot(d1);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (p1 - p0).perp_dot(d1) / denom;
    Some(p0 + d0 * t)
}

/// Interior arc points between offset normals `from` and `to` around
/// `center`, cut from a circle of `full_segments` chords.
fn push_arc(out: &mut Vec<DVec2>, center: DVec2, from: DVec2, to: DVec2, radius: f64, full_segments: u32) {
    let a0 = from.y.atan2(from.x);
    let a1 = to.y.atan2(to.x);
    let mut sweep = a1 - a0;
    let ccw = from.perp_dot(to) >= 0.0;
    if ccw && sweep < 0.0 {
        sweep += std::f64::consts::TAU;
    }
    if !ccw && sweep > 0.0 {
        sweep -= std::f64::consts::TAU;
    }
    let full = full_segments.max(4) as f64;
    let steps = ((sweep.abs() / (std::f64::consts::TAU / full)).ceil() as usize).max(1);
    for k in 1..steps {
        let a = a0 + sweep * k as f64 / steps as f64;
        out.push(center + DVec2::new(a.cos(), a.sin()) * radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_point_count_matches_segments() {
        let cs = CrossSection::circle(10.0, 32);
        assert_eq!(cs.contours()[0].len(), 32);
        assert!(signed_area(&cs.contours()[0]) > 0.0);
    }

    #[test]
    fn circle_rejects_bad_radius() {
        assert!(CrossSection::circle(-1.0, 16).is_empty());
        assert!(CrossSection::circle(f64::NAN, 16).is_empty());
    }

    #[test]
    fn rect_centered_bounds() {
        let cs = CrossSection::rect(40.0, 20.0, true);
        let (mn, mx) = cs.bounds().unwrap();
        assert_eq!(mn, DVec2::new(-20.0, -10.0));
        assert_eq!(mx, DVec2::new(20.0, 10.0));
    }

    #[test]
    fn rect_origin_anchored() {
        let cs = CrossSection::rect(80.0, 50.0, false);
        let (mn, mx) = cs.bounds().unwrap();
        assert_eq!(mn, DVec2::ZERO);
        assert_eq!(mx, DVec2::new(80.0, 50.0));
    }

    #[test]
    fn miter_offset_of_rect_keeps_four_corners() {
        let cs = CrossSection::rect(40.0, 20.0, true).offset(4.0, JoinKind::Miter);
        assert_eq!(cs.contours()[0].len(), 4);
        let (mn, mx) = cs.bounds().unwrap();
        assert!((mx.x - mn.x - 48.0).abs() < 1e-9);
        assert!((mx.y - mn.y - 28.0).abs() < 1e-9);
    }

    #[test]
    fn fillet_rounds_corners_and_preserves_extents() {
        let cs = CrossSection::rect(40.0, 20.0, true).fillet(5.0, 32);
        let (mn, mx) = cs.bounds().unwrap();
        assert!((mx.x - mn.x - 40.0).abs() < 1e-6);
        assert!((mx.y - mn.y - 20.0).abs() < 1e-6);
        // Four straight corners replaced by arcs.
        assert!(cs.contours()[0].len() > 8);
    }

    #[test]
    fn fillet_vertex_count_grows_with_arc_resolution() {
        let coarse = CrossSection::rect(40.0, 20.0, true).fillet(5.0, 8);
        let fine = CrossSection::rect(40.0, 20.0, true).fillet(5.0, 128);
        assert!(fine.contours()[0].len() > coarse.contours()[0].len());
    }

    #[test]
    fn shrinking_past_collapse_drops_contour() {
        let cs = CrossSection::rect(4.0, 4.0, true).offset(-3.0, JoinKind::Miter);
        assert!(cs.is_empty());
    }

    #[test]
    fn rotate_preserves_area() {
        let cs = CrossSection::rect(8.0, 2.0, true);
        let rotated = cs.rotate(33.0);
        let a0 = signed_area(&cs.contours()[0]);
        let a1 = signed_area(&rotated.contours()[0]);
        assert!((a0 - a1).abs() < 1e-9);
    }
}
