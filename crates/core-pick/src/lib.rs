//! Mouse-ray construction and scene-object picking.
//!
//! Rays are built from window mouse coordinates: scale to pixels using the
//! display-scale helper, map to normalized device coordinates, weight the
//! camera basis by the field of view, normalize. Scene picking prunes by
//! object AABB first; manifold objects then need an actual triangle hit,
//! while sketches pick on their AABB hit distance alone.

use glam::{DVec3, Vec3};

use core_kernel::MeshData;
use core_transport::{SceneObject, SceneObjectKind};

/// Orthonormal camera basis.
#[derive(Debug, Clone, Copy)]
pub struct CameraBasis {
    pub right: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
}

/// Everything needed to turn a pixel into a world-space ray.
#[derive(Debug, Clone, Copy)]
pub struct PickContext {
    pub viewport_width: i32,
    pub viewport_height: i32,
    pub fov_degrees: f32,
    pub eye: Vec3,
    pub basis: CameraBasis,
}

/// Ray direction through a pixel.
pub fn camera_ray_direction(mouse_x: i32, mouse_y: i32, ctx: &PickContext) -> Vec3 {
    let w = ctx.viewport_width.max(1) as f32;
    let h = ctx.viewport_height.max(1) as f32;
    let nx = (mouse_x as f32 / w) * 2.0 - 1.0;
    let ny = 1.0 - (mouse_y as f32 / h) * 2.0;
    let tan_half = (ctx.fov_degrees.to_radians() * 0.5).tan();
    let x_cam = nx * tan_half * (w / h);
    let y_cam = ny * tan_half;
    (ctx.basis.forward + ctx.basis.right * x_cam + ctx.basis.up * y_cam).normalize()
}

/// Mean of the per-axis pixel/window ratios, clamped to `[1, 4]`. Zero or
/// negative inputs substitute 1.0 for that axis.
pub fn display_scale(window_w: i32, window_h: i32, pixel_w: i32, pixel_h: i32) -> f64 {
    let ratio = |pixel: i32, window: i32| -> f64 {
        if pixel <= 0 || window <= 0 {
            1.0
        } else {
            pixel as f64 / window as f64
        }
    };
    let s = (ratio(pixel_w, window_w) + ratio(pixel_h, window_h)) / 2.0;
    s.clamp(1.0, 4.0)
}

/// Map window mouse coordinates into the pixel viewport.
pub fn window_mouse_to_pixel(
    mouse_x: i32,
    mouse_y: i32,
    window_w: i32,
    window_h: i32,
    pixel_w: i32,
    pixel_h: i32,
) -> (i32, i32) {
    let ww = window_w.max(1) as f64;
    let wh = window_h.max(1) as f64;
    let pw = pixel_w.max(1);
    let ph = pixel_h.max(1);
    let px = (mouse_x as f64 * pw as f64 / ww).round() as i32;
    let py = (mouse_y as f64 * ph as f64 / wh).round() as i32;
    (px.clamp(0, pw - 1), py.clamp(0, ph - 1))
}

/// Slab test; returns the entry distance (or the exit when the origin is
/// inside the box).
pub fn ray_aabb_hit_t(origin: DVec3, dir: DVec3, bmin: DVec3, bmax: DVec3) -> Option<f64> {
    let mut tmin = f64::NEG_INFINITY;
    let mut tmax = f64::INFINITY;
    for i in 0..3 {
        let (o, d, mn, mx) = (origin[i], dir[i], bmin[i], bmax[i]);
        if d.abs() < 1e-12 {
            if o < mn || o > mx {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t1, t2) = {
            let a = (mn - o) * inv;
            let b = (mx - o) * inv;
            if a > b { (b, a) } else { (a, b) }
        };
        tmin = tmin.max(t1);
        tmax = tmax.min(t2);
        if tmin > tmax {
            return None;
        }
    }
    if tmax < 0.0 {
        return None;
    }
    Some(if tmin >= 0.0 { tmin } else { tmax })
}

/// Möller–Trumbore with `eps = 1e-9`; hits behind the origin are ignored.
pub fn ray_triangle_hit_t(
    origin: DVec3,
    dir: DVec3,
    v0: DVec3,
    v1: DVec3,
    v2: DVec3,
) -> Option<f64> {
    const EPS: f64 = 1e-9;
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let pvec = dir.cross(e2);
    let det = e1.dot(pvec);
    if det > -EPS && det < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    (t > EPS).then_some(t)
}

/// Nearest triangle hit over a whole mesh.
pub fn ray_mesh_hit_t(mesh: &MeshData, origin: DVec3, dir: DVec3) -> Option<f64> {
    if mesh.num_tri() == 0 || mesh.num_prop < 3 {
        return None;
    }
    let mut best: Option<f64> = None;
    for t in 0..mesh.num_tri() {
        let [i0, i1, i2] = mesh.tri(t);
        if let Some(hit) =
            ray_triangle_hit_t(origin, dir, mesh.pos(i0), mesh.pos(i1), mesh.pos(i2))
        {
            if best.is_none_or(|b| hit < b) {
                best = Some(hit);
            }
        }
    }
    best
}

/// Index of the nearest scene object along the ray, if any. Objects whose
/// bounds the ray misses never contribute.
pub fn pick_scene_object(scene: &[SceneObject], eye: Vec3, ray_dir: Vec3) -> Option<usize> {
    let origin = eye.as_dvec3();
    let dir = ray_dir.as_dvec3().normalize_or_zero();
    let mut best: Option<(usize, f64)> = None;
    for (i, obj) in scene.iter().enumerate() {
        let Some(t_box) = ray_aabb_hit_t(origin, dir, obj.bmin.as_dvec3(), obj.bmax.as_dvec3())
        else {
            continue;
        };
        let t_hit = if obj.kind == SceneObjectKind::Manifold && obj.mesh.num_tri() > 0 {
            match ray_mesh_hit_t(&obj.mesh, origin, dir) {
                Some(t) => t,
                None => continue,
            }
        } else {
            t_box
        };
        if best.is_none_or(|(_, bt)| t_hit < bt) {
            best = Some((i, t_hit));
        }
    }
    best.map(|(i, _)| i)
}
