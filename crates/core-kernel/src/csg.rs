//! Triangle-classification booleans.
//!
//! Triangles of each operand are kept or discarded based on whether their
//! centroid lies inside the other solid (ray-parity containment), and tool
//! triangles are inverted for subtraction. Triangles are never split at the
//! intersection curve; see the crate docs for where that approximation is
//! acceptable.

use glam::DVec3;

use crate::mesh::{MeshBuilder, MeshData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Subtract,
    Intersect,
}

struct Soup {
    tris: Vec<[DVec3; 3]>,
    bmin: DVec3,
    bmax: DVec3,
}

impl Soup {
    fn from_mesh(mesh: &MeshData) -> Self {
        let mut tris = Vec::with_capacity(mesh.num_tri());
        let mut bmin = DVec3::splat(f64::INFINITY);
        let mut bmax = DVec3::splat(f64::NEG_INFINITY);
        for t in 0..mesh.num_tri() {
            let [a, b, c] = mesh.tri(t);
            let tri = [mesh.pos(a), mesh.pos(b), mesh.pos(c)];
            for p in tri {
                bmin = bmin.min(p);
                bmax = bmax.max(p);
            }
            tris.push(tri);
        }
        Self { tris, bmin, bmax }
    }

    /// Ray-parity containment along +x.
    fn contains(&self, p: DVec3) -> bool {
        if p.cmplt(self.bmin).any() || p.cmpgt(self.bmax).any() {
            return false;
        }
        let dir = DVec3::X;
        let mut crossings = 0usize;
        for tri in &self.tris {
            if ray_hits_triangle(p, dir, tri) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }
}

fn ray_hits_triangle(orig: DVec3, dir: DVec3, tri: &[DVec3; 3]) -> bool {
    const EPS: f64 = 1e-10;
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let h = dir.cross(e2);
    let det = e1.dot(h);
    if det.abs() < EPS {
        return false;
    }
    let inv = 1.0 / det;
    let s = orig - tri[0];
    let u = s.dot(h) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    e2.dot(q) * inv > EPS
}

fn centroid(tri: &[DVec3; 3]) -> DVec3 {
    (tri[0] + tri[1] + tri[2]) / 3.0
}

pub fn boolean(a: &MeshData, b: &MeshData, op: BooleanOp) -> MeshData {
    let sa = Soup::from_mesh(a);
    let sb = Soup::from_mesh(b);
    let mut out = MeshBuilder::new();
    match op {
        BooleanOp::Union => {
            for tri in &sa.tris {
                if !sb.contains(centroid(tri)) {
                    out.triangle(tri[0], tri[1], tri[2]);
                }
            }
            for tri in &sb.tris {
                if !sa.contains(centroid(tri)) {
                    out.triangle(tri[0], tri[1], tri[2]);
                }
            }
        }
        BooleanOp::Subtract => {
            for tri in &sa.tris {
                if !sb.contains(centroid(tri)) {
                    out.triangle(tri[0], tri[1], tri[2]);
                }
            }
            // Tool surface inside the base becomes the cavity wall, inverted.
            for tri in &sb.tris {
                if sa.contains(centroid(tri)) {
                    out.triangle(tri[0], tri[2], tri[1]);
                }
            }
        }
        BooleanOp::Intersect => {
            for tri in &sa.tris {
                if sb.contains(centroid(tri)) {
                    out.triangle(tri[0], tri[1], tri[2]);
                }
            }
            for tri in &sb.tris {
                if sa.contains(centroid(tri)) {
                    out.triangle(tri[0], tri[1], tri[2]);
                }
            }
        }
    }
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::Manifold;
    use glam::DVec3 as V;

    #[test]
    fn containment_agrees_with_cube_geometry() {
        let m = Manifold::cube(V::splat(2.0), true);
        let soup = Soup::from_mesh(m.mesh());
        assert!(soup.contains(V::new(0.3, 0.2, 0.1)));
        assert!(!soup.contains(V::new(3.0, 0.0, 0.0)));
        assert!(!soup.contains(V::new(0.0, 0.0, 1.5)));
    }

    #[test]
    fn subtract_removes_embedded_tool_volume() {
        let base = Manifold::cube(V::splat(4.0), true);
        // Tool punches through the middle along z.
        let tool = Manifold::cube(V::new(1.0, 1.0, 8.0), true);
        let cut = base.boolean(&tool, BooleanOp::Subtract);
        assert!(cut.status().is_ok());
        let soup = Soup::from_mesh(cut.mesh());
        // Off-center material survives; the middle column is gone as far as
        // the retained surface is concerned.
        assert!(soup.tris.len() < base.mesh().num_tri() + tool.mesh().num_tri());
    }

    #[test]
    fn intersect_of_disjoint_solids_is_empty() {
        let a = Manifold::cube(V::splat(2.0), true);
        let b = a.translate(V::new(10.0, 0.0, 0.0));
        let mesh = boolean(a.mesh(), b.mesh(), BooleanOp::Intersect);
        assert!(mesh.is_empty());
    }

    #[test]
    fn union_drops_fully_embedded_tool() {
        let big = Manifold::cube(V::splat(4.0), true);
        let small = Manifold::cube(V::splat(1.0), true);
        let mesh = boolean(big.mesh(), small.mesh(), BooleanOp::Union);
        assert_eq!(mesh.num_tri(), big.mesh().num_tri());
    }
}
