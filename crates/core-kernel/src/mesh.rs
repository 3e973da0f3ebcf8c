//! Interleaved triangle mesh storage.
//!
//! Vertex properties are `num_prop` floats per vertex with position in the
//! first three; indices are triples into the vertex array. This is the one
//! mesh shape every downstream consumer (analysis, picking, export) reads.

use glam::DVec3;
use std::collections::HashMap;

/// Triangle mesh snapshot.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub num_prop: usize,
    pub vert_properties: Vec<f32>,
    pub tri_verts: Vec<u32>,
}

impl MeshData {
    /// Empty mesh with the canonical 3-property marker, used by sketch-only
    /// scenes so bounds/picking code sees a well-formed shape.
    pub fn empty() -> Self {
        Self {
            num_prop: 3,
            vert_properties: Vec::new(),
            tri_verts: Vec::new(),
        }
    }

    pub fn num_vert(&self) -> usize {
        if self.num_prop < 3 {
            return 0;
        }
        self.vert_properties.len() / self.num_prop
    }

    pub fn num_tri(&self) -> usize {
        self.tri_verts.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.num_vert() == 0 || self.num_tri() == 0
    }

    /// Position of vertex `idx` as f64.
    pub fn pos(&self, idx: u32) -> DVec3 {
        let base = idx as usize * self.num_prop;
        DVec3::new(
            self.vert_properties[base] as f64,
            self.vert_properties[base + 1] as f64,
            self.vert_properties[base + 2] as f64,
        )
    }

    /// Vertex indices of triangle `tri`.
    pub fn tri(&self, tri: usize) -> [u32; 3] {
        [
            self.tri_verts[tri * 3],
            self.tri_verts[tri * 3 + 1],
            self.tri_verts[tri * 3 + 2],
        ]
    }

    /// Axis-aligned bounds over finite vertex positions. `None` when the
    /// mesh has no finite vertices.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        if self.num_prop < 3 {
            return None;
        }
        let mut mn = DVec3::splat(f64::INFINITY);
        let mut mx = DVec3::splat(f64::NEG_INFINITY);
        let mut any = false;
        for i in 0..self.num_vert() {
            let p = self.pos(i as u32);
            if !p.is_finite() {
                continue;
            }
            mn = mn.min(p);
            mx = mx.max(p);
            any = true;
        }
        any.then_some((mn, mx))
    }

    /// Append another mesh, offsetting its indices. Both sides must carry
    /// plain 3-property vertices.
    pub fn concat(&mut self, other: &MeshData) {
        debug_assert_eq!(self.num_prop.max(3), 3);
        if self.num_prop < 3 {
            self.num_prop = 3;
        }
        let base = self.num_vert() as u32;
        self.vert_properties.extend_from_slice(&other.vert_properties);
        self.tri_verts.extend(other.tri_verts.iter().map(|&i| i + base));
    }
}

/// Accumulates triangles into an indexed mesh, deduplicating vertices by a
/// quantized position key.
#[derive(Default)]
pub struct MeshBuilder {
    map: HashMap<(i64, i64, i64), u32>,
    mesh: MeshData,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            mesh: MeshData {
                num_prop: 3,
                vert_properties: Vec::new(),
                tri_verts: Vec::new(),
            },
        }
    }

    pub fn vertex(&mut self, p: DVec3) -> u32 {
        let key = (
            (p.x * 1e6).round() as i64,
            (p.y * 1e6).round() as i64,
            (p.z * 1e6).round() as i64,
        );
        if let Some(&idx) = self.map.get(&key) {
            return idx;
        }
        let idx = self.mesh.num_vert() as u32;
        self.mesh
            .vert_properties
            .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        self.map.insert(key, idx);
        idx
    }

    /// Push a triangle, dropping degenerate ones.
    pub fn triangle(&mut self, a: DVec3, b: DVec3, c: DVec3) {
        if (b - a).cross(c - a).length_squared() <= 1e-24 {
            return;
        }
        let ia = self.vertex(a);
        let ib = self.vertex(b);
        let ic = self.vertex(c);
        if ia == ib || ib == ic || ia == ic {
            return;
        }
        self.mesh.tri_verts.extend_from_slice(&[ia, ib, ic]);
    }

    pub fn finish(self) -> MeshData {
        self.mesh
    }
}
