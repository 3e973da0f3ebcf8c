//! Scene session: the cached view of one script's geometry.
//!
//! The session polls the script's modification time and only drives the
//! worker when it advances. On success it replaces its cache (scene
//! objects, a batch-unioned merged mesh, combined bounds) and clears the
//! error text. On failure it keeps the previous frame's geometry and
//! surfaces the diagnostic, so the display never goes blank under a
//! transient error. The export path re-runs the script at export quality
//! and never mutates the cache.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use glam::Vec3;

use core_kernel::{Manifold, MeshData, mesh_io};
use core_replay::{LodProfile, ReplayLodPolicy};
use core_transport::{SceneObject, WorkerClient};

/// Cached state for one script path.
pub struct SceneSession {
    script_path: PathBuf,
    last_mtime: Option<SystemTime>,
    pub scene_objects: Vec<SceneObject>,
    pub merged_mesh: MeshData,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub ipc_start_failed: bool,
    pub error_text: String,
    /// Bumped on every successful reload so callers can detect refreshes.
    pub generation: u64,
}

impl SceneSession {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            last_mtime: None,
            scene_objects: Vec::new(),
            merged_mesh: MeshData::empty(),
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ZERO,
            ipc_start_failed: false,
            error_text: String::new(),
            generation: 0,
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Combined bounds over the scene object table.
    pub fn compute_scene_bounds(objects: &[SceneObject]) -> Option<(Vec3, Vec3)> {
        let mut it = objects.iter();
        let first = it.next()?;
        let mut mn = first.bmin;
        let mut mx = first.bmax;
        for obj in it {
            mn = mn.min(obj.bmin);
            mx = mx.max(obj.bmax);
        }
        Some((mn, mx))
    }

    /// Poll the script mtime and re-execute on change. A missing or
    /// unchanged file is success without work; a failed run keeps the
    /// prior cache and records the error text.
    pub fn reload_if_changed(
        &mut self,
        client: &mut WorkerClient,
        lod_policy: &ReplayLodPolicy,
    ) -> Result<()> {
        let Some(mtime) = file_mtime(&self.script_path) else {
            return Ok(());
        };
        if self.last_mtime == Some(mtime) {
            return Ok(());
        }
        self.last_mtime = Some(mtime);

        let loaded = self.execute_and_merge(client, lod_policy);
        match loaded {
            Ok((objects, mesh, bmin, bmax)) => {
                self.scene_objects = objects;
                self.merged_mesh = mesh;
                self.bounds_min = bmin;
                self.bounds_max = bmax;
                self.error_text.clear();
                self.generation += 1;
                tracing::info!(
                    target: "session",
                    objects = self.scene_objects.len(),
                    tris = self.merged_mesh.num_tri(),
                    "scene reloaded"
                );
                Ok(())
            }
            Err(e) => {
                if !client.started() {
                    self.ipc_start_failed = true;
                }
                let text = if self.ipc_start_failed && e.to_string().is_empty() {
                    "IPC startup failed.".to_owned()
                } else {
                    format!("{e:#}")
                };
                self.error_text = text.clone();
                tracing::warn!(target: "session", error = %text, "scene reload failed");
                Err(e)
            }
        }
    }

    fn execute_and_merge(
        &self,
        client: &mut WorkerClient,
        lod_policy: &ReplayLodPolicy,
    ) -> Result<(Vec<SceneObject>, MeshData, Vec3, Vec3)> {
        let outcome = client
            .execute_script_scene(&self.script_path, lod_policy)
            .with_context(|| format!("executing {}", self.script_path.display()))?;
        let objects = outcome.objects;

        let parts: Vec<Manifold> = objects.iter().filter_map(|o| o.manifold.clone()).collect();
        let (mesh, mesh_bounds) = if parts.is_empty() {
            // Sketch-only scene: keep the 3-property empty mesh marker and
            // frame the camera from the object bounds.
            let bounds = Self::compute_scene_bounds(&objects)
                .context("scene has no manifold or sketch geometry to visualize")?;
            (MeshData::empty(), bounds)
        } else {
            let merged = Manifold::union_many(&parts);
            if !merged.status().is_ok() {
                bail!("scene merge failed: {}", merged.status().name());
            }
            let mesh = merged.get_mesh();
            let (mn, mx) = mesh
                .bounds()
                .context("merged scene mesh has no valid bounds")?;
            (mesh, (mn.as_vec3(), mx.as_vec3()))
        };

        let (mut bmin, mut bmax) = mesh_bounds;
        if let Some((omin, omax)) = Self::compute_scene_bounds(&objects) {
            bmin = bmin.min(omin);
            bmax = bmax.max(omax);
        }
        Ok((objects, mesh, bmin, bmax))
    }

    /// Re-run the script at export quality and write a 3MF file. Does not
    /// touch the cached scene.
    pub fn export_3mf(&self, client: &mut WorkerClient, out_path: &Path) -> Result<()> {
        export_scene_3mf(client, &self.script_path, out_path)
    }
}

/// Export flow shared by the session and the CLI: export-profile run,
/// batch union, kernel mesh writer.
pub fn export_scene_3mf(
    client: &mut WorkerClient,
    script_path: &Path,
    out_path: &Path,
) -> Result<()> {
    if out_path.as_os_str().is_empty() {
        bail!("export output path is empty");
    }
    let lod_policy = ReplayLodPolicy {
        profile: LodProfile::Export3mf,
        ..Default::default()
    };
    let outcome = client
        .execute_script_scene(script_path, &lod_policy)
        .with_context(|| format!("executing {} for export", script_path.display()))?;

    let parts: Vec<Manifold> = outcome
        .objects
        .iter()
        .filter_map(|o| o.manifold.clone())
        .collect();
    if parts.is_empty() {
        bail!("script scene does not contain manifold geometry to export");
    }
    let merged = Manifold::union_many(&parts);
    if !merged.status().is_ok() {
        bail!("failed to merge scene objects for mesh export: {}", merged.status().name());
    }
    mesh_io::export_3mf(out_path, merged.mesh())
        .with_context(|| format!("writing {}", out_path.display()))?;
    tracing::info!(target: "session", path = %out_path.display(), "exported 3MF");
    Ok(())
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_bounds_merge_across_objects() {
        use core_transport::{SceneObjectKind, SceneObject};
        let obj = |mn: Vec3, mx: Vec3| SceneObject {
            object_id: 0,
            name: String::new(),
            kind: SceneObjectKind::Manifold,
            root_id: 0,
            manifold: None,
            mesh: MeshData::empty(),
            contours: Vec::new(),
            bmin: mn,
            bmax: mx,
        };
        let objects = vec![
            obj(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(2.0, 3.0, 1.0)),
            obj(Vec3::new(0.0, -5.0, 0.0), Vec3::new(1.0, 1.0, 4.0)),
        ];
        let (mn, mx) = SceneSession::compute_scene_bounds(&objects).unwrap();
        assert_eq!(mn, Vec3::new(-1.0, -5.0, 0.0));
        assert_eq!(mx, Vec3::new(2.0, 3.0, 4.0));
        assert!(SceneSession::compute_scene_bounds(&[]).is_none());
    }

    #[test]
    fn missing_script_is_success_without_work() {
        let mut session = SceneSession::new("/nonexistent/missing.vicad.ts");
        let mut client = WorkerClient::new();
        session.reload_if_changed(&mut client, &ReplayLodPolicy::default()).unwrap();
        assert!(session.scene_objects.is_empty());
        assert!(!client.started(), "no work means no worker spawn");
    }
}
