//! 3MF export.
//!
//! A 3MF file is an OPC zip container holding a content-types part, a root
//! relationship, and the 3D model XML. Vertices are written at full f32
//! precision; the model unit is millimetres to match scene units.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::MeshIoError;
use crate::mesh::MeshData;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
 <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
 <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>
"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
 <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>
"#;

/// Write `mesh` as a single-object 3MF file at `path`. Empty meshes are
/// rejected before any file is created.
pub fn export_3mf(path: &Path, mesh: &MeshData) -> Result<(), MeshIoError> {
    if path.as_os_str().is_empty() {
        return Err(MeshIoError::EmptyPath);
    }
    if mesh.num_vert() == 0 || mesh.num_tri() == 0 {
        return Err(MeshIoError::EmptyMesh);
    }

    let mut model = String::with_capacity(mesh.num_vert() * 48 + mesh.num_tri() * 40);
    model.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
 <resources>
  <object id="1" type="model">
   <mesh>
    <vertices>
"#,
    );
    for i in 0..mesh.num_vert() {
        let p = mesh.pos(i as u32);
        model.push_str(&format!(
            "     <vertex x=\"{}\" y=\"{}\" z=\"{}\"/>\n",
            p.x, p.y, p.z
        ));
    }
    model.push_str("    </vertices>\n    <triangles>\n");
    for t in 0..mesh.num_tri() {
        let [a, b, c] = mesh.tri(t);
        model.push_str(&format!(
            "     <triangle v1=\"{a}\" v2=\"{b}\" v3=\"{c}\"/>\n"
        ));
    }
    model.push_str(
        r#"    </triangles>
   </mesh>
  </object>
 </resources>
 <build>
  <item objectid="1"/>
 </build>
</model>
"#,
    );

    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("[Content_Types].xml", opts)?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;
    zip.start_file("_rels/.rels", opts)?;
    zip.write_all(ROOT_RELS.as_bytes())?;
    zip.start_file("3D/3dmodel.model", opts)?;
    zip.write_all(model.as_bytes())?;
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::Manifold;
    use glam::DVec3;

    #[test]
    fn rejects_empty_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.3mf");
        let err = export_3mf(&path, &MeshData::empty()).unwrap_err();
        assert!(matches!(err, MeshIoError::EmptyMesh));
        assert!(!path.exists());
    }

    #[test]
    fn writes_a_zip_container_with_model_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.3mf");
        let m = Manifold::cube(DVec3::splat(2.0), true);
        export_3mf(&path, m.mesh()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // Zip local-file-header magic.
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        assert!(bytes.len() > 200);
    }
}
