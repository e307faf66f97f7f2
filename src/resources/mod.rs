//! Loading models, materials and textures from disk.
//!
//! Paths inside an OBJ file (`mtllib`, `map_Kd`) resolve relative to the directory of the
//! OBJ file itself.

use std::{
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::data_structures::scene::Scene;

pub mod mesh;
pub mod texture;

pub async fn load_string(base: &Path, file_name: &str) -> anyhow::Result<String> {
    let path = base.join(file_name);
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn load_binary(base: &Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = base.join(file_name);
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Split a model path into the directory everything else resolves against and the file name.
pub fn split_path(path: &Path) -> anyhow::Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} does not name a file", path.display()))?
        .to_string();
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((base, file_name))
}

/// Parse an OBJ file and its MTL libraries.
///
/// A missing or broken MTL file is reported and yields no materials, every mesh then falls
/// back to the default material.
pub async fn load_obj(
    base: &Path,
    file_name: &str,
) -> anyhow::Result<(Vec<tobj::Model>, Vec<tobj::Material>)> {
    let obj_text = load_string(base, file_name).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| async move {
            match load_string(base, &p).await {
                Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                Err(e) => {
                    log::warn!("Material library {} could not be loaded: {:#}", p, e);
                    Err(tobj::LoadError::OpenFileFailed)
                }
            }
        },
    )
    .await
    .with_context(|| format!("Failed to parse {}", base.join(file_name).display()))?;

    let materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Using the default material for {}: {}", file_name, e);
        Vec::new()
    });
    Ok((models, materials))
}

/// Load an OBJ file into a centred [`Scene`].
pub async fn load_scene(
    path: &Path,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> anyhow::Result<Scene> {
    let (base, file_name) = split_path(path)?;
    log::info!("Loading {}", path.display());
    let (models, obj_materials) = load_obj(&base, &file_name).await?;

    let mut material_data: Vec<texture::MaterialData> = obj_materials
        .iter()
        .map(texture::MaterialData::from_tobj)
        .collect();
    material_data.push(texture::MaterialData::fallback());

    let materials = futures::future::join_all(
        material_data
            .iter()
            .map(|data| texture::load_material(&base, data, device, queue, layout)),
    )
    .await;

    let meshes = mesh::load_meshes(&models);
    if meshes.is_empty() {
        anyhow::bail!("{} contains no faces", path.display());
    }
    let scene = Scene::new(device, &meshes, &materials);
    log::info!(
        "Loaded {} objects from {}, centring offset {:?}",
        scene.objects.len(),
        file_name,
        scene.offset
    );
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_is_split_into_base_and_name() {
        let (base, name) = split_path(Path::new("assets/models/part.obj")).unwrap();
        assert_eq!(base, PathBuf::from("assets/models"));
        assert_eq!(name, "part.obj");

        let (base, name) = split_path(Path::new("part.obj")).unwrap();
        assert_eq!(base, PathBuf::new());
        assert_eq!(name, "part.obj");
    }

    #[test]
    fn directories_are_rejected() {
        assert!(split_path(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn missing_mtl_falls_back_to_no_materials() {
        let dir = std::env::temp_dir().join(format!("meshscope-obj-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("tri.obj"),
            "mtllib missing.mtl\no tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n",
        )
        .await
        .unwrap();

        let (models, materials) = load_obj(&dir, "tri.obj").await.unwrap();
        assert_eq!(models.len(), 1);
        assert!(materials.is_empty());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn mtl_resolves_next_to_the_obj() {
        let dir = std::env::temp_dir().join(format!("meshscope-mtl-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("tri.obj"),
            "mtllib tri.mtl\no tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n",
        )
        .await
        .unwrap();
        tokio::fs::write(dir.join("tri.mtl"), "newmtl red\nKd 1 0 0\n")
            .await
            .unwrap();

        let (models, materials) = load_obj(&dir, "tri.obj").await.unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].name, "red");
        assert_eq!(models[0].mesh.material_id, Some(0));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
