use std::path::Path;

use crate::{
    data_structures::{model, texture},
    resources::load_binary,
};

/// Grey used for meshes without a usable material.
pub const DEFAULT_DIFFUSE: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("Material bind group layout"),
    })
}

/// What the viewer uses of an MTL material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    pub name: String,
    /// `Kd` with the dissolve `d` as alpha.
    pub diffuse: [f32; 4],
    /// `map_Kd`, relative to the OBJ file.
    pub diffuse_texture: Option<String>,
}

impl MaterialData {
    pub fn from_tobj(m: &tobj::Material) -> Self {
        let [r, g, b] = m.diffuse.unwrap_or([
            DEFAULT_DIFFUSE[0],
            DEFAULT_DIFFUSE[1],
            DEFAULT_DIFFUSE[2],
        ]);
        let alpha = m.dissolve.unwrap_or(1.0).clamp(0.0, 1.0);
        Self {
            name: m.name.clone(),
            diffuse: [r, g, b, alpha],
            diffuse_texture: m
                .diffuse_texture
                .as_ref()
                .filter(|path| !path.trim().is_empty())
                .cloned(),
        }
    }

    pub fn fallback() -> Self {
        Self {
            name: "default".to_string(),
            diffuse: DEFAULT_DIFFUSE,
            diffuse_texture: None,
        }
    }
}

pub async fn load_texture(
    base: &Path,
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<texture::Texture> {
    let data = load_binary(base, file_name).await?;
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str());
    texture::Texture::from_bytes(device, queue, &data, file_name, extension)
}

/// Upload one material.
///
/// A texture that fails to load is reported and replaced with plain white so the diffuse
/// colour still shows.
pub async fn load_material(
    base: &Path,
    data: &MaterialData,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> model::Material {
    let white = || texture::Texture::create_solid([255; 4], device, queue, &data.name);
    let diffuse_texture = match &data.diffuse_texture {
        Some(file_name) => match load_texture(base, file_name, device, queue).await {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!(
                    "Texture {} of material {} could not be loaded: {}",
                    file_name,
                    data.name,
                    e
                );
                white()
            }
        },
        None => white(),
    };
    model::Material::new(device, &data.name, data.diffuse, diffuse_texture, layout)
}
