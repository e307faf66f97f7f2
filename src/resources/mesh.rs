use cgmath::{InnerSpace, Vector3, Zero};

use crate::data_structures::model;

/// One OBJ object after parsing, before anything is uploaded.
///
/// `positions` keeps the flat model space positions for barycenters and picking. Indices
/// address `vertices` and `positions` alike because models are loaded with `single_index`.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<f32>,
    pub vertices: Vec<model::ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

impl MeshData {
    /// `None` for objects without geometry.
    pub fn from_tobj(m: &tobj::Model) -> Option<Self> {
        let mesh = &m.mesh;
        let count = mesh.positions.len() / 3;
        if count == 0 || mesh.indices.is_empty() {
            log::warn!("Object {} has no faces and is skipped", m.name);
            return None;
        }
        let normals = if mesh.normals.len() == mesh.positions.len() {
            mesh.normals.clone()
        } else {
            compute_normals(&mesh.positions, &mesh.indices)
        };

        let vertices = (0..count)
            .map(|i| model::ModelVertex {
                position: [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                tex_coords: [
                    mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                    // OBJ texture space starts at the bottom
                    1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                normal: [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]],
            })
            .collect();

        Some(Self {
            name: m.name.clone(),
            positions: mesh.positions.clone(),
            vertices,
            indices: mesh.indices.clone(),
            material: mesh.material_id,
        })
    }
}

/// Smooth vertex normals: the area weighted average of the adjacent face normals.
///
/// Vertices that belong to no triangle get +Y.
pub fn compute_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let count = positions.len() / 3;
    let position = |i: u32| {
        let i = i as usize * 3;
        Vector3::new(positions[i], positions[i + 1], positions[i + 2])
    };
    let mut sums = vec![Vector3::zero(); count];
    for tri in indices.chunks_exact(3) {
        if tri.iter().any(|&i| i as usize >= count) {
            continue;
        }
        let (a, b, c) = (position(tri[0]), position(tri[1]), position(tri[2]));
        // cross product length is twice the area
        let n = (b - a).cross(c - a);
        for &i in tri {
            sums[i as usize] += n;
        }
    }
    sums.into_iter()
        .flat_map(|n| {
            let n = if n.magnitude2() > 0.0 {
                n.normalize()
            } else {
                Vector3::unit_y()
            };
            [n.x, n.y, n.z]
        })
        .collect()
}

pub fn load_meshes(models: &[tobj::Model]) -> Vec<MeshData> {
    models.iter().filter_map(MeshData::from_tobj).collect()
}
