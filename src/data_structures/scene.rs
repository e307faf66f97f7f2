//! The loaded model as a set of pickable objects.
//!
//! Every OBJ object becomes one [`SceneObject`]. All objects share a single translation,
//! computed so that the mean of the object barycenters lands on the origin and the model
//! sits in the middle of the view.

use cgmath::{EuclideanSpace, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::Instance,
        model::{Material, Mesh, Model},
    },
    geometry::{self, Aabb},
    labels::Label,
    pick::PickMesh,
    render::{Instanced, Render},
    resources::mesh::MeshData,
};

/// Result of centering a set of objects.
#[derive(Clone, Debug, PartialEq)]
pub struct Centering {
    /// Translation shared by all objects.
    pub offset: Vector3<f32>,
    /// Barycenter of every object after applying `offset`. `None` for objects without
    /// positions.
    pub centers: Vec<Option<Point3<f32>>>,
}

impl Centering {
    /// `objects` yields the flat positions and the triangle indices of each object.
    pub fn new<'a>(objects: impl IntoIterator<Item = (&'a [f32], &'a [u32])>) -> Self {
        let local: Vec<Option<Vector3<f32>>> = objects
            .into_iter()
            .map(|(positions, indices)| geometry::bary_center(positions, indices))
            .collect();
        let known: Vec<Vector3<f32>> = local.iter().flatten().copied().collect();
        let offset = geometry::composite_offset(&known);
        let centers = local
            .into_iter()
            .map(|center| center.map(|c| Point3::from_vec(c + offset)))
            .collect();
        Self { offset, centers }
    }
}

/// Material slot for a mesh. `count` excludes the fallback, which sits right after the
/// MTL materials.
pub fn resolve_material(material: Option<usize>, count: usize) -> usize {
    match material {
        Some(idx) if idx < count => idx,
        _ => count,
    }
}

#[derive(Debug)]
pub struct SceneObject {
    pub id: u32,
    /// Shown in the info panel, "Object #n".
    pub name: String,
    /// Floating label text, "obj#n".
    pub label: String,
    pub model: Model,
    pub instance: Instance,
    pub instance_buffer: wgpu::Buffer,
    pub pick: PickMesh,
    pub bary_center: Point3<f32>,
}

impl SceneObject {
    /// `materials` ends with the fallback material.
    pub fn new(
        device: &wgpu::Device,
        index: usize,
        data: &MeshData,
        materials: &[Material],
        offset: Vector3<f32>,
        bary_center: Point3<f32>,
    ) -> Option<Self> {
        let instance = Instance::from(offset);
        let material = resolve_material(data.material, materials.len().saturating_sub(1));
        let pick = PickMesh::new(&data.positions, &data.indices, &instance)?.with_material(material);
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Object #{} instance buffer", index)),
            contents: bytemuck::cast_slice(&[instance.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let mesh = Mesh::new(device, &data.name, &data.vertices, &data.indices, material);

        Some(Self {
            id: index as u32 + 1,
            name: format!("Object #{}", index),
            label: format!("obj#{}", index),
            model: Model {
                meshes: vec![mesh],
                materials: materials.to_vec(),
            },
            instance,
            instance_buffer,
            pick,
            bary_center,
        })
    }

    pub fn instanced(&self) -> Instanced<'_> {
        Instanced {
            instance: &self.instance_buffer,
            model: &self.model,
            amount: 1,
            id: self.id,
            name: &self.name,
            pick: Some(&self.pick),
        }
    }
}

#[derive(Debug)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub offset: Vector3<f32>,
}

impl Scene {
    pub fn new(
        device: &wgpu::Device,
        meshes: &[MeshData],
        materials: &[Material],
    ) -> Self {
        let centering = Centering::new(
            meshes
                .iter()
                .map(|m| (m.positions.as_slice(), m.indices.as_slice())),
        );
        let objects: Vec<SceneObject> = meshes
            .iter()
            .zip(centering.centers)
            .enumerate()
            .filter_map(|(index, (data, center))| {
                let object = SceneObject::new(
                    device,
                    index,
                    data,
                    materials,
                    centering.offset,
                    center?,
                );
                log::info!("{:.0}% loaded", (index + 1) as f32 * 100.0 / meshes.len() as f32);
                object
            })
            .collect();
        Self {
            objects,
            offset: centering.offset,
        }
    }

    pub fn object(&self, id: u32) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn bounds(&self) -> Option<Aabb> {
        let corners: Vec<Point3<f32>> = self
            .objects
            .iter()
            .flat_map(|object| [object.pick.bounds.min, object.pick.bounds.max])
            .collect();
        Aabb::from_points(&corners)
    }

    /// All objects, the hovered one highlighted.
    pub fn render(&self, hovered: Option<u32>) -> Render<'_> {
        let mut defaults = Vec::with_capacity(self.objects.len());
        let mut renders = Vec::new();
        for object in &self.objects {
            if Some(object.id) == hovered {
                renders.push(Render::Highlighted(object.instanced()));
            } else {
                defaults.push(object.instanced());
            }
        }
        renders.insert(0, Render::Defaults(defaults));
        Render::Composed(renders)
    }

    pub fn labels(&self) -> Vec<Label> {
        self.objects
            .iter()
            .map(|object| Label::new(object.label.clone(), object.bary_center))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centering_moves_mean_of_barycenters_to_origin() {
        let left = [-4.0, 0.0, 0.0, -2.0, 0.0, 0.0];
        let right = [8.0, 2.0, 0.0];
        let centering = Centering::new([(&left[..], &[0, 1][..]), (&right[..], &[0][..])]);
        // barycenters (-3, 0, 0) and (8, 2, 0), mean (2.5, 1, 0)
        assert_relative_eq!(centering.offset.x, -2.5);
        assert_relative_eq!(centering.offset.y, -1.0);
        let centers: Vec<Point3<f32>> = centering.centers.iter().flatten().copied().collect();
        assert_relative_eq!(centers[0].x, -5.5);
        assert_relative_eq!(centers[1].x, 5.5);
        assert_relative_eq!(centers[0].x + centers[1].x, 0.0);
    }

    #[test]
    fn empty_objects_do_not_shift_the_offset() {
        let only = [1.0, 1.0, 1.0];
        let centering = Centering::new([(&only[..], &[0][..]), (&[][..], &[][..])]);
        assert_relative_eq!(centering.offset.x, -1.0);
        assert_eq!(centering.centers[1], None);
    }

    #[test]
    fn unknown_materials_use_the_fallback() {
        assert_eq!(resolve_material(Some(1), 3), 1);
        assert_eq!(resolve_material(Some(3), 3), 3);
        assert_eq!(resolve_material(Some(7), 3), 3);
        assert_eq!(resolve_material(None, 0), 0);
    }
}
