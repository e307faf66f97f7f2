//! Object picking.
//!
//! Picking works on the CPU: every pickable [`Instanced`] render carries a [`PickMesh`] with
//! its triangles already in world space. A pointer ray is tested against each mesh's
//! bounding box first and against the triangles only when the box is hit.
//!
//! Like the render pass, picking walks the render tree of every flow and remembers which
//! flows own which object ids, so only the flows responsible for the hit object get
//! notified.
//!
//! When several objects are hit the nearest one wins. Hits at the same distance go to the
//! earlier flow and then to the lower object id, whatever pipeline batch the object is in.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt,
};

use cgmath::{Point3, Transform, Vector3};
use serde_json::json;

use crate::{
    data_structures::instance::Instance,
    flow::GraphicsFlow,
    geometry::{self, Aabb, Ray},
    render::Instanced,
};

/// Triangle of a picked mesh: the three vertex indices, the world space normal and the
/// material slot of the mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub normal: Vector3<f32>,
    pub material_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub object_id: u32,
    pub object_name: String,
    pub distance: f32,
    pub point: Point3<f32>,
    pub face: Face,
}

fn round3(v: f32) -> f64 {
    (f64::from(v) * 1000.0).round() / 1000.0
}

fn vector_json(x: f32, y: f32, z: f32) -> serde_json::Value {
    json!({ "x": round3(x), "y": round3(y), "z": round3(z) })
}

impl fmt::Display for Intersection {
    /// Multi-line summary shown in the info panel. Point and face are printed as JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let point = vector_json(self.point.x, self.point.y, self.point.z);
        let normal = vector_json(self.face.normal.x, self.face.normal.y, self.face.normal.z);
        let face = json!({
            "a": self.face.a,
            "b": self.face.b,
            "c": self.face.c,
            "normal": normal,
            "materialIndex": self.face.material_index,
        });
        writeln!(f, "{}", self.object_name)?;
        writeln!(f)?;
        writeln!(f, "Point")?;
        writeln!(f, "{}", point)?;
        writeln!(f)?;
        writeln!(f, "Face")?;
        write!(f, "{}", face)
    }
}

/// World space triangles of one object, used for ray tests.
#[derive(Clone, Debug, PartialEq)]
pub struct PickMesh {
    pub triangles: Vec<[Point3<f32>; 3]>,
    pub indices: Vec<[u32; 3]>,
    pub bounds: Aabb,
    /// Reported with every face of this mesh.
    pub material: usize,
}

impl PickMesh {
    /// Build from flat model space positions and a triangle list, transformed by `instance`.
    ///
    /// Triangles referencing positions out of range are skipped. Returns `None` when nothing
    /// is left.
    pub fn new(positions: &[f32], indices: &[u32], instance: &Instance) -> Option<Self> {
        let matrix = instance.to_matrix();
        let world: Vec<Point3<f32>> = positions
            .chunks_exact(3)
            .map(|p| matrix.transform_point(Point3::new(p[0], p[1], p[2])))
            .collect();

        let mut triangles = Vec::with_capacity(indices.len() / 3);
        let mut kept = Vec::with_capacity(indices.len() / 3);
        for tri in indices.chunks_exact(3) {
            let lookup = |i: u32| world.get(i as usize).copied();
            if let (Some(a), Some(b), Some(c)) = (lookup(tri[0]), lookup(tri[1]), lookup(tri[2])) {
                triangles.push([a, b, c]);
                kept.push([tri[0], tri[1], tri[2]]);
            } else {
                log::warn!("Skipping triangle {:?} with out of range index", tri);
            }
        }
        let bounds = Aabb::from_points(triangles.iter().flatten())?;
        Some(Self {
            triangles,
            indices: kept,
            bounds,
            material: 0,
        })
    }

    pub fn with_material(mut self, material: usize) -> Self {
        self.material = material;
        self
    }

    /// Nearest hit as (distance, triangle index).
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, usize)> {
        self.bounds.intersects(ray)?;
        let mut nearest: Option<(f32, usize)> = None;
        for (i, tri) in self.triangles.iter().enumerate() {
            if let Some(t) = geometry::ray_triangle(ray, tri) {
                match nearest {
                    Some((best, _)) if best <= t => {}
                    _ => nearest = Some((t, i)),
                }
            }
        }
        nearest
    }

    pub fn face(&self, triangle: usize) -> Option<Face> {
        let tri = self.triangles.get(triangle)?;
        let [a, b, c] = *self.indices.get(triangle)?;
        Some(Face {
            a,
            b,
            c,
            normal: geometry::triangle_normal(tri),
            material_index: self.material,
        })
    }
}

/// The part of an [`Instanced`] render that picking looks at.
#[derive(Clone, Copy, Debug)]
pub struct Pickable<'a> {
    /// Index of the flow that rendered the object.
    pub flow: usize,
    pub id: u32,
    pub name: &'a str,
    pub mesh: &'a PickMesh,
}

impl<'a> Pickable<'a> {
    pub fn from_instanced(instanced: &Instanced<'a>, flow: usize) -> Option<Self> {
        Some(Self {
            flow,
            id: instanced.id,
            name: instanced.name,
            mesh: instanced.pick?,
        })
    }
}

/// All hits of `ray` with `pickables`, nearest first.
///
/// Equal distances go to the earlier flow, then to the lower object id. The order of
/// `pickables` does not matter, so moving an object between pipeline batches (for instance
/// when it gets highlighted) never changes which one wins.
pub fn intersect(ray: &Ray, pickables: &[Pickable<'_>]) -> Vec<Intersection> {
    let mut hits: Vec<(usize, Intersection)> = pickables
        .iter()
        .filter_map(|pickable| {
            let (distance, triangle) = pickable.mesh.intersect(ray)?;
            let face = pickable.mesh.face(triangle)?;
            Some((
                pickable.flow,
                Intersection {
                    object_id: pickable.id,
                    object_name: pickable.name.to_string(),
                    distance,
                    point: ray.at(distance),
                    face,
                },
            ))
        })
        .collect();
    hits.sort_by(|(flow_a, a), (flow_b, b)| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then(flow_a.cmp(flow_b))
            .then(a.object_id.cmp(&b.object_id))
    });
    hits.into_iter().map(|(_, hit)| hit).collect()
}

/// Cast `ray` through the renders of all flows.
///
/// Returns the nearest intersection together with the indices of the flows that rendered
/// the hit object.
pub fn cast<State>(
    flows: &[Box<dyn GraphicsFlow<State>>],
    ray: &Ray,
) -> Option<(Intersection, HashSet<usize>)> {
    let mut owners: HashMap<u32, HashSet<usize>> = HashMap::new();
    let renders: Vec<_> = flows
        .iter()
        .enumerate()
        .map(|(idx, flow)| {
            let render = flow.on_render();
            render.map_ids(idx, &mut owners);
            render
        })
        .collect();

    let mut pickables = Vec::new();
    renders
        .iter()
        .enumerate()
        .for_each(|(idx, render)| render.pickables(idx, &mut pickables));

    let nearest = intersect(ray, &pickables).into_iter().next()?;
    let flow_ids = owners.remove(&nearest.object_id).unwrap_or_default();
    log::debug!(
        "Ray hit {} at distance {:.3}",
        nearest.object_name,
        nearest.distance
    );
    Some((nearest, flow_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{OrbitCamera, Projection, cast_ray};
    use approx::assert_relative_eq;
    use cgmath::{Vector2, Vector3};

    const QUAD: [f32; 12] = [
        -1.0, -1.0, 0.0, //
        1.0, -1.0, 0.0, //
        1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0,
    ];
    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

    fn quad_at(z: f32) -> PickMesh {
        PickMesh::new(&QUAD, &QUAD_INDICES, &Instance::from(Vector3::new(0.0, 0.0, z)))
            .expect("quad has triangles")
    }

    fn down_z() -> Ray {
        Ray::new(Point3::new(0.25, 0.5, 10.0), Vector3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn pick_mesh_is_built_in_world_space() {
        let mesh = quad_at(2.0);
        assert_eq!(mesh.triangles.len(), 2);
        assert_relative_eq!(mesh.bounds.min.z, 2.0);
        assert_relative_eq!(mesh.bounds.max.x, 1.0);
    }

    #[test]
    fn out_of_range_triangles_are_skipped() {
        let mesh = PickMesh::new(&QUAD, &[0, 1, 2, 0, 2, 9], &Instance::new()).unwrap();
        assert_eq!(mesh.indices, vec![[0, 1, 2]]);
        assert!(PickMesh::new(&QUAD, &[7, 8, 9], &Instance::new()).is_none());
    }

    #[test]
    fn intersect_reports_face_and_point() {
        let mesh = quad_at(0.0);
        let (distance, triangle) = mesh.intersect(&down_z()).unwrap();
        assert_relative_eq!(distance, 10.0, epsilon = 1e-5);
        let face = mesh.face(triangle).unwrap();
        // (0.25, 0.5) lies above the diagonal, in the second triangle
        assert_eq!((face.a, face.b, face.c), (0, 2, 3));
        assert_relative_eq!(face.normal.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn missing_the_bounds_skips_triangles() {
        let mesh = quad_at(0.0);
        let ray = Ray::new(Point3::new(5.0, 5.0, 10.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(mesh.intersect(&ray).is_none());
    }

    #[test]
    fn nearest_object_wins() {
        let far = quad_at(0.0);
        let near = quad_at(3.0);
        let pickables = [
            Pickable {
                flow: 0,
                id: 1,
                name: "far",
                mesh: &far,
            },
            Pickable {
                flow: 0,
                id: 2,
                name: "near",
                mesh: &near,
            },
        ];
        let hits = intersect(&down_z(), &pickables);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].object_name, "near");
        assert_relative_eq!(hits[0].distance, 7.0, epsilon = 1e-5);
        assert_relative_eq!(hits[0].point.z, 3.0, epsilon = 1e-5);
        assert_eq!(hits[1].object_id, 1);
    }

    #[test]
    fn ties_go_to_the_lower_object_id_in_any_order() {
        let first = quad_at(1.0);
        let second = quad_at(1.0);
        let a = Pickable {
            flow: 0,
            id: 4,
            name: "first",
            mesh: &first,
        };
        let b = Pickable {
            flow: 0,
            id: 5,
            name: "second",
            mesh: &second,
        };
        // a highlighted object moves to the end of the render tree
        for pickables in [[a, b], [b, a]] {
            let hits = intersect(&down_z(), &pickables);
            assert_eq!(hits[0].object_id, 4);
            assert_eq!(hits[1].object_id, 5);
        }
    }

    #[test]
    fn ties_go_to_the_earlier_flow_first() {
        let shared = quad_at(1.0);
        let late = Pickable {
            flow: 1,
            id: 1,
            name: "late flow",
            mesh: &shared,
        };
        let early = Pickable {
            flow: 0,
            id: 9,
            name: "early flow",
            mesh: &shared,
        };
        let hits = intersect(&down_z(), &[late, early]);
        assert_eq!(hits[0].object_name, "early flow");
    }

    fn unit_cube() -> PickMesh {
        let mut positions: Vec<f32> = Vec::new();
        for z in [-0.5, 0.5] {
            for y in [-0.5, 0.5] {
                for x in [-0.5, 0.5] {
                    positions.extend_from_slice(&[x, y, z]);
                }
            }
        }
        // corner index = x + 2y + 4z
        let indices: [u32; 36] = [
            0, 2, 3, 0, 3, 1, // z-
            4, 5, 7, 4, 7, 6, // z+
            0, 4, 6, 0, 6, 2, // x-
            1, 3, 7, 1, 7, 5, // x+
            0, 1, 5, 0, 5, 4, // y-
            2, 6, 7, 2, 7, 3, // y+
        ];
        PickMesh::new(&positions, &indices, &Instance::new()).expect("cube has triangles")
    }

    #[test]
    fn centre_ray_hits_front_face_of_centred_cube() {
        let cube = unit_cube();
        let pickables = [Pickable {
            flow: 0,
            id: 1,
            name: "cube",
            mesh: &cube,
        }];
        let camera = OrbitCamera::front(5.0);
        let centre = Vector2::new(0.0, 0.0);

        let perspective = Projection::perspective(800, 600, cgmath::Deg(70.0));
        let hit = intersect(&cast_ray(centre, &camera, &perspective), &pickables)
            .into_iter()
            .next()
            .unwrap();
        assert_relative_eq!(hit.distance, camera.eye().z - 0.5, epsilon = 1e-4);
        assert_relative_eq!(hit.point.z, 0.5, epsilon = 1e-4);
        assert_relative_eq!(hit.face.normal.z, 1.0, epsilon = 1e-5);

        let orthographic = Projection::orthographic(800, 600, 150.0);
        let Projection::Orthographic { znear, .. } = orthographic else {
            unreachable!()
        };
        let hit = intersect(&cast_ray(centre, &camera, &orthographic), &pickables)
            .into_iter()
            .next()
            .unwrap();
        assert_relative_eq!(hit.distance, camera.eye().z - znear - 0.5, epsilon = 1e-3);
        assert_relative_eq!(hit.point.z, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn info_text_lists_object_point_and_face() {
        let hit = Intersection {
            object_id: 1,
            object_name: "Object #0".into(),
            distance: 1.0,
            point: Point3::new(1.0, 2.5, -0.125),
            face: Face {
                a: 0,
                b: 1,
                c: 2,
                normal: Vector3::new(0.0, 0.0, 1.0),
                material_index: 3,
            },
        };
        let text = hit.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Object #0");
        assert_eq!(lines[2], "Point");
        assert_eq!(lines[3], r#"{"x":1.0,"y":2.5,"z":-0.125}"#);
        assert_eq!(lines[5], "Face");
        assert_eq!(
            lines[6],
            r#"{"a":0,"b":1,"c":2,"normal":{"x":0.0,"y":0.0,"z":1.0},"materialIndex":3}"#
        );
    }

    #[test]
    fn faces_report_the_mesh_material() {
        let mesh = quad_at(0.0).with_material(2);
        let (_, triangle) = mesh.intersect(&down_z()).unwrap();
        assert_eq!(mesh.face(triangle).unwrap().material_index, 2);
    }
}
