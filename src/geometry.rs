//! CPU-side geometry used by the interaction layer.
//!
//! Nothing in here touches the GPU: barycenters and the centering offset computed when a
//! model is loaded, the ray primitives used for picking, and the unit cylinder that every
//! measurement segment is instanced from.

use cgmath::{EuclideanSpace, InnerSpace, Point3, Quaternion, Vector3, Zero};

use crate::data_structures::{instance::Instance, model::ModelVertex};

/// Below this, lengths and determinants count as zero.
pub const EPSILON: f32 = 1e-6;

/// A half-line in world space. `direction` is always unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

/// Mean of the triangle corners of an indexed mesh.
///
/// Every entry of `indices` counts once, so a vertex shared by several faces weighs as
/// much as the faces using it. Indices pointing past `positions` are ignored. Returns `None`
/// when no corner is left.
pub fn bary_center(positions: &[f32], indices: &[u32]) -> Option<Vector3<f32>> {
    let (sum, count) = indices
        .iter()
        .filter_map(|&i| {
            let start = i as usize * 3;
            positions.get(start..start + 3)
        })
        .fold((Vector3::zero(), 0usize), |(acc, n), p| {
            (acc + Vector3::new(p[0], p[1], p[2]), n + 1)
        });
    if count == 0 {
        return None;
    }
    Some(sum / count as f32)
}

/// Translation that moves the mean of `centers` onto the origin.
pub fn composite_offset(centers: &[Vector3<f32>]) -> Vector3<f32> {
    if centers.is_empty() {
        return Vector3::zero();
    }
    let sum = centers.iter().fold(Vector3::zero(), |acc, c| acc + c);
    sum * (-1.0 / centers.len() as f32)
}

/// Möller–Trumbore ray/triangle test.
///
/// Both faces count as hits since every material is rendered double sided. Returns the
/// distance along the ray.
pub fn ray_triangle(ray: &Ray, tri: &[Point3<f32>; 3]) -> Option<f32> {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        // parallel to the triangle plane
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - tri[0];
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}

/// Unit normal of a triangle, or zero for degenerate ones.
pub fn triangle_normal(tri: &[Point3<f32>; 3]) -> Vector3<f32> {
    let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
    if n.magnitude2() < EPSILON * EPSILON {
        Vector3::zero()
    } else {
        n.normalize()
    }
}

/// Axis aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |mut aabb, p| {
                aabb.min = Point3::new(aabb.min.x.min(p.x), aabb.min.y.min(p.y), aabb.min.z.min(p.z));
                aabb.max = Point3::new(aabb.max.x.max(p.x), aabb.max.y.max(p.y), aabb.max.z.max(p.z));
                aabb
            },
        ))
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Slab test. Returns the entry distance, zero when the origin is inside.
    pub fn intersects(&self, ray: &Ray) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if dir.abs() < EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// A cylinder of radius 1 and height 1 along +Y, centred on the origin.
///
/// Side walls get outward normals, the caps get ±Y. The seam vertex is duplicated so the
/// texture coordinates wrap cleanly. `segments` is clamped to at least 3.
pub fn cylinder_mesh(segments: u32) -> (Vec<ModelVertex>, Vec<u32>) {
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity((segments as usize + 1) * 4 + 2);
    let mut indices = Vec::with_capacity(segments as usize * 12);

    let ring = |i: u32| {
        let theta = i as f32 / segments as f32 * std::f32::consts::TAU;
        (theta.cos(), theta.sin())
    };

    for i in 0..=segments {
        let (x, z) = ring(i);
        let u = i as f32 / segments as f32;
        vertices.push(ModelVertex {
            position: [x, -0.5, z],
            tex_coords: [u, 1.0],
            normal: [x, 0.0, z],
        });
        vertices.push(ModelVertex {
            position: [x, 0.5, z],
            tex_coords: [u, 0.0],
            normal: [x, 0.0, z],
        });
    }
    for i in 0..segments {
        let b0 = 2 * i;
        let t0 = b0 + 1;
        let b1 = b0 + 2;
        let t1 = b0 + 3;
        indices.extend_from_slice(&[b0, t0, b1, b1, t0, t1]);
    }

    for (y, normal_y) in [(0.5f32, 1.0f32), (-0.5, -1.0)] {
        let center = vertices.len() as u32;
        vertices.push(ModelVertex {
            position: [0.0, y, 0.0],
            tex_coords: [0.5, 0.5],
            normal: [0.0, normal_y, 0.0],
        });
        let first = vertices.len() as u32;
        for i in 0..=segments {
            let (x, z) = ring(i);
            vertices.push(ModelVertex {
                position: [x, y, z],
                tex_coords: [x * 0.5 + 0.5, z * 0.5 + 0.5],
                normal: [0.0, normal_y, 0.0],
            });
        }
        for i in 0..segments {
            let a = first + i;
            let b = first + i + 1;
            if normal_y > 0.0 {
                indices.extend_from_slice(&[center, b, a]);
            } else {
                indices.extend_from_slice(&[center, a, b]);
            }
        }
    }

    (vertices, indices)
}

/// Transform that stretches the unit cylinder from [`cylinder_mesh`] between `a` and `b`.
///
/// `None` when the two points coincide.
pub fn segment_transform(a: Point3<f32>, b: Point3<f32>, radius: f32) -> Option<Instance> {
    let delta = b - a;
    let length = delta.magnitude();
    if length < EPSILON {
        return None;
    }
    let rotation =
        Quaternion::from_arc(Vector3::unit_y(), delta / length, Some(Vector3::unit_x()));
    Some(Instance {
        position: a.midpoint(b).to_vec(),
        rotation,
        scale: Vector3::new(radius, length, radius),
    })
}

/// Transform for the small marker drawn at a pending measurement point.
pub fn marker_transform(p: Point3<f32>, radius: f32) -> Instance {
    Instance {
        position: p.to_vec(),
        scale: Vector3::new(radius * 2.0, radius * 2.0, radius * 2.0),
        ..Default::default()
    }
}
