//! Catmull-Clark subdivision
//!
//! Positions are welded by exact value before each step, so meshes with
//! unshared vertices subdivide as one surface. Texture coordinates and vertex
//! colours are interpolated per face, which keeps UV seams intact. Edges with
//! a single adjacent face follow the boundary rules, so open meshes keep
//! their outline.

use std::collections::HashMap;

use crate::{
    mesh::{Face, MAX_NUMBER_OF_COLOR_SETS, MAX_NUMBER_OF_TEXTURECOORDS, Mesh},
    types::{Color4D, Vector3D},
};

/// Whether [`catmull_clark`] can subdivide `mesh`. Point and line faces
/// cannot be subdivided.
pub fn can_subdivide(mesh: &Mesh) -> bool {
    mesh.faces.iter().all(|f| f.indices.len() >= 3)
}

/// Subdivide `mesh` `levels` times.
///
/// The result consists of quads with unshared vertices. Normals and bones
/// are dropped. A mesh that [`can_subdivide`] rejects is returned unchanged
/// with a warning.
pub fn catmull_clark(mesh: &Mesh, levels: u32) -> Mesh {
    if !can_subdivide(mesh) {
        log::warn!(
            "mesh '{}' contains point or line faces and cannot be subdivided",
            mesh.name
        );
        return mesh.clone();
    }
    if levels == 0 {
        return mesh.clone();
    }
    if mesh.has_bones() {
        log::debug!("dropping bones of '{}' for subdivision", mesh.name);
    }
    (0..levels).fold(mesh.clone(), |current, _| subdivide_once(&current))
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    a: u32,
    b: u32,
    faces: u32,
    face_point_sum: Vector3D,
}

fn weld_key(p: Vector3D) -> [u32; 3] {
    // +0.0 folds -0.0 into 0.0
    [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()]
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

fn subdivide_once(mesh: &Mesh) -> Mesh {
    // Weld positions.
    let mut welded: HashMap<[u32; 3], u32> = HashMap::new();
    let mut points: Vec<Vector3D> = Vec::new();
    let remap: Vec<u32> = mesh
        .vertices
        .iter()
        .map(|&p| {
            *welded.entry(weld_key(p)).or_insert_with(|| {
                points.push(p);
                (points.len() - 1) as u32
            })
        })
        .collect();

    let face_points: Vec<Vector3D> = mesh
        .faces
        .iter()
        .map(|f| {
            let sum: Vector3D = f.indices.iter().map(|&i| points[remap[i as usize] as usize]).sum();
            sum / f.indices.len() as f32
        })
        .collect();

    // Edges in first-seen order, so sums are accumulated deterministically.
    let mut edge_index: HashMap<(u32, u32), usize> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();
    for (face, face_point) in mesh.faces.iter().zip(&face_points) {
        let n = face.indices.len();
        for i in 0..n {
            let a = remap[face.indices[i] as usize];
            let b = remap[face.indices[(i + 1) % n] as usize];
            let slot = *edge_index.entry(edge_key(a, b)).or_insert_with(|| {
                edges.push(Edge {
                    a,
                    b,
                    faces: 0,
                    face_point_sum: Vector3D::ZERO,
                });
                edges.len() - 1
            });
            edges[slot].faces += 1;
            edges[slot].face_point_sum += *face_point;
        }
    }
    let edge_points: Vec<Vector3D> = edges
        .iter()
        .map(|e| {
            let mid = (points[e.a as usize] + points[e.b as usize]) * 0.5;
            if e.faces == 1 {
                mid
            } else {
                (mid + e.face_point_sum / e.faces as f32) * 0.5
            }
        })
        .collect();

    // Vertex points.
    let count = points.len();
    let mut face_sum = vec![Vector3D::ZERO; count];
    let mut face_count = vec![0u32; count];
    for (face, face_point) in mesh.faces.iter().zip(&face_points) {
        for &i in &face.indices {
            let v = remap[i as usize] as usize;
            face_sum[v] += *face_point;
            face_count[v] += 1;
        }
    }
    let mut edge_mid_sum = vec![Vector3D::ZERO; count];
    let mut edge_count = vec![0u32; count];
    let mut boundary: Vec<Vec<u32>> = vec![Vec::new(); count];
    for e in &edges {
        let mid = (points[e.a as usize] + points[e.b as usize]) * 0.5;
        for (v, other) in [(e.a, e.b), (e.b, e.a)] {
            edge_mid_sum[v as usize] += mid;
            edge_count[v as usize] += 1;
            if e.faces == 1 {
                boundary[v as usize].push(other);
            }
        }
    }
    let vertex_points: Vec<Vector3D> = (0..count)
        .map(|v| {
            let p = points[v];
            match boundary[v].as_slice() {
                [] => {
                    let n = face_count[v] as f32;
                    let q = face_sum[v] / n;
                    let r = edge_mid_sum[v] / edge_count[v] as f32;
                    (q + r * 2.0 + p * (n - 3.0)) / n
                }
                [b1, b2] if face_count[v] > 1 => {
                    p * 0.75 + (points[*b1 as usize] + points[*b2 as usize]) * 0.125
                }
                // corners and non-manifold boundary vertices stay put
                _ => p,
            }
        })
        .collect();

    // Emit one quad per face corner.
    let quad_count: usize = mesh.faces.iter().map(|f| f.indices.len()).sum();
    let mut vertices = Vec::with_capacity(quad_count * 4);
    let mut faces = Vec::with_capacity(quad_count);
    let mut uvs: [Option<Vec<Vector3D>>; MAX_NUMBER_OF_TEXTURECOORDS] = Default::default();
    let mut colors: [Option<Vec<Color4D>>; MAX_NUMBER_OF_COLOR_SETS] = Default::default();
    for (channel, source) in mesh.texture_coords.iter().enumerate() {
        if source.is_some() {
            uvs[channel] = Some(Vec::with_capacity(quad_count * 4));
        }
    }
    for (channel, source) in mesh.colors.iter().enumerate() {
        if source.is_some() {
            colors[channel] = Some(Vec::with_capacity(quad_count * 4));
        }
    }

    for (face_index, face) in mesh.faces.iter().enumerate() {
        let n = face.indices.len();
        let edge_point = |i: usize, j: usize| {
            let key = edge_key(remap[face.indices[i] as usize], remap[face.indices[j] as usize]);
            edge_points[edge_index[&key]]
        };
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let base = vertices.len() as u32;
            vertices.extend([
                vertex_points[remap[face.indices[i] as usize] as usize],
                edge_point(i, next),
                face_points[face_index],
                edge_point(prev, i),
            ]);
            faces.push(Face::new(vec![base, base + 1, base + 2, base + 3]));

            for (out, source) in uvs.iter_mut().zip(&mesh.texture_coords) {
                if let (Some(out), Some(source)) = (out, source) {
                    out.extend(face_varying(source, &face.indices, i, prev, next));
                }
            }
            for (out, source) in colors.iter_mut().zip(&mesh.colors) {
                if let (Some(out), Some(source)) = (out, source) {
                    out.extend(face_varying(source, &face.indices, i, prev, next));
                }
            }
        }
    }

    let mut result = Mesh {
        name: mesh.name.clone(),
        vertices,
        normals: None,
        texture_coords: uvs,
        uv_components: mesh.uv_components,
        colors,
        faces,
        primitive_types: Default::default(),
        material_index: mesh.material_index,
        bones: Vec::new(),
    };
    result.update_primitive_types();
    result
}

/// Attribute values of the sub-quad at corner `i`: the corner itself, the two
/// edge midpoints and the face centre.
fn face_varying<T>(source: &[T], indices: &[u32], i: usize, prev: usize, next: usize) -> [T; 4]
where
    T: Copy + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T> + std::iter::Sum,
{
    let at = |k: usize| source[indices[k] as usize];
    let center = indices.iter().map(|&k| source[k as usize]).sum::<T>() * (1.0 / indices.len() as f32);
    [
        at(i),
        (at(i) + at(next)) * 0.5,
        center,
        (at(prev) + at(i)) * 0.5,
    ]
}
