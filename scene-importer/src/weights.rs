//! Per-vertex bone weight normalization
//!
//! Skinned formats store, for each vertex, a list of `(bone, weight)` links
//! and one "parent" bone that owns whatever weight the links leave over.
//! [`resolve_weights`] turns those lists into per-bone weight tables whose
//! entries sum to one for every skinned vertex.

use crate::{
    bone::{Bone, VertexWeight},
    types::Matrix4x4,
};

/// Weight sums at or above this value are treated as already normalized.
pub const WEIGHT_NORMALIZATION_THRESHOLD: f32 = 0.975;

/// A single `(bone, weight)` link of a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneLink {
    pub bone: u32,
    pub weight: f32,
}

impl BoneLink {
    pub fn new(bone: u32, weight: f32) -> Self {
        Self { bone, weight }
    }
}

/// Skinning input for one vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedVertex {
    /// Bone receiving the residual weight, if the file named one
    pub parent: Option<u32>,
    pub links: Vec<BoneLink>,
}

/// Per-bone weight tables, indexed by bone
#[derive(Debug, Clone, Default)]
pub struct ResolvedWeights {
    pub per_bone: Vec<Vec<VertexWeight>>,
    /// Problems found while resolving, already logged
    pub issues: Vec<String>,
}

impl ResolvedWeights {
    /// Create [`Bone`]s for every bone that received at least one weight.
    ///
    /// `describe` maps a bone index to its name and offset matrix.
    pub fn into_bones<F>(self, mut describe: F) -> Vec<Bone>
    where
        F: FnMut(usize) -> (String, Matrix4x4),
    {
        self.per_bone
            .into_iter()
            .enumerate()
            .filter(|(_, weights)| !weights.is_empty())
            .map(|(index, weights)| {
                let (name, offset) = describe(index);
                Bone::new(name, offset, weights)
            })
            .collect()
    }

    /// Indices of bones that received weights
    pub fn used_bones(&self) -> impl Iterator<Item = usize> + '_ {
        self.per_bone
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.is_empty())
            .map(|(i, _)| i)
    }
}

/// Normalize the links of `vertices` against a skeleton of `bone_count` bones.
///
/// The position of a vertex in `vertices` is its vertex id.
///
/// - Links to a bone `>= bone_count` are dropped with a warning. So is a link
///   to the vertex's own parent bone, whose share comes back via the residual.
/// - If the remaining weights sum below [`WEIGHT_NORMALIZATION_THRESHOLD`],
///   the residual `1 - sum` goes to the parent bone when it exists.
///   Otherwise the remaining weights are scaled by `1 / sum`.
pub fn resolve_weights(
    vertices: &[SkinnedVertex],
    bone_count: usize,
    format: &'static str,
) -> ResolvedWeights {
    let mut result = ResolvedWeights {
        per_bone: vec![Vec::new(); bone_count],
        issues: Vec::new(),
    };
    let mut kept: Vec<BoneLink> = Vec::new();

    for (vertex_id, vertex) in vertices.iter().enumerate() {
        let vertex_id = vertex_id as u32;
        kept.clear();
        for link in &vertex.links {
            if link.bone as usize >= bone_count {
                result.warn(format!(
                    "{format}: vertex {vertex_id} links to bone {} of {bone_count}, ignoring it",
                    link.bone
                ));
            } else if Some(link.bone) == vertex.parent {
                result.warn(format!(
                    "{format}: vertex {vertex_id} links to its own parent bone, folding it into the residual"
                ));
            } else {
                kept.push(*link);
            }
        }

        let sum: f32 = kept.iter().map(|l| l.weight).sum();
        let parent = vertex.parent.filter(|&p| (p as usize) < bone_count);
        if let Some(bad) = vertex.parent.filter(|_| parent.is_none()) {
            result.warn(format!(
                "{format}: parent bone {bad} of vertex {vertex_id} does not exist, normalizing its weights"
            ));
        }

        let scale = if sum < WEIGHT_NORMALIZATION_THRESHOLD && parent.is_none() && sum > 0.0 {
            1.0 / sum
        } else {
            1.0
        };
        for link in &kept {
            result.per_bone[link.bone as usize].push(VertexWeight::new(vertex_id, link.weight * scale));
        }
        if let Some(parent) = parent {
            if sum < WEIGHT_NORMALIZATION_THRESHOLD {
                result.per_bone[parent as usize].push(VertexWeight::new(vertex_id, 1.0 - sum));
            }
        }
    }
    result
}

impl ResolvedWeights {
    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.issues.push(message);
    }
}
