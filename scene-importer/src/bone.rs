//! Bone and skeletal animation support
//!
//! A bone links a named node of the hierarchy to the vertices it deforms.
//! The link to the node is by name only; the weights are produced by the
//! [`crate::weights`] resolver.

use std::collections::HashMap;

use crate::types::Matrix4x4;

/// A vertex weight that associates a vertex with a bone
///
/// Each vertex can be influenced by multiple bones with different weights.
/// The sum of all weights for a vertex should typically equal 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    /// The ID of the vertex this weight applies to
    pub vertex_id: u32,
    /// The weight value (typically 0.0 to 1.0)
    pub weight: f32,
}

impl VertexWeight {
    /// Create a new vertex weight
    pub fn new(vertex_id: u32, weight: f32) -> Self {
        Self { vertex_id, weight }
    }

    /// Check if this weight is significant (above a threshold)
    pub fn is_significant(&self, threshold: f32) -> bool {
        self.weight >= threshold
    }
}

/// A bone in a skeletal animation system
///
/// Bones define how vertices are transformed during animation.
/// Each bone has a name, an offset matrix, and a list of vertex weights.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bone {
    pub(crate) name: String,
    pub(crate) offset_matrix: Matrix4x4,
    pub(crate) weights: Vec<VertexWeight>,
}

impl Bone {
    /// Create a bone
    pub fn new<S: Into<String>>(name: S, offset_matrix: Matrix4x4, weights: Vec<VertexWeight>) -> Self {
        Self {
            name: name.into(),
            offset_matrix,
            weights,
        }
    }

    /// Get the name of the bone
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of vertex weights for this bone
    pub fn num_weights(&self) -> usize {
        self.weights.len()
    }

    /// Get the vertex weights for this bone
    pub fn weights(&self) -> &[VertexWeight] {
        &self.weights
    }

    /// Get the offset matrix for this bone
    ///
    /// The offset matrix transforms vertices from mesh space to bone space.
    /// It's the inverse of the bone's global transformation in bind pose.
    pub fn offset_matrix(&self) -> Matrix4x4 {
        self.offset_matrix
    }

    /// Get weights above a certain threshold
    pub fn significant_weights(&self, threshold: f32) -> impl Iterator<Item = &VertexWeight> + '_ {
        self.weights.iter().filter(move |w| w.is_significant(threshold))
    }

    /// Check if this bone affects a specific vertex
    pub fn affects_vertex(&self, vertex_id: u32) -> bool {
        self.weights.iter().any(|w| w.vertex_id == vertex_id)
    }

    /// Get the weight value for a specific vertex (0.0 if not affected)
    pub fn weight_for_vertex(&self, vertex_id: u32) -> f32 {
        self.weights
            .iter()
            .filter(|w| w.vertex_id == vertex_id)
            .map(|w| w.weight)
            .sum()
    }
}

/// Utility functions for working with bones and weights
pub mod utils {
    use super::*;

    /// Get the maximum number of bones affecting any single vertex
    pub fn max_bones_per_vertex(bones: &[Bone]) -> usize {
        let mut vertex_bone_count: HashMap<u32, usize> = HashMap::new();

        for bone in bones {
            for weight in &bone.weights {
                *vertex_bone_count.entry(weight.vertex_id).or_insert(0) += 1;
            }
        }

        vertex_bone_count.values().copied().max().unwrap_or(0)
    }
}
