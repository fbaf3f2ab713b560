//! Animation and keyframe support

use crate::types::{Quaternion, Vector3D};

/// Ticks per second assumed when a file does not say
pub const DEFAULT_TICKS_PER_SECOND: f64 = 25.0;

/// A keyframe animation over a set of nodes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub(crate) name: String,
    pub(crate) duration: f64,
    pub(crate) ticks_per_second: f64,
    pub(crate) channels: Vec<NodeAnimation>,
}

impl Animation {
    /// Create an animation
    pub fn new<S: Into<String>>(name: S, duration: f64, ticks_per_second: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            ticks_per_second,
            channels: Vec::new(),
        }
    }

    /// Get the name of the animation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the duration of the animation in ticks
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Get the ticks per second of the animation (0 means unspecified)
    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    /// Get the duration of the animation in seconds
    pub fn duration_in_seconds(&self) -> f64 {
        let tps = if self.ticks_per_second > 0.0 {
            self.ticks_per_second
        } else {
            DEFAULT_TICKS_PER_SECOND
        };
        self.duration / tps
    }

    /// Get the number of node animation channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Get a node animation channel by index
    pub fn channel(&self, index: usize) -> Option<&NodeAnimation> {
        self.channels.get(index)
    }

    /// Get all node animation channels
    pub fn channels(&self) -> &[NodeAnimation] {
        &self.channels
    }

    /// Find the channel driving the node with the given name
    pub fn find_channel(&self, node_name: &str) -> Option<&NodeAnimation> {
        self.channels.iter().find(|c| c.node_name == node_name)
    }
}

/// Keyframes for a single node, referenced by name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeAnimation {
    pub(crate) node_name: String,
    pub(crate) position_keys: Vec<VectorKey>,
    pub(crate) rotation_keys: Vec<QuaternionKey>,
    pub(crate) scaling_keys: Vec<VectorKey>,
    pub(crate) pre_state: AnimBehaviour,
    pub(crate) post_state: AnimBehaviour,
}

impl NodeAnimation {
    /// Create an empty channel for a node
    pub fn new<S: Into<String>>(node_name: S) -> Self {
        Self {
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    /// Get the name of the node this channel affects
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Get the number of position keys
    pub fn num_position_keys(&self) -> usize {
        self.position_keys.len()
    }

    /// Get the position keys
    pub fn position_keys(&self) -> &[VectorKey] {
        &self.position_keys
    }

    /// Get the number of rotation keys
    pub fn num_rotation_keys(&self) -> usize {
        self.rotation_keys.len()
    }

    /// Get the rotation keys
    pub fn rotation_keys(&self) -> &[QuaternionKey] {
        &self.rotation_keys
    }

    /// Get the number of scaling keys
    pub fn num_scaling_keys(&self) -> usize {
        self.scaling_keys.len()
    }

    /// Get the scaling keys
    pub fn scaling_keys(&self) -> &[VectorKey] {
        &self.scaling_keys
    }

    /// Behaviour before the first key
    pub fn pre_state(&self) -> AnimBehaviour {
        self.pre_state
    }

    /// Behaviour after the last key
    pub fn post_state(&self) -> AnimBehaviour {
        self.post_state
    }

    /// Time of the last key in any track
    pub(crate) fn last_key_time(&self) -> f64 {
        let vec_times = self
            .position_keys
            .iter()
            .chain(&self.scaling_keys)
            .map(|k| k.time);
        let rot_times = self.rotation_keys.iter().map(|k| k.time);
        vec_times.chain(rot_times).fold(0.0, f64::max)
    }
}

/// Interpolation method for animation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimInterpolation {
    /// Step interpolation - no interpolation, use the value of the previous key
    Step,
    /// Linear interpolation between keys
    #[default]
    Linear,
    /// Spherical linear interpolation (for quaternions)
    SphericalLinear,
    /// Cubic spline interpolation
    CubicSpline,
}

/// Behaviour outside key range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimBehaviour {
    /// Use the default behavior (the node's own transformation)
    #[default]
    Default,
    /// Keep the value constant at the boundary
    Constant,
    /// Linear extrapolation beyond the key range
    Linear,
    /// Repeat the animation cyclically
    Repeat,
}

/// A keyframe containing a time and a 3D vector value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    /// Time of the keyframe
    pub time: f64,
    /// Vector value at this time
    pub value: Vector3D,
    /// Interpolation method
    pub interpolation: AnimInterpolation,
}

impl VectorKey {
    /// Linearly interpolated key
    pub fn new(time: f64, value: Vector3D) -> Self {
        Self {
            time,
            value,
            interpolation: AnimInterpolation::Linear,
        }
    }
}

/// A keyframe containing a time and a quaternion value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionKey {
    /// Time of the keyframe
    pub time: f64,
    /// Quaternion value at this time
    pub value: Quaternion,
    /// Interpolation method
    pub interpolation: AnimInterpolation,
}

impl QuaternionKey {
    /// Spherically interpolated key
    pub fn new(time: f64, value: Quaternion) -> Self {
        Self {
            time,
            value,
            interpolation: AnimInterpolation::SphericalLinear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_lookup() {
        let mut anim = Animation::new("walk", 50.0, 0.0);
        let mut channel = NodeAnimation::new("hip");
        channel.position_keys.push(VectorKey::new(0.0, Vector3D::ZERO));
        channel
            .rotation_keys
            .push(QuaternionKey::new(12.0, Quaternion::IDENTITY));
        anim.channels.push(channel);

        assert_eq!(anim.duration_in_seconds(), 2.0);
        assert_eq!(anim.num_channels(), 1);
        let hip = anim.find_channel("hip").expect("channel exists");
        assert_eq!(hip.last_key_time(), 12.0);
        assert_eq!(hip.pre_state(), AnimBehaviour::Default);
        assert!(anim.find_channel("knee").is_none());
    }
}
