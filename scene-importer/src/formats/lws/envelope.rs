//! LightWave motion envelopes
//!
//! A node moves through up to nine envelopes, one per channel: position,
//! heading/pitch/bank rotation and scale. [`AnimResolver`] evaluates them
//! into a bind pose and a sampled [`NodeAnimation`].

use crate::{
    animation::{NodeAnimation, QuaternionKey, VectorKey},
    types::{Matrix4x4, Quaternion, Vector3D},
};

/// How the curve arrives at a key from the previous one.
///
/// Only [`Interpolation::Step`] changes evaluation; every other span is
/// evaluated linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Interpolation {
    Tcb,
    Hermite,
    #[default]
    Linear,
    Step,
    Bezier2,
}

impl Interpolation {
    /// Span type code of a `Key` line
    pub fn from_span(span: u32) -> Option<Self> {
        match span {
            0 => Some(Self::Tcb),
            1 | 2 => Some(Self::Hermite),
            3 => Some(Self::Linear),
            4 => Some(Self::Step),
            5 => Some(Self::Bezier2),
            _ => None,
        }
    }
}

/// What an envelope does before its first and after its last key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Behaviour {
    /// The channel default
    Reset,
    /// The value of the nearest key
    #[default]
    Constant,
    Repeat,
    /// Repeat, playing every other cycle backwards
    Oscillate,
    /// Repeat, shifting each cycle by the change over one cycle
    OffsetRepeat,
    /// Extend the slope of the outermost segment
    Linear,
}

impl Behaviour {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Reset,
            2 => Self::Repeat,
            3 => Self::Oscillate,
            4 => Self::OffsetRepeat,
            5 => Self::Linear,
            _ => Self::Constant,
        }
    }
}

/// Channel an envelope drives, by its index in the scene file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    PositionX,
    PositionY,
    PositionZ,
    Heading,
    Pitch,
    Bank,
    ScaleX,
    ScaleY,
    ScaleZ,
}

impl Channel {
    const ALL: [Channel; 9] = [
        Channel::PositionX,
        Channel::PositionY,
        Channel::PositionZ,
        Channel::Heading,
        Channel::Pitch,
        Channel::Bank,
        Channel::ScaleX,
        Channel::ScaleY,
        Channel::ScaleZ,
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    fn default_value(self) -> f32 {
        match self {
            Channel::ScaleX | Channel::ScaleY | Channel::ScaleZ => 1.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Key {
    /// In frames
    pub time: f64,
    pub value: f32,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Envelope {
    pub channel: Option<Channel>,
    pub keys: Vec<Key>,
    pub pre: Behaviour,
    pub post: Behaviour,
}

impl Envelope {
    /// Envelope for the channel with file index `index`
    pub fn new(index: u32) -> Self {
        Self {
            channel: Channel::from_index(index),
            keys: Vec::new(),
            pre: Behaviour::default(),
            post: Behaviour::default(),
        }
    }

    fn default_value(&self) -> f32 {
        self.channel.map_or(0.0, Channel::default_value)
    }

    /// Put the keys in time order. Keys with equal times keep file order.
    pub fn sort_keys(&mut self) {
        self.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Value of the first key, the channel default without keys
    pub fn first_value(&self) -> f32 {
        self.keys.first().map_or_else(|| self.default_value(), |k| k.value)
    }

    /// Value at `time` in frames
    pub fn evaluate(&self, time: f64) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return self.default_value();
        };
        if time < first.time {
            self.outside(self.pre, time, true)
        } else if time > last.time {
            self.outside(self.post, time, false)
        } else {
            self.interpolate(time)
        }
    }

    /// `time` must lie within the key range
    fn interpolate(&self, time: f64) -> f32 {
        let next = self.keys.partition_point(|k| k.time <= time);
        if next == 0 {
            return self.first_value();
        }
        let previous = &self.keys[next - 1];
        let Some(next) = self.keys.get(next) else {
            return previous.value;
        };
        if next.interpolation == Interpolation::Step {
            return previous.value;
        }
        let span = next.time - previous.time;
        if span <= 0.0 {
            return next.value;
        }
        let t = ((time - previous.time) / span) as f32;
        previous.value + (next.value - previous.value) * t
    }

    fn outside(&self, behaviour: Behaviour, time: f64, before: bool) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.default_value(),
        };
        let length = last.time - first.time;
        match behaviour {
            Behaviour::Reset => self.default_value(),
            Behaviour::Constant => {
                if before {
                    first.value
                } else {
                    last.value
                }
            }
            Behaviour::Linear => {
                let n = self.keys.len();
                if n < 2 || length <= 0.0 {
                    return if before { first.value } else { last.value };
                }
                let (a, b, anchor) = if before {
                    (first, self.keys[1], first)
                } else {
                    (self.keys[n - 2], last, last)
                };
                let span = b.time - a.time;
                if span <= 0.0 {
                    return anchor.value;
                }
                let slope = (b.value - a.value) as f64 / span;
                anchor.value + (slope * (time - anchor.time)) as f32
            }
            Behaviour::Repeat | Behaviour::Oscillate | Behaviour::OffsetRepeat => {
                if length <= 0.0 {
                    return first.value;
                }
                let cycles = ((time - first.time) / length).floor();
                let mut local = time - first.time - cycles * length;
                if behaviour == Behaviour::Oscillate && (cycles as i64) % 2 != 0 {
                    local = length - local;
                }
                let value = self.interpolate(first.time + local);
                if behaviour == Behaviour::OffsetRepeat {
                    value + (last.value - first.value) * cycles as f32
                } else {
                    value
                }
            }
        }
    }
}

/// Rotation of heading `h` (about Y), pitch `p` (about X) and bank `b`
/// (about Z), applied bank first
fn rotation(h: f32, p: f32, b: f32) -> Quaternion {
    Quaternion::from_rotation_y(h) * Quaternion::from_rotation_x(p) * Quaternion::from_rotation_z(b)
}

/// Evaluates the envelopes of one node
pub(crate) struct AnimResolver<'e> {
    envelopes: &'e [Envelope],
}

impl<'e> AnimResolver<'e> {
    pub fn new(envelopes: &'e [Envelope]) -> Self {
        Self { envelopes }
    }

    fn envelope(&self, channel: Channel) -> Option<&'e Envelope> {
        self.envelopes.iter().find(|e| e.channel == Some(channel))
    }

    /// All nine channel values, at `time` or at the first keys
    fn values(&self, time: Option<f64>) -> [f32; 9] {
        Channel::ALL.map(|channel| match (self.envelope(channel), time) {
            (Some(envelope), Some(time)) => envelope.evaluate(time),
            (Some(envelope), None) => envelope.first_value(),
            (None, _) => channel.default_value(),
        })
    }

    fn decompose(values: [f32; 9]) -> (Vector3D, Quaternion, Vector3D) {
        let [x, y, z, h, p, b, sx, sy, sz] = values;
        (
            Vector3D::new(x, y, z),
            rotation(h, p, b),
            Vector3D::new(sx, sy, sz),
        )
    }

    /// Transformation given by the first key of every envelope:
    /// translation, then heading, pitch and bank, then scale
    pub fn bind_pose(&self) -> Matrix4x4 {
        let (translation, rotation, scale) = Self::decompose(self.values(None));
        Matrix4x4::from_scale_rotation_translation(scale, rotation, translation)
    }

    /// Sample the envelopes over the frame range `[first, last]`.
    ///
    /// Samples are taken at every key time inside the range, or at `first`
    /// when there is none. Key times of the channel start at zero. Returns
    /// `None` for a node without channel envelopes.
    pub fn sample(&self, node_name: &str, first: f64, last: f64) -> Option<NodeAnimation> {
        if self.envelopes.iter().all(|e| e.channel.is_none()) {
            return None;
        }
        let mut times: Vec<f64> = self
            .envelopes
            .iter()
            .filter(|e| e.channel.is_some())
            .flat_map(|e| e.keys.iter().map(|k| k.time))
            .filter(|&t| t >= first && t <= last)
            .collect();
        times.sort_by(f64::total_cmp);
        times.dedup();
        if times.is_empty() {
            times.push(first);
        }

        let mut channel = NodeAnimation::new(node_name);
        for time in times {
            let (translation, rotation, scale) = Self::decompose(self.values(Some(time)));
            let tick = time - first;
            channel.position_keys.push(VectorKey::new(tick, translation));
            channel.rotation_keys.push(QuaternionKey::new(tick, rotation));
            channel.scaling_keys.push(VectorKey::new(tick, scale));
        }
        Some(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn envelope(index: u32, keys: &[(f64, f32)]) -> Envelope {
        let mut envelope = Envelope::new(index);
        envelope.keys = keys
            .iter()
            .map(|&(time, value)| Key {
                time,
                value,
                interpolation: Interpolation::Linear,
            })
            .collect();
        envelope
    }

    #[test]
    fn test_linear_and_step() {
        let mut env = envelope(0, &[(0.0, 0.0), (10.0, 5.0), (20.0, 1.0)]);
        assert_relative_eq!(env.evaluate(5.0), 2.5);
        assert_relative_eq!(env.evaluate(10.0), 5.0);
        env.keys[2].interpolation = Interpolation::Step;
        assert_relative_eq!(env.evaluate(19.0), 5.0);
        assert_relative_eq!(env.evaluate(20.0), 1.0);
    }

    #[test]
    fn test_behaviours() {
        let mut env = envelope(0, &[(0.0, 0.0), (10.0, 10.0)]);
        assert_relative_eq!(env.evaluate(-5.0), 0.0);
        assert_relative_eq!(env.evaluate(15.0), 10.0);

        env.post = Behaviour::Repeat;
        assert_relative_eq!(env.evaluate(13.0), 3.0);
        env.post = Behaviour::Oscillate;
        assert_relative_eq!(env.evaluate(13.0), 7.0);
        env.post = Behaviour::OffsetRepeat;
        assert_relative_eq!(env.evaluate(13.0), 13.0);
        env.post = Behaviour::Linear;
        assert_relative_eq!(env.evaluate(20.0), 20.0);
        env.pre = Behaviour::Reset;
        assert_relative_eq!(env.evaluate(-1.0), 0.0);

        let mut scale = envelope(6, &[(0.0, 3.0), (10.0, 4.0)]);
        scale.pre = Behaviour::Reset;
        assert_relative_eq!(scale.evaluate(-1.0), 1.0);
    }

    #[test]
    fn test_bind_pose_and_sampling() {
        let envelopes = vec![
            envelope(0, &[(0.0, 1.0), (10.0, 3.0)]),
            envelope(3, &[(5.0, std::f32::consts::FRAC_PI_2)]),
            envelope(7, &[(0.0, 2.0)]),
        ];
        let resolver = AnimResolver::new(&envelopes);

        let pose = resolver.bind_pose();
        let (scale, rotation, translation) = pose.to_scale_rotation_translation();
        assert!(translation.abs_diff_eq(Vector3D::new(1.0, 0.0, 0.0), 1e-5));
        assert!(scale.abs_diff_eq(Vector3D::new(1.0, 2.0, 1.0), 1e-5));
        // a quarter heading turns +Z towards +X
        assert!((rotation * Vector3D::Z).abs_diff_eq(Vector3D::X, 1e-5));

        let channel = resolver.sample("node", 2.0, 8.0).expect("channel");
        let times: Vec<f64> = channel.position_keys().iter().map(|k| k.time).collect();
        assert_eq!(times, [3.0]);
        assert_relative_eq!(channel.position_keys()[0].value.x, 1.0 + 2.0 * 5.0 / 10.0);

        let channel = resolver.sample("node", 0.0, 10.0).expect("channel");
        let times: Vec<f64> = channel.scaling_keys().iter().map(|k| k.time).collect();
        assert_eq!(times, [0.0, 5.0, 10.0]);

        assert!(AnimResolver::new(&[]).sample("node", 0.0, 10.0).is_none());
    }
}
