//! Camera representation and utilities

use crate::types::Vector3D;

/// A camera in the scene
///
/// Position and orientation are relative to the node carrying the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub(crate) name: String,
    pub(crate) position: Vector3D,
    pub(crate) up: Vector3D,
    pub(crate) look_at: Vector3D,
    pub(crate) horizontal_fov: f32,
    pub(crate) clip_plane_near: f32,
    pub(crate) clip_plane_far: f32,
    pub(crate) aspect: f32,
    pub(crate) orthographic_width: f32,
}

impl Camera {
    /// Create a camera looking down +Z with a 45 degree field of view
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            position: Vector3D::ZERO,
            up: Vector3D::Y,
            look_at: Vector3D::Z,
            horizontal_fov: std::f32::consts::FRAC_PI_4,
            clip_plane_near: 0.1,
            clip_plane_far: 1000.0,
            aspect: 0.0,
            orthographic_width: 0.0,
        }
    }

    /// Get the name of the camera
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the position of the camera
    pub fn position(&self) -> Vector3D {
        self.position
    }

    /// Get the up vector of the camera
    pub fn up(&self) -> Vector3D {
        self.up
    }

    /// Get the look-at vector of the camera
    pub fn look_at(&self) -> Vector3D {
        self.look_at
    }

    /// Get the horizontal field of view in radians
    pub fn horizontal_fov(&self) -> f32 {
        self.horizontal_fov
    }

    /// Get the near clipping plane distance
    pub fn clip_plane_near(&self) -> f32 {
        self.clip_plane_near
    }

    /// Get the far clipping plane distance
    pub fn clip_plane_far(&self) -> f32 {
        self.clip_plane_far
    }

    /// Get the aspect ratio (0 means undefined)
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Get the orthographic width (for orthographic cameras)
    pub fn orthographic_width(&self) -> f32 {
        self.orthographic_width
    }
}
