//! Light representation and utilities

use crate::types::{Color3D, Vector2D, Vector3D};

/// A light source in the scene
///
/// Position and direction are relative to the node carrying the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub(crate) name: String,
    pub(crate) light_type: LightType,
    pub(crate) position: Vector3D,
    pub(crate) direction: Vector3D,
    pub(crate) up: Vector3D,
    pub(crate) color_diffuse: Color3D,
    pub(crate) color_specular: Color3D,
    pub(crate) color_ambient: Color3D,
    pub(crate) attenuation_constant: f32,
    pub(crate) attenuation_linear: f32,
    pub(crate) attenuation_quadratic: f32,
    pub(crate) angle_inner_cone: f32,
    pub(crate) angle_outer_cone: f32,
    pub(crate) size: Vector2D,
}

impl Light {
    /// Create a light with neutral attenuation and an unrestricted cone
    pub fn new<S: Into<String>>(name: S, light_type: LightType) -> Self {
        Self {
            name: name.into(),
            light_type,
            position: Vector3D::ZERO,
            direction: Vector3D::ZERO,
            up: Vector3D::ZERO,
            color_diffuse: Color3D::ZERO,
            color_specular: Color3D::ZERO,
            color_ambient: Color3D::ZERO,
            attenuation_constant: 0.0,
            attenuation_linear: 1.0,
            attenuation_quadratic: 0.0,
            angle_inner_cone: std::f32::consts::TAU,
            angle_outer_cone: std::f32::consts::TAU,
            size: Vector2D::ZERO,
        }
    }

    /// Get the name of the light
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the type of the light
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// Get the position of the light
    pub fn position(&self) -> Vector3D {
        self.position
    }

    /// Get the direction of the light
    pub fn direction(&self) -> Vector3D {
        self.direction
    }

    /// Get the up vector of the light
    pub fn up(&self) -> Vector3D {
        self.up
    }

    /// Get the diffuse color of the light
    pub fn color_diffuse(&self) -> Color3D {
        self.color_diffuse
    }

    /// Get the specular color of the light
    pub fn color_specular(&self) -> Color3D {
        self.color_specular
    }

    /// Get the ambient color of the light
    pub fn color_ambient(&self) -> Color3D {
        self.color_ambient
    }

    /// Get the constant attenuation factor
    pub fn attenuation_constant(&self) -> f32 {
        self.attenuation_constant
    }

    /// Get the linear attenuation factor
    pub fn attenuation_linear(&self) -> f32 {
        self.attenuation_linear
    }

    /// Get the quadratic attenuation factor
    pub fn attenuation_quadratic(&self) -> f32 {
        self.attenuation_quadratic
    }

    /// Get the inner cone angle for spot lights (in radians)
    pub fn angle_inner_cone(&self) -> f32 {
        self.angle_inner_cone
    }

    /// Get the outer cone angle for spot lights (in radians)
    pub fn angle_outer_cone(&self) -> f32 {
        self.angle_outer_cone
    }

    /// Get the size of the area light
    pub fn size(&self) -> Vector2D {
        self.size
    }
}

/// Types of light sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightType {
    /// Undefined light type
    #[default]
    Undefined,
    /// Directional light (like sunlight)
    Directional,
    /// Point light (omnidirectional)
    Point,
    /// Spot light (cone-shaped)
    Spot,
    /// Ambient light
    Ambient,
    /// Area light
    Area,
}
