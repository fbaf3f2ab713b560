//! Material representation and properties
//!
//! A material is an open property bag. Each property is addressed by a key,
//! a texture semantic and an index, so the same key (for example
//! [`material_keys::TEXTURE_BASE`]) can hold one value per texture slot.

use crate::types::{Color3D, Color4D};

/// Name given to the material readers create when a file defines none
pub const DEFAULT_MATERIAL_NAME: &str = "DefaultMaterial";

/// Standard material property keys
pub mod material_keys {
    /// Material name
    pub const NAME: &str = "?mat.name";
    /// Diffuse color
    pub const COLOR_DIFFUSE: &str = "$clr.diffuse";
    /// Ambient color
    pub const COLOR_AMBIENT: &str = "$clr.ambient";
    /// Specular color
    pub const COLOR_SPECULAR: &str = "$clr.specular";
    /// Emissive color
    pub const COLOR_EMISSIVE: &str = "$clr.emissive";
    /// Shininess factor
    pub const SHININESS: &str = "$mat.shininess";
    /// Shininess strength
    pub const SHININESS_STRENGTH: &str = "$mat.shinpercent";
    /// Opacity
    pub const OPACITY: &str = "$mat.opacity";
    /// Shading model
    pub const SHADING_MODEL: &str = "$mat.shadingm";
    /// Two sided
    pub const TWOSIDED: &str = "$mat.twosided";
    /// Path of a texture slot
    pub const TEXTURE_BASE: &str = "$tex.file";
    /// UV transform of a texture slot: translation (2), scaling (2), rotation
    pub const UVTRANSFORM: &str = "$tex.uvtrafo";
    /// UV channel used by a texture slot
    pub const UVWSRC: &str = "$tex.uvwsrc";
}

/// Texture semantics a property can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum TextureType {
    /// Not a texture property
    #[default]
    None = 0,
    Diffuse = 1,
    Specular = 2,
    Ambient = 3,
    Emissive = 4,
    Height = 5,
    Normals = 6,
    Shininess = 7,
    Opacity = 8,
    Displacement = 9,
    Lightmap = 10,
    Reflection = 11,
    Unknown = 18,
}

/// Shading models stored under [`material_keys::SHADING_MODEL`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ShadingMode {
    Flat = 1,
    Gouraud = 2,
    Phong = 3,
    Blinn = 4,
    NoShading = 9,
}

impl ShadingMode {
    fn from_raw(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Flat),
            2 => Some(Self::Gouraud),
            3 => Some(Self::Phong),
            4 => Some(Self::Blinn),
            9 => Some(Self::NoShading),
            _ => None,
        }
    }
}

/// Value stored in a material property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Floats(Vec<f32>),
    Integers(Vec<i32>),
}

/// A single keyed material property
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperty {
    pub key: String,
    pub semantic: TextureType,
    pub index: u32,
    pub value: PropertyValue,
}

/// Information about a texture applied to a material
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// Path to the texture file, as written in the source
    pub path: String,
    /// UV channel index
    pub uv_index: u32,
    /// Optional UV transform: translation, scaling, rotation
    pub uv_transform: Option<UvTransform>,
}

/// Texture coordinate transform applied before sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub translation: [f32; 2],
    pub scaling: [f32; 2],
    pub rotation: f32,
}

impl Default for UvTransform {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0],
            scaling: [1.0, 1.0],
            rotation: 0.0,
        }
    }
}

/// A material containing properties like colors, textures, and shading parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    properties: Vec<MaterialProperty>,
}

impl Material {
    /// Create an empty material
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a material carrying only a name
    pub fn named<S: Into<String>>(name: S) -> Self {
        let mut material = Self::new();
        material.set_name(name);
        material
    }

    /// Get the name of the material
    pub fn name(&self) -> String {
        self.get_string_property(material_keys::NAME)
            .unwrap_or_default()
    }

    /// Rename the material
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.set_property(
            material_keys::NAME,
            TextureType::None,
            0,
            PropertyValue::String(name.into()),
        );
    }

    /// All properties in insertion order
    pub fn properties(&self) -> &[MaterialProperty] {
        &self.properties
    }

    /// Insert a property, replacing one with the same key, semantic and index
    pub fn set_property(&mut self, key: &str, semantic: TextureType, index: u32, value: PropertyValue) {
        match self
            .properties
            .iter_mut()
            .find(|p| p.key == key && p.semantic == semantic && p.index == index)
        {
            Some(existing) => existing.value = value,
            None => self.properties.push(MaterialProperty {
                key: key.to_string(),
                semantic,
                index,
                value,
            }),
        }
    }

    /// Look up a raw property
    pub fn property(&self, key: &str, semantic: TextureType, index: u32) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.key == key && p.semantic == semantic && p.index == index)
            .map(|p| &p.value)
    }

    /// Set an RGB color property (stored with alpha 1)
    pub fn set_color(&mut self, key: &str, color: Color3D) {
        self.set_property(
            key,
            TextureType::None,
            0,
            PropertyValue::Floats(vec![color.x, color.y, color.z, 1.0]),
        );
    }

    /// Set a scalar float property
    pub fn set_float(&mut self, key: &str, value: f32) {
        self.set_property(key, TextureType::None, 0, PropertyValue::Floats(vec![value]));
    }

    /// Set a scalar integer property
    pub fn set_integer(&mut self, key: &str, value: i32) {
        self.set_property(key, TextureType::None, 0, PropertyValue::Integers(vec![value]));
    }

    /// Set the shading model
    pub fn set_shading_model(&mut self, mode: ShadingMode) {
        self.set_integer(material_keys::SHADING_MODEL, mode as i32);
    }

    /// Bind a texture file to a slot
    pub fn add_texture<S: Into<String>>(&mut self, texture_type: TextureType, index: u32, path: S) {
        self.set_property(
            material_keys::TEXTURE_BASE,
            texture_type,
            index,
            PropertyValue::String(path.into()),
        );
    }

    /// Attach a UV transform to a texture slot
    pub fn set_uv_transform(&mut self, texture_type: TextureType, index: u32, transform: UvTransform) {
        self.set_property(
            material_keys::UVTRANSFORM,
            texture_type,
            index,
            PropertyValue::Floats(vec![
                transform.translation[0],
                transform.translation[1],
                transform.scaling[0],
                transform.scaling[1],
                transform.rotation,
            ]),
        );
    }

    /// Get a string property from the material
    pub fn get_string_property(&self, key: &str) -> Option<String> {
        match self.property(key, TextureType::None, 0)? {
            PropertyValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Get a float array property, converting integers
    pub fn get_float_array(&self, key: &str) -> Option<Vec<f32>> {
        match self.property(key, TextureType::None, 0)? {
            PropertyValue::Floats(v) => Some(v.clone()),
            PropertyValue::Integers(v) => Some(v.iter().map(|&i| i as f32).collect()),
            PropertyValue::String(_) => None,
        }
    }

    /// Get a float property from the material
    pub fn get_float_property(&self, key: &str) -> Option<f32> {
        self.get_float_array(key)?.first().copied()
    }

    /// Get an integer property from the material
    pub fn get_integer_property(&self, key: &str) -> Option<i32> {
        match self.property(key, TextureType::None, 0)? {
            PropertyValue::Integers(v) => v.first().copied(),
            PropertyValue::Floats(v) => v.first().map(|&f| f as i32),
            PropertyValue::String(_) => None,
        }
    }

    /// Get a color property from the material
    pub fn get_color_property(&self, key: &str) -> Option<Color4D> {
        match self.get_float_array(key)?.as_slice() {
            [r, g, b] => Some(Color4D::new(*r, *g, *b, 1.0)),
            [r, g, b, a, ..] => Some(Color4D::new(*r, *g, *b, *a)),
            _ => None,
        }
    }

    fn color3(&self, key: &str) -> Option<Color3D> {
        self.get_color_property(key).map(|c| c.truncate())
    }

    /// Get the diffuse color
    pub fn diffuse_color(&self) -> Option<Color3D> {
        self.color3(material_keys::COLOR_DIFFUSE)
    }

    /// Get the specular color
    pub fn specular_color(&self) -> Option<Color3D> {
        self.color3(material_keys::COLOR_SPECULAR)
    }

    /// Get the ambient color
    pub fn ambient_color(&self) -> Option<Color3D> {
        self.color3(material_keys::COLOR_AMBIENT)
    }

    /// Get the emissive color
    pub fn emissive_color(&self) -> Option<Color3D> {
        self.color3(material_keys::COLOR_EMISSIVE)
    }

    /// Get the shininess factor
    pub fn shininess(&self) -> Option<f32> {
        self.get_float_property(material_keys::SHININESS)
    }

    /// Get the opacity factor
    pub fn opacity(&self) -> Option<f32> {
        self.get_float_property(material_keys::OPACITY)
    }

    /// Get the shading model
    pub fn shading_model(&self) -> Option<ShadingMode> {
        self.get_integer_property(material_keys::SHADING_MODEL)
            .and_then(ShadingMode::from_raw)
    }

    /// Check if the material is two-sided
    pub fn is_two_sided(&self) -> bool {
        self.get_integer_property(material_keys::TWOSIDED)
            .is_some_and(|v| v != 0)
    }

    /// Get the number of textures for a specific type
    pub fn texture_count(&self, texture_type: TextureType) -> usize {
        self.properties
            .iter()
            .filter(|p| p.key == material_keys::TEXTURE_BASE && p.semantic == texture_type)
            .count()
    }

    /// Get texture information for a specific type and index
    pub fn texture(&self, texture_type: TextureType, index: u32) -> Option<TextureInfo> {
        let path = match self.property(material_keys::TEXTURE_BASE, texture_type, index)? {
            PropertyValue::String(s) => s.clone(),
            _ => return None,
        };
        let uv_index = match self.property(material_keys::UVWSRC, texture_type, index) {
            Some(PropertyValue::Integers(v)) => v.first().map_or(0, |&i| i.max(0) as u32),
            _ => 0,
        };
        let uv_transform = match self.property(material_keys::UVTRANSFORM, texture_type, index) {
            Some(PropertyValue::Floats(v)) if v.len() >= 5 => Some(UvTransform {
                translation: [v[0], v[1]],
                scaling: [v[2], v[3]],
                rotation: v[4],
            }),
            _ => None,
        };
        Some(TextureInfo {
            path,
            uv_index,
            uv_transform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut mat = Material::named("steel");
        mat.set_color(material_keys::COLOR_DIFFUSE, Color3D::new(0.5, 0.25, 1.0));
        mat.set_float(material_keys::SHININESS, 32.0);
        mat.set_shading_model(ShadingMode::Phong);
        mat.set_integer(material_keys::TWOSIDED, 1);

        assert_eq!(mat.name(), "steel");
        assert_eq!(mat.diffuse_color(), Some(Color3D::new(0.5, 0.25, 1.0)));
        assert_eq!(mat.shininess(), Some(32.0));
        assert_eq!(mat.shading_model(), Some(ShadingMode::Phong));
        assert!(mat.is_two_sided());
        assert!(mat.specular_color().is_none());
        // name lookups never treat strings as numbers
        assert!(mat.get_float_property(material_keys::NAME).is_none());
    }

    #[test]
    fn test_texture_slots_are_keyed_by_semantic_and_index() {
        let mut mat = Material::new();
        mat.add_texture(TextureType::Diffuse, 0, "wood.png");
        mat.add_texture(TextureType::Diffuse, 1, "dirt.png");
        mat.add_texture(TextureType::Normals, 0, "wood_n.png");
        mat.set_uv_transform(
            TextureType::Diffuse,
            0,
            UvTransform {
                scaling: [2.0, 2.0],
                ..UvTransform::default()
            },
        );
        mat.add_texture(TextureType::Diffuse, 0, "oak.png");

        assert_eq!(mat.texture_count(TextureType::Diffuse), 2);
        assert_eq!(mat.texture_count(TextureType::Specular), 0);
        let tex = mat.texture(TextureType::Diffuse, 0).expect("slot 0");
        assert_eq!(tex.path, "oak.png");
        assert_eq!(tex.uv_transform.map(|t| t.scaling), Some([2.0, 2.0]));
        assert!(mat.texture(TextureType::Diffuse, 1).expect("slot 1").uv_transform.is_none());
    }
}
