//! Common types and type aliases used throughout the importer
//!
//! All geometry is expressed with glam types. The aliases keep the names the
//! scene graph API uses (`Vector3D`, `Matrix4x4`, ...) while every glam
//! operation stays available on them.
//!
//! # Usage
//!
//! ```rust,no_run
//! use scene_importer::types::*;
//! use scene_importer::Importer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scene = Importer::new().import_file("model.ac")?;
//! for mesh in scene.meshes() {
//!     for vertex in mesh.vertices() {
//!         let transformed = Matrix4x4::from_rotation_x(1.57) * vertex.extend(1.0);
//!         let _ = transformed;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Re-export glam types as our primary math types
pub use glam::{
    EulerRot, Mat3 as Matrix3x3, Mat4 as Matrix4x4, Quat as Quaternion, Vec2 as Vector2D,
    Vec3 as Vector3D, Vec4 as Vector4D,
};

/// RGB color type (alias for Vector3D)
pub type Color3D = Vector3D;

/// RGBA color type (alias for Vector4D)
pub type Color4D = Vector4D;

/// Coordinate system convention of a scene's data.
///
/// Imported scenes are always handed out right-handed. Readers for formats
/// authored in a left-handed system build their graph as `Left` and let the
/// merge step or [`crate::postprocess`] convert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handedness {
    /// +Y up, +Z towards the viewer
    #[default]
    Right,
    /// +Y up, +Z away from the viewer
    Left,
}

/// Build a 3x3 matrix from nine values stored row by row.
#[inline]
pub fn matrix3_from_rows(m: [f32; 9]) -> Matrix3x3 {
    Matrix3x3::from_cols_array(&m).transpose()
}

/// Rotation matrix for euler angles applied X first, then Y, then Z.
#[inline]
pub fn rotation_from_euler_xyz(angles: Vector3D) -> Matrix4x4 {
    Matrix4x4::from_euler(EulerRot::ZYX, angles.z, angles.y, angles.x)
}

/// Quaternion matching [`rotation_from_euler_xyz`].
#[inline]
pub fn quaternion_from_euler_xyz(angles: Vector3D) -> Quaternion {
    Quaternion::from_euler(EulerRot::ZYX, angles.z, angles.y, angles.x)
}

/// Mirror a transform at the XY plane, keeping its determinant sign.
#[inline]
pub fn mirror_z(m: Matrix4x4) -> Matrix4x4 {
    let s = Matrix4x4::from_scale(Vector3D::new(1.0, 1.0, -1.0));
    s * m * s
}

// Mint integration (optional)
#[cfg(feature = "mint")]
mod mint_integration {
    use super::*;

    /// Trait for converting to mint types
    pub trait ToMint<T> {
        /// Convert this type to a mint type
        fn to_mint(self) -> T;
    }

    /// Trait for converting from mint types
    pub trait FromMint<T> {
        /// Convert from a mint type to this type
        fn from_mint(value: T) -> Self;
    }

    macro_rules! mint_pair {
        ($ours:ty, $theirs:ty) => {
            impl FromMint<$theirs> for $ours {
                #[inline]
                fn from_mint(value: $theirs) -> Self {
                    value.into()
                }
            }

            impl ToMint<$theirs> for $ours {
                #[inline]
                fn to_mint(self) -> $theirs {
                    self.into()
                }
            }
        };
    }

    mint_pair!(Vector2D, mint::Vector2<f32>);
    mint_pair!(Vector3D, mint::Vector3<f32>);
    mint_pair!(Vector4D, mint::Vector4<f32>);
    mint_pair!(Quaternion, mint::Quaternion<f32>);
    mint_pair!(Matrix3x3, mint::ColumnMatrix3<f32>);
    mint_pair!(Matrix4x4, mint::ColumnMatrix4<f32>);
}

// Re-export the traits for public use when mint feature is enabled
#[cfg(feature = "mint")]
pub use mint_integration::{FromMint, ToMint};
