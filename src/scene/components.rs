// scene/components.rs
// Plain hecs components consumed by the renderer

use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};

use crate::renderer::{Material, Mesh};

// ============================================================================
// Identity Components
// ============================================================================

/// Stable identifier that survives save/load, unlike `hecs::Entity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid(pub u64);

/// Name component for debugging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

// ============================================================================
// Core Rendering Components
// ============================================================================

/// Local transform relative to the parent entity (or the world for roots).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    pub position: Vec3,
    /// Euler angles in radians, applied X first, then Y, then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl TransformComponent {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.rotation.z, self.rotation.y, self.rotation.x)
    }

    /// `translate * rotate * scale`.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_quat(self.rotation_quat())
            * Mat4::from_scale(self.scale)
    }
}

/// Mesh + material pair. An entity is only drawn when both are set.
#[derive(Debug, Clone, Default)]
pub struct MeshRendererComponent {
    pub mesh: Option<Arc<Mesh>>,
    pub material: Option<Arc<Material>>,
}

impl MeshRendererComponent {
    pub fn new(mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
        }
    }
}

// ============================================================================
// Lighting Components
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Point,
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowType {
    None,
    Hard,
}

#[derive(Debug, Clone, Copy)]
pub struct LightComponent {
    pub light_type: LightType,
    /// Falloff distance of point lights.
    pub radius: f32,
    pub color: Vec4,
    pub intensity: f32,
    pub shadow: ShadowType,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            radius: 10.0,
            color: Vec4::ONE,
            intensity: 1.0,
            shadow: ShadowType::None,
        }
    }
}

impl LightComponent {
    pub fn point(color: Vec4, intensity: f32, radius: f32) -> Self {
        Self {
            light_type: LightType::Point,
            radius,
            color,
            intensity,
            shadow: ShadowType::None,
        }
    }

    pub fn directional(color: Vec4, intensity: f32, shadow: ShadowType) -> Self {
        Self {
            light_type: LightType::Directional,
            color,
            intensity,
            shadow,
            ..Self::default()
        }
    }
}

// ============================================================================
// Camera Components
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraType {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, Copy)]
pub struct CameraComponent {
    pub camera_type: CameraType,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Half height of the orthographic view volume.
    pub size: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Ordering between several cameras, lowest renders first.
    pub depth: i32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            camera_type: CameraType::Perspective,
            fov: 60_f32.to_radians(),
            size: 10.0,
            znear: 0.1,
            zfar: 100.0,
            depth: 0,
        }
    }
}

// ============================================================================
// Hierarchy Components
// ============================================================================

/// Parent entity reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub hecs::Entity);

/// List of children entities
#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<hecs::Entity>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_matrix_applies_scale_then_rotation_then_translation() {
        let transform = TransformComponent::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            Vec3::splat(2.0),
        );

        let point = transform.local_matrix().transform_point3(Vec3::X);
        // X scaled to 2, rotated +90 degrees about Y onto -Z, then translated.
        assert!(point.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5), "{point:?}");
    }

    #[test]
    fn euler_rotation_applies_x_before_z() {
        let transform = TransformComponent::new(
            Vec3::ZERO,
            Vec3::new(std::f32::consts::FRAC_PI_2, 0.0, std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        );
        let expected = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)
            * Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);

        assert!(transform.rotation_quat().abs_diff_eq(expected, 1e-5));
    }
}
