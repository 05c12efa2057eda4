//! Cameras and frustum culling.
//!
//! Every mutator recomputes the derived matrices and the frustum immediately, so a read after a
//! setter never observes stale state.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::renderer::bounds::Aabb;
use crate::scene::{CameraComponent, CameraType};

/// Plane in Hessian normal form. Points with `distance >= 0` are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    fn from_row(row: Vec4) -> Self {
        let length = row.truncate().length();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::ZERO,
                d: 0.0,
            };
        }
        Self {
            normal: row.truncate() / length,
            d: row.w / length,
        }
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Gribb/Hartmann extraction for a `[0, 1]` depth range projection.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r1 = view_projection.row(0);
        let r2 = view_projection.row(1);
        let r3 = view_projection.row(2);
        let r4 = view_projection.row(3);

        Self {
            planes: [
                Plane::from_row(r4 + r1),
                Plane::from_row(r4 - r1),
                Plane::from_row(r4 + r2),
                Plane::from_row(r4 - r2),
                Plane::from_row(r3),
                Plane::from_row(r4 - r3),
            ],
        }
    }

    /// False only if the box lies entirely on the outer side of some plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let half = aabb.half_extents();
        self.planes.iter().all(|plane| {
            let radius = half.dot(plane.normal.abs());
            plane.distance(center) >= -radius
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    position: Vec3,
    rotation: Quat,
    /// Nominal vertical field of view in radians.
    fov: f32,
    aspect_ratio: f32,
    znear: f32,
    zfar: f32,
    view: Mat4,
    projection: Mat4,
    frustum: Frustum,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect_ratio: f32, znear: f32, zfar: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            fov,
            aspect_ratio: sanitize_aspect(aspect_ratio),
            znear,
            zfar,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            frustum: Frustum::from_view_projection(&Mat4::IDENTITY),
        };
        camera.update_view();
        camera.update_projection();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn znear(&self) -> f32 {
        self.znear
    }

    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.update_view();
    }

    /// Applies `rotation` on top of the current orientation (`rotation * current`).
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = (rotation * self.rotation).normalize();
        self.update_view();
    }

    /// Orients the camera so that -Z points at `target`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(self.position, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.set_rotation(rotation);
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.update_projection();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = sanitize_aspect(aspect_ratio);
        self.update_projection();
    }

    pub fn set_clip_planes(&mut self, znear: f32, zfar: f32) {
        self.znear = znear;
        self.zfar = zfar;
        self.update_projection();
    }

    /// Vertical fov actually used by the projection. Portrait viewports widen it so the
    /// horizontal extent keeps the nominal fov.
    pub fn effective_fov(&self) -> f32 {
        if self.aspect_ratio < 1.0 {
            2.0 * ((self.fov * 0.5).tan() / self.aspect_ratio).atan()
        } else {
            self.fov
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Inverse of the camera's world transform.
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn is_inside_frustum(&self, aabb: &Aabb) -> bool {
        self.frustum.intersects_aabb(aabb)
    }

    fn update_view(&mut self) {
        self.view = Mat4::from_rotation_translation(self.rotation, self.position).inverse();
        self.update_frustum();
    }

    fn update_projection(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.effective_fov(), self.aspect_ratio, self.znear, self.zfar);
        self.update_frustum();
    }

    fn update_frustum(&mut self) {
        self.frustum = Frustum::from_view_projection(&self.view_projection());
    }
}

/// Parameters of an orthographic camera. Rendering through one is not supported.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCamera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Half height of the view volume.
    pub size: f32,
    pub znear: f32,
    pub zfar: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Camera {
    Perspective(PerspectiveCamera),
    Orthographic(OrthographicCamera),
}

impl Camera {
    pub fn perspective(fov: f32, aspect_ratio: f32, znear: f32, zfar: f32) -> Self {
        Camera::Perspective(PerspectiveCamera::new(fov, aspect_ratio, znear, zfar))
    }

    pub fn from_component(
        component: &CameraComponent,
        position: Vec3,
        rotation: Quat,
        aspect_ratio: f32,
    ) -> Self {
        match component.camera_type {
            CameraType::Perspective => {
                let mut camera = PerspectiveCamera::new(
                    component.fov,
                    aspect_ratio,
                    component.znear,
                    component.zfar,
                );
                camera.set_position(position);
                camera.set_rotation(rotation);
                Camera::Perspective(camera)
            }
            CameraType::Orthographic => Camera::Orthographic(OrthographicCamera {
                position,
                rotation,
                size: component.size,
                znear: component.znear,
                zfar: component.zfar,
            }),
        }
    }

    pub fn camera_type(&self) -> CameraType {
        match self {
            Camera::Perspective(_) => CameraType::Perspective,
            Camera::Orthographic(_) => CameraType::Orthographic,
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            Camera::Perspective(camera) => camera.position(),
            Camera::Orthographic(camera) => camera.position,
        }
    }

    pub fn rotation(&self) -> Quat {
        match self {
            Camera::Perspective(camera) => camera.rotation(),
            Camera::Orthographic(camera) => camera.rotation,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        match self {
            Camera::Perspective(camera) => camera.set_position(position),
            Camera::Orthographic(camera) => camera.position = position,
        }
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        match self {
            Camera::Perspective(camera) => camera.set_rotation(rotation),
            Camera::Orthographic(camera) => camera.rotation = rotation.normalize(),
        }
    }

    pub fn rotate(&mut self, rotation: Quat) {
        match self {
            Camera::Perspective(camera) => camera.rotate(rotation),
            Camera::Orthographic(camera) => {
                camera.rotation = (rotation * camera.rotation).normalize()
            }
        }
    }

    /// Orthographic cameras have no frustum yet and never cull.
    pub fn is_inside_frustum(&self, aabb: &Aabb) -> bool {
        match self {
            Camera::Perspective(camera) => camera.is_inside_frustum(aabb),
            Camera::Orthographic(_) => true,
        }
    }

    pub fn as_perspective(&self) -> Option<&PerspectiveCamera> {
        match self {
            Camera::Perspective(camera) => Some(camera),
            Camera::Orthographic(_) => None,
        }
    }

    pub fn as_perspective_mut(&mut self) -> Option<&mut PerspectiveCamera> {
        match self {
            Camera::Perspective(camera) => Some(camera),
            Camera::Orthographic(_) => None,
        }
    }
}

fn sanitize_aspect(aspect_ratio: f32) -> f32 {
    if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        log::warn!("Invalid aspect ratio {}, using 1.0", aspect_ratio);
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn frustum_planes_point_inward() {
        let camera = PerspectiveCamera::new(FRAC_PI_2, 1.0, 0.1, 100.0);
        let inside = Vec3::new(0.0, 0.0, -10.0);
        for plane in &camera.frustum().planes {
            assert!(plane.distance(inside) > 0.0, "{plane:?}");
            assert!((plane.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn portrait_aspect_widens_the_projection_only() {
        let mut camera = PerspectiveCamera::new(1.0, 1.0, 0.1, 100.0);
        camera.set_aspect_ratio(0.5);

        assert_eq!(camera.fov(), 1.0);
        assert!(camera.effective_fov() > 1.0);

        // Horizontal fov of the portrait projection equals the nominal fov.
        let horizontal = 2.0 * ((camera.effective_fov() * 0.5).tan() * 0.5).atan();
        assert!((horizontal - 1.0).abs() < 1e-5);
    }

    #[test]
    fn setters_refresh_the_frustum() {
        let mut camera = PerspectiveCamera::new(FRAC_PI_2, 1.0, 0.1, 100.0);
        let target = Aabb::new(Vec3::new(-0.5, -0.5, 9.5), Vec3::new(0.5, 0.5, 10.5));
        assert!(!camera.is_inside_frustum(&target));

        camera.set_rotation(Quat::from_rotation_y(std::f32::consts::PI));
        assert!(camera.is_inside_frustum(&target));
    }

    #[test]
    fn orthographic_component_builds_the_reserved_variant() {
        let component = CameraComponent {
            camera_type: CameraType::Orthographic,
            ..CameraComponent::default()
        };
        let camera = Camera::from_component(&component, Vec3::ONE, Quat::IDENTITY, 1.5);

        assert_eq!(camera.camera_type(), CameraType::Orthographic);
        assert!(camera.as_perspective().is_none());
        assert!(camera.is_inside_frustum(&Aabb::new(Vec3::splat(1e6), Vec3::splat(1e6 + 1.0))));
    }
}
