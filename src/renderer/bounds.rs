use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |aabb, point| Self {
            min: aabb.min.min(point),
            max: aabb.max.max(point),
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Boxes with NaN/infinite corners or inverted axes cannot be culled reliably.
    pub fn is_degenerate(&self) -> bool {
        !self.min.is_finite() || !self.max.is_finite() || self.min.cmpgt(self.max).any()
    }

    /// World-space box enclosing this box after `matrix` is applied.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let center = matrix.transform_point3(self.center());
        let half = self.half_extents();
        let extent = matrix.x_axis.truncate().abs() * half.x
            + matrix.y_axis.truncate().abs() * half.y
            + matrix.z_axis.truncate().abs() * half.z;
        Self::new(center - extent, center + extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn from_points_encloses_all_points() {
        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -4.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn rotated_box_grows_to_enclose_corners() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let matrix = Mat4::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            Vec3::new(10.0, 0.0, 0.0),
        );
        let world = aabb.transformed(&matrix);
        let expected = std::f32::consts::SQRT_2;

        assert!(world.center().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5));
        assert!((world.half_extents().x - expected).abs() < 1e-5);
        assert!((world.half_extents().y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn non_finite_boxes_are_degenerate() {
        assert!(Aabb::new(Vec3::splat(f32::NAN), Vec3::ONE).is_degenerate());
        assert!(Aabb::new(Vec3::ONE, Vec3::ZERO).is_degenerate());
        assert!(!Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)).is_degenerate());
    }
}
