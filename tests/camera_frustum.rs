use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use glam::{Mat4, Quat, Vec3};

use wgpu_deferred::renderer::{Aabb, Camera, PerspectiveCamera};

fn unit_box(center: Vec3) -> Aabb {
    Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
}

#[test]
fn rotations_compose_newest_first() {
    let r1 = Quat::from_rotation_y(FRAC_PI_4);
    let r2 = Quat::from_rotation_x(0.3);

    let mut camera = PerspectiveCamera::new(1.0, 1.5, 0.1, 100.0);
    camera.rotate(r1);
    camera.rotate(r2);

    assert!(camera.rotation().abs_diff_eq(r2 * r1, 1e-5));
}

#[test]
fn view_is_the_inverse_of_the_camera_transform() {
    let mut camera = PerspectiveCamera::new(1.0, 1.0, 0.1, 100.0);
    camera.set_position(Vec3::new(3.0, -2.0, 7.5));
    camera.set_rotation(Quat::from_euler(glam::EulerRot::YXZ, 0.7, -0.2, 0.1));

    let transform = Mat4::from_rotation_translation(camera.rotation(), camera.position());
    assert!((camera.view_matrix() * transform).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    assert!(camera
        .view_projection()
        .abs_diff_eq(camera.projection_matrix() * camera.view_matrix(), 1e-5));
}

#[test]
fn frustum_test_sorts_boxes() {
    let mut camera = PerspectiveCamera::new(FRAC_PI_2, 1.0, 0.1, 50.0);
    camera.set_position(Vec3::new(0.0, 0.0, 5.0));

    assert!(camera.is_inside_frustum(&unit_box(Vec3::new(0.0, 0.0, -5.0))));
    // Behind the camera, beyond the far plane, far off to the side.
    assert!(!camera.is_inside_frustum(&unit_box(Vec3::new(0.0, 0.0, 10.0))));
    assert!(!camera.is_inside_frustum(&unit_box(Vec3::new(0.0, 0.0, -60.0))));
    assert!(!camera.is_inside_frustum(&unit_box(Vec3::new(40.0, 0.0, -5.0))));
}

#[test]
fn straddling_boxes_are_kept() {
    let camera = PerspectiveCamera::new(FRAC_PI_2, 1.0, 0.1, 50.0);

    // Crosses the near plane.
    assert!(camera.is_inside_frustum(&unit_box(Vec3::new(0.0, 0.0, 0.2))));
    // Crosses the right plane (x = -z at 90 degrees).
    assert!(camera.is_inside_frustum(&unit_box(Vec3::new(10.3, 0.0, -10.0))));
    // Crosses the far plane.
    assert!(camera.is_inside_frustum(&unit_box(Vec3::new(0.0, 0.0, -50.2))));
}

#[test]
fn portrait_viewport_keeps_the_nominal_horizontal_fov() {
    let fov = 1.2;
    let mut camera = PerspectiveCamera::new(fov, 16.0 / 9.0, 0.1, 100.0);
    assert_eq!(camera.effective_fov(), fov);

    let aspect = 9.0 / 16.0;
    camera.set_aspect_ratio(aspect);
    let horizontal = 2.0 * ((camera.effective_fov() * 0.5).tan() * aspect).atan();
    assert!((horizontal - fov).abs() < 1e-5);
    assert_eq!(camera.fov(), fov);
}

#[test]
fn look_at_points_forward_at_the_target() {
    let mut camera = Camera::perspective(1.0, 1.0, 0.1, 100.0);
    let perspective = camera.as_perspective_mut().unwrap();
    perspective.set_position(Vec3::new(4.0, 3.0, 4.0));
    perspective.look_at(Vec3::ZERO, Vec3::Y);

    let expected = (Vec3::ZERO - Vec3::new(4.0, 3.0, 4.0)).normalize();
    assert!(perspective.forward().abs_diff_eq(expected, 1e-5));
    assert!(camera.is_inside_frustum(&unit_box(Vec3::ZERO)));
}
