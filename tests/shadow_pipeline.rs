use glam::{Mat4, Vec3, Vec4};

use wgpu_deferred::renderer::light::{build_directional_shadow_matrix, shadow_up};
use wgpu_deferred::renderer::MAX_DIRECTIONAL_LIGHTS;

const EPSILON: f32 = 1e-5;

/// Atlas lookup the lighting shader performs: NDC to texture space, then into the light's tile.
fn project_into_atlas(matrix: Mat4, tile: u32, world_pos: Vec3) -> Option<Vec3> {
    let clip = matrix * world_pos.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let uv_x = ndc.x * 0.5 + 0.5;
    let uv_y = -ndc.y * 0.5 + 0.5;
    Some(Vec3::new(
        (uv_x + tile as f32) / MAX_DIRECTIONAL_LIGHTS as f32,
        uv_y,
        ndc.z,
    ))
}

fn compute_ndc(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    clip.truncate() / clip.w
}

#[test]
fn shadow_volume_covers_points_around_the_focus() {
    let direction = Vec3::new(0.4, -1.0, 0.2).normalize();
    let matrix = build_directional_shadow_matrix(Vec3::ZERO, direction);

    for point in [
        Vec3::new(-3.5, 0.0, -2.0),
        Vec3::new(2.0, 1.0, 4.0),
        Vec3::new(4.5, -0.5, -3.0),
    ] {
        let ndc = compute_ndc(matrix, point);
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{point} -> {ndc}");
        assert!((0.0..=1.0).contains(&ndc.z), "{point} -> {ndc}");
    }
}

#[test]
fn closer_to_the_light_means_smaller_depth() {
    let direction = Vec3::NEG_Y;
    let matrix = build_directional_shadow_matrix(Vec3::ZERO, direction);

    let occluder = compute_ndc(matrix, Vec3::new(0.0, 2.0, 0.0));
    let receiver = compute_ndc(matrix, Vec3::ZERO);
    assert!(occluder.z < receiver.z);
}

#[test]
fn texture_axis_is_flipped_from_clip_space() {
    let direction = Vec3::NEG_Y;
    let matrix = build_directional_shadow_matrix(Vec3::ZERO, direction);
    let up = shadow_up(direction);

    let top = project_into_atlas(matrix, 0, up * 5.0).unwrap();
    let bottom = project_into_atlas(matrix, 0, -up * 5.0).unwrap();

    assert!(compute_ndc(matrix, up * 5.0).y > compute_ndc(matrix, -up * 5.0).y);
    assert!(top.y < bottom.y);
}

#[test]
fn each_light_samples_its_own_atlas_tile() {
    let matrix = build_directional_shadow_matrix(Vec3::ZERO, Vec3::new(0.3, -1.0, 0.1));
    let tile_width = 1.0 / MAX_DIRECTIONAL_LIGHTS as f32;

    for tile in 0..MAX_DIRECTIONAL_LIGHTS as u32 {
        let projected = project_into_atlas(matrix, tile, Vec3::new(1.0, 0.0, -2.0)).unwrap();
        let start = tile as f32 * tile_width;
        assert!(
            projected.x >= start - EPSILON && projected.x <= start + tile_width + EPSILON,
            "tile {tile}: {projected}"
        );
    }
}

#[test]
fn focus_moves_the_shadow_volume() {
    let direction = Vec3::new(0.0, -1.0, 0.5);
    let focus = Vec3::new(40.0, 0.0, -25.0);
    let matrix = build_directional_shadow_matrix(focus, direction);

    let centre = compute_ndc(matrix, focus);
    assert!(centre.x.abs() < EPSILON && centre.y.abs() < EPSILON);

    // The origin is far outside a volume centred 47 units away.
    let origin = compute_ndc(matrix, Vec3::ZERO);
    assert!(origin.x.abs() > 1.0 || origin.y.abs() > 1.0);
}

#[test]
fn straight_down_light_uses_a_stable_up_vector() {
    assert_eq!(shadow_up(Vec3::NEG_Y), Vec3::Z);
    assert_eq!(shadow_up(Vec3::new(1.0, -1.0, 0.0).normalize()), Vec3::Y);

    let matrix = build_directional_shadow_matrix(Vec3::ZERO, Vec3::NEG_Y);
    assert!(matrix.is_finite());
    let clip = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
    assert!((clip.w - 1.0).abs() < EPSILON);
}
