use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::error::RendererError;
use crate::renderer::transforms::world_matrix;
use crate::scene::{LightComponent, LightType, Scene, ShadowType};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 16;

/// Distance from the shadow focus to the light-space eye.
pub const SHADOW_DISTANCE: f32 = 30.0;
/// Half extent of the orthographic shadow volume.
pub const SHADOW_SIZE: f32 = 15.0;
pub const SHADOW_NEAR: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub cast_shadows: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
}

impl DirectionalLight {
    /// Orthographic light-space view-projection centred on the light's position.
    pub fn shadow_matrix(&self) -> Mat4 {
        build_directional_shadow_matrix(self.position, self.direction)
    }
}

/// Renderer-facing light, rebuilt from the scene every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Point(PointLight),
    Directional(DirectionalLight),
}

impl Light {
    pub fn light_type(&self) -> LightType {
        match self {
            Light::Point(_) => LightType::Point,
            Light::Directional(_) => LightType::Directional,
        }
    }

    pub fn casts_shadows(&self) -> bool {
        match self {
            Light::Point(light) => light.cast_shadows,
            Light::Directional(light) => light.cast_shadows,
        }
    }

    fn from_component(component: &LightComponent, world: &Mat4) -> Self {
        let color = component.color.truncate();
        let cast_shadows = component.shadow != ShadowType::None;
        let position = world.transform_point3(Vec3::ZERO);
        match component.light_type {
            LightType::Point => Light::Point(PointLight {
                position,
                color,
                intensity: component.intensity,
                radius: component.radius,
                cast_shadows,
            }),
            LightType::Directional => Light::Directional(DirectionalLight {
                position,
                direction: safe_normalize(world.transform_vector3(Vec3::NEG_Z), Vec3::NEG_Y),
                color,
                intensity: component.intensity,
                cast_shadows,
            }),
        }
    }
}

/// Collects every `LightComponent` in the scene, positioned by its entity's world transform.
pub fn extract_lights(scene: &Scene) -> Result<Vec<Light>, RendererError> {
    let world = scene.world();
    let mut query = world.query::<&LightComponent>();
    let lights = query
        .iter()
        .map(|(entity, component)| {
            world_matrix(world, entity)
                .map(|matrix| Light::from_component(component, &matrix))
                .map_err(|reason| RendererError::TransformHierarchy { entity, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lights)
}

/// Directional lights that get a shadow atlas tile, in tile order.
pub fn shadow_casters(lights: &[Light]) -> impl Iterator<Item = &DirectionalLight> {
    lights
        .iter()
        .filter_map(|light| match light {
            Light::Directional(light) => Some(light),
            Light::Point(_) => None,
        })
        .filter(|light| light.cast_shadows)
        .take(MAX_DIRECTIONAL_LIGHTS)
}

pub fn build_directional_shadow_matrix(focus: Vec3, direction: Vec3) -> Mat4 {
    let direction = safe_normalize(direction, Vec3::NEG_Y);
    let light_pos = focus - direction * SHADOW_DISTANCE;
    let view = Mat4::look_at_rh(light_pos, focus, shadow_up(direction));

    let left = -SHADOW_SIZE;
    let right = SHADOW_SIZE;
    let bottom = -SHADOW_SIZE;
    let top = SHADOW_SIZE;
    let near = SHADOW_NEAR;
    let far = SHADOW_DISTANCE * 2.0;

    let projection = Mat4::from_cols(
        Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / (top - bottom), 0.0, 0.0),
        Vec4::new(0.0, 0.0, -1.0 / (far - near), 0.0),
        Vec4::new(
            -(right + left) / (right - left),
            -(top + bottom) / (top - bottom),
            -near / (far - near),
            1.0,
        ),
    );

    projection * view
}

/// Up vector for the light view, switching off Y when the light points (almost) straight down.
pub fn shadow_up(direction: Vec3) -> Vec3 {
    if direction.abs().dot(Vec3::Y) > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct DirectionalLightRaw {
    /// xyz direction, w shadow tile index or -1.
    pub direction_shadow: [f32; 4],
    pub color_intensity: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct PointLightRaw {
    pub position_radius: [f32; 4],
    pub color_intensity: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightsUniform {
    /// x directional count, y point count.
    pub counts: [u32; 4],
    pub directionals: [DirectionalLightRaw; MAX_DIRECTIONAL_LIGHTS],
    pub points: [PointLightRaw; MAX_POINT_LIGHTS],
}

impl LightsUniform {
    /// Shadow casters take the first directional slots, in tile order. The remaining directional
    /// slots go to the other directional lights in scene order.
    pub fn from_lights(lights: &[Light]) -> Self {
        let mut uniform = Self::zeroed();

        let casters: Vec<&DirectionalLight> = shadow_casters(lights).collect();
        let others = lights
            .iter()
            .filter_map(|light| match light {
                Light::Directional(light) => Some(light),
                Light::Point(_) => None,
            })
            .filter(|light| !casters.iter().any(|caster| std::ptr::eq(*caster, *light)));

        let directionals = casters
            .iter()
            .enumerate()
            .map(|(tile, light)| (*light, tile as f32))
            .chain(others.map(|light| (light, -1.0)));
        let mut directional_count = 0;
        for (slot, (light, tile)) in uniform.directionals.iter_mut().zip(directionals) {
            *slot = DirectionalLightRaw {
                direction_shadow: light.direction.extend(tile).to_array(),
                color_intensity: light.color.extend(light.intensity).to_array(),
            };
            directional_count += 1;
        }

        let points = lights.iter().filter_map(|light| match light {
            Light::Point(light) => Some(light),
            Light::Directional(_) => None,
        });
        let mut point_count = 0;
        for (slot, light) in uniform.points.iter_mut().zip(points) {
            *slot = PointLightRaw {
                position_radius: light.position.extend(light.radius).to_array(),
                color_intensity: light.color.extend(light.intensity).to_array(),
            };
            point_count += 1;
        }

        let total = lights.len();
        if directional_count + point_count < total {
            log::trace!(
                "Light capacity reached, dropping {} lights",
                total - directional_count - point_count
            );
        }

        uniform.counts = [directional_count as u32, point_count as u32, 0, 0];
        uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TransformComponent;

    fn directional(cast_shadows: bool) -> Light {
        Light::Directional(DirectionalLight {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows,
        })
    }

    #[test]
    fn directional_direction_follows_entity_rotation() {
        let mut scene = Scene::new("Lights");
        scene
            .create_entity()
            .with_transform(TransformComponent::new(
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
                Vec3::ONE,
            ))
            .with_light(LightComponent::directional(Vec4::ONE, 2.0, ShadowType::Hard))
            .spawn();

        let lights = extract_lights(&scene).unwrap();
        assert_eq!(lights.len(), 1);
        match lights[0] {
            Light::Directional(light) => {
                assert!(light.direction.abs_diff_eq(Vec3::NEG_Y, 1e-5));
                assert!(light.position.abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-5));
                assert!(light.cast_shadows);
            }
            other => panic!("expected directional light, got {other:?}"),
        }
    }

    #[test]
    fn shadow_casters_are_capped() {
        let lights: Vec<Light> = (0..6).map(|_| directional(true)).collect();
        assert_eq!(shadow_casters(&lights).count(), MAX_DIRECTIONAL_LIGHTS);

        let lights: Vec<Light> = (0..6).map(|i| directional(i != 1)).collect();
        assert_eq!(shadow_casters(&lights).count(), MAX_DIRECTIONAL_LIGHTS);
    }

    #[test]
    fn shadowed_light_behind_unshadowed_ones_keeps_its_tile() {
        let mut lights: Vec<Light> = (0..4).map(|_| directional(false)).collect();
        let mut sun = directional(true);
        if let Light::Directional(light) = &mut sun {
            light.direction = Vec3::NEG_X;
        }
        lights.push(sun);

        assert_eq!(shadow_casters(&lights).count(), 1);

        let uniform = LightsUniform::from_lights(&lights);
        assert_eq!(uniform.counts[0], MAX_DIRECTIONAL_LIGHTS as u32);
        assert_eq!(uniform.directionals[0].direction_shadow, [-1.0, 0.0, 0.0, 0.0]);
        for slot in &uniform.directionals[1..] {
            assert_eq!(slot.direction_shadow[3], -1.0);
        }
    }

    #[test]
    fn uniform_assigns_shadow_tiles_in_caster_order() {
        let lights = [directional(false), directional(true), directional(true)];
        let uniform = LightsUniform::from_lights(&lights);

        assert_eq!(uniform.counts[0], 3);
        assert_eq!(uniform.directionals[0].direction_shadow[3], 0.0);
        assert_eq!(uniform.directionals[1].direction_shadow[3], 1.0);
        assert_eq!(uniform.directionals[2].direction_shadow[3], -1.0);
    }

    #[test]
    fn point_lights_are_capped() {
        let lights: Vec<Light> = (0..MAX_POINT_LIGHTS + 3)
            .map(|i| {
                Light::Point(PointLight {
                    position: Vec3::splat(i as f32),
                    color: Vec3::ONE,
                    intensity: 1.0,
                    radius: 5.0,
                    cast_shadows: false,
                })
            })
            .collect();
        let uniform = LightsUniform::from_lights(&lights);

        assert_eq!(uniform.counts, [0, MAX_POINT_LIGHTS as u32, 0, 0]);
        assert_eq!(uniform.points[0].position_radius, [0.0, 0.0, 0.0, 5.0]);
    }

    #[test]
    fn shadow_matrix_maps_focus_into_depth_range() {
        let matrix = build_directional_shadow_matrix(Vec3::ZERO, Vec3::new(0.4, -1.0, 0.2));
        let clip = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;

        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
