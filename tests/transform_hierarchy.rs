use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use wgpu_deferred::backend::HeadlessDevice;
use wgpu_deferred::renderer::{get_renderable_entities, primitives, Material, Mesh};
use wgpu_deferred::scene::{Scene, TransformComponent};
use wgpu_deferred::{HierarchyError, RendererError};

fn cube(device: &mut HeadlessDevice) -> (Arc<Mesh>, Arc<Material>) {
    let (vertices, indices) = primitives::cube();
    (
        Arc::new(Mesh::upload(device, &vertices, &indices).unwrap()),
        Arc::new(Material::new(Vec4::ONE)),
    )
}

#[test]
fn world_matrix_is_the_product_of_the_chain() {
    let mut device = HeadlessDevice::new();
    let (mesh, material) = cube(&mut device);
    let mut scene = Scene::new("Chain");

    let root_transform = TransformComponent::new(
        Vec3::new(0.0, 2.0, 0.0),
        Vec3::new(0.0, 0.5, 0.0),
        Vec3::splat(2.0),
    );
    let middle_transform = TransformComponent::new(
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(0.3, 0.0, 0.1),
        Vec3::ONE,
    );
    let leaf_transform = TransformComponent::new(
        Vec3::new(0.0, 0.0, 3.0),
        Vec3::ZERO,
        Vec3::new(0.5, 1.0, 0.5),
    );

    let root = scene.create_entity().with_transform(root_transform).spawn();
    let middle = scene
        .create_entity()
        .with_transform(middle_transform)
        .with_parent(root)
        .spawn();
    let leaf = scene
        .create_entity()
        .with_transform(leaf_transform)
        .with_mesh_renderer(mesh, material)
        .with_parent(middle)
        .spawn();

    let renderables = get_renderable_entities(&scene).unwrap();
    assert_eq!(renderables.len(), 1);
    assert_eq!(renderables[0].entity, leaf);

    let expected = root_transform.local_matrix()
        * middle_transform.local_matrix()
        * leaf_transform.local_matrix();
    assert!(renderables[0].model.abs_diff_eq(expected, 1e-5));
}

#[test]
fn entities_without_both_mesh_and_material_are_not_drawn() {
    let mut device = HeadlessDevice::new();
    let (mesh, material) = cube(&mut device);
    let mut scene = Scene::new("Partial");

    scene
        .create_entity()
        .with_transform(TransformComponent::default())
        .spawn();
    scene
        .create_entity()
        .with_transform(TransformComponent::from_position(Vec3::X))
        .with_mesh_renderer(mesh, material)
        .spawn();

    let renderables = get_renderable_entities(&scene).unwrap();
    assert_eq!(renderables.len(), 1);
    assert_eq!(renderables[0].model, Mat4::from_translation(Vec3::X));
}

#[test]
fn parent_cycle_fails_resolution() {
    let mut device = HeadlessDevice::new();
    let (mesh, material) = cube(&mut device);
    let mut scene = Scene::new("Cycle");

    let a = scene
        .create_entity()
        .with_transform(TransformComponent::default())
        .with_mesh_renderer(mesh, material)
        .spawn();
    let b = scene
        .create_entity()
        .with_transform(TransformComponent::default())
        .with_parent(a)
        .spawn();
    scene.set_parent(a, b).unwrap();

    match get_renderable_entities(&scene) {
        Err(RendererError::TransformHierarchy { entity, reason }) => {
            assert_eq!(entity, a);
            assert!(matches!(reason, HierarchyError::Cycle(_)));
        }
        other => panic!("expected a hierarchy error, got {other:?}"),
    }
}
