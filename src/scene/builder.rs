// scene/builder.rs
// Fluent helper for spawning entities into a Scene

use std::sync::Arc;

use super::components::*;
use super::scene::Scene;
use crate::renderer::{Material, Mesh};

/// Collects components and spawns them as one entity with a fresh [`Uuid`].
pub struct EntityBuilder<'s> {
    scene: &'s mut Scene,
    builder: hecs::EntityBuilder,
    parent: Option<hecs::Entity>,
}

impl<'s> EntityBuilder<'s> {
    pub fn new(scene: &'s mut Scene) -> Self {
        Self {
            scene,
            builder: hecs::EntityBuilder::new(),
            parent: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.builder.add(Name::new(name));
        self
    }

    pub fn with_transform(mut self, transform: TransformComponent) -> Self {
        self.builder.add(transform);
        self
    }

    pub fn with_mesh_renderer(mut self, mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        self.builder.add(MeshRendererComponent::new(mesh, material));
        self
    }

    pub fn with_light(mut self, light: LightComponent) -> Self {
        self.builder.add(light);
        self
    }

    pub fn with_camera(mut self, camera: CameraComponent) -> Self {
        self.builder.add(camera);
        self
    }

    /// Attach any other component.
    pub fn with<T: hecs::Component>(mut self, component: T) -> Self {
        self.builder.add(component);
        self
    }

    pub fn with_parent(mut self, parent: hecs::Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn spawn(mut self) -> hecs::Entity {
        let uuid = self.scene.allocate_uuid();
        let entity = self.scene.spawn_built(uuid, &mut self.builder);
        if let Some(parent) = self.parent {
            if let Err(err) = self.scene.set_parent(entity, parent) {
                log::warn!("Cannot parent {:?} to {:?}: {}", entity, parent, err);
            }
        }
        entity
    }
}
