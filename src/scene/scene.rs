use std::collections::HashMap;

use hecs::{Entity, World};

use super::builder::EntityBuilder;
use super::components::{Children, Parent, Uuid};
use super::config::SceneRendererConfig;

/// Entities plus the renderer configuration they should be drawn with.
pub struct Scene {
    name: String,
    world: World,
    uuids: HashMap<Uuid, Entity>,
    next_uuid: u64,
    config: SceneRendererConfig,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, SceneRendererConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: SceneRendererConfig) -> Self {
        Self {
            name: name.into(),
            world: World::new(),
            uuids: HashMap::new(),
            next_uuid: 1,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &SceneRendererConfig {
        &self.config
    }

    /// Replaces the stored config. A renderer drawing this scene only picks it up through
    /// `DeferredRenderer::change_config`.
    pub fn set_config(&mut self, config: SceneRendererConfig) {
        self.config = config;
    }

    pub fn create_entity(&mut self) -> EntityBuilder<'_> {
        EntityBuilder::new(self)
    }

    pub(crate) fn allocate_uuid(&mut self) -> Uuid {
        let uuid = Uuid(self.next_uuid);
        self.next_uuid += 1;
        uuid
    }

    pub(crate) fn spawn_built(&mut self, uuid: Uuid, builder: &mut hecs::EntityBuilder) -> Entity {
        builder.add(uuid);
        let entity = self.world.spawn(builder.build());
        self.uuids.insert(uuid, entity);
        entity
    }

    pub fn despawn(&mut self, entity: Entity) {
        if let Some(parent) = self.parent_of(entity) {
            if let Ok(mut children) = self.world.get::<&mut Children>(parent) {
                children.0.retain(|child| *child != entity);
            }
        }
        if let Ok(uuid) = self.world.get::<&Uuid>(entity).map(|uuid| *uuid) {
            self.uuids.remove(&uuid);
        }
        if let Err(err) = self.world.despawn(entity) {
            log::warn!("Despawning {:?} failed: {}", entity, err);
        }
    }

    /// Entities carrying every component of `Q`, in query order.
    pub fn get_entities_with<Q: hecs::Query>(&self) -> Vec<Entity> {
        self.world
            .query::<Q>()
            .iter()
            .map(|(entity, _)| entity)
            .collect()
    }

    /// # Panics
    /// If no entity has `uuid`.
    pub fn get_entity_with_uuid(&self, uuid: Uuid) -> Entity {
        match self.try_get_entity_with_uuid(uuid) {
            Some(entity) => entity,
            None => panic!("Scene {} has no entity with uuid {:?}", self.name, uuid),
        }
    }

    pub fn try_get_entity_with_uuid(&self, uuid: Uuid) -> Option<Entity> {
        self.uuids.get(&uuid).copied()
    }

    pub fn uuid_of(&self, entity: Entity) -> Option<Uuid> {
        self.world.get::<&Uuid>(entity).ok().map(|uuid| *uuid)
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<&Parent>(entity).ok().map(|parent| parent.0)
    }

    /// Re-parents `child`, keeping both `Children` lists in sync. Cycles are not rejected here;
    /// transform resolution detects them.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<(), hecs::NoSuchEntity> {
        if !self.world.contains(parent) {
            return Err(hecs::NoSuchEntity);
        }
        if let Some(previous) = self.parent_of(child) {
            if let Ok(mut children) = self.world.get::<&mut Children>(previous) {
                children.0.retain(|entity| *entity != child);
            }
        }

        self.world.insert_one(child, Parent(parent))?;

        let has_children = self.world.get::<&Children>(parent).is_ok();
        if has_children {
            if let Ok(mut children) = self.world.get::<&mut Children>(parent) {
                children.0.push(child);
            }
        } else {
            self.world.insert_one(parent, Children(vec![child]))?;
        }
        Ok(())
    }

    pub fn children_of(&self, entity: Entity) -> Vec<Entity> {
        self.world
            .get::<&Children>(entity)
            .map(|children| children.0.clone())
            .unwrap_or_default()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::components::{Name, TransformComponent};
    use glam::Vec3;

    #[test]
    fn uuids_resolve_to_spawned_entities() {
        let mut scene = Scene::new("Test");
        let entity = scene.create_entity().with_name("A").spawn();
        let uuid = scene.uuid_of(entity).unwrap();

        assert_eq!(scene.get_entity_with_uuid(uuid), entity);

        scene.despawn(entity);
        assert_eq!(scene.try_get_entity_with_uuid(uuid), None);
    }

    #[test]
    #[should_panic]
    fn missing_uuid_panics() {
        let scene = Scene::new("Test");
        scene.get_entity_with_uuid(Uuid(42));
    }

    #[test]
    fn set_parent_moves_child_between_parents() {
        let mut scene = Scene::new("Test");
        let a = scene.create_entity().with_name("A").spawn();
        let b = scene.create_entity().with_name("B").spawn();
        let child = scene.create_entity().with_name("Child").spawn();

        scene.set_parent(child, a).unwrap();
        assert_eq!(scene.children_of(a), vec![child]);

        scene.set_parent(child, b).unwrap();
        assert!(scene.children_of(a).is_empty());
        assert_eq!(scene.children_of(b), vec![child]);
        assert_eq!(scene.parent_of(child), Some(b));
    }

    #[test]
    fn get_entities_with_filters_by_component_set() {
        let mut scene = Scene::new("Test");
        let with_transform = scene
            .create_entity()
            .with_transform(TransformComponent::from_position(Vec3::X))
            .spawn();
        scene.create_entity().with_name("NoTransform").spawn();

        let found = scene.get_entities_with::<(&TransformComponent, &Uuid)>();
        assert_eq!(found, vec![with_transform]);
        assert_eq!(scene.get_entities_with::<&Name>().len(), 1);
    }
}
