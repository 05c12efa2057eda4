// renderer/transforms.rs
// Per-frame resolution of world matrices through the Parent chain

use std::collections::HashSet;
use std::sync::Arc;

use glam::Mat4;
use hecs::{Entity, World};
use rayon::prelude::*;

use crate::error::{HierarchyError, RendererError};
use crate::renderer::{Material, Mesh};
use crate::scene::{MeshRendererComponent, Parent, Scene, TransformComponent};

/// Longest parent chain that is walked before the hierarchy is declared broken.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// A drawable entity with its resolved world matrix. Rebuilt every frame.
#[derive(Debug, Clone)]
pub struct RenderableEntity {
    pub entity: Entity,
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
    pub model: Mat4,
}

/// World matrix of `entity`: the local transforms of its ancestors composed root first.
/// Entities without a `TransformComponent` contribute identity.
pub fn world_matrix(world: &World, entity: Entity) -> Result<Mat4, HierarchyError> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(entity);

    while let Some(node) = current {
        if !visited.insert(node) {
            return Err(HierarchyError::Cycle(node));
        }
        if chain.len() == MAX_HIERARCHY_DEPTH {
            return Err(HierarchyError::TooDeep(MAX_HIERARCHY_DEPTH));
        }

        let local = world
            .get::<&TransformComponent>(node)
            .map(|transform| transform.local_matrix())
            .unwrap_or(Mat4::IDENTITY);
        chain.push(local);

        current = world.get::<&Parent>(node).ok().map(|parent| parent.0);
    }

    Ok(chain
        .iter()
        .rev()
        .fold(Mat4::IDENTITY, |parent, local| parent * *local))
}

/// Every entity with a transform and both a mesh and a material, in query order.
pub fn get_renderable_entities(scene: &Scene) -> Result<Vec<RenderableEntity>, RendererError> {
    let world = scene.world();

    let candidates: Vec<(Entity, Arc<Mesh>, Arc<Material>)> = world
        .query::<(&TransformComponent, &MeshRendererComponent)>()
        .iter()
        .filter_map(|(entity, (_, renderer))| {
            Some((entity, renderer.mesh.clone()?, renderer.material.clone()?))
        })
        .collect();

    log::trace!("Resolving transforms for {} renderables", candidates.len());

    candidates
        .into_par_iter()
        .map(|(entity, mesh, material)| {
            world_matrix(world, entity)
                .map(|model| RenderableEntity {
                    entity,
                    mesh,
                    material,
                    model,
                })
                .map_err(|reason| RendererError::TransformHierarchy { entity, reason })
        })
        .collect()
}
