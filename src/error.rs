use thiserror::Error;

use crate::backend::{BackendError, RecordingError};
use crate::renderer::RendererState;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error("Renderer is not ready (state {0:?})")]
    NotReady(RendererState),
    #[error("Transform hierarchy of entity {entity:?} is invalid: {reason}")]
    TransformHierarchy {
        entity: hecs::Entity,
        reason: HierarchyError,
    },
    #[error("Invalid renderer configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("parent chain loops back on {0:?}")]
    Cycle(hecs::Entity),
    #[error("parent chain is deeper than {0} levels")]
    TooDeep(usize),
}

pub type RendererResult<T> = Result<T, RendererError>;
