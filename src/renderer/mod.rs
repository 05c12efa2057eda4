//! Deferred renderer.
//!
//! [`DeferredRenderer`] turns a [`Scene`](crate::scene::Scene) and a [`Camera`] into a
//! tone-mapped image through five fixed passes (see [`passes`]). [`Presenter`] puts that image
//! on screen. Both receive the [`RenderContext`] explicitly on every call.

pub mod assets;
pub mod bounds;
pub mod camera;
pub mod context;
pub mod deferred;
pub mod frame;
pub mod light;
pub mod passes;
pub mod pipeline_builder;
pub mod presenter;
pub mod primitives;
pub mod transforms;
pub mod uniforms;
pub mod vertex;

pub use assets::{Cubemap, Material, Mesh};
pub use bounds::Aabb;
pub use camera::{Camera, Frustum, OrthographicCamera, PerspectiveCamera, Plane};
pub use context::RenderContext;
pub use deferred::{DeferredRenderer, FrameStats, PipelineSet, RebuildStats, RendererState};
pub use frame::{FrameRing, FrameSlot};
pub use light::{DirectionalLight, Light, PointLight, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS};
pub use pipeline_builder::{ComputePipelineBuilder, PipelineBuilder};
pub use presenter::{PresentOutcome, Presenter};
pub use transforms::{get_renderable_entities, RenderableEntity};
pub use uniforms::ShadowMappingInfo;
pub use vertex::Vertex;
