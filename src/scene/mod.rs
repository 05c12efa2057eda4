// scene/mod.rs

pub mod builder;
pub mod components;
pub mod config;
pub mod scene;

use std::cell::RefCell;
use std::rc::Rc;

pub use builder::EntityBuilder;
pub use components::{
    CameraComponent, CameraType, Children, LightComponent, LightType, MeshRendererComponent,
    Name, Parent, ShadowType, TransformComponent, Uuid,
};
pub use config::{BloomConfig, ConfigChanges, EnvironmentConfig, SceneRendererConfig};
pub use scene::Scene;

/// Scene handle shared between the renderer and whoever edits the scene.
pub type SharedScene = Rc<RefCell<Scene>>;
