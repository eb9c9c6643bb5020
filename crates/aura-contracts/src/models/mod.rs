mod registry;
mod selectors;

pub use registry::{
    ModelRegistry, ModelSpec, CAPABILITY_CHAT, CAPABILITY_IMAGE, CAPABILITY_STRUCTURED,
};
pub use selectors::{ModelSelection, ModelSelector};
