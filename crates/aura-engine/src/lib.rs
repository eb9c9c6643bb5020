pub mod config;
pub mod gateway;
pub mod session;
pub mod studio;
pub mod views;

pub use config::{GatewayConfig, GatewayOverrides};
pub use gateway::{build_gateway, AiGateway, FailureKind, GATEWAY_NAMES};
pub use session::StudioSession;
pub use studio::{
    ChatOutcome, Dispatch, SceneOutcome, Studio, StudioCommand, StudioSnapshot, StudioStats,
};
pub use views::{AssistantPanel, BoardLayout, SceneBoard, SceneCard};
