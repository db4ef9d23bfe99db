//! 核心编排层：会话状态、轮次错误、编排器与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::{create_orchestrator_builder, OrchestratorBuilder};
pub use error::{PortError, TurnError};
pub use orchestrator::{create_llm_from_config, Orchestrator, Turn};
pub use state::{OnTopic, SessionState};
