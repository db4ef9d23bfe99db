//! 问答状态机：改写 → 分类 → 检索 → 评分 →（改进 → 检索）* → 生成 / 无法回答 / 离题

pub mod builder;
pub mod engine;
pub mod events;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod types;
pub mod verdict;

pub use builder::WorkflowBuilder;
pub use engine::{QaWorkflow, TurnOutcome};
pub use events::TurnEvent;
pub use nodes::NodeSettings;
pub use types::*;
pub use verdict::is_affirmative;
