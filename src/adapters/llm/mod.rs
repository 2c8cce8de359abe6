//! LLM planner adapters.

pub mod mock;
pub mod openai;

pub use mock::MockLlmPlanner;
pub use openai::OpenAiPlanner;
