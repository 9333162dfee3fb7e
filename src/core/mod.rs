pub mod agent;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod scheduler;
pub mod social;
pub mod store;
