pub mod backend;
#[cfg(feature = "gemini")]
pub mod client;
pub mod gateway;
pub mod prompts;
pub mod repair;
#[cfg(feature = "gemini")]
pub mod types;

pub use backend::*;
#[cfg(feature = "gemini")]
pub use client::*;
pub use gateway::*;
pub use repair::*;
