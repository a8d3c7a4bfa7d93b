pub mod config;
pub mod openai;
pub mod provider;
pub mod types;

pub use config::ExtractionConfig;
pub use openai::OpenAiProvider;
pub use provider::{Completion, ExtractionError, ExtractionProvider, ExtractionResult};
pub use types::{ChatMessage, ChatRequest, ChatResponse, Choice, MessageRole, Usage};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::openai::*;
    pub use crate::provider::*;
    pub use crate::types::*;
}
