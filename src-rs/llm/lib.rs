pub mod gemini_adapter;
pub mod openai_adapter;
pub mod rotation;
pub mod router;
pub mod sse;
pub mod types;

pub use gemini_adapter::{GeminiAdapter, GeminiConfig};
pub use openai_adapter::{OpenAICompatAdapter, OpenAICompatConfig};
pub use rotation::Rotator;
pub use router::{LLMRouter, ModelInfo};
pub use types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError, TokenStream};
