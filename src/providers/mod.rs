pub mod gemini;
pub mod traits;

pub use gemini::GeminiProvider;
pub use traits::{CompletionRequest, Provider, ResponseFormat};
