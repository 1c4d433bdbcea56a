// Intent extraction: deterministic pattern rules first, local LLM
// tool-calling as the fallback.

pub mod types;
pub use types::{Intent, IntentKind};

pub mod regex_router;
pub use regex_router::RegexIntentRouter;

pub mod llm_fallback;
pub use llm_fallback::{DisabledFallback, FallbackRouter, LlmFallbackRouter};
