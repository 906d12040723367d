//! Configuration module for Syllabus.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, SystemPrompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, ModelSettings, PromptSettings, SearchSettings,
    ServerSettings, SessionSettings, Settings, StoreProvider, VectorStoreSettings,
};
