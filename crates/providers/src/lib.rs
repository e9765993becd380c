//! Completion backends and host HTTP clients for plotmaster.
//!
//! All completion backends implement the `plotmaster_core::Provider` trait.
//! The router selects the backend from the resolved API settings.

pub mod character_api;
pub mod openai_compat;
pub mod router;

pub use character_api::HttpCharacterStore;
pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
