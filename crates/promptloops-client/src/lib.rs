mod catalog;
mod credential;
mod message;
mod openrouter;
mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use catalog::{fallback_models, fetch_catalog, CatalogSource, ModelCatalog, ModelInfo};
pub use credential::{Credential, CredentialError, CREDENTIAL_PREFIX};
pub use message::{Message, Role};
pub use openrouter::OpenRouterClient;
pub use traits::{
    ClientConfig, ClientError, CompletionClient, CompletionRequest, DEFAULT_ENDPOINT,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
