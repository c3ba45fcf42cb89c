//! Hosted text-model integration.
//!
//! The annotation stage only depends on the [`TextGenerator`] trait; the
//! production implementation is [`VertexTextClient`].
//!
//! ```ignore
//! use rating_forge::llm::{GenerationRequest, ModelId, TextGenerator, VertexTextClient};
//!
//! let client = VertexTextClient::for_location("us-central1", Some(token))?;
//! let model = ModelId::parse("text-bison@001")?;
//! let response = client
//!     .generate(GenerationRequest::new("my-project", model, "Rate the movie..."))
//!     .await?;
//! ```

pub mod model;
pub mod provider;
pub mod vertex;

pub use model::{ModelId, ALLOWED_MODELS};
pub use provider::{DecodingParams, GenerationRequest, GenerationResponse, TextGenerator};
pub use vertex::VertexTextClient;
