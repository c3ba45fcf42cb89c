//! Validated hosted-model identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Models the pipeline is allowed to call.
pub const ALLOWED_MODELS: &[&str] = &["text-bison@001", "text-bison"];

/// A model identifier that is known to be on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Validate `model` against [`ALLOWED_MODELS`].
    pub fn parse(model: &str) -> Result<Self, LlmError> {
        if ALLOWED_MODELS.contains(&model) {
            Ok(Self(model.to_string()))
        } else {
            Err(LlmError::InvalidModel(format!(
                "'{}' is not one of [{}]",
                model,
                ALLOWED_MODELS.join(", ")
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = LlmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        assert_eq!(ModelId::parse("text-bison").expect("allowed").as_str(), "text-bison");
        assert!(ModelId::parse("text-bison@001").is_ok());
        assert!(matches!(
            ModelId::parse("gpt-unknown"),
            Err(LlmError::InvalidModel(_))
        ));
        assert!(ModelId::parse("").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ModelId = serde_json::from_str("\"text-bison@001\"").expect("valid model");
        assert_eq!(ok.to_string(), "text-bison@001");

        let bad: Result<ModelId, _> = serde_json::from_str("\"gpt-unknown\"");
        assert!(bad.is_err());
    }
}
