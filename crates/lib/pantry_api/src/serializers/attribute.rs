//! Tag and ingredient payloads and representations.

use pantry_core::models::Attribute;
use serde::Serialize;

use super::{
    FieldErrors, FieldReader, JsonMap, MAX_TEXT_LENGTH, StringRule, ValidationRules, Validator,
    WriteMode,
};

/// A rename. `name` is `None` only on a partial update that omits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInput {
    pub name: Option<String>,
}

impl Validator for AttributeInput {
    fn validate(
        input: &JsonMap,
        mode: WriteMode,
        _rules: &ValidationRules,
    ) -> Result<Self, FieldErrors> {
        let mut reader = FieldReader::new(input, mode);
        let name = reader.string("name", StringRule::required().max_length(MAX_TEXT_LENGTH));
        reader.finish()?;
        Ok(Self { name })
    }
}

/// `{id, name}`, shared by tags and ingredients.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeResponse {
    pub id: i64,
    pub name: String,
}

impl From<&Attribute> for AttributeResponse {
    fn from(attribute: &Attribute) -> Self {
        Self {
            id: attribute.id,
            name: attribute.name.clone(),
        }
    }
}
