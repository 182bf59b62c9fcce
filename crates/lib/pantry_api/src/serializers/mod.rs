//! Serialization layer.
//!
//! Turns request JSON objects into validated domain inputs and domain
//! entities into wire representations. Every validator collects all field
//! errors of a payload before rejecting it.

pub mod attribute;
pub mod query;
pub mod recipe;
pub mod user;

use std::collections::BTreeMap;
use std::fmt;

use pantry_core::models::Price;
use serde::Serialize;
use serde_json::Value;
use validator::ValidateEmail;

pub use attribute::{AttributeInput, AttributeResponse};
pub use query::{AttributeListParams, RecipeListParams};
pub use recipe::{RecipeDetailResponse, RecipeImageResponse, RecipeResponse};
pub use user::{Registration, TokenRequest, TokenResponse, UserInput, UserResponse};

/// A JSON object as received in a request body.
pub type JsonMap = serde_json::Map<String, Value>;

/// Key for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const NOT_NULL: &str = "This field may not be null.";
pub(crate) const NOT_BLANK: &str = "This field may not be blank.";
pub(crate) const NOT_A_STRING: &str = "Not a valid string.";
pub(crate) const NOT_AN_INTEGER: &str = "A valid integer is required.";
pub(crate) const INVALID_EMAIL: &str = "Enter a valid email address.";

/// Maximum length of titles, links, names and emails.
pub const MAX_TEXT_LENGTH: usize = 255;

/// Field name → messages, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{field}: {}", messages.join(" "))?;
        }
        Ok(())
    }
}

/// Which write a payload is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: required fields must be present.
    Create,
    /// PUT: required fields must be present.
    Replace,
    /// PATCH: every field is optional.
    Partial,
}

impl WriteMode {
    pub fn requires_all(self) -> bool {
        !matches!(self, WriteMode::Partial)
    }
}

/// Settings that tune validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRules {
    pub min_password_length: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_password_length: 5,
        }
    }
}

/// Builds a typed input from a JSON object.
pub trait Validator: Sized {
    fn validate(input: &JsonMap, mode: WriteMode, rules: &ValidationRules)
    -> Result<Self, FieldErrors>;
}

/// Name of a JSON value's type for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Constraints for a string field.
#[derive(Debug, Clone, Copy)]
pub struct StringRule {
    required: bool,
    allow_blank: bool,
    trim: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl StringRule {
    /// Must be present on create/replace and non-blank.
    pub fn required() -> Self {
        Self {
            required: true,
            allow_blank: false,
            trim: true,
            min_length: None,
            max_length: None,
        }
    }

    /// May be absent or blank.
    pub fn optional() -> Self {
        Self {
            required: false,
            allow_blank: true,
            ..Self::required()
        }
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Keep surrounding whitespace (passwords).
    pub fn untrimmed(mut self) -> Self {
        self.trim = false;
        self
    }
}

/// Reads typed fields out of a JSON object, collecting errors as it goes.
pub struct FieldReader<'a> {
    input: &'a JsonMap,
    mode: WriteMode,
    errors: FieldErrors,
}

impl<'a> FieldReader<'a> {
    pub fn new(input: &'a JsonMap, mode: WriteMode) -> Self {
        Self {
            input,
            mode,
            errors: FieldErrors::new(),
        }
    }

    /// The present, non-null value of `field`. Absence is an error only for
    /// required fields outside partial updates.
    fn lookup(&mut self, field: &str, required: bool) -> Option<&'a Value> {
        match self.input.get(field) {
            Some(Value::Null) => {
                self.errors.add(field, NOT_NULL);
                None
            }
            Some(value) => Some(value),
            None => {
                if required && self.mode.requires_all() {
                    self.errors.add(field, REQUIRED);
                }
                None
            }
        }
    }

    pub fn string(&mut self, field: &str, rule: StringRule) -> Option<String> {
        let value = self.lookup(field, rule.required)?;
        check_string(field, value, rule, &mut self.errors)
    }

    /// An email address: trimmed, shape-checked and normalized.
    pub fn email(&mut self, field: &str, required: bool) -> Option<String> {
        let mut rule = StringRule::required().max_length(MAX_TEXT_LENGTH);
        rule.required = required;
        let email = self.string(field, rule)?;
        if !is_valid_email(&email) {
            self.errors.add(field, INVALID_EMAIL);
            return None;
        }
        Some(pantry_core::models::user::normalize_email(&email))
    }

    /// A non-negative integer given as a JSON number or numeric string.
    pub fn non_negative_integer(&mut self, field: &str, required: bool) -> Option<i32> {
        let value = self.lookup(field, required)?;
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(number) = parsed else {
            self.errors.add(field, NOT_AN_INTEGER);
            return None;
        };
        if number < 0 {
            self.errors
                .add(field, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        match i32::try_from(number) {
            Ok(n) => Some(n),
            Err(_) => {
                self.errors.add(
                    field,
                    format!("Ensure this value is less than or equal to {}.", i32::MAX),
                );
                None
            }
        }
    }

    /// A price given as a decimal string or JSON number.
    pub fn price(&mut self, field: &str, required: bool) -> Option<Price> {
        let value = self.lookup(field, required)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                self.errors.add(field, "A valid number is required.");
                return None;
            }
        };
        match text.parse::<Price>() {
            Ok(price) => Some(price),
            Err(e) => {
                self.errors.add(field, e.to_string());
                None
            }
        }
    }

    /// A list of `{"name": ...}` objects, returned as names. `None` when the
    /// field is absent.
    pub fn attribute_names(&mut self, field: &str) -> Option<Vec<String>> {
        let value = self.lookup(field, false)?;
        let Value::Array(items) = value else {
            self.errors.add(
                field,
                format!(
                    "Expected a list of items but got type \"{}\".",
                    json_type_name(value)
                ),
            );
            return None;
        };

        let rule = StringRule::required().max_length(MAX_TEXT_LENGTH);
        let mut names = Vec::with_capacity(items.len());
        let mut valid = true;
        for (index, item) in items.iter().enumerate() {
            let item_field = format!("{field}[{index}]");
            let Value::Object(object) = item else {
                self.errors.add(
                    item_field,
                    format!(
                        "Invalid data. Expected a dictionary, but got {}.",
                        json_type_name(item)
                    ),
                );
                valid = false;
                continue;
            };
            let name_field = format!("{item_field}.name");
            let name = match object.get("name") {
                None => {
                    self.errors.add(name_field, REQUIRED);
                    None
                }
                Some(Value::Null) => {
                    self.errors.add(name_field, NOT_NULL);
                    None
                }
                Some(value) => check_string(&name_field, value, rule, &mut self.errors),
            };
            match name {
                Some(name) => names.push(name),
                None => valid = false,
            }
        }
        valid.then_some(names)
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }

    /// `Ok(())` when no field failed.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn check_string(
    field: &str,
    value: &Value,
    rule: StringRule,
    errors: &mut FieldErrors,
) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            errors.add(field, NOT_A_STRING);
            return None;
        }
    };
    let text = if rule.trim {
        text.trim().to_string()
    } else {
        text
    };
    if text.is_empty() && !rule.allow_blank {
        errors.add(field, NOT_BLANK);
        return None;
    }

    let length = text.chars().count();
    let mut valid = true;
    if let Some(max) = rule.max_length
        && length > max
    {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
        valid = false;
    }
    if let Some(min) = rule.min_length
        && length < min
    {
        errors.add(
            field,
            format!("Ensure this field has at least {min} characters."),
        );
        valid = false;
    }
    valid.then_some(text)
}

/// `local@domain.tld` as accepted by `validator`, further restricted to a
/// dot-atom local part and a dotted domain whose last label has a letter.
fn is_valid_email(email: &str) -> bool {
    if !email.validate_email() {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let dot_atom = local.split('.').all(|part| !part.is_empty());
    let top_level = domain.rsplit_once('.').is_some_and(|(_, tld)| {
        tld.len() >= 2 && tld.chars().any(|c| c.is_ascii_alphabetic())
    });
    dot_atom && top_level
}
