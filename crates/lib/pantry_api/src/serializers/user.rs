//! User account payloads and representations.

use pantry_core::models::User;
use serde::Serialize;

use super::{
    FieldErrors, FieldReader, JsonMap, MAX_TEXT_LENGTH, StringRule, ValidationRules, Validator,
    WriteMode,
};

/// A complete registration. The password is still in clear text here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl Validator for Registration {
    fn validate(
        input: &JsonMap,
        _mode: WriteMode,
        rules: &ValidationRules,
    ) -> Result<Self, FieldErrors> {
        let mut reader = FieldReader::new(input, WriteMode::Create);
        let (email, name, password) = read_account(&mut reader, rules);
        match (email, name, password) {
            (Some(email), Some(name), Some(password)) => Ok(Self {
                email,
                name,
                password,
            }),
            _ => Err(reader.into_errors()),
        }
    }
}

/// Self-service profile changes. The password is still in clear text here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

impl Validator for UserInput {
    fn validate(
        input: &JsonMap,
        mode: WriteMode,
        rules: &ValidationRules,
    ) -> Result<Self, FieldErrors> {
        let mut reader = FieldReader::new(input, mode);
        let (email, name, password) = read_account(&mut reader, rules);
        reader.finish()?;
        Ok(Self {
            email,
            name,
            password,
        })
    }
}

fn read_account(
    reader: &mut FieldReader<'_>,
    rules: &ValidationRules,
) -> (Option<String>, Option<String>, Option<String>) {
    let email = reader.email("email", true);
    let name = reader.string("name", StringRule::required().max_length(MAX_TEXT_LENGTH));
    let password = reader.string(
        "password",
        StringRule::required()
            .untrimmed()
            .min_length(rules.min_password_length)
            .max_length(128),
    );
    (email, name, password)
}

/// Credentials exchanged for a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

impl Validator for TokenRequest {
    fn validate(
        input: &JsonMap,
        _mode: WriteMode,
        _rules: &ValidationRules,
    ) -> Result<Self, FieldErrors> {
        let mut reader = FieldReader::new(input, WriteMode::Create);
        let email = reader.email("email", true);
        let password = reader.string("password", StringRule::required().untrimmed());
        match (email, password) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => Err(reader.into_errors()),
        }
    }
}

/// Public view of an account. The password never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
