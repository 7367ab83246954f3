//! Typed field validation for registration and login input.
//!
//! Each operation declares an ordered list of rules per field. Checking never
//! fails: it yields either the validated string values or every message that
//! applies, keyed by field name.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

pub const NAME_MAX_CHARS: usize = 250;
pub const EMAIL_MAX_CHARS: usize = 250;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Field name to ordered list of human-readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Fields whose values are never trimmed.
const UNTRIMMED: [&str; 2] = ["password", "password_confirmation"];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims string inputs (passwords excepted) and drops empty ones, so that a
/// blank field counts as missing.
pub fn normalize_input(input: Map<String, Value>) -> Map<String, Value> {
    input
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => {
                let s = if UNTRIMMED.contains(&key.as_str()) {
                    s
                } else {
                    s.trim().to_string()
                };
                (!s.is_empty()).then_some((key, Value::String(s)))
            }
            other => Some((key, other)),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    String,
    Email,
    MinChars(usize),
    MaxChars(usize),
    /// Value must equal the `<field>_confirmation` input.
    Confirmed,
}

enum Outcome {
    Pass,
    Fail(String),
    /// Failure that makes the remaining rules meaningless.
    Stop(String),
}

impl Rule {
    fn check(self, field: &str, value: Option<&Value>, input: &Map<String, Value>) -> Outcome {
        let text = value.and_then(Value::as_str);
        match self {
            Rule::Required => match value {
                None | Some(Value::Null) => {
                    Outcome::Stop(format!("The {field} field is required."))
                }
                Some(_) => Outcome::Pass,
            },
            Rule::String => match text {
                Some(_) => Outcome::Pass,
                None => Outcome::Stop(format!("The {field} field must be a string.")),
            },
            Rule::Email => match text {
                Some(s) if !is_valid_email(s) => {
                    Outcome::Fail(format!("The {field} field must be a valid email address."))
                }
                _ => Outcome::Pass,
            },
            Rule::MinChars(min) => match text {
                Some(s) if s.chars().count() < min => Outcome::Fail(format!(
                    "The {field} field must be at least {min} characters."
                )),
                _ => Outcome::Pass,
            },
            Rule::MaxChars(max) => match text {
                Some(s) if s.chars().count() > max => Outcome::Fail(format!(
                    "The {field} field must not be greater than {max} characters."
                )),
                _ => Outcome::Pass,
            },
            Rule::Confirmed => {
                let confirmation = input.get(&format!("{field}_confirmation"));
                if text.is_some() && confirmation.and_then(Value::as_str) == text {
                    Outcome::Pass
                } else {
                    Outcome::Fail(format!("The {field} field confirmation does not match."))
                }
            }
        }
    }
}

/// String values of every field that passed its rules.
#[derive(Debug, Default)]
pub struct Validated(BTreeMap<&'static str, String>);

impl Validated {
    pub fn take(&mut self, field: &str) -> String {
        self.0.remove(field).unwrap_or_default()
    }
}

pub struct RuleSet {
    fields: Vec<(&'static str, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, name: &'static str, rules: impl Into<Vec<Rule>>) -> Self {
        self.fields.push((name, rules.into()));
        self
    }

    pub fn register() -> Self {
        Self::new()
            .field(
                "name",
                [Rule::Required, Rule::String, Rule::MaxChars(NAME_MAX_CHARS)],
            )
            .field(
                "email",
                [
                    Rule::Required,
                    Rule::String,
                    Rule::Email,
                    Rule::MaxChars(EMAIL_MAX_CHARS),
                ],
            )
            .field(
                "password",
                [
                    Rule::Required,
                    Rule::String,
                    Rule::MinChars(PASSWORD_MIN_CHARS),
                    Rule::Confirmed,
                ],
            )
    }

    pub fn login() -> Self {
        Self::new()
            .field("email", [Rule::Required, Rule::String, Rule::Email])
            .field("password", [Rule::Required, Rule::String])
    }

    /// Runs every field's rules. Fields that pass are collected into `Validated`.
    pub fn check(&self, input: &Map<String, Value>) -> (Validated, FieldErrors) {
        let mut validated = Validated::default();
        let mut errors = FieldErrors::new();

        for (field, rules) in &self.fields {
            let value = input.get(*field);
            let absent = matches!(value, None | Some(Value::Null));
            if absent && !rules.contains(&Rule::Required) {
                continue;
            }
            let mut messages = Vec::new();
            for rule in rules {
                match rule.check(field, value, input) {
                    Outcome::Pass => {}
                    Outcome::Fail(msg) => messages.push(msg),
                    Outcome::Stop(msg) => {
                        messages.push(msg);
                        break;
                    }
                }
            }
            if messages.is_empty() {
                if let Some(s) = value.and_then(Value::as_str) {
                    validated.0.insert(*field, s.to_string());
                }
            } else {
                errors.insert(field.to_string(), messages);
            }
        }

        (validated, errors)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCredentials {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

pub const EMAIL_TAKEN: &str = "The email has already been taken.";

/// Result of the synchronous registration rules. The uniqueness check needs the
/// account store, so the caller runs it and merges its verdict before `finish`.
#[derive(Debug)]
pub struct RegisterCheck {
    /// Normalized email, present only when it passed its own rules.
    pub email: Option<String>,
    validated: Validated,
    errors: FieldErrors,
}

impl RegisterCheck {
    pub fn reject_email_taken(&mut self) {
        self.errors
            .entry("email".to_string())
            .or_default()
            .push(EMAIL_TAKEN.to_string());
    }

    pub fn finish(mut self) -> Result<RegisterCredentials, FieldErrors> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        Ok(RegisterCredentials {
            name: self.validated.take("name"),
            email: self.email.unwrap_or_default(),
            password: self.validated.take("password"),
        })
    }
}

/// Emails are compared and stored lowercased, so length rules must see that form.
fn lowercase_email(input: &Map<String, Value>) -> Map<String, Value> {
    let mut input = input.clone();
    if let Some(Value::String(email)) = input.get_mut("email") {
        *email = email.to_lowercase();
    }
    input
}

pub fn check_register(input: &Map<String, Value>) -> RegisterCheck {
    let (mut validated, errors) = RuleSet::register().check(&lowercase_email(input));
    let email = (!errors.contains_key("email")).then(|| validated.take("email"));
    RegisterCheck {
        email,
        validated,
        errors,
    }
}

pub fn validate_login(input: &Map<String, Value>) -> Result<LoginCredentials, FieldErrors> {
    let (mut validated, errors) = RuleSet::login().check(&lowercase_email(input));
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(LoginCredentials {
        email: validated.take("email"),
        password: validated.take("password"),
    })
}
