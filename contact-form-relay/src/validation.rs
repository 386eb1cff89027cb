use crate::{
    locale::Locale,
    sanitize::{sanitize, SanitizedSubmission},
    submission::ContactSubmission,
};
use lettre::Address;
use serde::Serialize;
use std::{ops::RangeInclusive, str::FromStr};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Message,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    TooShort,
    TooLong,
    InvalidCharacters,
    InvalidFormat,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid(SanitizedSubmission),
    Invalid(Vec<FieldError>),
}

/// Bounds applied to each field. Lengths count characters, not bytes, of the sanitized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub name_length: RangeInclusive<usize>,
    pub name_letters_only: bool,
    pub email_max_length: Option<usize>,
    pub message_length: RangeInclusive<usize>,
}

impl ValidationPolicy {
    pub fn standard() -> Self {
        Self {
            name_length: 2..=100,
            name_letters_only: false,
            email_max_length: Some(254),
            message_length: 10..=2000,
        }
    }

    pub fn strict() -> Self {
        Self {
            name_length: 3..=50,
            name_letters_only: true,
            email_max_length: Some(100),
            message_length: 10..=500,
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "strict" => Ok(Self::strict()),
            other => Err(format!(
                "unsupported validation profile {other}, use `standard` or `strict`"
            )),
        }
    }
}

/// A single check on a trimmed, non-empty field value. `violated` returns true when the value
/// breaks the rule.
struct Rule {
    code: ErrorCode,
    violated: fn(&str, &ValidationPolicy) -> bool,
}

const NAME_RULES: &[Rule] = &[
    Rule {
        code: ErrorCode::TooShort,
        violated: name_too_short,
    },
    Rule {
        code: ErrorCode::TooLong,
        violated: name_too_long,
    },
    Rule {
        code: ErrorCode::InvalidCharacters,
        violated: name_has_invalid_characters,
    },
];

const EMAIL_RULES: &[Rule] = &[
    Rule {
        code: ErrorCode::InvalidFormat,
        violated: email_malformed,
    },
    Rule {
        code: ErrorCode::TooLong,
        violated: email_too_long,
    },
];

const MESSAGE_RULES: &[Rule] = &[
    Rule {
        code: ErrorCode::TooShort,
        violated: message_too_short,
    },
    Rule {
        code: ErrorCode::TooLong,
        violated: message_too_long,
    },
];

fn char_count(value: &str) -> usize {
    value.chars().count()
}

fn name_too_short(value: &str, policy: &ValidationPolicy) -> bool {
    char_count(value) < *policy.name_length.start()
}

fn name_too_long(value: &str, policy: &ValidationPolicy) -> bool {
    char_count(value) > *policy.name_length.end()
}

fn name_has_invalid_characters(value: &str, policy: &ValidationPolicy) -> bool {
    policy.name_letters_only && !value.chars().all(|c| c.is_alphabetic() || c == ' ')
}

fn email_malformed(value: &str, _: &ValidationPolicy) -> bool {
    Address::from_str(value).is_err()
}

fn email_too_long(value: &str, policy: &ValidationPolicy) -> bool {
    policy
        .email_max_length
        .is_some_and(|max| char_count(value) > max)
}

fn message_too_short(value: &str, policy: &ValidationPolicy) -> bool {
    char_count(value) < *policy.message_length.start()
}

fn message_too_long(value: &str, policy: &ValidationPolicy) -> bool {
    char_count(value) > *policy.message_length.end()
}

/// Checks every field of `submission` and collects every violation. Rules see the sanitized
/// values, so a field made only of angle brackets counts as empty.
pub fn validate(
    submission: &ContactSubmission,
    policy: &ValidationPolicy,
    locale: Locale,
) -> ValidationResult {
    let sanitized = sanitize(submission);
    let mut errors = Vec::new();
    for (field, value, rules) in [
        (Field::Name, sanitized.name(), NAME_RULES),
        (Field::Email, sanitized.email(), EMAIL_RULES),
        (Field::Message, sanitized.message(), MESSAGE_RULES),
    ] {
        check_field(field, value, rules, policy, locale, &mut errors);
    }

    if errors.is_empty() {
        ValidationResult::Valid(sanitized)
    } else {
        ValidationResult::Invalid(errors)
    }
}

fn check_field(
    field: Field,
    value: &str,
    rules: &[Rule],
    policy: &ValidationPolicy,
    locale: Locale,
    errors: &mut Vec<FieldError>,
) {
    if value.is_empty() {
        errors.push(field_error(field, ErrorCode::Required, policy, locale));
        return;
    }
    errors.extend(
        rules
            .iter()
            .filter(|rule| (rule.violated)(value, policy))
            .map(|rule| field_error(field, rule.code, policy, locale)),
    );
}

fn field_error(
    field: Field,
    code: ErrorCode,
    policy: &ValidationPolicy,
    locale: Locale,
) -> FieldError {
    FieldError {
        field,
        code,
        message: describe(field, code, policy, locale),
    }
}

fn describe(field: Field, code: ErrorCode, policy: &ValidationPolicy, locale: Locale) -> String {
    let bounds = match field {
        Field::Name => Some(&policy.name_length),
        Field::Message => Some(&policy.message_length),
        Field::Email => None,
    };
    let (min, max) = match bounds {
        Some(range) => (*range.start(), *range.end()),
        None => (0, policy.email_max_length.unwrap_or_default()),
    };
    match (locale, field, code) {
        (Locale::Es, Field::Name, ErrorCode::Required) => "El nombre es obligatorio".into(),
        (Locale::Es, Field::Email, ErrorCode::Required) => "El email es obligatorio".into(),
        (Locale::Es, Field::Message, ErrorCode::Required) => "El mensaje es obligatorio".into(),
        (Locale::Es, Field::Name, ErrorCode::TooShort) => {
            format!("El nombre debe tener al menos {min} caracteres")
        }
        (Locale::Es, Field::Message, ErrorCode::TooShort) => {
            format!("El mensaje debe tener al menos {min} caracteres")
        }
        (Locale::Es, Field::Name, ErrorCode::TooLong) => {
            format!("El nombre no puede superar los {max} caracteres")
        }
        (Locale::Es, Field::Email, ErrorCode::TooLong) => {
            format!("El email no puede superar los {max} caracteres")
        }
        (Locale::Es, Field::Message, ErrorCode::TooLong) => {
            format!("El mensaje no puede superar los {max} caracteres")
        }
        (Locale::Es, _, ErrorCode::InvalidCharacters) => {
            "El nombre solo puede contener letras y espacios".into()
        }
        (Locale::Es, _, _) => "El email no es válido".into(),
        (Locale::En, Field::Name, ErrorCode::Required) => "Name is required".into(),
        (Locale::En, Field::Email, ErrorCode::Required) => "Email is required".into(),
        (Locale::En, Field::Message, ErrorCode::Required) => "Message is required".into(),
        (Locale::En, Field::Name, ErrorCode::TooShort) => {
            format!("Name must be at least {min} characters long")
        }
        (Locale::En, Field::Message, ErrorCode::TooShort) => {
            format!("Message must be at least {min} characters long")
        }
        (Locale::En, Field::Name, ErrorCode::TooLong) => {
            format!("Name must be at most {max} characters long")
        }
        (Locale::En, Field::Email, ErrorCode::TooLong) => {
            format!("Email must be at most {max} characters long")
        }
        (Locale::En, Field::Message, ErrorCode::TooLong) => {
            format!("Message must be at most {max} characters long")
        }
        (Locale::En, _, ErrorCode::InvalidCharacters) => {
            "Name may only contain letters and spaces".into()
        }
        (Locale::En, _, _) => "Email is not a valid address".into(),
    }
}
