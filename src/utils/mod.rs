//! Utility functions and helpers

use crate::errors::{BrokerError, Result};
use rand::Rng;
use regex::Regex;

/// Regex for SQL identifiers the broker splices into DDL.
/// Lowercase only, so Postgres case folding never changes the name.
pub static VALID_IDENTIFIER_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").unwrap());

const IDENTIFIER_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the random part of generated database and role names
pub const IDENTIFIER_RANDOM_LEN: usize = 15;

/// Length of generated instance passwords
pub const PASSWORD_LEN: usize = 25;

fn random_from(charset: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| charset[rng.gen_range(0..charset.len())] as char).collect()
}

/// Random identifier such as `db3k9x...`: `prefix` followed by 15 lowercase alphanumerics
pub fn random_identifier(prefix: &str) -> String {
    format!("{}{}", prefix, random_from(IDENTIFIER_CHARSET, IDENTIFIER_RANDOM_LEN))
}

/// Random 25-character alphanumeric password
pub fn random_password() -> String {
    random_from(PASSWORD_CHARSET, PASSWORD_LEN)
}

/// Reject anything that is not a plain lowercase SQL identifier
pub fn validate_identifier(value: &str, field: &str) -> Result<()> {
    if VALID_IDENTIFIER_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(BrokerError::validation_field(
            format!("'{}' is not a valid SQL identifier", value),
            field,
        ))
    }
}

/// Quote a string as a SQL literal by doubling single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
