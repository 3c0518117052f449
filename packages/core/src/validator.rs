//! §4.1 Identifier Validator — gates every table/column name before it is
//! embedded literally into generated SQL. Every builder in `query/` routes
//! names through here before doing a schema lookup.

use crate::error::GatewayError;

const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Non-empty; length ≤ 128; first character a letter or underscore;
/// subsequent characters letters, digits, or underscores.
pub fn validate_identifier(name: &str) -> Result<&str, GatewayError> {
    if name.is_empty() {
        return Err(GatewayError::EmptyIdentifier);
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(GatewayError::IdentifierTooLong {
            name: name.to_string(),
            max: MAX_IDENTIFIER_LENGTH,
        });
    }

    let mut chars = name.chars();
    let first = chars.next().expect("checked non-empty above");
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(GatewayError::InvalidCharacter {
            name: name.to_string(),
            ch: first,
        });
    }
    for ch in chars {
        if !(ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(GatewayError::InvalidCharacter {
                name: name.to_string(),
                ch,
            });
        }
    }

    Ok(name)
}

/// Accepts only statements whose first whitespace-delimited token
/// (case-insensitive) is CREATE, ALTER, or DROP.
pub fn validate_ddl_query(sql: &str) -> Result<&str, GatewayError> {
    let first_token = sql
        .split_whitespace()
        .next()
        .ok_or_else(|| GatewayError::NotDdlQuery(sql.to_string()))?;

    match first_token.to_ascii_uppercase().as_str() {
        "CREATE" | "ALTER" | "DROP" => Ok(sql),
        _ => Err(GatewayError::NotDdlQuery(sql.to_string())),
    }
}

/// Wraps a validated identifier in `[...]` brackets for SQL emission.
/// Callers must validate first; this is pure quoting, not a safety gate.
pub fn bracket(identifier: &str) -> String {
    format!("[{identifier}]")
}

/// SQL-escapes a string for use as a quoted literal (single quotes doubled).
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normal_identifiers() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_internal").is_ok());
        assert!(validate_identifier("user_id_2").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            validate_identifier(""),
            Err(GatewayError::EmptyIdentifier)
        ));
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(129);
        assert!(matches!(
            validate_identifier(&long),
            Err(GatewayError::IdentifierTooLong { .. })
        ));
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(matches!(
            validate_identifier("1table"),
            Err(GatewayError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn rejects_embedded_punctuation() {
        assert!(matches!(
            validate_identifier("users;DROP"),
            Err(GatewayError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn ddl_validator_accepts_only_create_alter_drop() {
        assert!(validate_ddl_query("CREATE TABLE foo (id INTEGER)").is_ok());
        assert!(validate_ddl_query("alter table foo add column bar").is_ok());
        assert!(validate_ddl_query("DROP TABLE foo").is_ok());
        assert!(validate_ddl_query("SELECT * FROM foo").is_err());
        assert!(validate_ddl_query("").is_err());
    }
}
