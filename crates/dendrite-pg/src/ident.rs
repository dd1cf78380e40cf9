//! SQL identifier quoting and validation.
//!
//! Identifiers cannot travel as positional parameters, so everything that
//! ends up in an identifier position is double-quoted here (with embedded
//! quotes doubled) and never concatenated raw. Names that are fixed at
//! store construction (table, content column, extra columns) additionally
//! go through a charset allowlist so that a misconfigured store fails
//! loudly instead of producing strange DDL.

use dendrite_core::DendriteError;

/// Quote a single identifier: `extra_stuff` becomes `"extra_stuff"`,
/// embedded double quotes are doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly dot-qualified identifier: `t.col` becomes `"t"."col"`.
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Validate a table or column name fixed at construction time.
///
/// Allows alphanumeric ASCII, underscores, and dots (for schema-qualified
/// names like `public.documents`).
pub fn validate_identifier(name: &str) -> Result<(), DendriteError> {
    if name.is_empty() {
        return Err(DendriteError::InvalidArgument(
            "identifier must not be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(DendriteError::InvalidArgument(format!(
            "invalid identifier '{name}': only alphanumeric, underscore, and dot characters are allowed",
        )));
    }
    Ok(())
}

/// Validate a SQL type declaration for an extra column (`TEXT`,
/// `INTEGER`, `varchar(32)`, …). Type names never come from query input,
/// but they are caller strings and end up in DDL, so they get the same
/// allowlist treatment plus parentheses and spaces.
pub fn validate_sql_type(sql_type: &str) -> Result<(), DendriteError> {
    if sql_type.is_empty() {
        return Err(DendriteError::InvalidArgument(
            "column type must not be empty".to_string(),
        ));
    }
    if !sql_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(' || c == ')' || c == ' ' || c == '[' || c == ']')
    {
        return Err(DendriteError::InvalidArgument(format!(
            "invalid column type '{sql_type}'",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifier() {
        assert_eq!(quote_identifier("extra_stuff"), "\"extra_stuff\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(
            quote_identifier("bad\"name"),
            "\"bad\"\"name\""
        );
    }

    #[test]
    fn quotes_injection_attempt_inert() {
        // The whole string stays inside one quoted identifier.
        let quoted = quote_identifier("extra_stuff = 'x'); DROP TABLE docs; --");
        assert_eq!(quoted, "\"extra_stuff = 'x'); DROP TABLE docs; --\"");
    }

    #[test]
    fn qualifies_dotted_names() {
        assert_eq!(quote_qualified("t.extra_stuff"), "\"t\".\"extra_stuff\"");
        assert_eq!(quote_qualified("plain"), "\"plain\"");
    }

    #[test]
    fn validate_accepts_reasonable_names() {
        assert!(validate_identifier("documents").is_ok());
        assert!(validate_identifier("public.documents").is_ok());
        assert!(validate_identifier("extra_stuff2").is_ok());
    }

    #[test]
    fn validate_rejects_sql_metacharacters() {
        assert!(validate_identifier("docs; DROP TABLE users").is_err());
        assert!(validate_identifier("docs--comment").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn validate_sql_type_accepts_parameterized_types() {
        assert!(validate_sql_type("TEXT").is_ok());
        assert!(validate_sql_type("varchar(32)").is_ok());
        assert!(validate_sql_type("double precision").is_ok());
        assert!(validate_sql_type("REAL[]").is_ok());
        assert!(validate_sql_type("TEXT; DROP TABLE x").is_err());
    }
}
