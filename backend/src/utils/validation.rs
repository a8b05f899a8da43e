use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use validator::ValidationError;

fn course_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]{2,6}-?[0-9]{2,4}[A-Za-z]?$").expect("valid regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("valid regex"))
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{1,49}$").expect("valid regex"))
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Course codes look like `CS101`, `MATH-2010` or `BIO110L`.
pub fn validate_course_code(code: &str) -> Result<(), ValidationError> {
    if course_code_regex().is_match(code) {
        Ok(())
    } else {
        Err(invalid("course_code", "Course code must look like CS101 or MATH-2010"))
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone_regex().is_match(phone) {
        Ok(())
    } else {
        Err(invalid("phone", "Phone number contains invalid characters"))
    }
}

/// Usernames, employee ids and enrollment numbers share one shape.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if identifier_regex().is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            "identifier",
            "Must be 2-50 letters, digits, '.', '_' or '-' and start with a letter or digit",
        ))
    }
}

/// Rejects names that are empty once surrounding whitespace is trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("blank", "Must not be blank"))
    } else {
        Ok(())
    }
}

/// Normalizes a course code for storage and comparison.
pub fn normalize_course_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_codes() {
        for ok in ["CS101", "MATH-2010", "bio110l", "EE20"] {
            assert!(validate_course_code(ok).is_ok(), "{ok}");
        }
        for bad in ["", "101", "C1", "CS 101", "COMPUTING101"] {
            assert!(validate_course_code(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn phones() {
        assert!(validate_phone("+1 (555) 010-2030").is_ok());
        assert!(validate_phone("0123456789").is_ok());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("12").is_err());
    }

    #[test]
    fn identifiers() {
        assert!(validate_identifier("STU2025-0001").is_ok());
        assert!(validate_identifier("j.doe").is_ok());
        assert!(validate_identifier("-leading").is_err());
        assert!(validate_identifier("has space").is_err());
    }

    #[test]
    fn normalizes_codes() {
        assert_eq!(normalize_course_code("  cs101 "), "CS101");
    }

    #[test]
    fn blank_names_rejected() {
        assert!(validate_not_blank("Ada").is_ok());
        assert!(validate_not_blank(" Ada ").is_ok());
        for bad in ["", "   ", "\t\n"] {
            assert!(validate_not_blank(bad).is_err(), "{bad:?}");
        }
    }
}
