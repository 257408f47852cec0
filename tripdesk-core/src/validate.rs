use crate::{CoreError, CoreResult};

pub(crate) fn required(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn email(field: &str, value: &str) -> CoreResult<()> {
    required(field, value)?;

    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(CoreError::ValidationError(format!("{} is not a valid email address", field)));
    }
    Ok(())
}

pub(crate) fn phone(field: &str, value: &str) -> CoreResult<()> {
    required(field, value)?;

    let allowed = value.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if !allowed || !(7..=15).contains(&digits) {
        return Err(CoreError::ValidationError(format!("{} is not a valid phone number", field)));
    }
    Ok(())
}

pub(crate) fn non_negative(field: &str, value: f64) -> CoreResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::ValidationError(format!("{} must be zero or more", field)));
    }
    Ok(())
}

/// Form submissions send blank strings for untouched optional fields.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rules() {
        assert!(email("email", "x@y.com").is_ok());
        assert!(email("email", "agent.one@travel.co.in").is_ok());
        assert!(email("email", "").is_err());
        assert!(email("email", "no-at-sign.com").is_err());
        assert!(email("email", "a@b").is_err());
        assert!(email("email", "a b@c.com").is_err());
        assert!(email("email", "a@@c.com").is_err());
    }

    #[test]
    fn test_phone_rules() {
        assert!(phone("phone", "+91 98765 43210").is_ok());
        assert!(phone("phone", "022-2345678").is_ok());
        assert!(phone("phone", "12345").is_err());
        assert!(phone("phone", "call me").is_err());
    }

    #[test]
    fn test_optional_drops_blank_strings() {
        assert_eq!(optional(Some("  ".to_string())), None);
        assert_eq!(optional(Some(" Pune ".to_string())), Some("Pune".to_string()));
        assert_eq!(optional(None), None);
    }
}
