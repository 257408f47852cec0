//! Agent codes, booking references and temporary passwords.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use tripdesk_shared::Masked;

pub const AGENT_CODE_PREFIX: &str = "AGT-";
pub const BOOKING_REFERENCE_PREFIX: &str = "BK";
pub const TEMPORARY_PASSWORD_LENGTH: usize = 12;

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnpqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%&*?";

/// `AGT-` followed by six digits, never starting with zero.
pub fn generate_agent_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}{}", AGENT_CODE_PREFIX, rng.gen_range(100_000..=999_999))
}

pub fn is_agent_code(code: &str) -> bool {
    code.strip_prefix(AGENT_CODE_PREFIX)
        .map(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// `BK` + departure-independent issue date + four digits, e.g. `BK202612010042`.
pub fn generate_booking_reference<R: Rng + ?Sized>(rng: &mut R, issued_on: NaiveDate) -> String {
    format!(
        "{}{}{:04}",
        BOOKING_REFERENCE_PREFIX,
        issued_on.format("%Y%m%d"),
        rng.gen_range(0..10_000)
    )
}

/// A temporary password with at least one character from every class.
///
/// Visually ambiguous characters (0/O, 1/l/I) are left out since the password is read from an email.
pub fn generate_temporary_password<R: Rng + ?Sized>(rng: &mut R) -> Masked<String> {
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = Vec::with_capacity(TEMPORARY_PASSWORD_LENGTH);
    for class in classes {
        if let Some(c) = class.choose(rng) {
            chars.push(*c);
        }
    }

    while chars.len() < TEMPORARY_PASSWORD_LENGTH {
        if let Some(c) = all.choose(rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(rng);

    Masked(chars.into_iter().map(char::from).collect())
}

/// Minimum complexity: 8+ characters covering upper, lower, digit and symbol classes.
pub fn satisfies_password_policy(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_code_format() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let code = generate_agent_code(&mut rng);
            assert!(is_agent_code(&code), "bad code {}", code);
            assert!(!code.starts_with("AGT-0"));
        }

        assert!(!is_agent_code("AGT123456"));
        assert!(!is_agent_code("AGT-12345"));
        assert!(!is_agent_code("AGT-12345a"));
    }

    #[test]
    fn test_temporary_password_policy() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let password = generate_temporary_password(&mut rng);
            assert_eq!(password.expose().len(), TEMPORARY_PASSWORD_LENGTH);
            assert!(satisfies_password_policy(password.expose()));
            assert!(!password.expose().contains(['0', 'O', '1', 'l', 'I']));
        }
    }

    #[test]
    fn test_password_policy_rejections() {
        assert!(!satisfies_password_policy("Ab1!"));
        assert!(!satisfies_password_policy("abcdefg1!"));
        assert!(!satisfies_password_policy("ABCDEFG1!"));
        assert!(!satisfies_password_policy("Abcdefgh!"));
        assert!(!satisfies_password_policy("Abcdefgh1"));
        assert!(satisfies_password_policy("Phe@12345"));
    }

    #[test]
    fn test_booking_reference_format() {
        let mut rng = rand::thread_rng();
        let day = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        let reference = generate_booking_reference(&mut rng, day);

        assert!(reference.starts_with("BK20261201"));
        assert_eq!(reference.len(), 14);
    }
}
