//! Random password generation.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length used when the caller asks for a generated password without one.
pub const DEFAULT_LENGTH: usize = 20;

/// Draw `length` characters uniformly from `[A-Za-z0-9]` using the OS RNG.
pub fn generate(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_length_and_alphabet() {
        for length in [0, 1, 12, DEFAULT_LENGTH, 512] {
            let password = generate(length);
            assert_eq!(password.len(), length);
            assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn consecutive_passwords_differ() {
        assert_ne!(generate(DEFAULT_LENGTH), generate(DEFAULT_LENGTH));
    }
}
