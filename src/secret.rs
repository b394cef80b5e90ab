//! Administrator password generation

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of a generated password
pub const PASSWORD_LEN: usize = 12;

/// Generate a 12-character `[A-Za-z0-9]` password holding at least one
/// lowercase letter, one uppercase letter and one digit
///
/// Candidates that miss a class are discarded whole, so every accepted
/// password is uniform over the valid set. The thread RNG is a CSPRNG
/// seeded from the OS.
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    loop {
        let candidate: String = (0..PASSWORD_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        if meets_policy(&candidate) {
            return candidate;
        }
    }
}

/// Check the character-class policy of generated passwords
pub fn meets_policy(password: &str) -> bool {
    password.len() == PASSWORD_LEN
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}
