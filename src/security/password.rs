/// Password hashing and verification using bcrypt
use crate::error::{AuthError, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Substrings that fail the strength policy regardless of composition
const DENIED_SEQUENCES: [&str; 5] = ["123", "abc", "qwe", "asd", "zxc"];

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SPECIAL: &str = "@$!%*?&";

/// Result of the advisory strength check
#[derive(Debug, Clone)]
pub struct PasswordStrength {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Hashes and verifies user passwords.
///
/// The cost factor is fixed at construction; verification works against any
/// stored hash regardless of the cost it was created with.
#[derive(Debug, Clone)]
pub struct PasswordService {
    cost: u32,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self { cost: 12 }
    }
}

impl PasswordService {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with a per-password random salt.
    ///
    /// Only primitive-level failures (RNG exhaustion, cost out of range)
    /// surface as errors; they map to `AuthError::HashingFailure`.
    pub fn hash(&self, password: &str) -> Result<String> {
        let hash = bcrypt::hash(password, self.cost)?;
        tracing::debug!("password hash generated");
        Ok(hash)
    }

    /// Verify a password against its stored hash.
    ///
    /// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
    pub fn verify(&self, password: &str, password_hash: &str) -> Result<bool> {
        let valid = bcrypt::verify(password, password_hash)?;
        Ok(valid)
    }

    /// Advisory strength policy, independent of hashing.
    ///
    /// Requires length >= 8, all four character classes, no trivial keyboard
    /// sequences, and a mix of upper and lower case.
    pub fn check_strength(&self, password: &str) -> PasswordStrength {
        let mut violations = Vec::new();

        if password.len() < 8 {
            violations.push("Password must be at least 8 characters".to_string());
        }

        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push("Password must contain at least one lowercase letter".to_string());
        }

        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push("Password must contain at least one uppercase letter".to_string());
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("Password must contain at least one digit".to_string());
        }

        if !password.chars().any(|c| SPECIAL.contains(c)) {
            violations.push(format!(
                "Password must contain at least one special character ({SPECIAL})"
            ));
        }

        let lowered = password.to_lowercase();
        if DENIED_SEQUENCES.iter().any(|seq| lowered.contains(seq)) {
            violations.push("Password must not contain common sequences".to_string());
        }

        if password == password.to_lowercase() || password == password.to_uppercase() {
            violations.push("Password must mix uppercase and lowercase letters".to_string());
        }

        PasswordStrength {
            valid: violations.is_empty(),
            violations,
        }
    }

    /// Generate a random password that satisfies `check_strength`.
    ///
    /// One character from each required class is seeded first, the rest is
    /// filled from the full charset, then the whole thing is shuffled so the
    /// class characters don't sit at fixed positions.
    pub fn generate_random(&self, length: usize) -> String {
        let length = length.max(8);
        let mut rng = rand::thread_rng();
        let charset: Vec<char> = format!("{LOWERCASE}{UPPERCASE}{DIGITS}{SPECIAL}")
            .chars()
            .collect();

        let mut chars: Vec<char> = vec![
            pick(&mut rng, LOWERCASE),
            pick(&mut rng, UPPERCASE),
            pick(&mut rng, DIGITS),
            pick(&mut rng, SPECIAL),
        ];

        while chars.len() < length {
            chars.push(charset[rng.gen_range(0..charset.len())]);
            // Filling randomly can still produce a denied sequence; rather
            // than re-rolling the tail character by character, retry the
            // whole password below.
        }

        chars.shuffle(&mut rng);
        let candidate: String = chars.into_iter().collect();

        if self.check_strength(&candidate).valid {
            candidate
        } else {
            self.generate_random(length)
        }
    }
}

fn pick(rng: &mut impl Rng, set: &str) -> char {
    let chars: Vec<char> = set.chars().collect();
    chars[rng.gen_range(0..chars.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        // Cost 4 keeps the test fast; the policy under test is identical
        let service = PasswordService::new(4);
        let hash = service.hash("Secret123!").expect("should hash");
        assert!(service.verify("Secret123!", &hash).expect("should verify"));
        assert!(!service.verify("Wrong123!", &hash).expect("should verify"));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let service = PasswordService::new(4);
        let hash1 = service.hash("Secret123!").unwrap();
        let hash2 = service.hash("Secret123!").unwrap();
        // Different salts should produce different hashes
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_malformed_hash_is_error() {
        let service = PasswordService::default();
        assert!(matches!(
            service.verify("Secret123!", "not-a-bcrypt-hash"),
            Err(AuthError::HashingFailure(_))
        ));
    }

    #[test]
    fn test_strength_missing_special_character() {
        let service = PasswordService::default();
        let report = service.check_strength("Password1");
        assert!(!report.valid);
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("special character")));
    }

    #[test]
    fn test_strength_valid_password() {
        let service = PasswordService::default();
        let report = service.check_strength("Test147!@#");
        assert!(report.valid, "violations: {:?}", report.violations);
    }

    #[test]
    fn test_strength_denied_sequence() {
        let service = PasswordService::default();
        let report = service.check_strength("Qwe!Pass77");
        assert!(!report.valid);
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("common sequences")));
    }

    #[test]
    fn test_strength_all_one_case() {
        let service = PasswordService::default();
        let report = service.check_strength("lowercase9!");
        assert!(!report.valid);
    }

    #[test]
    fn test_strength_too_short() {
        let service = PasswordService::default();
        let report = service.check_strength("Ab1!");
        assert!(!report.valid);
        assert!(report.violations.iter().any(|v| v.contains("8 characters")));
    }

    #[test]
    fn test_generated_password_satisfies_policy() {
        let service = PasswordService::default();
        for _ in 0..20 {
            let password = service.generate_random(12);
            assert_eq!(password.len(), 12);
            let report = service.check_strength(&password);
            assert!(report.valid, "violations: {:?}", report.violations);
        }
    }

    #[test]
    fn test_generated_password_minimum_length() {
        let service = PasswordService::default();
        // Below the policy minimum the generator clamps up to 8
        assert_eq!(service.generate_random(4).len(), 8);
    }
}
