/// Security utilities
///
/// - `password`: bcrypt hashing, verification, strength policy
pub mod password;

pub use password::{PasswordService, PasswordStrength};
