//! One-time passcodes for email verification.
//!
//! Codes are compared in constant time to mitigate timing attacks.

use rand::Rng;
use subtle::ConstantTimeEq;

/// Generate a random 4-digit OTP.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Generate a random 6-digit OTP.
pub fn generate_otp_6_digit() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Check a code entered by the user against the one that was issued.
pub fn verify_otp(provided: &str, expected: &str) -> bool {
    constant_time_compare(provided.trim(), expected)
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
