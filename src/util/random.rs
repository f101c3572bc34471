//! Random helpers for secret codes and test data

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Random integer in `[min, max]`.
pub fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// Random lowercase string of length `n`.
pub fn random_string(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Random owner name.
pub fn random_owner() -> String {
    random_string(6)
}

/// Random amount of money in minor units.
pub fn random_money() -> i64 {
    random_int(0, 10_000)
}

/// Random supported currency code.
pub fn random_currency() -> String {
    let currencies = super::currency::SUPPORTED;
    currencies[rand::thread_rng().gen_range(0..currencies.len())].to_string()
}

/// Random email address.
pub fn random_email() -> String {
    format!("{}@email.com", random_string(6))
}
