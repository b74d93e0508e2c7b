use rand::Rng;
use sha2::{Digest, Sha256};

/// Alphabet for the random component: letters, digits and punctuation.
const ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

fn hashed_id(random_len: usize) -> String {
    let epoch_time = chrono::Utc::now().timestamp();

    let mut rng = rand::thread_rng();
    let random_chars: String = (0..random_len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    // Wall-clock time in the input keeps collisions negligible even for
    // identical random draws.
    let unique_string = format!("uid_{}_{}", epoch_time, random_chars);

    let mut hasher = Sha256::new();
    hasher.update(unique_string.as_bytes());
    hex::encode(hasher.finalize())
}

/// Opaque identifier for files and ownership tokens (12 random chars).
pub fn generate_id() -> String {
    hashed_id(12)
}

/// Short-lived token flavor used for referral tokens (7 random chars).
pub fn generate_short_token() -> String {
    hashed_id(7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_is_fixed_length_hex() {
        let id = generate_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_short_token_same_digest_length() {
        assert_eq!(generate_short_token().len(), 64);
    }
}
