//! Class rosters: join codes and name validation.

/// Join code length.
pub const JOIN_CODE_LEN: usize = 6;
/// Longest accepted class or display name.
pub const MAX_NAME_LEN: usize = 80;

// No 0/O or 1/I/L, which students mistype.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Derive a join code from a seed (creation time mixed with the professor's account id).
/// The same seed always yields the same code.
pub fn join_code(seed: u64) -> String {
    // splitmix64 finalizer spreads nearby seeds across the code space.
    let mut x = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;

    let base = ALPHABET.len() as u64;
    (0..JOIN_CODE_LEN)
        .map(|_| {
            let c = ALPHABET[(x % base) as usize] as char;
            x /= base;
            c
        })
        .collect()
}

/// Canonical form of a code typed by a student: trimmed, uppercase, with
/// spaces and dashes dropped. `None` if it cannot be a valid code.
pub fn normalize_join_code(input: &str) -> Option<String> {
    let code: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let valid = code.len() == JOIN_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b));
    valid.then_some(code)
}

/// Trimmed name, or an error message suitable for a reducer result.
pub fn validate_name(kind: &str, name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", kind));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(format!("{} is longer than {} characters", kind, MAX_NAME_LEN));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_code_shape() {
        for seed in 0..200u64 {
            let code = join_code(seed);
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert_eq!(normalize_join_code(&code), Some(code.clone()));
        }
    }

    #[test]
    fn test_join_code_deterministic_and_spread() {
        assert_eq!(join_code(42), join_code(42));
        assert_ne!(join_code(42), join_code(43));
    }

    #[test]
    fn test_normalize() {
        let code = join_code(7);
        let typed = format!(" {}-{} ", &code[..3].to_lowercase(), &code[3..]);
        assert_eq!(normalize_join_code(&typed), Some(code));
        assert_eq!(normalize_join_code("ABC"), None);
        // Ambiguous characters are never issued.
        assert_eq!(normalize_join_code("O0I1L2"), None);
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("Class name", "  Vet 101 "), Ok("Vet 101".to_string()));
        assert!(validate_name("Class name", "   ").is_err());
        assert!(validate_name("Class name", &"x".repeat(81)).is_err());
    }
}
