//! Deterministic SPDX identifier minting.
//!
//! Identifiers are derived from caller-supplied seeds so that the same input
//! produces the same document across runs. The registry tracks identifiers
//! handed out for the current document and disambiguates repeats with a
//! numeric suffix.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

/// Maximum length of the human-readable slug portion of an identifier.
const SLUG_MAX: usize = 64;

/// Registry of identifiers minted for one document.
#[derive(Debug, Default)]
pub struct IdRegistry {
    seen: Mutex<HashMap<String, u64>>,
}

impl IdRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an identifier of the form `SPDXRef-<kind>-<slug>-<salt>`.
    ///
    /// The salt is the first eight hex characters of the SHA-256 over the
    /// joined seeds, so identical seeds always produce identical identifiers.
    /// When the same seeds are minted again within this registry, a `-N`
    /// suffix keeps the document-level uniqueness invariant.
    pub fn mint(&self, kind: &str, seeds: &[&str]) -> String {
        let joined = seeds.join("-");
        let digest_hex = hex::encode(Sha256::digest(joined.as_bytes()));
        let salt = &digest_hex[..8];

        let base = format!("SPDXRef-{}-{}-{}", kind, sanitize(&joined), salt);

        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            base
        } else {
            format!("{}-{}", base, *count - 1)
        }
    }
}

// SPDX identifiers may only contain letters, digits, '.' and '-'.
fn sanitize(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    cleaned.chars().take(SLUG_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_is_deterministic_across_registries() {
        let a = IdRegistry::new();
        let b = IdRegistry::new();
        assert_eq!(
            a.mint("Package", &["nginx:latest", "layer0.tar"]),
            b.mint("Package", &["nginx:latest", "layer0.tar"]),
        );
    }

    #[test]
    fn test_mint_distinct_for_distinct_seeds() {
        let ids = IdRegistry::new();
        let one = ids.mint("Package", &["image-a:1.0", "layer.tar"]);
        let two = ids.mint("Package", &["image-b:1.0", "layer.tar"]);
        assert_ne!(one, two);
    }

    #[test]
    fn test_mint_disambiguates_repeated_seeds() {
        let ids = IdRegistry::new();
        let first = ids.mint("Package", &["same"]);
        let second = ids.mint("Package", &["same"]);
        let third = ids.mint("Package", &["same"]);
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(second.starts_with(&first));
        assert!(second.ends_with("-1"));
        assert!(third.ends_with("-2"));
    }

    #[test]
    fn test_mint_sanitizes_seed_characters() {
        let ids = IdRegistry::new();
        let id = ids.mint("File", &["dir/with spaces:and@symbols"]);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'));
    }

    #[test]
    fn test_mint_truncates_long_slugs() {
        let ids = IdRegistry::new();
        let long = "x".repeat(500);
        let id = ids.mint("File", &[&long]);
        // "SPDXRef-File-" + slug + "-" + 8 char salt
        assert!(id.len() <= "SPDXRef-File-".len() + SLUG_MAX + 1 + 8);
    }
}
