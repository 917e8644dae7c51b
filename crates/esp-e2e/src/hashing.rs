//! Identifier hashing for secret-rotation scenarios.
//!
//! Seed records may store the identifier as HMAC-SHA512 under the current
//! or previous hashing secret. Requests always carry the plaintext value.

use esp_fixtures::{SecretVersion, rewrite_identifier_fields};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha512;
use tracing::debug;

use crate::error::SecretError;
use crate::secrets::SecretVersions;

/// Lower-case hex HMAC-SHA512 of `identifier` keyed with `secret`.
#[must_use]
pub fn hash_identifier(secret: &[u8], identifier: &str) -> String {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(identifier.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Rewrite identifier fields in `items` for the scenario's secret version.
///
/// `None` and `Plaintext` leave the items untouched. Returns the number of
/// fields rewritten.
pub fn apply_secret_version(
    items: &mut [Value],
    identifier_key: &str,
    version: Option<SecretVersion>,
    secrets: Option<&SecretVersions>,
) -> Result<usize, SecretError> {
    let version = match version {
        None | Some(SecretVersion::Plaintext) => return Ok(0),
        Some(version) => version,
    };
    let secret = secrets
        .and_then(|s| s.for_version(version))
        .ok_or(SecretError::MissingVersion { version })?;

    let rewritten: usize = items
        .iter_mut()
        .map(|item| {
            rewrite_identifier_fields(item, identifier_key, |plain| {
                hash_identifier(secret, plain)
            })
        })
        .sum();
    debug!(%version, rewritten, "hashed identifiers");
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn versions() -> SecretVersions {
        SecretVersions {
            current: Some(Bytes::from_static(b"current-key")),
            previous: Some(Bytes::from_static(b"previous-key")),
        }
    }

    #[test]
    fn hash_is_hex_sha512_length() {
        let hash = hash_identifier(b"key", "9900054001");
        assert_eq!(hash.len(), 128);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, hash_identifier(b"key", "9900054001"));
        assert_ne!(hash, hash_identifier(b"other", "9900054001"));
    }

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2.
        assert_eq!(
            hash_identifier(b"Jefe", "what do ya want for nothing?"),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn plaintext_leaves_items_alone() {
        let mut items = vec![json!({"NHS_NUMBER": "1"})];
        let n = apply_secret_version(&mut items, "NHS_NUMBER", Some(SecretVersion::Plaintext), None)
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(items[0]["NHS_NUMBER"], "1");
    }

    #[test]
    fn previous_version_hashes_with_previous_secret() {
        let mut items = vec![
            json!({"NHS_NUMBER": "9900054003", "ATTRIBUTE_TYPE": "PERSON"}),
            json!({"NHS_NUMBER": "9900054003", "ATTRIBUTE_TYPE": "COHORTS"}),
        ];
        let n = apply_secret_version(
            &mut items,
            "NHS_NUMBER",
            Some(SecretVersion::Previous),
            Some(&versions()),
        )
        .unwrap();

        assert_eq!(n, 2);
        let expected = hash_identifier(b"previous-key", "9900054003");
        assert_eq!(items[0]["NHS_NUMBER"], expected.as_str());
        assert_eq!(items[1]["NHS_NUMBER"], expected.as_str());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let secrets = SecretVersions {
            current: Some(Bytes::from_static(b"k")),
            previous: None,
        };
        let err = apply_secret_version(
            &mut [json!({"NHS_NUMBER": "1"})],
            "NHS_NUMBER",
            Some(SecretVersion::Previous),
            Some(&secrets),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SecretError::MissingVersion {
                version: SecretVersion::Previous
            }
        );
    }
}
