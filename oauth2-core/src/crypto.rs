use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

use crate::error::{OAuth2Error, OAuth2Result};

/// Must match exactly on seal and unseal; a mismatched label fails
/// decryption the same way a wrong key would.
const OAEP_LABEL: &str = "OAEP Encrypted";

/// Seal a JSON-serializable payload: RSA-OAEP(SHA-256, label) encrypt, then
/// base64-standard encode.
pub fn seal<T: Serialize>(payload: &T, public_key: &RsaPublicKey) -> OAuth2Result<String> {
    let json = serde_json::to_vec(payload)
        .map_err(|err| OAuth2Error::CryptoFailure(format!("failed to serialize payload: {err}")))?;
    let padding = Oaep::new_with_label::<Sha256, _>(OAEP_LABEL);
    let mut rng = OsRng;
    let ciphertext = public_key.encrypt(&mut rng, padding, &json).map_err(|err| {
        OAuth2Error::CryptoFailure(format!("RSA-OAEP encryption failed: {err}"))
    })?;
    Ok(BASE64_STANDARD.encode(ciphertext))
}

/// Unseal a token string. Every possible failure -- malformed base64, wrong
/// key, label mismatch, malformed JSON -- collapses into the single error
/// `invalid` supplies; callers must never be able to distinguish which
/// layer failed.
pub fn unseal<T, F>(token: &str, private_key: &RsaPrivateKey, invalid: F) -> OAuth2Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> OAuth2Error,
{
    let ciphertext = BASE64_STANDARD
        .decode(token.trim())
        .map_err(|_| invalid())?;
    let padding = Oaep::new_with_label::<Sha256, _>(OAEP_LABEL);
    let plaintext = private_key
        .decrypt(padding, &ciphertext)
        .map_err(|_| invalid())?;
    serde_json::from_slice(&plaintext).map_err(|_| invalid())
}

/// Generate a CSPRNG-backed random string over the 62-character
/// alphanumeric alphabet. The source used a non-cryptographic RNG for this;
/// resolved here in favor of `OsRng`.
pub fn generate_secret(len: usize) -> String {
    OsRng
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        user_id: i64,
        note: String,
    }

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate key");
        let public_key = RsaPublicKey::from(&private_key);
        (private_key, public_key)
    }

    #[test]
    fn round_trips_payload() {
        let (private_key, public_key) = keypair();
        let payload = Payload {
            user_id: 42,
            note: "hello".into(),
        };

        let token = seal(&payload, &public_key).expect("seal");
        let recovered: Payload =
            unseal(&token, &private_key, || OAuth2Error::InvalidAccessToken).expect("unseal");

        assert_eq!(payload, recovered);
    }

    #[test]
    fn tampered_base64_is_opaque_failure() {
        let (private_key, public_key) = keypair();
        let payload = Payload {
            user_id: 1,
            note: "x".into(),
        };
        let mut token = seal(&payload, &public_key).expect("seal");
        token.push('!'); // not valid base64-standard alphabet

        let err = unseal::<Payload, _>(&token, &private_key, || OAuth2Error::InvalidAccessToken)
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidAccessToken));
    }

    #[test]
    fn wrong_key_is_opaque_failure() {
        let (_, public_key) = keypair();
        let (other_private, _) = keypair();
        let payload = Payload {
            user_id: 1,
            note: "x".into(),
        };
        let token = seal(&payload, &public_key).expect("seal");

        let err = unseal::<Payload, _>(&token, &other_private, || OAuth2Error::InvalidRefreshToken)
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidRefreshToken));
    }

    #[test]
    fn generated_secrets_use_requested_length_and_alphabet() {
        let secret = generate_secret(20);
        assert_eq!(secret.len(), 20);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_secrets_are_not_trivially_repeated() {
        let a = generate_secret(20);
        let b = generate_secret(20);
        assert_ne!(a, b);
    }
}
