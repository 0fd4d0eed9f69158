use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

use crate::error::{OAuth2Error, OAuth2Result};

const KEY_BITS: usize = 2048;
const PRIVATE_KEY_FILE: &str = "private.pem";
const PUBLIC_KEY_FILE: &str = "public.pem";

/// The PEM header is `RSA PUBLIC KEY` but the bytes underneath are PKIX
/// SubjectPublicKeyInfo, not PKCS#1 -- this mismatch is non-standard but
/// preserved deliberately for compatibility with existing deployments.
const PUBLIC_KEY_PEM_LABEL: &str = "RSA PUBLIC KEY";

/// The RSA keypair used to seal and unseal token payloads. Generated once
/// and reused; there is no rotation protocol.
#[derive(Clone)]
pub struct KeyMaterial {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyMaterial {
    /// Probe `dir` for `public.pem`/`private.pem`; load them if both exist,
    /// otherwise generate a fresh 2048-bit keypair and persist it there.
    pub fn load_or_generate(dir: &Path) -> OAuth2Result<Self> {
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        if private_path.exists() && public_path.exists() {
            return Self::load(&private_path, &public_path);
        }

        info!(dir = %dir.display(), "generating new RSA keypair for token sealing");
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to generate RSA keypair: {err}"))
        })?;
        let public_key = RsaPublicKey::from(&private_key);

        Self::persist(&private_key, &public_key, &private_path, &public_path)?;

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Re-read both PEM files from `dir`, failing if either is missing or
    /// malformed. Used by callers that want to force a reload rather than
    /// trust the in-memory copy (the core itself does not need this -- a
    /// plain field populated once at construction time is sufficient).
    pub fn reload(dir: &Path) -> OAuth2Result<Self> {
        Self::load(&dir.join(PRIVATE_KEY_FILE), &dir.join(PUBLIC_KEY_FILE))
    }

    fn load(private_path: &Path, public_path: &Path) -> OAuth2Result<Self> {
        let private_pem = fs::read_to_string(private_path).map_err(|err| {
            OAuth2Error::CryptoFailure(format!(
                "failed to read {}: {err}",
                private_path.display()
            ))
        })?;
        let private_key = RsaPrivateKey::from_pkcs1_pem(&private_pem).map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to parse private key: {err}"))
        })?;

        let public_bytes = fs::read(public_path).map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to read {}: {err}", public_path.display()))
        })?;
        let parsed = pem::parse(&public_bytes).map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to parse public key PEM: {err}"))
        })?;
        let public_key = RsaPublicKey::from_public_key_der(parsed.contents()).map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to decode public key: {err}"))
        })?;

        Ok(Self {
            private_key,
            public_key,
        })
    }

    fn persist(
        private_key: &RsaPrivateKey,
        public_key: &RsaPublicKey,
        private_path: &Path,
        public_path: &Path,
    ) -> OAuth2Result<()> {
        let private_pem = private_key.to_pkcs1_pem(LineEnding::LF).map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to encode private key: {err}"))
        })?;
        fs::write(private_path, private_pem.as_bytes()).map_err(|err| {
            OAuth2Error::CryptoFailure(format!(
                "failed to write {}: {err}",
                private_path.display()
            ))
        })?;

        let der = public_key.to_public_key_der().map_err(|err| {
            OAuth2Error::CryptoFailure(format!("failed to encode public key: {err}"))
        })?;
        let block = pem::Pem::new(PUBLIC_KEY_PEM_LABEL, der.as_bytes().to_vec());
        let encoded = pem::encode(&block);
        fs::write(public_path, encoded.as_bytes()).map_err(|err| {
            OAuth2Error::CryptoFailure(format!(
                "failed to write {}: {err}",
                public_path.display()
            ))
        })?;

        Ok(())
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

/// Default key directory used by [`crate::store::TokenStore::new`]: the
/// current working directory, matching the source's bare `"public.pem"` /
/// `"private.pem"` relative paths.
pub fn default_key_dir() -> PathBuf {
    PathBuf::from(".")
}
