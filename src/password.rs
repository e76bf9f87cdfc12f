//! Password verification and hashing.
//!
//! bcrypt is the current scheme. Hashes written by older tooling (`{MD5}`,
//! `{SHA}` and `{SSHA}`, as produced by `slappasswd`) still verify, but report
//! `needs_rehash` so the caller can replace them after a successful bind.

use base64ct::{Base64, Encoding};
use md5::Md5;
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const DEFAULT_BCRYPT_COST: u32 = 10;

const SHA1_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("could not identify password hash type")]
    UnknownScheme,

    #[error("malformed {0} password hash")]
    Malformed(&'static str),

    #[error("bcrypt cost must be between 4 and 31, got {0}")]
    InvalidCost(u32),

    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bcrypt,
    Md5,
    Sha1,
    SaltedSha1,
}

impl Scheme {
    /// Identify the scheme from the stored hash prefix.
    #[must_use]
    pub fn detect(stored: &str) -> Option<Self> {
        if stored.starts_with("$2a$") || stored.starts_with("$2b$") || stored.starts_with("$2y$")
        {
            Some(Self::Bcrypt)
        } else if stored.starts_with("{MD5}") {
            Some(Self::Md5)
        } else if stored.starts_with("{SHA}") {
            Some(Self::Sha1)
        } else if stored.starts_with("{SSHA}") {
            Some(Self::SaltedSha1)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn is_legacy(self) -> bool {
        !matches!(self, Self::Bcrypt)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Bcrypt => "bcrypt",
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA",
            Self::SaltedSha1 => "SSHA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// Only meaningful when `valid`: the stored hash uses a legacy scheme.
    pub needs_rehash: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hasher {
    cost: u32,
}

impl Default for Hasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl Hasher {
    /// # Errors
    /// Returns [`PasswordError::InvalidCost`] when the cost is outside bcrypt's range.
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        if !(4..=31).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Check `plaintext` against `stored`.
    ///
    /// # Errors
    /// Returns an error if the stored hash is of an unknown scheme or cannot be decoded.
    pub fn verify(
        &self,
        plaintext: &SecretString,
        stored: &SecretString,
    ) -> Result<Verification, PasswordError> {
        let stored = stored.expose_secret();
        let password = plaintext.expose_secret().as_bytes();
        let scheme = Scheme::detect(stored).ok_or(PasswordError::UnknownScheme)?;

        let valid = match scheme {
            Scheme::Bcrypt => bcrypt::verify(password, stored)?,
            Scheme::Md5 => {
                let expected = decode(scheme, &stored["{MD5}".len()..])?;
                digest_eq(&Md5::digest(password), &expected, scheme)?
            }
            Scheme::Sha1 => {
                let expected = decode(scheme, &stored["{SHA}".len()..])?;
                digest_eq(&Sha1::digest(password), &expected, scheme)?
            }
            Scheme::SaltedSha1 => {
                let data = decode(scheme, &stored["{SSHA}".len()..])?;
                if data.len() <= SHA1_LEN {
                    return Err(PasswordError::Malformed(scheme.label()));
                }
                let (expected, salt) = data.split_at(SHA1_LEN);
                let mut sha = Sha1::new();
                sha.update(password);
                sha.update(salt);
                digest_eq(&sha.finalize(), expected, scheme)?
            }
        };

        Ok(Verification {
            valid,
            needs_rehash: valid && scheme.is_legacy(),
        })
    }

    /// Hash with the current scheme, in the `$2a$` form the other consumers of
    /// the store recognise.
    ///
    /// # Errors
    /// Returns an error if bcrypt fails.
    pub fn hash(&self, plaintext: &SecretString) -> Result<String, PasswordError> {
        let parts = bcrypt::hash_with_result(plaintext.expose_secret(), self.cost)?;
        Ok(parts.format_for_version(bcrypt::Version::TwoA))
    }
}

fn decode(scheme: Scheme, encoded: &str) -> Result<Vec<u8>, PasswordError> {
    if encoded.is_empty() {
        return Err(PasswordError::Malformed(scheme.label()));
    }
    Base64::decode_vec(encoded).map_err(|_| PasswordError::Malformed(scheme.label()))
}

fn digest_eq(computed: &[u8], expected: &[u8], scheme: Scheme) -> Result<bool, PasswordError> {
    if computed.len() != expected.len() {
        return Err(PasswordError::Malformed(scheme.label()));
    }
    Ok(computed.ct_eq(expected).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn legacy(prefix: &str, digest: &[u8]) -> SecretString {
        secret(&format!("{prefix}{}", Base64::encode_string(digest)))
    }

    fn hasher() -> Hasher {
        Hasher::new(4).unwrap()
    }

    #[test]
    fn test_detect() {
        assert_eq!(Scheme::detect("$2a$10$abc"), Some(Scheme::Bcrypt));
        assert_eq!(Scheme::detect("$2b$10$abc"), Some(Scheme::Bcrypt));
        assert_eq!(Scheme::detect("$2y$10$abc"), Some(Scheme::Bcrypt));
        assert_eq!(Scheme::detect("{MD5}abc"), Some(Scheme::Md5));
        assert_eq!(Scheme::detect("{SHA}abc"), Some(Scheme::Sha1));
        assert_eq!(Scheme::detect("{SSHA}abc"), Some(Scheme::SaltedSha1));
        assert_eq!(Scheme::detect("-"), None);
        assert_eq!(Scheme::detect(""), None);
    }

    #[test]
    fn test_bcrypt_is_current() {
        let hasher = hasher();
        let hash = hasher.hash(&secret("secret")).unwrap();
        assert!(hash.starts_with("$2a$04$"), "{hash}");

        let ok = hasher.verify(&secret("secret"), &secret(&hash)).unwrap();
        assert_eq!(
            ok,
            Verification {
                valid: true,
                needs_rehash: false
            }
        );

        let bad = hasher.verify(&secret("wrong"), &secret(&hash)).unwrap();
        assert!(!bad.valid);
        assert!(!bad.needs_rehash);
    }

    #[test]
    fn test_md5_legacy() {
        let stored = legacy("{MD5}", &Md5::digest(b"secret"));
        let ok = hasher().verify(&secret("secret"), &stored).unwrap();
        assert!(ok.valid);
        assert!(ok.needs_rehash);

        let bad = hasher().verify(&secret("Secret"), &stored).unwrap();
        assert!(!bad.valid);
        assert!(!bad.needs_rehash);
    }

    #[test]
    fn test_sha_legacy() {
        let stored = legacy("{SHA}", &Sha1::digest(b"secret"));
        let ok = hasher().verify(&secret("secret"), &stored).unwrap();
        assert!(ok.valid);
        assert!(ok.needs_rehash);
        assert!(!hasher().verify(&secret("nope"), &stored).unwrap().valid);
    }

    #[test]
    fn test_ssha_legacy() {
        let salt = b"pepper";
        let mut sha = Sha1::new();
        sha.update(b"secret");
        sha.update(salt);
        let mut payload = sha.finalize().to_vec();
        payload.extend_from_slice(salt);
        let stored = legacy("{SSHA}", &payload);

        let ok = hasher().verify(&secret("secret"), &stored).unwrap();
        assert!(ok.valid);
        assert!(ok.needs_rehash);
        assert!(!hasher().verify(&secret("secrets"), &stored).unwrap().valid);
    }

    #[test]
    fn test_malformed_hashes() {
        let hasher = hasher();
        assert!(matches!(
            hasher.verify(&secret("x"), &secret("plaintext")),
            Err(PasswordError::UnknownScheme)
        ));
        assert!(matches!(
            hasher.verify(&secret("x"), &secret("{MD5}")),
            Err(PasswordError::Malformed("MD5"))
        ));
        assert!(matches!(
            hasher.verify(&secret("x"), &secret("{SHA}!!!")),
            Err(PasswordError::Malformed("SHA"))
        ));
        // digest only, no salt
        let short = legacy("{SSHA}", &Sha1::digest(b"x"));
        assert!(matches!(
            hasher.verify(&secret("x"), &short),
            Err(PasswordError::Malformed("SSHA"))
        ));
    }

    #[test]
    fn test_invalid_cost() {
        assert!(matches!(Hasher::new(3), Err(PasswordError::InvalidCost(3))));
        assert!(matches!(
            Hasher::new(32),
            Err(PasswordError::InvalidCost(32))
        ));
        assert_eq!(Hasher::default().cost(), DEFAULT_BCRYPT_COST);
    }
}
