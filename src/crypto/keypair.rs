//! X25519 keypairs, armored key text, and the sealed-envelope scheme
//! used for per-file encryption.
//!
//! Encryption needs only the recipient's public key:
//!
//! 1. Generate an ephemeral X25519 keypair.
//! 2. Diffie-Hellman between the ephemeral secret and the recipient's
//!    public key.
//! 3. HKDF-SHA256 expands the shared secret into an AES-256-GCM key,
//!    with the info string binding both public keys to the envelope.
//! 4. The envelope carries everything the holder of the recipient secret
//!    needs to reverse the steps:
//!
//! ```text
//! [version: 1 byte][ephemeral_pub: 32 bytes][nonce: 12 bytes][ciphertext + tag]
//! ```
//!
//! Key material travels as armored text: a short scheme prefix followed
//! by standard base64, so it can live in a TEXT column or be shown to a
//! user without escaping concerns.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::crypto::encryption;
use crate::crypto::kdf::{self, Argon2Params};
use crate::errors::{CofferError, Result};

/// Armor prefix for public keys.
const PUBLIC_PREFIX: &str = "coffer-pub1:";

/// Armor prefix for secret keys.
const SECRET_PREFIX: &str = "coffer-sec1:";

/// Envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Minimum envelope size: version + ephemeral pubkey + nonce + auth tag.
const MIN_ENVELOPE_LEN: usize = 1 + 32 + encryption::NONCE_LEN + 16;

/// An X25519 keypair.
///
/// Used both for the vault's internal keypair (file encryption) and for
/// user-generated key records.
pub struct Keypair {
    pub secret: StaticSecret,
    pub public: PublicKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }
}

// ---------------------------------------------------------------------------
// Armoring
// ---------------------------------------------------------------------------

/// Encode a public key as armored text.
pub fn armor_public(key: &PublicKey) -> String {
    format!("{PUBLIC_PREFIX}{}", BASE64.encode(key.as_bytes()))
}

/// Encode a secret key as armored text.
pub fn armor_secret(key: &StaticSecret) -> String {
    format!("{SECRET_PREFIX}{}", BASE64.encode(key.as_bytes()))
}

/// Decode an armored public key.
pub fn unarmor_public(armored: &str) -> Result<PublicKey> {
    let bytes = unarmor(armored, PUBLIC_PREFIX, "public")?;
    Ok(PublicKey::from(bytes))
}

/// Decode an armored secret key.
pub fn unarmor_secret(armored: &str) -> Result<StaticSecret> {
    let mut bytes = unarmor(armored, SECRET_PREFIX, "secret")?;
    let secret = StaticSecret::from(bytes);
    bytes.zeroize();
    Ok(secret)
}

/// True when the armored text carries a public key.
pub fn is_armored_public(armored: &str) -> bool {
    armored.trim().starts_with(PUBLIC_PREFIX)
}

/// True when the armored text carries a secret key.
pub fn is_armored_secret(armored: &str) -> bool {
    armored.trim().starts_with(SECRET_PREFIX)
}

fn unarmor(armored: &str, prefix: &str, kind: &str) -> Result<[u8; 32]> {
    let trimmed = armored.trim();
    let encoded = trimmed.strip_prefix(prefix).ok_or_else(|| {
        CofferError::InvalidKeyMaterial(format!("not an armored {kind} key"))
    })?;

    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| CofferError::InvalidKeyMaterial(format!("bad {kind} key encoding: {e}")))?;

    bytes.as_slice().try_into().map_err(|_| {
        CofferError::InvalidKeyMaterial(format!(
            "{kind} key must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

// ---------------------------------------------------------------------------
// Sealed envelopes
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` so only the holder of `recipient`'s secret key can
/// read it.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    // Ephemeral keypair, used once for this envelope.
    let ephemeral = Keypair::generate();

    let shared = ephemeral.secret.diffie_hellman(recipient);
    let mut key = envelope_key(
        shared.as_bytes(),
        ephemeral.public.as_bytes(),
        recipient.as_bytes(),
    )?;

    let sealed = encryption::encrypt(&key, plaintext);
    key.zeroize();
    let sealed = sealed?;

    let mut envelope = Vec::with_capacity(1 + 32 + sealed.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(ephemeral.public.as_bytes());
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Decrypt an envelope produced by `seal`.
pub fn open(secret: &StaticSecret, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(CofferError::DecryptionFailed);
    }
    if envelope[0] != ENVELOPE_VERSION {
        return Err(CofferError::DecryptionFailed);
    }

    let ephemeral_bytes: [u8; 32] = envelope[1..33]
        .try_into()
        .map_err(|_| CofferError::DecryptionFailed)?;
    let ephemeral_public = PublicKey::from(ephemeral_bytes);
    let recipient_public = PublicKey::from(secret);

    let shared = secret.diffie_hellman(&ephemeral_public);
    let mut key = envelope_key(
        shared.as_bytes(),
        &ephemeral_bytes,
        recipient_public.as_bytes(),
    )?;

    let plaintext = encryption::decrypt(&key, &envelope[33..]);
    key.zeroize();
    plaintext
}

/// Expand a DH shared secret into the envelope's AES key.
///
/// The info string binds both public keys so an envelope cannot be
/// re-targeted at a different recipient.
fn envelope_key(
    shared_secret: &[u8],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<[u8; 32]> {
    let mut info = Vec::with_capacity(20 + 32 + 32);
    info.extend_from_slice(b"coffer-file-envelope");
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(&info, &mut okm)
        .map_err(|e| CofferError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

// ---------------------------------------------------------------------------
// Password wrapping of secret keys
// ---------------------------------------------------------------------------

/// Fixed-size prefix of a wrapped key: salt + three u32 Argon2 params.
const WRAP_PREFIX_LEN: usize = kdf::SALT_LEN + 12;

/// Encrypt an armored secret key with a password.
///
/// The output is base64 text of `salt || params || nonce || ciphertext`
/// so the wrapped key can live next to its public half in a TEXT column.
/// The Argon2 params are embedded so unwrapping never depends on the
/// current configuration.
pub fn wrap_secret_key(
    armored_secret: &str,
    password: &[u8],
    params: &Argon2Params,
) -> Result<String> {
    let salt = kdf::generate_salt();
    let mut key = kdf::derive_container_key_with_params(password, &salt, params)?;

    let sealed = encryption::encrypt(&key, armored_secret.as_bytes());
    key.zeroize();
    let sealed = sealed?;

    let mut blob = Vec::with_capacity(WRAP_PREFIX_LEN + sealed.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&params.memory_kib.to_le_bytes());
    blob.extend_from_slice(&params.iterations.to_le_bytes());
    blob.extend_from_slice(&params.parallelism.to_le_bytes());
    blob.extend_from_slice(&sealed);

    Ok(BASE64.encode(blob))
}

/// Decrypt a wrapped secret key back to its armored text.
pub fn unwrap_secret_key(wrapped: &str, password: &[u8]) -> Result<String> {
    let blob = BASE64
        .decode(wrapped.trim())
        .map_err(|e| CofferError::InvalidKeyMaterial(format!("bad wrapped key encoding: {e}")))?;

    if blob.len() < WRAP_PREFIX_LEN {
        return Err(CofferError::DecryptionFailed);
    }

    let salt = &blob[..kdf::SALT_LEN];
    let mut cursor = kdf::SALT_LEN;
    let mut next_u32 = || {
        let v = u32::from_le_bytes(blob[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;
        v
    };
    let params = Argon2Params {
        memory_kib: next_u32(),
        iterations: next_u32(),
        parallelism: next_u32(),
    };

    let mut key = kdf::derive_container_key_with_params(password, salt, &params)?;
    let plaintext = encryption::decrypt(&key, &blob[WRAP_PREFIX_LEN..]);
    key.zeroize();
    let plaintext = plaintext?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        CofferError::InvalidKeyMaterial("wrapped key is not valid UTF-8".into())
    })
}
