//! Key custodian.
//!
//! Owns the vault's internal keypair: generated once at vault creation,
//! public half stored armored, private half wrapped with the master
//! password, both inside the auth record.  The keypair is purely a
//! container-internal encryption mechanism — it is bound to a fixed
//! internal identity and never surfaces in the user's key records.
//!
//! The user-facing key features live here too: generating named
//! keypairs, importing armored material, exporting a record, and
//! encrypting/decrypting text with a stored key.

use std::fs;
use std::path::Path;

use zeroize::Zeroize;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::kdf::Argon2Params;
use crate::crypto::keypair::{
    self, armor_public, armor_secret, is_armored_public, is_armored_secret, unarmor_public,
    unarmor_secret, Keypair,
};
use crate::errors::{CofferError, Result};
use crate::store::{KeyKind, MetadataStore};

/// Fixed identity of every vault's internal keypair.
const VAULT_KEY_IDENTITY: &str = "coffer vault keypair <vault@coffer.local>";

/// Armor prefix for encrypted text messages.
const MESSAGE_PREFIX: &str = "coffer-msg1:";

/// The vault's internal keypair, unwrapped and ready for file
/// encryption.
pub struct VaultKeys {
    pub public: PublicKey,
    pub secret: StaticSecret,
}

impl VaultKeys {
    /// The identity the vault keypair is bound to.
    pub fn identity() -> &'static str {
        VAULT_KEY_IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Vault keypair lifecycle
// ---------------------------------------------------------------------------

/// Generate the vault keypair and persist both halves in the auth
/// record: public armored as-is, private wrapped with the master
/// password.
pub fn establish(
    store: &MetadataStore,
    master_password: &str,
    params: &Argon2Params,
) -> Result<VaultKeys> {
    let pair = Keypair::generate();

    let mut armored_secret = armor_secret(&pair.secret);
    let wrapped = keypair::wrap_secret_key(&armored_secret, master_password.as_bytes(), params);
    armored_secret.zeroize();
    let wrapped = wrapped?;

    store.set_vault_keys(&armor_public(&pair.public), &wrapped)?;

    Ok(VaultKeys {
        public: pair.public,
        secret: pair.secret,
    })
}

/// Reload the vault keypair from the auth record, unwrapping the
/// private half with the master password.
///
/// This runs after the container layer has already accepted the
/// password, so any failure here means the store contents are damaged —
/// `KeyDecryptionError` is fatal and non-retryable, never a
/// wrong-password signal.
pub fn load(store: &MetadataStore, master_password: &str) -> Result<VaultKeys> {
    let auth = store.auth_record()?;

    let (public_armored, private_wrapped) = match (auth.vault_public_key, auth.vault_private_key) {
        (Some(public), Some(private)) => (public, private),
        _ => return Err(CofferError::KeyDecryptionError),
    };

    let public = unarmor_public(&public_armored).map_err(|_| CofferError::KeyDecryptionError)?;

    let mut armored_secret =
        keypair::unwrap_secret_key(&private_wrapped, master_password.as_bytes())
            .map_err(|_| CofferError::KeyDecryptionError)?;
    let secret = unarmor_secret(&armored_secret).map_err(|_| CofferError::KeyDecryptionError);
    armored_secret.zeroize();
    let secret = secret?;

    // The halves must actually belong together.
    if PublicKey::from(&secret) != public {
        return Err(CofferError::KeyDecryptionError);
    }

    Ok(VaultKeys { public, secret })
}

// ---------------------------------------------------------------------------
// User-facing key records
// ---------------------------------------------------------------------------

/// Generate a named user keypair and store both halves as key records.
///
/// Returns the (private, public) record ids.
pub fn generate_user_keypair(
    store: &MetadataStore,
    base_name: &str,
    user_name: &str,
    email: Option<&str>,
) -> Result<(i64, i64)> {
    let identity = match email {
        Some(email) => format!("{user_name} <{email}>"),
        None => user_name.to_string(),
    };

    let pair = Keypair::generate();

    let private_id = store.add_key(
        &format!("{base_name} (Private)"),
        KeyKind::Private,
        &armor_secret(&pair.secret),
        &identity,
    )?;
    let public_id = store.add_key(
        &format!("{base_name} (Public)"),
        KeyKind::Public,
        &armor_public(&pair.public),
        &identity,
    )?;

    Ok((private_id, public_id))
}

/// Import armored key material as a key record, detecting which half it
/// is.
pub fn import_key(store: &MetadataStore, name: &str, armored: &str) -> Result<i64> {
    let kind = if is_armored_public(armored) {
        unarmor_public(armored)?;
        KeyKind::Public
    } else if is_armored_secret(armored) {
        unarmor_secret(armored)?;
        KeyKind::Private
    } else {
        return Err(CofferError::InvalidKeyMaterial(
            "unrecognized key armor".into(),
        ));
    };

    store.add_key(
        &format!("{name} ({})", kind.as_str()),
        kind,
        armored.trim(),
        "",
    )
}

/// Write a key record's armored material to `dest`.
pub fn export_key(store: &MetadataStore, id: i64, dest: &Path) -> Result<()> {
    let record = store.get_key(id)?;
    fs::write(dest, record.material)?;
    Ok(())
}

/// Encrypt text to the public key stored in a key record.
pub fn encrypt_with_key(store: &MetadataStore, key_id: i64, text: &str) -> Result<String> {
    let record = store.get_key(key_id)?;
    if record.kind != KeyKind::Public {
        return Err(CofferError::InvalidKeyMaterial(
            "encryption requires a public key".into(),
        ));
    }

    let public = unarmor_public(&record.material)?;
    let envelope = keypair::seal(&public, text.as_bytes())?;
    Ok(format!("{MESSAGE_PREFIX}{}", BASE64.encode(envelope)))
}

/// Decrypt an armored message with the private key stored in a key
/// record.
pub fn decrypt_with_key(store: &MetadataStore, key_id: i64, message: &str) -> Result<String> {
    let record = store.get_key(key_id)?;
    if record.kind != KeyKind::Private {
        return Err(CofferError::InvalidKeyMaterial(
            "decryption requires a private key".into(),
        ));
    }

    let encoded = message
        .trim()
        .strip_prefix(MESSAGE_PREFIX)
        .ok_or_else(|| CofferError::InvalidKeyMaterial("not an armored message".into()))?;
    let envelope = BASE64
        .decode(encoded)
        .map_err(|e| CofferError::InvalidKeyMaterial(format!("bad message encoding: {e}")))?;

    let secret = unarmor_secret(&record.material)?;
    let plaintext = keypair::open(&secret, &envelope)?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        CofferError::SerializationError("decrypted message is not valid UTF-8".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, MetadataStore) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::create(&dir.path().join("metadata.db"), "pw").unwrap();
        (dir, store)
    }

    fn fast_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn establish_then_load_roundtrip() {
        let (_dir, store) = open_store();
        let created = establish(&store, "master", &fast_params()).unwrap();
        let loaded = load(&store, "master").unwrap();
        assert_eq!(loaded.public, created.public);
    }

    #[test]
    fn load_with_wrong_password_is_key_decryption_error() {
        let (_dir, store) = open_store();
        establish(&store, "master", &fast_params()).unwrap();
        assert!(matches!(
            load(&store, "not-master"),
            Err(CofferError::KeyDecryptionError)
        ));
    }

    #[test]
    fn load_without_keys_is_key_decryption_error() {
        let (_dir, store) = open_store();
        assert!(matches!(
            load(&store, "master"),
            Err(CofferError::KeyDecryptionError)
        ));
    }

    #[test]
    fn user_keypair_generates_both_records() {
        let (_dir, store) = open_store();
        let (private_id, public_id) =
            generate_user_keypair(&store, "Backup", "Alice", Some("alice@example.com")).unwrap();

        let private = store.get_key(private_id).unwrap();
        let public = store.get_key(public_id).unwrap();
        assert_eq!(private.kind, KeyKind::Private);
        assert_eq!(public.kind, KeyKind::Public);
        assert_eq!(private.identity, "Alice <alice@example.com>");
        assert!(private.name.contains("(Private)"));
    }

    #[test]
    fn encrypt_decrypt_with_stored_keys() {
        let (_dir, store) = open_store();
        let (private_id, public_id) =
            generate_user_keypair(&store, "Backup", "Alice", None).unwrap();

        let message = encrypt_with_key(&store, public_id, "meet at noon").unwrap();
        assert!(message.starts_with(MESSAGE_PREFIX));

        let plain = decrypt_with_key(&store, private_id, &message).unwrap();
        assert_eq!(plain, "meet at noon");
    }

    #[test]
    fn encrypt_refuses_private_key() {
        let (_dir, store) = open_store();
        let (private_id, public_id) = generate_user_keypair(&store, "K", "A", None).unwrap();

        assert!(encrypt_with_key(&store, private_id, "x").is_err());
        let msg = encrypt_with_key(&store, public_id, "x").unwrap();
        assert!(decrypt_with_key(&store, public_id, &msg).is_err());
    }

    #[test]
    fn import_detects_kind() {
        let (_dir, store) = open_store();
        let pair = Keypair::generate();

        let pub_id = import_key(&store, "Imported", &armor_public(&pair.public)).unwrap();
        assert_eq!(store.get_key(pub_id).unwrap().kind, KeyKind::Public);

        let sec_id = import_key(&store, "Imported", &armor_secret(&pair.secret)).unwrap();
        assert_eq!(store.get_key(sec_id).unwrap().kind, KeyKind::Private);

        assert!(import_key(&store, "Bad", "-----BEGIN PGP---").is_err());
    }

    #[test]
    fn export_writes_armored_material() {
        let (dir, store) = open_store();
        let (_, public_id) = generate_user_keypair(&store, "K", "A", None).unwrap();

        let dest = dir.path().join("exported.pub");
        export_key(&store, public_id, &dest).unwrap();

        let contents = fs::read_to_string(&dest).unwrap();
        assert!(contents.starts_with("coffer-pub1:"));
    }
}
