//! Imported signing keys indexed by address, with passphrase locking.
//!
//! Keys are imported one at a time; nothing is derived. Locking encrypts
//! every secret with AES-256-GCM under a key stretched from the passphrase
//! with Argon2id, and drops the plaintext. While locked, addresses can still
//! be looked up but private keys cannot be read.
//!
//! # Encrypted secret format
//! ```text
//! nonce (12 bytes) || ciphertext + auth_tag
//! ```

use std::collections::BTreeMap;
use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use parking_lot::RwLock;
use rand::RngCore;
use zeroize::Zeroizing;

use ppcmint_core::address::Address;
use ppcmint_core::constants::Network;
use ppcmint_core::crypto::{KeyPair, PublicKey};
use ppcmint_core::error::KeystoreError;
use ppcmint_core::traits::{KeyInfo, Keystore};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Known plaintext encrypted at lock time to detect a wrong passphrase.
const CHECK_PLAINTEXT: &[u8] = b"ppcmint-keystore-check";

enum Secret {
    Plain(Zeroizing<[u8; 32]>),
    Encrypted(Vec<u8>),
}

struct StoredKey {
    public_key: PublicKey,
    secret: Secret,
}

struct LockState {
    salt: [u8; SALT_LEN],
    check: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    keys: BTreeMap<Address, StoredKey>,
    lock: Option<LockState>,
}

/// Address-indexed Ed25519 keystore.
pub struct KeyStore {
    network: Network,
    inner: RwLock<Inner>,
}

impl KeyStore {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Import a keypair and return its address. Fails while locked.
    pub fn import(&self, keypair: &KeyPair) -> Result<Address, KeystoreError> {
        let mut inner = self.inner.write();
        if inner.lock.is_some() {
            return Err(KeystoreError::Locked);
        }
        let public_key = keypair.public_key();
        let address = Address::from_public_key(&public_key, self.network);
        inner.keys.insert(
            address.clone(),
            StoredKey {
                public_key,
                secret: Secret::Plain(Zeroizing::new(keypair.secret_bytes())),
            },
        );
        Ok(address)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.inner.read().keys.keys().cloned().collect()
    }

    pub fn public_key(&self, address: &Address) -> Option<PublicKey> {
        self.inner.read().keys.get(address).map(|k| k.public_key.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_locked(&self) -> bool {
        self.inner.read().lock.is_some()
    }

    /// Encrypt every secret under `passphrase` and drop the plaintext.
    pub fn lock(&self, passphrase: &[u8]) -> Result<(), KeystoreError> {
        let mut inner = self.inner.write();
        if inner.lock.is_some() {
            return Err(KeystoreError::Locked);
        }

        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let cipher = cipher_for(passphrase, &salt)?;
        let check = seal(&cipher, CHECK_PLAINTEXT)?;

        // Nothing is replaced until every secret has been sealed.
        let mut sealed = Vec::with_capacity(inner.keys.len());
        for (address, key) in &inner.keys {
            if let Secret::Plain(secret) = &key.secret {
                sealed.push((address.clone(), seal(&cipher, &secret[..])?));
            }
        }
        for (address, blob) in sealed {
            if let Some(key) = inner.keys.get_mut(&address) {
                key.secret = Secret::Encrypted(blob);
            }
        }
        inner.lock = Some(LockState { salt, check });
        Ok(())
    }

    /// Decrypt every secret with `passphrase`.
    pub fn unlock(&self, passphrase: &[u8]) -> Result<(), KeystoreError> {
        let mut inner = self.inner.write();
        let Some(state) = inner.lock.as_ref() else {
            return Err(KeystoreError::NotLocked);
        };

        let cipher = cipher_for(passphrase, &state.salt)?;
        open(&cipher, &state.check)?;

        let mut opened = Vec::with_capacity(inner.keys.len());
        for (address, key) in &inner.keys {
            if let Secret::Encrypted(blob) = &key.secret {
                let plain = Zeroizing::new(open(&cipher, blob)?);
                let secret: [u8; 32] = plain
                    .as_slice()
                    .try_into()
                    .map_err(|_| KeystoreError::Encryption("bad secret length".into()))?;
                opened.push((address.clone(), Zeroizing::new(secret)));
            }
        }
        for (address, secret) in opened {
            if let Some(key) = inner.keys.get_mut(&address) {
                key.secret = Secret::Plain(secret);
            }
        }
        inner.lock = None;
        Ok(())
    }
}

fn cipher_for(passphrase: &[u8], salt: &[u8]) -> Result<Aes256Gcm, KeystoreError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(passphrase, salt, &mut key[..])
        .map_err(|e| KeystoreError::Encryption(e.to_string()))?;
    Aes256Gcm::new_from_slice(&key[..]).map_err(|e| KeystoreError::Encryption(e.to_string()))
}

fn seal(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| KeystoreError::Encryption(e.to_string()))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(cipher: &Aes256Gcm, blob: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    if blob.len() < NONCE_LEN {
        return Err(KeystoreError::Encryption("encrypted secret too short".into()));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| KeystoreError::InvalidPassphrase)
}

/// Snapshot of one key handed out by [`KeyStore::lookup`](Keystore::lookup).
struct KeyView {
    address: Address,
    secret: Option<Zeroizing<[u8; 32]>>,
}

impl KeyInfo for KeyView {
    fn address(&self) -> &Address {
        &self.address
    }

    fn private_key(&self) -> Result<KeyPair, KeystoreError> {
        self.secret
            .as_ref()
            .map(|s| KeyPair::from_secret_bytes(**s))
            .ok_or(KeystoreError::Locked)
    }
}

impl Keystore for KeyStore {
    fn lookup(&self, address: &Address) -> Result<Box<dyn KeyInfo + '_>, KeystoreError> {
        let inner = self.inner.read();
        let key = inner
            .keys
            .get(address)
            .ok_or_else(|| KeystoreError::UnknownAddress(address.to_string()))?;
        let secret = match &key.secret {
            Secret::Plain(s) => Some(s.clone()),
            Secret::Encrypted(_) => None,
        };
        Ok(Box::new(KeyView {
            address: address.clone(),
            secret,
        }))
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("network", &self.network)
            .field("keys", &self.len())
            .field("locked", &self.is_locked())
            .finish()
    }
}
