//! Cryptographic capabilities consumed by the ledger.
//!
//! Every component receives a [`CryptoContext`] by reference; there is no
//! ambient global suite. The context wraps a [`CryptoSuite`], the fixed
//! capability interface (sign, verify, digest, encrypt/decrypt, derive-key).
//! The default suite is Ed25519 signatures, Blake3 digests, X25519 key
//! agreement and ChaCha20-Poly1305 encryption.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::error::CryptoError;

/// Suite id of [`Ed25519Blake3Suite`].
pub const SUITE_ED25519_BLAKE3: u16 = 0x0001;

/// A 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero digest (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The crypto capability interface.
///
/// Keys and signatures cross this boundary as byte slices so suites with
/// different key sizes can sit behind the same [`CryptoContext`].
pub trait CryptoSuite: Send + Sync {
    /// Identifier recorded in certificates built with this suite.
    fn suite_id(&self) -> u16;

    /// Fixed size of every signature this suite produces.
    fn signature_len(&self) -> usize;

    /// Sign `message` with `private_key`.
    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify `signature` over `message`. Malformed keys or signatures verify as false.
    fn verify(&self, public_key: &[u8], signature: &[u8], message: &[u8]) -> bool;

    /// Digest arbitrary bytes.
    fn digest(&self, data: &[u8]) -> Digest;

    /// Derive a symmetric key from secret material and a context label.
    fn derive_key(&self, secret: &[u8], context: &[u8]) -> [u8; 32];

    /// Agree on a shared secret from our secret and a peer's public key.
    fn key_agreement(&self, secret: &[u8], peer_public: &[u8]) -> Result<[u8; 32], CryptoError>;

    /// Authenticated encryption.
    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Authenticated decryption.
    fn decrypt(&self, key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Ed25519 + Blake3 + X25519 + ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Blake3Suite;

impl CryptoSuite for Ed25519Blake3Suite {
    fn suite_id(&self) -> u16 {
        SUITE_ED25519_BLAKE3
    }

    fn signature_len(&self) -> usize {
        64
    }

    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let seed: [u8; 32] = private_key
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        let signing_key = SigningKey::from_bytes(&seed);
        Ok(signing_key.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
        let Ok(pk) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(sig) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&pk) else {
            return false;
        };
        verifying_key
            .verify(message, &Signature::from_bytes(&sig))
            .is_ok()
    }

    fn digest(&self, data: &[u8]) -> Digest {
        Digest(*blake3::hash(data).as_bytes())
    }

    fn derive_key(&self, secret: &[u8], context: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key("certledger-v1 derived key");
        hasher.update(secret);
        hasher.update(context);
        *hasher.finalize().as_bytes()
    }

    fn key_agreement(&self, secret: &[u8], peer_public: &[u8]) -> Result<[u8; 32], CryptoError> {
        let secret: [u8; 32] = secret.try_into().map_err(|_| CryptoError::InvalidPrivateKey)?;
        let peer: [u8; 32] = peer_public
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let shared = StaticSecret::from(secret).diffie_hellman(&X25519Public::from(peer));
        Ok(*shared.as_bytes())
    }

    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    fn decrypt(&self, key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}

/// Shared handle to the active crypto suite.
///
/// Cheap to clone. Passed by reference into the builder, attestor and store.
#[derive(Clone)]
pub struct CryptoContext {
    suite: Arc<dyn CryptoSuite>,
}

impl CryptoContext {
    /// Wrap a suite.
    pub fn new(suite: impl CryptoSuite + 'static) -> Self {
        Self {
            suite: Arc::new(suite),
        }
    }

    /// The underlying suite.
    pub fn suite(&self) -> &dyn CryptoSuite {
        self.suite.as_ref()
    }

    pub fn suite_id(&self) -> u16 {
        self.suite.suite_id()
    }

    pub fn signature_len(&self) -> usize {
        self.suite.signature_len()
    }

    pub fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.suite.sign(private_key, message)
    }

    pub fn verify(&self, public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
        self.suite.verify(public_key, signature, message)
    }

    pub fn digest(&self, data: &[u8]) -> Digest {
        self.suite.digest(data)
    }

    pub fn derive_key(&self, secret: &[u8], context: &[u8]) -> [u8; 32] {
        self.suite.derive_key(secret, context)
    }

    pub fn key_agreement(&self, secret: &[u8], peer_public: &[u8]) -> Result<[u8; 32], CryptoError> {
        self.suite.key_agreement(secret, peer_public)
    }

    pub fn encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.suite.encrypt(key, nonce, plaintext)
    }

    pub fn decrypt(&self, key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.suite.decrypt(key, nonce, ciphertext)
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new(Ed25519Blake3Suite)
    }
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoContext(suite={:#06x})", self.suite.suite_id())
    }
}

/// An Ed25519 signing keypair for entities and block signers.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// The public signing key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The private key bytes handed to [`CryptoSuite::sign`].
    pub fn private_key(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", &hex::encode(self.public_key())[..16])
    }
}

/// An X25519 key-agreement secret, the encryption half of an entity's keys.
pub struct AgreementSecret([u8; 32]);

impl AgreementSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes for [`CryptoSuite::key_agreement`].
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The public encryption key.
    pub fn public_key(&self) -> [u8; 32] {
        X25519Public::from(&StaticSecret::from(self.0)).to_bytes()
    }
}

/// Generate a random 96-bit nonce.
pub fn generate_nonce() -> [u8; 12] {
    let mut nonce = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
