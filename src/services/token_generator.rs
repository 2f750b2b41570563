//! Pluggable API token value generators.
//!
//! Each generator has a stable ID that is stored alongside every token it
//! produced, so tokens from a retired generator still validate as long as
//! the generator stays registered.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error)]
pub enum TokenGenerationError {
    #[error("Unknown token generator \"{0}\"")]
    UnknownGenerator(String),

    #[error("Could not create a unique API token after {attempts} attempts. Please try again.")]
    Exhausted { attempts: u32 },

    #[error("{0}")]
    Generator(String),
}

/// What a token is being generated for.
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo<'a> {
    /// Short vendor prefix, e.g. `rbp`.
    pub token_type: &'a str,
}

impl Default for TokenInfo<'_> {
    fn default() -> Self {
        Self { token_type: "rbp" }
    }
}

pub trait TokenGenerator: Send + Sync {
    /// Stable identifier stored with generated tokens.
    fn id(&self) -> &'static str;

    fn create_token(&self, info: &TokenInfo<'_>) -> Result<String, TokenGenerationError>;

    /// Whether `token` is well formed for this generator.
    fn validate_token(&self, token: &str, info: &TokenInfo<'_>) -> bool;
}

/// `<type>_<48 random alphanumerics><6 char checksum>`.
///
/// The checksum lets secret scanners recognise real tokens without a
/// database lookup.
#[derive(Debug, Default)]
pub struct VendorChecksumTokenGenerator;

impl VendorChecksumTokenGenerator {
    pub const ID: &'static str = "vendor_checksum";
    const BODY_LENGTH: usize = 48;
    const CHECKSUM_LENGTH: usize = 6;

    fn checksum(body: &str) -> String {
        let digest = Sha256::digest(body.as_bytes());
        let mut value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let mut out = vec![b'0'; Self::CHECKSUM_LENGTH];

        for slot in out.iter_mut().rev() {
            *slot = BASE62[(value % 62) as usize];
            value /= 62;
        }

        String::from_utf8_lossy(&out).into_owned()
    }
}

impl TokenGenerator for VendorChecksumTokenGenerator {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn create_token(&self, info: &TokenInfo<'_>) -> Result<String, TokenGenerationError> {
        if info.token_type.is_empty() || info.token_type.contains('_') {
            return Err(TokenGenerationError::Generator(format!(
                "Invalid token type \"{}\"",
                info.token_type
            )));
        }

        let body: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::BODY_LENGTH)
            .map(char::from)
            .collect();

        Ok(format!("{}_{}{}", info.token_type, body, Self::checksum(&body)))
    }

    fn validate_token(&self, token: &str, info: &TokenInfo<'_>) -> bool {
        let Some(rest) = token
            .strip_prefix(info.token_type)
            .and_then(|r| r.strip_prefix('_'))
        else {
            return false;
        };

        if rest.len() != Self::BODY_LENGTH + Self::CHECKSUM_LENGTH
            || !rest.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return false;
        }

        let (body, checksum) = rest.split_at(Self::BODY_LENGTH);
        Self::checksum(body) == checksum
    }
}

/// 64 hex characters of SHA-256 over random bytes. No prefix or checksum.
#[derive(Debug, Default)]
pub struct LegacySha256TokenGenerator;

impl LegacySha256TokenGenerator {
    pub const ID: &'static str = "legacy_sha256";
}

impl TokenGenerator for LegacySha256TokenGenerator {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn create_token(&self, _info: &TokenInfo<'_>) -> Result<String, TokenGenerationError> {
        let seed: [u8; 32] = rand::thread_rng().gen();
        Ok(format!("{:x}", Sha256::digest(seed)))
    }

    fn validate_token(&self, token: &str, _info: &TokenInfo<'_>) -> bool {
        token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// Registered generators plus the one used for new tokens.
#[derive(Clone)]
pub struct TokenGeneratorRegistry {
    generators: Vec<Arc<dyn TokenGenerator>>,
    default_id: &'static str,
}

impl Default for TokenGeneratorRegistry {
    fn default() -> Self {
        Self {
            generators: vec![
                Arc::new(VendorChecksumTokenGenerator),
                Arc::new(LegacySha256TokenGenerator),
            ],
            default_id: VendorChecksumTokenGenerator::ID,
        }
    }
}

impl TokenGeneratorRegistry {
    /// An empty registry. `get_default` fails until a generator is added.
    pub fn empty() -> Self {
        Self {
            generators: Vec::new(),
            default_id: "",
        }
    }

    /// Register a generator, replacing any with the same ID.
    pub fn register(&mut self, generator: Arc<dyn TokenGenerator>) {
        self.generators.retain(|g| g.id() != generator.id());
        if self.default_id.is_empty() {
            self.default_id = generator.id();
        }
        self.generators.push(generator);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn TokenGenerator>> {
        self.generators.iter().find(|g| g.id() == id).cloned()
    }

    pub fn get_default(&self) -> Result<Arc<dyn TokenGenerator>, TokenGenerationError> {
        self.get(self.default_id)
            .ok_or_else(|| TokenGenerationError::UnknownGenerator(self.default_id.to_string()))
    }

    /// Whether any registered generator could have produced `token`.
    pub fn recognizes(&self, token: &str) -> bool {
        let info = TokenInfo::default();
        self.generators.iter().any(|g| g.validate_token(token, &info))
    }

    /// Choose the generator for new tokens.
    pub fn set_default(&mut self, id: &str) -> Result<(), TokenGenerationError> {
        let generator = self
            .get(id)
            .ok_or_else(|| TokenGenerationError::UnknownGenerator(id.to_string()))?;
        self.default_id = generator.id();
        Ok(())
    }
}
