//! Credentials and per-provider credential pools.
//!
//! A credential is an opaque secret scoped to one provider. Pools are built
//! once from configuration and never change afterwards; the only mutable part
//! is the rotation cursor, which [`crate::rotation::RotationTracker`] owns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use aigate_core::config::schema::ProvidersConfig;

// ─────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────

/// An API credential. Cheap to clone; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Credential(Arc::from(secret.as_ref()))
    }

    /// The raw secret, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars of the SHA-256 of the secret.
    ///
    /// Used in logs and cooldown store keys in place of the secret.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

// ─────────────────────────────────────────────
// CredentialPool
// ─────────────────────────────────────────────

/// Ordered credentials of one provider plus its rotation cursor.
///
/// An empty pool means the provider is not configured.
pub struct CredentialPool {
    provider: String,
    credentials: Vec<Credential>,
    /// Index of the next credential to try. Always `< len` when non-empty.
    pub(crate) cursor: Mutex<usize>,
}

impl CredentialPool {
    pub fn new(provider: impl Into<String>, secrets: &[String]) -> Self {
        CredentialPool {
            provider: provider.into(),
            credentials: secrets.iter().map(Credential::new).collect(),
            cursor: Mutex::new(0),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("provider", &self.provider)
            .field("credentials", &self.credentials)
            .finish()
    }
}

// ─────────────────────────────────────────────
// CredentialPools
// ─────────────────────────────────────────────

/// All pools, keyed by provider name.
#[derive(Debug, Default)]
pub struct CredentialPools {
    pools: HashMap<String, Arc<CredentialPool>>,
}

impl CredentialPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one pool per provider section in the config.
    ///
    /// Unconfigured providers still get an (empty) pool so lookups succeed.
    pub fn from_config(providers: &ProvidersConfig) -> Self {
        let mut pools = Self::new();
        for (name, config) in providers.to_map() {
            pools.insert(CredentialPool::new(name, &config.credentials()));
        }
        pools
    }

    pub fn insert(&mut self, pool: CredentialPool) {
        self.pools.insert(pool.provider.clone(), Arc::new(pool));
    }

    pub fn get(&self, provider: &str) -> Option<&Arc<CredentialPool>> {
        self.pools.get(provider)
    }

    /// Number of credentials for `provider` (0 when unknown).
    pub fn size(&self, provider: &str) -> usize {
        self.get(provider).map_or(0, |p| p.len())
    }

    /// Provider names, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
