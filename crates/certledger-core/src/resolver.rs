//! Trust resolution capabilities supplied by the caller.
//!
//! The attestation engine never looks anything up on its own. Entity keys,
//! artifact state and contracts all come through these traits, which are
//! implemented for plain closures as well as the types below.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::certificate::{Certificate, CertificateType};
use crate::error::ResolverError;
use crate::types::{ArtifactId, EntityId, TransactionId};

/// Public keys of an entity at a given height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityKeys {
    pub public_encryption_key: Bytes,
    pub public_signing_key: Bytes,
}

impl EntityKeys {
    pub fn new(public_encryption_key: impl Into<Bytes>, public_signing_key: impl Into<Bytes>) -> Self {
        Self {
            public_encryption_key: public_encryption_key.into(),
            public_signing_key: public_signing_key.into(),
        }
    }
}

/// Resolves an entity's public keys at a ledger height.
pub trait EntityResolver {
    fn resolve_entity_keys(&self, entity: &EntityId, height: u64) -> Result<EntityKeys, ResolverError>;
}

impl<F> EntityResolver for F
where
    F: Fn(&EntityId, u64) -> Result<EntityKeys, ResolverError>,
{
    fn resolve_entity_keys(&self, entity: &EntityId, height: u64) -> Result<EntityKeys, ResolverError> {
        self(entity, height)
    }
}

/// Resolves the latest transaction recorded against an artifact.
pub trait ArtifactStateResolver {
    fn resolve_artifact_state(&self, artifact: &ArtifactId) -> Result<Option<TransactionId>, ResolverError>;
}

impl<F> ArtifactStateResolver for F
where
    F: Fn(&ArtifactId) -> Result<Option<TransactionId>, ResolverError>,
{
    fn resolve_artifact_state(&self, artifact: &ArtifactId) -> Result<Option<TransactionId>, ResolverError> {
        self(artifact)
    }
}

/// A type-specific semantic check run after cryptographic validation.
pub trait Contract: Send + Sync {
    fn verify(&self, certificate: &Certificate) -> Result<(), String>;
}

impl<F> Contract for F
where
    F: Fn(&Certificate) -> Result<(), String> + Send + Sync,
{
    fn verify(&self, certificate: &Certificate) -> Result<(), String> {
        self(certificate)
    }
}

/// Resolves the contract governing a certificate type (and artifact).
pub trait ContractResolver {
    fn resolve_contract(
        &self,
        certificate_type: CertificateType,
        artifact: Option<&ArtifactId>,
    ) -> Option<Arc<dyn Contract>>;
}

/// An artifact resolver that never knows any artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifactState;

impl ArtifactStateResolver for NoArtifactState {
    fn resolve_artifact_state(&self, _artifact: &ArtifactId) -> Result<Option<TransactionId>, ResolverError> {
        Ok(None)
    }
}

/// A contract resolver with no contracts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContracts;

impl ContractResolver for NoContracts {
    fn resolve_contract(
        &self,
        _certificate_type: CertificateType,
        _artifact: Option<&ArtifactId>,
    ) -> Option<Arc<dyn Contract>> {
        None
    }
}

/// Contracts registered per certificate type, with optional per-artifact overrides.
#[derive(Default, Clone)]
pub struct ContractRegistry {
    by_type: HashMap<CertificateType, Arc<dyn Contract>>,
    by_artifact: HashMap<(CertificateType, ArtifactId), Arc<dyn Contract>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the contract for every certificate of a type.
    pub fn register(&mut self, certificate_type: CertificateType, contract: impl Contract + 'static) {
        self.by_type.insert(certificate_type, Arc::new(contract));
    }

    /// Register a contract for one artifact, taking precedence over the type-wide one.
    pub fn register_for_artifact(
        &mut self,
        certificate_type: CertificateType,
        artifact: ArtifactId,
        contract: impl Contract + 'static,
    ) {
        self.by_artifact
            .insert((certificate_type, artifact), Arc::new(contract));
    }
}

impl ContractResolver for ContractRegistry {
    fn resolve_contract(
        &self,
        certificate_type: CertificateType,
        artifact: Option<&ArtifactId>,
    ) -> Option<Arc<dyn Contract>> {
        artifact
            .and_then(|a| self.by_artifact.get(&(certificate_type, *a)))
            .or_else(|| self.by_type.get(&certificate_type))
            .cloned()
    }
}

#[derive(Debug, Clone)]
struct EntityRecord {
    keys: EntityKeys,
    active_from: u64,
}

/// In-memory entity registry.
///
/// An entity resolves only at heights at or after the one it was registered
/// for, so a certificate cannot be attested against a key that did not yet
/// exist at the evaluated height.
#[derive(Debug, Default)]
pub struct StaticEntityResolver {
    entities: RwLock<HashMap<EntityId, EntityRecord>>,
}

impl StaticEntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an entity's keys, active from height 0.
    pub fn register(&self, entity: EntityId, keys: EntityKeys) {
        self.register_at(entity, keys, 0);
    }

    /// Register (or replace) an entity's keys, active from `height`.
    pub fn register_at(&self, entity: EntityId, keys: EntityKeys, height: u64) {
        if let Ok(mut entities) = self.entities.write() {
            entities.insert(
                entity,
                EntityRecord {
                    keys,
                    active_from: height,
                },
            );
        }
    }

    /// Forget an entity.
    pub fn remove(&self, entity: &EntityId) {
        if let Ok(mut entities) = self.entities.write() {
            entities.remove(entity);
        }
    }
}

impl EntityResolver for StaticEntityResolver {
    fn resolve_entity_keys(&self, entity: &EntityId, height: u64) -> Result<EntityKeys, ResolverError> {
        let entities = self
            .entities
            .read()
            .map_err(|e| ResolverError::Backend(format!("entity registry poisoned: {}", e)))?;

        match entities.get(entity) {
            Some(record) if record.active_from <= height => Ok(record.keys.clone()),
            _ => Err(ResolverError::UnknownEntity {
                entity: *entity,
                height,
            }),
        }
    }
}

impl<T: EntityResolver + ?Sized> EntityResolver for Arc<T> {
    fn resolve_entity_keys(&self, entity: &EntityId, height: u64) -> Result<EntityKeys, ResolverError> {
        (**self).resolve_entity_keys(entity, height)
    }
}

impl<T: ContractResolver + ?Sized> ContractResolver for Arc<T> {
    fn resolve_contract(
        &self,
        certificate_type: CertificateType,
        artifact: Option<&ArtifactId>,
    ) -> Option<Arc<dyn Contract>> {
        (**self).resolve_contract(certificate_type, artifact)
    }
}
