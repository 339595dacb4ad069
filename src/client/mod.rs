// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # FHEVM Client
//!
//! Owns the lifecycle of one FHEVM instance and routes decryption calls
//! through it.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --initialize()--> Initializing --ok--> Ready
//!                             |
//!                             +--err / dropped--> Error
//! ```
//!
//! The status lives behind a `std::sync::Mutex` that is never held across
//! an `.await`, so a second `initialize()` observes `Initializing` and is
//! rejected rather than queued.

mod config;
mod status;

pub use config::{validate_config, ClientConfig};
pub use status::ClientStatus;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::chains::ChainConfig;
use crate::decryption::{self, CacheType, DecryptContext, UserDecryptOutput, UserDecryptRequest};
use crate::error::{FhevmError, InitError};
use crate::instance::{
    DecryptedValues, FhevmInstance, Handle, InstanceConfig, InstanceFactory, PublicKeyMaterial,
    PublicParamsMap,
};
use crate::logging::debug_if;

#[derive(Default)]
struct ClientState {
    status: ClientStatus,
    instance: Option<Arc<dyn FhevmInstance>>,
    chain: Option<ChainConfig>,
    last_error: Option<String>,
}

/// Handle to one FHEVM instance and its caches.
pub struct FhevmClient {
    config: ClientConfig,
    factory: Arc<dyn InstanceFactory>,
    state: Mutex<ClientState>,
}

/// Validate `config` and return an idle client.
///
/// No network or storage access happens until [`FhevmClient::initialize`].
pub fn create_client(
    config: ClientConfig,
    factory: Arc<dyn InstanceFactory>,
) -> Result<FhevmClient, FhevmError> {
    validate_config(&config)?;
    Ok(FhevmClient {
        config,
        factory,
        state: Mutex::new(ClientState::default()),
    })
}

/// Moves the client to `Error` if `initialize()` is dropped mid-flight.
struct InitGuard<'a> {
    client: &'a FhevmClient,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("FHEVM initialization abandoned before completion");
            self.client.fail(&InitError::Abandoned);
        }
    }
}

impl FhevmClient {
    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, error: &InitError) {
        let mut state = self.state();
        state.status = ClientStatus::Error;
        state.instance = None;
        state.last_error = Some(error.to_string());
    }

    /// Create the FHEVM instance.
    ///
    /// Idempotent once `Ready`. A client that reached `Error` stays there.
    pub async fn initialize(&self) -> Result<(), FhevmError> {
        {
            let mut state = self.state();
            match state.status {
                ClientStatus::Initializing => return Err(FhevmError::AlreadyInitializing),
                ClientStatus::Ready => {
                    debug_if!(self.config.debug, "FHEVM already initialized");
                    return Ok(());
                }
                ClientStatus::Error => return Err(FhevmError::InitFailed(InitError::Terminal)),
                ClientStatus::Idle => state.status = ClientStatus::Initializing,
            }
        }

        let mut guard = InitGuard {
            client: self,
            armed: true,
        };
        let result = self.load_instance().await;
        guard.armed = false;

        match result {
            Ok((instance, chain)) => {
                let mut state = self.state();
                state.status = ClientStatus::Ready;
                state.instance = Some(instance);
                debug_if!(
                    self.config.debug,
                    chain_id = chain.chain_id,
                    "FHEVM initialized"
                );
                state.chain = Some(chain);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "FHEVM initialization failed");
                self.fail(&e);
                Err(FhevmError::InitFailed(e))
            }
        }
    }

    async fn load_instance(&self) -> Result<(Arc<dyn FhevmInstance>, ChainConfig), InitError> {
        let source = self
            .config
            .chain
            .as_ref()
            .ok_or_else(|| InitError::ConfigLoad("no chain configured".into()))?;
        let chain = source
            .load_configuration()
            .await
            .map_err(|e| InitError::ConfigLoad(e.to_string()))?;
        chain
            .ensure_resolved()
            .map_err(|field| InitError::UnresolvedChain(format!("`{field}` is not set")))?;
        let network = self.config.network_for(&chain).ok_or_else(|| {
            InitError::UnresolvedChain("no provider and the chain has no network".into())
        })?;

        let storage = &self.config.storage;
        let acl = chain.acl_cache_key();
        let cached_key = storage.get_public_key(&acl).await;
        let cached_params = storage.get_public_params(&acl).await;
        debug_if!(
            self.config.debug,
            acl = %acl,
            cached_key = cached_key.is_some(),
            cached_params = cached_params.is_some(),
            "Creating FHEVM instance"
        );

        let instance = self
            .factory
            .create_instance(InstanceConfig {
                chain: chain.clone(),
                network,
                public_key: cached_key.as_ref().map(|key| PublicKeyMaterial {
                    public_key_id: key.public_key_id.clone(),
                    public_key: key.public_key.clone(),
                }),
                public_params: cached_params.clone(),
            })
            .await?;

        if cached_key.is_none() {
            if let Some(key) = instance.get_public_key() {
                storage
                    .set_public_key(&acl, &key.public_key_id, &key.public_key)
                    .await;
            }
        }

        if cached_params.is_none() {
            let params: PublicParamsMap = self
                .factory
                .encryption_bit_widths()
                .iter()
                .filter_map(|&bits| instance.get_public_params(bits).map(|p| (bits, p)))
                .collect();
            if !params.is_empty() {
                storage.set_public_params(&acl, &params).await;
            }
        }

        Ok((instance, chain))
    }

    pub fn get_status(&self) -> ClientStatus {
        self.state().status
    }

    pub fn is_ready(&self) -> bool {
        self.get_status() == ClientStatus::Ready
    }

    /// The instance, only while `Ready`.
    pub fn get_instance(&self) -> Option<Arc<dyn FhevmInstance>> {
        let state = self.state();
        match state.status {
            ClientStatus::Ready => state.instance.clone(),
            _ => None,
        }
    }

    /// The resolved chain, once `Ready`.
    pub fn chain(&self) -> Option<ChainConfig> {
        self.state().chain.clone()
    }

    /// Message of the error that moved the client to `Error`.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn ready(&self) -> Result<(Arc<dyn FhevmInstance>, u64), FhevmError> {
        let state = self.state();
        match (state.status, &state.instance, &state.chain) {
            (ClientStatus::Ready, Some(instance), Some(chain)) => {
                Ok((Arc::clone(instance), chain.gateway_chain_id))
            }
            _ => Err(FhevmError::NotInitialized),
        }
    }

    /// Decrypt publicly decryptable handles.
    pub async fn public_decrypt(&self, handles: &[Handle]) -> Result<DecryptedValues, FhevmError> {
        let (instance, _) = self.ready()?;
        Ok(decryption::public_decrypt(instance.as_ref(), handles, self.config.debug).await?)
    }

    /// Decrypt handles the signer's account is allowed to read.
    pub async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<UserDecryptOutput, FhevmError> {
        let (instance, gateway_chain_id) = self.ready()?;
        let cache_type = request.cache_type.unwrap_or(self.config.default_cache_type);
        let ctx = DecryptContext {
            instance: instance.as_ref(),
            signature_cache: self.config.signature_storage(cache_type).map(|s| &**s),
            fallback_chain_id: gateway_chain_id,
            debug: self.config.debug,
        };
        Ok(decryption::user_decrypt(&ctx, &request).await?)
    }

    /// Drop every cached signature, session and persistent.
    pub async fn clear_cache(&self) {
        self.config.session_storage.clear_signatures().await;
        self.config.storage.clear_signatures().await;
        debug_if!(self.config.debug, "Cleared signature caches");
    }

    /// Drop cached signatures for one policy.
    pub async fn clear_cache_for(&self, cache_type: CacheType) {
        if let Some(storage) = self.config.signature_storage(cache_type) {
            storage.clear_signatures().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::chains::{localhost, ChainConfigLoader, ChainSource};
    use crate::error::{messages, DecryptError, ErrorCode};
    use crate::instance::{DecryptedValue, InstanceError, NetworkProvider};
    use crate::signer::DecryptSigner;
    use crate::storage::{
        CachedSignature, DurableStorage, MemoryStorage, SessionStorage, SignatureCacheKey,
        StorageAdapter,
    };
    use crate::test_utils::{
        cached_signature_expiring_at, contract, sample_params, CountingSigner, MockFactory,
        MOCK_GATEWAY_CHAIN_ID, MOCK_KEY_ID,
    };

    fn rpc() -> Option<NetworkProvider> {
        Some(NetworkProvider::Rpc("http://localhost:8545".into()))
    }

    fn config() -> ClientConfig {
        ClientConfig::new(rpc(), localhost())
    }

    async fn ready_client(config: ClientConfig) -> (FhevmClient, Arc<MockFactory>) {
        let factory = MockFactory::new();
        let client = create_client(config, factory.clone()).unwrap();
        client.initialize().await.unwrap();
        (client, factory)
    }

    fn user_key(signer: &CountingSigner) -> SignatureCacheKey {
        SignatureCacheKey::from_addresses(signer.address(), MOCK_GATEWAY_CHAIN_ID, contract())
    }

    struct StaticLoader(ChainConfig);

    #[async_trait::async_trait]
    impl ChainConfigLoader for StaticLoader {
        async fn load_configuration(&self) -> Result<ChainConfig, InstanceError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let factory = MockFactory::new();
        let result = create_client(ClientConfig::new(None, localhost()), factory.clone());
        let err = result.err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert!(err.to_string().ends_with(messages::PROVIDER_REQUIRED));
        assert_eq!(factory.creations(), 0);
    }

    #[test]
    fn new_client_is_idle() {
        let client = create_client(config(), MockFactory::new()).unwrap();
        assert_eq!(client.get_status(), ClientStatus::Idle);
        assert!(!client.is_ready());
        assert!(client.get_instance().is_none());
        assert!(client.chain().is_none());
        assert!(client.last_error().is_none());
    }

    #[tokio::test]
    async fn initialize_reaches_ready_and_caches_key_material() {
        let storage = Arc::new(MemoryStorage::default());
        let (client, factory) = ready_client(config().with_storage(storage.clone())).await;

        assert_eq!(client.get_status(), ClientStatus::Ready);
        assert!(client.is_ready());
        assert!(client.get_instance().is_some());
        assert_eq!(client.chain().unwrap().chain_id, localhost().chain_id);
        assert_eq!(factory.creations(), 1);

        let acl = localhost().acl_cache_key();
        let key = storage.get_public_key(&acl).await.unwrap();
        assert_eq!(key.public_key_id, MOCK_KEY_ID);
        let params = storage.get_public_params(&acl).await.unwrap();
        assert_eq!(params.len(), crate::instance::DEFAULT_ENCRYPTION_BIT_WIDTHS.len());
    }

    #[tokio::test]
    async fn second_initialize_is_a_no_op() {
        let (client, factory) = ready_client(config()).await;
        client.initialize().await.unwrap();
        assert_eq!(factory.creations(), 1);
        assert!(client.is_ready());
    }

    #[tokio::test]
    async fn concurrent_initialize_is_rejected() {
        let gate = Arc::new(Notify::new());
        let factory = MockFactory::gated(gate.clone());
        let client = Arc::new(create_client(config(), factory.clone()).unwrap());

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.initialize().await })
        };
        while factory.creations() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(client.get_status(), ClientStatus::Initializing);

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, FhevmError::AlreadyInitializing));
        assert_eq!(err.to_string(), messages::ALREADY_INITIALIZING);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(client.is_ready());
        assert_eq!(factory.creations(), 1);
    }

    #[tokio::test]
    async fn factory_failure_moves_to_error() {
        let factory = MockFactory::failing();
        let client = create_client(config(), factory.clone()).unwrap();

        let err = client.initialize().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InitFailed);
        assert!(matches!(err, FhevmError::InitFailed(InitError::Instance(_))));
        assert_eq!(client.get_status(), ClientStatus::Error);
        assert!(client.get_instance().is_none());
        assert!(client.last_error().unwrap().contains("relayer unreachable"));

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, FhevmError::InitFailed(InitError::Terminal)));
        assert_eq!(factory.creations(), 1);
    }

    #[tokio::test]
    async fn cached_key_material_is_passed_to_factory() {
        let storage = Arc::new(MemoryStorage::default());
        let acl = localhost().acl_cache_key();
        storage.set_public_key(&acl, "seeded-key", &[9, 9]).await;
        storage.set_public_params(&acl, &sample_params()).await;

        let (_client, factory) = ready_client(config().with_storage(storage.clone())).await;

        let received = factory.last_config().unwrap();
        assert_eq!(received.public_key.unwrap().public_key_id, "seeded-key");
        assert_eq!(received.public_params, Some(sample_params()));
        assert_eq!(
            storage.get_public_key(&acl).await.unwrap().public_key_id,
            "seeded-key"
        );
        assert_eq!(storage.get_public_params(&acl).await, Some(sample_params()));
    }

    #[tokio::test]
    async fn deferred_chain_is_loaded_during_initialize() {
        let source = ChainSource::Deferred(Arc::new(StaticLoader(localhost())));
        let (client, factory) = ready_client(ClientConfig::new(rpc(), source)).await;
        assert_eq!(client.chain().unwrap(), localhost());
        assert_eq!(factory.last_config().unwrap().chain, localhost());
    }

    #[tokio::test]
    async fn unresolved_deferred_chain_fails_initialize() {
        let mut incomplete = localhost();
        incomplete.acl_contract_address = alloy::primitives::Address::ZERO;
        let source = ChainSource::Deferred(Arc::new(StaticLoader(incomplete)));
        let factory = MockFactory::new();
        let client = create_client(ClientConfig::new(rpc(), source), factory.clone()).unwrap();

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, FhevmError::InitFailed(InitError::UnresolvedChain(_))));
        assert_eq!(client.get_status(), ClientStatus::Error);
        assert_eq!(factory.creations(), 0);
    }

    #[tokio::test]
    async fn dropped_initialize_moves_to_error() {
        let gate = Arc::new(Notify::new());
        let client = create_client(config(), MockFactory::gated(gate)).unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), client.initialize()).await;
        assert!(timed_out.is_err());
        assert_eq!(client.get_status(), ClientStatus::Error);
        assert!(client.last_error().unwrap().contains("abandoned"));
    }

    #[tokio::test]
    async fn decrypt_before_ready_is_rejected_without_signing() {
        let client = create_client(config(), MockFactory::new()).unwrap();
        let signer = CountingSigner::new();

        let err = client.public_decrypt(&["0x01".into()]).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotInitialized);

        let err = client
            .user_decrypt(UserDecryptRequest::single("0x01", contract(), signer.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, FhevmError::NotInitialized));
        assert_eq!(signer.sign_count(), 0);
    }

    #[tokio::test]
    async fn public_decrypt_passes_through() {
        let (client, factory) = ready_client(config()).await;
        let values = client
            .public_decrypt(&["0x01".into(), "0x0a".into()])
            .await
            .unwrap();
        assert_eq!(values["0x0a"], DecryptedValue::from(10u64));
        assert_eq!(factory.instance.public_decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn persistent_signature_covers_later_requests() {
        let (client, _) = ready_client(config()).await;
        let signer = CountingSigner::new();

        let batch = client
            .user_decrypt(
                UserDecryptRequest::batch(["0x01", "0x02"], contract(), signer.clone())
                    .with_cache_type(CacheType::Persistent),
            )
            .await
            .unwrap()
            .into_batch()
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch["0x02"], DecryptedValue::from(2u64));
        assert_eq!(signer.sign_count(), 1);

        let single = client
            .user_decrypt(
                UserDecryptRequest::single("0x03", contract(), signer.clone())
                    .with_cache_type(CacheType::Persistent),
            )
            .await
            .unwrap();
        assert_eq!(single.into_single(), Some(DecryptedValue::from(3u64)));
        assert_eq!(signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn session_signature_is_reused_within_the_session() {
        let (client, _) = ready_client(config()).await;
        let signer = CountingSigner::new();
        let request = |handle: &str| {
            UserDecryptRequest::single(handle, contract(), signer.clone())
                .with_cache_type(CacheType::Session)
        };

        let first = client.user_decrypt(request("0x01")).await.unwrap();
        let second = client.user_decrypt(request("0x02")).await.unwrap();

        assert_eq!(first.into_single(), Some(DecryptedValue::from(1u64)));
        assert_eq!(second.into_single(), Some(DecryptedValue::from(2u64)));
        assert_eq!(signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn durable_signature_survives_a_new_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fhevm-cache.redb");
        let signer = CountingSigner::new();

        {
            let storage = Arc::new(DurableStorage::open(&path).unwrap());
            let (client, _) = ready_client(config().with_storage(storage)).await;
            let batch = client
                .user_decrypt(
                    UserDecryptRequest::batch(["0x01", "0x02"], contract(), signer.clone())
                        .with_cache_type(CacheType::Persistent),
                )
                .await
                .unwrap()
                .into_batch()
                .unwrap();
            assert_eq!(batch["0x01"], DecryptedValue::from(1u64));
            assert_eq!(batch["0x02"], DecryptedValue::from(2u64));
            assert_eq!(signer.sign_count(), 1);
        }

        // The first client and its database handle are gone; reopen the file
        let storage = Arc::new(DurableStorage::open(&path).unwrap());
        let (client, factory) = ready_client(config().with_storage(storage)).await;
        assert_eq!(
            factory.last_config().unwrap().public_key.unwrap().public_key_id,
            MOCK_KEY_ID
        );

        let single = client
            .user_decrypt(
                UserDecryptRequest::single("0x03", contract(), signer.clone())
                    .with_cache_type(CacheType::Persistent),
            )
            .await
            .unwrap();
        assert_eq!(single.into_single(), Some(DecryptedValue::from(3u64)));
        assert_eq!(signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn no_cache_policy_always_signs() {
        let (client, _) = ready_client(config()).await;
        let signer = CountingSigner::new();

        for _ in 0..2 {
            client
                .user_decrypt(UserDecryptRequest::single("0x01", contract(), signer.clone()))
                .await
                .unwrap();
        }
        assert_eq!(signer.sign_count(), 2);
    }

    #[tokio::test]
    async fn default_cache_type_applies_to_requests_without_one() {
        let (client, _) =
            ready_client(config().with_default_cache_type(CacheType::Persistent)).await;
        let signer = CountingSigner::new();

        for _ in 0..2 {
            client
                .user_decrypt(UserDecryptRequest::single("0x01", contract(), signer.clone()))
                .await
                .unwrap();
        }
        assert_eq!(signer.sign_count(), 1);
    }

    #[tokio::test]
    async fn expired_signature_is_replaced() {
        let storage = Arc::new(MemoryStorage::default());
        let (client, _) = ready_client(config().with_storage(storage.clone())).await;
        let signer = CountingSigner::new();
        let key = user_key(&signer);
        storage.set_signature(&key, cached_signature_expiring_at(1)).await;

        client
            .user_decrypt(
                UserDecryptRequest::single("0x01", contract(), signer.clone())
                    .with_cache_type(CacheType::Persistent),
            )
            .await
            .unwrap();

        assert_eq!(signer.sign_count(), 1);
        let fresh = storage.get_signature(&key).await.unwrap();
        assert!(!fresh.is_expired());
    }

    #[tokio::test]
    async fn session_policy_uses_session_storage() {
        let storage = Arc::new(MemoryStorage::default());
        let session = Arc::new(SessionStorage::new());
        let (client, _) = ready_client(
            config()
                .with_storage(storage.clone())
                .with_session_storage(session.clone()),
        )
        .await;
        let signer = CountingSigner::new();

        client
            .user_decrypt(
                UserDecryptRequest::single("0x01", contract(), signer.clone())
                    .with_cache_type(CacheType::Session),
            )
            .await
            .unwrap();

        assert_eq!(session.len(), 1);
        assert_eq!(storage.signature_count(), 0);
    }

    #[tokio::test]
    async fn clear_cache_forces_a_fresh_signature() {
        let session = Arc::new(SessionStorage::new());
        let (client, _) = ready_client(config().with_session_storage(session.clone())).await;
        let signer = CountingSigner::new();
        let request = |cache_type| {
            UserDecryptRequest::single("0x01", contract(), signer.clone())
                .with_cache_type(cache_type)
        };

        client.user_decrypt(request(CacheType::Persistent)).await.unwrap();
        client.user_decrypt(request(CacheType::Session)).await.unwrap();
        assert_eq!(signer.sign_count(), 2);

        client.clear_cache().await;
        assert!(session.is_empty());

        client.user_decrypt(request(CacheType::Persistent)).await.unwrap();
        assert_eq!(signer.sign_count(), 3);
    }

    #[tokio::test]
    async fn clear_cache_for_is_scoped() {
        let storage = Arc::new(MemoryStorage::default());
        let session = Arc::new(SessionStorage::new());
        let (client, _) = ready_client(
            config()
                .with_storage(storage.clone())
                .with_session_storage(session.clone()),
        )
        .await;
        let signer = CountingSigner::new();
        let key = user_key(&signer);
        let record: CachedSignature = crate::test_utils::valid_signature();
        storage.set_signature(&key, record.clone()).await;
        session.set_signature(&key, record).await;

        client.clear_cache_for(CacheType::Session).await;
        assert!(session.is_empty());
        assert_eq!(storage.signature_count(), 1);

        client.clear_cache_for(CacheType::None).await;
        assert_eq!(storage.signature_count(), 1);
    }

    #[tokio::test]
    async fn decrypt_failure_keeps_client_ready() {
        let (client, _) = ready_client(config()).await;
        let signer = CountingSigner::rejecting();

        let err = client
            .user_decrypt(UserDecryptRequest::single("0x01", contract(), signer))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DecryptFailed);
        assert!(matches!(err, FhevmError::DecryptFailed(DecryptError::Signing(_))));

        let err = client.public_decrypt(&["zz".into()]).await.unwrap_err();
        assert!(matches!(err, FhevmError::DecryptFailed(DecryptError::Instance(_))));
        assert!(client.is_ready());
    }
}
