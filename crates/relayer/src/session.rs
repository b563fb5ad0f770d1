// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    Coprocessor, MockCoprocessor, MockFhevm, RelayerClient, RelayerConfig, Session, SessionError,
};
use anyhow::Result;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thermo_config::AppConfig;
use thermo_evm::{ProviderContext, ProviderId};
use tracing::{debug, info, warn};

pub type SessionResult = Result<Arc<Session>, SessionError>;
type SharedSession = Shared<BoxFuture<'static, SessionResult>>;

/// Provider identity plus chain id. A session is valid for exactly one key.
pub type SessionKey = (ProviderId, u64);

/// Builds the coprocessor for a chain. Used to plug in backends other than the relayer and the
/// in-process mock.
pub trait CoprocessorFactory: Send + Sync {
    fn connect(&self, chain_id: u64) -> BoxFuture<'static, Result<Arc<dyn Coprocessor>, SessionError>>;
}

#[derive(Clone)]
enum Backend {
    Mock(Arc<MockFhevm>),
    Relayer(RelayerConfig),
    Custom(Arc<dyn CoprocessorFactory>),
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Mock(fhevm) => write!(f, "Mock({})", fhevm.chain_id()),
            Backend::Relayer(config) => write!(f, "Relayer({})", config.url),
            Backend::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[derive(Default)]
struct Inner {
    backends: Mutex<HashMap<u64, Backend>>,
    sessions: Mutex<HashMap<SessionKey, SharedSession>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates coprocessor sessions and de-duplicates concurrent creation for the same provider and
/// chain. Completed sessions are reused until invalidated; failed ones are forgotten so the next
/// call retries.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relayers for every configured chain that has one, plus a fresh in-process instance per
    /// mock chain.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let manager = Self::new();
        for chain in config.chains() {
            if let Some(relayer) = RelayerConfig::from_chain(chain)? {
                manager.register_relayer(relayer);
            }
        }
        for mock in config.mock_chains() {
            manager.register_mock(Arc::new(MockFhevm::new(mock.chain_id)));
        }
        Ok(manager)
    }

    pub fn with_mock_instance(self, fhevm: Arc<MockFhevm>) -> Self {
        self.register_mock(fhevm);
        self
    }

    pub fn with_factory(self, chain_id: u64, factory: Arc<dyn CoprocessorFactory>) -> Self {
        lock(&self.inner.backends).insert(chain_id, Backend::Custom(factory));
        self
    }

    pub fn register_mock(&self, fhevm: Arc<MockFhevm>) {
        lock(&self.inner.backends).insert(fhevm.chain_id(), Backend::Mock(fhevm));
    }

    pub fn register_relayer(&self, config: RelayerConfig) {
        lock(&self.inner.backends).insert(config.chain_id, Backend::Relayer(config));
    }

    /// The in-process instance serving `chain_id`, if it is a mock chain.
    pub fn mock_instance(&self, chain_id: u64) -> Option<Arc<MockFhevm>> {
        match lock(&self.inner.backends).get(&chain_id) {
            Some(Backend::Mock(fhevm)) => Some(fhevm.clone()),
            _ => None,
        }
    }

    /// Session for the context's provider and chain. Calls with the same key while a handshake
    /// is in flight share it.
    pub fn create(&self, context: &ProviderContext) -> BoxFuture<'static, SessionResult> {
        let key = context.session_identity();
        let mut sessions = lock(&self.inner.sessions);

        let shared = match sessions.get(&key) {
            Some(existing) => {
                debug!(provider = %key.0, chain_id = key.1, "Joining existing session");
                existing.clone()
            }
            None => {
                let shared = self.connect(key.1).boxed().shared();
                sessions.insert(key, shared.clone());
                shared
            }
        };
        drop(sessions);

        let inner = self.inner.clone();
        async move {
            let result = shared.clone().await;
            if let Err(e) = &result {
                warn!(provider = %key.0, chain_id = key.1, error = %e, "Session creation failed");
                let mut sessions = lock(&inner.sessions);
                if sessions
                    .get(&key)
                    .is_some_and(|current| Shared::ptr_eq(current, &shared))
                {
                    sessions.remove(&key);
                }
            }
            result
        }
        .boxed()
    }

    /// Forget the session for `key`. Later `create` calls start a new handshake.
    pub fn invalidate(&self, key: SessionKey) -> bool {
        let removed = lock(&self.inner.sessions).remove(&key).is_some();
        if removed {
            info!(provider = %key.0, chain_id = key.1, "Session invalidated");
        }
        removed
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.inner.sessions).len()
    }

    fn connect(&self, chain_id: u64) -> BoxFuture<'static, SessionResult> {
        let backend = lock(&self.inner.backends).get(&chain_id).cloned();
        async move {
            let coprocessor: Arc<dyn Coprocessor> = match backend {
                Some(Backend::Mock(fhevm)) => {
                    info!(chain_id, "Using in-process coprocessor");
                    Arc::new(MockCoprocessor::new(fhevm))
                }
                Some(Backend::Relayer(config)) => Arc::new(RelayerClient::connect(config).await?),
                Some(Backend::Custom(factory)) => factory.connect(chain_id).await?,
                None => return Err(SessionError::NotConfigured(chain_id)),
            };
            Ok(Arc::new(Session::new(coprocessor)))
        }
        .boxed()
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("backends", &*lock(&self.inner.backends))
            .field("sessions", &lock(&self.inner.sessions).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thermo_evm::{LocalWallet, ProviderContext};

    struct CountingFactory {
        chain_id: u64,
        connects: AtomicUsize,
        fail_first: bool,
    }

    impl CoprocessorFactory for CountingFactory {
        fn connect(
            &self,
            _chain_id: u64,
        ) -> BoxFuture<'static, Result<Arc<dyn Coprocessor>, SessionError>> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_first && attempt == 0;
            let fhevm = Arc::new(MockFhevm::new(self.chain_id));
            async move {
                tokio::task::yield_now().await;
                if fail {
                    return Err(SessionError::Unreachable {
                        url: "http://relayer".into(),
                        reason: "down".into(),
                    });
                }
                Ok(Arc::new(MockCoprocessor::new(fhevm)) as Arc<dyn Coprocessor>)
            }
            .boxed()
        }
    }

    fn context(chain_id: u64) -> ProviderContext {
        let fhevm = Arc::new(MockFhevm::new(chain_id));
        ProviderContext::new(
            chain_id,
            Arc::new(LocalWallet::random(chain_id)),
            Arc::new(crate::MockConnector::new(fhevm)),
        )
    }

    #[tokio::test]
    async fn test_concurrent_creation_is_deduplicated() -> anyhow::Result<()> {
        let factory = Arc::new(CountingFactory {
            chain_id: 11155111,
            connects: AtomicUsize::new(0),
            fail_first: false,
        });
        let manager = SessionManager::new().with_factory(11155111, factory.clone());
        let ctx = context(11155111);

        let (a, b) = futures::join!(manager.create(&ctx), manager.create(&ctx));
        assert!(Arc::ptr_eq(&a?, &b?));
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);

        manager.create(&ctx).await?;
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);

        assert!(manager.invalidate(ctx.session_identity()));
        manager.create(&ctx).await?;
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_creation_is_retried() -> anyhow::Result<()> {
        let factory = Arc::new(CountingFactory {
            chain_id: 11155111,
            connects: AtomicUsize::new(0),
            fail_first: true,
        });
        let manager = SessionManager::new().with_factory(11155111, factory.clone());
        let ctx = context(11155111);

        assert!(manager.create(&ctx).await.is_err());
        assert_eq!(manager.active_sessions(), 0);
        assert!(manager.create(&ctx).await.is_ok());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_chain() {
        let manager = SessionManager::new();
        let result = manager.create(&context(1)).await;
        assert!(matches!(result, Err(SessionError::NotConfigured(1))));
    }

    #[tokio::test]
    async fn test_distinct_providers_get_distinct_sessions() -> anyhow::Result<()> {
        let manager = SessionManager::new().with_mock_instance(Arc::new(MockFhevm::new(31337)));
        let first = manager.create(&context(31337)).await?;
        let second = manager.create(&context(31337)).await?;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.keypair().fingerprint(), second.keypair().fingerprint());
        assert!(manager.mock_instance(31337).is_some());
        Ok(())
    }
}
