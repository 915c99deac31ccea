//! fedsign: federated sign-in with backend account reconciliation.
//!
//! A user proves who they are through Google, Facebook, or GitHub; the
//! asserted identity is then reconciled against a password-based account
//! backend, registering a new account or falling back to login when one
//! already exists. The resulting backend session token is cached in an
//! encrypted local store and cleared again on sign-out.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fedsign::backend::{build_http_client, ExistsPolicy, HttpBackend};
//! use fedsign::config::load_config;
//! use fedsign::federated::FederatedSignIn;
//! use fedsign::identity::{
//!     configured_providers, IdentityAdapter, IdentityEvents, IdentityProvider, SilentPrompt,
//! };
//! use fedsign::reconcile::Reconciler;
//! use fedsign::session::SessionCache;
//! use fedsign::storage::MemoryKeyValueStore;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let http = build_http_client(std::time::Duration::from_secs(30));
//! let store = Arc::new(MemoryKeyValueStore::new());
//! let adapter = configured_providers(&config.providers, &http, Arc::new(SilentPrompt))
//!     .into_iter()
//!     .fold(
//!         IdentityAdapter::new(store.clone(), IdentityEvents::new()),
//!         IdentityAdapter::with_provider,
//!     );
//! let backend = HttpBackend::from_config(&config.backend, http).unwrap();
//! let reconciler = Reconciler::new(Arc::new(backend), ExistsPolicy::new([400, 200]));
//! let cache = SessionCache::new(store, "accessToken");
//! let federated = FederatedSignIn::new(Arc::new(adapter), Arc::new(reconciler), Arc::new(cache));
//! let result = federated.sign_in(IdentityProvider::GitHub).await.unwrap();
//! println!("{:?}", result.reconciliation.outcome);
//! # }
//! ```

pub mod account;
pub mod backend;
pub mod build_info;
pub mod config;
pub mod credential;
pub mod error;
pub mod federated;
pub mod identity;
pub mod logging;
pub mod reconcile;
pub mod render;
pub mod session;
pub mod storage;
#[cfg(test)]
pub(crate) mod testsupport;
