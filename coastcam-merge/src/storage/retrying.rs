//! Retry wrapper applied at the storage adapter boundary

use super::{ObjectStore, StoreError};
use crate::utils::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;

/// Wraps a store so every call is retried on transient failure
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        retry_transient("list", prefix, &self.policy, || self.inner.list(prefix)).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        retry_transient("exists", key, &self.policy, || self.inner.exists(key)).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        retry_transient("get", key, &self.policy, || self.inner.get(key)).await
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        retry_transient("put", key, &self.policy, || self.inner.put(key, data.clone())).await
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        retry_transient("copy", dst, &self.policy, || self.inner.copy(src, dst)).await
    }
}
