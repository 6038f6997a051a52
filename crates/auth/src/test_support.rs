use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use usergroup_core::{StoreError, UserId};

use crate::credentials::{AccountState, AuthRecord, CredentialStore};
use crate::password;

pub(crate) fn record_with(id: i32, login_name: &str, fast_digest: &str) -> AuthRecord {
    AuthRecord {
        id: UserId::new(id),
        login_name: login_name.to_string(),
        display_name: format!("{login_name} display"),
        email: format!("{login_name}@example.org"),
        credential_digest: password::digest(fast_digest).unwrap(),
        is_admin: false,
        is_locked: false,
        is_active: true,
        bad_credential_count: 0,
    }
}

/// Credential store fake counting reads and writes, able to fail reads on demand.
#[derive(Default)]
pub(crate) struct FakeCredentialStore {
    records: RwLock<HashMap<UserId, AuthRecord>>,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FakeCredentialStore {
    pub(crate) fn with(records: Vec<AuthRecord>) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.write().unwrap();
            for r in records {
                map.insert(r.id, r);
            }
        }
        store
    }

    pub(crate) fn fail_next_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn update(&self, id: UserId, f: impl FnOnce(&mut AuthRecord)) {
        let mut map = self.records.write().unwrap();
        if let Some(r) = map.get_mut(&id) {
            f(r);
        }
    }

    pub(crate) fn remove(&self, id: UserId) {
        self.records.write().unwrap().remove(&id);
    }

    fn read(&self, id: UserId) -> Result<AuthRecord, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection refused"));
        }
        self.records
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }
}

#[async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn find_id_by_login_name(&self, login_name: &str) -> Result<UserId, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection refused"));
        }
        self.records
            .read()
            .unwrap()
            .values()
            .find(|r| r.login_name == login_name)
            .map(|r| r.id)
            .ok_or_else(|| StoreError::not_found(format!("login name {login_name}")))
    }

    async fn load_auth_record(&self, id: UserId) -> Result<AuthRecord, StoreError> {
        self.read(id)
    }

    async fn is_active(&self, id: UserId) -> Result<bool, StoreError> {
        self.read(id).map(|r| r.is_active)
    }

    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError> {
        self.read(id).map(|r| r.is_admin)
    }

    async fn is_locked(&self, id: UserId) -> Result<bool, StoreError> {
        self.read(id).map(|r| r.is_locked)
    }

    async fn account_state(&self, id: UserId) -> Result<AccountState, StoreError> {
        self.read(id).map(|r| AccountState {
            is_active: r.is_active,
            is_locked: r.is_locked,
        })
    }

    async fn reset_password(
        &self,
        id: UserId,
        new_digest: &str,
        _actor: UserId,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut map = self.records.write().unwrap();
        let r = map
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        r.credential_digest = new_digest.to_string();
        r.is_locked = false;
        r.bad_credential_count = 0;
        Ok(())
    }
}
