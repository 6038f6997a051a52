use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use usergroup_auth::{AccountState, AuthRecord, CredentialStore};
use usergroup_core::{
    BOOTSTRAP_ADMIN_ID, Group, GroupId, GroupUpdate, NewGroup, NewUser, StoreError, User, UserId,
    UserSummary, UserUpdate,
};

use super::{BOOTSTRAP_ADMIN_NAME, GroupStore, UserStore, admin_credential_digest};
use crate::config::AdminAccount;

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    credential_digest: String,
}

impl StoredUser {
    fn auth_record(&self) -> AuthRecord {
        AuthRecord {
            id: self.user.id,
            login_name: self.user.username.clone(),
            display_name: self.user.name.clone(),
            email: self.user.email.clone(),
            credential_digest: self.credential_digest.clone(),
            is_admin: self.user.is_admin,
            is_locked: self.user.is_locked,
            is_active: self.user.is_active,
            bad_credential_count: self.user.bad_password_count,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, StoredUser>,
    groups: BTreeMap<GroupId, Group>,
    last_user_id: i32,
    last_group_id: i32,
}

impl Tables {
    /// Mirrors the unique constraints on name, email and username.
    fn check_user_unique(&self, skip: Option<UserId>, name: &str, email: &str, username: &str) -> Result<(), StoreError> {
        for stored in self.users.values().filter(|s| Some(s.user.id) != skip) {
            let u = &stored.user;
            if u.username == username {
                return Err(StoreError::conflict(format!("username '{username}' already exists")));
            }
            if u.email == email {
                return Err(StoreError::conflict(format!("email '{email}' already exists")));
            }
            if u.name == name {
                return Err(StoreError::conflict(format!("name '{name}' already exists")));
            }
        }
        Ok(())
    }

    fn check_group_unique(&self, skip: Option<GroupId>, name: &str) -> Result<(), StoreError> {
        if self
            .groups
            .values()
            .any(|g| Some(g.id) != skip && g.name == name)
        {
            return Err(StoreError::conflict(format!("group name '{name}' already exists")));
        }
        Ok(())
    }

    fn user(&self, id: UserId) -> Result<&StoredUser, StoreError> {
        self.users
            .get(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut StoredUser, StoreError> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }
}

/// In-memory user and group store.
///
/// Intended for tests/dev. Enforces the same uniqueness rules as the Postgres schema.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only the bootstrap administrator (id 1).
    pub fn with_bootstrap_admin(admin: &AdminAccount) -> Result<Self, StoreError> {
        let store = Self::new();
        store.ensure_admin(admin)?;
        Ok(store)
    }

    /// Insert or refresh the bootstrap administrator: unlocked, active, counter 0.
    pub fn ensure_admin(&self, admin: &AdminAccount) -> Result<(), StoreError> {
        let digest = admin_credential_digest(admin).map_err(|e| StoreError::backend(e.to_string()))?;
        let mut tables = self.write()?;
        let now = Utc::now();

        match tables.users.get_mut(&BOOTSTRAP_ADMIN_ID) {
            Some(stored) => {
                let u = &mut stored.user;
                u.username = admin.username.clone();
                u.is_locked = false;
                u.is_admin = true;
                u.is_active = true;
                u.bad_password_count = 0;
                u.last_modification_time = Some(now);
                u.last_modification_user = Some(BOOTSTRAP_ADMIN_ID);
                stored.credential_digest = digest;
            }
            None => {
                let user = User {
                    id: BOOTSTRAP_ADMIN_ID,
                    name: BOOTSTRAP_ADMIN_NAME.to_string(),
                    email: admin.email.clone(),
                    username: admin.username.clone(),
                    external_id: None,
                    orgunit_id: None,
                    groups_id: Vec::new(),
                    phone: None,
                    is_locked: false,
                    is_admin: true,
                    create_time: now,
                    creator: BOOTSTRAP_ADMIN_ID,
                    last_modification_time: None,
                    last_modification_user: None,
                    is_active: true,
                    inactivation_time: None,
                    inactivation_reason: None,
                    comment: Some("Initial setup of Admin account".to_string()),
                    bad_password_count: 0,
                };
                tables.users.insert(
                    BOOTSTRAP_ADMIN_ID,
                    StoredUser {
                        user,
                        credential_digest: digest,
                    },
                );
                tables.last_user_id = tables.last_user_id.max(BOOTSTRAP_ADMIN_ID.get());
            }
        }
        tracing::info!(username = %admin.username, "bootstrap administrator ensured");
        Ok(())
    }

    /// Operator-style lock toggle, used to exercise locked-account paths.
    pub fn set_locked(&self, id: UserId, locked: bool) -> Result<(), StoreError> {
        self.write()?.user_mut(id)?.user.is_locked = locked;
        Ok(())
    }

    /// Overwrite the bad-credential counter.
    pub fn set_bad_password_count(&self, id: UserId, count: i32) -> Result<(), StoreError> {
        self.write()?.user_mut(id)?.user.bad_password_count = count;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<UserSummary>, StoreError> {
        let tables = self.read()?;
        Ok(page(
            tables.users.values().map(|s| UserSummary::from(&s.user)),
            offset,
            limit,
        ))
    }

    async fn get(&self, id: UserId) -> Result<User, StoreError> {
        Ok(self.read()?.user(id)?.user.clone())
    }

    async fn exists(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.read()?.users.contains_key(&id))
    }

    async fn max_id(&self) -> Result<i32, StoreError> {
        Ok(self
            .read()?
            .users
            .keys()
            .next_back()
            .map(|id| id.get())
            .unwrap_or(0))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.read()?.users.len() as i64)
    }

    async fn create(&self, new_user: &NewUser, creator: UserId) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        tables.check_user_unique(None, &new_user.name, &new_user.email, &new_user.username)?;

        tables.last_user_id += 1;
        let id = UserId::new(tables.last_user_id);
        let user = User {
            id,
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            external_id: new_user.external_id,
            orgunit_id: new_user.orgunit_id,
            groups_id: new_user.groups_id.clone(),
            phone: new_user.phone.clone(),
            is_locked: false,
            is_admin: new_user.is_admin,
            create_time: Utc::now(),
            creator,
            last_modification_time: None,
            last_modification_user: None,
            is_active: true,
            inactivation_time: None,
            inactivation_reason: None,
            comment: new_user.comment.clone(),
            bad_password_count: 0,
        };
        tables.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                credential_digest: new_user.password_hash.clone(),
            },
        );
        Ok(user)
    }

    async fn update(&self, id: UserId, update: &UserUpdate, actor: UserId) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        tables.user(id)?;
        tables.check_user_unique(Some(id), &update.name, &update.email, &update.username)?;

        let now = Utc::now();
        let stored = tables.user_mut(id)?;
        let u = &mut stored.user;
        u.name = update.name.clone();
        u.email = update.email.clone();
        u.username = update.username.clone();
        u.external_id = update.external_id;
        u.orgunit_id = update.orgunit_id;
        u.groups_id = update.groups_id.clone();
        u.phone = update.phone.clone();
        u.is_locked = update.is_locked;
        u.is_admin = update.is_admin;
        u.last_modification_time = Some(now);
        u.last_modification_user = Some(actor);
        u.inactivation_time = if update.is_active {
            None
        } else {
            u.inactivation_time.or(Some(now))
        };
        u.is_active = update.is_active;
        u.inactivation_reason = update.inactivation_reason.clone();
        u.comment = update.comment.clone();
        u.bad_password_count = 0;
        Ok(u.clone())
    }

    async fn update_profile(&self, id: UserId, update: &UserUpdate, actor: UserId) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        tables.user(id)?;
        tables.check_user_unique(Some(id), &update.name, &update.email, &update.username)?;

        let u = &mut tables.user_mut(id)?.user;
        u.name = update.name.clone();
        u.email = update.email.clone();
        u.username = update.username.clone();
        u.phone = update.phone.clone();
        u.comment = update.comment.clone();
        u.last_modification_time = Some(Utc::now());
        u.last_modification_user = Some(actor);
        Ok(u.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        self.write()?
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }
}

#[async_trait]
impl GroupStore for InMemoryStore {
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Group>, StoreError> {
        let tables = self.read()?;
        Ok(page(tables.groups.values().cloned(), offset, limit))
    }

    async fn get(&self, id: GroupId) -> Result<Group, StoreError> {
        self.read()?
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("group {id}")))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.read()?.groups.len() as i64)
    }

    async fn create(&self, new_group: &NewGroup, creator: UserId) -> Result<Group, StoreError> {
        let mut tables = self.write()?;
        tables.check_group_unique(None, &new_group.name)?;

        tables.last_group_id += 1;
        let group = Group {
            id: GroupId::new(tables.last_group_id),
            name: new_group.name.clone(),
            create_time: Utc::now(),
            creator,
            last_modification_time: None,
            last_modification_user: None,
            is_active: true,
            inactivation_time: None,
            inactivation_reason: None,
            comment: new_group.comment.clone(),
        };
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn update(&self, id: GroupId, update: &GroupUpdate, actor: UserId) -> Result<Group, StoreError> {
        let mut tables = self.write()?;
        tables.check_group_unique(Some(id), &update.name)?;
        let now = Utc::now();
        let g = tables
            .groups
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("group {id}")))?;
        g.name = update.name.clone();
        g.last_modification_time = Some(now);
        g.last_modification_user = Some(actor);
        g.inactivation_time = if update.is_active {
            None
        } else {
            g.inactivation_time.or(Some(now))
        };
        g.is_active = update.is_active;
        g.inactivation_reason = update.inactivation_reason.clone();
        g.comment = update.comment.clone();
        Ok(g.clone())
    }

    async fn delete(&self, id: GroupId) -> Result<(), StoreError> {
        self.write()?
            .groups
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("group {id}")))
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_id_by_login_name(&self, login_name: &str) -> Result<UserId, StoreError> {
        self.read()?
            .users
            .values()
            .find(|s| s.user.username == login_name)
            .map(|s| s.user.id)
            .ok_or_else(|| StoreError::not_found(format!("login name '{login_name}'")))
    }

    async fn load_auth_record(&self, id: UserId) -> Result<AuthRecord, StoreError> {
        Ok(self.read()?.user(id)?.auth_record())
    }

    async fn is_active(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.read()?.user(id)?.user.is_active)
    }

    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.read()?.user(id)?.user.is_admin)
    }

    async fn is_locked(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.read()?.user(id)?.user.is_locked)
    }

    async fn account_state(&self, id: UserId) -> Result<AccountState, StoreError> {
        let tables = self.read()?;
        let user = &tables.user(id)?.user;
        Ok(AccountState {
            is_active: user.is_active,
            is_locked: user.is_locked,
        })
    }

    async fn reset_password(&self, id: UserId, new_digest: &str, actor: UserId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let stored = tables.user_mut(id)?;
        stored.credential_digest = new_digest.to_string();
        stored.user.is_locked = false;
        stored.user.bad_password_count = 0;
        stored.user.last_modification_time = Some(Utc::now());
        stored.user.last_modification_user = Some(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usergroup_auth::password;

    const DIGEST: &str = "4acf0b39d9c4766709a3689f553ac01ab550545ffa4544dfc0b2cea82fba02a3";

    fn admin() -> AdminAccount {
        AdminAccount {
            username: "goadmin".to_string(),
            email: "goadmin@yourdomain.org".to_string(),
            password: "admin-pass".to_string(),
        }
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            name: format!("{username} full name"),
            email: format!("{username}@example.org"),
            username: username.to_string(),
            password_hash: password::digest(DIGEST).unwrap(),
            external_id: None,
            orgunit_id: None,
            groups_id: vec![],
            phone: None,
            is_admin: false,
            comment: None,
        }
    }

    fn update_from(user: &User) -> UserUpdate {
        UserUpdate {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            external_id: user.external_id,
            orgunit_id: user.orgunit_id,
            groups_id: user.groups_id.clone(),
            phone: user.phone.clone(),
            is_locked: user.is_locked,
            is_admin: user.is_admin,
            is_active: user.is_active,
            inactivation_reason: user.inactivation_reason.clone(),
            comment: user.comment.clone(),
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_is_id_one_and_can_log_in_with_fast_digest() {
        let store = InMemoryStore::with_bootstrap_admin(&admin()).unwrap();
        let id = store.find_id_by_login_name("goadmin").await.unwrap();
        assert_eq!(id, BOOTSTRAP_ADMIN_ID);

        let record = store.load_auth_record(id).await.unwrap();
        assert!(record.is_admin && record.is_active && !record.is_locked);
        assert!(password::verify(
            &record.credential_digest,
            &password::fast_digest("admin-pass")
        ));
    }

    #[tokio::test]
    async fn ensure_admin_refreshes_lock_and_counter() {
        let store = InMemoryStore::with_bootstrap_admin(&admin()).unwrap();
        store.set_locked(BOOTSTRAP_ADMIN_ID, true).unwrap();
        store.set_bad_password_count(BOOTSTRAP_ADMIN_ID, 4).unwrap();

        store.ensure_admin(&admin()).unwrap();
        let record = store.load_auth_record(BOOTSTRAP_ADMIN_ID).await.unwrap();
        assert!(!record.is_locked);
        assert_eq!(record.bad_credential_count, 0);
        assert_eq!(UserStore::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ids_follow_the_admin_and_max_id_tracks_them() {
        let store = InMemoryStore::with_bootstrap_admin(&admin()).unwrap();
        let a = UserStore::create(&store, &new_user("alice"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        let b = UserStore::create(&store, &new_user("bobby"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        assert_eq!((a.id.get(), b.id.get()), (2, 3));
        assert_eq!(store.max_id().await.unwrap(), 3);
        assert!(store.exists(UserId::new(2)).await.unwrap());
        assert!(!store.exists(UserId::new(9)).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = InMemoryStore::new();
        UserStore::create(&store, &new_user("cgil"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        let mut dup = new_user("cgil");
        dup.name = "Another Name".to_string();
        dup.email = "other@example.org".to_string();
        let err = UserStore::create(&store, &dup, BOOTSTRAP_ADMIN_ID).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn listing_pages_in_id_order() {
        let store = InMemoryStore::new();
        for name in ["user1", "user2", "user3", "user4"] {
            UserStore::create(&store, &new_user(name), BOOTSTRAP_ADMIN_ID).await.unwrap();
        }
        let page = UserStore::list(&store, 1, 2).await.unwrap();
        let names: Vec<_> = page.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["user2", "user3"]);
    }

    #[tokio::test]
    async fn update_resets_counter_and_stamps_inactivation() {
        let store = InMemoryStore::new();
        let user = UserStore::create(&store, &new_user("cgil"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        store.set_bad_password_count(user.id, 3).unwrap();

        let mut upd = update_from(&user);
        upd.is_active = false;
        upd.inactivation_reason = Some("left the company".to_string());
        let updated = UserStore::update(&store, user.id, &upd, BOOTSTRAP_ADMIN_ID).await.unwrap();

        assert_eq!(updated.bad_password_count, 0);
        assert!(!updated.is_active);
        assert!(updated.inactivation_time.is_some());
        assert_eq!(updated.last_modification_user, Some(BOOTSTRAP_ADMIN_ID));
        assert!(!store.is_active(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn profile_update_keeps_counter_groups_and_flags() {
        let store = InMemoryStore::new();
        let user = UserStore::create(&store, &new_user("cgil"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        store.set_bad_password_count(user.id, 4).unwrap();

        let mut upd = update_from(&user);
        upd.name = "Carlos GIL".to_string();
        upd.phone = Some("+41 21 000 00 00".to_string());
        upd.groups_id = vec![GroupId::new(1), GroupId::new(2)];
        upd.is_admin = true;
        upd.inactivation_reason = Some("ignored".to_string());
        let updated = store.update_profile(user.id, &upd, user.id).await.unwrap();

        assert_eq!(updated.name, "Carlos GIL");
        assert_eq!(updated.phone.as_deref(), Some("+41 21 000 00 00"));
        assert_eq!(updated.bad_password_count, 4);
        assert!(updated.groups_id.is_empty());
        assert!(!updated.is_admin);
        assert_eq!(updated.inactivation_reason, None);
        assert_eq!(updated.last_modification_user, Some(user.id));
    }

    #[tokio::test]
    async fn account_state_reads_both_flags() {
        let store = InMemoryStore::new();
        let user = UserStore::create(&store, &new_user("cgil"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        store.set_locked(user.id, true).unwrap();

        let state = store.account_state(user.id).await.unwrap();
        assert!(state.is_active && state.is_locked);
        assert!(store.account_state(UserId::new(42)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn reset_password_clears_lock_and_counter_together() {
        let store = InMemoryStore::new();
        let user = UserStore::create(&store, &new_user("cgil"), BOOTSTRAP_ADMIN_ID).await.unwrap();
        store.set_locked(user.id, true).unwrap();
        store.set_bad_password_count(user.id, 5).unwrap();

        let fresh = password::digest(&password::fast_digest("new secret")).unwrap();
        store.reset_password(user.id, &fresh, BOOTSTRAP_ADMIN_ID).await.unwrap();

        let record = store.load_auth_record(user.id).await.unwrap();
        assert!(!record.is_locked);
        assert_eq!(record.bad_credential_count, 0);
        assert_eq!(record.credential_digest, fresh);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let store = InMemoryStore::new();
        assert!(UserStore::get(&store, UserId::new(42)).await.unwrap_err().is_not_found());
        assert!(GroupStore::delete(&store, GroupId::new(42)).await.unwrap_err().is_not_found());
        assert!(store.find_id_by_login_name("nobody").await.unwrap_err().is_not_found());
        assert!(store
            .reset_password(UserId::new(42), "x", BOOTSTRAP_ADMIN_ID)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn group_lifecycle() {
        let store = InMemoryStore::new();
        let g = GroupStore::create(
            &store,
            &NewGroup {
                name: "developers".to_string(),
                comment: None,
            },
            BOOTSTRAP_ADMIN_ID,
        )
        .await
        .unwrap();
        assert_eq!(g.id, GroupId::new(1));

        let dup = NewGroup {
            name: "developers".to_string(),
            comment: Some("again".to_string()),
        };
        assert!(matches!(
            GroupStore::create(&store, &dup, BOOTSTRAP_ADMIN_ID).await,
            Err(StoreError::Conflict(_))
        ));

        let upd = GroupUpdate {
            name: "platform team".to_string(),
            is_active: true,
            inactivation_reason: None,
            comment: Some("renamed".to_string()),
        };
        let renamed = GroupStore::update(&store, g.id, &upd, UserId::new(2)).await.unwrap();
        assert_eq!(renamed.name, "platform team");
        assert_eq!(renamed.last_modification_user, Some(UserId::new(2)));

        GroupStore::delete(&store, g.id).await.unwrap();
        assert_eq!(GroupStore::count(&store).await.unwrap(), 0);
    }
}
