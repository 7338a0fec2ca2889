//! Account lifecycle operations (§4.1 `ACC_LOGIN` / `ACC_CREATE` / `ACC_EDIT`).
//!
//! Records are stored two ways under the same [`crate::store::KeyValueStore`]:
//! by username (to authenticate and reject duplicate creation) and by user
//! id (to resolve `ACC_EDIT`, which names the session's own id rather than
//! a username).

use crate::store::FileStore;
use crate::wire::ErrorCode;

const MAX_USERNAME_LEN: usize = 255;
const MAX_PASSWORD_LEN: usize = 255;

fn username_key(username: &str) -> String {
    format!("user:{username}")
}

fn uid_key(user_id: u32) -> String {
    format!("uid:{user_id}")
}

/// Account records, layered over a [`FileStore`].
pub struct AccountStore {
    store: FileStore,
}

impl AccountStore {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    /// Create a new account, assigning it the next `USER_PK` value.
    ///
    /// Fails with [`ErrorCode::UserExists`] if the username is already
    /// registered, or [`ErrorCode::InvAuthInfo`] if either field is empty
    /// or exceeds the wire's 255-byte field limit.
    pub fn create(&self, username: &str, password: &str) -> Result<u32, ErrorCode> {
        validate_credentials(username, password)?;

        if self
            .store
            .get(&username_key(username))
            .map_err(|_| ErrorCode::Server)?
            .is_some()
        {
            return Err(ErrorCode::UserExists);
        }

        let mut user_id = self.store.read_user_pk().map_err(|_| ErrorCode::Server)?;
        user_id += 1;

        let record = format!("{user_id}\n{username}\n{password}");
        self.store
            .put(&username_key(username), record.as_bytes())
            .map_err(|_| ErrorCode::Server)?;
        self.store
            .put(&uid_key(user_id), username.as_bytes())
            .map_err(|_| ErrorCode::Server)?;
        self.store
            .write_user_pk(user_id)
            .map_err(|_| ErrorCode::Server)?;

        Ok(user_id)
    }

    /// Authenticate a username/password pair, returning the account's user
    /// id on success.
    ///
    /// Fails with [`ErrorCode::InvAuthInfo`] whether the username is
    /// unknown or the password mismatches, so a client can't distinguish
    /// the two.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<u32, ErrorCode> {
        let record = self
            .store
            .get(&username_key(username))
            .map_err(|_| ErrorCode::Server)?
            .ok_or(ErrorCode::InvAuthInfo)?;
        let (user_id, _, stored_password) = parse_record(&record)?;
        if stored_password != password {
            return Err(ErrorCode::InvAuthInfo);
        }
        Ok(user_id)
    }

    /// Change the password of an existing, authenticated account.
    ///
    /// Fails with [`ErrorCode::InvUserId`] if `user_id` has no account
    /// (the session believed it was authenticated against a record that no
    /// longer exists).
    pub fn edit(&self, user_id: u32, new_password: &str) -> Result<(), ErrorCode> {
        if new_password.is_empty() || new_password.len() > MAX_PASSWORD_LEN {
            return Err(ErrorCode::InvAuthInfo);
        }

        let username_bytes = self
            .store
            .get(&uid_key(user_id))
            .map_err(|_| ErrorCode::Server)?
            .ok_or(ErrorCode::InvUserId)?;
        let username = String::from_utf8(username_bytes).map_err(|_| ErrorCode::Server)?;

        let record = format!("{user_id}\n{username}\n{new_password}");
        self.store
            .put(&username_key(&username), record.as_bytes())
            .map_err(|_| ErrorCode::Server)
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), ErrorCode> {
    if username.is_empty()
        || password.is_empty()
        || username.len() > MAX_USERNAME_LEN
        || password.len() > MAX_PASSWORD_LEN
    {
        return Err(ErrorCode::InvAuthInfo);
    }
    Ok(())
}

fn parse_record(bytes: &[u8]) -> Result<(u32, String, String), ErrorCode> {
    let text = std::str::from_utf8(bytes).map_err(|_| ErrorCode::Server)?;
    let mut lines = text.splitn(3, '\n');
    let user_id: u32 = lines
        .next()
        .ok_or(ErrorCode::Server)?
        .parse()
        .map_err(|_| ErrorCode::Server)?;
    let username = lines.next().ok_or(ErrorCode::Server)?.to_string();
    let password = lines.next().ok_or(ErrorCode::Server)?.to_string();
    Ok((user_id, username, password))
}
