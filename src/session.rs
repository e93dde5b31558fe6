//! Session provider: who is signed in.
//!
//! Authentication happens elsewhere; every ledger, recipe and order read or
//! write is scoped to the user id this provider returns.

use std::sync::RwLock;

/// Opaque identity of the signed-in user
pub type UserId = String;

pub trait SessionProvider: Send + Sync {
    /// The signed-in user, or `None` when signed out
    fn current_user(&self) -> Option<UserId>;
}

/// Session with a user fixed at construction, switchable at runtime
#[derive(Debug, Default)]
pub struct StaticSession {
    user: RwLock<Option<UserId>>,
}

impl StaticSession {
    pub fn signed_in(user_id: &str) -> Self {
        Self {
            user: RwLock::new(Some(user_id.to_string())),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: &str) {
        if let Ok(mut user) = self.user.write() {
            *user = Some(user_id.to_string());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut user) = self.user.write() {
            *user = None;
        }
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().ok().and_then(|user| user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let session = StaticSession::signed_out();
        assert_eq!(session.current_user(), None);

        session.sign_in("chef-1");
        assert_eq!(session.current_user().as_deref(), Some("chef-1"));

        session.sign_out();
        assert_eq!(session.current_user(), None);

        assert_eq!(StaticSession::signed_in("chef-2").current_user().as_deref(), Some("chef-2"));
    }
}
