//! The signed-in user as a watchable value.
//!
//! The external identity provider reports sign-in and sign-out; the
//! workspace reacts to transitions of the watched value. Setting the same
//! user twice is not a transition.

use cartograph_types::UserId;
use tokio::sync::watch;
use tracing::info;

/// Publishes the current user to the workspace.
#[derive(Debug)]
pub struct IdentityProvider {
    tx: watch::Sender<Option<UserId>>,
}

impl IdentityProvider {
    /// Create a provider with nobody signed in.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Watch the current user.
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }

    /// The current user.
    pub fn current(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    /// Sign a user in, replacing any previous user. Returns whether the
    /// value changed.
    pub fn sign_in(&self, user: UserId) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            *current = Some(user.clone());
            true
        });
        if changed {
            info!(user = %user, "Signed in");
        }
        changed
    }

    /// Sign the current user out. Returns whether anyone was signed in.
    pub fn sign_out(&self) -> bool {
        let changed = self.tx.send_if_modified(|current| current.take().is_some());
        if changed {
            info!("Signed out");
        }
        changed
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_reported_once() {
        let identity = IdentityProvider::new();
        let rx = identity.subscribe();
        assert!(identity.sign_in(UserId::from("alice")));
        assert!(!identity.sign_in(UserId::from("alice")));
        assert_eq!(*rx.borrow(), Some(UserId::from("alice")));

        assert!(identity.sign_out());
        assert!(!identity.sign_out());
        assert_eq!(identity.current(), None);
    }

    #[tokio::test]
    async fn switching_users_notifies_watchers() {
        let identity = IdentityProvider::new();
        let mut rx = identity.subscribe();
        identity.sign_in(UserId::from("alice"));
        assert!(rx.changed().await.is_ok());
        identity.sign_in(UserId::from("bob"));
        assert!(rx.changed().await.is_ok());
        assert_eq!(*rx.borrow_and_update(), Some(UserId::from("bob")));
    }
}
