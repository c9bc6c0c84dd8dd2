use crate::session::SessionStore;

/// Screens of the client. CLI commands map onto these one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    Dashboard,
    Resume,
    Matches,
}

impl Screen {
    pub fn requires_auth(self) -> bool {
        !matches!(self, Screen::Login | Screen::Register)
    }
}

/// Entry gate run before every screen. Unauthenticated access to a guarded
/// screen redirects to the login screen and nothing else executes. The
/// verdict is derived from the session store's authenticated signal, so
/// re-running the check after the signal changes always reflects the
/// current session.
pub fn check(store: &SessionStore, screen: Screen) -> Option<Screen> {
    if screen.requires_auth() && !store.is_authenticated() {
        return Some(Screen::Login);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().join("credential.json"));
        (dir, store)
    }

    #[test]
    fn test_unauthenticated_resume_screen_redirects_to_login() {
        let (_dir, store) = store();
        assert_eq!(check(&store, Screen::Resume), Some(Screen::Login));
        assert_eq!(check(&store, Screen::Matches), Some(Screen::Login));
        assert_eq!(check(&store, Screen::Dashboard), Some(Screen::Login));
    }

    #[test]
    fn test_login_and_register_screens_are_open() {
        let (_dir, store) = store();
        assert_eq!(check(&store, Screen::Login), None);
        assert_eq!(check(&store, Screen::Register), None);
    }

    #[test]
    fn test_authenticated_session_passes_the_gate() {
        let (_dir, store) = store();
        store.login("token-1").expect("login");
        assert_eq!(check(&store, Screen::Resume), None);
    }

    #[tokio::test]
    async fn test_gate_rechecks_after_the_auth_signal_changes() {
        let (_dir, store) = store();
        store.login("token-1").expect("login");
        let mut auth = store.subscribe();
        assert_eq!(check(&store, Screen::Matches), None);

        store.logout();
        auth.changed().await.expect("signal");
        assert!(!*auth.borrow());
        assert_eq!(check(&store, Screen::Matches), Some(Screen::Login));
    }
}
