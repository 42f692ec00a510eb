use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::observable::Observable;
use crate::session::{Session, SessionStore};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Login,
    Otp { email: String },
    Home,
    Dashboard,
    SubmitIncident,
}

/// Ordered route stack; the root screen sits below it and is not part of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationStack<R> {
    routes: Vec<R>,
}

impl<R> Default for NavigationStack<R> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<R: Clone> NavigationStack<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigate(&mut self, route: R) {
        self.routes.push(route);
    }

    pub fn navigate_many(&mut self, routes: impl IntoIterator<Item = R>) {
        self.routes.extend(routes);
    }

    /// No-op on an empty stack.
    pub fn pop(&mut self) -> Option<R> {
        self.routes.pop()
    }

    /// Pops up to `count` routes and returns how many were removed.
    pub fn pop_count(&mut self, count: usize) -> usize {
        let removed = count.min(self.routes.len());
        self.routes.truncate(self.routes.len() - removed);
        removed
    }

    pub fn pop_to_root(&mut self) {
        self.routes.clear();
    }

    pub fn replace(&mut self, route: R) {
        self.routes.clear();
        self.routes.push(route);
    }

    pub fn can_pop(&self) -> bool {
        !self.routes.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.routes.len()
    }

    pub fn top(&self) -> Option<&R> {
        self.routes.last()
    }

    pub fn routes(&self) -> &[R] {
        &self.routes
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorState {
    pub stack: NavigationStack<Route>,
    pub session: Session,
    pub show_splash: bool,
}

type SessionListener = Arc<dyn Fn(&Session) + Send + Sync>;

/// Owns the route stack and the session. Performs no network calls.
pub struct AppCoordinator {
    state: Observable<CoordinatorState>,
    store: Arc<dyn SessionStore>,
    listeners: RwLock<Vec<SessionListener>>,
}

impl std::fmt::Debug for AppCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCoordinator")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl AppCoordinator {
    /// Restores the persisted session. Unreadable or inconsistent state
    /// starts signed out.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let session = match store.get() {
            Ok(session) if session.is_consistent() => session,
            Ok(session) => {
                warn!(
                    is_authenticated = session.is_authenticated(),
                    has_token = session.auth_token().is_some(),
                    "inconsistent persisted session, starting signed out"
                );
                Session::signed_out()
            }
            Err(e) => {
                error!(error = %e, "failed to restore session");
                Session::signed_out()
            }
        };

        Self {
            state: Observable::new(CoordinatorState {
                stack: NavigationStack::new(),
                session,
                show_splash: true,
            }),
            store,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Called after every session change with the new session.
    pub fn on_session_change(&self, listener: impl Fn(&Session) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    // ========================================================================
    // Stack
    // ========================================================================

    pub fn navigate(&self, route: Route) {
        self.state.update(|s| s.stack.navigate(route));
    }

    pub fn navigate_many(&self, routes: Vec<Route>) {
        self.state.update(|s| s.stack.navigate_many(routes));
    }

    pub fn pop(&self) {
        self.state.update(|s| {
            s.stack.pop();
        });
    }

    pub fn pop_count(&self, count: usize) {
        self.state.update(|s| {
            s.stack.pop_count(count);
        });
    }

    pub fn pop_to_root(&self) {
        self.state.update(|s| s.stack.pop_to_root());
    }

    pub fn replace(&self, route: Route) {
        self.state.update(|s| s.stack.replace(route));
    }

    pub fn can_pop(&self) -> bool {
        self.state.with(|s| s.stack.can_pop())
    }

    pub fn stack_depth(&self) -> usize {
        self.state.with(|s| s.stack.depth())
    }

    pub fn routes(&self) -> Vec<Route> {
        self.state.with(|s| s.stack.routes().to_vec())
    }

    pub fn navigate_to_otp(&self, email: impl Into<String>) {
        self.navigate(Route::Otp {
            email: email.into(),
        });
    }

    pub fn navigate_to_dashboard(&self) {
        self.navigate(Route::Dashboard);
    }

    pub fn navigate_to_submit_incident(&self) {
        self.navigate(Route::SubmitIncident);
    }

    pub fn navigate_back(&self) {
        self.pop();
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn session(&self) -> Session {
        self.state.with(|s| s.session.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.with(|s| s.session.is_authenticated())
    }

    pub fn current_user(&self) -> Option<String> {
        self.state
            .with(|s| s.session.current_user().map(str::to_string))
    }

    pub fn auth_token(&self) -> Option<String> {
        self.state.with(|s| s.session.auth_token().map(str::to_string))
    }

    /// Screen shown beneath the stack.
    pub fn root_route(&self) -> Route {
        if self.is_authenticated() {
            Route::Home
        } else {
            Route::Login
        }
    }

    pub fn show_splash(&self) -> bool {
        self.state.with(|s| s.show_splash)
    }

    pub fn splash_completed(&self) {
        self.state.update(|s| s.show_splash = false);
    }

    pub fn login_succeeded(&self, email: &str, token: &str) {
        let session = Session::signed_in(email, token);
        if let Err(e) = self.store.set(&session) {
            error!(error = %e, "failed to persist session");
        }
        self.state.update(|s| {
            s.session = session.clone();
            s.stack.pop_to_root();
        });
        info!("signed in");
        self.notify(&session);
    }

    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "failed to clear persisted session");
        }
        self.state.update(|s| {
            s.session = Session::signed_out();
            s.stack.pop_to_root();
            s.stack.navigate(Route::Login);
        });
        info!("signed out");
        self.notify(&Session::signed_out());
    }

    /// Runs a snapshot of the listeners with the registry lock released.
    fn notify(&self, session: &Session) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(session);
        }
    }
}
