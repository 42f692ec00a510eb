use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::instrument;

use crate::navigation::AppCoordinator;
use crate::observable::Observable;
use crate::use_cases::LoginUseCase;

pub const EMPTY_EMAIL_MESSAGE: &str = "Please enter your email address";
pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address";

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9a-z._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,64}$")
        .expect("email pattern compiles")
});

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoginState {
    pub email: String,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub login_success: bool,
}

pub struct LoginViewModel {
    state: Observable<LoginState>,
    login: LoginUseCase,
    coordinator: Arc<AppCoordinator>,
}

impl LoginViewModel {
    pub fn new(login: LoginUseCase, coordinator: Arc<AppCoordinator>) -> Self {
        Self {
            state: Observable::default(),
            login,
            coordinator,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    pub fn set_email(&self, email: impl Into<String>) {
        let email = email.into();
        self.state.update(|s| s.email = email);
    }

    /// Validates the address locally, then asks the backend to send a code.
    /// On success the OTP screen is pushed.
    #[instrument(skip(self))]
    pub async fn login(&self) {
        let email = self.state.with(|s| s.email.clone());

        if email.is_empty() {
            self.state
                .update(|s| s.error_message = Some(EMPTY_EMAIL_MESSAGE.to_string()));
            return;
        }
        if !is_valid_email(&email) {
            self.state
                .update(|s| s.error_message = Some(INVALID_EMAIL_MESSAGE.to_string()));
            return;
        }

        self.state.update(|s| {
            s.is_loading = true;
            s.error_message = None;
            s.login_success = false;
        });

        match self.login.execute(&email).await {
            Ok(_) => {
                self.state.update(|s| {
                    s.is_loading = false;
                    s.login_success = true;
                });
                self.coordinator.navigate_to_otp(email);
            }
            Err(e) => self.state.update(|s| {
                s.is_loading = false;
                s.error_message = Some(e.to_string());
            }),
        }
    }

    pub fn clear_error(&self) {
        self.state.update(|s| s.error_message = None);
    }

    pub fn reset(&self) {
        self.state.update(|s| *s = LoginState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Route;
    use crate::repository::testing::FakeRepository;
    use crate::view_models::testing::fixtures;
    use crate::ApiError;

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("user@test.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("user@test"));
        assert!(!is_valid_email("user test@test.com"));
        assert!(!is_valid_email("@test.com"));
        assert!(!is_valid_email("user@test.c"));
    }

    #[tokio::test]
    async fn empty_email_is_rejected_locally() {
        let (repo, coordinator) = fixtures();
        let vm = LoginViewModel::new(LoginUseCase::new(repo.clone()), coordinator.clone());

        vm.login().await;

        assert_eq!(vm.state().error_message.as_deref(), Some(EMPTY_EMAIL_MESSAGE));
        assert!(repo.calls().is_empty());
        assert_eq!(coordinator.stack_depth(), 0);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_locally() {
        let (repo, coordinator) = fixtures();
        let vm = LoginViewModel::new(LoginUseCase::new(repo.clone()), coordinator);

        vm.set_email("not-an-email");
        vm.login().await;

        assert_eq!(vm.state().error_message.as_deref(), Some(INVALID_EMAIL_MESSAGE));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn ok_navigates_to_otp() {
        let (repo, coordinator) = fixtures();
        FakeRepository::set(&repo.login, Ok("OK".into()));
        let vm = LoginViewModel::new(LoginUseCase::new(repo.clone()), coordinator.clone());

        vm.set_email("user@test.com");
        vm.login().await;

        let state = vm.state();
        assert!(state.login_success);
        assert!(!state.is_loading);
        assert_eq!(state.error_message, None);
        assert_eq!(
            coordinator.routes(),
            vec![Route::Otp {
                email: "user@test.com".into()
            }]
        );
    }

    #[tokio::test]
    async fn failed_response_shows_error_without_navigation() {
        let (repo, coordinator) = fixtures();
        FakeRepository::set(&repo.login, Ok("FAILED".into()));
        let vm = LoginViewModel::new(LoginUseCase::new(repo.clone()), coordinator.clone());

        vm.set_email("user@test.com");
        vm.login().await;

        let state = vm.state();
        assert!(!state.login_success);
        assert!(!state.is_loading);
        assert_eq!(state.error_message.as_deref(), Some("Login failed: FAILED"));
        assert_eq!(coordinator.stack_depth(), 0);
    }

    #[tokio::test]
    async fn network_error_is_displayed_and_cleared() {
        let (repo, coordinator) = fixtures();
        FakeRepository::set(&repo.login, Err(ApiError::NetworkError("offline".into())));
        let vm = LoginViewModel::new(LoginUseCase::new(repo.clone()), coordinator);

        vm.set_email("user@test.com");
        vm.login().await;
        assert_eq!(
            vm.state().error_message.as_deref(),
            Some("Network error: offline")
        );

        vm.clear_error();
        assert_eq!(vm.state().error_message, None);

        vm.reset();
        assert_eq!(vm.state(), LoginState::default());
    }
}
