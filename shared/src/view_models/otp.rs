use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::navigation::AppCoordinator;
use crate::observable::Observable;
use crate::use_cases::VerifyOtpUseCase;
use crate::OTP_LENGTH;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OtpState {
    pub otp: String,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub verification_success: bool,
}

impl OtpState {
    pub fn can_verify(&self) -> bool {
        self.otp.chars().count() == OTP_LENGTH && !self.is_loading
    }
}

pub struct OtpViewModel {
    email: String,
    state: Observable<OtpState>,
    verify: VerifyOtpUseCase,
    coordinator: Arc<AppCoordinator>,
    success_delay: Duration,
}

impl OtpViewModel {
    pub fn new(
        email: impl Into<String>,
        verify: VerifyOtpUseCase,
        coordinator: Arc<AppCoordinator>,
        success_delay: Duration,
    ) -> Self {
        Self {
            email: email.into(),
            state: Observable::default(),
            verify,
            coordinator,
            success_delay,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn state(&self) -> OtpState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<OtpState> {
        self.state.subscribe()
    }

    pub fn can_verify(&self) -> bool {
        self.state.with(OtpState::can_verify)
    }

    /// Keeps the first four characters, then drops anything that is not a
    /// digit. Reaching four digits from a different value triggers
    /// verification once.
    pub async fn update_otp(&self, input: &str) {
        let filtered: String = input
            .chars()
            .take(OTP_LENGTH)
            .filter(char::is_ascii_digit)
            .collect();

        let mut should_verify = false;
        self.state.update(|s| {
            should_verify = s.otp != filtered && filtered.len() == OTP_LENGTH;
            s.otp = filtered;
        });

        if should_verify {
            self.verify_otp().await;
        }
    }

    #[instrument(skip(self))]
    pub async fn verify_otp(&self) {
        let Some(otp) = self
            .state
            .with(|s| s.can_verify().then(|| s.otp.clone()))
        else {
            return;
        };

        self.state.update(|s| {
            s.is_loading = true;
            s.error_message = None;
            s.verification_success = false;
        });

        match self.verify.execute(&self.email, &otp).await {
            Ok(entity) => {
                self.state.update(|s| {
                    s.is_loading = false;
                    s.verification_success = true;
                });
                if !self.success_delay.is_zero() {
                    tokio::time::sleep(self.success_delay).await;
                }
                info!("otp verified");
                self.coordinator
                    .login_succeeded(&self.email, entity.token.expose_secret());
            }
            Err(e) => self.state.update(|s| {
                s.is_loading = false;
                s.error_message = Some(e.to_string());
            }),
        }
    }

    /// Clears the entered code so the user can type a fresh one.
    pub fn resend_otp(&self) {
        self.state.update(|s| {
            s.otp.clear();
            s.error_message = None;
        });
    }

    pub fn clear_error(&self) {
        self.state.update(|s| s.error_message = None);
    }

    pub fn go_back(&self) {
        self.coordinator.pop();
    }
}
