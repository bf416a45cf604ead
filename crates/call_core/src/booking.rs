use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::CallId;
use tracing::{info, warn};

use crate::{
    retry::{retry_with_fixed_delay, RetryOutcome, RetryPolicy},
    ApiCallError, BookingConfirmer, BookingOutcome, BookingStatusApi, STATUS_RETRY_ATTEMPTS,
    STATUS_RETRY_DELAY,
};

/// Asks the backend whether a finished call booked an appointment, retrying
/// server-side failures and folding every other failure into
/// [`BookingOutcome::Indeterminate`].
pub struct RetryingBookingConfirmer {
    api: Arc<dyn BookingStatusApi>,
    policy: RetryPolicy,
}

impl RetryingBookingConfirmer {
    pub fn new(api: Arc<dyn BookingStatusApi>) -> Self {
        Self::with_policy(
            api,
            RetryPolicy::fixed(STATUS_RETRY_ATTEMPTS, STATUS_RETRY_DELAY),
        )
    }

    pub fn with_policy(api: Arc<dyn BookingStatusApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }
}

#[async_trait]
impl BookingConfirmer for RetryingBookingConfirmer {
    async fn check_booking_status(&self, call_id: &CallId) -> BookingOutcome {
        let api: &dyn BookingStatusApi = self.api.as_ref();
        let outcome = retry_with_fixed_delay(
            "booking_status",
            self.policy,
            move |_| api.fetch_booking_status(call_id),
            ApiCallError::is_server_error,
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                let booked = value.is_booked();
                info!(
                    call_id = %call_id,
                    attempts,
                    status = %value.status,
                    booked,
                    "booking status received"
                );
                if booked {
                    BookingOutcome::Confirmed
                } else {
                    BookingOutcome::NotConfirmed
                }
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    call_id = %call_id,
                    attempts,
                    error = %last_error,
                    "booking status unavailable after retries; treating as not booked"
                );
                BookingOutcome::Indeterminate
            }
            RetryOutcome::Aborted { attempts, error } => {
                warn!(
                    call_id = %call_id,
                    attempts,
                    error = %error,
                    "booking status request failed; treating as not booked"
                );
                BookingOutcome::Indeterminate
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/booking_tests.rs"]
mod tests;
