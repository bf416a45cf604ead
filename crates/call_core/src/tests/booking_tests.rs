use super::*;

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use shared::protocol::BookingStatusResponse;
use tokio::time::Instant;

enum Reply {
    Status(&'static str),
    Http(u16),
}

struct ScriptedStatusApi {
    replies: Vec<Reply>,
    calls: AtomicUsize,
}

impl ScriptedStatusApi {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookingStatusApi for ScriptedStatusApi {
    async fn fetch_booking_status(
        &self,
        call_id: &CallId,
    ) -> Result<BookingStatusResponse, ApiCallError> {
        assert_eq!(call_id.as_str(), "call-1");
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(index).or_else(|| self.replies.last()) {
            Some(Reply::Status(status)) => Ok(BookingStatusResponse {
                status: status.to_string(),
            }),
            Some(Reply::Http(status)) => Err(ApiCallError::Status {
                status: *status,
                detail: "scripted failure".into(),
            }),
            None => panic!("no scripted replies"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_server_errors() {
    let api = ScriptedStatusApi::new(vec![Reply::Http(500)]);
    let confirmer = RetryingBookingConfirmer::new(api.clone());
    let started = Instant::now();

    let outcome = confirmer.check_booking_status(&CallId::new("call-1")).await;

    assert_eq!(outcome, BookingOutcome::Indeterminate);
    assert!(!outcome.is_confirmed());
    assert_eq!(api.calls(), 5);
    assert_eq!(started.elapsed(), STATUS_RETRY_DELAY * 4);
}

#[tokio::test(start_paused = true)]
async fn recovers_when_server_error_clears() {
    let api = ScriptedStatusApi::new(vec![
        Reply::Http(503),
        Reply::Http(500),
        Reply::Status("yes"),
    ]);
    let confirmer = RetryingBookingConfirmer::new(api.clone());

    let outcome = confirmer.check_booking_status(&CallId::new("call-1")).await;

    assert_eq!(outcome, BookingOutcome::Confirmed);
    assert_eq!(api.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_not_retried() {
    let api = ScriptedStatusApi::new(vec![Reply::Http(422), Reply::Status("yes")]);
    let confirmer = RetryingBookingConfirmer::with_policy(
        api.clone(),
        RetryPolicy::fixed(5, Duration::from_secs(1)),
    );

    let outcome = confirmer.check_booking_status(&CallId::new("call-1")).await;

    assert_eq!(outcome, BookingOutcome::Indeterminate);
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn any_status_other_than_yes_is_not_confirmed() {
    let api = ScriptedStatusApi::new(vec![Reply::Status("no")]);
    let confirmer = RetryingBookingConfirmer::new(api.clone());

    let outcome = confirmer.check_booking_status(&CallId::new("call-1")).await;

    assert_eq!(outcome, BookingOutcome::NotConfirmed);
    assert_eq!(api.calls(), 1);
}
