use std::time::Duration;

use async_trait::async_trait;
use shared::{
    domain::{CallId, ContactId},
    protocol::{BookingStatusResponse, ChannelEvent, DispatchRequest},
};

pub mod booking;
pub mod channel;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod retry;
pub mod sequencer;
pub mod session;
pub mod transcript;

pub use booking::RetryingBookingConfirmer;
pub use channel::{ChannelState, LiveUpdateChannel};
pub use contacts::ContactList;
pub use error::{ApiCallError, ChannelError, SequencerError, SessionError};
pub use sequencer::{CallSequencer, NoticeLevel, SequenceOutcome, SequencerEvent, SequencerState};
pub use session::SessionInput;
pub use transcript::Transcript;

/// Pause after `call_ended` so the backend can finalize the booking state.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const STATUS_RETRY_ATTEMPTS: usize = 5;
pub const STATUS_RETRY_DELAY: Duration = Duration::from_secs(5);

#[async_trait]
pub trait PhoneResolver: Send + Sync {
    /// `Ok(None)` means the lookup worked but the place lists no number.
    async fn resolve_phone_number(
        &self,
        contact_id: &ContactId,
    ) -> Result<Option<String>, ApiCallError>;
}

pub struct MissingPhoneResolver;

#[async_trait]
impl PhoneResolver for MissingPhoneResolver {
    async fn resolve_phone_number(
        &self,
        _contact_id: &ContactId,
    ) -> Result<Option<String>, ApiCallError> {
        Err(ApiCallError::Unavailable("phone resolution"))
    }
}

#[async_trait]
pub trait CallDispatcher: Send + Sync {
    async fn dispatch_call(&self, request: &DispatchRequest) -> Result<CallId, ApiCallError>;
}

#[async_trait]
pub trait BookingStatusApi: Send + Sync {
    async fn fetch_booking_status(
        &self,
        call_id: &CallId,
    ) -> Result<BookingStatusResponse, ApiCallError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    Confirmed,
    NotConfirmed,
    /// The status could not be determined; callers treat it as not booked.
    Indeterminate,
}

impl BookingOutcome {
    pub fn is_confirmed(self) -> bool {
        matches!(self, BookingOutcome::Confirmed)
    }
}

#[async_trait]
pub trait BookingConfirmer: Send + Sync {
    async fn check_booking_status(&self, call_id: &CallId) -> BookingOutcome;
}

/// Push feed of call events. Implementations must deliver events in arrival
/// order and must not write the tracking handshake before they are ready.
#[async_trait]
pub trait LiveUpdates: Send {
    /// Starts a fresh connection, closing any previous one.
    fn open(&mut self) -> Result<(), ChannelError>;
    /// Makes `call_id` the tracked call, replacing any previous one.
    fn track(&mut self, call_id: &CallId) -> Result<(), ChannelError>;
    /// `None` once the channel has been closed.
    async fn next_event(&mut self) -> Option<ChannelEvent>;
    /// Idempotent; also cancels a pending reconnect.
    fn close(&mut self);
    fn state(&self) -> ChannelState;
}
