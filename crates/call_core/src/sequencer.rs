use std::{sync::Arc, time::Duration};

use shared::{
    domain::{CallId, CallRecord, CallStatus, Contact, ContactId},
    protocol::{CallForm, ChannelEvent},
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    contacts::ContactList, dispatch::build_dispatch_request, transcript::Transcript,
    BookingConfirmer, CallDispatcher, LiveUpdates, SequencerError, SETTLE_DELAY,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Dialing { index: usize },
    AwaitingOutcome { index: usize, call_id: CallId },
    Advancing { from: usize },
    Completed(SequenceOutcome),
}

impl SequencerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequencerState::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    Booked {
        contact_id: ContactId,
        call_id: CallId,
    },
    /// Every contact was tried (or skipped) without a confirmed booking.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub enum SequencerEvent {
    StateChanged(SequencerState),
    Notice { level: NoticeLevel, message: String },
    CallStarted {
        index: usize,
        contact: Contact,
        call_id: CallId,
    },
    TranscriptLine(String),
}

/// Walks the confirmed contact list one call at a time.
///
/// The sequencer owns the live update channel. It dispatches a call, tracks it
/// on the channel, and reacts to the call's events until a booking is
/// confirmed or the list runs out. At most one call is in flight.
pub struct CallSequencer {
    contacts: ContactList,
    form: CallForm,
    dispatcher: Arc<dyn CallDispatcher>,
    confirmer: Arc<dyn BookingConfirmer>,
    channel: Box<dyn LiveUpdates>,
    settle_delay: Duration,
    state: SequencerState,
    active_call: Option<CallRecord>,
    transcript: Transcript,
    events: broadcast::Sender<SequencerEvent>,
}

impl CallSequencer {
    pub fn new(
        contacts: ContactList,
        form: CallForm,
        dispatcher: Arc<dyn CallDispatcher>,
        confirmer: Arc<dyn BookingConfirmer>,
        channel: Box<dyn LiveUpdates>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            contacts,
            form,
            dispatcher,
            confirmer,
            channel,
            settle_delay: SETTLE_DELAY,
            state: SequencerState::Idle,
            active_call: None,
            transcript: Transcript::default(),
            events,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn contacts(&self) -> &ContactList {
        &self.contacts
    }

    pub fn active_call(&self) -> Option<&CallRecord> {
        self.active_call.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SequencerEvent> {
        self.events.subscribe()
    }

    /// No-op once the sequence is confirmed.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        self.contacts.reorder(from, to)
    }

    /// Freezes the list, opens the live channel and dials the first contact
    /// that has a phone number. A failed dispatch un-confirms the sequence so
    /// it can be confirmed again.
    pub async fn confirm(&mut self) -> Result<(), SequencerError> {
        if self.state != SequencerState::Idle || self.contacts.is_confirmed() {
            return Err(SequencerError::AlreadyConfirmed);
        }
        self.contacts.confirm();
        self.channel.close();
        if let Err(err) = self.channel.open() {
            error!(error = %err, "failed to open live update channel");
            self.contacts.unconfirm();
            return Err(err.into());
        }
        info!(
            contacts = self.contacts.len(),
            start_index = self.contacts.active_index(),
            "call sequence confirmed"
        );
        self.dial_from_cursor().await
    }

    /// Drives the sequence from channel events until it completes.
    pub async fn run(&mut self) -> Result<SequenceOutcome, SequencerError> {
        loop {
            match &self.state {
                SequencerState::Completed(outcome) => return Ok(outcome.clone()),
                SequencerState::Idle => return Err(SequencerError::NotConfirmed),
                _ => {}
            }
            let Some(event) = self.channel.next_event().await else {
                warn!("live update channel ended before the sequence completed");
                self.channel.close();
                return Err(SequencerError::ChannelClosed);
            };
            self.handle_event(event).await?;
        }
    }

    /// Applies one channel event. Events are ignored unless a call is
    /// awaiting its outcome, and outcome events naming a different call are
    /// ignored too.
    pub async fn handle_event(&mut self, event: ChannelEvent) -> Result<(), SequencerError> {
        let (SequencerState::AwaitingOutcome { index, call_id }, Some(call)) =
            (self.state.clone(), self.active_call.clone())
        else {
            debug!(?event, state = ?self.state, "ignoring live update outside an active call");
            return Ok(());
        };
        if let Some(event_call) = event.call_sid() {
            if *event_call != call_id {
                debug!(
                    call_id = %call_id,
                    event_call_id = %event_call,
                    ?event,
                    "ignoring live update for another call"
                );
                return Ok(());
            }
        }

        match event {
            ChannelEvent::CallInProcess { transcription } => {
                self.set_call_status(CallStatus::InProgress);
                let line = self.transcript.push(transcription).line();
                let _ = self.events.send(SequencerEvent::TranscriptLine(line));
            }
            ChannelEvent::CallEnded { call_sid } => {
                self.set_call_status(CallStatus::Ended);
                let lookup_id = call_sid.unwrap_or_else(|| call_id.clone());
                info!(
                    call_id = %call_id,
                    lookup_id = %lookup_id,
                    settle_ms = self.settle_delay.as_millis() as u64,
                    "call ended; waiting before checking booking status"
                );
                tokio::time::sleep(self.settle_delay).await;

                let outcome = self.confirmer.check_booking_status(&lookup_id).await;
                if outcome.is_confirmed() {
                    info!(call_id = %call_id, contact_id = %call.contact_id, "booking confirmed");
                    self.notice(NoticeLevel::Success, "Appointment booked successfully");
                    self.channel.close();
                    self.set_state(SequencerState::Completed(SequenceOutcome::Booked {
                        contact_id: call.contact_id,
                        call_id,
                    }));
                } else {
                    info!(call_id = %call_id, ?outcome, "booking not confirmed");
                    self.notice(
                        NoticeLevel::Warning,
                        "Appointment could not be booked. Trying next contact...",
                    );
                    self.advance(index).await?;
                }
            }
            ChannelEvent::CallNotPicked { .. } => {
                self.set_call_status(CallStatus::NotPicked);
                info!(call_id = %call_id, index, "call not picked up");
                self.notice(
                    NoticeLevel::Info,
                    "Contact did not pick up. Trying next contact...",
                );
                self.advance(index).await?;
            }
            ChannelEvent::Unknown => {
                debug!(call_id = %call_id, "ignoring unrecognised live update");
            }
        }
        Ok(())
    }

    /// Ends the session early, e.g. when the user navigates away.
    pub fn close(&mut self) {
        self.channel.close();
    }

    async fn advance(&mut self, from: usize) -> Result<(), SequencerError> {
        self.set_state(SequencerState::Advancing { from });
        self.contacts.advance();
        self.dial_from_cursor().await
    }

    async fn dial_from_cursor(&mut self) -> Result<(), SequencerError> {
        let (next, skipped) = self.contacts.seek_dialable();
        for contact in skipped {
            warn!(contact_id = %contact.id, name = %contact.name, "skipping contact without phone number");
            self.notice(
                NoticeLevel::Warning,
                format!("{} has no phone number. Skipping...", contact.name),
            );
        }

        let Some(index) = next else {
            self.finish_exhausted();
            return Ok(());
        };
        let Some(contact) = self.contacts.get(index).cloned() else {
            self.finish_exhausted();
            return Ok(());
        };
        let Some(request) = build_dispatch_request(&self.form, &contact) else {
            // seek_dialable only stops on contacts with a number.
            self.finish_exhausted();
            return Ok(());
        };

        self.set_state(SequencerState::Dialing { index });
        info!(index, contact_id = %contact.id, name = %contact.name, "dispatching call");

        let call_id = match self.dispatcher.dispatch_call(&request).await {
            Ok(call_id) => call_id,
            Err(err) => {
                error!(index, contact_id = %contact.id, error = %err, "call dispatch failed");
                self.notice(NoticeLevel::Error, err.detail());
                self.revert_to_idle();
                return Err(SequencerError::Dispatch {
                    contact_id: contact.id,
                    source: err,
                });
            }
        };

        self.transcript.clear();
        self.active_call = Some(CallRecord::initiated(call_id.clone(), contact.id.clone()));
        if let Err(err) = self.channel.track(&call_id) {
            error!(call_id = %call_id, error = %err, "failed to track call on live channel");
            self.revert_to_idle();
            return Err(err.into());
        }

        info!(index, call_id = %call_id, "call dispatched");
        let _ = self.events.send(SequencerEvent::CallStarted {
            index,
            contact,
            call_id: call_id.clone(),
        });
        self.set_state(SequencerState::AwaitingOutcome { index, call_id });
        Ok(())
    }

    fn finish_exhausted(&mut self) {
        info!(contacts = self.contacts.len(), "call sequence exhausted");
        self.notice(NoticeLevel::Success, "All contacts have been called.");
        self.contacts.unconfirm();
        self.channel.close();
        self.set_state(SequencerState::Completed(SequenceOutcome::Exhausted));
    }

    fn revert_to_idle(&mut self) {
        self.contacts.unconfirm();
        self.channel.close();
        self.active_call = None;
        self.set_state(SequencerState::Idle);
    }

    fn set_call_status(&mut self, status: CallStatus) {
        if let Some(call) = self.active_call.as_mut() {
            call.status = status;
        }
    }

    fn set_state(&mut self, state: SequencerState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "sequencer state change");
        self.state = state.clone();
        let _ = self.events.send(SequencerEvent::StateChanged(state));
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.events.send(SequencerEvent::Notice {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
#[path = "tests/sequencer_tests.rs"]
mod tests;
