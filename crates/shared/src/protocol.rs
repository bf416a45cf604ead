use serde::{Deserialize, Serialize};

use crate::domain::{CallId, Contact, ContactId};

/// Client to server messages on the notifications socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelRequest {
    Start { transcription_id: CallId },
}

/// Server pushed events on the notifications socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    CallInProcess {
        #[serde(default)]
        transcription: String,
    },
    CallEnded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_sid: Option<CallId>,
    },
    CallNotPicked {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_sid: Option<CallId>,
    },
    #[serde(other)]
    Unknown,
}

impl ChannelEvent {
    /// The call an outcome event refers to, when the server names one.
    pub fn call_sid(&self) -> Option<&CallId> {
        match self {
            ChannelEvent::CallEnded { call_sid } | ChannelEvent::CallNotPicked { call_sid } => {
                call_sid.as_ref()
            }
            ChannelEvent::CallInProcess { .. } | ChannelEvent::Unknown => None,
        }
    }
}

pub const DISPATCH_OBJECTIVE: &str = "Schedule an appointment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub objective: String,
    pub context: String,
    pub caller_number: String,
    pub caller_name: String,
    pub name_of_org: String,
    pub caller_email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub call_id: CallId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingStatusRequest {
    pub call_id: CallId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingStatusResponse {
    #[serde(default)]
    pub status: String,
}

impl BookingStatusResponse {
    pub fn is_booked(&self) -> bool {
        self.status == "yes"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceDetailsResponse {
    #[serde(default)]
    pub result: Option<PlaceDetails>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub formatted_phone_number: Option<String>,
}

/// Search results handed over by the upstream screen (`statusData`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusData {
    #[serde(default)]
    pub results: Vec<PlaceResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceResult {
    pub place_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl From<PlaceResult> for Contact {
    fn from(value: PlaceResult) -> Self {
        Contact::new(ContactId(value.place_id), value.name, value.phone_number)
    }
}

/// Caller and patient details collected by the upstream form (`formData`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallForm {
    pub email: String,
    pub phone_number: String,
    pub patient_name: String,
    pub objective: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_appointment: Option<String>,
    #[serde(
        default,
        rename = "isnewPatient",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_new_patient: Option<Flag>,
}

/// A yes/no form field that may arrive as a JSON bool or as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    /// Value forwarded in the dispatch context. `false` and blank text are
    /// omitted; any other text is passed through unchanged.
    pub fn context_value(&self) -> Option<String> {
        match self {
            Flag::Bool(true) => Some("true".to_string()),
            Flag::Bool(false) => None,
            Flag::Text(text) => Some(text.trim())
                .filter(|text| !text.is_empty())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_handshake_matches_wire_shape() {
        let request = ChannelRequest::Start {
            transcription_id: CallId::new("call-42"),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"event": "start", "transcription_id": "call-42"})
        );
    }

    #[test]
    fn decodes_server_events() {
        let fragment: ChannelEvent =
            serde_json::from_str(r#"{"event":"call_in_process","transcription":"Hello"}"#)
                .expect("fragment");
        assert_eq!(
            fragment,
            ChannelEvent::CallInProcess {
                transcription: "Hello".into()
            }
        );

        let ended: ChannelEvent =
            serde_json::from_str(r#"{"event":"call_ended","call_sid":"sid-1"}"#).expect("ended");
        assert_eq!(
            ended,
            ChannelEvent::CallEnded {
                call_sid: Some(CallId::new("sid-1"))
            }
        );

        let not_picked: ChannelEvent =
            serde_json::from_str(r#"{"event":"call_not_picked","call_sid":"sid-1"}"#)
                .expect("not picked");
        assert_eq!(
            not_picked,
            ChannelEvent::CallNotPicked {
                call_sid: Some(CallId::new("sid-1"))
            }
        );
        assert_eq!(not_picked.call_sid(), Some(&CallId::new("sid-1")));

        let bare: ChannelEvent =
            serde_json::from_str(r#"{"event":"call_not_picked"}"#).expect("bare not picked");
        assert_eq!(bare, ChannelEvent::CallNotPicked { call_sid: None });
        assert_eq!(bare.call_sid(), None);

        let other: ChannelEvent =
            serde_json::from_str(r#"{"event":"heartbeat"}"#).expect("unknown");
        assert_eq!(other, ChannelEvent::Unknown);
    }

    #[test]
    fn new_patient_flag_accepts_bool_or_text() {
        let form: CallForm = serde_json::from_str(
            r#"{"email":"a@b.c","phoneNumber":"+1","patientName":"Ann","objective":"Checkup","isnewPatient":"Y"}"#,
        )
        .expect("form");
        assert_eq!(
            form.is_new_patient.expect("flag").context_value().as_deref(),
            Some("Y")
        );
        assert_eq!(Flag::Bool(true).context_value().as_deref(), Some("true"));
        assert_eq!(Flag::Bool(false).context_value(), None);
        assert_eq!(Flag::Text("  ".into()).context_value(), None);
    }

    #[test]
    fn only_exact_yes_counts_as_booked() {
        let status = |value: &str| BookingStatusResponse {
            status: value.to_string(),
        };
        assert!(status("yes").is_booked());
        assert!(!status("YES").is_booked());
        assert!(!status("Yes ").is_booked());
        assert!(!status("no").is_booked());
        assert!(!status("").is_booked());
    }
}
