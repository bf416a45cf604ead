use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ContactId);
id_newtype!(CallId);

/// A callable target. The identifier is the place id handed over by the
/// search screen and never changes once the contact exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl Contact {
    pub fn new(id: ContactId, name: impl Into<String>, phone_number: Option<String>) -> Self {
        Self {
            id,
            name: strip_list_numbering(&name.into()).to_string(),
            phone_number: phone_number.filter(|number| !number.trim().is_empty()),
        }
    }

    pub fn is_dialable(&self) -> bool {
        self.phone_number.is_some()
    }
}

/// Drops a leading `"3. "` style prefix; list position provides numbering.
pub fn strip_list_numbering(name: &str) -> &str {
    let digits = name.len() - name.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return name;
    }
    match name[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    InProgress,
    Ended,
    NotPicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub call_id: CallId,
    pub contact_id: ContactId,
    pub status: CallStatus,
}

impl CallRecord {
    pub fn initiated(call_id: CallId, contact_id: ContactId) -> Self {
        Self {
            call_id,
            contact_id,
            status: CallStatus::Initiated,
        }
    }
}
