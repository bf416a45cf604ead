use std::{collections::HashSet, fs, io, path::Path};

use shared::{
    domain::Contact,
    protocol::{CallForm, StatusData},
};
use tracing::{info, warn};

use crate::{contacts::ContactList, SessionError};

pub const MAX_CONTACTS: usize = 10;
pub const STATUS_DATA_FILE: &str = "statusData.json";
pub const FORM_DATA_FILE: &str = "formData.json";

/// Hand-off from the search and intake screens: who to call and on whose
/// behalf.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub contacts: Vec<Contact>,
    pub form: CallForm,
}

impl SessionInput {
    /// Builds the session from raw payloads. A missing contact list or form
    /// is a redirect condition, not a parse error.
    pub fn from_json(
        status_data: Option<&str>,
        form_data: Option<&str>,
    ) -> Result<Self, SessionError> {
        let status_data = status_data
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(SessionError::MissingContacts)?;
        let status: StatusData =
            serde_json::from_str(status_data).map_err(|source| SessionError::Invalid {
                name: STATUS_DATA_FILE,
                source,
            })?;

        let mut seen = HashSet::new();
        let contacts: Vec<Contact> = status
            .results
            .into_iter()
            .take(MAX_CONTACTS)
            .filter(|result| {
                let fresh = seen.insert(result.place_id.clone());
                if !fresh {
                    warn!(place_id = %result.place_id, "dropping duplicate search result");
                }
                fresh
            })
            .map(Contact::from)
            .collect();
        if contacts.is_empty() {
            return Err(SessionError::MissingContacts);
        }

        let form_data = form_data
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(SessionError::MissingForm)?;
        let form: CallForm =
            serde_json::from_str(form_data).map_err(|source| SessionError::Invalid {
                name: FORM_DATA_FILE,
                source,
            })?;

        Ok(Self { contacts, form })
    }

    /// Reads `statusData.json` and `formData.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SessionError> {
        let status_data = read_optional(&dir.join(STATUS_DATA_FILE))?;
        let form_data = read_optional(&dir.join(FORM_DATA_FILE))?;
        let session = Self::from_json(status_data.as_deref(), form_data.as_deref())?;
        info!(
            dir = %dir.display(),
            contacts = session.contacts.len(),
            "session input loaded"
        );
        Ok(session)
    }

    pub fn contact_list(&self) -> ContactList {
        ContactList::new(self.contacts.clone())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, SessionError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SessionError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
