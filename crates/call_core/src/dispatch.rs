use std::fmt;

use shared::{
    domain::Contact,
    protocol::{CallForm, DispatchRequest, DISPATCH_OBJECTIVE},
};

/// Context string sent with every dispatch: the caller's objective followed
/// by `; key:value` segments for the optional form fields that are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    objective: String,
    fields: Vec<(&'static str, String)>,
}

impl DispatchContext {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            fields: Vec::new(),
        }
    }

    /// Adds `key:value` when `value` is present and not blank.
    pub fn field(mut self, key: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
            self.fields.push((key, value.to_string()));
        }
        self
    }

    pub fn from_form(form: &CallForm) -> Self {
        let new_patient = form.is_new_patient.as_ref().and_then(|flag| flag.context_value());

        Self::new(form.objective.trim())
            .field("subscriberId", form.subscriber_id.as_deref())
            .field("insurerId", form.insurer_id.as_deref())
            .field("groupId", form.group_id.as_deref())
            .field("dateOfBirth", form.dob.as_deref())
            .field("address", form.address.as_deref())
            .field("availability", form.selected_availability.as_deref())
            .field("timeOfAppointment", form.time_of_appointment.as_deref())
            .field("isnewPatient", new_patient.as_deref())
    }
}

impl fmt::Display for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.objective)?;
        for (key, value) in &self.fields {
            write!(f, "; {key}:{value}")?;
        }
        Ok(())
    }
}

/// Builds the dispatch payload for `contact`, or `None` if it has no number.
pub fn build_dispatch_request(form: &CallForm, contact: &Contact) -> Option<DispatchRequest> {
    let phone_number = contact.phone_number.clone()?;
    Some(DispatchRequest {
        objective: DISPATCH_OBJECTIVE.to_string(),
        context: DispatchContext::from_form(form).to_string(),
        caller_number: form.phone_number.clone(),
        caller_name: form.patient_name.clone(),
        name_of_org: contact.name.clone(),
        caller_email: form.email.clone(),
        phone_number,
    })
}
