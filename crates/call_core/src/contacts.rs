use futures::future::join_all;
use shared::domain::{Contact, ContactId};
use tracing::{info, warn};

use crate::PhoneResolver;

/// Ordered call targets plus the sequencing cursor.
///
/// The order is user editable until the sequence is confirmed. After that the
/// list is frozen and `active_index` only moves forward.
#[derive(Debug, Clone, Default)]
pub struct ContactList {
    contacts: Vec<Contact>,
    active_index: usize,
    confirmed: bool,
}

impl ContactList {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self {
            contacts,
            active_index: 0,
            confirmed: false,
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Contact> {
        self.contacts.get(index)
    }

    pub fn current(&self) -> Option<&Contact> {
        self.contacts.get(self.active_index)
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn position_of(&self, id: &ContactId) -> Option<usize> {
        self.contacts.iter().position(|contact| &contact.id == id)
    }

    /// Moves the contact at `from` to `to`, shifting the ones in between.
    /// Returns whether the order changed.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if self.confirmed {
            warn!(from, to, "ignoring reorder of a confirmed call sequence");
            return false;
        }
        if from == to || from >= self.contacts.len() || to >= self.contacts.len() {
            return false;
        }
        let contact = self.contacts.remove(from);
        self.contacts.insert(to, contact);
        true
    }

    /// Phone numbers index-aligned with `contacts()`.
    pub fn phone_numbers(&self) -> Vec<Option<String>> {
        self.contacts
            .iter()
            .map(|contact| contact.phone_number.clone())
            .collect()
    }

    /// Looks up every contact that has no phone number yet. Lookups run
    /// concurrently; a failed lookup leaves that contact without a number.
    /// Returns how many numbers were filled in.
    pub async fn resolve_phone_numbers(&mut self, resolver: &dyn PhoneResolver) -> usize {
        let lookups = self.contacts.iter().map(|contact| async move {
            if contact.phone_number.is_some() {
                return None;
            }
            match resolver.resolve_phone_number(&contact.id).await {
                Ok(number) => number.filter(|number| !number.trim().is_empty()),
                Err(err) => {
                    warn!(contact_id = %contact.id, error = %err, "phone number lookup failed");
                    None
                }
            }
        });
        let resolved = join_all(lookups).await;

        let mut filled = 0;
        for (contact, number) in self.contacts.iter_mut().zip(resolved) {
            if let Some(number) = number {
                contact.phone_number = Some(number);
                filled += 1;
            }
        }
        info!(
            contacts = self.contacts.len(),
            filled, "phone number resolution finished"
        );
        filled
    }

    pub(crate) fn confirm(&mut self) {
        self.confirmed = true;
    }

    pub(crate) fn unconfirm(&mut self) {
        self.confirmed = false;
    }

    /// Moves the cursor one step forward. The cursor may end up past the last
    /// contact, which marks the sequence as exhausted.
    pub(crate) fn advance(&mut self) -> usize {
        if self.active_index < self.contacts.len() {
            self.active_index += 1;
        }
        self.active_index
    }

    /// First contact at or after the cursor that has a phone number. Contacts
    /// without one are passed over and returned in `skipped`.
    pub(crate) fn seek_dialable(&mut self) -> (Option<usize>, Vec<Contact>) {
        let mut skipped = Vec::new();
        while let Some(contact) = self.current() {
            if contact.is_dialable() {
                return (Some(self.active_index), skipped);
            }
            skipped.push(contact.clone());
            self.advance();
        }
        (None, skipped)
    }
}

#[cfg(test)]
#[path = "tests/contacts_tests.rs"]
mod tests;
