use super::*;

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::ApiCallError;

fn list(ids: &[&str]) -> ContactList {
    ContactList::new(
        ids.iter()
            .map(|id| Contact::new(ContactId::new(*id), format!("Clinic {id}"), None))
            .collect(),
    )
}

fn order(list: &ContactList) -> Vec<&str> {
    list.contacts()
        .iter()
        .map(|contact| contact.id.as_str())
        .collect()
}

enum Lookup {
    Found(&'static str),
    NoNumber,
    Fails,
}

struct MapResolver {
    lookups: HashMap<&'static str, Lookup>,
    calls: AtomicUsize,
}

impl MapResolver {
    fn new(lookups: Vec<(&'static str, Lookup)>) -> Self {
        Self {
            lookups: lookups.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PhoneResolver for MapResolver {
    async fn resolve_phone_number(
        &self,
        contact_id: &ContactId,
    ) -> Result<Option<String>, ApiCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.lookups.get(contact_id.as_str()) {
            Some(Lookup::Found(number)) => Ok(Some(number.to_string())),
            Some(Lookup::NoNumber) => Ok(None),
            Some(Lookup::Fails) | None => Err(ApiCallError::Rejected("NOT_FOUND".into())),
        }
    }
}

#[test]
fn reorder_moves_element_and_keeps_relative_order() {
    let mut contacts = list(&["a", "b", "c", "d"]);

    assert!(contacts.reorder(0, 2));
    assert_eq!(order(&contacts), vec!["b", "c", "a", "d"]);

    assert!(contacts.reorder(3, 0));
    assert_eq!(order(&contacts), vec!["d", "b", "c", "a"]);
}

#[test]
fn reorder_ignores_out_of_range_and_identity_moves() {
    let mut contacts = list(&["a", "b"]);

    assert!(!contacts.reorder(1, 1));
    assert!(!contacts.reorder(0, 5));
    assert!(!contacts.reorder(7, 0));
    assert_eq!(order(&contacts), vec!["a", "b"]);
}

#[test]
fn reorder_is_a_noop_after_confirmation() {
    let mut contacts = list(&["a", "b", "c"]);
    contacts.confirm();

    assert!(!contacts.reorder(0, 2));
    assert_eq!(order(&contacts), vec!["a", "b", "c"]);

    contacts.unconfirm();
    assert!(contacts.reorder(0, 2));
}

#[test]
fn position_of_finds_contacts_by_identifier() {
    let contacts = list(&["a", "b", "c"]);
    assert_eq!(contacts.position_of(&ContactId::new("c")), Some(2));
    assert_eq!(contacts.position_of(&ContactId::new("z")), None);
}

#[tokio::test]
async fn resolution_keeps_numbers_aligned_when_lookups_fail() {
    let mut contacts = ContactList::new(vec![
        Contact::new(ContactId::new("a"), "A", None),
        Contact::new(ContactId::new("b"), "B", Some("+15550002".into())),
        Contact::new(ContactId::new("c"), "C", None),
        Contact::new(ContactId::new("d"), "D", None),
        Contact::new(ContactId::new("e"), "E", None),
    ]);
    let resolver = MapResolver::new(vec![
        ("a", Lookup::Fails),
        ("c", Lookup::Found("+15550003")),
        ("d", Lookup::NoNumber),
        ("e", Lookup::Found("+15550005")),
    ]);

    let filled = contacts.resolve_phone_numbers(&resolver).await;

    assert_eq!(filled, 2);
    assert_eq!(
        contacts.phone_numbers(),
        vec![
            None,
            Some("+15550002".to_string()),
            Some("+15550003".to_string()),
            None,
            Some("+15550005".to_string()),
        ]
    );
    // Contacts that already had a number are not looked up again.
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn resolution_of_empty_list_is_empty() {
    let mut contacts = ContactList::default();
    let resolver = MapResolver::new(Vec::new());

    assert_eq!(contacts.resolve_phone_numbers(&resolver).await, 0);
    assert!(contacts.phone_numbers().is_empty());
}

#[test]
fn seek_dialable_skips_contacts_without_numbers() {
    let mut contacts = ContactList::new(vec![
        Contact::new(ContactId::new("a"), "A", None),
        Contact::new(ContactId::new("b"), "B", None),
        Contact::new(ContactId::new("c"), "C", Some("+15550003".into())),
    ]);

    let (next, skipped) = contacts.seek_dialable();
    assert_eq!(next, Some(2));
    let skipped: Vec<&str> = skipped.iter().map(|contact| contact.id.as_str()).collect();
    assert_eq!(skipped, vec!["a", "b"]);
    assert_eq!(contacts.active_index(), 2);

    assert_eq!(contacts.advance(), 3);
    assert_eq!(contacts.advance(), 3);
    assert_eq!(contacts.seek_dialable(), (None, Vec::new()));
}
