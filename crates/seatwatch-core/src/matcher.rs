use std::collections::HashSet;

use crate::{domain::ChatId, inventory::AssignedUser, registry::UserMapEntry};

/// Chat ids of the registry entries linked to a seat's assigned user.
///
/// Each entry is checked on its own: inventory user id (exact), then
/// username, then email (both case-insensitive). Order of first match is
/// kept and duplicates are dropped.
pub fn match_chat_ids(user: Option<&AssignedUser>, entries: &[UserMapEntry]) -> Vec<ChatId> {
    let Some(user) = user else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| !e.chat_id.is_empty() && entry_matches(e, user))
        .filter(|e| seen.insert(e.chat_id.clone()))
        .map(|e| e.chat_id.clone())
        .collect()
}

fn entry_matches(entry: &UserMapEntry, user: &AssignedUser) -> bool {
    same(&entry.inventory_user_id, &user.id, |a, b| a == b)
        || same(&entry.inventory_username, &user.username, eq_ignore_case)
        || same(&entry.inventory_email, &user.email, eq_ignore_case)
}

fn same(a: &Option<String>, b: &Option<String>, eq: impl Fn(&str, &str) -> bool) -> bool {
    match (a.as_deref().map(str::trim), b.as_deref().map(str::trim)) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => eq(a, b),
        _ => false,
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chat: &str, id: Option<&str>, username: Option<&str>, email: Option<&str>) -> UserMapEntry {
        UserMapEntry {
            chat_id: chat.into(),
            inventory_user_id: id.map(String::from),
            inventory_username: username.map(String::from),
            inventory_email: email.map(String::from),
            ..Default::default()
        }
    }

    fn seat_user(id: Option<&str>, username: Option<&str>, email: Option<&str>) -> AssignedUser {
        AssignedUser {
            id: id.map(String::from),
            username: username.map(String::from),
            email: email.map(String::from),
        }
    }

    #[test]
    fn matches_on_each_criterion() {
        let entries = vec![
            entry("10", Some("7"), None, None),
            entry("20", None, Some("ALICE"), None),
            entry("30", None, None, Some("alice@Example.com")),
            entry("40", Some("8"), Some("bob"), Some("bob@example.com")),
        ];
        let user = seat_user(Some("7"), Some("alice"), Some("ALICE@example.com"));
        assert_eq!(
            match_chat_ids(Some(&user), &entries),
            vec![ChatId::from("10"), ChatId::from("20"), ChatId::from("30")]
        );
    }

    #[test]
    fn duplicate_chat_ids_collapse_in_first_seen_order() {
        let entries = vec![
            entry("20", None, None, Some("a@x.io")),
            entry("10", Some("1"), None, None),
            entry("20", None, Some("a"), None),
            entry("10", None, None, Some("A@X.IO")),
        ];
        let user = seat_user(Some("1"), Some("a"), Some("a@x.io"));
        assert_eq!(
            match_chat_ids(Some(&user), &entries),
            vec![ChatId::from("20"), ChatId::from("10")]
        );
    }

    #[test]
    fn user_id_is_compared_exactly() {
        let entries = vec![entry("10", Some("07"), None, None)];
        let user = seat_user(Some("7"), None, None);
        assert!(match_chat_ids(Some(&user), &entries).is_empty());
    }

    #[test]
    fn empty_fields_never_match() {
        let entries = vec![entry("10", Some(""), Some(""), Some(""))];
        let user = seat_user(Some(""), Some(""), Some(""));
        assert!(match_chat_ids(Some(&user), &entries).is_empty());

        let unlinked = vec![entry("10", None, None, None)];
        let user = seat_user(Some("1"), Some("a"), Some("a@x.io"));
        assert!(match_chat_ids(Some(&user), &unlinked).is_empty());
    }

    #[test]
    fn no_assigned_user_no_matches() {
        let entries = vec![entry("10", Some("1"), None, None)];
        assert!(match_chat_ids(None, &entries).is_empty());
    }

    #[test]
    fn entries_without_chat_id_are_skipped() {
        let entries = vec![entry("", Some("1"), None, None)];
        let user = seat_user(Some("1"), None, None);
        assert!(match_chat_ids(Some(&user), &entries).is_empty());
    }
}
