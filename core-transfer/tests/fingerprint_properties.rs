//! Property tests for item identity, fingerprints and diffs.

use bridge_traits::CatalogItem;
use core_transfer::{diff, fingerprint, identity_key, EMPTY_FINGERPRINT};
use proptest::prelude::*;
use std::collections::HashSet;

fn arb_item() -> impl Strategy<Value = CatalogItem> {
    (
        proptest::option::of("[a-z0-9]{1,8}"),
        "[A-Za-z ]{1,12}",
        proptest::option::of("[A-Za-z ]{1,10}"),
    )
        .prop_map(|(id, title, artist)| {
            let mut item = CatalogItem::new(title);
            item.id = id;
            item.primary_artist = artist;
            item
        })
}

fn arb_items(max: usize) -> impl Strategy<Value = Vec<CatalogItem>> {
    proptest::collection::vec(arb_item(), 0..max)
}

fn keys(items: &[CatalogItem]) -> HashSet<String> {
    items.iter().map(identity_key).collect()
}

proptest! {
    #[test]
    fn fingerprint_ignores_order((items, shuffled) in arb_items(20).prop_flat_map(|items| {
        let shuffled = Just(items.clone()).prop_shuffle();
        (Just(items), shuffled)
    })) {
        prop_assert_eq!(fingerprint(&items), fingerprint(&shuffled));
    }

    #[test]
    fn non_empty_list_never_fingerprints_as_empty(items in proptest::collection::vec(arb_item(), 1..20)) {
        prop_assert_ne!(fingerprint(&items), EMPTY_FINGERPRINT);
    }

    #[test]
    fn fingerprint_is_lowercase_hex(items in proptest::collection::vec(arb_item(), 1..20)) {
        let fp = fingerprint(&items);
        prop_assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn diff_partitions_by_identity(old in arb_items(15), new in arb_items(15)) {
        let result = diff(&old, &new);
        let old_keys = keys(&old);
        let new_keys = keys(&new);

        for item in &result.added {
            prop_assert!(!old_keys.contains(&identity_key(item)));
        }
        for item in &result.removed {
            prop_assert!(!new_keys.contains(&identity_key(item)));
        }

        let expected_added = new.iter().filter(|i| !old_keys.contains(&identity_key(i))).count();
        prop_assert_eq!(result.added.len(), expected_added);
    }

    #[test]
    fn diff_against_itself_is_empty(items in arb_items(15)) {
        prop_assert!(diff(&items, &items).is_empty());
    }
}

#[test]
fn empty_list_has_sentinel_fingerprint() {
    let none: Vec<CatalogItem> = Vec::new();
    assert_eq!(fingerprint(&none), "empty");
}
