use amulet_core::{Entry, Origin, Rarity, Store};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

fn entry(text: &str, rarity: u8, secs: i64) -> Entry {
    Entry::new(text, Rarity::new(rarity).unwrap(), at(secs))
}

fn texts(store: &Store) -> Vec<&str> {
    store.view().iter().map(|e| e.text.as_str()).collect()
}

#[test]
fn repeated_record_is_rejected() {
    let mut store = Store::default();

    assert!(store.record(entry("x", 1, 1)));
    assert!(!store.record(entry("x", 7, 2)));

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("x").unwrap().rarity, Rarity::COMMON);
}

#[test]
fn equal_timestamps_keep_insertion_order() {
    let mut store = Store::default();
    store.record(entry("first", 1, 5));
    store.record(entry("second", 1, 5));
    store.record(entry("third", 1, 5));

    assert_eq!(texts(&store), vec!["third", "second", "first"]);
    store.toggle_order();
    assert_eq!(texts(&store), vec!["first", "second", "third"]);
}

#[test]
fn view_is_sorted_by_time_not_arrival() {
    let mut store = Store::default();
    store.record(entry("late", 1, 30));
    store.record(entry("early", 1, 10));
    store.record(entry("middle", 1, 20));

    store.set_newest_first(false);
    assert_eq!(texts(&store), vec!["early", "middle", "late"]);
}

#[test]
fn cap_trims_only_the_view() {
    let mut store = Store::new(2, Rarity::MIN);
    store.record(entry("a", 1, 1));
    store.record(entry("b", 1, 2));
    store.record(entry("c", 1, 3));

    assert_eq!(texts(&store), vec!["c", "b"]);
    store.toggle_order();
    // The oldest entry stays excluded in either direction.
    assert_eq!(texts(&store), vec!["b", "c"]);

    assert_eq!(store.len(), 3);
    assert!(store.contains("a"));
    assert!(!store.record(entry("a", 1, 9)));

    store.set_max_entries(10);
    assert_eq!(texts(&store), vec!["a", "b", "c"]);
}

#[test]
fn min_rarity_filters_view() {
    let mut store = Store::default();
    store.record(entry("one", 1, 1));
    store.record(entry("five", 5, 2));
    store.record(entry("three", 3, 3));

    store.set_min_rarity(Rarity::RARE);

    assert_eq!(texts(&store), vec!["three", "five"]);
    assert_eq!(store.len(), 3);
}

#[test]
fn history_replacement_preserves_session_entries() {
    let mut store = Store::default();
    store.replace_history(vec![entry("h1", 2, 1), entry("h2", 2, 2)]);
    store.record(entry("s1", 4, 3));

    store.replace_history(vec![entry("h3", 6, 0), entry("s1", 4, 3)]);

    assert_eq!(store.len(), 2);
    assert!(!store.contains("h1"));
    assert_eq!(store.origin("s1"), Some(Origin::Session));
    assert_eq!(store.origin("h3"), Some(Origin::History));
    assert_eq!(texts(&store), vec!["s1", "h3"]);
}

#[test]
fn reload_keeps_tie_order_between_history_and_session() {
    let mut store = Store::default();
    store.replace_history(vec![entry("h", 2, 5)]);
    store.record(entry("s", 2, 5));
    assert_eq!(texts(&store), vec!["s", "h"]);

    store.replace_history(vec![entry("h", 2, 5)]);

    assert_eq!(texts(&store), vec!["s", "h"]);
    assert_eq!(store.origin("h"), Some(Origin::History));
}

#[test]
fn reload_with_changed_record_takes_the_new_copy() {
    let mut store = Store::default();
    store.replace_history(vec![entry("h", 2, 5), entry("old", 1, 1)]);

    store.replace_history(vec![entry("h", 4, 9)]);

    assert_eq!(store.get("h").unwrap().rarity, Rarity::EPIC);
    assert!(!store.contains("old"));
    assert_eq!(texts(&store), vec!["h"]);
}
