//! Behavior every backend must share. The sqlite store runs these directly;
//! the postgres module runs them against a live server.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::sqlite::SqliteConfig;
use crate::{Count, Entry, KVError, SqliteStore, Store};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Cow {
    name: String,
    age: u32,
    spots: Vec<String>,
}

fn daisy() -> Cow {
    Cow {
        name: "Daisy".into(),
        age: 4,
        spots: vec!["left".into(), "tail".into()],
    }
}

fn pairs(entries: &[Entry]) -> Vec<(&str, &str)> {
    entries
        .iter()
        .map(|e| (e.key.as_str(), e.value.as_str()))
        .collect()
}

fn load_k_dataset<B: Backend>(store: &Store<B>) {
    store.delete_all().unwrap();
    store.put("k", "1", "t").unwrap();
    store.put("k", "2", "t").unwrap();
    store.put("k", "3", "t").unwrap();
    store.put("kk", "33", "t").unwrap();
    store.put("kkk", "333", "t").unwrap();
}

pub(crate) fn last_write_wins<B: Backend>(store: &Store<B>) {
    load_k_dataset(store);

    assert_eq!(store.get("k").unwrap().as_deref(), Some("3"));
    assert_eq!(store.get("kk").unwrap().as_deref(), Some("33"));
    assert_eq!(store.get("kkk").unwrap().as_deref(), Some("333"));
    assert_eq!(store.get("missing").unwrap(), None);

    // The tag is replaced along with the value.
    store.put("k", "4", "t2").unwrap();
    let entry = store.get_entry("k").unwrap().unwrap();
    assert_eq!(
        entry,
        Entry {
            key: "k".into(),
            value: "4".into(),
            tag: "t2".into(),
        }
    );

    // put_kv writes the empty tag.
    store.put_kv("k", "5").unwrap();
    assert_eq!(store.get_entry("k").unwrap().unwrap().tag, "");
}

pub(crate) fn bound_iteration<B: Backend>(store: &Store<B>) {
    load_k_dataset(store);

    let mut seen = Vec::new();
    store
        .iterate_ascending_from("k", 1000, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(pairs(&seen), [("k", "3"), ("kk", "33"), ("kkk", "333")]);
    assert!(seen.iter().all(|e| e.tag == "t"));

    seen.clear();
    store
        .iterate_descending_from("z", 1000, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(pairs(&seen), [("kkk", "333"), ("kk", "33"), ("k", "3")]);

    // Early stop after the first row.
    seen.clear();
    store
        .iterate_descending_from("z", 1000, |e, stop| {
            seen.push(e.clone());
            *stop = true;
        })
        .unwrap();
    assert_eq!(pairs(&seen), [("kkk", "333")]);

    // Bounds, not prefixes: "a" is below every key, "kk" is included.
    seen.clear();
    store
        .iterate_ascending_from("a", 1000, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(seen.len(), 3);

    seen.clear();
    store
        .iterate_ascending_from("kj", 1000, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(pairs(&seen), [("kk", "33"), ("kkk", "333")]);

    seen.clear();
    store
        .iterate_descending_from("kk", 1000, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(pairs(&seen), [("kk", "33"), ("k", "3")]);

    // Limits.
    seen.clear();
    store
        .iterate_ascending_from("k", 2, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(pairs(&seen), [("k", "3"), ("kk", "33")]);

    seen.clear();
    store
        .iterate_ascending_from("k", 0, |e, _| seen.push(e.clone()))
        .unwrap();
    assert!(seen.is_empty());

    seen.clear();
    store
        .iterate_latest(2, |e, _| seen.push(e.clone()))
        .unwrap();
    assert_eq!(pairs(&seen), [("kkk", "333"), ("kk", "33")]);

    // Nothing past the top.
    seen.clear();
    store
        .iterate_ascending_from("l", 1000, |e, _| seen.push(e.clone()))
        .unwrap();
    assert!(seen.is_empty());
}

pub(crate) fn count_all<B: Backend>(store: &Store<B>) {
    store.delete_all().unwrap();
    assert_eq!(store.count_all().unwrap(), Count::default());
    assert_eq!(
        store.count_all().unwrap(),
        Count {
            count: 0,
            min_key: String::new(),
            max_key: String::new(),
        }
    );

    load_k_dataset(store);
    assert_eq!(
        store.count_all().unwrap(),
        Count {
            count: 3,
            min_key: "k".into(),
            max_key: "kkk".into(),
        }
    );
}

pub(crate) fn tag_deletion<B: Backend>(store: &Store<B>) {
    store.delete_all().unwrap();
    store.put("a1", "1", "t1").unwrap();
    store.put("a2", "2", "t1").unwrap();
    store.put("b1", "3", "t2").unwrap();
    store.put("b2", "4", "t2").unwrap();

    assert_eq!(store.delete_all_with_tag("t1").unwrap(), 2);
    assert_eq!(store.get("a1").unwrap(), None);
    assert_eq!(store.get("a2").unwrap(), None);
    assert_eq!(store.get("b1").unwrap().as_deref(), Some("3"));
    assert_eq!(store.get("b2").unwrap().as_deref(), Some("4"));

    // Deleting a missing key or tag changes nothing.
    assert_eq!(store.delete("nope").unwrap(), 0);
    assert_eq!(store.delete_all_with_tag("t1").unwrap(), 0);
    assert_eq!(store.count_all().unwrap().count, 2);

    // Strictly-less tag expiry over zero-padded generations.
    store.delete_all().unwrap();
    store.put("g1", "1", "0001").unwrap();
    store.put("g2", "2", "0002").unwrap();
    store.put("g3", "3", "0003").unwrap();
    store.put("untagged", "0", "").unwrap();
    assert_eq!(store.delete_where_tag_less_than("0002").unwrap(), 2);
    assert_eq!(store.get("g1").unwrap(), None);
    assert_eq!(store.get("untagged").unwrap(), None);
    assert_eq!(store.get("g2").unwrap().as_deref(), Some("2"));
    assert_eq!(store.get("g3").unwrap().as_deref(), Some("3"));

    assert_eq!(store.delete("g2").unwrap(), 1);
    assert_eq!(store.delete_all().unwrap(), 1);
    assert_eq!(store.count_all().unwrap().count, 0);
}

pub(crate) fn structured_values<B: Backend>(store: &Store<B>) {
    store.delete_all().unwrap();

    let cow = daisy();
    store.put_json("cow:daisy", "farm", &cow).unwrap();
    assert_eq!(store.get_json::<Cow>("cow:daisy").unwrap(), Some(cow));
    assert_eq!(store.get_json::<Cow>("cow:none").unwrap(), None);
    assert_eq!(store.get_entry("cow:daisy").unwrap().unwrap().tag, "farm");

    // A payload of the wrong shape is an error on point lookup.
    store.put_json("cow:bad", "farm", &[1, 2, 3]).unwrap();
    assert!(matches!(
        store.get_json::<Cow>("cow:bad"),
        Err(KVError::Decode(_))
    ));
}

pub(crate) fn iterate_all_skips_bad_rows<B: Backend>(store: &Store<B>) {
    store.delete_all().unwrap();
    store.put_json("a", "", &daisy()).unwrap();
    store.put_kv("b", "not json").unwrap();
    store.put_json("c", "", &daisy()).unwrap();

    let mut keys = Vec::new();
    store
        .iterate_all::<Cow, _>(|e, cow, _| {
            assert_eq!(cow, daisy());
            keys.push(e.key.clone());
        })
        .unwrap();
    assert_eq!(keys, ["a", "c"]);

    keys.clear();
    store
        .iterate_all::<Cow, _>(|e, _, stop| {
            keys.push(e.key.clone());
            *stop = true;
        })
        .unwrap();
    assert_eq!(keys, ["a"]);
}

fn memory_store() -> SqliteStore {
    SqliteStore::open(&SqliteConfig::in_memory("test")).unwrap()
}

#[test]
fn test_last_write_wins() {
    last_write_wins(&memory_store());
}

#[test]
fn test_bound_iteration() {
    bound_iteration(&memory_store());
}

#[test]
fn test_count_all() {
    count_all(&memory_store());
}

#[test]
fn test_tag_deletion() {
    tag_deletion(&memory_store());
}

#[test]
fn test_structured_values() {
    structured_values(&memory_store());
}

#[test]
fn test_iterate_all_skips_bad_rows() {
    iterate_all_skips_bad_rows(&memory_store());
}

#[test]
fn test_byte_order_keys() {
    let store = memory_store();
    // Upper case sorts before lower case; digits before letters.
    for k in ["b", "B", "a", "1", "é"] {
        store.put_kv(k, k).unwrap();
    }
    let mut keys = Vec::new();
    store
        .iterate_ascending_from("", 100, |e, _| keys.push(e.key.clone()))
        .unwrap();
    assert_eq!(keys, ["1", "B", "a", "b", "é"]);

    // Numeric-looking keys stay text.
    store.put_kv("10", "x").unwrap();
    store.put_kv("9", "y").unwrap();
    let c = store.count_all().unwrap();
    assert_eq!(c.min_key, "1");
    assert_eq!(c.max_key, "é");
    assert_eq!(store.get("10").unwrap().as_deref(), Some("x"));
}

#[test]
fn test_stores_are_isolated_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path().to_string_lossy().into_owned();
    let a = SqliteStore::open(&SqliteConfig::new("a", d.clone())).unwrap();
    let b = SqliteStore::open(&SqliteConfig::new("b", d)).unwrap();
    a.put_kv("k", "from a").unwrap();
    assert_eq!(b.get("k").unwrap(), None);
}

#[test]
fn test_dyn_store_runs_suite() {
    let store = crate::StoreConfig::Sqlite(SqliteConfig::in_memory("dyn"))
        .open()
        .unwrap();
    last_write_wins(&store);
    bound_iteration(&store);
    count_all(&store);
}
