//! Properties of the content-addressed store.

use ep_model::ContentHash;
use ep_versioning::{ContentStore, ControlLayout};
use proptest::prelude::*;
use tempfile::tempdir;

fn open_store(dir: &std::path::Path) -> ContentStore {
    let layout = ControlLayout::new(dir);
    layout.create_dirs().expect("create layout");
    ContentStore::new(layout)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn put_twice_stores_once(content in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let dir = tempdir().expect("tempdir");
        let store = open_store(dir.path());

        let first = store.put(&content).expect("put");
        let usage = store.disk_usage().expect("usage");
        let second = store.put(&content).expect("put again");

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(store.disk_usage().expect("usage"), usage);
        prop_assert_eq!(store.hashes().expect("hashes").len(), 1);
        prop_assert_eq!(first, ContentHash::of(&content));
    }

    #[test]
    fn get_returns_what_was_put(content in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let dir = tempdir().expect("tempdir");
        let store = open_store(dir.path());

        let hash = store.put(&content).expect("put");
        prop_assert!(store.exists(&hash));
        prop_assert_eq!(store.get(&hash).expect("get"), content);
    }
}

#[test]
fn distinct_contents_get_distinct_blobs() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path());

    let a = store.put(b"\\section{A}").expect("put");
    let b = store.put(b"\\section{B}").expect("put");
    assert_ne!(a, b);
    assert_eq!(store.hashes().expect("hashes").len(), 2);
    assert_eq!(store.disk_usage().expect("usage"), 22);
}
