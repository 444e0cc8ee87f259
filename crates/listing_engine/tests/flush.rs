use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use listing_core::{ChangeSet, ListingBook};
use listing_engine::{
    change_channel, lock_book, spawn_flusher, DirtyTracker, Flusher, ListingFiles, PendingFlush,
    SharedBook,
};
use tempfile::TempDir;

fn shared(book: ListingBook) -> SharedBook {
    Arc::new(Mutex::new(book))
}

#[test]
fn tracker_uses_flag_for_records_and_size_for_exclusions() {
    let mut book = ListingBook::new();
    let mut tracker = DirtyTracker::new(0);
    assert_eq!(tracker.pending(&book), PendingFlush::default());

    let change = book.upsert_discovered("/a", 0);
    tracker.observe(change);
    assert_eq!(
        tracker.pending(&book),
        PendingFlush {
            records: true,
            exclusions: false
        }
    );

    let _ = book.exclude("/b");
    assert!(tracker.pending(&book).exclusions);

    tracker.records_flushed();
    tracker.exclusions_flushed(book.exclusions().len());
    assert_eq!(tracker.pending(&book), PendingFlush::default());
}

#[test]
fn consecutive_flushes_without_mutation_write_once() {
    let temp = TempDir::new().unwrap();
    let book = shared(ListingBook::new());
    let mut flusher = Flusher::new(book.clone(), ListingFiles::new(temp.path()));

    let change = lock_book(&book).upsert_discovered("/a", 0);
    flusher.observe(change);

    let first = flusher.flush_once();
    let second = flusher.flush_once();

    assert!(first.records_written);
    assert!(!second.records_written);
    assert_eq!(flusher.stats().record_writes, 1);
    assert_eq!(flusher.stats().exclusion_writes, 0);
}

#[test]
fn unobserved_record_change_is_not_written() {
    let temp = TempDir::new().unwrap();
    let book = shared(ListingBook::new());
    let mut flusher = Flusher::new(book.clone(), ListingFiles::new(temp.path()));

    let _ = lock_book(&book).upsert_discovered("/a", 0);
    let report = flusher.flush_once();

    assert!(!report.records_written);
    assert!(!temp.path().join("data.json").exists());
}

#[test]
fn exclusions_are_detected_by_size() {
    let temp = TempDir::new().unwrap();
    let book = shared(ListingBook::new());
    let files = ListingFiles::new(temp.path());
    let mut flusher = Flusher::new(book.clone(), files.clone());

    let _ = lock_book(&book).exclude("/gone");
    let report = flusher.flush_once();

    assert!(report.exclusions_written);
    assert_eq!(fs::read_to_string(files.exclusions_path()).unwrap(), "/gone");
    assert!(!flusher.flush_once().exclusions_written);
}

#[test]
fn failed_write_is_retried_on_next_flush() {
    let temp = TempDir::new().unwrap();
    let blocked = temp.path().join("blocked");
    fs::write(&blocked, "not a directory").unwrap();

    let book = shared(ListingBook::new());
    let mut flusher = Flusher::new(book.clone(), ListingFiles::new(&blocked));
    let change = lock_book(&book).upsert_discovered("/a", 0);
    flusher.observe(change);

    let failed = flusher.flush_once();
    assert!(!failed.records_written);
    assert_eq!(failed.failures, 1);

    fs::remove_file(&blocked).unwrap();
    let retried = flusher.flush_once();
    assert!(retried.records_written);
    assert!(blocked.join("data.json").exists());
}

#[test]
fn flusher_starts_clean_for_loaded_exclusions() {
    let temp = TempDir::new().unwrap();
    let mut book = ListingBook::new();
    let _ = book.exclude("/old");
    let mut flusher = Flusher::new(shared(book), ListingFiles::new(temp.path()));

    assert!(!flusher.flush_once().exclusions_written);
}

#[test]
fn reconciled_load_rewrites_the_record_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("data.json"),
        r#"{"/x": {"distance": 0, "hasDetails": false}, "/y": {"distance": 1, "hasDetails": false}}"#,
    )
    .unwrap();
    fs::write(temp.path().join("excludedLinks.txt"), "/x").unwrap();
    let files = ListingFiles::new(temp.path());

    let (book, change) = files.load_reconciled().unwrap();
    assert_eq!(change, ChangeSet::records());
    let mut flusher = Flusher::new(shared(book), files.clone());
    flusher.observe(change);
    let report = flusher.flush_once();

    assert!(report.records_written);
    assert!(!report.exclusions_written);
    let on_disk = fs::read_to_string(files.records_path()).unwrap();
    assert!(!on_disk.contains("\"/x\""));
    assert!(on_disk.contains("\"/y\""));
}

#[test]
fn consistent_files_load_clean() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("data.json"),
        r#"{"/y": {"distance": 1, "hasDetails": false}}"#,
    )
    .unwrap();
    fs::write(temp.path().join("excludedLinks.txt"), "/x").unwrap();

    let (_, change) = ListingFiles::new(temp.path()).load_reconciled().unwrap();

    assert!(change.is_empty());
}

#[tokio::test]
async fn off_runtime_flush_tracks_dirty_state_like_a_direct_flush() {
    let temp = TempDir::new().unwrap();
    let files = ListingFiles::new(temp.path());
    let book = shared(ListingBook::new());
    let mut flusher = Flusher::new(book.clone(), files.clone());

    let change = lock_book(&book).exclude("/gone");
    flusher.observe(change);
    let first = flusher.flush_off_runtime().await;
    let second = flusher.flush_off_runtime().await;

    assert!(first.exclusions_written);
    assert!(!second.exclusions_written);
    assert!(!second.records_written);
    assert_eq!(fs::read_to_string(files.exclusions_path()).unwrap(), "/gone");
    assert_eq!(flusher.stats().exclusion_writes, 1);
}

#[tokio::test(start_paused = true)]
async fn background_flusher_writes_once_per_burst_and_flushes_on_close() {
    let temp = TempDir::new().unwrap();
    let files = ListingFiles::new(temp.path());
    let book = shared(ListingBook::new());
    let (tx, rx) = change_channel();
    let handle = spawn_flusher(
        Flusher::new(book.clone(), files.clone()),
        Duration::from_secs(10),
        rx,
    );

    for id in ["/a", "/b", "/c"] {
        let change = lock_book(&book).upsert_discovered(id, 0);
        tx.send(change).unwrap();
    }
    // Several quiet ticks follow the burst.
    tokio::time::sleep(Duration::from_secs(35)).await;
    let on_disk = fs::read_to_string(files.records_path()).unwrap();
    assert!(on_disk.contains("/c"));

    let change = lock_book(&book).exclude("/a");
    tx.send(change).unwrap();
    drop(tx);

    let flusher = handle.await.unwrap();
    let stats = flusher.stats();
    assert_eq!(stats.record_writes, 2);
    assert_eq!(stats.exclusion_writes, 1);
    assert_eq!(stats.failures, 0);
    assert!(!fs::read_to_string(files.records_path())
        .unwrap()
        .contains("\"/a\""));
    assert_eq!(
        fs::read_to_string(files.exclusions_path()).unwrap(),
        "/a"
    );
}

#[test]
fn change_sets_combine() {
    let both = ChangeSet::records().union(ChangeSet::exclusions());
    assert!(both.records && both.exclusions);
    assert!(ChangeSet::NONE.is_empty());
}
