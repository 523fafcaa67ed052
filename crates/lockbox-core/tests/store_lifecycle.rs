use std::fs;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use lockbox_core::crypto::{derive_key, KdfParams, Salt};
use lockbox_core::{
    EncryptedStore, FlushOutcome, LockboxError, MasterKey, StoreConfig, StoreEvent, StoreState,
};
use tempfile::tempdir;

const FAST: KdfParams = KdfParams::new(1024, 1, 1);

fn key_for(password: &str, salt: &Salt) -> MasterKey {
    derive_key(password, salt.as_bytes(), &FAST).expect("derive should succeed")
}

fn manual_config() -> StoreConfig {
    StoreConfig {
        flush_delay: Duration::from_secs(3600),
    }
}

fn insert_setting(store: &EncryptedStore, key: &str, value: &str) {
    store
        .with_handle_mut(|db| {
            db.execute(
                "INSERT INTO app_settings (key, value) VALUES (?1, ?2)",
                (key, value),
            )?;
            Ok(())
        })
        .expect("insert should succeed");
}

fn count_flushes(events: &Receiver<StoreEvent>) -> usize {
    events
        .try_iter()
        .filter(|event| matches!(event, StoreEvent::FlushCompleted { .. }))
        .count()
}

#[test]
fn test_first_run_to_ready_round_trip() {
    let dir = tempdir().expect("tempdir should succeed");
    let path = dir.path().join("store.enc");
    let salt = Salt::generate().expect("salt should succeed");

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");
    insert_setting(&store, "field", "x");
    assert!(matches!(
        store.force_flush().expect("flush should succeed"),
        FlushOutcome::Written(_)
    ));
    store.close().expect("close should succeed");
    drop(store);

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("reopen should succeed");
    let value: String = store
        .with_handle(|db| {
            Ok(db.query_row(
                "SELECT value FROM app_settings WHERE key = 'field'",
                [],
                |row| row.get(0),
            )?)
        })
        .expect("query should succeed");
    assert_eq!(value, "x");
    store.close().expect("close should succeed");
    drop(store);

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    let err = store
        .open(key_for("different horse", &salt))
        .expect_err("wrong key should fail");
    assert!(matches!(err, LockboxError::AuthenticationFailure));
    assert_eq!(store.state(), StoreState::Error);
}

#[test]
fn test_on_disk_file_is_never_plaintext() {
    let dir = tempdir().expect("tempdir should succeed");
    let path = dir.path().join("store.enc");
    let salt = Salt::generate().expect("salt should succeed");

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");
    insert_setting(&store, "needle", "very-recognizable-secret-value");
    store.lock().expect("lock should succeed");

    let on_disk = fs::read(&path).expect("read should succeed");
    assert!(!on_disk.starts_with(b"SQLite format 3"));
    let needle = b"very-recognizable-secret-value";
    assert!(!on_disk.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn test_corrupted_file_is_never_replaced() {
    let dir = tempdir().expect("tempdir should succeed");
    let path = dir.path().join("store.enc");
    let salt = Salt::generate().expect("salt should succeed");

    {
        let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
        store
            .open(key_for("correct horse", &salt))
            .expect("open should succeed");
        store.close().expect("close should succeed");
    }

    let mut bytes = fs::read(&path).expect("read should succeed");
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xFF;
    fs::write(&path, &bytes).expect("write should succeed");

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    let err = store
        .open(key_for("correct horse", &salt))
        .expect_err("tampered store should fail");
    assert!(matches!(err, LockboxError::AuthenticationFailure));
    store.close().expect("close should succeed");

    assert_eq!(fs::read(&path).expect("read should succeed"), bytes);
}

#[test]
fn test_burst_of_mutations_coalesces_into_one_flush() {
    let dir = tempdir().expect("tempdir should succeed");
    let config = StoreConfig {
        flush_delay: Duration::from_millis(300),
    };
    let salt = Salt::generate().expect("salt should succeed");

    let store =
        EncryptedStore::new(dir.path().join("store.enc"), config).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");
    let events = store.subscribe();

    for i in 0..10 {
        insert_setting(&store, &format!("burst-{}", i), "v");
        thread::sleep(Duration::from_millis(10));
    }
    assert!(store.is_dirty());

    thread::sleep(Duration::from_millis(1500));
    assert_eq!(count_flushes(&events), 1);
    assert!(!store.is_dirty());
}

#[test]
fn test_spaced_mutations_flush_each_time() {
    let dir = tempdir().expect("tempdir should succeed");
    let config = StoreConfig {
        flush_delay: Duration::from_millis(50),
    };
    let salt = Salt::generate().expect("salt should succeed");

    let store =
        EncryptedStore::new(dir.path().join("store.enc"), config).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");
    let events = store.subscribe();

    for i in 0..3 {
        insert_setting(&store, &format!("spaced-{}", i), "v");
        let event = events
            .recv_timeout(Duration::from_secs(5))
            .expect("flush event should arrive");
        assert!(matches!(event, StoreEvent::FlushCompleted { .. }));
    }

    thread::sleep(Duration::from_millis(200));
    assert_eq!(count_flushes(&events), 0);
}

#[test]
fn test_lock_cancels_pending_timer_and_persists() {
    let dir = tempdir().expect("tempdir should succeed");
    let path = dir.path().join("store.enc");
    let salt = Salt::generate().expect("salt should succeed");

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");
    let events = store.subscribe();

    insert_setting(&store, "pending", "1");
    store.lock().expect("lock should succeed");
    assert_eq!(count_flushes(&events), 1);
    assert_eq!(store.state(), StoreState::Closed);

    store
        .open(key_for("correct horse", &salt))
        .expect("reopen should succeed");
    let count: i64 = store
        .with_handle(|db| {
            Ok(db.query_row(
                "SELECT count(*) FROM app_settings WHERE key = 'pending'",
                [],
                |row| row.get(0),
            )?)
        })
        .expect("query should succeed");
    assert_eq!(count, 1);
}

#[test]
fn test_concurrent_writers_share_one_store() {
    let dir = tempdir().expect("tempdir should succeed");
    let salt = Salt::generate().expect("salt should succeed");
    let store = std::sync::Arc::new(
        EncryptedStore::new(
            dir.path().join("store.enc"),
            StoreConfig {
                flush_delay: Duration::from_millis(20),
            },
        )
        .expect("new should succeed"),
    );
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = std::sync::Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    insert_setting(&store, &format!("t{}-{}", t, i), "v");
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer should not panic");
    }

    store.lock().expect("lock should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("reopen should succeed");
    let count: i64 = store
        .with_handle(|db| {
            Ok(db.query_row(
                "SELECT count(*) FROM app_settings WHERE key LIKE 't%'",
                [],
                |row| row.get(0),
            )?)
        })
        .expect("query should succeed");
    assert_eq!(count, 100);
}

#[test]
fn test_stale_temp_files_removed_on_open() {
    let dir = tempdir().expect("tempdir should succeed");
    let path = dir.path().join("store.enc");
    let stale = dir.path().join("store.enc.tmp.deadbeef");
    fs::write(&stale, b"half written").expect("write should succeed");
    let salt = Salt::generate().expect("salt should succeed");

    let store = EncryptedStore::new(&path, manual_config()).expect("new should succeed");
    store
        .open(key_for("correct horse", &salt))
        .expect("open should succeed");

    assert!(!stale.exists());
    assert!(path.exists());
}
