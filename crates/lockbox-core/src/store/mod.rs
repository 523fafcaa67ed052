//! Encrypted-at-rest SQLite store.
//!
//! The database lives entirely in memory while unlocked. The only thing that
//! ever reaches disk is the sealed serialized image, written through
//! [`crate::fs::write_atomic`]. Mutations mark the store dirty and arm a
//! debounce timer; a background thread flushes once the timer expires, so a
//! burst of edits costs one encryption and one write.
//!
//! Lifecycle:
//!
//! ```text
//! Closed --open--> Opening --ok--> Unlocked <--> Dirty <--> Flushing
//!                     |                \          /
//!                     +--fail--> Error  +--lock--> Locking --> Closed
//! ```

mod debounce;
pub mod image;
mod types;

use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rusqlite::Connection;
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::crypto::{cipher, MasterKey};
use crate::error::{LockboxError, Result};
use crate::fs;

use debounce::Debounce;
pub use types::{
    FlushOutcome, StoreConfig, StoreEvent, StoreMetadata, StoreState, DEFAULT_FLUSH_DELAY,
};

/// Borrowed access to the unlocked database.
///
/// Dereferences to [`rusqlite::Connection`]. Only valid inside the closure
/// passed to [`EncryptedStore::with_handle`] or
/// [`EncryptedStore::with_handle_mut`]; the store stays locked for its
/// duration, so the closure must not call back into the store.
pub struct StoreHandle<'a> {
    conn: &'a mut Connection,
    key: &'a MasterKey,
    touched: Cell<bool>,
}

impl StoreHandle<'_> {
    /// Record a change SQLite does not count as a row change (DDL),
    /// scheduling an autosave.
    pub fn mark_dirty(&self) {
        self.touched.set(true);
    }

    /// Seal a sensitive field with the session key.
    pub fn seal_field(&self, value: &str) -> Result<Vec<u8>> {
        cipher::seal_str(value, self.key)
    }

    /// Open a field sealed with [`StoreHandle::seal_field`].
    pub fn open_field(&self, blob: &[u8]) -> Result<SecretString> {
        cipher::open_str(blob, self.key)
    }
}

impl Deref for StoreHandle<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &*self.conn
    }
}

impl DerefMut for StoreHandle<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut *self.conn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Opening,
    Open,
    Locking,
    Failed,
}

struct Session {
    conn: Connection,
    key: MasterKey,
}

struct Inner {
    phase: Phase,
    session: Option<Session>,
    dirty: bool,
    /// Bumped on every mutation; a flush only clears `dirty` if this is unchanged.
    generation: u64,
    flushing: bool,
    timer: Debounce,
    shutdown: bool,
}

impl Inner {
    fn state(&self) -> StoreState {
        match self.phase {
            Phase::Closed => StoreState::Closed,
            Phase::Opening => StoreState::Opening,
            Phase::Locking => StoreState::Locking,
            Phase::Failed => StoreState::Error,
            Phase::Open if self.flushing => StoreState::Flushing,
            Phase::Open if self.dirty => StoreState::Dirty,
            Phase::Open => StoreState::Unlocked,
        }
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.generation = self.generation.wrapping_add(1);
        self.timer.arm(Instant::now());
    }

    fn install(&mut self, session: Session, dirty: bool) {
        self.session = Some(session);
        self.phase = Phase::Open;
        self.dirty = dirty;
        self.generation = self.generation.wrapping_add(1);
        self.timer.cancel();
    }

    /// Drop the handle and key, returning to `Closed`.
    fn release(&mut self) -> Option<Session> {
        self.phase = Phase::Closed;
        self.dirty = false;
        self.timer.cancel();
        self.session.take()
    }
}

struct Shared {
    path: PathBuf,
    inner: Mutex<Inner>,
    wake: Condvar,
    observers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl Shared {
    /// Poisoning is recovered: a panicking closure never leaves `Inner`
    /// half-updated, and lock/close must still reach the final flush.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Read and decrypt the on-disk image, or build a new database if there is none.
    ///
    /// Returns the connection and whether it was freshly created.
    fn load_or_create(&self, key: &MasterKey) -> Result<(Connection, bool)> {
        match fs::remove_stale_temp_files(&self.path) {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Removed temp files from an interrupted write"),
            Err(e) => tracing::warn!(error = %e, "Could not clean up stale temp files"),
        }

        let blob = match std::fs::read(&self.path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "No encrypted store on disk; creating one"
                );
                return Ok((image::create()?, true));
            }
            Err(e) => return Err(e.into()),
        };

        let plaintext = cipher::open(&blob, key)?;
        let conn = image::load(&plaintext).map_err(|e| {
            tracing::error!(error = %e, "Store decrypted but does not contain a database");
            LockboxError::CorruptedStore
        })?;
        Ok((conn, false))
    }

    fn seal_session(session: &Session) -> Result<Vec<u8>> {
        image::touch_last_modified(&session.conn)?;
        let plaintext = image::serialize(&session.conn)?;
        cipher::seal(&plaintext, &session.key)
    }

    /// Write the current image if dirty. At most one flush is in flight.
    fn flush(&self) -> Result<FlushOutcome> {
        let mut inner = self.lock_inner();
        while inner.flushing {
            inner = self.wait(inner);
        }

        if !matches!(inner.phase, Phase::Open | Phase::Locking) {
            return Err(LockboxError::NotUnlocked);
        }
        let Some(session) = inner.session.as_ref() else {
            return Err(LockboxError::NotUnlocked);
        };
        if !inner.dirty {
            return Ok(FlushOutcome::Clean);
        }

        let sealed = match Self::seal_session(session) {
            Ok(sealed) => sealed,
            Err(e) => {
                drop(inner);
                self.emit(StoreEvent::FlushFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        let generation = inner.generation;
        inner.flushing = true;
        inner.timer.cancel();
        drop(inner);

        // Mutations may continue while the sealed snapshot is written.
        let written = fs::write_atomic(&self.path, &sealed);

        let mut inner = self.lock_inner();
        inner.flushing = false;
        if written.is_ok() {
            if inner.generation == generation {
                inner.dirty = false;
            } else if inner.phase == Phase::Open {
                inner.timer.arm(Instant::now());
            }
        }
        drop(inner);
        self.wake.notify_all();

        match written {
            Ok(()) => {
                tracing::debug!(bytes = sealed.len(), "Encrypted store flushed");
                self.emit(StoreEvent::FlushCompleted {
                    bytes: sealed.len(),
                });
                Ok(FlushOutcome::Written(sealed.len()))
            }
            Err(e) => {
                self.emit(StoreEvent::FlushFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Rows inserted, updated or deleted on `conn` since it was opened.
fn total_changes(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

/// Autosave loop: sleep until the debounce deadline, then flush.
fn run_flusher(shared: Arc<Shared>) {
    loop {
        let mut inner = shared.lock_inner();
        loop {
            if inner.shutdown {
                return;
            }
            let now = Instant::now();
            if inner.timer.is_due(now) {
                break;
            }
            inner = match inner.timer.remaining(now) {
                Some(left) => {
                    shared
                        .wake
                        .wait_timeout(inner, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => shared.wait(inner),
            };
        }
        inner.timer.cancel();
        drop(inner);

        match shared.flush() {
            Ok(_) | Err(LockboxError::NotUnlocked) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Scheduled flush failed; will retry on next change")
            }
        }
    }
}

/// Encrypted SQLite store with debounced autosave.
///
/// `EncryptedStore` is `Send + Sync`; share it behind an `Arc`. It owns the
/// database handle, the session key, and the dirty/timer state. Dropping it
/// locks (with a final flush) and stops the autosave thread.
pub struct EncryptedStore {
    shared: Arc<Shared>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl EncryptedStore {
    /// Create a closed store for the encrypted file at `path`.
    ///
    /// Nothing is read until [`EncryptedStore::open`].
    pub fn new(path: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            path: path.into(),
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                session: None,
                dirty: false,
                generation: 0,
                flushing: false,
                timer: Debounce::new(config.flush_delay),
                shutdown: false,
            }),
            wake: Condvar::new(),
            observers: Mutex::new(Vec::new()),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("lockbox-autosave".to_string())
            .spawn(move || run_flusher(worker))
            .map_err(|e| LockboxError::Storage(format!("Failed to start autosave thread: {}", e)))?;

        Ok(Self {
            shared,
            flusher: Mutex::new(Some(handle)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Move from `Closed` (or `Error`) to `Opening` or report why not.
    fn begin_open(&self) -> Result<()> {
        let mut inner = self.shared.lock_inner();
        if inner.shutdown {
            return Err(LockboxError::InvalidState(
                "Store has been closed".to_string(),
            ));
        }
        match inner.phase {
            Phase::Open | Phase::Locking => Err(LockboxError::AlreadyUnlocked),
            Phase::Opening => Err(LockboxError::InvalidState(
                "Open already in progress".to_string(),
            )),
            Phase::Closed | Phase::Failed => {
                inner.phase = Phase::Opening;
                Ok(())
            }
        }
    }

    /// Flush a freshly installed session; undo the install if that fails.
    fn initial_flush(&self) -> Result<()> {
        match self.shared.flush() {
            Ok(_) => Ok(()),
            Err(e) => {
                let session = self.shared.lock_inner().release();
                drop(session);
                Err(e)
            }
        }
    }

    /// Decrypt the on-disk image with `key` and make it the live database.
    ///
    /// With no file on disk, a new database is created and flushed once.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailure` / `MalformedInput` if the file does not
    ///   decrypt; the store moves to `Error` and the file is left untouched
    /// - `CorruptedStore` if it decrypts but is not a database
    /// - `AlreadyUnlocked` if a session is active
    pub fn open(&self, key: MasterKey) -> Result<()> {
        self.begin_open()?;
        tracing::debug!(path = %self.shared.path.display(), "Opening encrypted store");

        let loaded = self.shared.load_or_create(&key);

        let mut inner = self.shared.lock_inner();
        let created = match loaded {
            Ok((conn, created)) => {
                inner.install(Session { conn, key }, created);
                created
            }
            Err(e) => {
                inner.phase = Phase::Failed;
                tracing::warn!(error = %e, "Failed to open encrypted store");
                return Err(e);
            }
        };
        drop(inner);

        if created {
            self.initial_flush()?;
        }
        tracing::info!("Encrypted store unlocked");
        Ok(())
    }

    /// Take ownership of an existing database (a migrated legacy file) and
    /// persist it as the encrypted store.
    ///
    /// Refuses to run if an encrypted file already exists.
    pub fn adopt(&self, key: MasterKey, conn: Connection) -> Result<()> {
        if self.shared.path.exists() {
            return Err(LockboxError::InvalidState(
                "Encrypted store already exists".to_string(),
            ));
        }
        self.begin_open()?;

        let prepared = image::apply_baseline_schema(&conn)
            .and_then(|()| image::purge_legacy_secrets(&conn));
        let mut inner = self.shared.lock_inner();
        match prepared {
            Ok(purged) => {
                if purged > 0 {
                    tracing::info!(rows = purged, "Dropped legacy password settings");
                }
                inner.install(Session { conn, key }, true);
            }
            Err(e) => {
                inner.phase = Phase::Closed;
                return Err(e);
            }
        }
        drop(inner);

        self.initial_flush()?;
        tracing::info!("Adopted existing database into encrypted store");
        Ok(())
    }

    /// Run `f` against the unlocked database.
    ///
    /// Row changes made through the handle mark the store dirty on their own.
    /// Schema-only changes (DDL) are not counted by SQLite and must be
    /// reported with [`StoreHandle::mark_dirty`].
    pub fn with_handle<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreHandle<'_>) -> Result<T>,
    {
        let mut guard = self.shared.lock_inner();
        let inner = &mut *guard;
        if inner.phase != Phase::Open {
            return Err(LockboxError::NotUnlocked);
        }
        let session = inner.session.as_mut().ok_or(LockboxError::NotUnlocked)?;
        let before = total_changes(&session.conn)?;

        let handle = StoreHandle {
            conn: &mut session.conn,
            key: &session.key,
            touched: Cell::new(false),
        };
        let result = f(&handle);
        let mut touched = handle.touched.get();
        match total_changes(&session.conn) {
            Ok(after) => touched |= after != before,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read change count; assuming modified");
                touched = true;
            }
        }

        if touched {
            inner.touch();
            drop(guard);
            self.shared.wake.notify_all();
        }
        result
    }

    /// Run a mutating closure; the store is marked dirty afterwards whether or
    /// not the closure succeeded.
    pub fn with_handle_mut<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreHandle<'_>) -> Result<T>,
    {
        let mut guard = self.shared.lock_inner();
        let inner = &mut *guard;
        if inner.phase != Phase::Open {
            return Err(LockboxError::NotUnlocked);
        }
        let session = inner.session.as_mut().ok_or(LockboxError::NotUnlocked)?;

        let mut handle = StoreHandle {
            conn: &mut session.conn,
            key: &session.key,
            touched: Cell::new(true),
        };
        let result = f(&mut handle);

        inner.touch();
        drop(guard);
        self.shared.wake.notify_all();
        result
    }

    /// Record a mutation and (re)start the autosave countdown.
    pub fn mark_dirty(&self) -> Result<()> {
        let mut inner = self.shared.lock_inner();
        if inner.phase != Phase::Open {
            return Err(LockboxError::NotUnlocked);
        }
        inner.touch();
        drop(inner);
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Flush now instead of waiting for the timer. Errors surface to the caller.
    pub fn force_flush(&self) -> Result<FlushOutcome> {
        self.shared.flush()
    }

    /// Final flush, then release the handle and zeroize the key.
    ///
    /// A failed flush is retried once. The session is released regardless;
    /// if both attempts fail the unsaved changes are lost and
    /// `PersistenceFailure` is returned.
    pub fn lock(&self) -> Result<()> {
        {
            let mut inner = self.shared.lock_inner();
            match inner.phase {
                Phase::Open => {}
                Phase::Opening | Phase::Locking => {
                    return Err(LockboxError::InvalidState(format!(
                        "Cannot lock while {}",
                        inner.state()
                    )))
                }
                Phase::Closed | Phase::Failed => return Err(LockboxError::AlreadyLocked),
            }
            inner.phase = Phase::Locking;
            inner.timer.cancel();
        }

        let result = match self.shared.flush() {
            Ok(_) => Ok(()),
            Err(first) => {
                tracing::warn!(error = %first, "Final flush failed; retrying once");
                self.shared.flush().map(|_| ())
            }
        };

        let session = self.shared.lock_inner().release();
        drop(session);
        self.shared.wake.notify_all();

        match result {
            Ok(()) => {
                tracing::info!("Encrypted store locked");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Store locked without persisting pending changes");
                Err(match e {
                    LockboxError::PersistenceFailure(_) => e,
                    other => LockboxError::PersistenceFailure(other.to_string()),
                })
            }
        }
    }

    /// Lock if unlocked, then stop the autosave thread. The store cannot be
    /// reopened afterwards.
    pub fn close(&self) -> Result<()> {
        let result = if self.state().is_unlocked() {
            self.lock()
        } else {
            Ok(())
        };

        self.shared.lock_inner().shutdown = true;
        self.shared.wake.notify_all();

        let handle = self.flusher.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Autosave thread panicked");
            }
        }
        result
    }

    pub fn state(&self) -> StoreState {
        self.shared.lock_inner().state()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.lock_inner().dirty
    }

    /// Receive a [`StoreEvent`] after every flush attempt.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn metadata(&self) -> Result<StoreMetadata> {
        self.with_handle(|handle| image::read_metadata(handle))
    }

    pub fn seal_field(&self, value: &str) -> Result<Vec<u8>> {
        self.with_handle(|handle| handle.seal_field(value))
    }

    pub fn open_field(&self, blob: &[u8]) -> Result<SecretString> {
        self.with_handle(|handle| handle.open_field(blob))
    }

    /// Plaintext serialized image of the live database, wiped on drop.
    pub fn export_image(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.with_handle(|handle| image::serialize(handle))
    }
}

impl Drop for EncryptedStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "Failed to close encrypted store cleanly");
        }
    }
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("path", &self.shared.path)
            .field("state", &self.state())
            .finish()
    }
}
