//! Shared byte buffer
//!
//! A [`Buffer`] is a cheap, cloneable handle to one open document. Content is
//! published as immutable [`BufferSnapshot`]s: readers clone the current
//! snapshot and traverse it without holding any lock, while a single writer
//! at a time builds the next snapshot inside a [`Transaction`] and swaps it in
//! when the transaction ends. A reader therefore sees the document either
//! entirely before or entirely after any edit, for as long as it keeps its
//! snapshot.
//!
//! Consumers that need to react to edits register an [`EditListener`]. The
//! returned [`Subscription`] removes the listener when dropped.

pub mod piece;
pub mod snapshot;

pub use snapshot::{BufferSnapshot, ByteCursor, Chunks};

use crate::edit::{EditKind, EditRecord, SourceId, Transaction};
use crate::error::{BufferError, Result};
use crate::history::UndoHistory;
use crate::logging::Logger;
use crate::settings::BufferOptions;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError, Weak};

// =============================================================================
// Edit Notifications
// =============================================================================

/// One completed (or about to complete) transaction, as seen by listeners
pub struct EditEvent<'a> {
    /// The normalized edit
    pub record: &'a EditRecord,
    /// Content before the edit
    pub before: &'a Arc<BufferSnapshot>,
    /// Content after the edit
    pub after: &'a Arc<BufferSnapshot>,
}

/// Receives edit notifications for a buffer.
///
/// Both hooks run synchronously on the thread that ended the transaction.
/// `begin_edit` runs while readers still see `before`; `end_edit` runs once
/// `after` has been published. Listeners must not begin a transaction on the
/// same buffer from inside a hook.
pub trait EditListener: Send + Sync {
    fn begin_edit(&self, event: &EditEvent<'_>) {
        let _ = event;
    }

    fn end_edit(&self, event: &EditEvent<'_>);
}

impl<F> EditListener for F
where
    F: Fn(&EditEvent<'_>) + Send + Sync,
{
    fn end_edit(&self, event: &EditEvent<'_>) {
        self(event)
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn EditListener>)>,
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.listeners).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// =============================================================================
// Buffer
// =============================================================================

/// State owned by the single writer
pub(crate) struct WriterState {
    pub history: UndoHistory,
    pub options: BufferOptions,
}

struct Shared {
    state: RwLock<Arc<BufferSnapshot>>,
    writer: Mutex<WriterState>,
    listeners: Mutex<Listeners>,
    language: RwLock<String>,
    logger: Logger,
}

/// Handle to one open document
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<Shared>,
}

impl Buffer {
    /// Create an empty buffer with default options and the ambient logger
    pub fn new() -> Self {
        Self::with_options(BufferOptions::default(), Logger::ambient())
    }

    /// Create an empty buffer
    pub fn with_options(options: BufferOptions, logger: Logger) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(Arc::new(BufferSnapshot::default())),
                writer: Mutex::new(WriterState {
                    history: UndoHistory::new(),
                    options,
                }),
                listeners: Mutex::new(Listeners::default()),
                language: RwLock::new(String::new()),
                logger,
            }),
        }
    }

    /// Create a buffer holding `bytes`, with default options and the ambient
    /// logger
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::with_content(bytes, BufferOptions::default(), Logger::ambient())
    }

    /// Create a buffer holding `bytes`.
    ///
    /// A failed load is logged and leaves the buffer empty.
    pub fn with_content(bytes: &[u8], options: BufferOptions, logger: Logger) -> Self {
        let buffer = Self::with_options(options, logger);
        if let Err(err) = buffer.load(bytes) {
            buffer.logger().scope(|| {
                tracing::warn!(
                    code = err.code(),
                    severity = %err.severity(),
                    "failed to load initial content: {}",
                    err
                );
            });
        }
        buffer
    }

    /// Replace the whole content with `bytes`, outside of the undo history.
    ///
    /// This is how loaded files enter a buffer. The history is cleared, since
    /// its records no longer describe the content.
    pub fn load(&self, bytes: &[u8]) -> Result<EditRecord> {
        let mut tx = self.begin(SourceId::NONE);
        let len = self.length();
        tx.modify(0, len, bytes);
        tx.history_mut().clear();
        let record = tx.end_custom()?;
        self.logger()
            .scope(|| tracing::debug!(bytes = bytes.len(), "loaded buffer content"));
        Ok(record)
    }

    /// Current content
    pub fn snapshot(&self) -> Arc<BufferSnapshot> {
        let state = self
            .shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state)
    }

    /// Length in bytes
    pub fn length(&self) -> usize {
        self.snapshot().len()
    }

    /// Number of completed transactions
    pub fn revision(&self) -> u64 {
        self.snapshot().revision()
    }

    /// Opaque language tag used by consumers
    pub fn language(&self) -> String {
        self.shared
            .language
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_language(&self, language: impl Into<String>) {
        *self
            .shared
            .language
            .write()
            .unwrap_or_else(PoisonError::into_inner) = language.into();
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.logger
    }

    /// Whether both handles refer to the same buffer
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // -------------------------------------------------------------------------
    // Options and history
    // -------------------------------------------------------------------------

    pub fn options(&self) -> BufferOptions {
        lock(&self.shared.writer).options.clone()
    }

    /// Replace the options; a lower history limit evicts the oldest entries
    /// right away
    pub fn set_options(&self, options: BufferOptions) {
        let mut writer = lock(&self.shared.writer);
        let evicted = writer.history.enforce_limit(options.history_limit);
        writer.options = options;
        drop(writer);
        self.logger().scope(|| {
            tracing::debug!(evicted, "buffer options changed");
        });
    }

    /// Inspect the undo history
    pub fn with_history<R>(&self, f: impl FnOnce(&UndoHistory) -> R) -> R {
        f(&lock(&self.shared.writer).history)
    }

    pub fn can_undo(&self) -> bool {
        self.with_history(UndoHistory::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.with_history(UndoHistory::can_redo)
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    /// Open a transaction, waiting for any other writer to finish.
    ///
    /// A thread must not open a second transaction on a buffer while it still
    /// holds one.
    pub fn begin(&self, source: SourceId) -> Transaction<'_> {
        Transaction::new(self, lock(&self.shared.writer), source, EditKind::Normal)
    }

    /// Open a transaction, failing if another one is open
    pub fn try_begin(&self, source: SourceId) -> Result<Transaction<'_>> {
        let writer = match self.shared.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(BufferError::TransactionInProgress),
        };
        Ok(Transaction::new(self, writer, source, EditKind::Normal))
    }

    /// Revert the most recent undo entry.
    ///
    /// Returns the applied inverse edit, or `None` if there is nothing to undo.
    pub fn undo(&self, source: SourceId) -> Result<Option<EditRecord>> {
        Transaction::new(self, lock(&self.shared.writer), source, EditKind::Undo).replay_undo()
    }

    /// Re-apply the most recently undone entry
    pub fn redo(&self, source: SourceId) -> Result<Option<EditRecord>> {
        Transaction::new(self, lock(&self.shared.writer), source, EditKind::Redo).replay_redo()
    }

    /// Undo if possible; an empty stack is not an error
    pub fn try_undo(&self) -> bool {
        self.report_replay("undo", self.undo(SourceId::NONE))
    }

    /// Redo if possible; an empty stack is not an error
    pub fn try_redo(&self) -> bool {
        self.report_replay("redo", self.redo(SourceId::NONE))
    }

    fn report_replay(&self, what: &str, result: Result<Option<EditRecord>>) -> bool {
        match result {
            Ok(applied) => applied.is_some(),
            Err(err) => {
                self.logger().scope(|| {
                    tracing::warn!(
                        code = err.code(),
                        severity = %err.severity(),
                        "{} failed: {}",
                        what,
                        err
                    );
                });
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    /// Register a listener for edits on this buffer
    pub fn subscribe(&self, listener: impl EditListener + 'static) -> Subscription {
        let mut listeners = lock(&self.shared.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Register a closure called after every edit
    pub fn on_edit<F>(&self, f: F) -> Subscription
    where
        F: Fn(&EditEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(f)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).entries.len()
    }

    fn current_listeners(&self) -> Vec<Arc<dyn EditListener>> {
        lock(&self.shared.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    /// Fire `begin_edit`, publish `event.after`, fire `end_edit`
    pub(crate) fn publish(&self, event: &EditEvent<'_>) {
        let listeners = self.current_listeners();
        for listener in &listeners {
            listener.begin_edit(event);
        }

        *self
            .shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(event.after);

        for listener in &listeners {
            listener.end_edit(event);
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("snapshot", &self.snapshot())
            .field("language", &self.language())
            .finish()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
