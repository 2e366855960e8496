//! Client-side cache of monitored tables.
//!
//! The cache stores the latest wire row per UUID per table, ingests
//! [`TableUpdates`] batches from the monitor notification callback, and fans
//! add/update/delete events out to registered handlers.
//!
//! # Concurrency
//!
//! Three lock levels protect the cache: the outer table map, each per-table
//! row cache, and the handler list. When more than one is needed the order
//! is always outer, then row cache, then handlers; no other order is ever
//! taken. A batch is applied atomically per table: a reader of a row cache
//! sees all of a batch's updates for that table or none of them.
//!
//! # Event dispatch
//!
//! Every (handler, event) pair runs as its own task, so handlers must not
//! assume ordering or synchronous delivery and must synchronise any shared
//! state themselves. A panicking handler is caught and logged; it cannot
//! corrupt the cache or starve other handlers. Dispatch uses the ambient
//! tokio runtime, so `update` must run inside one whenever handlers are
//! registered.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use ovsdb_core::wire::{Row, TableUpdates};
use parking_lot::Mutex;

/// Receives cache events. Implementations are shared across tasks.
pub trait EventHandler: Send + Sync {
    /// A row appeared in a table.
    fn on_add(&self, table: &str, row: &Row);

    /// A row changed. `old` and `new` are the images from the update
    /// notification.
    fn on_update(&self, table: &str, old: &Row, new: &Row);

    /// A row was deleted; `row` is its last known image.
    fn on_delete(&self, table: &str, row: &Row);
}

/// Callback for add and delete events.
pub type RowCallback = Box<dyn Fn(&str, &Row) + Send + Sync>;
/// Callback for update events, receiving the old and new row images.
pub type RowUpdateCallback = Box<dyn Fn(&str, &Row, &Row) + Send + Sync>;

/// [`EventHandler`] assembled from individual callbacks, for callers that
/// only care about some events. Absent callbacks are skipped.
#[derive(Default)]
pub struct EventHandlerFuncs {
    pub add: Option<RowCallback>,
    pub update: Option<RowUpdateCallback>,
    pub delete: Option<RowCallback>,
}

impl EventHandler for EventHandlerFuncs {
    fn on_add(&self, table: &str, row: &Row) {
        if let Some(add) = &self.add {
            add(table, row);
        }
    }

    fn on_update(&self, table: &str, old: &Row, new: &Row) {
        if let Some(update) = &self.update {
            update(table, old, new);
        }
    }

    fn on_delete(&self, table: &str, row: &Row) {
        if let Some(delete) = &self.delete {
            delete(table, row);
        }
    }
}

/// The rows of one table, keyed by UUID.
pub struct RowCache {
    rows: Mutex<HashMap<String, Row>>,
}

impl RowCache {
    fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()) }
    }

    /// The latest row stored under a UUID. Absence means the row was never
    /// added or has been deleted.
    #[must_use]
    pub fn row(&self, uuid: &str) -> Option<Row> {
        self.rows.lock().get(uuid).cloned()
    }

    /// The UUIDs currently present.
    #[must_use]
    pub fn rows(&self) -> Vec<String> {
        self.rows.lock().keys().cloned().collect()
    }

    /// Number of rows currently present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

/// One dispatched cache event.
enum Event {
    Add { table: String, new: Row },
    Update { table: String, old: Row, new: Row },
    Delete { table: String, old: Row },
}

/// Concurrent cache of monitored tables.
pub struct TableCache {
    tables: Mutex<HashMap<String, Arc<RowCache>>>,
    handlers: Mutex<Vec<Arc<dyn EventHandler>>>,
}

impl TableCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// The row cache of a table, if any update has mentioned it yet.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<Arc<RowCache>> {
        self.tables.lock().get(name).cloned()
    }

    /// Names of the tables seen so far.
    #[must_use]
    pub fn tables(&self) -> Vec<String> {
        self.tables.lock().keys().cloned().collect()
    }

    /// Registers a handler for subsequent events. Registration is additive;
    /// there is no deregistration.
    pub fn add_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.lock().push(handler);
    }

    /// Applies one update batch from the monitor notification callback.
    ///
    /// Per (table, uuid): a non-empty `new` inserts or replaces the stored
    /// row, a `new` equal to the stored row is a no-op, and an empty `new`
    /// deletes. Events fire only for actual state changes; re-applying a
    /// batch fires nothing. Tables are created on first sight.
    ///
    /// The batch is applied synchronously; event dispatch is asynchronous.
    pub fn update(&self, updates: &TableUpdates) {
        if updates.updates.is_empty() {
            return;
        }

        let mut events = Vec::new();
        {
            let mut tables = self.tables.lock();
            for (table, table_update) in &updates.updates {
                let row_cache = tables
                    .entry(table.clone())
                    .or_insert_with(|| Arc::new(RowCache::new()))
                    .clone();
                let mut rows = row_cache.rows.lock();
                for (uuid, row_update) in &table_update.rows {
                    if !row_update.new.is_empty() {
                        match rows.get(uuid) {
                            Some(existing) if *existing == row_update.new => {}
                            Some(_) => {
                                rows.insert(uuid.clone(), row_update.new.clone());
                                events.push(Event::Update {
                                    table: table.clone(),
                                    old: row_update.old.clone(),
                                    new: row_update.new.clone(),
                                });
                            }
                            None => {
                                rows.insert(uuid.clone(), row_update.new.clone());
                                events.push(Event::Add {
                                    table: table.clone(),
                                    new: row_update.new.clone(),
                                });
                            }
                        }
                    } else if rows.remove(uuid).is_some() {
                        events.push(Event::Delete {
                            table: table.clone(),
                            old: row_update.old.clone(),
                        });
                    }
                }
            }
        }

        self.dispatch(events);
    }

    /// Fires one task per (handler, event). Handler panics are contained.
    fn dispatch(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let handlers = self.handlers.lock().clone();
        if handlers.is_empty() {
            return;
        }

        for event in events {
            let event = Arc::new(event);
            for handler in &handlers {
                let handler = Arc::clone(handler);
                let event = Arc::clone(&event);
                tokio::spawn(async move {
                    let outcome = catch_unwind(AssertUnwindSafe(|| match &*event {
                        Event::Add { table, new } => handler.on_add(table, new),
                        Event::Update { table, old, new } => handler.on_update(table, old, new),
                        Event::Delete { table, old } => handler.on_delete(table, old),
                    }));
                    if outcome.is_err() {
                        tracing::warn!("cache event handler panicked; event discarded");
                    }
                });
            }
        }
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use ovsdb_core::wire::{OvsValue, RowUpdate, TableUpdate};
    use tokio::sync::mpsc;

    use super::*;

    const U1: &str = "2f77b348-9768-4866-b761-89d5177ecda0";
    const U2: &str = "2f77b348-9768-4866-b761-89d5177ecda1";

    fn row(name: &str) -> Row {
        let mut row = Row::new();
        row.insert("name", OvsValue::String(name.to_string()));
        row
    }

    fn batch(table: &str, uuid: &str, old: Row, new: Row) -> TableUpdates {
        let mut rows = BTreeMap::new();
        rows.insert(uuid.to_string(), RowUpdate { old, new });
        let mut updates = BTreeMap::new();
        updates.insert(table.to_string(), TableUpdate { rows });
        TableUpdates { updates }
    }

    /// What one event looked like, for channel-based assertions.
    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Add(String, Row),
        Update(String, Row, Row),
        Delete(String, Row),
    }

    struct ChannelHandler {
        sender: mpsc::UnboundedSender<Seen>,
    }

    impl EventHandler for ChannelHandler {
        fn on_add(&self, table: &str, row: &Row) {
            let _ = self.sender.send(Seen::Add(table.to_string(), row.clone()));
        }
        fn on_update(&self, table: &str, old: &Row, new: &Row) {
            let _ = self
                .sender
                .send(Seen::Update(table.to_string(), old.clone(), new.clone()));
        }
        fn on_delete(&self, table: &str, row: &Row) {
            let _ = self.sender.send(Seen::Delete(table.to_string(), row.clone()));
        }
    }

    async fn next_event(receiver: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for a cache event")
            .expect("event channel closed")
    }

    async fn assert_no_event(receiver: &mut mpsc::UnboundedReceiver<Seen>) {
        let outcome = tokio::time::timeout(Duration::from_millis(50), receiver.recv()).await;
        assert!(outcome.is_err(), "expected no event, got {outcome:?}");
    }

    // ---- Storage without handlers ----

    #[test]
    fn insert_update_delete_without_handlers() {
        let cache = TableCache::new();
        assert!(cache.table("Bridge").is_none());
        assert!(cache.tables().is_empty());

        cache.update(&batch("Bridge", U1, Row::new(), row("br0")));
        let bridge = cache.table("Bridge").expect("table created on first sight");
        assert_eq!(bridge.row(U1), Some(row("br0")));
        assert_eq!(bridge.rows(), vec![U1.to_string()]);

        cache.update(&batch("Bridge", U1, row("br0"), row("br0-renamed")));
        assert_eq!(bridge.row(U1), Some(row("br0-renamed")));

        cache.update(&batch("Bridge", U1, row("br0-renamed"), Row::new()));
        assert_eq!(bridge.row(U1), None);
        assert!(bridge.is_empty());
    }

    #[test]
    fn empty_batch_is_ignored() {
        let cache = TableCache::new();
        cache.update(&TableUpdates::default());
        assert!(cache.tables().is_empty());
    }

    #[test]
    fn batch_covers_multiple_tables() {
        let cache = TableCache::new();
        let mut updates = batch("Bridge", U1, Row::new(), row("br0"));
        updates.updates.insert(
            "Port".to_string(),
            TableUpdate {
                rows: {
                    let mut rows = BTreeMap::new();
                    rows.insert(U2.to_string(), RowUpdate { old: Row::new(), new: row("p1") });
                    rows
                },
            },
        );
        cache.update(&updates);

        let mut tables = cache.tables();
        tables.sort();
        assert_eq!(tables, vec!["Bridge".to_string(), "Port".to_string()]);
        assert_eq!(cache.table("Port").unwrap().row(U2), Some(row("p1")));
    }

    #[test]
    fn stored_row_survives_until_touched_again() {
        let cache = TableCache::new();
        cache.update(&batch("Bridge", U1, Row::new(), row("br0")));
        cache.update(&batch("Bridge", U2, Row::new(), row("br1")));
        // U1 untouched by the second batch.
        assert_eq!(cache.table("Bridge").unwrap().row(U1), Some(row("br0")));
    }

    // ---- Events ----

    #[tokio::test]
    async fn add_update_noop_delete_event_sequence() {
        let cache = TableCache::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        cache.add_event_handler(Arc::new(ChannelHandler { sender }));

        cache.update(&batch("Bridge", U1, Row::new(), row("r1")));
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Add("Bridge".to_string(), row("r1"))
        );

        cache.update(&batch("Bridge", U1, row("r1"), row("r2")));
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Update("Bridge".to_string(), row("r1"), row("r2"))
        );

        // Same update again: stored row already equals `new`, no event.
        cache.update(&batch("Bridge", U1, row("r1"), row("r2")));
        assert_no_event(&mut receiver).await;

        cache.update(&batch("Bridge", U1, row("r2"), Row::new()));
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Delete("Bridge".to_string(), row("r2"))
        );
    }

    #[tokio::test]
    async fn delete_fires_once_and_only_when_present() {
        let cache = TableCache::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        cache.add_event_handler(Arc::new(ChannelHandler { sender }));

        cache.update(&batch("Bridge", U1, Row::new(), row("r1")));
        next_event(&mut receiver).await;

        let delete = batch("Bridge", U1, row("r1"), Row::new());
        cache.update(&delete);
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Delete("Bridge".to_string(), row("r1"))
        );

        // Re-applying the same delete batch fires nothing.
        cache.update(&delete);
        assert_no_event(&mut receiver).await;
    }

    #[tokio::test]
    async fn all_handlers_receive_each_event() {
        let cache = TableCache::new();
        let (sender1, mut receiver1) = mpsc::unbounded_channel();
        let (sender2, mut receiver2) = mpsc::unbounded_channel();
        cache.add_event_handler(Arc::new(ChannelHandler { sender: sender1 }));
        cache.add_event_handler(Arc::new(ChannelHandler { sender: sender2 }));

        cache.update(&batch("Bridge", U1, Row::new(), row("r1")));
        let expected = Seen::Add("Bridge".to_string(), row("r1"));
        assert_eq!(next_event(&mut receiver1).await, expected);
        assert_eq!(next_event(&mut receiver2).await, expected);
    }

    #[tokio::test]
    async fn handler_registered_late_sees_only_new_events() {
        let cache = TableCache::new();
        cache.update(&batch("Bridge", U1, Row::new(), row("r1")));

        let (sender, mut receiver) = mpsc::unbounded_channel();
        cache.add_event_handler(Arc::new(ChannelHandler { sender }));
        assert_no_event(&mut receiver).await;

        cache.update(&batch("Bridge", U2, Row::new(), row("r2")));
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Add("Bridge".to_string(), row("r2"))
        );
    }

    #[tokio::test]
    async fn panicking_handler_does_not_block_others_or_the_cache() {
        struct PanickingHandler;
        impl EventHandler for PanickingHandler {
            fn on_add(&self, _: &str, _: &Row) {
                panic!("handler bug");
            }
            fn on_update(&self, _: &str, _: &Row, _: &Row) {}
            fn on_delete(&self, _: &str, _: &Row) {}
        }

        let cache = TableCache::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        cache.add_event_handler(Arc::new(PanickingHandler));
        cache.add_event_handler(Arc::new(ChannelHandler { sender }));

        cache.update(&batch("Bridge", U1, Row::new(), row("r1")));
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Add("Bridge".to_string(), row("r1"))
        );
        // The cache itself stayed consistent.
        assert_eq!(cache.table("Bridge").unwrap().row(U1), Some(row("r1")));
    }

    #[tokio::test]
    async fn event_handler_funcs_skips_absent_callbacks() {
        let cache = TableCache::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sender_clone = sender.clone();
        cache.add_event_handler(Arc::new(EventHandlerFuncs {
            add: Some(Box::new(move |table, new| {
                let _ = sender_clone.send(Seen::Add(table.to_string(), new.clone()));
            })),
            update: None,
            delete: None,
        }));

        cache.update(&batch("Bridge", U1, Row::new(), row("r1")));
        assert_eq!(
            next_event(&mut receiver).await,
            Seen::Add("Bridge".to_string(), row("r1"))
        );

        // Update and delete events hit the absent callbacks and vanish.
        cache.update(&batch("Bridge", U1, row("r1"), row("r2")));
        cache.update(&batch("Bridge", U1, row("r2"), Row::new()));
        assert_no_event(&mut receiver).await;
    }

    // ---- Concurrency ----

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingestion_keeps_rows_consistent() {
        let cache = Arc::new(TableCache::new());
        let mut join_handles = Vec::new();
        for writer in 0..4 {
            let cache = Arc::clone(&cache);
            join_handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let uuid = format!("uuid-{writer}-{i}");
                    cache.update(&batch("Bridge", &uuid, Row::new(), row(&uuid)));
                }
            }));
        }
        for handle in join_handles {
            handle.await.unwrap();
        }

        let bridge = cache.table("Bridge").unwrap();
        assert_eq!(bridge.len(), 200);
        assert_eq!(bridge.row("uuid-3-49"), Some(row("uuid-3-49")));
    }
}
