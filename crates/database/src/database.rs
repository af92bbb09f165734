//! The database container: a registry of typed tables sharing one
//! transaction scope.
//!
//! A [`Database`] is built once from a [`DatabaseBuilder`] and holds one
//! [`Table`] plus one [`TableObserver`] per registered record type. Every
//! mutation routed through the transaction facade lands in the table, is
//! mirrored into the observer queue, and leaves a breadcrumb in a shared
//! order queue so that commit can publish events across tables in the
//! exact order the mutations happened.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use tabula_core::{Error, Record, Result};
use tabula_reactive::TableObserver;
use tabula_storage::{SortTask, Table};

use crate::schedule::SortScheduler;
use crate::transaction::Transaction;

/// One registered table together with its commit-time observer.
pub(crate) struct TableEntry<R: Record> {
    pub(crate) table: Rc<Table<R>>,
    pub(crate) observer: Rc<TableObserver<R>>,
}

/// Type-erased view of a [`TableEntry`] used by the commit pipeline.
pub(crate) trait AnyEntry {
    fn rollback(&self) -> Result<()>;
    fn clear_rollback(&self);
    fn publish_next(&self) -> Result<()>;
    fn clear_observer(&self);
    fn clear_table(&self) -> Result<bool>;
    fn as_any(&self) -> &dyn Any;
}

impl<R: Record> AnyEntry for TableEntry<R> {
    fn rollback(&self) -> Result<()> {
        self.table.rollback()
    }

    fn clear_rollback(&self) {
        self.table.clear_rollback();
    }

    fn publish_next(&self) -> Result<()> {
        self.observer.publish_next()
    }

    fn clear_observer(&self) {
        self.observer.clear();
    }

    fn clear_table(&self) -> Result<bool> {
        self.table.clear()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct TxState {
    depth: u32,
    committing: bool,
    disposed: bool,
}

/// Builds a [`Database`] from a set of pre-loaded tables.
pub struct DatabaseBuilder {
    entries: Vec<Rc<dyn AnyEntry>>,
    by_type: HashMap<TypeId, usize>,
    order: Rc<RefCell<VecDeque<usize>>>,
    sort_tasks: Vec<Arc<dyn SortTask>>,
    max_sort_parallelism: usize,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_type: HashMap::new(),
            order: Rc::new(RefCell::new(VecDeque::new())),
            sort_tasks: Vec::new(),
            max_sort_parallelism: 1,
        }
    }

    /// Caps the number of background threads draining deferred sort queues.
    pub fn max_sort_parallelism(mut self, workers: usize) -> Self {
        self.max_sort_parallelism = workers.max(1);
        self
    }

    /// Registers a table under its record type.
    ///
    /// Each record type may be registered once. The table's change callback
    /// is taken over by the database: from here on every applied change is
    /// mirrored into the table's observer queue and the cross-table order
    /// queue.
    pub fn register<R: Record>(mut self, table: Table<R>) -> Result<Self> {
        let type_id = TypeId::of::<R>();
        if self.by_type.contains_key(&type_id) {
            return Err(Error::invalid_operation(format!(
                "table for {} is already registered",
                R::element_name()
            )));
        }

        let at = self.entries.len();
        let table = Rc::new(table);
        let observer = Rc::new(TableObserver::new());

        let order = self.order.clone();
        let queue = observer.clone();
        table.set_on_change(move |change| {
            queue.enqueue(change.operation());
            order.borrow_mut().push_back(at);
        });

        self.sort_tasks.extend(table.sort_tasks());
        self.by_type.insert(type_id, at);
        self.entries.push(Rc::new(TableEntry { table, observer }));
        Ok(self)
    }

    pub fn build(self) -> Database {
        let depth_gauge = Arc::new(AtomicU32::new(0));
        let scheduler = if self.sort_tasks.is_empty() {
            None
        } else {
            Some(SortScheduler::new(
                self.sort_tasks,
                self.max_sort_parallelism,
                depth_gauge.clone(),
            ))
        };
        Database {
            entries: self.entries,
            by_type: self.by_type,
            order: self.order,
            tx: RefCell::new(TxState {
                depth: 0,
                committing: false,
                disposed: false,
            }),
            depth_gauge,
            scheduler,
            before_commit: RefCell::new(Vec::new()),
            after_commit: RefCell::new(Vec::new()),
        }
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of typed tables sharing one transaction scope.
pub struct Database {
    entries: Vec<Rc<dyn AnyEntry>>,
    by_type: HashMap<TypeId, usize>,
    order: Rc<RefCell<VecDeque<usize>>>,
    tx: RefCell<TxState>,
    depth_gauge: Arc<AtomicU32>,
    scheduler: Option<SortScheduler>,
    before_commit: RefCell<Vec<Box<dyn Fn() -> Result<()>>>>,
    after_commit: RefCell<Vec<Box<dyn Fn() -> Result<()>>>>,
}

impl Database {
    pub(crate) fn entry<R: Record>(&self) -> Result<&TableEntry<R>> {
        let at = self
            .by_type
            .get(&TypeId::of::<R>())
            .copied()
            .ok_or_else(|| Error::table_not_found(R::element_name()))?;
        self.entries[at]
            .as_any()
            .downcast_ref::<TableEntry<R>>()
            .ok_or_else(|| Error::table_not_found(R::element_name()))
    }

    fn check_live(&self) -> Result<()> {
        if self.tx.borrow().disposed {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    /// Returns the table registered for `R`, for reads.
    pub fn table<R: Record>(&self) -> Result<Rc<Table<R>>> {
        self.check_live()?;
        Ok(self.entry::<R>()?.table.clone())
    }

    /// Returns the commit-time observer of the table registered for `R`.
    pub fn observer<R: Record>(&self) -> Result<Rc<TableObserver<R>>> {
        self.check_live()?;
        Ok(self.entry::<R>()?.observer.clone())
    }

    /// Number of registered tables.
    pub fn table_count(&self) -> usize {
        self.entries.len()
    }

    /// Registers a hook that runs before any queued event is published.
    /// A hook error aborts the commit and rolls every table back.
    pub fn on_before_commit(&self, hook: impl Fn() -> Result<()> + 'static) {
        self.before_commit.borrow_mut().push(Box::new(hook));
    }

    /// Registers a hook that runs after all queued events were published.
    /// A hook error rolls every table back, so observers may have seen
    /// events for state that was since undone.
    pub fn on_after_commit(&self, hook: impl Fn() -> Result<()> + 'static) {
        self.after_commit.borrow_mut().push(Box::new(hook));
    }

    /// Opens a transaction, or deepens the current one.
    ///
    /// The outermost open discards any leftover rollback and event buffers,
    /// so a later rollback never reverts past this point. Mutations applied
    /// directly to a `Table` outside a transaction become permanent here.
    pub fn begin_transaction(&self) -> Result<Transaction<'_>> {
        let mut tx = self.tx.borrow_mut();
        if tx.disposed {
            return Err(Error::Disposed);
        }
        if tx.committing {
            return Err(Error::Committing);
        }
        tx.depth += 1;
        let outermost = tx.depth == 1;
        self.depth_gauge.store(tx.depth, Ordering::Release);
        drop(tx);
        if outermost {
            self.clear_buffers();
        }
        Ok(Transaction::new(self))
    }

    /// Commits the innermost transaction level.
    ///
    /// Only the outermost commit publishes: inner levels merely collapse
    /// into their parent. Committing with no open transaction is an error.
    pub fn commit(&self) -> Result<()> {
        let mut tx = self.tx.borrow_mut();
        if tx.disposed {
            return Err(Error::Disposed);
        }
        if tx.committing {
            return Err(Error::Committing);
        }
        match tx.depth {
            0 => Err(Error::NoTransaction),
            1 => {
                tx.depth = 0;
                self.depth_gauge.store(0, Ordering::Release);
                drop(tx);
                self.commit_outer()
            }
            _ => {
                tx.depth -= 1;
                self.depth_gauge.store(tx.depth, Ordering::Release);
                Ok(())
            }
        }
    }

    fn commit_outer(&self) -> Result<()> {
        self.tx.borrow_mut().committing = true;
        let published = self.publish_all();
        let result = match published {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = self.rollback_all();
                Err(err)
            }
        };
        self.clear_buffers();
        self.tx.borrow_mut().committing = false;
        result
    }

    fn publish_all(&self) -> Result<()> {
        for hook in self.before_commit.borrow().iter() {
            hook()?;
        }
        loop {
            let next = self.order.borrow_mut().pop_front();
            match next {
                Some(at) => self.entries[at].publish_next()?,
                None => break,
            }
        }
        for hook in self.after_commit.borrow().iter() {
            hook()?;
        }
        Ok(())
    }

    /// Rolls back every open transaction level.
    ///
    /// All tables are restored to their state at the outermost
    /// `begin_transaction` and every queued event is discarded. Rolling
    /// back with no open transaction is a no-op.
    pub fn rollback(&self) -> Result<()> {
        let mut tx = self.tx.borrow_mut();
        if tx.disposed {
            return Err(Error::Disposed);
        }
        if tx.committing {
            return Err(Error::Committing);
        }
        if tx.depth == 0 {
            return Ok(());
        }
        tx.depth = 0;
        self.depth_gauge.store(0, Ordering::Release);
        drop(tx);
        let result = self.rollback_all();
        self.clear_buffers();
        result
    }

    fn rollback_all(&self) -> Result<()> {
        let mut first_err = None;
        for entry in &self.entries {
            if let Err(err) = entry.rollback() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn clear_buffers(&self) {
        self.order.borrow_mut().clear();
        for entry in &self.entries {
            entry.clear_rollback();
            entry.clear_observer();
        }
    }

    /// Runs `body` inside a transaction, committing on success and rolling
    /// back when `body` returns an error.
    pub fn transaction<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce(&Transaction<'_>) -> Result<()>,
    {
        let tx = self.begin_transaction()?;
        match body(&tx) {
            Ok(()) => self.commit(),
            Err(err) => {
                let _ = self.rollback();
                Err(err)
            }
        }
    }

    pub(crate) fn assert_can_execute(&self) -> Result<()> {
        let tx = self.tx.borrow();
        if tx.disposed {
            return Err(Error::Disposed);
        }
        if tx.committing {
            return Err(Error::Committing);
        }
        if tx.depth == 0 {
            return Err(Error::NoTransaction);
        }
        Ok(())
    }

    pub(crate) fn entries(&self) -> &[Rc<dyn AnyEntry>] {
        &self.entries
    }

    pub(crate) fn poke_scheduler(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.try_schedule();
        }
    }

    /// True while a deferred-sort pass is scheduled or running.
    pub fn sorting(&self) -> bool {
        self.scheduler
            .as_ref()
            .map(|s| !s.is_idle())
            .unwrap_or(false)
    }

    /// Shuts the database down: open transactions are abandoned, buffered
    /// state is discarded and sort workers are told to stop. Every call
    /// after this returns [`Error::Disposed`].
    pub fn dispose(&self) {
        {
            let mut tx = self.tx.borrow_mut();
            if tx.disposed {
                return;
            }
            tx.disposed = true;
            tx.depth = 0;
        }
        self.depth_gauge.store(0, Ordering::Release);
        self.clear_buffers();
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.tx.borrow().disposed
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.dispose();
    }
}
