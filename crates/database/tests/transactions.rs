//! End-to-end transaction behavior across multiple tables.

use std::cell::RefCell;
use std::rc::Rc;

use tabula_core::{Error, Operation, OperationKind, Record};
use tabula_database::DatabaseBuilder;
use tabula_storage::{SortMode, TableBuilder};

#[derive(Clone, Debug, PartialEq)]
struct User {
    id: u32,
    age: u8,
}

impl Record for User {
    type Key = u32;

    fn primary_key(&self) -> u32 {
        self.id
    }

    fn element_name() -> &'static str {
        "User"
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Item {
    id: u32,
    owner: u32,
}

impl Record for Item {
    type Key = u32;

    fn primary_key(&self) -> u32 {
        self.id
    }

    fn element_name() -> &'static str {
        "Item"
    }
}

fn user(id: u32, age: u8) -> User {
    User { id, age }
}

fn item(id: u32, owner: u32) -> Item {
    Item { id, owner }
}

fn two_table_db() -> tabula_database::Database {
    let users = TableBuilder::<User>::new("users").build(vec![]).unwrap();
    let items = TableBuilder::<Item>::new("items").build(vec![]).unwrap();
    DatabaseBuilder::new()
        .register(users)
        .unwrap()
        .register(items)
        .unwrap()
        .build()
}

#[test]
fn test_rollback_restores_every_table() {
    let db = two_table_db();

    let tx = db.begin_transaction().unwrap();
    tx.insert(user(1, 20)).unwrap();
    tx.insert(user(2, 30)).unwrap();
    tx.insert(item(10, 1)).unwrap();
    db.rollback().unwrap();

    assert_eq!(db.table::<User>().unwrap().len(), 0);
    assert_eq!(db.table::<Item>().unwrap().len(), 0);
}

#[test]
fn test_commit_makes_changes_durable() {
    let db = two_table_db();

    db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        tx.insert(item(10, 1))?;
        Ok(())
    })
    .unwrap();

    assert_eq!(db.table::<User>().unwrap().len(), 1);
    assert_eq!(db.table::<Item>().unwrap().len(), 1);
    assert_eq!(db.table::<User>().unwrap().get(&1).unwrap(), user(1, 20));
}

#[test]
fn test_events_publish_in_cross_table_order() {
    let db = two_table_db();
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = log.clone();
    db.observer::<User>()
        .unwrap()
        .subscribe(move |op: &Operation<User>| {
            sink.borrow_mut().push(format!("user:{:?}", op.kind()));
        });
    let sink = log.clone();
    db.observer::<Item>()
        .unwrap()
        .subscribe(move |op: &Operation<Item>| {
            sink.borrow_mut().push(format!("item:{:?}", op.kind()));
        });

    db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        tx.insert(item(10, 1))?;
        tx.insert(user(2, 30))?;
        tx.remove_by_key::<Item>(&10)?;
        Ok(())
    })
    .unwrap();

    let events = log.borrow();
    assert_eq!(
        *events,
        vec![
            "user:Insert".to_string(),
            "item:Insert".to_string(),
            "user:Insert".to_string(),
            "item:Remove".to_string(),
        ]
    );
}

#[test]
fn test_rollback_discards_queued_events() {
    let db = two_table_db();
    let count = Rc::new(RefCell::new(0));

    let sink = count.clone();
    db.observer::<User>()
        .unwrap()
        .subscribe(move |_: &Operation<User>| {
            *sink.borrow_mut() += 1;
        });

    let tx = db.begin_transaction().unwrap();
    tx.insert(user(1, 20)).unwrap();
    db.rollback().unwrap();

    db.transaction(|tx| {
        tx.insert(user(2, 30))?;
        Ok(())
    })
    .unwrap();

    assert_eq!(*count.borrow(), 1);
}

#[test]
fn test_nested_transactions_commit_once() {
    let db = two_table_db();
    let count = Rc::new(RefCell::new(0));

    let sink = count.clone();
    db.observer::<User>()
        .unwrap()
        .subscribe(move |_: &Operation<User>| {
            *sink.borrow_mut() += 1;
        });

    let tx = db.begin_transaction().unwrap();
    tx.insert(user(1, 20)).unwrap();
    {
        let inner = db.begin_transaction().unwrap();
        inner.insert(user(2, 30)).unwrap();
        db.commit().unwrap();
    }
    // The inner commit collapsed into the outer level, nothing published.
    assert_eq!(*count.borrow(), 0);

    db.commit().unwrap();
    assert_eq!(*count.borrow(), 2);
    assert_eq!(db.table::<User>().unwrap().len(), 2);
}

#[test]
fn test_nested_rollback_unwinds_all_levels() {
    let db = two_table_db();

    let tx = db.begin_transaction().unwrap();
    tx.insert(user(1, 20)).unwrap();
    let inner = db.begin_transaction().unwrap();
    inner.insert(user(2, 30)).unwrap();

    db.rollback().unwrap();
    assert_eq!(db.table::<User>().unwrap().len(), 0);

    // Both levels are gone; a commit now has nothing to close.
    assert_eq!(db.commit(), Err(Error::NoTransaction));
}

#[test]
fn test_commit_without_transaction_fails() {
    let db = two_table_db();
    assert_eq!(db.commit(), Err(Error::NoTransaction));
}

#[test]
fn test_rollback_without_transaction_is_noop() {
    let db = two_table_db();
    assert_eq!(db.rollback(), Ok(()));
}

#[test]
fn test_facade_outlives_its_transaction() {
    let db = two_table_db();

    let tx = db.begin_transaction().unwrap();
    tx.insert(user(1, 20)).unwrap();
    db.commit().unwrap();

    assert_eq!(tx.insert(user(2, 30)), Err(Error::NoTransaction));
    assert_eq!(db.table::<User>().unwrap().len(), 1);
}

#[test]
fn test_closure_error_rolls_back() {
    let db = two_table_db();

    let outcome = db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        Err(Error::invalid_operation("loader failed"))
    });

    assert!(outcome.is_err());
    assert_eq!(db.table::<User>().unwrap().len(), 0);
}

#[test]
fn test_out_of_transaction_writes_survive_later_rollback() {
    let db = two_table_db();
    let users = db.table::<User>().unwrap();

    // Written straight through the table handle, with no transaction open.
    assert!(users.insert(user(1, 20)).unwrap());

    let outcome = db.transaction(|tx| {
        tx.insert(user(2, 30))?;
        tx.insert(item(10, 2))?;
        Err(Error::invalid_operation("abort"))
    });

    assert!(outcome.is_err());
    assert_eq!(users.len(), 1);
    assert_eq!(users.get(&1).unwrap(), user(1, 20));
    assert_eq!(db.table::<Item>().unwrap().len(), 0);
}

#[test]
fn test_duplicate_key_inside_closure_rolls_back() {
    let db = two_table_db();

    let outcome = db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        tx.insert(item(10, 1))?;
        tx.insert(user(1, 99))?;
        Ok(())
    });

    assert!(matches!(outcome, Err(Error::DuplicateKey { .. })));
    assert_eq!(db.table::<User>().unwrap().len(), 0);
    assert_eq!(db.table::<Item>().unwrap().len(), 0);
}

#[test]
fn test_before_commit_hook_failure_rolls_back() {
    let db = two_table_db();
    db.on_before_commit(|| Err(Error::invalid_operation("refused")));

    let published = Rc::new(RefCell::new(0));
    let sink = published.clone();
    db.observer::<User>()
        .unwrap()
        .subscribe(move |_: &Operation<User>| {
            *sink.borrow_mut() += 1;
        });

    let outcome = db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        Ok(())
    });

    assert!(outcome.is_err());
    assert_eq!(db.table::<User>().unwrap().len(), 0);
    assert_eq!(*published.borrow(), 0);
}

#[test]
fn test_after_commit_hook_failure_rolls_back() {
    let db = two_table_db();
    db.on_after_commit(|| Err(Error::invalid_operation("post check failed")));

    let outcome = db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        Ok(())
    });

    assert!(outcome.is_err());
    assert_eq!(db.table::<User>().unwrap().len(), 0);
}

#[test]
fn test_batch_operations_report_applied_counts() {
    let db = two_table_db();

    db.transaction(|tx| {
        let inserted = tx.insert_many(vec![user(1, 20), user(2, 30), user(3, 40)])?;
        assert_eq!(inserted, 3);

        let removed = tx.remove_many::<User, _>(vec![2, 7])?;
        assert_eq!(removed, 1);

        let replaced = tx.replace_many(vec![user(1, 21)])?;
        assert_eq!(replaced, 1);
        Ok(())
    })
    .unwrap();

    let users = db.table::<User>().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users.get(&1).unwrap().age, 21);
}

#[test]
fn test_clear_all_empties_every_table() {
    let db = two_table_db();

    db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        tx.insert(item(10, 1))?;
        Ok(())
    })
    .unwrap();

    db.transaction(|tx| tx.clear_all()).unwrap();

    assert_eq!(db.table::<User>().unwrap().len(), 0);
    assert_eq!(db.table::<Item>().unwrap().len(), 0);
}

#[test]
fn test_unregistered_type_is_reported() {
    #[derive(Clone, Debug, PartialEq)]
    struct Ghost {
        id: u32,
    }

    impl Record for Ghost {
        type Key = u32;

        fn primary_key(&self) -> u32 {
            self.id
        }
    }

    let db = two_table_db();
    assert!(matches!(
        db.table::<Ghost>(),
        Err(Error::TableNotFound { .. })
    ));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let first = TableBuilder::<User>::new("users").build(vec![]).unwrap();
    let second = TableBuilder::<User>::new("users_again").build(vec![]).unwrap();

    let outcome = DatabaseBuilder::new().register(first).unwrap().register(second);
    assert!(matches!(outcome, Err(Error::InvalidOperation { .. })));
}

#[test]
fn test_disposed_database_refuses_everything() {
    let db = two_table_db();
    db.dispose();

    assert!(db.is_disposed());
    assert_eq!(db.table::<User>().err(), Some(Error::Disposed));
    assert!(matches!(db.begin_transaction().err(), Some(Error::Disposed)));
    assert_eq!(db.commit(), Err(Error::Disposed));
    assert_eq!(db.rollback(), Err(Error::Disposed));
}

#[test]
fn test_deferred_tables_stay_readable_through_transactions() {
    let mut builder: TableBuilder<User> = TableBuilder::new("users");
    let by_age = builder.index("age", |u: &User| u.age);
    builder.sort_mode(SortMode::Deferred);
    let table = builder.build(vec![]).unwrap();

    let db = DatabaseBuilder::new()
        .max_sort_parallelism(2)
        .register(table)
        .unwrap()
        .build();

    db.transaction(|tx| {
        for id in 0..200u32 {
            tx.insert(user(id, (id % 50) as u8))?;
        }
        Ok(())
    })
    .unwrap();

    let users = db.table::<User>().unwrap();
    let thirty = users.find_many(&by_age, &30, true).unwrap();
    assert_eq!(thirty.len().unwrap(), 4);
    assert!(thirty.to_vec().unwrap().iter().all(|u| u.age == 30));

    db.transaction(|tx| {
        tx.remove_by_key::<User>(&30)?;
        Ok(())
    })
    .unwrap();

    let thirty = users.find_many(&by_age, &30, true).unwrap();
    assert_eq!(thirty.len().unwrap(), 3);
}

#[test]
fn test_operation_kinds_survive_publication() {
    let db = two_table_db();
    let kinds: Rc<RefCell<Vec<OperationKind>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = kinds.clone();
    db.observer::<User>()
        .unwrap()
        .subscribe(move |op: &Operation<User>| {
            sink.borrow_mut().push(op.kind());
        });

    db.transaction(|tx| {
        tx.insert(user(1, 20))?;
        tx.replace(user(1, 21))?;
        tx.insert_or_replace(user(2, 30))?;
        tx.remove_by_key::<User>(&2)?;
        tx.clear::<User>()?;
        Ok(())
    })
    .unwrap();

    assert_eq!(
        *kinds.borrow(),
        vec![
            OperationKind::Insert,
            OperationKind::Replace,
            OperationKind::InsertOrReplace,
            OperationKind::Remove,
            OperationKind::Clear,
        ]
    );
}
