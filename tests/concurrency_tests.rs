// Declare the common module *within this test crate*
mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use rand::Rng;
use savemode::prelude::*;

use common::{name_payload, named, new_key, seed, setup_database, stored_name};

const WRITERS: usize = 8;

#[test]
fn racing_inserts_with_duplicate_key_tolerated_all_succeed() {
    let (storage, database) = setup_database(CoordinatorConfig::default());
    let id = new_key();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let database = Arc::clone(&database);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            thread::spawn(move || {
                let mut session = database.open_session();
                session.add(named(&id, &format!("writer-{}", writer))).unwrap();
                barrier.wait();
                session.save_changes_with(ResolutionMode::DUPLICATE_KEY)
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().expect("writer panicked");
        assert!(result.is_ok(), "save failed: {:?}", result);
    }

    assert_eq!(storage.len(), 1);
    let winner = stored_name(&*storage, &id).unwrap();
    assert!(winner.starts_with("writer-"), "unexpected payload {}", winner);
}

#[test]
fn racing_inserts_without_tolerance_have_exactly_one_winner() {
    let (storage, database) = setup_database(CoordinatorConfig::default());
    let id = new_key();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let database = Arc::clone(&database);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            thread::spawn(move || {
                let mut session = database.open_session();
                session.add(named(&id, &format!("writer-{}", writer))).unwrap();
                barrier.wait();
                session.save_changes()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.join().expect("writer panicked") {
            Ok(()) => winners += 1,
            Err(e) => assert_eq!(e.signature(), Some(ConflictSignature::DuplicateKey)),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(storage.len(), 1);
}

#[test]
fn update_interleaved_with_concurrent_delete() {
    // 1. Initial: key1 = v1
    // 2. Tx1: track key1, modify to v2, wait(B1), wait(B2), save
    // 3. Tx2: wait(B1), delete key1, save, signal(B2)
    // Expected: Tx2 deletes; Tx1's update is dropped under MissingTarget tolerance.
    let (storage, database) = setup_database(CoordinatorConfig::default());
    let id = new_key();
    seed(&database, &id, "v1");
    let barrier = Arc::new(Barrier::new(2));

    let updater = {
        let database = Arc::clone(&database);
        let barrier = Arc::clone(&barrier);
        let id = id.clone();
        thread::spawn(move || {
            let mut session = database.open_session();
            session.attach(database.find(&id).unwrap().unwrap());
            session.modify(&id, name_payload("v2")).unwrap();
            barrier.wait();
            barrier.wait();
            session.save_changes_with(ResolutionMode::MISSING_TARGET)
        })
    };

    let deleter = {
        let database = Arc::clone(&database);
        let barrier = Arc::clone(&barrier);
        let id = id.clone();
        thread::spawn(move || {
            barrier.wait();
            let mut session = database.open_session();
            session.remove(&id).unwrap();
            let result = session.save_changes();
            barrier.wait();
            result
        })
    };

    deleter
        .join()
        .expect("deleter panicked")
        .expect("delete should succeed");
    updater
        .join()
        .expect("updater panicked")
        .expect("update should be dropped, not fail");
    assert!(storage.get(&id).is_none());
}

#[test]
fn mixed_writers_in_all_mode_never_fail() {
    const POOL: usize = 6;
    const ROUNDS: usize = 50;

    let (storage, database) = setup_database(CoordinatorConfig::default());
    let keys: Arc<Vec<RecordKey>> = Arc::new((0..POOL).map(|_| new_key()).collect());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let database = Arc::clone(&database);
            let barrier = Arc::clone(&barrier);
            let keys = Arc::clone(&keys);
            thread::spawn(move || {
                let mut rng = rand::rng();
                barrier.wait();
                for round in 0..ROUNDS {
                    let mut session = database.open_session();
                    for _ in 0..3 {
                        let key = &keys[rng.random_range(0..POOL)];
                        if rng.random_bool(0.5) {
                            let name = format!("writer-{}-round-{}", writer, round);
                            session.add(named(key, &name)).unwrap();
                        } else {
                            session.remove(key).unwrap();
                        }
                    }
                    session.save_changes_with(ResolutionMode::ALL)?;
                }
                Ok::<(), SaveError>(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .expect("writer panicked")
            .expect("only tolerated conflicts can occur");
    }
    assert!(storage.len() <= POOL);
}
