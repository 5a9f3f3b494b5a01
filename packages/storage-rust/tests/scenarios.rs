//! End-to-end behavior of the record store and queries over a redb engine.

use kvs_core::{record, CodecError, OwnerId};
use kvs_storage::{EngineConfig, Query, Store, StoreConfig, StoreError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
struct Balloon {
    id: u32,
    color: String,
    size: i64,
}

record! {
    Balloon {
        table: "balloons",
        row_id: id,
        fields: {
            id => ignore,
            color => text,
            size => json,
        },
    }
}

fn balloon(color: &str, size: i64) -> Balloon {
    Balloon {
        id: 0,
        color: color.to_string(),
        size,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Frosting {
    flavor: String,
    layers: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Cake {
    id: u32,
    baker: OwnerId,
    recipe: Vec<u8>,
    frosting: Frosting,
    tags: Vec<String>,
    scratch: String,
}

record! {
    Cake {
        table: "cakes",
        row_id: id,
        fields: {
            id => ignore,
            baker => identity,
            recipe => bytes,
            frosting => json,
            tags => json,
            scratch => ignore,
        },
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Gauge {
    reading: f64,
}

record! {
    Gauge {
        table: "gauges",
        fields: {
            reading => json,
        },
    }
}

/// Scenario A: saved records come back in save order with their row ids.
fn store_with_two_balloons() -> Store {
    let store = Store::in_memory().unwrap();
    assert_eq!(store.save(None, &mut balloon("RED", 695)).unwrap(), 0);
    assert_eq!(store.save(None, &mut balloon("WHITE", 366)).unwrap(), 1);
    store
}

#[test]
fn save_then_load_all_returns_rows_in_save_order() {
    let store = store_with_two_balloons();

    let balloons: Vec<Balloon> = store.load_all(None).unwrap();
    assert_eq!(
        balloons,
        vec![
            Balloon { id: 0, ..balloon("RED", 695) },
            Balloon { id: 1, ..balloon("WHITE", 366) },
        ]
    );
}

#[test]
fn filter_by_color_returns_the_matching_row() {
    let store = store_with_two_balloons();

    let white: Vec<Balloon> = Query::new()
        .filter("color")
        .eq(["WHITE"])
        .run(&store, None)
        .unwrap();
    assert_eq!(white, vec![Balloon { id: 1, ..balloon("WHITE", 366) }]);
}

#[test]
fn update_overwrites_an_existing_row() {
    let store = store_with_two_balloons();

    let mut pink = balloon("PINK", 366);
    store.update(None, &mut pink, 1).unwrap();
    assert_eq!(pink.id, 1);

    let colors: Vec<String> = store
        .load_all::<Balloon>(None)
        .unwrap()
        .into_iter()
        .map(|b| b.color)
        .collect();
    assert_eq!(colors, vec!["RED", "PINK"]);

    // updates do not advance the sequence
    assert_eq!(store.save(None, &mut balloon("BLUE", 1)).unwrap(), 2);
}

#[test]
fn deleted_row_is_not_found() {
    let store = store_with_two_balloons();
    store.delete::<Balloon>(None, 0).unwrap();

    let mut dest = balloon("UNCHANGED", 1);
    let err = store.load(&mut dest, None, 0).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        &err,
        StoreError::NotFound { key } if key == "balloons.color.root.0"
    ));
    assert_eq!(dest, balloon("UNCHANGED", 1));

    let remaining: Vec<Balloon> = store.load_all(None).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 1);
}

#[test]
fn every_codec_round_trips_through_the_store() {
    let store = Store::in_memory().unwrap();
    let owner = OwnerId::new_v4();

    let mut cake = Cake {
        id: 0,
        baker: OwnerId::new_v4(),
        recipe: vec![0, 159, 146, 150, 255],
        frosting: Frosting {
            flavor: "lemon".to_string(),
            layers: 3,
        },
        tags: vec!["birthday".to_string(), "vegan".to_string()],
        scratch: "never stored".to_string(),
    };
    let row_id = store.save(Some(&owner), &mut cake).unwrap();

    let mut loaded = Cake::default();
    store.load(&mut loaded, Some(&owner), row_id).unwrap();
    assert_eq!(
        loaded,
        Cake {
            scratch: String::new(),
            ..cake.clone()
        }
    );

    let mut dump = Vec::new();
    store.dump_to(&mut dump).unwrap();
    let dump = String::from_utf8_lossy(&dump);
    assert!(!dump.contains("scratch"));
    assert!(dump.contains(&format!("key=cakes.baker.{owner}.0, value={}", cake.baker)));
}

#[test]
fn ids_are_monotonic_per_owner_and_table() {
    let store = Store::in_memory().unwrap();
    let tenant = OwnerId::new_v4();

    let ids: Vec<u32> = (0..5)
        .map(|i| store.save(None, &mut balloon("RED", i)).unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);

    assert_eq!(store.save(Some(&tenant), &mut balloon("RED", 1)).unwrap(), 0);
    assert_eq!(store.save(None, &mut Cake::default()).unwrap(), 0);
    assert_eq!(store.save(None, &mut balloon("RED", 1)).unwrap(), 5);
}

#[test]
fn owners_never_see_each_others_rows() {
    let store = Store::in_memory().unwrap();
    let alice = OwnerId::new_v4();
    let bob = OwnerId::new_v4();

    store.save(Some(&alice), &mut balloon("RED", 1)).unwrap();
    store.save(Some(&alice), &mut balloon("BLUE", 2)).unwrap();
    store.save(Some(&bob), &mut balloon("GREEN", 3)).unwrap();

    let alices: Vec<Balloon> = store.load_all(Some(&alice)).unwrap();
    let bobs: Vec<Balloon> = store.load_all(Some(&bob)).unwrap();
    let roots: Vec<Balloon> = store.load_all(None).unwrap();

    assert_eq!(alices.len(), 2);
    assert_eq!(bobs, vec![balloon("GREEN", 3)]);
    assert!(roots.is_empty());

    let mut dest = Balloon::default();
    assert!(store.load(&mut dest, Some(&bob), 1).unwrap_err().is_not_found());
}

#[test]
fn root_owner_is_the_default() {
    let store = Store::in_memory().unwrap();
    store.save(Some(&OwnerId::Root), &mut balloon("RED", 1)).unwrap();

    let roots: Vec<Balloon> = store.load_all(None).unwrap();
    assert_eq!(roots, vec![balloon("RED", 1)]);
}

#[test]
fn ignored_fields_are_neither_stored_nor_loaded() {
    let store = Store::in_memory().unwrap();
    let mut cake = Cake {
        scratch: "temporary".to_string(),
        ..Cake::default()
    };
    store.save(None, &mut cake).unwrap();

    assert!(store.engine().get("cakes.scratch.root.0").unwrap().is_none());
    assert!(store.engine().get("cakes.id.root.0").unwrap().is_none());

    let cakes: Vec<Cake> = store.load_all(None).unwrap();
    assert_eq!(cakes[0].scratch, "");
}

#[test]
fn clauses_combine_by_conjunction() {
    let store = Store::in_memory().unwrap();
    for (color, size) in [("WHITE", 366), ("WHITE", 695), ("RED", 366), ("RED", 10)] {
        store.save(None, &mut balloon(color, size)).unwrap();
    }

    let found: Vec<Balloon> = Query::new()
        .filter("color")
        .eq(["WHITE"])
        .filter("size")
        .lt([400])
        .run(&store, None)
        .unwrap();
    assert_eq!(found, vec![Balloon { id: 0, ..balloon("WHITE", 366) }]);
}

#[test]
fn candidates_within_a_clause_are_alternatives() {
    let store = Store::in_memory().unwrap();
    for color in ["GREEN", "WHITE", "RED", "PINK", "BLUE"] {
        store.save(None, &mut balloon(color, 1)).unwrap();
    }

    let found: Vec<String> = Query::new()
        .filter("color")
        .eq(["RED", "BLUE", "BLACK"])
        .run::<Balloon>(&store, None)
        .unwrap()
        .into_iter()
        .map(|b| b.color)
        .collect();
    assert_eq!(found, vec!["RED", "BLUE"]);
}

#[test]
fn query_on_unknown_column_is_rejected() {
    let store = store_with_two_balloons();

    let err = Query::new()
        .filter("weight")
        .eq([1])
        .run::<Balloon>(&store, None)
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Codec(CodecError::FieldNotFound { ref column, .. }) if column == "weight"
    ));

    // ignored fields are not queryable either
    let err = kvs_storage::run::<Balloon>(&store, None, &Query::new().filter("id").eq([0]))
        .unwrap_err();
    assert!(matches!(err, StoreError::Codec(CodecError::FieldNotFound { .. })));
}

#[test]
fn json_columns_are_queryable_by_value() {
    let store = Store::in_memory().unwrap();
    let mut birthday = Cake {
        tags: vec!["birthday".to_string()],
        ..Cake::default()
    };
    let mut wedding = Cake {
        tags: vec!["wedding".to_string()],
        ..Cake::default()
    };
    store.save(None, &mut birthday).unwrap();
    store.save(None, &mut wedding).unwrap();

    let query = Query::new()
        .filter("tags")
        .eq([kvs_storage::Operand::json(&vec!["wedding"]).unwrap()]);
    let found: Vec<Cake> = query.run(&store, None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 1);
}

#[test]
fn text_filters_compare_decoded_text() {
    let store = Store::in_memory().unwrap();
    store.save(None, &mut balloon("WHITE", 1)).unwrap();
    store.save(None, &mut balloon("\"WHITE\"", 2)).unwrap();

    let found: Vec<String> = Query::new()
        .filter("color")
        .eq(["WHITE"])
        .run::<Balloon>(&store, None)
        .unwrap()
        .into_iter()
        .map(|b| b.color)
        .collect();
    assert_eq!(found, vec!["WHITE"]);
}

#[test]
fn text_candidates_do_not_match_numeric_columns() {
    let store = store_with_two_balloons();

    let found: Vec<Balloon> = Query::new()
        .filter("size")
        .eq(["366"])
        .run(&store, None)
        .unwrap();
    assert!(found.is_empty());

    let found: Vec<Balloon> = Query::new().filter("size").eq([366]).run(&store, None).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn integer_and_float_candidates_agree_on_float_columns() {
    let store = Store::in_memory().unwrap();
    store.save(None, &mut Gauge { reading: 366.0 }).unwrap();
    store.save(None, &mut Gauge { reading: 400.5 }).unwrap();

    let count = |query: Query| query.run::<Gauge>(&store, None).unwrap().len();
    assert_eq!(count(Query::new().filter("reading").eq([366])), 1);
    assert_eq!(count(Query::new().filter("reading").eq([366.0])), 1);
    assert_eq!(count(Query::new().filter("reading").lt([367])), 1);
    assert_eq!(count(Query::new().filter("reading").lt([366])), 0);
    assert_eq!(count(Query::new().filter("reading").lt([401])), 2);
}

#[test]
fn rows_beyond_ten_load_in_numeric_order() {
    let store = Store::in_memory().unwrap();
    for size in 0..25 {
        store.save(None, &mut balloon("RED", size)).unwrap();
    }

    let ids: Vec<u32> = store
        .load_all::<Balloon>(None)
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, (0..25).collect::<Vec<_>>());

    let sizes: Vec<i64> = Query::new()
        .filter("size")
        .lt([12])
        .run::<Balloon>(&store, None)
        .unwrap()
        .into_iter()
        .map(|b| b.size)
        .collect();
    assert_eq!(sizes, (0..12).collect::<Vec<_>>());
}

#[test]
fn sequences_resume_after_reopening_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let engine_config = EngineConfig::on_disk(dir.path().join("balloons.redb"));

    {
        let store = Store::open(&engine_config, StoreConfig::default()).unwrap();
        store.save(None, &mut balloon("RED", 695)).unwrap();
        store.save(None, &mut balloon("WHITE", 366)).unwrap();
        store.close().unwrap();
    }

    let store = Store::open(&engine_config, StoreConfig::default()).unwrap();
    assert_eq!(store.save(None, &mut balloon("PINK", 1)).unwrap(), 2);

    let colors: Vec<String> = store
        .load_all::<Balloon>(None)
        .unwrap()
        .into_iter()
        .map(|b| b.color)
        .collect();
    assert_eq!(colors, vec!["RED", "WHITE", "PINK"]);
}

#[test]
fn concurrent_saves_get_distinct_rows() {
    let store = std::sync::Arc::new(Store::in_memory().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10 {
                    store.save(None, &mut balloon("RED", t * 10 + i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut sizes: Vec<i64> = store
        .load_all::<Balloon>(None)
        .unwrap()
        .into_iter()
        .map(|b| b.size)
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, (0..40).collect::<Vec<_>>());
}
