// tests/properties.rs
// End-to-end behaviour of row stores, documents and the router on both stores.

mod common;

use common::{both, header, table, Fixture};
use sheetshard::{
    with_transaction, AppendMode, BackingStore, DistributionRouter, Document, MemoryStore, Record,
    RouterConfig, TableSchema,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn router(fixture: &Fixture, limit: usize) -> DistributionRouter {
    let config = RouterConfig::new("").with_sheet_limit(limit);
    DistributionRouter::bootstrap(Arc::clone(&fixture.store), config, &header(&["name", "score"]))
        .expect("bootstrap")
}

#[test]
fn schema_round_trip_normalizes_missing_fields() {
    let schema = TableSchema::new(["id", "name", "pet"]);
    let full = Record::new().with("id", "1").with("name", "Ada").with("pet", "cat");
    assert_eq!(schema.row_to_record(&schema.record_to_row(&full)), full);

    let partial = Record::new().with("name", "Bob");
    let expected = Record::new().with("id", "").with("name", "Bob").with("pet", "");
    assert_eq!(schema.row_to_record(&schema.record_to_row(&partial)), expected);
    assert_eq!(partial.normalized(&schema), expected);
}

#[test]
fn append_then_all_ends_with_the_record() {
    for fixture in both() {
        for cache in [false, true] {
            let mut rows = table(&fixture, "people", &["id", "name"], cache);
            rows.append(Record::new().with("id", "1").with("name", "Ada"), AppendMode::Immediate)
                .unwrap();
            let record = Record::new().with("name", "Bob");
            rows.append(&record, AppendMode::Immediate).unwrap();

            let all = rows.all().unwrap();
            let schema = rows.schema().unwrap().clone();
            assert_eq!(all.len(), 2, "{} cache={}", fixture.label, cache);
            assert_eq!(all.last(), Some(&record.normalized(&schema)));
        }
    }
}

#[test]
fn blank_record_append_occupies_a_row() {
    for fixture in both() {
        for cache in [false, true] {
            let mut rows = table(&fixture, "sparse", &["a", "b"], cache);
            rows.append(Record::new().with("a", "1"), AppendMode::Immediate).unwrap();
            rows.append(Record::new(), AppendMode::Immediate).unwrap();
            assert_eq!(rows.all().unwrap().len(), 2, "{} cache={}", fixture.label, cache);
            assert_eq!(rows.last().unwrap(), Some(Record::new().with("a", "").with("b", "")));

            rows.append(Record::new().with("a", "3"), AppendMode::Immediate).unwrap();
            rows.flush().unwrap();

            let mut reopened = sheetshard::RowStore::open(
                Arc::clone(&fixture.store),
                rows.document_id().to_string(),
                rows.table_ref().clone(),
                false,
            )
            .unwrap();
            for view in [&mut rows, &mut reopened] {
                assert_eq!(
                    view.column("a").unwrap(),
                    vec!["1".to_string(), String::new(), "3".to_string()],
                    "{} cache={}",
                    fixture.label,
                    cache
                );
            }
        }
    }
}

#[test]
fn batched_appends_write_nothing_until_processed() {
    let mem = Arc::new(MemoryStore::new());
    let doc_ref = mem.create_document("batch").unwrap();
    let mut doc = Document::from_ref(mem.clone(), doc_ref, false);
    doc.create_table("batched", &header(&["n"])).unwrap();
    doc.create_table("immediate", &header(&["n"])).unwrap();

    let before = mem.cell_writes();
    {
        let batched = doc.table("batched").unwrap().unwrap();
        for n in 0..5 {
            batched
                .append(Record::new().with("n", n.to_string()), AppendMode::Batched)
                .unwrap();
        }
        assert_eq!(batched.pending_appends(), 5);
    }
    assert_eq!(mem.cell_writes(), before);

    doc.process_appends().unwrap();
    assert!(mem.cell_writes() > before);

    {
        let immediate = doc.table("immediate").unwrap().unwrap();
        for n in 0..5 {
            immediate
                .append(Record::new().with("n", n.to_string()), AppendMode::Immediate)
                .unwrap();
        }
    }
    let batched = doc.table("batched").unwrap().unwrap().all().unwrap();
    let immediate = doc.table("immediate").unwrap().unwrap().all().unwrap();
    assert_eq!(batched, immediate);
    assert_eq!(doc.table("batched").unwrap().unwrap().pending_appends(), 0);
}

#[test]
fn find_returns_first_match_in_insertion_order() {
    for fixture in both() {
        let mut rows = table(&fixture, "colors", &["id", "color"], false);
        for (id, color) in [("1", "red"), ("2", "blue"), ("3", "red"), ("4", "green")] {
            rows.append(Record::new().with("id", id).with("color", color), AppendMode::Immediate)
                .unwrap();
        }
        assert_eq!(rows.find("color", "red").unwrap().unwrap().get("id"), "1");
        assert_eq!(rows.find("color", "green").unwrap().unwrap().get("id"), "4");
        assert_eq!(rows.row_index("color", "blue").unwrap(), Some(3));
        assert!(rows.find("color", "purple").unwrap().is_none());
        assert!(rows.find("missing", "red").unwrap().is_none());

        // The memoized index must follow structural changes.
        rows.remove_row(2).unwrap();
        assert_eq!(rows.find("color", "red").unwrap().unwrap().get("id"), "3");
    }
}

#[test]
fn delete_where_keeps_survivors_in_order() {
    for fixture in both() {
        for cache in [false, true] {
            let mut rows = table(&fixture, "numbers", &["n"], cache);
            for n in 0..12 {
                rows.append(Record::new().with("n", n.to_string()), AppendMode::Batched)
                    .unwrap();
            }
            rows.process_appends().unwrap();

            let deleted = rows
                .delete_where(|record, _| record.get("n").parse::<u32>().unwrap() % 3 == 0)
                .unwrap();
            rows.flush().unwrap();
            assert_eq!(deleted, 4);

            let expected: Vec<String> = (0..12)
                .filter(|n| n % 3 != 0)
                .map(|n| n.to_string())
                .collect();
            assert_eq!(rows.column("n").unwrap(), expected, "{} cache={}", fixture.label, cache);

            // What reached the backing store agrees with the in-memory view.
            rows.invalidate();
            assert_eq!(rows.last_row().unwrap(), expected.len() + 1);
        }
    }
}

#[test]
fn sheet_limit_two_puts_third_key_in_second_shard() {
    for fixture in both() {
        let mut router = router(&fixture, 2);
        for key in ["a", "b", "c"] {
            router.create_table(key).unwrap();
        }
        let shards = router.documents().unwrap();
        assert_eq!(shards.len(), 2, "{}", fixture.label);
        assert_eq!(router.location("a").unwrap().unwrap().docid, shards[0].docid);
        assert_eq!(router.location("b").unwrap().unwrap().docid, shards[0].docid);
        assert_eq!(router.location("c").unwrap().unwrap().docid, shards[1].docid);
    }
}

#[test]
fn sheet_limit_one_gives_every_key_its_own_shard() {
    for fixture in both() {
        let mut router = router(&fixture, 1);
        for key in ["a", "b", "c"] {
            router.create_table(key).unwrap();
        }
        let shards = router.documents().unwrap();
        assert_eq!(shards.len(), 3);
        let homes: BTreeSet<String> = ["a", "b", "c"]
            .iter()
            .map(|k| router.location(k).unwrap().unwrap().docid)
            .collect();
        assert_eq!(homes.len(), 3);
    }
}

#[test]
fn create_table_twice_is_idempotent() {
    for fixture in both() {
        let mut router = router(&fixture, 5);
        let first = router.create_table("players").unwrap();
        let first_location = router.location("players").unwrap().unwrap();
        let second = router.create_table("players").unwrap();

        assert_eq!(first.document_id(), second.document_id());
        assert_eq!(first.name(), second.name());
        assert_eq!(first.id(), second.id());
        assert_eq!(router.location("players").unwrap().unwrap(), first_location);
        assert_eq!(router.keys().unwrap().len(), 1);
        assert!(first_location.url.ends_with(&format!("#gid={}", first.id())));
    }
}

#[test]
fn provisioned_tables_start_from_the_template_header() {
    for fixture in both() {
        let mut router = router(&fixture, 5);
        let mut rows = router.create_table("scores").unwrap();
        assert_eq!(rows.schema().unwrap().columns(), header(&["name", "score"]).as_slice());
        rows.append(Record::new().with("name", "Ada").with("score", "9"), AppendMode::Immediate)
            .unwrap();

        let mut reopened = router.table("scores").unwrap().unwrap();
        assert_eq!(reopened.all().unwrap()[0].get("score"), "9");
        assert!(router.table("unknown").unwrap().is_none());
    }
}

#[test]
fn router_reopens_existing_index() {
    for fixture in both() {
        let index_id = {
            let mut router = router(&fixture, 3);
            router.create_table("a").unwrap();
            router.index_document().id.clone()
        };
        let config = RouterConfig::new(index_id).with_sheet_limit(3);
        let mut router = DistributionRouter::open(Arc::clone(&fixture.store), config).unwrap();
        assert!(router.has_key("a").unwrap());
        router.create_table("b").unwrap();
        assert_eq!(router.documents().unwrap().len(), 1);
    }
}

#[test]
fn atomic_merge_replaces_tables_and_removes_fork() {
    for fixture in both() {
        let doc_ref = fixture.store.create_document("main").unwrap();
        let mut doc = Document::from_ref(Arc::clone(&fixture.store), doc_ref, false);
        doc.create_table("A", &header(&["k"])).unwrap();
        doc.create_table("B", &header(&["k"])).unwrap();
        doc.table("B")
            .unwrap()
            .unwrap()
            .append(Record::new().with("k", "kept"), AppendMode::Immediate)
            .unwrap();

        let fork_id = with_transaction(&mut doc, |d| {
            d.create_table("C", &header(&["k"]))?
                .append(Record::new().with("k", "new"), AppendMode::Batched)?;
            d.delete_table("A")?;
            Ok(d.id().to_string())
        })
        .unwrap();

        let names: BTreeSet<String> = doc.table_names().unwrap().into_iter().collect();
        assert_eq!(names, ["B", "C"].iter().map(|s| s.to_string()).collect());
        assert!(!fixture.store.document_exists(&fork_id).unwrap(), "{}", fixture.label);
        assert_eq!(doc.table("B").unwrap().unwrap().all().unwrap()[0].get("k"), "kept");
        assert_eq!(doc.table("C").unwrap().unwrap().all().unwrap()[0].get("k"), "new");
    }
}

#[test]
fn failed_transaction_leaves_original_untouched() {
    for fixture in both() {
        let doc_ref = fixture.store.create_document("main").unwrap();
        let mut doc = Document::from_ref(Arc::clone(&fixture.store), doc_ref, false);
        doc.create_table("A", &header(&["k"])).unwrap();

        let mut fork_id = String::new();
        let result: sheetshard::SheetResult<()> = doc.atomic(|d| {
            fork_id = d.id().to_string();
            d.delete_table("A")?;
            let rows = d.create_table("B", &header(&["k"]))?;
            rows.update(1, Record::new().with("k", "header"))?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(sheetshard::SheetError::InvalidRowIndex { row_index: 1, .. })
        ));
        assert_eq!(doc.table_names().unwrap(), vec!["A".to_string()]);
        assert!(!fixture.store.document_exists(&fork_id).unwrap());
    }
}
