//! Integration tests for the collection layer: editor, processor, query and
//! result cursor working against real files.

use docstore_codec::{Document, Value};
use docstore_core::{
    document_id, CollectionDir, Config, CoreError, CoreResult, Database, Entity, EntityId,
    Processor, ID_FIELD,
};
use docstore_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn ids(notes: &[Note]) -> BTreeSet<EntityId> {
    notes.iter().map(|note| note.id).collect()
}

fn index_ids(docs: &[Document]) -> BTreeSet<EntityId> {
    docs.iter().filter_map(document_id).collect()
}

#[test]
fn query_returns_exactly_the_written_notes() {
    let collection = TestCollection::new();
    let notes: Vec<Note> = (0..25).map(|i| Note::new(&format!("n{i}"), i)).collect();
    collection.write(&notes[..10]);
    collection.write(&notes[10..]);

    let found = collection.all();
    assert_eq!(ids(&found), ids(&notes));
}

#[test]
fn preload_and_lazy_queries_agree() {
    let collection = TestCollection::new();
    let notes: Vec<Note> = (0..8)
        .map(|i| Note::new("t", i).with_body(&format!("body {i}")))
        .collect();
    collection.write(&notes);

    let lazy: Vec<Note> = collection
        .query()
        .unwrap()
        .get_result()
        .unwrap()
        .into_iter()
        .collect::<CoreResult<_>>()
        .unwrap();
    let loaded = collection.query().unwrap().preload().get_result().unwrap();
    assert!(loaded.is_preloaded());
    let loaded: Vec<Note> = loaded.into_iter().collect::<CoreResult<_>>().unwrap();

    assert_eq!(lazy, loaded);
}

#[test]
fn remove_then_write_in_one_commit_keeps_the_write() {
    let collection = TestCollection::new();
    let original = Note::new("a", 1);
    collection.write(std::slice::from_ref(&original));

    let mut updated = original.clone();
    updated.title = "a2".to_string();
    let mut editor = collection.edit().unwrap();
    editor.remove(&original).unwrap();
    editor.write(&updated).unwrap();
    let summary = editor.commit().unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(collection.all(), vec![updated]);
}

#[test]
fn saved_index_loads_back_equal() {
    let collection = TestCollection::new();
    let notes: Vec<Note> = (0..30).map(|i| Note::new("x", i)).collect();
    collection.write(&notes);
    let processor = collection.processor().unwrap();
    processor.save_index().unwrap();
    let before = processor.snapshot().unwrap();

    let fresh =
        Processor::<Note>::open(CollectionDir::new(collection.path()), Config::default()).unwrap();
    fresh.load_index().unwrap();

    assert_eq!(fresh.snapshot().unwrap(), before);
    assert_eq!(index_ids(&before), ids(&notes));
}

#[test]
fn rebuild_matches_loaded_index() {
    let collection = TestCollection::with_config(Config::default().rebuild_chunk_size(3));
    let notes: Vec<Note> = (0..47).map(|i| Note::new(&format!("r{}", i % 5), i)).collect();
    collection.write(&notes);

    let processor = collection.processor().unwrap();
    processor.load_index().unwrap();
    let loaded = processor.snapshot().unwrap();
    processor.rebuild_index().unwrap();

    assert_eq!(processor.snapshot().unwrap(), loaded);
}

#[test]
fn rebuilt_index_survives_reopen_without_index_file() {
    let mut collection = TestCollection::new();
    let notes: Vec<Note> = (0..5).map(|i| Note::new("k", i)).collect();
    collection.write(&notes);
    std::fs::remove_file(CollectionDir::new(collection.path()).index_path()).unwrap();

    collection.reopen();

    assert_eq!(ids(&collection.all()), ids(&notes));
}

#[test]
fn filter_by_id_then_delete() {
    let collection = TestCollection::new();
    let note = Note::new("a", 1);
    collection.write(&[note.clone(), Note::new("b", 2)]);

    let wanted = Value::from(note.id.to_string());
    let mut result = collection
        .query()
        .unwrap()
        .filter(move |doc| doc[ID_FIELD] == wanted)
        .get_result()
        .unwrap();
    assert_eq!(result.count(), 1);
    assert_eq!(result.move_next().unwrap().title, "a");

    collection.remove(std::slice::from_ref(&note));
    let remaining = collection.all();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|n| n.id != note.id));
}

#[test]
fn non_indexed_stages_see_the_body() {
    let collection = TestCollection::new();
    collection.write(&[
        Note::new("a", 1).with_body("keep me"),
        Note::new("b", 2).with_body("drop me"),
        Note::new("c", 3).with_body("keep this too"),
    ]);

    let titles: Vec<String> = collection
        .query()
        .unwrap()
        .filter_non_indexed(|note: &Note| note.body.starts_with("keep"))
        .sort_non_indexed(|a: &Note, b: &Note| b.body.len().cmp(&a.body.len()))
        .get_result()
        .unwrap()
        .into_iter()
        .map(|note| note.unwrap().title)
        .collect();

    assert_eq!(titles, vec!["c", "a"]);
}

#[test]
fn disposed_database_rejects_everything() {
    let collection = TestCollection::new();
    let result = collection.query().unwrap().get_result().unwrap();
    collection.dispose();

    assert!(matches!(collection.edit(), Err(e) if e.is_lifecycle()));
    assert!(matches!(collection.query(), Err(e) if e.is_lifecycle()));
    drop(result);

    let db: Database<Note> = Database::new(collection.path());
    assert!(matches!(db.edit(), Err(CoreError::NotInitialized)));
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn pipeline_matches_slice_of_sorted_list(
        notes in notes_strategy(24),
        pipeline in pipeline_strategy(),
    ) {
        let collection = TestCollection::new();
        collection.write(&notes);
        let base = collection.processor().unwrap().snapshot().unwrap();
        let expected: Vec<Option<EntityId>> =
            pipeline.apply(&base).iter().map(document_id).collect();

        let (keep, order) = (pipeline.clone(), pipeline.clone());
        let actual: Vec<Option<EntityId>> = collection
            .query()
            .unwrap()
            .filter(move |doc| keep.keeps(doc))
            .sort(move |a, b| order.compare(a, b))
            .offset(pipeline.offset)
            .size(pipeline.size)
            .get_result()
            .unwrap()
            .into_iter()
            .map(|note| note.map(|n| Some(n.entity_id())))
            .collect::<CoreResult<_>>()
            .unwrap();

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn cursor_allows_exactly_count_advances(notes in notes_strategy(12), preload in any::<bool>()) {
        let collection = TestCollection::new();
        collection.write(&notes);

        let query = collection.query().unwrap();
        let query = if preload { query.preload() } else { query };
        let mut result = query.get_result().unwrap();

        prop_assert_eq!(result.count(), notes.len());
        prop_assert!(matches!(result.current(), Err(CoreError::EndOfCursor)));
        for _ in 0..notes.len() {
            prop_assert!(result.move_next().is_ok());
        }
        prop_assert!(matches!(result.move_next(), Err(CoreError::EndOfCursor)));
    }
}
