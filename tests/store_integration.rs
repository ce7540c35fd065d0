//! IndexStore integration tests: schema lifecycle, bulk upsert semantics,
//! and filter consistency between the two query modes.

use chrono::{Duration, Utc};
use passim::config::IndexConfig;
use passim::models::{Document, Passage, PassageCategory, SearchFilters};
use passim::store::IndexStore;
use tempfile::TempDir;

const DIM: usize = 4;

fn test_index_config() -> IndexConfig {
    IndexConfig {
        vector_dim: DIM,
        hnsw_ef_construction: 200,
        hnsw_ef_search: 50,
        hnsw_m: 16,
        hnsw_capacity: 1000,
        writer_heap_bytes: 15_000_000,
    }
}

fn unit(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis % DIM] = 1.0;
    v
}

fn document(id: &str, minutes_ago: i64) -> Document {
    Document {
        document_id: id.to_string(),
        filename: format!("{id}.txt"),
        ingested_at: Utc::now() - Duration::minutes(minutes_ago),
        page_count: 1,
        passage_count: 0,
        passage_types_found: vec![],
        source_length: 100,
    }
}

fn passage(
    id: &str,
    document_id: &str,
    category: PassageCategory,
    text: &str,
    axis: usize,
) -> Passage {
    Passage {
        passage_id: id.to_string(),
        document_id: document_id.to_string(),
        category,
        text: text.to_string(),
        section_label: String::new(),
        page_number: 1,
        char_start: 0,
        char_end: text.chars().count() as i64,
        confidence: 0.9,
        embedding: unit(axis),
    }
}

fn seed_passages() -> Vec<Passage> {
    vec![
        passage(
            "p-term-a",
            "doc-a",
            PassageCategory::Termination,
            "Either party may terminate this Agreement upon thirty days written notice.",
            0,
        ),
        passage(
            "p-indem-a",
            "doc-a",
            PassageCategory::Indemnity,
            "Each party shall indemnify and hold harmless the other under this Agreement.",
            1,
        ),
        passage(
            "p-term-b",
            "doc-b",
            PassageCategory::Termination,
            "This Agreement terminates automatically upon the insolvency of either party.",
            2,
        ),
        passage(
            "p-conf-b",
            "doc-b",
            PassageCategory::Confidentiality,
            "The receiving party shall keep all Confidential Information in strict confidence.",
            3,
        ),
    ]
}

#[test]
fn test_ensure_schema_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    let outcome = store.put_passages_bulk(&seed_passages()).unwrap();
    assert_eq!(outcome.indexed, 4);

    // Repeated calls must neither error nor change anything
    store.ensure_schema().unwrap();
    store.ensure_schema().unwrap();

    let hits = store
        .lexical_query("agreement", &SearchFilters::default(), 10)
        .unwrap();
    assert!(!hits.is_empty());
}

#[test]
fn test_reopen_rebuilds_vector_index() {
    let temp = TempDir::new().unwrap();
    {
        let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();
        store.put_passages_bulk(&seed_passages()).unwrap();
    }

    // A fresh process start: the in-memory vector index must be rebuilt
    // from the durable embedding column
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();
    let results = store
        .vector_query(&unit(2), &SearchFilters::default(), 2)
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].passage_id, "p-term-b");
}

#[test]
fn test_document_roundtrip_and_listing_order() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    store.put_document(&document("doc-old", 30)).unwrap();
    store.put_document(&document("doc-mid", 20)).unwrap();
    store.put_document(&document("doc-new", 10)).unwrap();

    let fetched = store.get_document("doc-mid").unwrap().unwrap();
    assert_eq!(fetched.filename, "doc-mid.txt");

    assert!(store.get_document("doc-missing").unwrap().is_none());

    // Most-recently-ingested first
    let listed = store.list_documents(10).unwrap();
    let ids: Vec<&str> = listed.iter().map(|d| d.document_id.as_str()).collect();
    assert_eq!(ids, vec!["doc-new", "doc-mid", "doc-old"]);

    let limited = store.list_documents(2).unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn test_document_upsert_overwrites_in_full() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    store.put_document(&document("doc-a", 10)).unwrap();

    let mut updated = document("doc-a", 5);
    updated.passage_count = 7;
    updated.passage_types_found = vec![PassageCategory::Termination];
    store.put_document(&updated).unwrap();

    let fetched = store.get_document("doc-a").unwrap().unwrap();
    assert_eq!(fetched.passage_count, 7);
    assert_eq!(
        fetched.passage_types_found,
        vec![PassageCategory::Termination]
    );
    assert_eq!(store.list_documents(10).unwrap().len(), 1);
}

#[test]
fn test_bulk_partial_failure_is_surfaced_not_fatal() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    let mut passages = Vec::new();
    for i in 0..10 {
        let mut p = passage(
            &format!("p-{i}"),
            "doc-bulk",
            PassageCategory::Other,
            &format!("Passage number {i} about obligations under this Agreement."),
            i,
        );
        // Two malformed items: wrong embedding dimension
        if i == 3 || i == 7 {
            p.embedding = vec![0.0; DIM + 1];
        }
        passages.push(p);
    }

    let outcome = store.put_passages_bulk(&passages).unwrap();
    assert_eq!(outcome.attempted, 10);
    assert_eq!(outcome.indexed, 8);

    let mut failed_ids: Vec<&str> = outcome
        .failures
        .iter()
        .map(|f| f.passage_id.as_str())
        .collect();
    failed_ids.sort_unstable();
    assert_eq!(failed_ids, vec!["p-3", "p-7"]);

    // The surviving items are retrievable afterward
    let stored = store.get_passages_by_document("doc-bulk").unwrap();
    assert_eq!(stored.len(), 8);
    assert!(stored.iter().all(|p| p.passage_id != "p-3"));
}

#[test]
fn test_bulk_rejects_inverted_spans_per_item() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    let mut bad = passage(
        "p-span",
        "doc-a",
        PassageCategory::Other,
        "A passage whose span is inverted.",
        0,
    );
    bad.char_start = 50;
    bad.char_end = 10;

    let good = passage(
        "p-ok",
        "doc-a",
        PassageCategory::Other,
        "A passage whose span is fine.",
        1,
    );

    let outcome = store.put_passages_bulk(&[bad, good]).unwrap();
    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.indexed, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].passage_id, "p-span");
}

#[test]
fn test_negative_fallback_span_is_stored_verbatim() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    // An unverified hint-fallback span may be negative; the store keeps it
    let mut p = passage(
        "p-neg",
        "doc-a",
        PassageCategory::Other,
        "Passage located by an unverified negative hint.",
        0,
    );
    p.char_start = -12;
    p.char_end = -12 + p.text.chars().count() as i64;

    let outcome = store.put_passages_bulk(&[p]).unwrap();
    assert_eq!(outcome.indexed, 1);

    let stored = store.get_passages_by_document("doc-a").unwrap();
    assert_eq!(stored[0].char_start, -12);
}

#[test]
fn test_filter_consistency_across_query_modes() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();
    store.put_passages_bulk(&seed_passages()).unwrap();

    let filters = SearchFilters {
        categories: vec![PassageCategory::Termination],
        document_ids: vec!["doc-b".to_string()],
    };

    // The filtered universe is exactly {p-term-b}; neither mode may return
    // anything outside it
    let lexical = store.lexical_query("agreement", &filters, 10).unwrap();
    for hit in &lexical {
        assert!(filters.matches(&hit.passage));
        assert_eq!(hit.passage.passage_id, "p-term-b");
    }

    for axis in 0..DIM {
        let vector = store.vector_query(&unit(axis), &filters, 10).unwrap();
        for p in &vector {
            assert!(filters.matches(p));
            assert_eq!(p.passage_id, "p-term-b");
        }
    }
}

#[test]
fn test_lexical_query_returns_highlight_fragments() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();
    store.put_passages_bulk(&seed_passages()).unwrap();

    let hits = store
        .lexical_query("indemnify", &SearchFilters::default(), 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].fragments[0].contains("<b>indemnify</b>"));
}

#[test]
fn test_passages_listed_in_span_order() {
    let temp = TempDir::new().unwrap();
    let store = IndexStore::open(temp.path(), &test_index_config()).unwrap();

    let mut first = passage(
        "p-late",
        "doc-a",
        PassageCategory::Other,
        "The second passage in document order.",
        0,
    );
    first.char_start = 500;
    first.char_end = 540;
    let mut second = passage(
        "p-early",
        "doc-a",
        PassageCategory::Other,
        "The first passage in document order.",
        1,
    );
    second.char_start = 10;
    second.char_end = 47;

    store.put_passages_bulk(&[first, second]).unwrap();

    let stored = store.get_passages_by_document("doc-a").unwrap();
    assert_eq!(stored[0].passage_id, "p-early");
    assert_eq!(stored[1].passage_id, "p-late");
}
