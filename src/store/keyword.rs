//! Tantivy lexical index over passage text
//!
//! Ranking and relevance are delegated to tantivy's BM25 scoring; this
//! wrapper only guarantees best-first ordering, filter compilation, and
//! highlight fragments per hit. Filter fields (document id, category) are
//! indexed raw so they behave as exact terms, mirroring the predicate the
//! vector path applies after retrieval.

use crate::error::{PassimError, Result};
use crate::models::{Passage, SearchFilters};
use std::path::PathBuf;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, Value, INDEXED, STORED, STRING, TEXT,
};
use tantivy::snippet::SnippetGenerator;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// Maximum characters per highlight fragment
const FRAGMENT_CHARS: usize = 200;

/// One lexical hit: internal passage id, BM25 score, highlight fragments.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub id: u64,
    pub score: f32,
    pub fragments: Vec<String>,
}

/// Tantivy index wrapper
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    id_field: Field,
    document_id_field: Field,
    category_field: Field,
    text_field: Field,
}

impl KeywordIndex {
    /// Open an existing index directory, or create it with the passage
    /// schema if absent. Never reconfigures an existing index.
    pub fn open_or_create(index_path: PathBuf, writer_heap_bytes: usize) -> Result<Self> {
        if index_path.join("meta.json").exists() {
            Self::load(index_path, writer_heap_bytes)
        } else {
            Self::create(index_path, writer_heap_bytes)
        }
    }

    fn create(index_path: PathBuf, writer_heap_bytes: usize) -> Result<Self> {
        std::fs::create_dir_all(&index_path).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to create keyword index directory: {:?}", index_path),
        })?;

        let mut schema_builder = Schema::builder();
        let id_field = schema_builder.add_u64_field("id", INDEXED | STORED);
        let document_id_field = schema_builder.add_text_field("document_id", STRING);
        let category_field = schema_builder.add_text_field("category", STRING);
        let text_field = schema_builder.add_text_field("text", TEXT | STORED);
        let schema = schema_builder.build();

        let index = Index::create_in_dir(&index_path, schema)
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;

        Self::finish_open(index, id_field, document_id_field, category_field, text_field, writer_heap_bytes)
    }

    fn load(index_path: PathBuf, writer_heap_bytes: usize) -> Result<Self> {
        let index = Index::open_in_dir(&index_path)
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;
        let schema = index.schema();

        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                PassimError::KeywordIndex(format!("missing '{name}' field in index schema"))
            })
        };
        let id_field = field("id")?;
        let document_id_field = field("document_id")?;
        let category_field = field("category")?;
        let text_field = field("text")?;

        Self::finish_open(index, id_field, document_id_field, category_field, text_field, writer_heap_bytes)
    }

    fn finish_open(
        index: Index,
        id_field: Field,
        document_id_field: Field,
        category_field: Field,
        text_field: Field,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        let writer = index
            .writer(writer_heap_bytes)
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| PassimError::KeywordIndex(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer,
            id_field,
            document_id_field,
            category_field,
            text_field,
        })
    }

    /// Upsert one passage posting under its internal id.
    pub fn upsert(&mut self, id: u64, passage: &Passage) -> Result<()> {
        self.writer
            .delete_term(Term::from_field_u64(self.id_field, id));
        self.writer
            .add_document(doc!(
                self.id_field => id,
                self.document_id_field => passage.document_id.as_str(),
                self.category_field => passage.category.as_str(),
                self.text_field => passage.text.as_str(),
            ))
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;
        Ok(())
    }

    /// Commit pending writes and wait for the reader to observe them.
    pub fn commit(&mut self) -> Result<()> {
        self.writer
            .commit()
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;
        self.reader
            .reload()
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;
        Ok(())
    }

    /// BM25 search, best-first, limited to `limit`, with `filters` compiled
    /// into the query as exact-term conjunctions.
    pub fn search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let text_query = query_parser
            .parse_query(query_text)
            .map_err(|e| PassimError::QueryParse(e.to_string()))?;

        let mut snippet_generator =
            SnippetGenerator::create(&searcher, &*text_query, self.text_field)
                .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;
        snippet_generator.set_max_num_chars(FRAGMENT_CHARS);

        let query = self.apply_filters(text_query, filters);
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| PassimError::KeywordIndex(e.to_string()))?;

            let id = retrieved
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    PassimError::KeywordIndex("posting missing internal id".to_string())
                })?;

            let snippet = snippet_generator.snippet_from_doc(&retrieved);
            let html = snippet.to_html();
            let fragments = if html.is_empty() { Vec::new() } else { vec![html] };

            hits.push(KeywordHit { id, score, fragments });
        }

        Ok(hits)
    }

    fn apply_filters(&self, text_query: Box<dyn Query>, filters: &SearchFilters) -> Box<dyn Query> {
        if filters.is_unrestricted() {
            return text_query;
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, text_query)];

        if !filters.categories.is_empty() {
            let terms: Vec<(Occur, Box<dyn Query>)> = filters
                .categories
                .iter()
                .map(|category| {
                    let term = Term::from_field_text(self.category_field, category.as_str());
                    let query: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, query)
                })
                .collect();
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(terms))));
        }

        if !filters.document_ids.is_empty() {
            let terms: Vec<(Occur, Box<dyn Query>)> = filters
                .document_ids
                .iter()
                .map(|document_id| {
                    let term = Term::from_field_text(self.document_id_field, document_id);
                    let query: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, query)
                })
                .collect();
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(terms))));
        }

        Box::new(BooleanQuery::new(clauses))
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}
