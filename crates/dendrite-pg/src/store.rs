//! The Postgres-backed document store.
//!
//! Documents are stored in a single table with columns:
//! - `id uuid PRIMARY KEY DEFAULT uuid_generate_v4()`
//! - a text content column (default `content`, configurable)
//! - `metadata JSONB`
//! - `embedding` — SQL type owned by the configured [`VectorExtension`]
//! - any caller-declared extra columns
//!
//! Call [`ensure_table`](PgVectorStore::ensure_table) once after
//! construction (idempotent). All retrieval flows through one pipeline:
//! the extension builds the SELECT with the `"_distance"` expression, the
//! join and filter compilers append their fragments, and the assembled
//! query is dispatched through the store's [`QueryRunner`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use dendrite_core::{DendriteError, Document, Embeddings};

use crate::extension::{parse_vector, HnswIndexOptions, VectorExtension};
use crate::filter::{compile_filter, FilterMode};
use crate::ident::{quote_identifier, quote_qualified, validate_identifier, validate_sql_type};
use crate::join::{compile_joins, JoinClause};
use crate::mmr::maximal_marginal_relevance;
use crate::runner::{PoolRunner, QueryRunner, StoreQuery};
use crate::scalar::SqlValue;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Foreign-key target of an extra column. The referenced column defaults
/// to `id`.
#[derive(Debug, Clone)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
}

impl ColumnReference {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: "id".to_string(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }
}

/// A caller-declared first-class column on the storage table.
///
/// Values for extras travel in [`Document::metadata`] under the column
/// name, both on insert and (for `returned` columns) on read.
#[derive(Debug, Clone)]
pub struct ExtraColumn {
    pub name: String,
    pub sql_type: String,
    /// Include the column in SELECT result columns.
    pub returned: bool,
    /// Require a value on every insert.
    pub not_null: bool,
    pub references: Option<ColumnReference>,
}

impl ExtraColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            returned: true,
            not_null: false,
            references: None,
        }
    }

    pub fn with_returned(mut self, returned: bool) -> Self {
        self.returned = returned;
        self
    }

    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn with_references(mut self, references: ColumnReference) -> Self {
        self.references = Some(references);
        self
    }
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base table; quoted wherever it appears.
    pub table_name: String,
    /// Name of the text content column.
    pub page_content_column: String,
    /// Route fetches through the extension's HNSW query wrapper.
    pub use_hnsw_index: bool,
    pub extra_columns: Vec<ExtraColumn>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("documents")
    }
}

impl StoreConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            page_content_column: "content".to_string(),
            use_hnsw_index: false,
            extra_columns: Vec::new(),
        }
    }

    pub fn with_page_content_column(mut self, column: impl Into<String>) -> Self {
        self.page_content_column = column.into();
        self
    }

    pub fn with_hnsw_index(mut self, use_hnsw_index: bool) -> Self {
        self.use_hnsw_index = use_hnsw_index;
        self
    }

    pub fn with_extra_column(mut self, column: ExtraColumn) -> Self {
        self.extra_columns.push(column);
        self
    }

    fn validate(&self) -> Result<(), DendriteError> {
        validate_identifier(&self.table_name)?;
        validate_identifier(&self.page_content_column)?;
        for extra in &self.extra_columns {
            validate_identifier(&extra.name)?;
            validate_sql_type(&extra.sql_type)?;
            if let Some(reference) = &extra.references {
                validate_identifier(&reference.table)?;
                validate_identifier(&reference.column)?;
            }
        }
        Ok(())
    }
}

/// Filter for a search call.
///
/// `metadata` and `columns` are mutually exclusive: the former compiles
/// against JSON paths under the `metadata` column, the latter against
/// first-class columns (qualify keys as `table.column` under a join).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub metadata: Option<Value>,
    pub columns: Option<Value>,
    pub joins: Vec<JoinClause>,
}

impl SearchFilter {
    pub fn metadata(filter: Value) -> Self {
        Self {
            metadata: Some(filter),
            ..Self::default()
        }
    }

    pub fn columns(filter: Value) -> Self {
        Self {
            columns: Some(filter),
            ..Self::default()
        }
    }

    pub fn with_join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }
}

/// Options for [`PgVectorStore::max_marginal_relevance_search`].
#[derive(Debug, Clone)]
pub struct MmrOptions {
    /// Number of documents to return.
    pub k: usize,
    /// Number of candidates fetched before reranking.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off in `[0, 1]`; 1.0 is pure relevance.
    pub lambda: f32,
    pub filter: Option<SearchFilter>,
}

impl MmrOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            fetch_k: 20,
            lambda: 0.7,
            filter: None,
        }
    }

    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Options for the insert operations.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Explicit row ids. When set, the insert upserts: conflicting rows
    /// have every non-id column overwritten (last writer in the batch
    /// wins).
    pub ids: Option<Vec<Uuid>>,
}

impl AddOptions {
    pub fn with_ids(mut self, ids: Vec<Uuid>) -> Self {
        self.ids = Some(ids);
        self
    }
}

// ---------------------------------------------------------------------------
// PgVectorStore
// ---------------------------------------------------------------------------

/// A Postgres vector store generic over the installed vector extension.
pub struct PgVectorStore {
    pool: PgPool,
    embeddings: Arc<dyn Embeddings>,
    extension: Arc<dyn VectorExtension>,
    config: StoreConfig,
    runner: Arc<dyn QueryRunner>,
}

impl PgVectorStore {
    /// Create a store from an existing pool, an embedder, and a vector
    /// extension adapter. Table and column names are validated here.
    pub fn new(
        pool: PgPool,
        embeddings: Arc<dyn Embeddings>,
        extension: Arc<dyn VectorExtension>,
        config: StoreConfig,
    ) -> Result<Self, DendriteError> {
        config.validate()?;
        Ok(Self {
            pool,
            embeddings,
            extension,
            config,
            runner: Arc::new(PoolRunner),
        })
    }

    /// Replace the default query runner, e.g. with an
    /// [`RlsQueryRunner`](crate::runner::RlsQueryRunner).
    pub fn with_query_runner(mut self, runner: Arc<dyn QueryRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -- Provisioning --------------------------------------------------------

    /// Ensure the required extensions, the UUID generator, and the table
    /// exist. Idempotent and safe to call on every startup.
    pub async fn ensure_table(&self) -> Result<(), DendriteError> {
        self.execute_ddl("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"")
            .await?;
        self.execute_ddl(self.extension.create_extension_sql())
            .await?;

        let mut columns = vec![
            "\"id\" uuid NOT NULL PRIMARY KEY DEFAULT uuid_generate_v4()".to_string(),
            format!(
                "{} text",
                quote_identifier(&self.config.page_content_column)
            ),
            "\"metadata\" jsonb".to_string(),
            format!("\"embedding\" {}", self.extension.column_type()),
        ];
        for extra in &self.config.extra_columns {
            let mut column = format!("{} {}", quote_identifier(&extra.name), extra.sql_type);
            if extra.not_null {
                column.push_str(" NOT NULL");
            }
            if let Some(reference) = &extra.references {
                column.push_str(&format!(
                    " REFERENCES {} ({})",
                    quote_qualified(&reference.table),
                    quote_identifier(&reference.column),
                ));
            }
            columns.push(column);
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_qualified(&self.config.table_name),
            columns.join(", "),
        );
        tracing::debug!(table = %self.config.table_name, "ensuring store table");
        self.execute_ddl(&sql).await
    }

    async fn execute_ddl(&self, sql: &str) -> Result<(), DendriteError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| DendriteError::Schema(format!("DDL failed: {e}")))?;
        Ok(())
    }

    // -- Inserts -------------------------------------------------------------

    /// Embed `documents` and insert them. See [`add_vectors`](Self::add_vectors).
    pub async fn add_documents(
        &self,
        documents: &[Document],
        options: &AddOptions,
    ) -> Result<Vec<String>, DendriteError> {
        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let vectors = self.embeddings.embed_documents(&texts).await?;
        self.add_vectors(&vectors, documents, options).await
    }

    /// Insert pre-embedded documents through a single parameterized
    /// multi-row INSERT. Returns the row ids in input order.
    ///
    /// Extra-column values are picked out of each document's metadata by
    /// declared column name; metadata keys that match no declared column
    /// are stored as plain metadata only. Missing `not_null` extras fail
    /// the whole batch.
    pub async fn add_vectors(
        &self,
        vectors: &[Vec<f32>],
        documents: &[Document],
        options: &AddOptions,
    ) -> Result<Vec<String>, DendriteError> {
        if vectors.len() != documents.len() {
            return Err(DendriteError::InvalidArgument(format!(
                "got {} vectors for {} documents",
                vectors.len(),
                documents.len(),
            )));
        }
        if let Some(ids) = &options.ids {
            if ids.len() != documents.len() {
                return Err(DendriteError::InvalidArgument(format!(
                    "got {} ids for {} documents",
                    ids.len(),
                    documents.len(),
                )));
            }
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let dims = self.extension.dims() as usize;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(DendriteError::InvalidArgument(format!(
                "embedding has {} dimensions, store is configured for {dims}",
                bad.len(),
            )));
        }

        let mut column_names: Vec<&str> = Vec::new();
        if options.ids.is_some() {
            column_names.push("id");
        }
        column_names.push(&self.config.page_content_column);
        column_names.push("metadata");
        column_names.push("embedding");
        for extra in &self.config.extra_columns {
            column_names.push(&extra.name);
        }

        let mut params: Vec<SqlValue> = Vec::new();
        let mut next_param = 1usize;
        let mut param = |value: SqlValue, params: &mut Vec<SqlValue>| {
            let index = next_param;
            next_param += 1;
            params.push(value);
            index
        };

        let mut row_groups = Vec::with_capacity(documents.len());
        for (row, (document, vector)) in documents.iter().zip(vectors).enumerate() {
            let mut placeholders = Vec::with_capacity(column_names.len());

            if let Some(ids) = &options.ids {
                let index = param(SqlValue::Uuid(ids[row]), &mut params);
                placeholders.push(format!("${index}"));
            }

            let index = param(SqlValue::Text(document.content.clone()), &mut params);
            placeholders.push(format!("${index}"));

            let metadata = Value::Object(document.metadata.clone().into_iter().collect());
            let index = param(SqlValue::Json(metadata), &mut params);
            placeholders.push(format!("${index}"));

            let index = param(
                SqlValue::Text(self.extension.insert_literal(vector)),
                &mut params,
            );
            placeholders.push(format!("${index}::{}", self.extension.vector_cast()));

            for extra in &self.config.extra_columns {
                match document.metadata.get(&extra.name) {
                    None | Some(Value::Null) => {
                        if extra.not_null {
                            return Err(DendriteError::InvalidArgument(format!(
                                "document {row} is missing required column '{}'",
                                extra.name,
                            )));
                        }
                        placeholders.push("NULL".to_string());
                    }
                    Some(value) => {
                        let bound = SqlValue::from_scalar(value)
                            .unwrap_or_else(|| SqlValue::Json(value.clone()));
                        let index = param(bound, &mut params);
                        placeholders.push(format!("${index}"));
                    }
                }
            }

            row_groups.push(format!("({})", placeholders.join(", ")));
        }

        let quoted_columns: Vec<String> = column_names
            .iter()
            .map(|name| quote_identifier(name))
            .collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_qualified(&self.config.table_name),
            quoted_columns.join(", "),
            row_groups.join(", "),
        );

        if options.ids.is_some() {
            let updates: Vec<String> = column_names
                .iter()
                .skip(1) // id is the conflict target
                .map(|name| {
                    let quoted = quote_identifier(name);
                    format!("{quoted} = EXCLUDED.{quoted}")
                })
                .collect();
            sql.push_str(&format!(
                " ON CONFLICT (\"id\") DO UPDATE SET {}",
                updates.join(", "),
            ));
        }
        sql.push_str(" RETURNING \"id\"");

        tracing::debug!(rows = documents.len(), "inserting documents");
        let rows = self
            .runner
            .fetch(
                &self.pool,
                StoreQuery {
                    sql: &sql,
                    params: &params,
                    disable_seqscan: false,
                },
            )
            .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("id")
                    .map(|id| id.to_string())
                    .map_err(|e| DendriteError::Serialization(format!("bad returned id: {e}")))
            })
            .collect()
    }

    // -- Retrieval -----------------------------------------------------------

    /// Search by a pre-computed query vector, returning documents with
    /// their distance (smaller is closer, for every metric on both
    /// extensions).
    pub async fn similarity_search_by_vector_with_score(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f64)>, DendriteError> {
        let rows = self.fetch_candidates(embedding, k, filter, false).await?;
        rows.iter().map(|row| self.row_to_document(row)).collect()
    }

    /// Embed `query` and search, returning documents with distances.
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f64)>, DendriteError> {
        let query_vec = self.embeddings.embed_query(query).await?;
        self.similarity_search_by_vector_with_score(&query_vec, k, filter)
            .await
    }

    /// Embed `query` and return the `k` nearest documents.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Document>, DendriteError> {
        let results = self.similarity_search_with_score(query, k, filter).await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }

    /// Maximal-marginal-relevance search: fetches `fetch_k` candidates
    /// with their embeddings, reranks for diversity, and returns up to
    /// `k` documents in MMR order. Returning fewer than `k` documents
    /// just means fewer candidates survived the filter.
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        options: &MmrOptions,
    ) -> Result<Vec<Document>, DendriteError> {
        let query_vec = self.embeddings.embed_query(query).await?;
        let rows = self
            .fetch_candidates(&query_vec, options.fetch_k, options.filter.as_ref(), true)
            .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let (document, _) = self.row_to_document(row)?;
            let text: String = row.try_get("embedding").map_err(|e| {
                DendriteError::Serialization(format!("bad embedding column: {e}"))
            })?;
            candidates.push((document, parse_vector(&text)?));
        }

        let embeddings: Vec<Vec<f32>> = candidates.iter().map(|(_, e)| e.clone()).collect();
        let selected =
            maximal_marginal_relevance(&query_vec, &embeddings, options.lambda, options.k);

        let mut documents: Vec<Option<Document>> =
            candidates.into_iter().map(|(d, _)| Some(d)).collect();
        Ok(selected
            .into_iter()
            .filter_map(|index| documents[index].take())
            .collect())
    }

    /// Assemble and run the candidate fetch.
    async fn fetch_candidates(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        include_embeddings: bool,
    ) -> Result<Vec<PgRow>, DendriteError> {
        let empty = SearchFilter::default();
        let filter = filter.unwrap_or(&empty);

        if filter.metadata.is_some() && filter.columns.is_some() {
            return Err(DendriteError::InvalidArgument(
                "metadata and column filters are mutually exclusive".to_string(),
            ));
        }

        let joins = compile_joins(&filter.joins)?;
        let qualify = joins.is_some();

        let mut select_list = vec![
            self.select_item("id", qualify),
            self.select_item(&self.config.page_content_column, qualify),
            self.select_item("metadata", qualify),
        ];
        for extra in &self.config.extra_columns {
            if extra.returned {
                select_list.push(self.select_item(&extra.name, qualify));
            }
        }
        if include_embeddings {
            // Selected as text so either extension's column type
            // deserializes the same way.
            let column = if qualify {
                format!(
                    "{}.\"embedding\"",
                    quote_qualified(&self.config.table_name)
                )
            } else {
                "\"embedding\"".to_string()
            };
            select_list.push(format!("{column}::text AS \"embedding\""));
        }

        let mut params = vec![SqlValue::Text(self.extension.insert_literal(embedding))];
        let mut sql = self.extension.fetch_rows_sql(
            &self.config.table_name,
            &select_list,
            "embedding",
            1,
            qualify,
        );

        if let Some(joins) = joins {
            sql.push(' ');
            sql.push_str(&joins);
        }

        let (dsl, mode) = match (&filter.metadata, &filter.columns) {
            (Some(dsl), None) => (Some(dsl), FilterMode::Metadata),
            (None, Some(dsl)) => (Some(dsl), FilterMode::Column),
            _ => (None, FilterMode::Metadata),
        };
        if let Some(dsl) = dsl {
            if let Some(compiled) = compile_filter(
                dsl,
                mode,
                &self.config.page_content_column,
                params.len() + 1,
            )? {
                sql.push(' ');
                sql.push_str(&compiled.sql);
                params.extend(compiled.params);
            }
        }

        params.push(SqlValue::Int(k as i64));
        sql.push_str(&format!(
            " ORDER BY \"_distance\" LIMIT ${}",
            params.len(),
        ));

        let disable_seqscan =
            self.config.use_hnsw_index && self.extension.disable_seqscan_for_hnsw();
        tracing::debug!(%sql, disable_seqscan, "running candidate fetch");

        self.runner
            .fetch(
                &self.pool,
                StoreQuery {
                    sql: &sql,
                    params: &params,
                    disable_seqscan,
                },
            )
            .await
    }

    fn select_item(&self, column: &str, qualify: bool) -> String {
        let quoted = quote_identifier(column);
        if qualify {
            format!(
                "{}.{quoted} AS {quoted}",
                quote_qualified(&self.config.table_name),
            )
        } else {
            quoted
        }
    }

    fn row_to_document(&self, row: &PgRow) -> Result<(Document, f64), DendriteError> {
        let id: Uuid = row
            .try_get("id")
            .map_err(|e| DendriteError::Serialization(format!("bad id column: {e}")))?;
        let content: Option<String> = row
            .try_get(self.config.page_content_column.as_str())
            .map_err(|e| DendriteError::Serialization(format!("bad content column: {e}")))?;

        let mut metadata: HashMap<String, Value> =
            match row.try_get::<Option<Value>, _>("metadata") {
                Ok(Some(Value::Object(map))) => map.into_iter().collect(),
                _ => HashMap::new(),
            };
        for extra in &self.config.extra_columns {
            if extra.returned {
                if let Some(value) = decode_extra(row, &extra.name) {
                    metadata.insert(extra.name.clone(), value);
                }
            }
        }

        let distance: f64 = row
            .try_get::<f64, _>("_distance")
            .or_else(|_| row.try_get::<f32, _>("_distance").map(f64::from))
            .map_err(|e| DendriteError::Serialization(format!("bad distance column: {e}")))?;

        Ok((
            Document::with_metadata(id.to_string(), content.unwrap_or_default(), metadata),
            distance,
        ))
    }

    // -- Indexes -------------------------------------------------------------

    /// Create an HNSW index using the extension's DDL. Not idempotent:
    /// creating an index under an existing name surfaces the driver
    /// error.
    pub async fn build_hnsw_index(
        &self,
        name: &str,
        options: &HnswIndexOptions,
    ) -> Result<(), DendriteError> {
        validate_identifier(name)?;
        let statements = self.extension.hnsw_index_sql(
            name,
            &self.config.table_name,
            "embedding",
            options,
        );
        for statement in statements {
            tracing::debug!(%statement, "building HNSW index");
            self.execute_ddl(&statement).await?;
        }
        Ok(())
    }

    /// Drop an index by name; dropping a missing index is a no-op.
    pub async fn drop_index(&self, name: &str) -> Result<(), DendriteError> {
        validate_identifier(name)?;
        let sql = format!("DROP INDEX IF EXISTS {}", quote_identifier(name));
        self.execute_ddl(&sql).await
    }
}

/// Decode an extra column of caller-declared SQL type into JSON, trying
/// the common Postgres scalar decodings in order.
fn decode_extra(row: &PgRow, name: &str) -> Option<Value> {
    if let Ok(value) = row.try_get::<Option<i32>, _>(name) {
        return value.map(Value::from);
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(name) {
        return value.map(Value::from);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(name) {
        return value.map(Value::from);
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(name) {
        return value.map(|v| Value::from(f64::from(v)));
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(name) {
        return value.map(Value::from);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(name) {
        return value.map(Value::from);
    }
    if let Ok(value) = row.try_get::<Option<Uuid>, _>(name) {
        return value.map(|v| Value::from(v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<Value>, _>(name) {
        return value;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.table_name, "documents");
        assert_eq!(config.page_content_column, "content");
        assert!(!config.use_hnsw_index);
        assert!(config.extra_columns.is_empty());
    }

    #[test]
    fn config_builder_chain() {
        let config = StoreConfig::new("docs")
            .with_page_content_column("body")
            .with_hnsw_index(true)
            .with_extra_column(
                ExtraColumn::new("extra_stuff", "TEXT")
                    .with_not_null(true)
                    .with_returned(false),
            )
            .with_extra_column(
                ExtraColumn::new("author_id", "uuid")
                    .with_references(ColumnReference::new("authors")),
            );
        assert_eq!(config.table_name, "docs");
        assert_eq!(config.page_content_column, "body");
        assert!(config.use_hnsw_index);
        assert_eq!(config.extra_columns.len(), 2);
        assert!(config.extra_columns[0].not_null);
        assert!(!config.extra_columns[0].returned);
        let reference = config.extra_columns[1].references.as_ref().unwrap();
        assert_eq!(reference.table, "authors");
        assert_eq!(reference.column, "id");
    }

    #[test]
    fn config_validation_rejects_hostile_names() {
        assert!(StoreConfig::new("docs; DROP TABLE users").validate().is_err());
        assert!(StoreConfig::new("docs")
            .with_page_content_column("c; --")
            .validate()
            .is_err());
        assert!(StoreConfig::new("docs")
            .with_extra_column(ExtraColumn::new("x", "TEXT; DROP TABLE y"))
            .validate()
            .is_err());
        assert!(StoreConfig::new("docs").validate().is_ok());
    }

    #[test]
    fn column_reference_defaults_to_id() {
        let reference = ColumnReference::new("some_extra_stuff");
        assert_eq!(reference.column, "id");
        let reference = ColumnReference::new("t").with_column("key");
        assert_eq!(reference.column, "key");
    }

    #[test]
    fn mmr_options_defaults() {
        let options = MmrOptions::new(3);
        assert_eq!(options.k, 3);
        assert_eq!(options.fetch_k, 20);
        assert!((options.lambda - 0.7).abs() < f32::EPSILON);
        assert!(options.filter.is_none());
    }

    #[test]
    fn search_filter_constructors() {
        let filter = SearchFilter::metadata(serde_json::json!({ "a": "b" }));
        assert!(filter.metadata.is_some());
        assert!(filter.columns.is_none());

        let filter = SearchFilter::columns(serde_json::json!({ "a": "b" }))
            .with_join(JoinClause::new("JOIN", "other"));
        assert!(filter.columns.is_some());
        assert_eq!(filter.joins.len(), 1);
    }
}
