//! Pluggable Postgres vector extension adapters.
//!
//! `pgvector` and `pg_embedding` disagree on almost every SQL-visible
//! detail: the column type, the insertion literal, the distance operators,
//! the HNSW index DDL, and whether sequential scans must be disabled for
//! the planner to use the index. [`VectorExtension`] captures exactly that
//! capability set; the store is written against the trait and never
//! mentions either extension by name.
//!
//! Every `"_distance"` expression emitted here is a true distance (smaller
//! is closer), so `ORDER BY "_distance"` ascending always returns the
//! nearest rows first. For pgvector this means using the raw operators:
//! `<=>` is already cosine distance and `<#>` already the negated inner
//! product.

use std::fmt;

use dendrite_core::DendriteError;

use crate::ident::{quote_identifier, quote_qualified};

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// Distance metric between embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    L2,
    InnerProduct,
    Manhattan,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
            Metric::InnerProduct => "inner_product",
            Metric::Manhattan => "manhattan",
        };
        f.write_str(name)
    }
}

fn check_metric(
    metric: Metric,
    allowed: &'static [Metric],
    extension: &str,
) -> Result<(), DendriteError> {
    if allowed.contains(&metric) {
        Ok(())
    } else {
        Err(DendriteError::InvalidArgument(format!(
            "metric '{metric}' is not supported by the {extension} extension",
        )))
    }
}

// ---------------------------------------------------------------------------
// HnswIndexOptions
// ---------------------------------------------------------------------------

/// User-supplied HNSW parameters. The store passes them through to the
/// extension's DDL without tuning of its own.
#[derive(Debug, Clone, Copy)]
pub struct HnswIndexOptions {
    /// Maximum number of connections per graph node.
    pub m: u32,
    /// Candidate list size at index build time.
    pub ef_construction: u32,
    /// Candidate list size at query time.
    pub ef_search: u32,
}

impl Default for HnswIndexOptions {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 64,
            ef_search: 40,
        }
    }
}

impl HnswIndexOptions {
    pub fn with_m(mut self, m: u32) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef_construction: u32) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    pub fn with_ef_search(mut self, ef_search: u32) -> Self {
        self.ef_search = ef_search;
        self
    }
}

// ---------------------------------------------------------------------------
// VectorExtension
// ---------------------------------------------------------------------------

/// The per-extension capability set.
pub trait VectorExtension: Send + Sync {
    /// Metrics this extension can index and search.
    fn allowed_metrics(&self) -> &'static [Metric];

    /// The metric this instance was configured with.
    fn metric(&self) -> Metric;

    /// Embedding dimensionality.
    fn dims(&self) -> u32;

    /// `CREATE EXTENSION IF NOT EXISTS …` for this backend.
    fn create_extension_sql(&self) -> &'static str;

    /// SQL type of the embedding column.
    fn column_type(&self) -> String;

    /// Text literal for inserting a vector (`[1,2,3]` vs `{1,2,3}`).
    fn insert_literal(&self, vector: &[f32]) -> String;

    /// Cast applied to vector parameters (`vector` vs `real[]`).
    fn vector_cast(&self) -> &'static str;

    /// Distance operator for the configured metric.
    fn distance_operator(&self) -> &'static str;

    /// DDL statements creating an HNSW index, executed in order.
    fn hnsw_index_sql(
        &self,
        name: &str,
        table: &str,
        column: &str,
        options: &HnswIndexOptions,
    ) -> Vec<String>;

    /// Whether HNSW queries must run with `SET LOCAL enable_seqscan = off`.
    fn disable_seqscan_for_hnsw(&self) -> bool;

    /// Build the candidate-fetch SELECT: the caller's select list plus the
    /// distance expression aliased as `"_distance"`. When `qualify` is set
    /// (a join is present) the embedding column is prefixed with the base
    /// table.
    fn fetch_rows_sql(
        &self,
        table: &str,
        select_list: &[String],
        embedding_column: &str,
        vector_param: usize,
        qualify: bool,
    ) -> String {
        let quoted_table = quote_qualified(table);
        let column = if qualify {
            format!("{quoted_table}.{}", quote_identifier(embedding_column))
        } else {
            quote_identifier(embedding_column)
        };
        format!(
            "SELECT {}, {column} {} ${vector_param}::{} AS \"_distance\" FROM {quoted_table}",
            select_list.join(", "),
            self.distance_operator(),
            self.vector_cast(),
        )
    }
}

fn join_components(vector: &[f32]) -> String {
    vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a vector column returned as text, in either the pgvector
/// (`[1,2,3]`) or array (`{1,2,3}`) form.
pub fn parse_vector(text: &str) -> Result<Vec<f32>, DendriteError> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .ok_or_else(|| {
            DendriteError::Serialization(format!("malformed vector literal: {text}"))
        })?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|e| {
                DendriteError::Serialization(format!("bad vector component '{part}': {e}"))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Extension selection
// ---------------------------------------------------------------------------

/// Which Postgres vector extension backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    PgVector,
    PgEmbedding,
}

/// Build the adapter for an extension kind, validating the metric against
/// the extension's allowed set.
pub fn build_extension(
    kind: ExtensionKind,
    dims: u32,
    metric: Metric,
) -> Result<std::sync::Arc<dyn VectorExtension>, DendriteError> {
    match kind {
        ExtensionKind::PgVector => Ok(std::sync::Arc::new(PgVectorExtension::new(dims, metric)?)),
        ExtensionKind::PgEmbedding => {
            Ok(std::sync::Arc::new(PgEmbeddingExtension::new(dims, metric)?))
        }
    }
}

// ---------------------------------------------------------------------------
// pgvector
// ---------------------------------------------------------------------------

/// Adapter for the [pgvector](https://github.com/pgvector/pgvector)
/// extension: native `vector(dims)` column type, bracket literals.
#[derive(Debug, Clone)]
pub struct PgVectorExtension {
    dims: u32,
    metric: Metric,
}

const PGVECTOR_METRICS: &[Metric] = &[Metric::Cosine, Metric::L2, Metric::InnerProduct];

impl PgVectorExtension {
    pub fn new(dims: u32, metric: Metric) -> Result<Self, DendriteError> {
        check_metric(metric, PGVECTOR_METRICS, "pgvector")?;
        Ok(Self { dims, metric })
    }

    fn operator_class(&self) -> &'static str {
        match self.metric {
            Metric::Cosine => "vector_cosine_ops",
            Metric::L2 => "vector_l2_ops",
            Metric::InnerProduct => "vector_ip_ops",
            Metric::Manhattan => unreachable!("rejected in constructor"),
        }
    }
}

impl VectorExtension for PgVectorExtension {
    fn allowed_metrics(&self) -> &'static [Metric] {
        PGVECTOR_METRICS
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dims(&self) -> u32 {
        self.dims
    }

    fn create_extension_sql(&self) -> &'static str {
        "CREATE EXTENSION IF NOT EXISTS vector"
    }

    fn column_type(&self) -> String {
        format!("vector({})", self.dims)
    }

    fn insert_literal(&self, vector: &[f32]) -> String {
        format!("[{}]", join_components(vector))
    }

    fn vector_cast(&self) -> &'static str {
        "vector"
    }

    fn distance_operator(&self) -> &'static str {
        match self.metric {
            Metric::Cosine => "<=>",
            Metric::L2 => "<->",
            Metric::InnerProduct => "<#>",
            Metric::Manhattan => unreachable!("rejected in constructor"),
        }
    }

    fn hnsw_index_sql(
        &self,
        name: &str,
        table: &str,
        column: &str,
        options: &HnswIndexOptions,
    ) -> Vec<String> {
        vec![
            format!(
                "CREATE INDEX {} ON {} USING hnsw ({} {}) WITH (m = {}, ef_construction = {})",
                quote_identifier(name),
                quote_qualified(table),
                quote_identifier(column),
                self.operator_class(),
                options.m,
                options.ef_construction,
            ),
            format!("SET hnsw.ef_search = {}", options.ef_search),
        ]
    }

    fn disable_seqscan_for_hnsw(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// pg_embedding
// ---------------------------------------------------------------------------

/// Adapter for the Neon [pg_embedding](https://github.com/neondatabase/pg_embedding)
/// extension: `REAL[]` column type, brace literals, and HNSW queries that
/// only hit the index when sequential scans are disabled for the
/// transaction.
#[derive(Debug, Clone)]
pub struct PgEmbeddingExtension {
    dims: u32,
    metric: Metric,
}

const PG_EMBEDDING_METRICS: &[Metric] = &[Metric::Cosine, Metric::L2, Metric::Manhattan];

impl PgEmbeddingExtension {
    pub fn new(dims: u32, metric: Metric) -> Result<Self, DendriteError> {
        check_metric(metric, PG_EMBEDDING_METRICS, "pg_embedding")?;
        Ok(Self { dims, metric })
    }

    /// Operator class for the index; l2 is the extension default and takes
    /// no explicit class.
    fn operator_class(&self) -> Option<&'static str> {
        match self.metric {
            Metric::Cosine => Some("ann_cos_ops"),
            Metric::Manhattan => Some("ann_manhattan_ops"),
            Metric::L2 => None,
            Metric::InnerProduct => unreachable!("rejected in constructor"),
        }
    }
}

impl VectorExtension for PgEmbeddingExtension {
    fn allowed_metrics(&self) -> &'static [Metric] {
        PG_EMBEDDING_METRICS
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dims(&self) -> u32 {
        self.dims
    }

    fn create_extension_sql(&self) -> &'static str {
        "CREATE EXTENSION IF NOT EXISTS embedding"
    }

    fn column_type(&self) -> String {
        "REAL[]".to_string()
    }

    fn insert_literal(&self, vector: &[f32]) -> String {
        format!("{{{}}}", join_components(vector))
    }

    fn vector_cast(&self) -> &'static str {
        "real[]"
    }

    fn distance_operator(&self) -> &'static str {
        match self.metric {
            Metric::Cosine => "<=>",
            Metric::L2 => "<->",
            Metric::Manhattan => "<~>",
            Metric::InnerProduct => unreachable!("rejected in constructor"),
        }
    }

    fn hnsw_index_sql(
        &self,
        name: &str,
        table: &str,
        column: &str,
        options: &HnswIndexOptions,
    ) -> Vec<String> {
        let column_spec = match self.operator_class() {
            Some(class) => format!("{} {class}", quote_identifier(column)),
            None => quote_identifier(column),
        };
        vec![format!(
            "CREATE INDEX {} ON {} USING hnsw ({column_spec}) \
             WITH (dims = {}, m = {}, efconstruction = {}, efsearch = {})",
            quote_identifier(name),
            quote_qualified(table),
            self.dims,
            options.m,
            options.ef_construction,
            options.ef_search,
        )]
    }

    fn disable_seqscan_for_hnsw(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgvector_rejects_manhattan() {
        let err = PgVectorExtension::new(3, Metric::Manhattan).unwrap_err();
        assert!(err.to_string().contains("manhattan"));
    }

    #[test]
    fn pg_embedding_rejects_inner_product() {
        assert!(PgEmbeddingExtension::new(3, Metric::InnerProduct).is_err());
    }

    #[test]
    fn pgvector_literals_and_types() {
        let ext = PgVectorExtension::new(3, Metric::Cosine).unwrap();
        assert_eq!(ext.column_type(), "vector(3)");
        assert_eq!(ext.insert_literal(&[1.0, 2.5, -3.0]), "[1,2.5,-3]");
        assert_eq!(ext.vector_cast(), "vector");
        assert_eq!(ext.create_extension_sql(), "CREATE EXTENSION IF NOT EXISTS vector");
    }

    #[test]
    fn pg_embedding_literals_and_types() {
        let ext = PgEmbeddingExtension::new(3, Metric::Manhattan).unwrap();
        assert_eq!(ext.column_type(), "REAL[]");
        assert_eq!(ext.insert_literal(&[1.0, 2.5]), "{1,2.5}");
        assert_eq!(ext.vector_cast(), "real[]");
        assert_eq!(
            ext.create_extension_sql(),
            "CREATE EXTENSION IF NOT EXISTS embedding"
        );
    }

    #[test]
    fn distance_operators_per_metric() {
        assert_eq!(
            PgVectorExtension::new(3, Metric::Cosine).unwrap().distance_operator(),
            "<=>"
        );
        assert_eq!(
            PgVectorExtension::new(3, Metric::L2).unwrap().distance_operator(),
            "<->"
        );
        assert_eq!(
            PgVectorExtension::new(3, Metric::InnerProduct).unwrap().distance_operator(),
            "<#>"
        );
        assert_eq!(
            PgEmbeddingExtension::new(3, Metric::Manhattan).unwrap().distance_operator(),
            "<~>"
        );
    }

    #[test]
    fn pgvector_fetch_rows_sql_shape() {
        let ext = PgVectorExtension::new(3, Metric::Cosine).unwrap();
        let sql = ext.fetch_rows_sql(
            "documents",
            &["\"id\"".to_string(), "\"content\"".to_string()],
            "embedding",
            1,
            false,
        );
        assert_eq!(
            sql,
            "SELECT \"id\", \"content\", \"embedding\" <=> $1::vector AS \"_distance\" \
             FROM \"documents\""
        );
    }

    #[test]
    fn fetch_rows_sql_qualifies_under_join() {
        let ext = PgEmbeddingExtension::new(3, Metric::L2).unwrap();
        let sql = ext.fetch_rows_sql(
            "documents",
            &["\"documents\".\"id\" AS \"id\"".to_string()],
            "embedding",
            1,
            true,
        );
        assert!(sql.contains("\"documents\".\"embedding\" <-> $1::real[]"));
    }

    #[test]
    fn pgvector_hnsw_ddl() {
        let ext = PgVectorExtension::new(1536, Metric::Cosine).unwrap();
        let options = HnswIndexOptions::default().with_m(24).with_ef_search(100);
        let ddl = ext.hnsw_index_sql("docs_idx", "documents", "embedding", &options);
        assert_eq!(ddl.len(), 2);
        assert_eq!(
            ddl[0],
            "CREATE INDEX \"docs_idx\" ON \"documents\" USING hnsw \
             (\"embedding\" vector_cosine_ops) WITH (m = 24, ef_construction = 64)"
        );
        assert_eq!(ddl[1], "SET hnsw.ef_search = 100");
    }

    #[test]
    fn pg_embedding_hnsw_ddl() {
        let ext = PgEmbeddingExtension::new(128, Metric::Cosine).unwrap();
        let ddl = ext.hnsw_index_sql(
            "docs_idx",
            "documents",
            "embedding",
            &HnswIndexOptions::default(),
        );
        assert_eq!(ddl.len(), 1);
        assert_eq!(
            ddl[0],
            "CREATE INDEX \"docs_idx\" ON \"documents\" USING hnsw \
             (\"embedding\" ann_cos_ops) WITH (dims = 128, m = 16, efconstruction = 64, efsearch = 40)"
        );
    }

    #[test]
    fn pg_embedding_l2_index_has_no_operator_class() {
        let ext = PgEmbeddingExtension::new(64, Metric::L2).unwrap();
        let ddl = ext.hnsw_index_sql("i", "t", "embedding", &HnswIndexOptions::default());
        assert!(ddl[0].contains("hnsw (\"embedding\") WITH"));
    }

    #[test]
    fn build_extension_by_kind() {
        let ext = build_extension(ExtensionKind::PgVector, 8, Metric::Cosine).unwrap();
        assert_eq!(ext.column_type(), "vector(8)");
        let ext = build_extension(ExtensionKind::PgEmbedding, 8, Metric::L2).unwrap();
        assert_eq!(ext.column_type(), "REAL[]");
        assert!(build_extension(ExtensionKind::PgVector, 8, Metric::Manhattan).is_err());
    }

    #[test]
    fn parse_vector_both_forms() {
        assert_eq!(parse_vector("[1,2.5,-3]").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(parse_vector("{1, 2.5, -3}").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(parse_vector(" [] ").unwrap(), Vec::<f32>::new());
        assert!(parse_vector("1,2,3").is_err());
        assert!(parse_vector("[1,x]").is_err());
    }
}
