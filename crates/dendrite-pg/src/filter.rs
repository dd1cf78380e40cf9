//! The structured filter DSL and its SQL compiler.
//!
//! Filters arrive as nested JSON (`{"$or": [{"topic": {"$eq": "rust"}}, …]}`)
//! and are parsed in one pass into the [`Filter`] tree, then compiled in a
//! second pass into a `WHERE …` fragment plus a positional parameter list.
//! Only field names and scalar values ever cross into SQL: fields through
//! identifier quoting or a `$n` parameter (metadata keys), values always
//! through a `$n` parameter. Operator and logical tokens come from closed
//! tables.
//!
//! Compilation runs in one of two modes: [`FilterMode::Metadata`] targets
//! JSON paths under the `metadata` column, [`FilterMode::Column`]
//! first-class columns (optionally qualified as `table.column` under a
//! join).

use serde_json::{Map, Value};

use dendrite_core::DendriteError;

use crate::ident::{quote_identifier, quote_qualified};
use crate::scalar::{is_int, is_string, SqlValue};

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Comparison operator, from the DSL's closed comparator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    fn from_token(token: &str) -> Option<Comparator> {
        match token {
            "$eq" => Some(Comparator::Eq),
            "$not" | "$neq" => Some(Comparator::Ne),
            "$lt" => Some(Comparator::Lt),
            "$lte" => Some(Comparator::Lte),
            "$gt" => Some(Comparator::Gt),
            "$gte" => Some(Comparator::Gte),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
        }
    }
}

/// Variant of full-text query to build from a `$textSearch` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSearchKind {
    Plain,
    Phrase,
    Websearch,
}

impl TextSearchKind {
    fn from_token(token: &str) -> Option<TextSearchKind> {
        match token {
            "plain" => Some(TextSearchKind::Plain),
            "phrase" => Some(TextSearchKind::Phrase),
            "websearch" => Some(TextSearchKind::Websearch),
            _ => None,
        }
    }

    fn query_function(self) -> &'static str {
        match self {
            TextSearchKind::Plain => "plainto_tsquery",
            TextSearchKind::Phrase => "phraseto_tsquery",
            TextSearchKind::Websearch => "websearch_to_tsquery",
        }
    }
}

/// Parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Cmp {
        field: String,
        op: Comparator,
        value: Value,
    },
    TextSearch {
        field: String,
        query: String,
        kind: TextSearchKind,
        config: String,
    },
}

/// Whether fields address metadata JSON paths or first-class columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Metadata,
    Column,
}

/// A compiled WHERE fragment and the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    /// `WHERE …` with `$n` placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// JS-style falsiness: these values drop their entry from the enclosing
/// AND group rather than compiling to a clause.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => {
            n.as_i64() == Some(0) || n.as_u64() == Some(0) || n.as_f64() == Some(0.0)
        }
        _ => false,
    }
}

fn scalar_clause(field: &str, op: Comparator, value: &Value) -> Result<Option<Filter>, DendriteError> {
    if is_falsy(value) {
        tracing::warn!(field, "dropping filter entry with falsy value");
        return Ok(None);
    }
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(Some(Filter::Cmp {
            field: field.to_string(),
            op,
            value: value.clone(),
        })),
        other => Err(DendriteError::InvalidArgument(format!(
            "unsupported filter value for '{field}': {other}",
        ))),
    }
}

fn parse_text_search(field: &str, spec: &Value) -> Result<Filter, DendriteError> {
    let obj = spec.as_object().ok_or_else(|| {
        DendriteError::InvalidArgument(format!(
            "$textSearch on '{field}' must be an object with a 'query' key",
        ))
    })?;

    let query = obj
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            DendriteError::InvalidArgument(format!(
                "$textSearch on '{field}' is missing a string 'query'",
            ))
        })?
        .to_string();

    let kind = match obj.get("type") {
        None => TextSearchKind::Plain,
        Some(v) => {
            let token = v.as_str().unwrap_or_default();
            TextSearchKind::from_token(token).ok_or_else(|| {
                DendriteError::InvalidArgument(format!(
                    "unknown $textSearch type '{token}' (expected plain, phrase, or websearch)",
                ))
            })?
        }
    };

    let config = obj
        .get("config")
        .and_then(Value::as_str)
        .unwrap_or("english")
        .to_string();

    Ok(Filter::TextSearch {
        field: field.to_string(),
        query,
        kind,
        config,
    })
}

/// Parse one field entry: either an operator map or an implicit `$eq`.
fn parse_field(field: &str, value: &Value) -> Result<Option<Filter>, DendriteError> {
    let Some(ops) = value.as_object() else {
        // Scalar (or null): implicit $eq.
        return scalar_clause(field, Comparator::Eq, value);
    };

    let mut clauses = Vec::new();
    for (token, operand) in ops {
        if token == "$textSearch" {
            clauses.push(parse_text_search(field, operand)?);
        } else if let Some(op) = Comparator::from_token(token) {
            if let Some(clause) = scalar_clause(field, op, operand)? {
                clauses.push(clause);
            }
        } else {
            return Err(DendriteError::InvalidArgument(format!(
                "unknown comparator '{token}' on field '{field}'",
            )));
        }
    }

    Ok(group(clauses, false))
}

fn parse_group(entries: &Value, or: bool) -> Result<Option<Filter>, DendriteError> {
    let list = entries.as_array().ok_or_else(|| {
        DendriteError::InvalidArgument(format!(
            "{} expects an array of filters",
            if or { "$or" } else { "$and" },
        ))
    })?;

    let mut children = Vec::new();
    for entry in list {
        if let Some(child) = Filter::parse(entry)? {
            children.push(child);
        }
    }
    Ok(group(children, or))
}

fn group(mut clauses: Vec<Filter>, or: bool) -> Option<Filter> {
    match clauses.len() {
        0 => None,
        1 if !or => Some(clauses.remove(0)),
        _ if or => Some(Filter::Or(clauses)),
        _ => Some(Filter::And(clauses)),
    }
}

impl Filter {
    /// Parse a DSL value into a filter tree.
    ///
    /// Returns `Ok(None)` when the filter is empty or every entry was
    /// dropped for falsiness.
    pub fn parse(dsl: &Value) -> Result<Option<Filter>, DendriteError> {
        let obj: &Map<String, Value> = dsl.as_object().ok_or_else(|| {
            DendriteError::InvalidArgument(format!("filter must be an object, got: {dsl}"))
        })?;

        let mut clauses = Vec::new();
        for (key, value) in obj {
            let clause = match key.as_str() {
                "$and" => parse_group(value, false)?,
                "$or" => parse_group(value, true)?,
                other if other.starts_with('$') => {
                    return Err(DendriteError::InvalidArgument(format!(
                        "unknown logical operator '{other}'",
                    )));
                }
                field => parse_field(field, value)?,
            };
            if let Some(clause) = clause {
                clauses.push(clause);
            }
        }
        Ok(group(clauses, false))
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

struct Compiler<'a> {
    mode: FilterMode,
    page_content_column: &'a str,
    next_param: usize,
    params: Vec<SqlValue>,
}

impl Compiler<'_> {
    fn param(&mut self, value: SqlValue) -> usize {
        let index = self.next_param;
        self.next_param += 1;
        self.params.push(value);
        index
    }

    /// Column expression for a text-valued target (equality on strings,
    /// text search). Metadata keys travel as parameters.
    fn text_column_expr(&mut self, field: &str) -> String {
        match self.mode {
            FilterMode::Column => quote_qualified(field),
            FilterMode::Metadata => {
                if field == self.page_content_column {
                    quote_identifier(field)
                } else {
                    let key = self.param(SqlValue::Text(field.to_string()));
                    format!("(metadata->>${key})::text")
                }
            }
        }
    }

    fn cmp(&mut self, field: &str, op: Comparator, value: &Value) -> Result<String, DendriteError> {
        let bound = SqlValue::from_scalar(value).ok_or_else(|| {
            DendriteError::InvalidArgument(format!(
                "unsupported filter value for '{field}': {value}",
            ))
        })?;

        let column = match self.mode {
            FilterMode::Column => quote_qualified(field),
            FilterMode::Metadata if field == self.page_content_column => quote_identifier(field),
            FilterMode::Metadata => {
                let key = self.param(SqlValue::Text(field.to_string()));
                if is_string(value) {
                    format!("(metadata->>${key})::text")
                } else if is_int(value) {
                    format!("(metadata->${key})::int")
                } else if matches!(bound, SqlValue::Bool(_)) {
                    format!("(metadata->${key})::boolean")
                } else {
                    format!("(metadata->${key})::float")
                }
            }
        };

        let value_param = self.param(bound);
        Ok(format!("{column} {} ${value_param}", op.sql()))
    }

    fn text_search(
        &mut self,
        field: &str,
        query: &str,
        kind: TextSearchKind,
        config: &str,
    ) -> String {
        let vector_config = self.param(SqlValue::Text(config.to_string()));
        let column = self.text_column_expr(field);
        let query_config = self.param(SqlValue::Text(config.to_string()));
        let query_param = self.param(SqlValue::Text(query.to_string()));
        format!(
            "to_tsvector(${vector_config}, {column}) @@ {}(${query_config}, ${query_param})",
            kind.query_function(),
        )
    }

    fn emit(&mut self, filter: &Filter) -> Result<String, DendriteError> {
        match filter {
            Filter::And(children) => self.emit_group(children, " AND "),
            Filter::Or(children) => self.emit_group(children, " OR "),
            Filter::Cmp { field, op, value } => self.cmp(field, *op, value),
            Filter::TextSearch {
                field,
                query,
                kind,
                config,
            } => Ok(self.text_search(field, query, *kind, config)),
        }
    }

    fn emit_group(&mut self, children: &[Filter], separator: &str) -> Result<String, DendriteError> {
        let rendered = children
            .iter()
            .map(|child| self.emit(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({})", rendered.join(separator)))
    }
}

/// Compile a DSL filter into a `WHERE …` fragment.
///
/// `first_param` is the index the first `$n` placeholder should use, so the
/// fragment can follow earlier parameters (the query vector). Returns
/// `Ok(None)` when the filter compiles to nothing.
pub fn compile_filter(
    dsl: &Value,
    mode: FilterMode,
    page_content_column: &str,
    first_param: usize,
) -> Result<Option<CompiledFilter>, DendriteError> {
    let Some(ast) = Filter::parse(dsl)? else {
        return Ok(None);
    };

    let mut compiler = Compiler {
        mode,
        page_content_column,
        next_param: first_param,
        params: Vec::new(),
    };
    let body = compiler.emit(&ast)?;
    Ok(Some(CompiledFilter {
        sql: format!("WHERE {body}"),
        params: compiler.params,
    }))
}
