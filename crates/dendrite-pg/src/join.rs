//! JOIN clause validation and SQL emission.
//!
//! Join clauses are caller-supplied data, so both the join operation and the
//! per-condition comparison operator are validated against closed token
//! tables before anything is emitted; table and column names go through
//! identifier quoting.

use dendrite_core::DendriteError;

use crate::ident::quote_qualified;

const ALLOWED_JOIN_OPS: &[&str] = &[
    "JOIN",
    "LEFT JOIN",
    "RIGHT JOIN",
    "FULL JOIN",
    "CROSS JOIN",
    "INNER JOIN",
];

const ALLOWED_CONDITION_OPS: &[&str] = &["=", "<>", "<", "<=", ">", ">="];

/// One `ON` condition: `left <op> right`, defaulting to equality.
#[derive(Debug, Clone)]
pub struct JoinCondition {
    pub left: String,
    pub right: String,
    pub operator: Option<String>,
}

impl JoinCondition {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            operator: None,
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

/// A join against the base table, evaluated in input order.
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub op: String,
    pub table: String,
    pub on: Vec<JoinCondition>,
}

impl JoinClause {
    pub fn new(op: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            table: table.into(),
            on: Vec::new(),
        }
    }

    pub fn on(mut self, condition: JoinCondition) -> Self {
        self.on.push(condition);
        self
    }

    /// Render `<OP> "table" ON "l" = "r" [AND …]`.
    pub fn compile(&self) -> Result<String, DendriteError> {
        let op = self.op.trim().to_uppercase();
        if !ALLOWED_JOIN_OPS.contains(&op.as_str()) {
            return Err(DendriteError::InvalidArgument(format!(
                "unknown join operation '{}'",
                self.op,
            )));
        }

        let mut conditions = Vec::with_capacity(self.on.len());
        for condition in &self.on {
            let operator = condition.operator.as_deref().unwrap_or("=");
            if !ALLOWED_CONDITION_OPS.contains(&operator) {
                return Err(DendriteError::InvalidArgument(format!(
                    "unknown join condition operator '{operator}'",
                )));
            }
            conditions.push(format!(
                "{} {operator} {}",
                quote_qualified(&condition.left),
                quote_qualified(&condition.right),
            ));
        }

        if conditions.is_empty() {
            return Err(DendriteError::InvalidArgument(format!(
                "join on '{}' requires at least one ON condition",
                self.table,
            )));
        }

        Ok(format!(
            "{op} {} ON {}",
            quote_qualified(&self.table),
            conditions.join(" AND "),
        ))
    }
}

/// Compile joins in input order, space-separated for appending after FROM.
pub fn compile_joins(joins: &[JoinClause]) -> Result<Option<String>, DendriteError> {
    if joins.is_empty() {
        return Ok(None);
    }
    let fragments = joins
        .iter()
        .map(JoinClause::compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(fragments.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_join() {
        let join = JoinClause::new("JOIN", "some_extra_stuff")
            .on(JoinCondition::new("t.extra_stuff", "some_extra_stuff.id"));
        assert_eq!(
            join.compile().unwrap(),
            "JOIN \"some_extra_stuff\" ON \"t\".\"extra_stuff\" = \"some_extra_stuff\".\"id\""
        );
    }

    #[test]
    fn multiple_conditions_and_joined() {
        let join = JoinClause::new("LEFT JOIN", "authors")
            .on(JoinCondition::new("t.author_id", "authors.id"))
            .on(JoinCondition::new("t.tenant", "authors.tenant").with_operator("<>"));
        assert_eq!(
            join.compile().unwrap(),
            "LEFT JOIN \"authors\" ON \"t\".\"author_id\" = \"authors\".\"id\" \
             AND \"t\".\"tenant\" <> \"authors\".\"tenant\""
        );
    }

    #[test]
    fn op_is_case_insensitive() {
        let join = JoinClause::new("inner join", "x").on(JoinCondition::new("a.b", "x.y"));
        assert!(join.compile().unwrap().starts_with("INNER JOIN"));
    }

    #[test]
    fn rejects_unknown_join_op() {
        let join =
            JoinClause::new("NATURAL JOIN", "x").on(JoinCondition::new("a.b", "x.y"));
        assert!(join.compile().is_err());

        let join = JoinClause::new("JOIN x ON 1=1; DROP TABLE docs; --", "x")
            .on(JoinCondition::new("a.b", "x.y"));
        assert!(join.compile().is_err());
    }

    #[test]
    fn rejects_unknown_condition_operator() {
        let join = JoinClause::new("JOIN", "x")
            .on(JoinCondition::new("a.b", "x.y").with_operator("LIKE"));
        assert!(join.compile().is_err());
    }

    #[test]
    fn rejects_empty_on_list() {
        assert!(JoinClause::new("JOIN", "x").compile().is_err());
    }

    #[test]
    fn hostile_table_name_is_quoted_inert() {
        let join = JoinClause::new("JOIN", "x; DROP TABLE docs")
            .on(JoinCondition::new("a.b", "x.y"));
        let sql = join.compile().unwrap();
        assert!(sql.contains("\"x; DROP TABLE docs\""));
    }

    #[test]
    fn compile_joins_preserves_order() {
        let joins = vec![
            JoinClause::new("JOIN", "a").on(JoinCondition::new("t.a", "a.id")),
            JoinClause::new("LEFT JOIN", "b").on(JoinCondition::new("t.b", "b.id")),
        ];
        let sql = compile_joins(&joins).unwrap().unwrap();
        let a = sql.find("JOIN \"a\"").unwrap();
        let b = sql.find("LEFT JOIN \"b\"").unwrap();
        assert!(a < b);
        assert!(compile_joins(&[]).unwrap().is_none());
    }
}
