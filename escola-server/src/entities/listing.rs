//! Shared list handling: search, ordering, scoping and windowing.
//!
//! Each resource declares a [`ListSpec`]; [`fetch`] turns it plus the
//! caller's [`ListParams`] into a `COUNT(*)` query and a windowed `SELECT`.
//! Field names in specs are SQL expressions and never come from the request;
//! request values only ever reach the database as bound parameters.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Declarative list configuration for one resource.
#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    /// `FROM` clause, joins included.
    pub from: &'static str,
    /// `SELECT` list; column names must match the row type's fields.
    pub columns: &'static str,
    /// Primary key expression, used as the ordering tie-breaker.
    pub id_column: &'static str,
    /// SQL expressions matched by `?search=`. Text columns must hold
    /// [`search_key`] values, since the term is folded the same way.
    pub searchable_fields: &'static [&'static str],
    /// `(query name, SQL expression)` pairs accepted by `?ordering=`.
    pub orderable_fields: &'static [(&'static str, &'static str)],
    /// Ordering used when `?ordering=` is absent or names nothing valid.
    pub default_ordering: &'static [Ordering],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub column: &'static str,
    pub descending: bool,
}

impl Ordering {
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// Caller-controlled list options.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub window: Option<Window>,
}

/// Equality filter on a foreign key, e.g. enrollments of one student.
#[derive(Debug, Clone, Copy)]
pub struct Scope {
    pub column: &'static str,
    pub value: i64,
}

/// A window of rows plus the total number of matching rows.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub count: i64,
}

impl ListSpec {
    /// Resolve `?ordering=` against the allowed fields.
    ///
    /// Unknown fields are dropped silently; if none survive the default
    /// ordering applies.
    pub fn resolve_ordering(&self, ordering: Option<&str>) -> Vec<Ordering> {
        let requested: Vec<Ordering> = ordering
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .filter_map(|f| {
                let (name, descending) = match f.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (f, false),
                };
                self.orderable_fields
                    .iter()
                    .find(|(allowed, _)| *allowed == name)
                    .map(|&(_, column)| Ordering { column, descending })
            })
            .collect();

        if requested.is_empty() {
            self.default_ordering.to_vec()
        } else {
            requested
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Sqlite>, params: &ListParams, scope: Option<Scope>) {
        let mut has_where = false;
        let mut clause = |qb: &mut QueryBuilder<'static, Sqlite>| {
            qb.push(if has_where { " AND " } else { " WHERE " });
            has_where = true;
        };

        if let Some(scope) = scope {
            clause(qb);
            qb.push(scope.column).push(" = ").push_bind(scope.value);
        }

        if self.searchable_fields.is_empty() {
            return;
        }
        for term in search_terms(params.search.as_deref().unwrap_or_default()) {
            let pattern = format!("%{}%", escape_like(&search_key(&term)));
            clause(qb);
            qb.push("(");
            for (i, field) in self.searchable_fields.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(*field)
                    .push(" LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            qb.push(")");
        }
    }

    fn push_order(&self, qb: &mut QueryBuilder<'static, Sqlite>, params: &ListParams) {
        let ordering = self.resolve_ordering(params.ordering.as_deref());
        qb.push(" ORDER BY ");
        for (i, o) in ordering.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(o.column)
                .push(if o.descending { " DESC" } else { " ASC" });
        }
        if !ordering.iter().any(|o| o.column == self.id_column) {
            if !ordering.is_empty() {
                qb.push(", ");
            }
            qb.push(self.id_column).push(" ASC");
        }
    }

    pub(crate) fn count_query(&self, params: &ListParams, scope: Option<Scope>) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(self.from);
        self.push_where(&mut qb, params, scope);
        qb
    }

    pub(crate) fn select_query(&self, params: &ListParams, scope: Option<Scope>) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(self.columns).push(" FROM ").push(self.from);
        self.push_where(&mut qb, params, scope);
        self.push_order(&mut qb, params);
        if let Some(w) = params.window {
            qb.push(" LIMIT ").push_bind(w.limit).push(" OFFSET ").push_bind(w.offset);
        }
        qb
    }
}

/// Run the count and windowed select for `spec`.
pub async fn fetch<T>(
    pool: &SqlitePool,
    spec: &ListSpec,
    params: &ListParams,
    scope: Option<Scope>,
) -> Result<Listing<T>, sqlx::Error>
where
    T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
{
    let count: i64 = spec
        .count_query(params, scope)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;
    let items = spec
        .select_query(params, scope)
        .build_query_as::<T>()
        .fetch_all(pool)
        .await?;
    Ok(Listing { items, count })
}

/// Split a search string on whitespace and commas.
pub fn search_terms(search: &str) -> Vec<String> {
    search
        .replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Case-folded form stored in `*_busca` columns and matched against.
///
/// SQLite only folds ASCII, so accented names are lowered here instead.
pub fn search_key(text: &str) -> String {
    text.to_lowercase()
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    const SPEC: ListSpec = ListSpec {
        from: "estudantes",
        columns: "id, nome",
        id_column: "id",
        searchable_fields: &["nome", "cpf"],
        orderable_fields: &[("nome", "nome")],
        default_ordering: &[Ordering::asc("id")],
    };

    #[test]
    fn ordering_drops_unknown_fields() {
        assert_eq!(
            SPEC.resolve_ordering(Some("-nome,cpf")),
            vec![Ordering::desc("nome")]
        );
        assert_eq!(SPEC.resolve_ordering(Some("cpf")), vec![Ordering::asc("id")]);
        assert_eq!(SPEC.resolve_ordering(None), vec![Ordering::asc("id")]);
    }

    #[test]
    fn search_terms_split_on_space_and_comma() {
        assert_eq!(search_terms(" ana, silva  "), vec!["ana", "silva"]);
        assert!(search_terms("").is_empty());
    }

    #[test]
    fn search_key_folds_accented_letters() {
        assert_eq!(search_key("JOSÉ Álvares"), "josé álvares");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn select_sql_combines_scope_search_order_and_window() {
        let params = ListParams {
            search: Some("ana".into()),
            ordering: Some("-nome".into()),
            window: Some(Window { limit: 10, offset: 20 }),
        };
        let sql = SPEC
            .select_query(&params, Some(Scope { column: "curso", value: 3 }))
            .into_sql();
        assert_eq!(
            sql,
            "SELECT id, nome FROM estudantes WHERE curso = ? AND \
             (nome LIKE ? ESCAPE '\\' OR cpf LIKE ? ESCAPE '\\') \
             ORDER BY nome DESC, id ASC LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn count_sql_ignores_order_and_window() {
        let params = ListParams {
            ordering: Some("nome".into()),
            window: Some(Window { limit: 1, offset: 0 }),
            ..Default::default()
        };
        assert_eq!(
            SPEC.count_query(&params, None).into_sql(),
            "SELECT COUNT(*) FROM estudantes"
        );
    }
}
