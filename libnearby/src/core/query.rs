//! Building blocks for the SQL queries issued against the location table
use serde::{
    Deserialize, Serialize,
    de::{IntoDeserializer, value},
};
use std::{cmp::Ordering, ops::Deref, str::FromStr, sync::Arc};

pub mod filter {
    use super::DynFilterPart;

    /// How the conditions of a [CompoundFilter] are joined
    #[derive(Clone, Debug)]
    pub enum Op {
        Or,
        And,
    }

    /// Collects filter conditions that are joined by a single [Op]
    #[derive(Clone)]
    pub struct CompoundFilterBuilder {
        top: CompoundFilter,
    }

    /// Start a filter whose conditions must all hold
    pub fn and() -> CompoundFilterBuilder {
        CompoundFilterBuilder::new(Op::And)
    }

    /// Start a filter where any one condition is enough
    pub fn or() -> CompoundFilterBuilder {
        CompoundFilterBuilder::new(Op::Or)
    }

    impl CompoundFilterBuilder {
        pub fn new(op: Op) -> Self {
            Self {
                top: CompoundFilter::new(op),
            }
        }

        pub fn push<F: Into<DynFilterPart>>(mut self, filter: F) -> Self {
            self.top.add_filter(filter.into());
            self
        }

        pub fn build(self) -> DynFilterPart {
            self.top.into()
        }
    }

    /// Anything that can render itself as (part of) a `WHERE` clause
    pub trait FilterPart: Send {
        /// Append this condition to `builder`, binding its values as parameters
        fn add_to_query(&self, builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>);
    }

    /// Conditions joined by one operator. Compound filters nest, so an `OR`
    /// group can be one condition of an `AND` group.
    #[derive(Clone)]
    pub struct CompoundFilter {
        conditions: Vec<DynFilterPart>,
        op: Op,
    }

    impl CompoundFilter {
        pub fn new(op: Op) -> Self {
            Self {
                conditions: Vec::new(),
                op,
            }
        }

        pub fn add_filter(&mut self, filter: DynFilterPart) {
            self.conditions.push(filter);
        }
    }

    impl FilterPart for CompoundFilter {
        fn add_to_query(&self, builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>) {
            if self.conditions.is_empty() {
                builder.push("TRUE");
                return;
            }
            let separator = match self.op {
                Op::And => " AND ",
                Op::Or => " OR ",
            };
            builder.push(" (");
            for (i, cond) in self.conditions.iter().enumerate() {
                if i > 0 {
                    builder.push(separator);
                }
                cond.add_to_query(builder);
            }
            builder.push(")");
        }
    }

    /// The comparison applied between a column and a bound value
    #[derive(Clone, Debug, PartialEq)]
    pub enum Cmp {
        Equal,
        /// Case-insensitive substring match. The value is matched literally,
        /// see [super::contains_pattern()]
        Like,
    }

    impl std::fmt::Display for Cmp {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            match self {
                Cmp::Equal => write!(f, " IS "),
                Cmp::Like => write!(f, " LIKE "),
            }
        }
    }
}

/// The escape character used in `LIKE ... ESCAPE` clauses built from [contains_pattern()]
pub const LIKE_ESCAPE: char = '\\';

/// Turn a user-supplied fragment into a `LIKE` pattern that matches any value
/// containing the fragment literally. Wildcards in the fragment are escaped
/// with [LIKE_ESCAPE].
pub fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// How many rows a query returns, and how many it skips first
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct LimitSpec {
    pub count: u32,
    pub offset: Option<u64>,
}

impl From<u32> for LimitSpec {
    fn from(count: u32) -> Self {
        LimitSpec {
            count,
            offset: None,
        }
    }
}

impl ToSql for LimitSpec {
    fn to_sql(&self) -> String {
        match self.offset {
            None => format!("LIMIT {}", self.count),
            Some(offset) => format!("LIMIT {} OFFSET {offset}", self.count),
        }
    }
}

/// Sort direction, written `asc` or `desc` by callers
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    #[default]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    /// Apply this direction to an ordering that was computed in ascending order
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Deserialize::deserialize(s.into_deserializer())
    }
}

impl ToSql for SortOrder {
    fn to_sql(&self) -> String {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
        .into()
    }
}

/// Types that have a literal SQL rendering
pub trait ToSql {
    fn to_sql(&self) -> String;
}

/// One `ORDER BY` key
#[derive(Clone, Debug, PartialEq)]
pub struct SortSpec<T: ToSql> {
    pub field: T,
    pub order: SortOrder,
}

impl<T: ToSql> ToSql for SortSpec<T> {
    fn to_sql(&self) -> String {
        format!("{} {}", self.field.to_sql(), self.order.to_sql())
    }
}

impl<T: ToSql> SortSpec<T> {
    pub fn new(field: T, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// A complete `ORDER BY` clause, most significant key first
pub struct SortSpecs<T: ToSql>(pub Vec<SortSpec<T>>);

impl<T: ToSql> ToSql for SortSpecs<T> {
    fn to_sql(&self) -> String {
        let keys: Vec<String> = self.0.iter().map(ToSql::to_sql).collect();
        format!("ORDER BY {}", keys.join(", "))
    }
}

/// A shareable, type-erased [filter::FilterPart]
#[derive(Clone)]
pub struct DynFilterPart(Arc<dyn filter::FilterPart + Sync>);

impl Deref for DynFilterPart {
    type Target = Arc<dyn filter::FilterPart + Sync>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<F> From<F> for DynFilterPart
where
    F: filter::FilterPart + Send + Sync + 'static,
{
    fn from(value: F) -> Self {
        DynFilterPart(Arc::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::filter::{Cmp, CompoundFilter, FilterPart, Op, and, or};
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Col(&'static str);

    impl ToSql for Col {
        fn to_sql(&self) -> String {
            self.0.to_string()
        }
    }

    // renders `column IS ?` with the value bound
    struct Equals(&'static str, i64);

    impl FilterPart for Equals {
        fn add_to_query(&self, builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>) {
            builder.push(self.0).push(Cmp::Equal).push_bind(self.1);
        }
    }

    fn render(filter: &dyn FilterPart) -> String {
        let mut qb = sqlx::QueryBuilder::new("WHERE");
        filter.add_to_query(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_limit() {
        assert_eq!(LimitSpec::from(25).to_sql(), "LIMIT 25");
        let page = LimitSpec {
            count: 10,
            offset: Some(40),
        };
        assert_eq!(page.to_sql(), "LIMIT 10 OFFSET 40");
    }

    #[test]
    fn test_sort_order() {
        assert_eq!(SortOrder::default(), SortOrder::Ascending);
        assert_eq!(SortOrder::from_str("asc").unwrap(), SortOrder::Ascending);
        assert_eq!(SortOrder::from_str("desc").unwrap(), SortOrder::Descending);
        assert!(SortOrder::from_str("down").is_err());
        assert_eq!(SortOrder::Descending.to_sql(), "DESC");
        assert_eq!(SortOrder::Ascending.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortOrder::Descending.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(SortOrder::Descending.apply(Ordering::Equal), Ordering::Equal);
    }

    #[test]
    fn test_order_by() {
        let specs = SortSpecs(vec![
            SortSpec::new(Col("L.created_at"), SortOrder::Descending),
            SortSpec::new(Col("L.id"), SortOrder::Ascending),
        ]);
        assert_eq!(specs.to_sql(), "ORDER BY L.created_at DESC, L.id ASC");
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("coffee"), "%coffee%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("c:\\x"), "%c:\\\\x%");
        assert_eq!(contains_pattern(""), "%%");
    }

    #[test]
    fn test_empty_compound_matches_everything() {
        assert_eq!(render(&CompoundFilter::new(Op::Or)), "WHERETRUE");
    }

    #[test]
    fn test_nested_compound_filters() {
        let either = or().push(Equals("a", 1)).push(Equals("b", 2)).build();
        let both = and().push(Equals("id", 3)).push(either).build();
        assert_eq!(
            render(&**both),
            "WHERE (id IS ? AND  (a IS ? OR b IS ?))"
        );
    }
}
