//! Search-bar query language.
//!
//! A query starts with `*~*` and is a disjunction of conjunctions of atomic
//! terms. `||` separates OR-clauses, `&&` separates the terms of a clause.
//! A term is a field tag, an operator and a value:
//!
//! | tag    | field  | operators                                |
//! |--------|--------|------------------------------------------|
//! | `*TI*` | title  | `=` `~` `!=` `!~`                        |
//! | `*AR*` | artist | `=` `~` `!=` `!~`                        |
//! | `*AL*` | album  | `=` `~` `!=` `!~`                        |
//! | `*GE*` | genre  | `=` `~` `!=` `!~`                        |
//! | `*TR*` | track  | `=` `~` `!=` `!~` `<` `>` `!<` `!>`      |
//! | `*YE*` | year   | `=` `~` `!=` `!~` `<` `>` `!<` `!>`      |
//!
//! `=` is an exact match, `~` a substring match; `!<` and `!>` mean `>=` and
//! `<=`. For example `*~*AR*~punk && *YE*<2000 || *GE*=Jazz`.
//!
//! Terms that match no tag/operator pair are dropped. Input without the
//! prefix, or with no recognizable term, is not an error: [`Parser::parse`]
//! returns [`Parsed::Plain`] and the caller falls back to a plain substring
//! search.

use std::fmt;

/// Marks the input as an advanced query.
pub const PREFIX: &str = "*~*";
pub const OR_SEPARATOR: &str = "||";
pub const AND_SEPARATOR: &str = "&&";

/// Searchable track fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Artist,
    Album,
    Genre,
    Track,
    Year,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Artist,
        Field::Album,
        Field::Genre,
        Field::Track,
        Field::Year,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Field::Title => "*TI*",
            Field::Artist => "*AR*",
            Field::Album => "*AL*",
            Field::Genre => "*GE*",
            Field::Track => "*TR*",
            Field::Year => "*YE*",
        }
    }

    /// Column the field is matched against, qualified for the track/performer/album join.
    pub fn column(self) -> &'static str {
        match self {
            Field::Title => "rolas.title",
            Field::Artist => "performers.name",
            Field::Album => "albums.name",
            Field::Genre => "rolas.genre",
            Field::Track => "rolas.track",
            Field::Year => "rolas.year",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Track | Field::Year)
    }

    fn operators(self) -> &'static [Operator] {
        if self.is_numeric() {
            &Operator::ALL
        } else {
            &Operator::TEXT
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    Like,
    NotEqual,
    NotLike,
    Less,
    Greater,
    NotLess,
    NotGreater,
}

impl Operator {
    pub const TEXT: [Operator; 4] = [
        Operator::Equal,
        Operator::Like,
        Operator::NotEqual,
        Operator::NotLike,
    ];

    pub const ALL: [Operator; 8] = [
        Operator::Equal,
        Operator::Like,
        Operator::NotEqual,
        Operator::NotLike,
        Operator::Less,
        Operator::Greater,
        Operator::NotLess,
        Operator::NotGreater,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Like => "~",
            Operator::NotEqual => "!=",
            Operator::NotLike => "!~",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::NotLess => "!<",
            Operator::NotGreater => "!>",
        }
    }

    /// SQL predicate with `{}` standing for the column.
    fn template(self) -> &'static str {
        match self {
            Operator::Equal => "{} = ?",
            Operator::Like => r"{} LIKE ? ESCAPE '\'",
            Operator::NotEqual => "NOT {} = ?",
            Operator::NotLike => r"NOT {} LIKE ? ESCAPE '\'",
            Operator::Less => "{} < ?",
            Operator::Greater => "{} > ?",
            Operator::NotLess => "{} >= ?",
            Operator::NotGreater => "{} <= ?",
        }
    }

    pub fn is_substring(self) -> bool {
        matches!(self, Operator::Like | Operator::NotLike)
    }
}

/// A value bound to one `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Text(String),
    Integer(i64),
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bind::Text(s) => write!(f, "{s:?}"),
            Bind::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// One recognized `<tag><operator><value>` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub field: Field,
    pub op: Operator,
    pub value: String,
}

impl Term {
    pub fn predicate(&self) -> String {
        self.op.template().replacen("{}", self.field.column(), 1)
    }

    pub fn bind(&self) -> Bind {
        if self.op.is_substring() {
            return Bind::Text(wildcard(&self.value));
        }
        if self.field.is_numeric()
            && let Ok(n) = self.value.parse::<i64>()
        {
            return Bind::Integer(n);
        }
        Bind::Text(self.value.clone())
    }
}

/// A query in disjunctive normal form: OR of clauses, each an AND of terms.
///
/// Every clause holds at least one term and there is at least one clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Vec<Term>>,
}

impl Query {
    /// Render as a `WHERE` fragment plus binds in placeholder order.
    pub fn to_filter(&self) -> Filter {
        let mut binds = Vec::new();
        let groups: Vec<String> = self
            .clauses
            .iter()
            .map(|clause| {
                let predicates: Vec<String> = clause
                    .iter()
                    .map(|term| {
                        binds.push(term.bind());
                        term.predicate()
                    })
                    .collect();
                format!("({})", predicates.join(" AND "))
            })
            .collect();

        Filter {
            clause: groups.join(" OR "),
            binds,
        }
    }
}

/// Parameterized filter over the track/performer/album join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// `WHERE` fragment with positional `?` placeholders
    pub clause: String,
    /// Values for the placeholders, left to right
    pub binds: Vec<Bind>,
}

/// Outcome of parsing search-bar input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// An advanced query
    Filter(Filter),
    /// Text for a plain substring search
    Plain(String),
}

impl Parsed {
    pub fn is_filter(&self) -> bool {
        matches!(self, Parsed::Filter(_))
    }
}

struct Rule {
    prefix: String,
    field: Field,
    op: Operator,
}

/// Translates search-bar input into a [`Filter`].
///
/// Holds only the immutable rule table, so one instance can be shared freely.
pub struct Parser {
    rules: Vec<Rule>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        let rules = Field::ALL
            .iter()
            .flat_map(|&field| {
                field.operators().iter().map(move |&op| Rule {
                    prefix: format!("{}{}", field.tag(), op.symbol()),
                    field,
                    op,
                })
            })
            .collect();
        Self { rules }
    }

    /// Parse `input` into a filter, or hand back the text for a plain search.
    ///
    /// Input without [`PREFIX`] comes back unchanged. Input with the prefix
    /// but no recognizable term becomes an empty plain search.
    pub fn parse(&self, input: &str) -> Parsed {
        if !input.starts_with(PREFIX) {
            return Parsed::Plain(input.to_string());
        }
        match self.parse_query(input) {
            Some(query) => {
                let filter = query.to_filter();
                tracing::debug!(
                    target: "query",
                    clause = %filter.clause,
                    binds = filter.binds.len(),
                    "Parsed advanced query"
                );
                Parsed::Filter(filter)
            }
            None => {
                tracing::debug!(target: "query", input, "No recognizable terms in query");
                Parsed::Plain(String::new())
            }
        }
    }

    /// Parse into the DNF structure; `None` if nothing was recognized.
    pub fn parse_query(&self, input: &str) -> Option<Query> {
        let body = input.strip_prefix(PREFIX)?;
        let clauses: Vec<Vec<Term>> = body
            .split(OR_SEPARATOR)
            .map(|clause| {
                clause
                    .split(AND_SEPARATOR)
                    .filter_map(|term| self.term(term.trim()))
                    .collect::<Vec<_>>()
            })
            .filter(|terms| !terms.is_empty())
            .collect();

        if clauses.is_empty() {
            None
        } else {
            Some(Query { clauses })
        }
    }

    fn term(&self, text: &str) -> Option<Term> {
        self.rules.iter().find_map(|rule| {
            text.strip_prefix(rule.prefix.as_str()).map(|value| Term {
                field: rule.field,
                op: rule.op,
                value: value.trim().to_string(),
            })
        })
    }
}

/// Escape LIKE metacharacters (escape character `\`) and wrap in `%`.
pub fn wildcard(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
