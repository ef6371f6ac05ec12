use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, verify},
    number::complete::recognize_float,
    sequence::{delimited, preceded, terminated},
};
use crate::core::error::{Error, Result};
use crate::core::types::ALL_FIELD;
use crate::query::ast::{BoolQuery, PhraseQuery, PrefixQuery, Query, RangeQuery, WildcardQuery};

/// Query parser for converting query strings to the [`Query`] AST.
///
/// Examples:
/// - `rust programming` -> OR of two terms on the default field
/// - `rust AND programming`, `+rust -java`, `NOT legacy`
/// - `title:rust`, `title:"exact phrase"`
/// - `price:[10 TO 100]`, `price:{10 TO *]`
/// - `rus*` prefix, `r?st*` wildcard, `*:*` everything
///
/// AND binds tighter than OR; adjacent clauses without an operator are OR'ed.
pub struct QueryParser {
    pub default_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Occur {
    Must,
    Should,
    MustNot,
}

struct Clause {
    occur: Occur,
    query: Query,
}

impl Clause {
    fn new(occur: Occur, query: Query) -> Self {
        Clause { occur, query }
    }
}

enum Value<'a> {
    Text(&'a str),
    Phrase(&'a str),
    Range {
        lower: &'a str,
        upper: &'a str,
        include_lower: bool,
        include_upper: bool,
    },
}

impl QueryParser {
    pub fn new() -> Self {
        QueryParser {
            default_field: ALL_FIELD.to_string(),
        }
    }

    /// Syntax errors are reported as `IndexError`
    pub fn parse(&self, input: &str) -> Result<Query> {
        if input.trim().is_empty() {
            return Ok(Query::MatchAll);
        }

        let result = all_consuming(delimited(
            multispace0,
            |i| self.or_expr(i),
            multispace0,
        )).parse(input);

        match result {
            Ok((_, query)) => Ok(query),
            Err(err) => Err(Error::index(format!("invalid query '{}': {}", input, describe(err)))),
        }
    }

    fn or_expr<'a>(&self, input: &'a str) -> IResult<&'a str, Query> {
        let (mut input, first) = self.and_expr(input)?;
        let mut clauses = vec![first];
        loop {
            let next = preceded(
                (multispace0, opt(terminated(alt((keyword("OR"), tag("||"))), multispace0))),
                |i: &'a str| self.and_expr(i),
            ).parse(input);
            match next {
                Ok((rest, clause)) => {
                    clauses.push(clause);
                    input = rest;
                }
                Err(nom::Err::Error(_)) => break,
                Err(err) => return Err(err),
            }
        }
        Ok((input, combine(clauses)))
    }

    fn and_expr<'a>(&self, input: &'a str) -> IResult<&'a str, Clause> {
        let (mut input, first) = self.unary(input)?;
        let mut chain = vec![first];
        loop {
            let next = preceded(
                (multispace0, alt((keyword("AND"), tag("&&"))), multispace0),
                |i: &'a str| self.unary(i),
            ).parse(input);
            match next {
                Ok((rest, clause)) => {
                    chain.push(clause);
                    input = rest;
                }
                Err(nom::Err::Error(_)) => break,
                Err(err) => return Err(err),
            }
        }

        if chain.len() == 1 {
            return Ok((input, chain.remove(0)));
        }

        // Every clause of an AND chain is required unless prohibited
        let mut query = BoolQuery::new();
        for clause in chain {
            match clause.occur {
                Occur::MustNot => query.must_not.push(clause.query),
                Occur::Must | Occur::Should => query.must.push(clause.query),
            }
        }
        Ok((input, Clause::new(Occur::Should, Query::Bool(query))))
    }

    fn unary<'a>(&self, input: &'a str) -> IResult<&'a str, Clause> {
        let (input, _) = multispace0(input)?;
        alt((
            map(
                preceded((keyword("NOT"), multispace0), |i: &'a str| self.unary(i)),
                |clause: Clause| Clause::new(Occur::MustNot, clause.query),
            ),
            map(preceded(char('+'), |i: &'a str| self.primary(i)), |q| Clause::new(Occur::Must, q)),
            map(preceded(char('-'), |i: &'a str| self.primary(i)), |q| Clause::new(Occur::MustNot, q)),
            map(|i: &'a str| self.primary(i), |q| Clause::new(Occur::Should, q)),
        )).parse(input)
    }

    fn primary<'a>(&self, input: &'a str) -> IResult<&'a str, Query> {
        let (input, query) = alt((
            delimited(
                (char('('), multispace0),
                |i: &'a str| self.or_expr(i),
                (multispace0, char(')')),
            ),
            map(tag("*:*"), |_| Query::MatchAll),
            |i: &'a str| self.fielded(i),
            map(|i: &'a str| value(i, false), |v| self.value_query(&self.default_field, v)),
        )).parse(input)?;

        let (input, boost) = opt(preceded(
            char('^'),
            map_res(recognize_float, |s: &str| s.parse::<f32>()),
        )).parse(input)?;

        let query = match boost {
            Some(boost) => query.with_boost(boost),
            None => query,
        };
        Ok((input, query))
    }

    fn fielded<'a>(&self, input: &'a str) -> IResult<&'a str, Query> {
        let (input, field) = terminated(take_while1(is_field_char), char(':')).parse(input)?;
        let (input, v) = value(input, true)?;
        Ok((input, self.value_query(field, v)))
    }

    fn value_query(&self, field: &str, value: Value) -> Query {
        match value {
            Value::Phrase(text) => Query::Phrase(PhraseQuery {
                field: field.to_string(),
                text: text.to_string(),
                boost: None,
            }),
            Value::Range { lower, upper, include_lower, include_upper } => Query::Range(RangeQuery {
                field: field.to_string(),
                lower: open_bound(lower),
                upper: open_bound(upper),
                include_lower,
                include_upper,
                boost: None,
            }),
            Value::Text("*") if field == self.default_field => Query::MatchAll,
            Value::Text(text) => {
                match text.find(['*', '?']) {
                    None => Query::term(field, text),
                    Some(pos) if pos == text.len() - 1 && text.ends_with('*') => Query::Prefix(PrefixQuery {
                        field: field.to_string(),
                        prefix: text[..pos].to_string(),
                        boost: None,
                    }),
                    Some(_) => Query::Wildcard(WildcardQuery {
                        field: field.to_string(),
                        pattern: text.to_string(),
                        boost: None,
                    }),
                }
            }
        }
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

fn value(input: &str, in_field: bool) -> IResult<&str, Value<'_>> {
    alt((
        map(delimited(char('"'), take_while(|c: char| c != '"'), char('"')), Value::Phrase),
        range,
        map(
            verify(
                take_while1(move |c: char| is_term_char(c) || (in_field && c == ':')),
                |s: &str| !is_operator(s),
            ),
            Value::Text,
        ),
    )).parse(input)
}

fn range(input: &str) -> IResult<&str, Value<'_>> {
    let (input, (open, _, lower, _, _, _, upper, _, close)) = (
        one_of("[{"),
        multispace0,
        take_while1(is_bound_char),
        multispace1,
        tag("TO"),
        multispace1,
        take_while1(is_bound_char),
        multispace0,
        one_of("]}"),
    ).parse(input)?;

    Ok((input, Value::Range {
        lower,
        upper,
        include_lower: open == '[',
        include_upper: close == ']',
    }))
}

fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_term_char)))
}

fn combine(mut clauses: Vec<Clause>) -> Query {
    if clauses.len() == 1 && clauses[0].occur == Occur::Should {
        return clauses.remove(0).query;
    }
    let mut query = BoolQuery::new();
    for clause in clauses {
        match clause.occur {
            Occur::Must => query.must.push(clause.query),
            Occur::Should => query.should.push(clause.query),
            Occur::MustNot => query.must_not.push(clause.query),
        }
    }
    Query::Bool(query)
}

fn open_bound(bound: &str) -> Option<String> {
    if bound == "*" {
        None
    } else {
        Some(bound.to_string())
    }
}

fn is_term_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '[' | ']' | '{' | '}' | '^' | ':')
}

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn is_bound_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '[' | ']' | '{' | '}')
}

fn is_operator(s: &str) -> bool {
    matches!(s, "AND" | "OR" | "NOT" | "&&" | "||")
}

fn describe(err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            if e.input.is_empty() {
                "unexpected end of query".to_string()
            } else {
                format!("unexpected input at '{}'", e.input.chars().take(24).collect::<String>())
            }
        }
        nom::Err::Incomplete(_) => "incomplete query".to_string(),
    }
}
