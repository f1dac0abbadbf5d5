//! Value coercion between SQL literal text and typed values

use nom::branch::alt;
use nom::character::complete::{char, digit0, digit1, one_of, satisfy};
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::multi::fold_many0;
use nom::sequence::{delimited, pair, tuple};
use nom::IResult;

use crate::storage::Value;

/// Parse literal text into a value
///
/// - `'...'` and `"..."` become strings; a doubled quote character inside
///   stands for one literal quote
/// - `NULL` (any case) becomes NULL
/// - text that is entirely a number becomes INTEGER when it has no decimal
///   point and fits in 64 bits, REAL otherwise
/// - anything else is kept as opaque text
pub fn parse_literal(text: &str) -> Value {
    let text = text.trim();
    if let Ok((_, s)) = all_consuming(alt((quoted('\''), quoted('"'))))(text) {
        return Value::Text(s);
    }
    if text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Some(number) = parse_number(text) {
        return number;
    }
    Value::Text(text.to_string())
}

/// Parse text that is entirely a number
pub fn parse_number(text: &str) -> Option<Value> {
    let (_, raw) = all_consuming(number)(text).ok()?;
    if !raw.contains('.') {
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Value::Integer(i));
        }
    }
    raw.parse::<f64>().ok().map(Value::Real)
}

/// Render a value as SQL literal text that parses back to the same value
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) if !f.is_finite() => "NULL".to_string(),
        Value::Real(f) => {
            let s = f.to_string();
            if s.contains(|c: char| c == '.' || c == 'e' || c == 'E') {
                s
            } else {
                format!("{}.0", s)
            }
        }
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn quoted<'a>(q: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        delimited(
            char(q),
            fold_many0(
                alt((map(pair(char(q), char(q)), |_| q), satisfy(|c| c != q))),
                String::new,
                |mut acc, c| {
                    acc.push(c);
                    acc
                },
            ),
            char(q),
        )(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_strings() {
        assert_eq!(parse_literal("'hello'"), Value::from("hello"));
        assert_eq!(parse_literal("\"Hello World\""), Value::from("Hello World"));
        assert_eq!(parse_literal("'it''s'"), Value::from("it's"));
        assert_eq!(parse_literal("  'padded'  "), Value::from("padded"));
        assert_eq!(parse_literal("''"), Value::from(""));
        // quoted text stays text even when it looks like a number
        assert_eq!(parse_literal("'42'"), Value::from("42"));
    }

    #[test]
    fn test_null() {
        assert_eq!(parse_literal("NULL"), Value::Null);
        assert_eq!(parse_literal("null"), Value::Null);
        assert_eq!(parse_literal("'null'"), Value::from("null"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_literal("42"), Value::Integer(42));
        assert_eq!(parse_literal("-7"), Value::Integer(-7));
        assert_eq!(parse_literal("3.25"), Value::Real(3.25));
        assert_eq!(parse_literal("2.0"), Value::Real(2.0));
        assert_eq!(parse_literal(".5"), Value::Real(0.5));
        assert_eq!(parse_literal("1e3"), Value::Real(1000.0));
        assert_eq!(
            parse_literal("99999999999999999999"),
            Value::Real(99999999999999999999.0)
        );
    }

    #[test]
    fn test_opaque_text() {
        assert_eq!(parse_literal("abc"), Value::from("abc"));
        assert_eq!(parse_literal("12abc"), Value::from("12abc"));
        assert_eq!(parse_literal("'unterminated"), Value::from("'unterminated"));
        assert_eq!(parse_literal("TRUE"), Value::from("TRUE"));
    }

    #[test]
    fn test_format_literal() {
        assert_eq!(format_literal(&Value::Null), "NULL");
        assert_eq!(format_literal(&Value::Integer(5)), "5");
        assert_eq!(format_literal(&Value::Real(2.0)), "2.0");
        assert_eq!(format_literal(&Value::from("O'Brien")), "'O''Brien'");
        assert_eq!(format_literal(&Value::Boolean(true)), "TRUE");
    }

    #[test]
    fn test_format_parses_back() {
        for value in [
            Value::Null,
            Value::Integer(-12),
            Value::Real(1e20),
            Value::Real(0.25),
            Value::from("it's a 'test'"),
        ] {
            assert_eq!(parse_literal(&format_literal(&value)), value);
        }
    }
}
