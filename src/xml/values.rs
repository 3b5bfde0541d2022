//! Literal grammar for attribute values written in text XML and for identifiers.

use crate::xml::CompiledItem;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while, take_while1};
use nom::character::complete::{char, digit1, satisfy};
use nom::combinator::{all_consuming, map, map_res, opt, recognize};
use nom::sequence::{pair, preceded};
use nom::{IResult, Parser};
use num_traits::Num;

fn radix_number<'a, T>(radix: u32) -> impl FnMut(&'a str) -> IResult<&'a str, T>
where
    T: Num,
{
    move |input: &'a str| {
        map_res(take_while1(move |c: char| c.is_digit(radix)), |digits: &str| {
            T::from_str_radix(digits, radix)
        })
        .parse(input)
    }
}

fn signed_decimal(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), |text: &str| {
        i32::from_str_radix(text, 10)
    })
    .parse(input)
}

fn hex_literal(input: &str) -> IResult<&str, u32> {
    preceded(tag_no_case("0x"), radix_number::<u32>(16)).parse(input)
}

fn reference_literal(input: &str) -> IResult<&str, u32> {
    preceded(char('@'), hex_literal).parse(input)
}

fn compiled_literal(input: &str) -> IResult<&str, CompiledItem> {
    alt((
        map(tag("true"), |_| CompiledItem::Boolean(true)),
        map(tag("false"), |_| CompiledItem::Boolean(false)),
        map(reference_literal, |id| CompiledItem::Reference { id, name: None }),
        map(hex_literal, CompiledItem::HexInt),
        map(signed_decimal, CompiledItem::DecimalInt),
    ))
    .parse(input)
}

/// Infers the compiled form of a text attribute value. Anything that is not a
/// boolean, number or `@0x...` reference stays a raw string (`None`).
pub(crate) fn parse_compiled_literal(text: &str) -> Option<CompiledItem> {
    all_consuming(compiled_literal)
        .parse(text.trim())
        .ok()
        .map(|(_, item)| item)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// True when `text` matches `[A-Za-z][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(text: &str) -> bool {
    all_consuming(identifier).parse(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(parse_compiled_literal("true"), Some(CompiledItem::Boolean(true)));
        assert_eq!(parse_compiled_literal("21"), Some(CompiledItem::DecimalInt(21)));
        assert_eq!(parse_compiled_literal("-3"), Some(CompiledItem::DecimalInt(-3)));
        assert_eq!(parse_compiled_literal("0x1F"), Some(CompiledItem::HexInt(0x1f)));
        assert_eq!(
            parse_compiled_literal("@0x7f010000"),
            Some(CompiledItem::Reference { id: 0x7f01_0000, name: None })
        );
        assert_eq!(parse_compiled_literal("com.example"), None);
        assert_eq!(parse_compiled_literal("@string/app_name"), None);
        assert_eq!(parse_compiled_literal("99999999999"), None);
        assert_eq!(parse_compiled_literal("12abc"), None);
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("group_1"));
        assert!(is_identifier("G"));
        assert!(!is_identifier("1group"));
        assert!(!is_identifier("_group"));
        assert!(!is_identifier("group-1"));
        assert!(!is_identifier(""));
    }
}
