/*!
  Lexical building blocks shared by the operand parser and the program loader, written with
  `nom` combinators. Each parser takes and returns `&str` and uses nom's default error type.

  Numeric literals take an optional sign and are decimal, `0x` hexadecimal, or `0b` binary.
  Character literals are single-quoted and may use the escapes `\n \t \r \0 \\ \' \"`.
*/

use std::str::FromStr;

use nom::{
  IResult,
  branch::alt,
  bytes::complete::{is_a, is_not, tag, tag_no_case, take_while1},
  character::complete::{
    alpha1,
    alphanumeric1,
    anychar,
    char as one_char,
    digit1,
    hex_digit1,
    none_of,
    space0,
  },
  combinator::{map, map_res, opt, recognize},
  multi::{many0, many1, separated_list},
  sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::error::{Error, Result};
use crate::register::RegisterName;

/// Label and symbol names: `[A-Za-z_.][A-Za-z0-9_.$]*`.
pub fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(
    pair(
      alt((alpha1, tag("_"), tag("."))),
      many0(alt((alphanumeric1, tag("_"), tag("."), tag("$"))))
    )
  )(input)
}

/// A label definition `name:`, returning the name.
pub fn label_definition(input: &str) -> IResult<&str, &str> {
  terminated(identifier, pair(space0, one_char(':')))(input)
}

/// A directive name after its leading `.`, e.g. `long` in `.long 1, 2`.
pub fn directive_name(input: &str) -> IResult<&str, &str> {
  preceded(one_char('.'), take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'))(input)
}

pub fn number(input: &str) -> IResult<&str, i64> {
  let (input, sign) = opt(alt((one_char('-'), one_char('+'))))(input)?;
  let (input, magnitude) = alt((
    map_res(preceded(tag_no_case("0x"), hex_digit1), |digits: &str| i64::from_str_radix(digits, 16)),
    map_res(preceded(tag_no_case("0b"), is_a("01")),  |digits: &str| i64::from_str_radix(digits, 2)),
    map_res(digit1,                                   |digits: &str| digits.parse::<i64>()),
  ))(input)?;

  match sign {
    Some('-') => Ok((input, -magnitude)),
    _         => Ok((input, magnitude))
  }
}

fn escape(input: &str) -> IResult<&str, char> {
  preceded(
    one_char('\\'),
    map(anychar, |c| match c {
      'n' => '\n',
      't' => '\t',
      'r' => '\r',
      '0' => '\0',
      other => other
    })
  )(input)
}

/// `'c'`, evaluating to the character's code.
pub fn char_literal(input: &str) -> IResult<&str, i64> {
  map(
    delimited(one_char('\''), alt((escape, none_of("\\'"))), one_char('\'')),
    |c: char| c as i64
  )(input)
}

/// `"..."`, evaluating to its UTF-8 bytes with escapes applied.
pub fn string_literal(input: &str) -> IResult<&str, Vec<u8>> {
  map(
    delimited(one_char('"'), many0(alt((escape, none_of("\\\"")))), one_char('"')),
    |chars: Vec<char>| chars.into_iter().collect::<String>().into_bytes()
  )(input)
}

/// `%name`, case-insensitive.
pub fn register(input: &str) -> IResult<&str, RegisterName> {
  map_res(
    preceded(one_char('%'), alphanumeric1),
    |name: &str| RegisterName::from_str(&name.to_ascii_lowercase())
  )(input)
}

// region Raw text scanning

fn quoted_char_text(input: &str) -> IResult<&str, &str> {
  recognize(
    tuple((
      one_char('\''),
      alt((recognize(pair(one_char('\\'), anychar)), recognize(none_of("'")))),
      one_char('\'')
    ))
  )(input)
}

fn quoted_string_text(input: &str) -> IResult<&str, &str> {
  recognize(
    tuple((
      one_char('"'),
      many0(alt((recognize(pair(one_char('\\'), anychar)), is_not("\\\"")))),
      one_char('"')
    ))
  )(input)
}

/// The text of one operand. Commas inside parentheses or quotes do not end it.
fn operand_text(input: &str) -> IResult<&str, &str> {
  recognize(
    many1(alt((
      recognize(delimited(one_char('('), is_not(")"), one_char(')'))),
      quoted_char_text,
      is_not(",('\""),
    )))
  )(input)
}

/// Comma-separated operand texts, trimmed.
pub fn operand_list(input: &str) -> IResult<&str, Vec<&str>> {
  map(
    separated_list(tuple((space0, one_char(','), space0)), operand_text),
    |operands: Vec<&str>| operands.into_iter().map(str::trim).collect()
  )(input)
}

/**
  Removes a `#` or `;` comment from a line. Comment characters inside string or character
  literals do not start a comment.
*/
pub fn strip_comment(line: &str) -> Result<&str> {
  let code: IResult<&str, &str> =
    recognize(many0(alt((quoted_string_text, quoted_char_text, is_not("#;\"'")))))(line);

  match code {
    Ok((rest, code)) if rest.is_empty() || rest.starts_with('#') || rest.starts_with(';') => Ok(code),
    _ => Err(Error::UnterminatedLiteral(line.trim().to_string()))
  }
}

// endregion

/// Narrows a literal to 32 bits. Anything from `i32::MIN` up to `u32::MAX` is accepted, so
/// `0xFFFFFFFF` and `-1` denote the same bit pattern.
pub fn to_word(value: i64) -> Option<i32> {
  match value >= i32::min_value() as i64 && value <= u32::max_value() as i64 {
    true  => Some(value as u32 as i32),
    false => None
  }
}
