/*!
  Data directives, encoded into the bytes they contribute to the initial memory image.

  | Directive              | Element | Arguments                               |
  |------------------------|---------|-----------------------------------------|
  | `.byte`                | 1       | numbers or character literals           |
  | `.word` `.short`       | 2       | numbers or character literals           |
  | `.long` `.int`         | 4       | numbers or character literals           |
  | `.ascii`               | 1       | string literals                         |
  | `.asciz` `.string`     | 1       | string literals, each terminated        |
  | `.space` `.skip`       | 1       | `count[, value]`                        |
  | `.fill`                | size    | `repeat[, size[, value]]`               |

  Numbers in a list are separated by commas or by whitespace.
*/

use std::convert::TryFrom;

use nom::{
  IResult,
  branch::alt,
  character::complete::{char as one_char, space0, space1},
  combinator::{all_consuming, recognize},
  multi::separated_nonempty_list,
  sequence::tuple,
};

use crate::error::{Error, Result};
use crate::instruction::Width;
use crate::token::{char_literal, number, string_literal};

/// The bytes a directive contributes, and the element width its label takes on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Data {
  pub width : Width,
  pub bytes : Vec<u8>,
}

pub fn is_data_directive(name: &str) -> bool {
  match name {
    | "byte"  | "word"  | "short" | "long"   | "int"
    | "ascii" | "asciz" | "string"
    | "space" | "skip"  | "fill" => true,
    _                            => false
  }
}

// region Argument lists

fn comma(input: &str) -> IResult<&str, &str> {
  recognize(tuple((space0, one_char(','), space0)))(input)
}

fn value(input: &str) -> IResult<&str, i64> {
  alt((number, char_literal))(input)
}

fn values(input: &str) -> IResult<&str, Vec<i64>> {
  separated_nonempty_list(alt((comma, space1)), value)(input)
}

fn strings(input: &str) -> IResult<&str, Vec<Vec<u8>>> {
  separated_nonempty_list(comma, string_literal)(input)
}

fn parse_values(arguments: &str) -> Result<Vec<i64>> {
  all_consuming(values)(arguments)
    .map(|(_, values)| values)
    .map_err(|_| Error::MalformedLiteral(arguments.to_string()))
}

fn parse_strings(arguments: &str) -> Result<Vec<Vec<u8>>> {
  all_consuming(strings)(arguments)
    .map(|(_, strings)| strings)
    .map_err(|_| Error::MalformedLiteral(arguments.to_string()))
}

// endregion

/// Whether `value` is representable in `width` bytes, read as either signed or unsigned.
fn fits(value: i64, width: Width) -> bool {
  let bits = width.bits() as i64;
  value >= -(1i64 << (bits - 1)) && value < (1i64 << bits)
}

fn little_endian(value: i64, width: Width, bytes: &mut Vec<u8>) {
  for i in 0..width.bytes() {
    bytes.push((value >> (8 * i)) as u8);
  }
}

/// Checks that `size` more bytes fit after the `used` bytes already in the image.
fn reserve(used: usize, size: i64, capacity: usize) -> Result<()> {
  match (used as i64).checked_add(size) {
    Some(total) if total <= capacity as i64 => Ok(()),
    _ => Err(Error::ImageTooLarge{ size: used.saturating_add(size as usize), capacity })
  }
}

fn elements(arguments: &str, width: Width) -> Result<Data> {
  let mut bytes = Vec::new();
  for value in parse_values(arguments)? {
    if !fits(value, width) {
      return Err(Error::MalformedLiteral(value.to_string()));
    }
    little_endian(value, width, &mut bytes);
  }
  Ok(Data{ width, bytes })
}

/**
  Encodes the directive `.name arguments`. The image already holds `used` bytes, and may
  not grow beyond `capacity`; the check happens before anything is allocated so that
  `.space 99999999999` fails cleanly.
*/
pub fn encode(name: &str, arguments: &str, terminator: u8, used: usize, capacity: usize) -> Result<Data> {
  let arguments = arguments.trim();

  match name {

    "byte"                    => elements(arguments, Width::Byte),
    "word"  | "short"         => elements(arguments, Width::Word),
    "long"  | "int"           => elements(arguments, Width::Long),

    "ascii"                   => Ok(Data{ width: Width::Byte, bytes: parse_strings(arguments)?.concat() }),

    "asciz" | "string"        => {
      let mut bytes = Vec::new();
      for string in parse_strings(arguments)? {
        bytes.extend(string);
        bytes.push(terminator);
      }
      Ok(Data{ width: Width::Byte, bytes })
    }

    "space" | "skip"          => {
      let (count, fill) = match parse_values(arguments)?.as_slice() {
        [count]                                     => (*count, 0),
        [count, fill] if fits(*fill, Width::Byte)   => (*count, *fill),
        _                                           => return Err(Error::MalformedLiteral(arguments.to_string()))
      };
      if count < 0 {
        return Err(Error::MalformedLiteral(arguments.to_string()));
      }
      reserve(used, count, capacity)?;
      Ok(Data{ width: Width::Byte, bytes: vec![fill as u8; count as usize] })
    }

    "fill"                    => {
      let (repeat, size, value) = match parse_values(arguments)?.as_slice() {
        [repeat]              => (*repeat, 1, 0),
        [repeat, size]        => (*repeat, *size, 0),
        [repeat, size, value] => (*repeat, *size, *value),
        _                     => return Err(Error::MalformedLiteral(arguments.to_string()))
      };
      let width = match size {
        1..=4 => Width::try_from(size as u8).map_err(|_| Error::MalformedLiteral(arguments.to_string()))?,
        _     => return Err(Error::MalformedLiteral(arguments.to_string()))
      };
      if repeat < 0 {
        return Err(Error::MalformedLiteral(arguments.to_string()));
      }
      let size = repeat.saturating_mul(width.bytes() as i64);
      reserve(used, size, capacity)?;

      let mut bytes = Vec::with_capacity(size as usize);
      for _ in 0..repeat {
        little_endian(value, width, &mut bytes);
      }
      Ok(Data{ width, bytes })
    }

    other                     => Err(Error::Syntax(format!(".{} {}", other, arguments)))
  }
}
