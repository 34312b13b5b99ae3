/*!
  Operands in two stages.

  `OperandSyntax` is what an operand token says, decided once when the program is loaded.
  `Operand` is what it denotes at one moment of execution: memory forms with a base or
  index register resolve to a different address whenever those registers change, so a
  token is resolved afresh each time its instruction executes.

  | Token                  | Syntax                         |
  |------------------------|--------------------------------|
  | `$42` `$0x2A` `$'*'`   | `Immediate`                    |
  | `$msg`                 | `AddressOf` a data label       |
  | `%eax`                 | `Register`                     |
  | `msg`                  | `Direct` memory at a label     |
  | `-4(%ebp,%ecx,4)`      | `Indirect` memory              |
  | `table(,%ecx,4)`       | `Indirect` with a label offset |
*/

use std::fmt::{Display, Formatter};

use nom::{
  IResult,
  branch::alt,
  character::complete::{char as one_char, one_of, space0},
  combinator::{all_consuming, map, map_res, opt},
  error::ErrorKind,
  sequence::{pair, preceded, tuple},
};
use string_cache::DefaultAtom;

use crate::error::{Error, Result};
use crate::instruction::Width;
use crate::machine::Machine;
use crate::memory::Address;
use crate::register::RegisterName;
use crate::token::{char_literal, identifier, number, register, to_word};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Displacement {
  Number(i32),
  Label(DefaultAtom),
}

/// `displacement(base, index, scale)` with every part optional except the parentheses.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MemoryRef {
  pub displacement : Displacement,
  pub base         : Option<RegisterName>,
  pub index        : Option<RegisterName>,
  pub scale        : u8,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum OperandSyntax {
  Immediate(i32),
  AddressOf(DefaultAtom),
  Register(RegisterName),
  Direct(DefaultAtom),
  Indirect(MemoryRef),
}

/// A resolved operand. Memory addresses have already been checked against the memory size.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operand {
  Register(RegisterName),
  Immediate(i32),
  Memory {
    address : Address,
    width   : Width
  },
}

// region Parsing

fn word(input: &str) -> IResult<&str, i32> {
  map_res(alt((number, char_literal)), |value: i64| to_word(value).ok_or(()))(input)
}

fn immediate(input: &str) -> IResult<&str, OperandSyntax> {
  preceded(
    one_char('$'),
    alt((
      map(word,       OperandSyntax::Immediate),
      map(identifier, |name: &str| OperandSyntax::AddressOf(DefaultAtom::from(name))),
    ))
  )(input)
}

fn displacement(input: &str) -> IResult<&str, Displacement> {
  alt((
    map(word,       Displacement::Number),
    map(identifier, |name: &str| Displacement::Label(DefaultAtom::from(name))),
  ))(input)
}

fn scale(input: &str) -> IResult<&str, u8> {
  map(one_of("1248"), |digit: char| match digit {
    '2' => 2,
    '4' => 4,
    '8' => 8,
    _   => 1
  })(input)
}

fn comma(input: &str) -> IResult<&str, char> {
  preceded(space0, one_char(','))(input)
}

fn indirect(input: &str) -> IResult<&str, MemoryRef> {
  let (input, displacement) = opt(displacement)(input)?;
  let (input, _)            = pair(one_char('('), space0)(input)?;
  let (input, base)         = opt(register)(input)?;
  let (input, index)        = opt(
    preceded(
      pair(comma, space0),
      pair(register, opt(preceded(tuple((comma, space0)), scale)))
    )
  )(input)?;
  let (input, _)            = pair(space0, one_char(')'))(input)?;

  if base.is_none() && index.is_none() {
    return Err(nom::Err::Error((input, ErrorKind::Verify)));
  }

  let memory_ref = MemoryRef {
    displacement : displacement.unwrap_or(Displacement::Number(0)),
    base,
    index        : index.map(|(register, _)| register),
    scale        : index.and_then(|(_, scale)| scale).unwrap_or(1),
  };
  Ok((input, memory_ref))
}

fn operand(input: &str) -> IResult<&str, OperandSyntax> {
  alt((
    immediate,
    map(register,   OperandSyntax::Register),
    map(indirect,   OperandSyntax::Indirect),
    map(identifier, |name: &str| OperandSyntax::Direct(DefaultAtom::from(name))),
  ))(input)
}

/// Parses one operand token, such as `$10`, `%al`, or `8(%ebx,%esi,4)`.
pub fn parse_operand(token: &str) -> Result<OperandSyntax> {
  let token = token.trim();
  match all_consuming(operand)(token) {
    Ok((_, syntax))                                  => Ok(syntax),
    Err(_) if token.starts_with('%')                 => Err(Error::UnknownRegister(token.to_string())),
    Err(_) if token.starts_with('$') && token.len() > 1
              && !token[1..].starts_with(|c: char| c.is_alphabetic() || c == '_' || c == '.')
                                                     => Err(Error::MalformedLiteral(token.to_string())),
    Err(_)                                           => Err(Error::MalformedOperand(token.to_string())),
  }
}

// endregion

impl OperandSyntax {

  /// Whether the operand's value is fully known from the simulated machine alone. `$label`
  /// counts, and folds to the label's address in simulated memory.
  pub fn is_concrete(&self) -> bool {
    match self {
      | OperandSyntax::Immediate(_)
      | OperandSyntax::Register(_)
      | OperandSyntax::AddressOf(_) => true,
      _                             => false
    }
  }

  /**
    The effective address of a memory form, computed from the current registers as
    `displacement + base + index * scale`. It is not checked against the memory size, as
    `lea` uses it for plain arithmetic.
  */
  pub fn effective_address(&self, machine: &Machine) -> Result<i64> {
    match self {

      OperandSyntax::Direct(name) => Ok(machine.symbols.address_of(name)? as i64),

      OperandSyntax::Indirect(memory_ref) => {
        let displacement = match &memory_ref.displacement {
          Displacement::Number(offset) => *offset as i64,
          Displacement::Label(name)    => machine.symbols.address_of(name)? as i64,
        };
        let base  = memory_ref.base .map_or(0, |r| machine.registers.read(r) as i64);
        let index = memory_ref.index.map_or(0, |r| machine.registers.read(r) as i64);
        Ok(displacement + base + index * memory_ref.scale as i64)
      }

      other => Err(Error::LeaOperand(other.to_string()))
    }
  }

  /// Resolves the operand against the current machine state for an access of `width` bytes.
  pub fn resolve(&self, machine: &Machine, width: Width) -> Result<Operand> {
    match self {
      OperandSyntax::Immediate(value) => Ok(Operand::Immediate(*value)),
      OperandSyntax::AddressOf(name)  => Ok(Operand::Immediate(machine.symbols.address_of(name)? as i32)),
      OperandSyntax::Register(name)   => Ok(Operand::Register(*name)),
      memory                          => {
        let address = machine.memory.check(memory.effective_address(machine)?, width)?;
        Ok(Operand::Memory{ address, width })
      }
    }
  }
}

impl Display for OperandSyntax {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      OperandSyntax::Immediate(value) => write!(f, "${}", value),
      OperandSyntax::AddressOf(name)  => write!(f, "${}", name),
      OperandSyntax::Register(name)   => write!(f, "%{}", name),
      OperandSyntax::Direct(name)     => write!(f, "{}", name),
      OperandSyntax::Indirect(memory_ref) => {
        match &memory_ref.displacement {
          Displacement::Number(0)      => {},
          Displacement::Number(offset) => write!(f, "{}", offset)?,
          Displacement::Label(name)    => write!(f, "{}", name)?,
        }
        write!(f, "(")?;
        if let Some(base) = memory_ref.base {
          write!(f, "%{}", base)?;
        }
        if let Some(index) = memory_ref.index {
          write!(f, ",%{},{}", index, memory_ref.scale)?;
        }
        write!(f, ")")
      }
    }
  }
}

impl Operand {

  /// Reads the operand. Narrow memory reads are sign-extended; register reads are not.
  pub fn read(&self, machine: &Machine) -> Result<i32> {
    match self {
      Operand::Register(register)       => Ok(machine.registers.read(*register)),
      Operand::Immediate(value)         => Ok(*value),
      Operand::Memory{ address, width } => Ok(width.sign_extend(machine.memory.read(*address, *width)?)),
    }
  }

  pub fn write(&self, machine: &mut Machine, value: i32) -> Result<()> {
    match self {
      Operand::Register(register)       => {
        machine.registers.write(*register, value);
        Ok(())
      }
      Operand::Memory{ address, width } => machine.memory.write(*address, *width, value as u32),
      Operand::Immediate(immediate)     => Err(Error::ImmediateDestination(format!("${}", immediate))),
    }
  }

  pub fn register(&self) -> Option<RegisterName> {
    match self {
      Operand::Register(register) => Some(*register),
      _                           => None
    }
  }
}
