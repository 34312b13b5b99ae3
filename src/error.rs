//! Errors raised while loading or running a program.

use thiserror::Error;

use crate::instruction::Operation;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {

  // region Load errors

  #[error("unknown register `{0}`")]
  UnknownRegister(String),

  #[error("malformed operand `{0}`")]
  MalformedOperand(String),

  #[error("malformed literal `{0}`")]
  MalformedLiteral(String),

  #[error("cannot parse `{0}`")]
  Syntax(String),

  #[error("unterminated string or character literal in `{0}`")]
  UnterminatedLiteral(String),

  #[error("{operation} takes {expected} operand(s) but was given {given}")]
  WrongArity {
    operation : Operation,
    expected  : usize,
    given     : usize
  },

  #[error("unknown mnemonic `{0}`")]
  UnknownMnemonic(String),

  #[error("`{0}` is not allowed in the {1} section")]
  MisplacedStatement(String, &'static str),

  #[error("label `{0}` is defined more than once")]
  DuplicateLabel(String),

  #[error("labels `{name}` and `{existing}` share the address {address}")]
  LabelCollision {
    name     : String,
    existing : String,
    address  : u32
  },

  #[error("data image of {size} bytes does not fit in {capacity} bytes of memory")]
  ImageTooLarge {
    size     : usize,
    capacity : usize
  },

  // endregion

  // region Execution errors

  #[error("access of {size} byte(s) at address {address} is outside memory [0, {capacity})")]
  OutOfBounds {
    address  : i64,
    size     : u32,
    capacity : usize
  },

  #[error("division by zero")]
  DivisionByZero,

  #[error("quotient {quotient} does not fit in {width} byte(s)")]
  DivideOverflow {
    quotient : u64,
    width    : u8
  },

  #[error("undefined label `{0}`")]
  UnresolvedLabel(String),

  #[error("unknown data label `{0}`")]
  UnknownDataLabel(String),

  #[error("`{0}` cannot be used as a destination")]
  ImmediateDestination(String),

  #[error("lea requires a memory operand, got `{0}`")]
  LeaOperand(String),

  #[error("gave up after executing {0} instructions")]
  StepLimitExceeded(usize),

  // endregion

  #[error("line {line}: {source}")]
  AtLine {
    line   : usize,
    source : Box<Error>
  },

  #[error("{path}: {source}")]
  Io {
    path   : String,
    source : std::io::Error
  },

}

impl Error {
  /// Attaches a source line number. An error that already carries one is left alone.
  pub fn at_line(self, line: usize) -> Error {
    match self {
      Error::AtLine { .. } => self,
      other                => Error::AtLine { line, source: Box::new(other) }
    }
  }
}
