/*!
  Decoded instructions. An instruction is a mnemonic, an operand width, and a list of
  unresolved operands, together with the text it was decoded from. Instructions are
  immutable once decoded; only the machine changes while a program runs.

  Mnemonics carry an optional AT&T size suffix (`movb`, `addw`, `subl`). The suffix
  determines the width of memory accesses and of the `mul`/`div` accumulator pair.
  An unsuffixed mnemonic is a long (4 byte) operation.
*/

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::flags::Condition;
use crate::operand::OperandSyntax;

/// The width of an operation in bytes.
#[derive(
  TryFromPrimitive, IntoPrimitive,
  Clone,            Copy,         Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum Width {
  Byte = 1,
  Word = 2,
  Long = 4,
}

impl Width {
  pub fn bytes(self) -> u32 {
    u8::from(self) as u32
  }

  pub fn bits(self) -> u32 {
    self.bytes() * 8
  }

  pub fn mask(self) -> u32 {
    match self {
      Width::Byte => 0xFF,
      Width::Word => 0xFFFF,
      Width::Long => 0xFFFF_FFFF,
    }
  }

  /// Sign-extends the low `self.bits()` bits of `raw` to the native `i32`.
  pub fn sign_extend(self, raw: u32) -> i32 {
    match self {
      Width::Byte => raw as u8  as i8  as i32,
      Width::Word => raw as u16 as i16 as i32,
      Width::Long => raw as i32,
    }
  }

  pub fn from_suffix(suffix: char) -> Option<Width> {
    match suffix {
      'b' => Some(Width::Byte),
      'w' => Some(Width::Word),
      'l' => Some(Width::Long),
      _   => None
    }
  }

  pub fn suffix(self) -> char {
    match self {
      Width::Byte => 'b',
      Width::Word => 'w',
      Width::Long => 'l',
    }
  }
}

impl Display for Width {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.bytes())
  }
}

/**
  Mnemonics understood by the engine.

  The order is not significant. `Operation::decode` accepts the size-suffixed forms of the
  data operations; control flow mnemonics never take a suffix, which keeps `jl` and `call`
  from being read as `j`/`cal` with a long suffix.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString,
  Clone,        Copy,          Eq, PartialEq, Debug, Hash
)]
pub enum Operation {
  // Data movement and arithmetic //
  #[strum(serialize = "mov")]  Mov,
  #[strum(serialize = "add")]  Add,
  #[strum(serialize = "sub")]  Sub,
  #[strum(serialize = "mul")]  Mul,
  #[strum(serialize = "div")]  Div,
  #[strum(serialize = "or")]   Or,
  #[strum(serialize = "xor")]  Xor,
  #[strum(serialize = "and")]  And,
  #[strum(serialize = "inc")]  Inc,
  #[strum(serialize = "dec")]  Dec,
  #[strum(serialize = "shl")]  Shl,
  #[strum(serialize = "shr")]  Shr,
  #[strum(serialize = "sar")]  Sar,
  #[strum(serialize = "lea")]  Lea,
  #[strum(serialize = "push")] Push,
  #[strum(serialize = "pop")]  Pop,

  // Flag producers //
  #[strum(serialize = "test")] Test,
  #[strum(serialize = "cmp")]  Cmp,

  // Control flow //
  #[strum(serialize = "jmp")]  Jmp,
  #[strum(serialize = "jl")]   Jl,
  #[strum(serialize = "jle")]  Jle,
  #[strum(serialize = "je")]   Je,
  #[strum(serialize = "jge")]  Jge,
  #[strum(serialize = "jg")]   Jg,
  #[strum(serialize = "ja")]   Ja,
  #[strum(serialize = "jae")]  Jae,
  #[strum(serialize = "jne")]  Jne,
  #[strum(serialize = "jz")]   Jz,
  #[strum(serialize = "jnz")]  Jnz,
  #[strum(serialize = "loop")] Loop,
  #[strum(serialize = "call")] Call,
  #[strum(serialize = "ret")]  Ret,

  // Passed through to the assembler //
  #[strum(serialize = "int")]  Int,
}

impl Operation {

  /**
    Splits a mnemonic into an operation and the width given by its suffix, if any. The
    exact mnemonic is tried first, so `shl` is a shift and not `sh` with a long suffix.
  */
  pub fn decode(mnemonic: &str) -> Option<(Operation, Option<Width>)> {
    let mnemonic = mnemonic.to_ascii_lowercase();
    if let Ok(operation) = Operation::from_str(&mnemonic) {
      return Some((operation, None));
    }

    let suffix = mnemonic.chars().last()?;
    let width  = Width::from_suffix(suffix)?;
    let stem   = &mnemonic[..mnemonic.len() - suffix.len_utf8()];
    match Operation::from_str(stem) {
      Ok(operation) if operation.accepts_suffix() => Some((operation, Some(width))),
      _                                           => None
    }
  }

  pub fn arity(&self) -> usize {
    match self {
      | Operation::Ret => 0,

      | Operation::Mul  | Operation::Div
      | Operation::Inc  | Operation::Dec
      | Operation::Push | Operation::Pop
      | Operation::Int  | Operation::Loop
      | Operation::Call => 1,

      operation if operation.is_jump() => 1,

      _ => 2
    }
  }

  pub fn is_jump(&self) -> bool {
    *self == Operation::Jmp || self.condition().is_some()
  }

  pub fn is_control_flow(&self) -> bool {
    match self {
      Operation::Loop | Operation::Call | Operation::Ret => true,
      operation                                         => operation.is_jump()
    }
  }

  /// `cmp` and `test` recompute every flag. (`inc` and `dec` only touch Equal/Zero.)
  pub fn produces_flags(&self) -> bool {
    *self == Operation::Cmp || *self == Operation::Test
  }

  /// Whether flags are wiped before this operation runs when flags are not preserved.
  pub fn clears_flags(&self) -> bool {
    !(self.is_control_flow() || *self == Operation::Int)
  }

  pub fn accepts_suffix(&self) -> bool {
    !(self.is_control_flow() || *self == Operation::Int)
  }

  /// The flag condition tested by a conditional jump.
  pub fn condition(&self) -> Option<Condition> {
    match self {
      Operation::Jl  => Some(Condition::Less),
      Operation::Jle => Some(Condition::LessOrEqual),
      Operation::Je  => Some(Condition::Equal),
      Operation::Jge => Some(Condition::GreaterOrEqual),
      Operation::Jg  => Some(Condition::Greater),
      Operation::Ja  => Some(Condition::Above),
      Operation::Jae => Some(Condition::AboveOrEqual),
      Operation::Jne => Some(Condition::NotEqual),
      Operation::Jz  => Some(Condition::Zero),
      Operation::Jnz => Some(Condition::NotZero),
      _              => None
    }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
  pub operation : Operation,
  pub width     : Width,
  pub operands  : Vec<OperandSyntax>,
  /// The instruction as written, without label or comment.
  pub text      : String,
  pub line      : usize,
}

impl Instruction {
  pub fn source(&self) -> Option<&OperandSyntax> {
    self.operands.first()
  }

  /// In AT&T order the destination is the last operand.
  pub fn destination(&self) -> Option<&OperandSyntax> {
    self.operands.last()
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.text)
  }
}
