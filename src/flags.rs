//! Condition flags produced by `cmp`/`test` and consumed by conditional jumps.

use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumString};

/**
  The flags are independent booleans rather than bits of an EFLAGS word. The signed
  relations (`less` … `greater`) and the unsigned ones (`above`, `above_or_equal`) are all
  computed from the same pair of operands by `compare`.
*/
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug)]
pub struct Flags {
  pub less             : bool,
  pub less_or_equal    : bool,
  pub equal            : bool,
  pub greater_or_equal : bool,
  pub greater          : bool,
  pub above            : bool,
  pub above_or_equal   : bool,
  pub zero             : bool,
}

/// What a conditional jump asks of the flags.
#[derive(StrumDisplay, EnumString, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Condition {
  #[strum(serialize = "l")]  Less,
  #[strum(serialize = "le")] LessOrEqual,
  #[strum(serialize = "e")]  Equal,
  #[strum(serialize = "ge")] GreaterOrEqual,
  #[strum(serialize = "g")]  Greater,
  #[strum(serialize = "a")]  Above,
  #[strum(serialize = "ae")] AboveOrEqual,
  #[strum(serialize = "ne")] NotEqual,
  #[strum(serialize = "z")]  Zero,
  #[strum(serialize = "nz")] NotZero,
}

impl Flags {

  pub fn clear(&mut self) {
    *self = Flags::default();
  }

  /// `cmp source, destination`: relates the destination to the source.
  pub fn compare(&mut self, destination: i32, source: i32) {
    self.less             = destination <  source;
    self.less_or_equal    = destination <= source;
    self.equal            = destination == source;
    self.greater_or_equal = destination >= source;
    self.greater          = destination >  source;
    self.above            = (destination as u32) >  (source as u32);
    self.above_or_equal   = (destination as u32) >= (source as u32);
    self.zero             = self.equal;
  }

  /// `test source, destination`: Equal and Zero are set iff the operands share no bits.
  pub fn test(&mut self, destination: i32, source: i32) {
    self.set_zero(destination & source);
  }

  pub fn set_zero(&mut self, result: i32) {
    self.equal = result == 0;
    self.zero  = result == 0;
  }

  pub fn holds(&self, condition: Condition) -> bool {
    match condition {
      Condition::Less           => self.less,
      Condition::LessOrEqual    => self.less_or_equal,
      Condition::Equal          => self.equal,
      Condition::GreaterOrEqual => self.greater_or_equal,
      Condition::Greater        => self.greater,
      Condition::Above          => self.above,
      Condition::AboveOrEqual   => self.above_or_equal,
      Condition::NotEqual       => !self.equal,
      Condition::Zero           => self.zero,
      Condition::NotZero        => !self.zero,
    }
  }
}

impl Display for Flags {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let set: Vec<String> =
      [
        (Condition::Less,           self.less),
        (Condition::LessOrEqual,    self.less_or_equal),
        (Condition::Equal,          self.equal),
        (Condition::GreaterOrEqual, self.greater_or_equal),
        (Condition::Greater,        self.greater),
        (Condition::Above,          self.above),
        (Condition::AboveOrEqual,   self.above_or_equal),
        (Condition::Zero,           self.zero),
      ]
        .iter()
        .filter(|(_, on)| *on)
        .map(|(condition, _)| condition.to_string().to_uppercase())
        .collect();

    match set.is_empty() {
      true  => write!(f, "-"),
      false => write!(f, "{}", set.join(" "))
    }
  }
}
