//! Run-time settings. The command line always runs with `Config::default()`.

use std::path::PathBuf;

use crate::memory::MEMORY_SIZE;

pub const INPUT_DIRECTORY:  &str = "asmFiles";
pub const OUTPUT_DIRECTORY: &str = "asmOut";

/// 10 million instructions.
pub const STEP_LIMIT: usize = 10_000_000;

/**
  When the condition flags are wiped.

  `ClearBeforeInstruction` wipes them before every instruction that is not a jump, `loop`,
  `call`, `ret` or `int`. A `cmp` separated from its conditional jump by any other
  instruction is therefore never taken on a "true" condition. `Preserve` leaves flags alone
  until the next `cmp`/`test`/`inc`/`dec`.
*/
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum FlagPolicy {
  ClearBeforeInstruction,
  Preserve,
}

/// What to do with a text-section line whose mnemonic is not recognized.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum UnknownMnemonicPolicy {
  /// Warn, and copy the line to the output unchanged.
  PassThrough,
  /// Warn, and leave the line out of the output.
  Drop,
  /// Refuse to load the program.
  Reject,
}

#[derive(Clone, Debug)]
pub struct Config {
  pub memory_size        : usize,
  pub input_directory    : PathBuf,
  pub output_directory   : PathBuf,
  pub flag_policy        : FlagPolicy,
  pub unknown_mnemonics  : UnknownMnemonicPolicy,
  /// Copy lines mentioning `%esp` to the output without simulating them.
  pub bypass_stack_pointer : bool,
  pub step_limit         : Option<usize>,
  /// Byte appended by `.asciz` and `.string`.
  pub asciz_terminator   : u8,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      memory_size          : MEMORY_SIZE,
      input_directory      : PathBuf::from(INPUT_DIRECTORY),
      output_directory     : PathBuf::from(OUTPUT_DIRECTORY),
      flag_policy          : FlagPolicy::ClearBeforeInstruction,
      unknown_mnemonics    : UnknownMnemonicPolicy::PassThrough,
      bypass_stack_pointer : true,
      step_limit           : Some(STEP_LIMIT),
      asciz_terminator     : b'\n',
    }
  }
}
