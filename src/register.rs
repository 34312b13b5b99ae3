/*!
  The register file. Each architectural register is a single 32-bit cell; the 16- and 8-bit
  registers are views of a cell at a given width and bit offset:

  ```text
    31              16 15       8 7        0
    ┌─────────────────┬──────────┬─────────┐
    │                 │    AH    │   AL    │
    │                 ├──────────┴─────────┤
    │                 │         AX         │
    ├─────────────────┴────────────────────┤
    │                 EAX                  │
    └──────────────────────────────────────┘
  ```

  Reads return the view's bits as an unsigned field. Writes touch only the view's bits.
*/

use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::instruction::Width;

pub const SLOT_COUNT: usize = 8;

/// The backing storage cells.
#[derive(
  TryFromPrimitive, IntoPrimitive, StrumDisplay,
  Clone,            Copy,          Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum Slot {
  A, B, C, D, SI, DI, SP, BP
}

impl Slot {
  pub fn index(self) -> usize {
    u8::from(self) as usize
  }

  /// The 32-bit register covering the whole cell.
  pub fn full(self) -> RegisterName {
    match self {
      Slot::A  => RegisterName::Eax,
      Slot::B  => RegisterName::Ebx,
      Slot::C  => RegisterName::Ecx,
      Slot::D  => RegisterName::Edx,
      Slot::SI => RegisterName::Esi,
      Slot::DI => RegisterName::Edi,
      Slot::SP => RegisterName::Esp,
      Slot::BP => RegisterName::Ebp,
    }
  }
}

/// The named registers as they appear in source text, without the `%` sigil.
#[derive(
  StrumDisplay, EnumString, IntoStaticStr,
  Clone,        Copy,       Eq, PartialEq, Debug, Hash
)]
pub enum RegisterName {
  #[strum(serialize = "eax")] Eax,
  #[strum(serialize = "ax")]  Ax,
  #[strum(serialize = "ah")]  Ah,
  #[strum(serialize = "al")]  Al,

  #[strum(serialize = "ebx")] Ebx,
  #[strum(serialize = "bx")]  Bx,
  #[strum(serialize = "bh")]  Bh,
  #[strum(serialize = "bl")]  Bl,

  #[strum(serialize = "ecx")] Ecx,
  #[strum(serialize = "cx")]  Cx,
  #[strum(serialize = "ch")]  Ch,
  #[strum(serialize = "cl")]  Cl,

  #[strum(serialize = "edx")] Edx,
  #[strum(serialize = "dx")]  Dx,
  #[strum(serialize = "dh")]  Dh,
  #[strum(serialize = "dl")]  Dl,

  #[strum(serialize = "esi")] Esi,
  #[strum(serialize = "edi")] Edi,
  #[strum(serialize = "esp")] Esp,
  #[strum(serialize = "ebp")] Ebp,
}

/// Where a register lives inside its cell.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct View {
  pub slot   : Slot,
  pub width  : Width,
  pub offset : u32,
}

impl RegisterName {
  pub fn view(self) -> View {
    use RegisterName::*;

    let (slot, width, offset) = match self {
      Eax => (Slot::A,  Width::Long, 0),
      Ax  => (Slot::A,  Width::Word, 0),
      Ah  => (Slot::A,  Width::Byte, 8),
      Al  => (Slot::A,  Width::Byte, 0),

      Ebx => (Slot::B,  Width::Long, 0),
      Bx  => (Slot::B,  Width::Word, 0),
      Bh  => (Slot::B,  Width::Byte, 8),
      Bl  => (Slot::B,  Width::Byte, 0),

      Ecx => (Slot::C,  Width::Long, 0),
      Cx  => (Slot::C,  Width::Word, 0),
      Ch  => (Slot::C,  Width::Byte, 8),
      Cl  => (Slot::C,  Width::Byte, 0),

      Edx => (Slot::D,  Width::Long, 0),
      Dx  => (Slot::D,  Width::Word, 0),
      Dh  => (Slot::D,  Width::Byte, 8),
      Dl  => (Slot::D,  Width::Byte, 0),

      Esi => (Slot::SI, Width::Long, 0),
      Edi => (Slot::DI, Width::Long, 0),
      Esp => (Slot::SP, Width::Long, 0),
      Ebp => (Slot::BP, Width::Long, 0),
    };

    View{ slot, width, offset }
  }

  pub fn width(self) -> Width {
    self.view().width
  }
}

#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct RegisterFile {
  cells: [u32; SLOT_COUNT]
}

impl RegisterFile {

  pub fn new() -> RegisterFile {
    RegisterFile::default()
  }

  pub fn read(&self, register: RegisterName) -> i32 {
    let view = register.view();
    ((self.cells[view.slot.index()] >> view.offset) & view.width.mask()) as i32
  }

  pub fn write(&mut self, register: RegisterName, value: i32) {
    let view = register.view();
    let mask = view.width.mask() << view.offset;
    let cell = &mut self.cells[view.slot.index()];

    *cell = (*cell & !mask) | (((value as u32) << view.offset) & mask);
  }

  pub fn cell(&self, slot: Slot) -> u32 {
    self.cells[slot.index()]
  }

  pub fn clear(&mut self) {
    self.cells = [0; SLOT_COUNT];
  }
}
