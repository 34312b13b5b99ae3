//! The simulated machine: registers, memory, data labels, flags and the program counter.
//! The machine is a plain value owned by whoever drives it; the engine only borrows it.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};

use crate::error::Result;
use crate::flags::Flags;
use crate::instruction::Width;
use crate::loader::Program;
use crate::memory::Memory;
use crate::register::{RegisterFile, RegisterName, Slot, SLOT_COUNT};
use crate::symboltable::SymbolTable;

/// Bytes moved by every `push`, `pop`, `call` and `ret`.
pub const STACK_SLOT: Width = Width::Long;

/// Stack slots shown by `Display`, counted from the top of the stack.
const STACK_DISPLAY_DEPTH: usize = 8;

pub struct Machine {
  pub registers : RegisterFile,
  pub memory    : Memory,
  pub symbols   : SymbolTable,
  pub flags     : Flags,
  /// Index of the next statement to execute.
  pub pc        : usize,
}

impl Machine {

  pub fn new(capacity: usize) -> Machine {
    let mut machine = Machine {
      registers : RegisterFile::new(),
      memory    : Memory::new(capacity),
      symbols   : SymbolTable::new(),
      flags     : Flags::default(),
      pc        : 0,
    };
    machine.set_stack_pointer(capacity as u32);
    machine
  }

  /// Returns the machine to its freshly constructed state.
  pub fn reset(&mut self) {
    self.registers.clear();
    self.memory.clear();
    self.symbols.clear();
    self.flags.clear();
    self.pc = 0;
    self.set_stack_pointer(self.memory.capacity() as u32);
  }

  /// Installs a program's data image and labels. The machine is reset first.
  pub fn load(&mut self, program: &Program) -> Result<()> {
    self.reset();
    self.memory.load_image(&program.image)?;
    self.symbols = program.symbols.clone();
    Ok(())
  }

  // region Stack

  pub fn stack_pointer(&self) -> i64 {
    self.registers.read(RegisterName::Esp) as i64
  }

  fn set_stack_pointer(&mut self, address: u32) {
    self.registers.write(RegisterName::Esp, address as i32);
  }

  /// True when nothing has been pushed, i.e. SP is at (or above) the top of memory.
  pub fn stack_is_empty(&self) -> bool {
    self.stack_pointer() >= self.memory.capacity() as i64
  }

  pub fn push(&mut self, value: u32) -> Result<()> {
    let address = self.memory.check(self.stack_pointer() - STACK_SLOT.bytes() as i64, STACK_SLOT)?;
    self.memory.write(address, STACK_SLOT, value)?;
    self.set_stack_pointer(address);
    Ok(())
  }

  pub fn pop(&mut self) -> Result<u32> {
    let address = self.memory.check(self.stack_pointer(), STACK_SLOT)?;
    let value   = self.memory.read(address, STACK_SLOT)?;
    self.set_stack_pointer(address + STACK_SLOT.bytes());
    Ok(value)
  }

  // endregion

  // region Display methods

  fn make_register_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    for index in 0..SLOT_COUNT as u8 {
      if let Ok(slot) = Slot::try_from(index) {
        let value = self.registers.cell(slot);
        table.add_row(row![r->format!("%{} =", slot.full()), format!("{:#010x} ({})", value, value as i32)]);
      }
    }
    table
  }

  fn make_stack_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    let top      = self.stack_pointer();
    let capacity = self.memory.capacity() as i64;
    let mut address = top;
    while address + STACK_SLOT.bytes() as i64 <= capacity
          && ((address - top) as usize) < STACK_DISPLAY_DEPTH * STACK_SLOT.bytes() as usize
    {
      if let Ok(checked) = self.memory.check(address, STACK_SLOT) {
        let contents = self.memory.read(checked, STACK_SLOT).unwrap_or_default();
        match address == top {
          true  => table.add_row(row![r->format!("* --> [{}] =", address), format!("{:#010x}", contents)]),
          false => table.add_row(row![r->format!("[{}] =", address),       format!("{:#010x}", contents)]),
        };
      }
      address += STACK_SLOT.bytes() as i64;
    }
    table
  }

  // endregion
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let register_table = self.make_register_table();
    let stack_table    = self.make_stack_table();

    let mut combined_table = table!([register_table, stack_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Stack"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "pc: {}\tflags: {}\n{}", self.pc, self.flags, combined_table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::symboltable::Label;
  use string_cache::DefaultAtom;

  #[test]
  fn stack_starts_at_the_top_of_memory(){
    let machine = Machine::new(64);
    assert_eq!(machine.stack_pointer(), 64);
    assert!(machine.stack_is_empty());
  }

  #[test]
  fn push_then_pop(){
    let mut machine = Machine::new(64);
    machine.push(0xDEAD_BEEF).unwrap();
    assert_eq!(machine.stack_pointer(), 60);
    assert!(!machine.stack_is_empty());
    machine.push(7).unwrap();
    assert_eq!(machine.pop().unwrap(), 7);
    assert_eq!(machine.pop().unwrap(), 0xDEAD_BEEF);
    assert_eq!(machine.stack_pointer(), 64);
  }

  #[test]
  fn pop_on_empty_stack_is_out_of_bounds(){
    let mut machine = Machine::new(16);
    assert!(matches!(machine.pop(), Err(crate::error::Error::OutOfBounds{ address: 16, .. })));
  }

  #[test]
  fn stack_overflow_is_out_of_bounds(){
    let mut machine = Machine::new(8);
    machine.push(1).unwrap();
    machine.push(2).unwrap();
    assert!(matches!(machine.push(3), Err(crate::error::Error::OutOfBounds{ address: -4, .. })));
    assert_eq!(machine.stack_pointer(), 0);
  }

  #[test]
  fn reset_leaves_nothing_behind(){
    let mut machine = Machine::new(32);
    machine.registers.write(RegisterName::Eax, 5);
    machine.memory.write(0, Width::Long, 9).unwrap();
    machine.symbols.insert(Label{ name: DefaultAtom::from("x"), width: Width::Long, address: 0 }).unwrap();
    machine.flags.compare(1, 2);
    machine.push(3).unwrap();
    machine.pc = 12;

    machine.reset();

    assert_eq!(machine.registers.read(RegisterName::Eax), 0);
    assert_eq!(machine.memory.read(0, Width::Long).unwrap(), 0);
    assert_eq!(machine.memory.read(28, Width::Long).unwrap(), 0);
    assert!(machine.symbols.is_empty());
    assert_eq!(machine.flags, Flags::default());
    assert_eq!(machine.pc, 0);
    assert_eq!(machine.stack_pointer(), 32);
  }

  #[test]
  fn display_shows_registers_and_stack(){
    let mut machine = Machine::new(32);
    machine.registers.write(RegisterName::Ecx, 3);
    machine.push(0x2A).unwrap();
    let text = machine.to_string();
    assert!(text.contains("%ecx ="));
    assert!(text.contains("* --> [28] ="));
    assert!(text.contains("0x0000002a"));
  }
}
