use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use bimap::BiMap;
use string_cache::DefaultAtom;

use crate::error::{Error, Result};
use crate::instruction::Width;
use crate::memory::Address;

/// A data label: a name, the element size of the directive it labels, and its address.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Label {
  pub name    : DefaultAtom,
  pub width   : Width,
  pub address : Address,
}

impl Display for Label {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}[{}] @ {}", self.name, self.width, self.address)
  }
}

/**
  The data label table, a mapping between label names and addresses in data memory. The
  mapping is bidirectional so that an address can be reported by name. Labels are
  write-once: neither a name nor an address may be bound twice.
*/
#[derive(Clone, Debug)]
pub struct SymbolTable {
  table  : BiMap<DefaultAtom, Address>,
  widths : HashMap<DefaultAtom, Width>,
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable{
      table  : BiMap::new(),
      widths : HashMap::new()
    }
  }

  pub fn insert(&mut self, label: Label) -> Result<()> {
    if self.table.contains_left(&label.name) {
      return Err(Error::DuplicateLabel(label.name.to_string()));
    }
    if let Some(existing) = self.name_at(label.address) {
      return Err(
        Error::LabelCollision {
          name     : label.name.to_string(),
          existing : existing.to_string(),
          address  : label.address
        }
      );
    }

    self.widths.insert(label.name.clone(), label.width);
    // Both sides were checked above.
    let _ = self.table.insert_no_overwrite(label.name, label.address);
    Ok(())
  }

  pub fn get(&self, name: &DefaultAtom) -> Option<Label> {
    let address = *self.table.get_by_left(name)?;
    let width   = *self.widths.get(name)?;
    Some(Label{ name: name.clone(), width, address })
  }

  /// The address of a label, as needed by `$name`, `name` and `name(...)` operands.
  pub fn address_of(&self, name: &DefaultAtom) -> Result<Address> {
    self.table
        .get_by_left(name)
        .copied()
        .ok_or_else(|| Error::UnknownDataLabel(name.to_string()))
  }

  pub fn name_at(&self, address: Address) -> Option<&DefaultAtom> {
    self.table.get_by_right(&address)
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  /// Labels in address order.
  pub fn labels(&self) -> Vec<Label> {
    let mut labels: Vec<Label> = self.table.iter().filter_map(|(name, _)| self.get(name)).collect();
    labels.sort_by_key(|label| label.address);
    labels
  }

  pub fn clear(&mut self) {
    self.table.clear();
    self.widths.clear();
  }
}
