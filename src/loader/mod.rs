/*!
  Turns program text into a `Program`: the executable statements of the text section, the
  text labels that index them, and the data section's initial memory image with its labels.

  The grammar is line oriented. Each line is, after its comment is removed, zero or more
  `label:` definitions followed by nothing, a directive, or an instruction. Lines before
  the first section directive belong to the text section.

  Data labels take the address at which the next data directive starts and the element
  size of that directive. A label that no data follows before the section ends gets the
  byte size.
*/

mod data;

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use nom::{
  IResult,
  character::complete::{alphanumeric1, space0},
  combinator::all_consuming,
  sequence::terminated,
};
use string_cache::DefaultAtom;

use crate::config::{Config, UnknownMnemonicPolicy};
use crate::error::{Error, Result};
use crate::instruction::{Instruction, Operation, Width};
use crate::memory::Address;
use crate::operand::{parse_operand, OperandSyntax};
use crate::symboltable::{Label, SymbolTable};
use crate::token::{directive_name, identifier, label_definition, operand_list, strip_comment};

/// Why a text-section line is copied to the output instead of being simulated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerbatimReason {
  /// The line mentions `%esp`.
  StackPointer,
  UnknownMnemonic(String),
}

impl Display for VerbatimReason {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      VerbatimReason::StackPointer          => write!(f, "uses the stack pointer"),
      VerbatimReason::UnknownMnemonic(name) => write!(f, "unknown mnemonic `{}`", name),
    }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
  Instruction(Instruction),
  Verbatim {
    text   : String,
    line   : usize,
    reason : VerbatimReason
  },
}

impl Statement {
  pub fn line(&self) -> usize {
    match self {
      Statement::Instruction(instruction) => instruction.line,
      Statement::Verbatim{ line, .. }     => *line,
    }
  }

  pub fn text(&self) -> &str {
    match self {
      Statement::Instruction(instruction) => &instruction.text,
      Statement::Verbatim{ text, .. }     => text,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Program {
  pub statements      : Vec<Statement>,
  /// Text labels, mapped to the index of the statement they precede.
  pub text_labels     : HashMap<DefaultAtom, usize>,
  pub symbols         : SymbolTable,
  /// The initial contents of memory, starting at address 0.
  pub image           : Vec<u8>,
  /// The first name made global with `.global`/`.globl`.
  pub entry           : Option<DefaultAtom>,
  pub externs         : HashSet<DefaultAtom>,
  /// Data-section lines, comments removed, to be copied to the output.
  pub data_lines      : Vec<String>,
  /// Text-section directives, to be copied to the output.
  pub text_directives : Vec<String>,
}

impl Program {

  pub fn new() -> Program {
    Program {
      statements      : Vec::new(),
      text_labels     : HashMap::new(),
      symbols         : SymbolTable::new(),
      image           : Vec::new(),
      entry           : None,
      externs         : HashSet::new(),
      data_lines      : Vec::new(),
      text_directives : Vec::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.statements.len()
  }

  pub fn label_index(&self, name: &DefaultAtom) -> Option<usize> {
    self.text_labels.get(name).copied()
  }

  pub fn is_extern(&self, name: &DefaultAtom) -> bool {
    self.externs.contains(name)
  }

  /// The statement index named by a jump, `loop` or `call` operand.
  pub fn target(&self, instruction: &Instruction) -> Result<usize> {
    match instruction.destination() {
      Some(OperandSyntax::Direct(name)) => {
        self.label_index(name).ok_or_else(|| Error::UnresolvedLabel(name.to_string()))
      }
      Some(other) => Err(Error::UnresolvedLabel(other.to_string())),
      None        => Err(Error::UnresolvedLabel(instruction.text.clone())),
    }
  }

  /// Where execution starts: the entry label if there is one, otherwise the first statement.
  pub fn entry_index(&self) -> Result<usize> {
    match &self.entry {
      Some(name) => self.label_index(name).ok_or_else(|| Error::UnresolvedLabel(name.to_string())),
      None       => Ok(0),
    }
  }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Section {
  Text,
  Data,
}

impl Section {
  fn name(self) -> &'static str {
    match self {
      Section::Text => "text",
      Section::Data => "data",
    }
  }
}

struct ProgramBuilder<'c> {
  config  : &'c Config,
  program : Program,
  section : Section,
  /// Data labels waiting for the directive that gives them an address and width.
  pending : Vec<DefaultAtom>,
}

fn mnemonic(input: &str) -> IResult<&str, &str> {
  terminated(alphanumeric1, space0)(input)
}

fn names(arguments: &str) -> Vec<DefaultAtom> {
  arguments
    .split(|c: char| c == ',' || c.is_whitespace())
    .filter(|name| identifier(name).map_or(false, |(rest, _)| rest.is_empty()))
    .map(DefaultAtom::from)
    .collect()
}

impl<'c> ProgramBuilder<'c> {

  fn new(config: &'c Config) -> ProgramBuilder<'c> {
    ProgramBuilder {
      config,
      program : Program::new(),
      section : Section::Text,
      pending : Vec::new(),
    }
  }

  fn line(&mut self, raw: &str, line: usize) -> Result<()> {
    let whole = strip_comment(raw)?.trim();
    if whole.is_empty() {
      if self.section == Section::Data && !raw.trim().is_empty() {
        self.program.data_lines.push(raw.to_string());
      }
      return Ok(());
    }

    let mut code = whole;
    while let Ok((rest, name)) = label_definition(code) {
      self.define_label(DefaultAtom::from(name))?;
      code = rest.trim_start();
    }

    if code.starts_with('.') {
      return self.directive(raw, whole, code);
    }

    if self.section == Section::Data {
      if !code.is_empty() {
        return Err(Error::MisplacedStatement(code.to_string(), Section::Data.name()));
      }
      self.program.data_lines.push(raw.to_string());
      return Ok(());
    }

    match code.is_empty() {
      true  => Ok(()),
      false => self.instruction(code, line)
    }
  }

  // region Labels

  fn define_label(&mut self, name: DefaultAtom) -> Result<()> {
    if self.program.text_labels.contains_key(&name)
        || self.program.symbols.get(&name).is_some()
        || self.pending.contains(&name)
    {
      return Err(Error::DuplicateLabel(name.to_string()));
    }

    match self.section {
      Section::Text => {
        self.program.text_labels.insert(name, self.program.statements.len());
      }
      Section::Data => self.pending.push(name),
    }
    Ok(())
  }

  fn bind_pending(&mut self, width: Width) -> Result<()> {
    let address = self.program.image.len() as Address;
    for name in std::mem::replace(&mut self.pending, Vec::new()) {
      self.program.symbols.insert(Label{ name, width, address })?;
    }
    Ok(())
  }

  fn switch_section(&mut self, section: Section) -> Result<()> {
    self.bind_pending(Width::Byte)?;
    self.section = section;
    Ok(())
  }

  // endregion

  // region Directives

  /// Data-section lines are kept as written, comments included.
  fn record(&mut self, raw: &str, whole: &str) {
    match self.section {
      Section::Data => self.program.data_lines.push(raw.to_string()),
      Section::Text => self.program.text_directives.push(whole.to_string()),
    }
  }

  fn directive(&mut self, raw: &str, whole: &str, code: &str) -> Result<()> {
    let (arguments, name) =
      directive_name(code).map_err(|_| Error::Syntax(code.to_string()))?;
    let name      = name.to_ascii_lowercase();
    let arguments = arguments.trim();

    match name.as_str() {

      "data" | "bss" | "rodata" => {
        self.switch_section(Section::Data)?;
        self.record(raw, whole);
      }

      "text" => self.switch_section(Section::Text)?,

      "section" => {
        match arguments.starts_with(".text") {
          true  => self.switch_section(Section::Text)?,
          false => {
            self.switch_section(Section::Data)?;
            self.record(raw, whole);
          }
        }
      }

      "extern" => {
        self.program.externs.extend(names(arguments));
        self.record(raw, whole);
      }

      "global" | "globl" => {
        if self.program.entry.is_none() {
          self.program.entry = names(arguments).into_iter().next();
        }
        self.record(raw, whole);
      }

      name if data::is_data_directive(name) => {
        if self.section == Section::Text {
          return Err(Error::MisplacedStatement(code.to_string(), Section::Text.name()));
        }
        let data = data::encode(
          name,
          arguments,
          self.config.asciz_terminator,
          self.program.image.len(),
          self.config.memory_size
        )?;
        self.bind_pending(data.width)?;
        self.program.image.extend(data.bytes);
        self.record(raw, whole);
      }

      _ => self.record(raw, whole),
    }
    Ok(())
  }

  // endregion

  // region Instructions

  fn verbatim(&mut self, text: &str, line: usize, reason: VerbatimReason) {
    self.program.statements.push(Statement::Verbatim{ text: text.to_string(), line, reason });
  }

  fn instruction(&mut self, code: &str, line: usize) -> Result<()> {
    if self.config.bypass_stack_pointer && code.to_ascii_lowercase().contains("%esp") {
      self.verbatim(code, line, VerbatimReason::StackPointer);
      return Ok(());
    }

    let (arguments, name) = mnemonic(code).map_err(|_| Error::Syntax(code.to_string()))?;
    let (operation, width) = match Operation::decode(name) {
      Some(decoded) => decoded,
      None          => return self.unknown_mnemonic(code, name, line)
    };

    let tokens = match arguments.trim() {
      ""        => Vec::new(),
      arguments => {
        all_consuming(operand_list)(arguments)
          .map(|(_, tokens)| tokens)
          .map_err(|_| Error::Syntax(code.to_string()))?
      }
    };
    let operands = tokens.into_iter().map(parse_operand).collect::<Result<Vec<OperandSyntax>>>()?;

    if operands.len() != operation.arity() {
      return Err(Error::WrongArity{ operation, expected: operation.arity(), given: operands.len() });
    }

    self.program.statements.push(
      Statement::Instruction(
        Instruction{
          operation,
          width : width.unwrap_or(Width::Long),
          operands,
          text  : code.to_string(),
          line
        }
      )
    );
    Ok(())
  }

  fn unknown_mnemonic(&mut self, code: &str, name: &str, line: usize) -> Result<()> {
    warn!("line {}: unknown mnemonic `{}`", line, name);
    match self.config.unknown_mnemonics {
      UnknownMnemonicPolicy::PassThrough => {
        self.verbatim(code, line, VerbatimReason::UnknownMnemonic(name.to_string()));
        Ok(())
      }
      UnknownMnemonicPolicy::Drop   => Ok(()),
      UnknownMnemonicPolicy::Reject => Err(Error::UnknownMnemonic(name.to_string())),
    }
  }

  // endregion

  fn finish(mut self) -> Result<Program> {
    self.bind_pending(Width::Byte)?;
    if self.program.image.len() > self.config.memory_size {
      return Err(Error::ImageTooLarge{ size: self.program.image.len(), capacity: self.config.memory_size });
    }
    if self.program.entry.is_none() {
      warn!("no .global entry label; execution starts at the first instruction");
    }
    Ok(self.program)
  }
}

/// Loads a whole program. Errors name the line they occurred on.
pub fn load(text: &str, config: &Config) -> Result<Program> {
  let mut builder = ProgramBuilder::new(config);

  for (index, raw) in text.lines().enumerate() {
    let line = index + 1;
    builder.line(raw, line).map_err(|error| error.at_line(line))?;
  }

  let program = builder.finish()?;
  debug!(
    "loaded {} statements, {} text labels, {} data labels, {} data bytes",
    program.len(),
    program.text_labels.len(),
    program.symbols.len(),
    program.image.len()
  );
  for label in program.symbols.labels() {
    trace!("data label {}", label);
  }
  Ok(program)
}
