/*!
  The specializing emitter. As statements execute, the emitter accumulates a rewrite of the
  program: an instruction whose operands are all registers, literal immediates or `$label`
  addresses has a result fully determined by the simulation, so it is replaced by literal
  moves of the registers it wrote. A label address folds to its place in simulated memory.
  Anything touching memory is kept as written.
*/

use crate::instruction::Instruction;
use crate::loader::Program;
use crate::register::RegisterName;

pub struct Emitter {
  lines  : Vec<String>,
  /// Instructions replaced by literal moves.
  folded : usize,
  /// Instructions copied as written.
  passed : usize,
}

impl Emitter {

  pub fn new() -> Emitter {
    Emitter {
      lines  : Vec::new(),
      folded : 0,
      passed : 0,
    }
  }

  /// `mov{suffix} $value, %register`, the suffix matching the register's width.
  fn literal_move(&mut self, register: RegisterName, value: i32) {
    self.lines.push(format!("\tmov{} ${}, %{}", register.width().suffix(), value, register));
  }

  /// Folds an instruction that wrote the single `register`.
  pub fn fold(&mut self, register: RegisterName, value: i32) {
    self.folded += 1;
    self.literal_move(register, value);
  }

  pub fn verbatim(&mut self, text: &str) {
    self.passed += 1;
    self.lines.push(format!("\t{}", text));
  }

  /**
    Emits an executed instruction given the registers it wrote and their new contents. An
    instruction that wrote no register, such as `cmp`, emits nothing when folded.
  */
  pub fn record(&mut self, instruction: &Instruction, written: &[(RegisterName, i32)]) {
    match instruction.operands.iter().all(|operand| operand.is_concrete()) {
      true  => {
        self.folded += 1;
        for (register, value) in written {
          self.literal_move(*register, *value);
        }
      }
      false => self.verbatim(&instruction.text)
    }
  }

  /// An internal `call` keeps the return address slot on the real stack.
  pub fn reserve_return_slot(&mut self) {
    self.lines.push("\tsubl $4, %esp".to_string());
  }

  pub fn release_return_slot(&mut self) {
    self.lines.push("\taddl $4, %esp".to_string());
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  pub fn folded(&self) -> usize {
    self.folded
  }

  pub fn passed(&self) -> usize {
    self.passed
  }

  /**
    The rewritten program: the data section as written, then a text section holding the
    entry label followed by the executed trace.
  */
  pub fn render(&self, program: &Program) -> String {
    let mut output: Vec<String> = program.data_lines.clone();

    output.push(".text".to_string());
    output.extend(program.text_directives.iter().cloned());
    if let Some(entry) = &program.entry {
      output.push(format!("{}:", entry));
    }
    output.extend(self.lines.iter().cloned());

    let mut text = output.join("\n");
    text.push('\n');
    text
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::instruction::{Operation, Width};
  use crate::operand::parse_operand;
  use string_cache::DefaultAtom;

  fn instruction(operation: Operation, operands: &[&str], text: &str) -> Instruction {
    Instruction {
      operation,
      width    : Width::Long,
      operands : operands.iter().map(|token| parse_operand(token).unwrap()).collect(),
      text     : text.to_string(),
      line     : 1
    }
  }

  #[test]
  fn register_only_instructions_fold(){
    let mut emitter = Emitter::new();
    emitter.record(&instruction(Operation::Add, &["$2", "%eax"], "addl $2, %eax"), &[(RegisterName::Eax, 7)]);
    emitter.record(&instruction(Operation::Mov, &["$-1", "%bl"], "movb $-1, %bl"), &[(RegisterName::Bl, 255)]);
    assert_eq!(emitter.lines(), &["\tmovl $7, %eax".to_string(), "\tmovb $255, %bl".to_string()]);
    assert_eq!(emitter.folded(), 2);
  }

  #[test]
  fn memory_operands_pass_through(){
    let mut emitter = Emitter::new();
    emitter.record(&instruction(Operation::Mov, &["count", "%eax"], "movl count, %eax"),   &[(RegisterName::Eax, 3)]);
    emitter.record(&instruction(Operation::Mov, &["%eax", "(%ebx)"], "movl %eax, (%ebx)"), &[]);
    assert_eq!(emitter.lines(), &["\tmovl count, %eax".to_string(), "\tmovl %eax, (%ebx)".to_string()]);
    assert_eq!(emitter.passed(), 2);
    assert_eq!(emitter.folded(), 0);
  }

  #[test]
  fn label_addresses_fold_to_simulated_addresses(){
    let mut emitter = Emitter::new();
    emitter.record(&instruction(Operation::Mov, &["$msg", "%ecx"], "movl $msg, %ecx"), &[(RegisterName::Ecx, 4)]);
    assert_eq!(emitter.lines(), &["\tmovl $4, %ecx".to_string()]);
    assert_eq!(emitter.folded(), 1);
    assert_eq!(emitter.passed(), 0);
  }

  #[test]
  fn single_register_folds_are_counted(){
    let mut emitter = Emitter::new();
    emitter.fold(RegisterName::Ecx, 2);
    emitter.fold(RegisterName::Ecx, 1);
    assert_eq!(emitter.folded(), 2);
    assert_eq!(emitter.lines(), &["\tmovl $2, %ecx".to_string(), "\tmovl $1, %ecx".to_string()]);
  }

  #[test]
  fn comparisons_emit_nothing(){
    let mut emitter = Emitter::new();
    emitter.record(&instruction(Operation::Cmp, &["$1", "%eax"], "cmpl $1, %eax"), &[]);
    assert!(emitter.lines().is_empty());
  }

  #[test]
  fn render_layout(){
    let mut program = Program::new();
    program.data_lines      = vec![".data".to_string(), "x: .long 1".to_string()];
    program.text_directives = vec![".globl main".to_string()];
    program.entry           = Some(DefaultAtom::from("main"));

    let mut emitter = Emitter::new();
    emitter.fold(RegisterName::Eax, 1);
    emitter.verbatim("int $0x80");

    assert_eq!(
      emitter.render(&program),
      ".data\nx: .long 1\n.text\n.globl main\nmain:\n\tmovl $1, %eax\n\tint $0x80\n"
    );
  }
}
