/*!
  The execution engine. `Engine::run` fetches statements from a `Program` starting at its
  entry point and executes them against a `Machine` until the program falls off its end,
  returns with an empty stack, or exits through `int $0x80`. Every executed statement is
  handed to the `Emitter`, so that when the run ends the emitter holds the specialized
  trace of the program.

  Arithmetic is carried out on the native `i32` value of the operands whatever the
  operation's width, and the result is truncated only when it is written back. `mul` and
  `div` are the exception: they work on the unsigned bit patterns of their declared width.
*/

use crate::config::{Config, FlagPolicy};
use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::instruction::{Instruction, Operation, Width};
use crate::loader::{Program, Statement};
use crate::machine::Machine;
use crate::operand::{Operand, OperandSyntax};
use crate::register::RegisterName;

/// Linux `int $0x80` service number for `exit`.
const SYS_EXIT: i32 = 1;
const SYSCALL_VECTOR: i32 = 0x80;

/// Where execution goes after a statement.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Flow {
  Next,
  Jump(usize),
  Halt,
}

pub struct Engine<'c> {
  config  : &'c Config,
  emitter : Emitter,
  steps   : usize,
}

impl<'c> Engine<'c> {

  pub fn new(config: &'c Config) -> Engine<'c> {
    Engine {
      config,
      emitter : Emitter::new(),
      steps   : 0,
    }
  }

  pub fn emitter(&self) -> &Emitter {
    &self.emitter
  }

  /// Loads `program` into `machine`, which is reset first, and runs it to completion.
  pub fn run(&mut self, program: &Program, machine: &mut Machine) -> Result<()> {
    machine.load(program)?;
    machine.pc = program.entry_index()?;

    while machine.pc < program.len() {
      if let Some(limit) = self.config.step_limit {
        if self.steps >= limit {
          return Err(Error::StepLimitExceeded(limit));
        }
      }

      let statement = &program.statements[machine.pc];
      trace!("{:>5}: {}", machine.pc, statement.text());

      let flow = self.step(program, statement, machine).map_err(|error| error.at_line(statement.line()))?;
      self.steps += 1;

      #[cfg(feature = "trace_computation")] println!("{}", machine);

      match flow {
        Flow::Next         => machine.pc += 1,
        Flow::Jump(target) => machine.pc = target,
        Flow::Halt         => break,
      }
    }

    debug!(
      "executed {} statements: {} folded, {} passed through",
      self.steps,
      self.emitter.folded(),
      self.emitter.passed()
    );
    Ok(())
  }

  fn step(&mut self, program: &Program, statement: &Statement, machine: &mut Machine) -> Result<Flow> {
    match statement {
      Statement::Verbatim{ text, reason, .. } => {
        trace!("copying `{}` unsimulated: {}", text, reason);
        self.emitter.verbatim(text);
        Ok(Flow::Next)
      }
      Statement::Instruction(instruction)     => self.execute(program, instruction, machine)
    }
  }

  fn execute(&mut self, program: &Program, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let operation = instruction.operation;

    if operation.produces_flags()
        || (self.config.flag_policy == FlagPolicy::ClearBeforeInstruction && operation.clears_flags())
    {
      machine.flags.clear();
    }

    match operation {

      | Operation::Mov | Operation::Add | Operation::Sub
      | Operation::Or  | Operation::Xor | Operation::And
      | Operation::Shl | Operation::Shr | Operation::Sar => self.binary(instruction, machine),

      Operation::Inc | Operation::Dec   => self.step_by_one(instruction, machine),
      Operation::Lea                    => self.load_address(instruction, machine),
      Operation::Mul                    => self.multiply(instruction, machine),
      Operation::Div                    => self.divide(instruction, machine),
      Operation::Push                   => self.push(instruction, machine),
      Operation::Pop                    => self.pop(instruction, machine),
      Operation::Cmp | Operation::Test  => self.compare(instruction, machine),
      Operation::Loop                   => self.count_down(program, instruction, machine),
      Operation::Call                   => self.call(program, instruction, machine),
      Operation::Ret                    => self.ret(program, machine),
      Operation::Int                    => self.interrupt(instruction, machine),
      _                                 => self.jump(program, instruction, machine),
    }
  }

  // region Operand helpers

  fn operand(instruction: &Instruction, index: usize, machine: &Machine, width: Width) -> Result<Operand> {
    match instruction.operands.get(index) {
      Some(syntax) => syntax.resolve(machine, width),
      None         => Err(
        Error::WrongArity{
          operation : instruction.operation,
          expected  : instruction.operation.arity(),
          given     : instruction.operands.len()
        }
      )
    }
  }

  /// Emits an instruction that wrote at most `destination`.
  fn emit(&mut self, instruction: &Instruction, destination: Operand, machine: &Machine) {
    match destination.register() {
      Some(register) => self.emitter.record(instruction, &[(register, machine.registers.read(register))]),
      None           => self.emitter.record(instruction, &[]),
    }
  }

  // endregion

  // region Data operations

  fn binary(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let source      = Engine::operand(instruction, 0, machine, instruction.width)?;
    let destination = Engine::operand(instruction, 1, machine, instruction.width)?;
    let value       = source.read(machine)?;

    let result = match instruction.operation {
      Operation::Mov => value,
      operation      => {
        let current = destination.read(machine)?;
        let count   = (value as u32) & 31;
        match operation {
          Operation::Add => current.wrapping_add(value),
          Operation::Sub => current.wrapping_sub(value),
          Operation::Or  => current | value,
          Operation::Xor => current ^ value,
          Operation::And => current & value,
          Operation::Shl => current.wrapping_shl(count),
          Operation::Sar => current >> count,
          _              => ((current as u32) >> count) as i32,
        }
      }
    };

    destination.write(machine, result)?;
    self.emit(instruction, destination, machine);
    Ok(Flow::Next)
  }

  fn step_by_one(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let operand = Engine::operand(instruction, 0, machine, instruction.width)?;
    let current = operand.read(machine)?;
    let result  = match instruction.operation {
      Operation::Inc => current.wrapping_add(1),
      _              => current.wrapping_sub(1),
    };

    operand.write(machine, result)?;
    machine.flags.set_zero(result);
    self.emit(instruction, operand, machine);
    Ok(Flow::Next)
  }

  fn load_address(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let address = match instruction.source() {
      Some(syntax) => syntax.effective_address(machine)?,
      None         => return Err(Error::LeaOperand(instruction.text.clone())),
    };
    let destination = Engine::operand(instruction, 1, machine, Width::Long)?;

    destination.write(machine, address as i32)?;
    self.emitter.verbatim(&instruction.text);
    Ok(Flow::Next)
  }

  /// The accumulator pair of a `mul`/`div`: (low or quotient, high or remainder).
  fn accumulator(width: Width) -> (RegisterName, RegisterName) {
    match width {
      Width::Byte => (RegisterName::Al,  RegisterName::Ah),
      Width::Word => (RegisterName::Ax,  RegisterName::Dx),
      Width::Long => (RegisterName::Eax, RegisterName::Edx),
    }
  }

  fn emit_accumulator(&mut self, instruction: &Instruction, machine: &Machine) {
    let (low, high) = Engine::accumulator(instruction.width);
    self.emitter.record(
      instruction,
      &[(low, machine.registers.read(low)), (high, machine.registers.read(high))]
    );
  }

  fn multiply(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let width       = instruction.width;
    let (low, high) = Engine::accumulator(width);
    let source      = Engine::operand(instruction, 0, machine, width)?;

    let multiplier = (source.read(machine)? as u32 & width.mask()) as u64;
    let product    = (machine.registers.read(low) as u32 as u64) * multiplier;

    machine.registers.write(low,  (product & width.mask() as u64) as i32);
    machine.registers.write(high, ((product >> width.bits()) & width.mask() as u64) as i32);
    self.emit_accumulator(instruction, machine);
    Ok(Flow::Next)
  }

  fn divide(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let width       = instruction.width;
    let (low, high) = Engine::accumulator(width);
    let source      = Engine::operand(instruction, 0, machine, width)?;

    let divisor = (source.read(machine)? as u32 & width.mask()) as u64;
    if divisor == 0 {
      return Err(Error::DivisionByZero);
    }

    let dividend =
      ((machine.registers.read(high) as u32 as u64) << width.bits())
        | machine.registers.read(low) as u32 as u64;
    let quotient  = dividend / divisor;
    let remainder = dividend % divisor;
    if quotient > width.mask() as u64 {
      return Err(Error::DivideOverflow{ quotient, width: width.bytes() as u8 });
    }

    machine.registers.write(low,  quotient as i32);
    machine.registers.write(high, remainder as i32);
    self.emit_accumulator(instruction, machine);
    Ok(Flow::Next)
  }

  fn push(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let value = Engine::operand(instruction, 0, machine, Width::Long)?.read(machine)?;
    machine.push(value as u32)?;
    self.emitter.verbatim(&instruction.text);
    Ok(Flow::Next)
  }

  fn pop(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let destination = Engine::operand(instruction, 0, machine, Width::Long)?;
    let value       = machine.pop()?;
    destination.write(machine, value as i32)?;
    self.emitter.verbatim(&instruction.text);
    Ok(Flow::Next)
  }

  fn compare(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let source      = Engine::operand(instruction, 0, machine, instruction.width)?.read(machine)?;
    let destination = Engine::operand(instruction, 1, machine, instruction.width)?.read(machine)?;

    match instruction.operation {
      Operation::Cmp => machine.flags.compare(destination, source),
      _              => machine.flags.test(destination, source),
    }
    self.emitter.record(instruction, &[]);
    Ok(Flow::Next)
  }

  // endregion

  // region Control flow

  fn jump(&mut self, program: &Program, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let target = program.target(instruction)?;
    let taken  = match instruction.operation.condition() {
      Some(condition) => machine.flags.holds(condition),
      None            => true,
    };

    match taken {
      true  => Ok(Flow::Jump(target)),
      false => Ok(Flow::Next)
    }
  }

  fn count_down(&mut self, program: &Program, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let target = program.target(instruction)?;
    let count  = machine.registers.read(RegisterName::Ecx).wrapping_sub(1);

    machine.registers.write(RegisterName::Ecx, count);
    self.emitter.fold(RegisterName::Ecx, count);

    match count != 0 {
      true  => Ok(Flow::Jump(target)),
      false => Ok(Flow::Next)
    }
  }

  /**
    A call to a text label pushes the return index and jumps. A call to a name declared with
    `.extern` cannot be simulated and is kept for the real linker to resolve.
  */
  fn call(&mut self, program: &Program, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let name = match instruction.destination() {
      Some(OperandSyntax::Direct(name)) => name,
      _                                 => return Err(Error::UnresolvedLabel(instruction.text.clone())),
    };

    match program.label_index(name) {
      Some(target) => {
        machine.push((machine.pc + 1) as u32)?;
        self.emitter.reserve_return_slot();
        Ok(Flow::Jump(target))
      }
      None if program.is_extern(name) => {
        self.emitter.verbatim(&instruction.text);
        Ok(Flow::Next)
      }
      None => Err(Error::UnresolvedLabel(name.to_string()))
    }
  }

  /**
    With nothing on the stack, `ret` leaves the program itself, so it is kept in the output
    and the run ends. Otherwise it returns to the popped statement index, and a return
    address outside the program also ends the run.
  */
  fn ret(&mut self, program: &Program, machine: &mut Machine) -> Result<Flow> {
    if machine.stack_is_empty() {
      self.emitter.verbatim("ret");
      return Ok(Flow::Halt);
    }

    let address = machine.pop()? as usize;
    self.emitter.release_return_slot();
    match address < program.len() {
      true  => Ok(Flow::Jump(address)),
      false => Ok(Flow::Halt)
    }
  }

  fn interrupt(&mut self, instruction: &Instruction, machine: &mut Machine) -> Result<Flow> {
    let vector = Engine::operand(instruction, 0, machine, Width::Long)?.read(machine)?;
    self.emitter.verbatim(&instruction.text);

    match vector == SYSCALL_VECTOR && machine.registers.read(RegisterName::Eax) == SYS_EXIT {
      true  => Ok(Flow::Halt),
      false => Ok(Flow::Next)
    }
  }

  // endregion
}

/// Runs `program` on `machine` and returns the rewritten program text.
pub fn specialize(program: &Program, machine: &mut Machine, config: &Config) -> Result<String> {
  let mut engine = Engine::new(config);
  engine.run(program, machine)?;
  Ok(engine.emitter().render(program))
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::loader::load;
  use crate::memory::Address;
  use string_cache::DefaultAtom;

  const MEMORY: usize = 4096;

  fn config() -> Config {
    Config{ memory_size: MEMORY, ..Config::default() }
  }

  fn run_with(text: &str, config: &Config) -> Result<(Machine, Vec<String>)> {
    let program     = load(text, config)?;
    let mut machine = Machine::new(config.memory_size);
    let mut engine  = Engine::new(config);
    engine.run(&program, &mut machine)?;
    let lines = engine.emitter().lines().to_vec();
    Ok((machine, lines))
  }

  fn run(text: &str) -> (Machine, Vec<String>) {
    run_with(text, &config()).unwrap()
  }

  fn register(machine: &Machine, name: RegisterName) -> i32 {
    machine.registers.read(name)
  }

  fn line_error(result: Result<(Machine, Vec<String>)>) -> (usize, Error) {
    match result {
      Err(Error::AtLine{ line, source }) => (line, *source),
      Err(other)                         => panic!("expected a line error, got {}", other),
      Ok(_)                              => panic!("expected an error"),
    }
  }

  #[test]
  fn divide_long(){
    let (machine, lines) = run("
      mov $1000, %eax
      mov $0, %edx
      mov $7, %ecx
      div %ecx
    ");
    assert_eq!(register(&machine, RegisterName::Eax), 142);
    assert_eq!(register(&machine, RegisterName::Edx), 6);
    assert_eq!(&lines[3..], &["\tmovl $142, %eax".to_string(), "\tmovl $6, %edx".to_string()]);
  }

  #[test]
  fn multiply_byte_fills_ah_al(){
    let (machine, lines) = run("
      movb $16, %al
      movb $32, %cl
      mulb %cl
    ");
    assert_eq!(register(&machine, RegisterName::Ax), 512);
    assert_eq!(&lines[2..], &["\tmovb $0, %al".to_string(), "\tmovb $2, %ah".to_string()]);
  }

  #[test]
  fn multiply_word_fills_dx_ax(){
    let (machine, lines) = run("
      movw $0x1234, %ax
      movw $0x100, %cx
      mulw %cx
    ");
    assert_eq!(register(&machine, RegisterName::Ax), 0x3400);
    assert_eq!(register(&machine, RegisterName::Dx), 0x12);
    assert_eq!(&lines[2..], &["\tmovw $13312, %ax".to_string(), "\tmovw $18, %dx".to_string()]);
  }

  #[test]
  fn multiply_long_carries_into_edx(){
    let (machine, lines) = run("
      mov $0x10000, %eax
      mov $0x30000, %ecx
      mull %ecx
    ");
    assert_eq!(register(&machine, RegisterName::Eax), 0);
    assert_eq!(register(&machine, RegisterName::Edx), 3);
    assert_eq!(&lines[2..], &["\tmovl $0, %eax".to_string(), "\tmovl $3, %edx".to_string()]);
  }

  #[test]
  fn divide_word_uses_dx_ax(){
    let (machine, lines) = run("
      movw $1, %dx
      movw $4, %ax
      movw $3, %cx
      divw %cx
    ");
    assert_eq!(register(&machine, RegisterName::Ax), 21846);
    assert_eq!(register(&machine, RegisterName::Dx), 2);
    assert_eq!(&lines[3..], &["\tmovw $21846, %ax".to_string(), "\tmovw $2, %dx".to_string()]);
  }

  #[test]
  fn divide_byte_splits_ax_into_al_ah(){
    let (machine, lines) = run("
      movw $1000, %ax
      movb $7, %cl
      divb %cl
    ");
    assert_eq!(register(&machine, RegisterName::Al), 142);
    assert_eq!(register(&machine, RegisterName::Ah), 6);
    assert_eq!(&lines[2..], &["\tmovb $142, %al".to_string(), "\tmovb $6, %ah".to_string()]);
  }

  #[test]
  fn divide_errors(){
    let (line, error) = line_error(run_with("mov $0, %ecx\ndiv %ecx", &config()));
    assert_eq!(line, 2);
    assert!(matches!(error, Error::DivisionByZero));

    let (_, error) = line_error(run_with("mov $0, %eax\nmov $1, %edx\nmov $1, %ecx\ndiv %ecx", &config()));
    assert!(matches!(error, Error::DivideOverflow{ quotient: 0x1_0000_0000, width: 4 }));
  }

  #[test]
  fn shifts(){
    let (machine, _) = run("
      mov $-8, %eax
      sar $1, %eax
      mov $-8, %ebx
      shr $28, %ebx
      mov $1, %ecx
      shl $33, %ecx
    ");
    assert_eq!(register(&machine, RegisterName::Eax), -4);
    assert_eq!(register(&machine, RegisterName::Ebx), 0xF);
    assert_eq!(register(&machine, RegisterName::Ecx), 2);
  }

  #[test]
  fn arithmetic_wraps(){
    let (machine, lines) = run("
      mov $0x7FFFFFFF, %eax
      add $1, %eax
      movb $0xFF, %bl
      addb $1, %bl
      xor %ecx, %ecx
      or $0xF0, %ecx
      and $0x3C, %ecx
      sub $1, %ecx
    ");
    assert_eq!(register(&machine, RegisterName::Eax), i32::min_value());
    assert_eq!(register(&machine, RegisterName::Ebx), 0);
    assert_eq!(register(&machine, RegisterName::Ecx), 0x2F);
    assert_eq!(lines[1], "\tmovl $-2147483648, %eax");
    assert_eq!(lines[3], "\tmovb $0, %bl");
  }

  #[test]
  fn signed_and_unsigned_jumps(){
    let program = "
      mov $-1, %eax
      cmp $1, %eax
      jl less
      mov $0, %ebx
      ret
    less:
      mov $1, %ebx
      cmp $1, %eax
      ja above
      ret
    above:
      mov $1, %ecx
      ret
    ";
    let (machine, _) = run(program);
    assert_eq!(register(&machine, RegisterName::Ebx), 1);
    assert_eq!(register(&machine, RegisterName::Ecx), 1);
  }

  #[test]
  fn greater_does_not_jump_on_less(){
    let (machine, lines) = run("
      mov $5, %eax
      cmp $9, %eax
      jg bigger
      mov $1, %ebx
    bigger:
      ret
    ");
    assert_eq!(register(&machine, RegisterName::Ebx), 1);
    assert!(!lines.iter().any(|line| line.contains("cmp") || line.contains("jg")));
  }

  #[test]
  fn intervening_instruction_clears_flags(){
    let program = "
      mov $1, %eax
      cmp $2, %eax
      mov $5, %ecx
      jl taken
      mov $0, %ebx
      ret
    taken:
      mov $1, %ebx
      ret
    ";
    let (machine, _) = run(program);
    assert_eq!(register(&machine, RegisterName::Ebx), 0);

    let preserve = Config{ flag_policy: FlagPolicy::Preserve, ..config() };
    let (machine, _) = run_with(program, &preserve).unwrap();
    assert_eq!(register(&machine, RegisterName::Ebx), 1);
  }

  #[test]
  fn decrement_to_zero_sets_zero(){
    let (machine, _) = run("
      mov $1, %eax
      dec %eax
      jz done
      mov $5, %ebx
    done:
      ret
    ");
    assert_eq!(register(&machine, RegisterName::Ebx), 0);
  }

  #[test]
  fn test_sets_zero_on_disjoint_bits(){
    let (machine, _) = run("
      mov $0b1010, %eax
      test $0b0101, %eax
      jnz different
      mov $1, %ebx
    different:
      ret
    ");
    assert_eq!(register(&machine, RegisterName::Ebx), 1);
  }

  #[test]
  fn push_then_pop(){
    let (machine, lines) = run("
      mov $42, %eax
      push %eax
      pop %ebx
    ");
    assert_eq!(register(&machine, RegisterName::Ebx), 42);
    assert_eq!(machine.stack_pointer(), MEMORY as i64);
    assert_eq!(&lines[1..], &["\tpush %eax".to_string(), "\tpop %ebx".to_string()]);
  }

  #[test]
  fn call_and_return(){
    let (machine, lines) = run("
      .globl main
    main:
      call helper
      mov $2, %ebx
      ret
    helper:
      mov $1, %eax
      ret
    ");
    assert_eq!(register(&machine, RegisterName::Eax), 1);
    assert_eq!(register(&machine, RegisterName::Ebx), 2);
    assert_eq!(machine.stack_pointer(), MEMORY as i64);
    assert_eq!(
      lines,
      vec!["\tsubl $4, %esp", "\tmovl $1, %eax", "\taddl $4, %esp", "\tmovl $2, %ebx", "\tret"]
    );
  }

  #[test]
  fn call_to_extern_is_kept(){
    let (machine, lines) = run(".extern puts\ncall puts\nmov $1, %eax");
    assert_eq!(register(&machine, RegisterName::Eax), 1);
    assert_eq!(lines, vec!["\tcall puts", "\tmovl $1, %eax"]);

    let (line, error) = line_error(run_with("call missing", &config()));
    assert_eq!(line, 1);
    assert!(matches!(error, Error::UnresolvedLabel(ref name) if name == "missing"));
  }

  #[test]
  fn ret_on_empty_stack_ends_the_run(){
    let (machine, lines) = run("ret\nmov $1, %eax");
    assert_eq!(register(&machine, RegisterName::Eax), 0);
    assert_eq!(lines, vec!["\tret"]);
  }

  #[test]
  fn exit_interrupt_ends_the_run(){
    let (machine, lines) = run("mov $1, %eax\nmov $0, %ebx\nint $0x80\nmov $9, %ebx");
    assert_eq!(register(&machine, RegisterName::Ebx), 0);
    assert_eq!(lines.last().map(String::as_str), Some("\tint $0x80"));

    let (machine, _) = run("mov $4, %eax\nint $0x80\nmov $9, %ebx");
    assert_eq!(register(&machine, RegisterName::Ebx), 9);
  }

  #[test]
  fn loop_counts_down_ecx(){
    let (machine, lines) = run("
      mov $3, %ecx
      mov $0, %eax
    again:
      add $2, %eax
      loop again
    ");
    assert_eq!(register(&machine, RegisterName::Eax), 6);
    assert_eq!(register(&machine, RegisterName::Ecx), 0);
    assert_eq!(lines.last().map(String::as_str), Some("\tmovl $0, %ecx"));
  }

  #[test]
  fn loop_iterations_count_as_folded(){
    let config      = config();
    let program     = load("mov $3, %ecx
again:
loop again", &config).unwrap();
    let mut machine = Machine::new(config.memory_size);
    let mut engine  = Engine::new(&config);
    engine.run(&program, &mut machine).unwrap();
    assert_eq!(engine.emitter().folded(), 4);
    assert_eq!(engine.emitter().passed(), 0);
  }

  #[test]
  fn unresolved_jump_is_an_error(){
    let (line, error) = line_error(run_with("mov $1, %eax\njmp nowhere", &config()));
    assert_eq!(line, 2);
    assert!(matches!(error, Error::UnresolvedLabel(_)));
  }

  #[test]
  fn memory_operands_pass_through(){
    let (machine, lines) = run("
      .data
    small: .byte -2
    value: .long 0
      .text
      movl $0, %eax
      movb small, %al
      movl $7, %ecx
      movl %ecx, value
      movl $value, %edx
    ");
    assert_eq!(register(&machine, RegisterName::Eax), 0xFE);
    assert_eq!(machine.memory.read(1 as Address, Width::Long).unwrap(), 7);
    assert_eq!(register(&machine, RegisterName::Edx), 1);
    assert_eq!(
      lines,
      vec!["\tmovl $0, %eax", "\tmovb small, %al", "\tmovl $7, %ecx", "\tmovl %ecx, value", "\tmovl $1, %edx"]
    );
  }

  #[test]
  fn label_address_folds_and_derived_pointer_is_consistent(){
    let (machine, lines) = run("
      .data
    first: .long 3
    msg:   .long 7
      .text
      mov $msg, %ecx
      add $0, %ecx
      mov (%ecx), %eax
    ");
    assert_eq!(register(&machine, RegisterName::Ecx), 4);
    assert_eq!(register(&machine, RegisterName::Eax), 7);
    assert_eq!(lines, vec!["\tmovl $4, %ecx", "\tmovl $4, %ecx", "\tmov (%ecx), %eax"]);
  }

  #[test]
  fn indexed_memory_and_lea(){
    let (machine, lines) = run("
      .data
    table: .long 10, 20, 30
      .text
      mov $2, %ecx
      mov table(,%ecx,4), %eax
      lea table(,%ecx,4), %ebx
    ");
    assert_eq!(register(&machine, RegisterName::Eax), 30);
    assert_eq!(register(&machine, RegisterName::Ebx), 8);
    assert_eq!(lines[2], "\tlea table(,%ecx,4), %ebx");

    let (_, error) = line_error(run_with("lea %eax, %ebx", &config()));
    assert!(matches!(error, Error::LeaOperand(_)));
  }

  #[test]
  fn out_of_bounds_access(){
    let (line, error) = line_error(run_with("mov $5000, %ebx\nmov (%ebx), %eax", &config()));
    assert_eq!(line, 2);
    assert!(matches!(error, Error::OutOfBounds{ address: 5000, size: 4, capacity: MEMORY }));
  }

  #[test]
  fn unknown_mnemonics_pass_through(){
    let (_, lines) = run("cpuid\nmov $1, %eax");
    assert_eq!(lines, vec!["\tcpuid", "\tmovl $1, %eax"]);
  }

  #[test]
  fn stack_pointer_lines_bypass_simulation(){
    let (machine, lines) = run("subl $8, %esp\nmov $1, %eax");
    assert_eq!(machine.stack_pointer(), MEMORY as i64);
    assert_eq!(lines, vec!["\tsubl $8, %esp", "\tmovl $1, %eax"]);
  }

  #[test]
  fn step_limit_stops_runaway_programs(){
    let limited = Config{ step_limit: Some(100), ..config() };
    assert!(matches!(run_with("spin: jmp spin", &limited), Err(Error::StepLimitExceeded(100))));
  }

  #[test]
  fn machine_is_reset_between_programs(){
    let config          = config();
    let first           = load(".data\nx: .long 99\n.text\nmov $5, %eax\npush %eax\ncmp $9, %eax", &config).unwrap();
    let second          = load("mov %eax, %ebx", &config).unwrap();
    let mut machine     = Machine::new(config.memory_size);

    Engine::new(&config).run(&first, &mut machine).unwrap();
    assert_eq!(register(&machine, RegisterName::Eax), 5);

    Engine::new(&config).run(&second, &mut machine).unwrap();
    assert_eq!(register(&machine, RegisterName::Eax), 0);
    assert_eq!(register(&machine, RegisterName::Ebx), 0);
    assert_eq!(machine.memory.read(0, Width::Long).unwrap(), 0);
    assert!(machine.symbols.get(&DefaultAtom::from("x")).is_none());
    assert!(machine.stack_is_empty());
    assert!(!machine.flags.less);
  }

  #[test]
  fn specialize_renders_the_whole_program(){
    let config  = config();
    let program = load("
      .data
    msg: .asciz \"hi\"
      .text
      .globl _start
    _start:
      mov $3, %ecx
      add %ecx, %ecx
      mov $1, %eax
      int $0x80
    ", &config).unwrap();

    let mut machine = Machine::new(config.memory_size);
    let output      = specialize(&program, &mut machine, &config).unwrap();
    assert_eq!(
      output,
      "      .data\n    msg: .asciz \"hi\"\n.text\n.globl _start\n_start:\n\
       \tmovl $3, %ecx\n\tmovl $6, %ecx\n\tmovl $1, %eax\n\tint $0x80\n"
    );
    assert_eq!(machine.memory.read(2, Width::Byte).unwrap(), b'\n' as u32);
  }
}
