/*!
  `x86spec FILE...`

  Each FILE is read from `asmFiles/`, executed, and its specialized rewrite written under the
  same name to `asmOut/`. A file that cannot be read, loaded, run, or written is reported
  and skipped; the remaining files are still processed.

  Diagnostics go to stderr and are filtered with `RUST_LOG` (default `warn`).
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate tracing;

mod config;
mod emitter;
mod engine;
mod error;
mod flags;
mod instruction;
mod loader;
mod machine;
mod memory;
mod operand;
mod register;
mod symboltable;
mod token;

use std::fs;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::machine::Machine;

const USAGE: &str = "PLEASE GIVE ME AT LEAST 1 FILE!
usage: x86spec FILE...
  Reads each FILE from asmFiles/ and writes its specialized rewrite to asmOut/.";

fn process_file(name: &str, config: &Config, machine: &mut Machine) -> Result<PathBuf> {
  let input = config.input_directory.join(name);
  let text  = fs::read_to_string(&input)
                .map_err(|source| Error::Io{ path: input.display().to_string(), source })?;

  let program = loader::load(&text, config)?;
  let output  = engine::specialize(&program, machine, config)?;

  let path = config.output_directory.join(name);
  fs::write(&path, output).map_err(|source| Error::Io{ path: path.display().to_string(), source })?;
  Ok(path)
}

fn main() {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .init();

  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  let files: Vec<String> = std::env::args().skip(1).collect();
  if files.is_empty() {
    println!("{}", USAGE);
    return;
  }

  let config = Config::default();
  if let Err(error) = fs::create_dir_all(&config.output_directory) {
    error!("cannot create {}: {}", config.output_directory.display(), error);
  }

  let mut machine = Machine::new(config.memory_size);
  for file in &files {
    match process_file(file, &config, &mut machine) {
      Ok(path)   => info!("wrote {}", path.display()),
      Err(error) => error!("{}: {}", file, error),
    }
  }
}
