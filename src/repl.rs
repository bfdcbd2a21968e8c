//! Interactive Read-Eval-Print-Loop

use crate::error::{ErrorKind, Result};
use crate::form::{Atom, Form};
use crate::stylize::Stylize;
use crate::Champi;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::fs;
use std::path::PathBuf;

fn make_intro() -> String {
    format!("
{read} {arrow} {eval} {arrow} {print} {arrow} {lp}
 ┗━━━━━━━━━━━━━━━━━━━━━━┛
Type ,help for commands, Ctrl-D to exit.\n",
            read="read".style_intro(),
            eval="eval".style_intro(),
            print="print".style_intro(),
            lp="loop".style_intro(),
            arrow="➟"
    )
}

const HELP: &str = "\
,help          Show this message
,env           Show the top-level and ground bindings
,dis <expr>    Show the instruction graph of <expr>
,stats         Show machine counters since the last input";

fn history_path() -> Option<PathBuf> {
    let mut dir = dirs::data_local_dir()?;
    dir.push("champi");
    fs::create_dir_all(&dir).ok()?;
    dir.push("history");
    Some(dir)
}

/// Input that only lacks closing delimiters, more lines may complete it.
fn is_incomplete(input: &str, vm: &Champi) -> bool {
    matches!(vm.read(input).map_err(|e| e.kind().clone()),
             Err(ErrorKind::UnclosedDelimiter { .. } | ErrorKind::TrailingModifiers { .. }))
}

pub struct REPL {
    vm: Champi,
}

impl REPL {
    pub fn new() -> REPL {
        REPL { vm: Champi::new() }
    }

    fn command(&mut self, cmd: &str, arg: &str) -> Result<()> {
        match cmd {
            ",help" => println!("{HELP}"),
            #[cfg(feature = "extra")]
            ",env" => self.vm.dump_env()?,
            ",dis" => println!("{}", self.vm.disassemble(arg)?.style_insn()),
            ",stats" => {
                let s = self.vm.stats();
                println!("steps: {}, peak depth: {}, pushes: {}, pops: {}",
                         s.steps, s.peak_depth, s.pushes, s.pops);
            }
            _ => println!("{} {cmd}, try ,help",
                          "Unknown command:".style_warning()),
        }
        Ok(())
    }

    /// Evaluate one complete input and print the result.
    pub fn eval(&mut self, input: &str) {
        let input = input.trim();
        if input.starts_with(',') {
            let (cmd, arg) = input.split_once(char::is_whitespace)
                                  .unwrap_or((input, ""));
            if let Err(e) = self.command(cmd, arg) {
                println!("{}", e.to_string().style_error());
            }
            return
        }
        self.vm.reset_stats();
        match self.vm.eval(input) {
            Ok(Form::Atom(Atom::Inert)) => {}
            Ok(res) => {
                print!("{}", "=> ".style_ret());
                println!("{res}");
            }
            Err(e) => println!("{}", e.to_string().style_error()),
        }
    }

    pub fn readline_repl(&mut self) {
        println!("{}", make_intro());
        let hist_path = history_path();
        let mut rl = Editor::<()>::new();
        match &hist_path {
            Some(path) => if rl.load_history(path).is_err() {
                println!("{} {}",
                         "Warning: No history log, will be created in".style_warning(),
                         path.to_string_lossy().style_info());
            },
            None => println!("{}", "Warning: No data directory for the history log"
                             .style_warning()),
        }
        let mut pending = String::new();
        loop {
            let prompt = if pending.is_empty() { "λ> " } else { ".. " };
            match rl.readline(&prompt.style_prompt().to_string()) {
                Ok(line) => {
                    pending.push_str(&line);
                    pending.push('\n');
                    if is_incomplete(&pending, &self.vm) {
                        continue
                    }
                    rl.add_history_entry(pending.trim());
                    let input = std::mem::take(&mut pending);
                    self.eval(&input);
                }
                Err(ReadlineError::Interrupted) if !pending.is_empty() => pending.clear(),
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    println!("Read Error: {:?}", err);
                    break
                }
            }
        }
        if let Some(path) = &hist_path {
            if let Err(e) = rl.save_history(path) {
                log::warn!("Could not save history: {e}");
            }
        }
    }
}

impl Default for REPL {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_input_waits_for_more() {
        let vm = Champi::new();
        assert!(is_incomplete("($define! f\n", &vm));
        assert!(is_incomplete("'", &vm));
        assert!(!is_incomplete("(f 1)", &vm));
        assert!(!is_incomplete("(f 1))", &vm));
    }

    #[test]
    fn commands_keep_the_session() {
        let mut repl = REPL::new();
        repl.eval("($define! x 1)");
        repl.eval(",dis (f x)");
        repl.eval(",nope");
        repl.eval("(car)");
        assert!(repl.vm.get("x").unwrap().is_eq(&Form::int(1)));
    }
}
