use champi::logging::setup_logging;
use champi::Champi;
use std::env;
use std::fs;
use std::io::prelude::*;
use std::io;
use std::process;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();
    let args: Vec<String> = env::args().skip(1).collect();
    let (name, code) = match &args[..] {
        [file] => (file.clone(), fs::read_to_string(file)?),
        [] => {
            let mut code = String::new();
            io::stdin().read_to_string(&mut code)?;
            ("<stdin>".to_string(), code)
        }
        _ => {
            eprintln!("Usage: main [FILE]");
            process::exit(2);
        }
    };
    let mut vm = Champi::new();
    if let Err(e) = vm.load_with(name, code) {
        eprintln!("{}", e);
        process::exit(1);
    }
    io::stdout().flush()?;
    let stats = vm.stats();
    log::debug!("{} steps, peak depth {}", stats.steps, stats.peak_depth);

    Ok(())
}
