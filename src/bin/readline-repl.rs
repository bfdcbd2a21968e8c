use champi::logging::setup_logging;
use champi::repl::REPL;

fn main() {
    setup_logging();
    REPL::new().readline_repl()
}
