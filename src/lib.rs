//! # The **Champi** Kernel Interpreter
//!
//! Champi is an embeddable Lisp in the Kernel tradition. Combiners receive
//! their operands unevaluated (operatives, made with `$vau`) or evaluated
//! (applicatives, made by wrapping an operative). Forms are compiled to an
//! instruction graph and run on a register machine with proper tail calls
//! and multi-shot first-class continuations.
//!
//! ```lisp
//! ($define! $my-if
//!   ($vau (c t e) env
//!     ($if (eval c env) (eval t env) (eval e env))))
//! ($my-if #t 'yes (undefined-thing))
//! ```
//! ```text
//! yes
//! ```
//!
//! ## Running Champi from Rust
//!
//! ```rust
//! use champi::Champi;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut vm = Champi::new();
//!     vm.exec("($define! double ($lambda (x) (* x 2)))")?;
//!     let res = vm.eval("(double 21)")?;
//!     assert_eq!(res.to_string(), "42");
//!     Ok(())
//! }
//! ```

#![allow(clippy::upper_case_acronyms)]

#[macro_use]
pub(crate) mod utils;
#[macro_use]
pub(crate) mod error;
pub(crate) mod swym;
pub(crate) mod form;
pub(crate) mod env;
pub(crate) mod builtins;
pub(crate) mod combiner;
pub(crate) mod chasm;
pub(crate) mod comp;
pub(crate) mod r8vm;
pub(crate) mod subrs;
pub(crate) mod tokit;
pub(crate) mod sexpr_parse;
pub mod logging;
pub mod stylize;
#[cfg(feature = "readline")]
pub mod repl;

/// This module makes it possible to interact with Champi internals.
///
/// Everything in `raw::*` is unstable and might change upon the next release,
/// it is *not* a stable public API.
pub mod raw {
    pub mod r8vm { pub use crate::r8vm::*; }
    pub mod chasm { pub use crate::chasm::*; }
    pub mod comp { pub use crate::comp::*; }
    pub mod env { pub use crate::env::*; }
}

pub use crate::builtins::Builtin;
pub use crate::combiner::{Combiner, NativeFn, Subr};
pub use crate::env::Env;
pub use crate::error::{Error, ErrorClass, ErrorKind, Result, SyntaxErrorKind};
pub use crate::form::{Atom, Form};
pub use crate::r8vm::{ArgSpec, Limits, OutStream, Stats};
pub use crate::swym::Sym;

use crate::r8vm::R8VM;

/// A Champi Context
pub struct Champi {
    vm: R8VM
}

impl Champi {
    /// Create a new Champi VM, with the ground environment loaded.
    #[inline]
    pub fn new() -> Champi {
        Champi { vm: R8VM::new() }
    }

    /// Register a native combiner with the vm. It is bound in the top-level
    /// environment as an applicative.
    #[inline]
    pub fn register(&mut self, func: impl Subr) {
        self.vm.register(func);
    }

    /// Bind `var` to `obj` in the top-level environment.
    #[inline]
    pub fn set(&mut self, var: &str, obj: impl Into<Form>) {
        self.vm.set(var, obj.into());
    }

    /// Look up `var`, starting from the top-level environment.
    #[inline]
    pub fn get(&self, var: &str) -> Option<Form> {
        self.vm.get(var)
    }

    /// Read every datum in `text`, without evaluating anything.
    #[inline]
    pub fn read(&self, text: impl AsRef<str>) -> Result<Vec<Form>> {
        self.vm.read(text.as_ref())
    }

    /// Run every expression in `expr`, and return the value of the last
    /// one.
    ///
    /// # Arguments
    ///
    /// - `expr` : Lisp expression
    #[inline]
    pub fn eval(&mut self, expr: impl AsRef<str>) -> Result<Form> {
        self.vm.eval_str(expr.as_ref())
    }

    /// Run an expression and ignore the result (unless there was an error.)
    #[inline]
    pub fn exec(&mut self, expr: impl AsRef<str>) -> Result<()> {
        self.eval(expr).map(|_| ())
    }

    /// Evaluate an already-read form in the top-level environment.
    #[inline]
    pub fn eval_form(&mut self, form: &Form) -> Result<Form> {
        self.vm.eval(form)
    }

    /// Evaluate a source file's contents, this is useful when embedding code
    /// into your binary with e.g `load_with(x, include_str!(...))`.
    ///
    /// # Arguments
    ///
    /// - `src_path` : Path to the `.lisp` file, used in error messages.
    /// - `code` : The source-code contents of `src_path`
    #[inline]
    pub fn load_with(&mut self, src_path: impl AsRef<str>, code: impl AsRef<str>) -> Result<Form> {
        self.vm.load_with(src_path.as_ref(), code.as_ref())
    }

    #[inline]
    pub fn set_limits(&mut self, limits: Limits) {
        self.vm.set_limits(limits);
    }

    /// Counters for the evaluations since the last `reset_stats`.
    #[inline]
    pub fn stats(&self) -> Stats {
        self.vm.stats()
    }

    #[inline]
    pub fn reset_stats(&mut self) {
        self.vm.reset_stats();
    }

    /// Redirect `display` and `newline`.
    #[inline]
    pub fn set_stdout(&mut self, out: Box<dyn OutStream>) {
        self.vm.set_stdout(out);
    }

    /// Render the instruction graph of every form in `expr`.
    pub fn disassemble(&self, expr: impl AsRef<str>) -> Result<String> {
        let listings = self.read(expr)?
                           .iter()
                           .map(|form| self.vm.disassemble(form))
                           .collect::<Result<Vec<_>>>()?;
        Ok(listings.join("\n\n"))
    }

    /// Print a table of the top-level and ground bindings.
    #[cfg(feature = "extra")]
    #[inline]
    pub fn dump_env(&self) -> Result<()> {
        self.vm.dump_env_tbl()
    }
}

impl Default for Champi {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::setup_logging;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    fn vm() -> Champi {
        setup_logging();
        Champi::new()
    }

    fn eval(vm: &mut Champi, src: &str) -> String {
        vm.eval(src).unwrap().to_string()
    }

    #[derive(Debug, Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    #[test]
    fn ground_prelude() {
        let mut vm = vm();
        assert_eq!(eval(&mut vm, "(list 1 (+ 1 1) 'x)"), "(1 2 x)");
        assert_eq!(eval(&mut vm, "(cadr '(a b c))"), "b");
        assert_eq!(eval(&mut vm, "(map ($lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
        assert_eq!(eval(&mut vm, "(apply + '(1 2 3))"), "6");
        assert_eq!(eval(&mut vm, "(apply list '(1 2))"), "(1 2)");
        assert_eq!(eval(&mut vm, "($let ((x 1) (y 2)) (+ x y))"), "3");
        assert_eq!(eval(&mut vm, "($when (<? 1 2) 'a 'b)"), "b");
        assert_eq!(eval(&mut vm, "($when #f 'a)"), "#inert");
        assert_eq!(eval(&mut vm, "($unless #f 'a)"), "a");
        assert_eq!(eval(&mut vm, "($unless 1 'a)"), "#inert");
    }

    #[test]
    fn apply_in_an_environment() {
        let mut vm = vm();
        vm.exec("($define! x 10)").unwrap();
        assert_eq!(eval(&mut vm, "(apply (wrap ($vau () e (eval 'x e))) () (get-current-environment))"),
                   "10");
    }

    #[test]
    fn user_defined_special_forms() {
        let mut vm = vm();
        vm.exec("($define! $my-if
                   ($vau (c t e) env
                     ($if (eval c env) (eval t env) (eval e env))))").unwrap();
        assert_eq!(eval(&mut vm, "($my-if #t 'yes (undefined-thing))"), "yes");
        assert_eq!(eval(&mut vm, "($my-if #f (undefined-thing) 'no)"), "no");
    }

    #[test]
    fn register_and_bindings() {
        let mut vm = vm();
        vm.register(NativeFn::new("twice", |args: &[Form]| {
            let [x] = args else { return Ok(Form::inert()) };
            Ok(Form::list([x.clone(), x.clone()], Form::Nil))
        }));
        vm.set("n", 21i64);
        assert_eq!(eval(&mut vm, "(twice (+ n n))"), "(42 42)");
        assert!(vm.get("n").unwrap().is_eq(&Form::int(21)));
        assert!(vm.get("nope").is_none());
        assert!(vm.get("car").is_some());
    }

    #[test]
    fn eval_returns_the_last_value() {
        let mut vm = vm();
        assert_eq!(eval(&mut vm, "1 2 3"), "3");
        assert_eq!(eval(&mut vm, ""), "#inert");
        let forms = vm.read("(a b) c").unwrap();
        assert_eq!(forms.len(), 2);
        vm.set("c", 5i64);
        assert!(vm.eval_form(&forms[1]).unwrap().is_eq(&Form::int(5)));
    }

    #[test]
    fn load_with_names_the_file() {
        let mut vm = vm();
        let err = vm.load_with("lib.lisp", "($define! a 1)\n(frob a)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnboundVariable);
        assert!(err.to_string().contains("lib.lisp"), "{err}");
        assert!(vm.get("a").is_some());
        let err = vm.load_with("bad.lisp", "(a\n (b)").unwrap_err();
        assert_eq!(err.to_string(),
                   "Unclosed Delimiter: Found `(' which was not closed in input [bad.lisp 1:1]");
    }

    #[test]
    fn display_output() {
        let mut vm = vm();
        let sink = Sink::default();
        vm.set_stdout(Box::new(sink.clone()));
        vm.exec("(display 1) (newline) (map display (list 'a 'b))").unwrap();
        assert_eq!(sink.contents(), "1\nab");
    }

    #[test]
    fn step_limits() {
        let mut vm = vm();
        vm.exec("($define! spin ($lambda () (spin)))").unwrap();
        vm.set_limits(Limits { max_steps: Some(10_000) });
        let err = vm.eval("(spin)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Limit);
        assert_eq!(eval(&mut vm, "(+ 1 2)"), "3");
    }

    #[test]
    fn generators_with_continuations() {
        let mut vm = vm();
        let sink = Sink::default();
        vm.set_stdout(Box::new(sink.clone()));
        vm.exec("($define! k #inert)
                 ($define! n 0)
                 ($sequence
                   (display (+ 100 (call/cc ($lambda (c) ($set! k c) 0))))
                   ($set! n (+ n 1))
                   ($when (<? n 3) (k n)))").unwrap();
        assert_eq!(sink.contents(), "100101102");
    }

    #[test]
    fn disassemble_forms() {
        let vm = vm();
        assert_eq!(vm.disassemble("1 x").unwrap(), "constant 1\nhalt\n\nrefer x\nhalt");
        assert!(vm.disassemble("($if)").is_err());
    }
}
