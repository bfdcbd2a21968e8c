//! The Rodent VM
//!
//! A register machine over the instruction graph built by `comp`:
//!
//! - `a`: accumulator, the value of the last form
//! - `x`: the next instruction
//! - `e`: the current environment
//! - `r`: pending arguments of an applicative, newest first
//! - `s`: the persistent control stack
//!
//! Operand evaluation for applicatives is compiled lazily, once the
//! combiner in the operator position is known.

#[cfg(feature = "extra")]
use comfy_table::Table;

use crate::builtins::Builtin;
use crate::chasm::{Insn, Stack};
use crate::combiner::{Combiner, Operative, Subr};
use crate::comp;
use crate::env::{operand_list, Env, WeakEnv};
use crate::error::{Meta, Result, SourceFileName};
use crate::form::{Atom, Form};
use crate::sexpr_parse::parse;
use crate::subrs;
use crate::swym::Sym;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::io;
use std::mem;
use std::rc::Rc;

#[cfg(feature = "extra")]
const TABLE_STYLE: &str = comfy_table::presets::UTF8_BORDERS_ONLY;

const GROUND_LISP: &str = include_str!("../lisp/ground.lisp");

/// Dead entries are swept from the call scope list once it grows this long.
const SCOPE_SWEEP_MIN: usize = 1024;

pub trait OutStream: io::Write + Debug {}

impl<T> OutStream for T where T: io::Write + Debug {}

/// Output shared between the VM and the natives that print.
pub type SharedOut = Rc<RefCell<Box<dyn OutStream>>>;

pub type ArgInt = u16;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ArgSpec {
    pub nargs: ArgInt,
    pub nopt: ArgInt,
    pub rest: bool,
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            write!(f, "{}..", self.nargs)
        } else if self.nopt > 0 {
            write!(f, "{}..{}", self.nargs, self.nargs + self.nopt)
        } else {
            write!(f, "{}", self.nargs)
        }
    }
}

impl ArgSpec {
    pub const fn is_valid_num(&self, nargs: u16) -> bool {
        (nargs == self.nargs) ||
        (self.rest && nargs >= self.nargs) ||
        (!self.rest && self.nopt > 0 &&
         nargs >= self.nargs && nargs <= self.nargs + self.nopt)
    }

    pub const fn normal(nargs: u16) -> ArgSpec {
        ArgSpec { nargs, nopt: 0, rest: false }
    }

    pub const fn opt(nargs: u16, nopt: u16) -> ArgSpec {
        ArgSpec { nargs, nopt, rest: false }
    }

    pub const fn rest(nargs: u16, nopt: u16) -> ArgSpec {
        ArgSpec { nargs, nopt, rest: true }
    }

    pub const fn any() -> ArgSpec {
        ArgSpec { nargs: 0, nopt: 0, rest: true }
    }

    /// Counts past `ArgInt::MAX` saturate, they can only match a rest spec.
    pub fn check(&self, nargs: usize) -> Result<()> {
        if self.is_valid_num(ArgInt::try_from(nargs).unwrap_or(ArgInt::MAX)) {
            Ok(())
        } else {
            Err(error!(ArgError,
                       expect: *self,
                       got_num: u32::try_from(nargs).unwrap_or(u32::MAX)))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// Instructions a single evaluation may execute.
    pub max_steps: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub steps: usize,
    pub peak_depth: usize,
    pub pushes: usize,
    pub pops: usize,
}

pub struct R8VM {
    a: Form,
    x: Rc<Insn>,
    e: Env,
    r: Form,
    s: Stack,

    ground: Env,
    toplevel: Env,
    ret: Rc<Insn>,
    limits: Limits,
    stats: Stats,
    /// Steps taken by the evaluation in progress.
    steps: usize,
    stdout: SharedOut,
    /// Call scopes, emptied when the machine is dropped.
    scopes: Vec<WeakEnv>,
    sweep_at: usize,
}

impl Default for R8VM {
    fn default() -> Self {
        R8VM::new()
    }
}

impl Drop for R8VM {
    /// Closures hold on to the scope they were closed in, and are often bound
    /// in that same scope. Emptying the scopes breaks those cycles.
    fn drop(&mut self) {
        self.s = Stack::default();
        self.toplevel.clear();
        self.ground.clear();
        for env in self.scopes.drain(..).filter_map(|w| w.upgrade()) {
            env.clear();
        }
    }
}

/// Reverse a proper list.
fn reverse(list: Form) -> Form {
    list.iter().fold(Form::Nil, |acc, x| Form::cons(x, acc))
}

impl R8VM {
    /// A machine with the ground environment installed and a fresh
    /// top-level environment below it.
    pub fn new() -> R8VM {
        let ground = Env::root();
        let stdout: SharedOut = Rc::new(RefCell::new(Box::new(io::stdout())));
        subrs::install(&ground, &stdout);
        ground.define(Builtin::Eval.sym(), Combiner::Eval.wrap().into());
        let toplevel = Env::extend(&ground);
        let mut vm = R8VM {
            a: Form::inert(),
            x: Insn::halt(),
            e: ground.clone(),
            r: Form::Nil,
            s: Stack::default(),
            ground,
            toplevel,
            ret: Insn::ret(),
            limits: Limits::default(),
            stats: Stats::default(),
            steps: 0,
            stdout,
            scopes: Vec::new(),
            sweep_at: SCOPE_SWEEP_MIN,
        };
        let ground = vm.ground.clone();
        if let Err(e) = vm.load_in("ground", GROUND_LISP, &ground) {
            panic!("Failed to load the ground environment: {e}");
        }
        vm.stats = Stats::default();
        vm
    }

    pub fn ground(&self) -> &Env {
        &self.ground
    }

    pub fn toplevel(&self) -> &Env {
        &self.toplevel
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    pub fn set_stdout(&mut self, out: Box<dyn OutStream>) {
        *self.stdout.borrow_mut() = out;
    }

    pub fn stdout(&self) -> SharedOut {
        self.stdout.clone()
    }

    /// Bind a native in the top-level environment, wrapped so that it
    /// receives evaluated arguments.
    pub fn register(&mut self, subr: impl Subr) {
        let name = Sym::new(subr.name());
        self.toplevel.define(name, Combiner::native(subr).wrap().into());
    }

    pub fn set(&mut self, name: &str, value: Form) {
        self.toplevel.define(Sym::new(name), value);
    }

    pub fn get(&self, name: &str) -> Option<Form> {
        self.toplevel.get(&Sym::new(name))
    }

    pub fn read(&self, text: &str) -> Result<Vec<Form>> {
        parse(text, None)
    }

    /// Evaluate `form` in the top-level environment.
    pub fn eval(&mut self, form: &Form) -> Result<Form> {
        let env = self.toplevel.clone();
        self.eval_in(form, &env)
    }

    pub fn eval_in(&mut self, form: &Form, env: &Env) -> Result<Form> {
        let code = comp::compile(form, Insn::halt())?;
        self.x = code;
        self.e = env.clone();
        self.a = Form::inert();
        self.r = Form::Nil;
        self.s = Stack::default();
        self.steps = 0;
        let res = self.run();
        self.x = Insn::halt();
        self.r = Form::Nil;
        self.s = Stack::default();
        self.e = self.toplevel.clone();
        res
    }

    /// Evaluate every form in `text`, returning the value of the last.
    pub fn eval_str(&mut self, text: &str) -> Result<Form> {
        let env = self.toplevel.clone();
        self.eval_str_in(text, None, &env)
    }

    fn eval_str_in(&mut self, text: &str, file: SourceFileName, env: &Env) -> Result<Form> {
        let mut res = Form::inert();
        for form in parse(text, file)? {
            res = self.eval_in(&form, env)?;
        }
        Ok(res)
    }

    fn load_in(&mut self, name: &'static str, text: &str, env: &Env) -> Result<Form> {
        self.eval_str_in(text, Some(Cow::Borrowed(name)), env)
            .map_err(|e| e.fallback(Meta::SourceFile(Cow::Borrowed(name))))
    }

    /// Evaluate source text in the top-level environment, attributing errors
    /// to `name`.
    pub fn load_with(&mut self, name: impl Into<String>, text: &str) -> Result<Form> {
        let name: Cow<'static, str> = Cow::Owned(name.into());
        let env = self.toplevel.clone();
        self.eval_str_in(text, Some(name.clone()), &env)
            .map_err(|e| e.fallback(Meta::SourceFile(name)))
    }

    /// Compile `form` and render the instruction graph.
    pub fn disassemble(&self, form: &Form) -> Result<String> {
        Ok(comp::compile(form, Insn::halt())?.to_string())
    }

    fn combiner(&self) -> Result<Combiner> {
        match &self.a {
            Form::Atom(Atom::Combiner(c)) => Ok(c.clone()),
            a => err!(NotCombinable, got: a.to_string()),
        }
    }

    fn track(&mut self, env: &Env) {
        if self.scopes.len() >= self.sweep_at {
            self.scopes.retain(WeakEnv::is_alive);
            self.sweep_at = (self.scopes.len() * 2).max(SCOPE_SWEEP_MIN);
        }
        self.scopes.push(env.downgrade());
    }

    /// Enter the body of an operative, a jump that pushes nothing.
    fn enter(&mut self, op: &Operative, operands: &Form) -> Result<()> {
        let env = Env::extend(&op.env);
        self.track(&env);
        env.bind(&op.ptree, operands)?;
        if let Form::Symbol(name) = &op.eformal {
            env.define(name.clone(), self.e.clone().into());
        }
        self.e = env;
        self.x = op.body.clone();
        Ok(())
    }

    /// Start evaluating `operands` onto the pending arguments, followed by a
    /// call to `combiner`.
    fn evaluate_operands(&mut self, operands: &Form, combiner: Combiner) -> Result<()> {
        let code = comp::compile_arguments(operands, combiner)
            .map_err(|e| match self.combiner().ok().and_then(|c| c.name()) {
                Some(name) => e.fop(Sym::new(&name)),
                None => e,
            })?;
        self.r = Form::Nil;
        self.x = code;
        Ok(())
    }

    fn call_native(&mut self, subr: &RefCell<dyn Subr>, operands: &Form) -> Result<()> {
        let mut subr = subr.borrow_mut();
        let args = operand_list(operands).map_err(|e| e.fop(Sym::new(subr.name())))?;
        self.a = subr.call(&args)
                     .map_err(|e| e.fop(Sym::new(subr.name())).from_native())?;
        self.x = self.ret.clone();
        Ok(())
    }

    fn call_eval(&mut self, operands: &Form) -> Result<()> {
        let args = operand_list(operands).map_err(|e| e.sop("eval"))?;
        let [form, env] = &args[..] else {
            return Err(error!(ArgError,
                              expect: ArgSpec::normal(2),
                              got_num: args.len() as u32)
                       .sop("eval")
                       .from_native())
        };
        let Some(env) = env.as_env() else {
            return Err(error!(TypeError, expect: "environment", got: env.to_string())
                       .sop("eval").argn(2))
        };
        log::debug!("eval {form}");
        self.x = comp::compile(form, self.ret.clone())?;
        self.e = env.clone();
        Ok(())
    }

    fn reinstate(&mut self, k: Stack, args: &Form) -> Result<()> {
        let mut it = args.iter();
        let value = match (it.next(), it.next()) {
            (None, _) => Form::inert(),
            (Some(v), None) if it.tail().is_nil() => v,
            _ => return err!(BindingMismatch,
                             expect: "at most one value".to_string(),
                             got: args.to_string()),
        };
        log::debug!("reinstating continuation at depth {} (from depth {})",
                    k.depth(), self.s.depth());
        self.s = k;
        self.a = value;
        self.x = self.ret.clone();
        Ok(())
    }

    /// Combine `c` with an unevaluated operand tree.
    fn apply(&mut self, c: Combiner, operands: &Form) -> Result<()> {
        match c {
            Combiner::Operative(op) => self.enter(&op, operands),
            Combiner::Applicative(inner) => self.evaluate_operands(operands, (*inner).clone()),
            Combiner::Native(subr) => self.call_native(&subr, operands),
            Combiner::Eval => self.call_eval(operands),
            k @ Combiner::Continuation(_) => self.evaluate_operands(operands, k),
        }
    }

    /// Combine `c` with operands that were just evaluated by
    /// `evaluate_operands`. Only continuations tell the two apart, they
    /// evaluate operands without being wrapped.
    fn combine(&mut self, c: Combiner, args: &Form) -> Result<()> {
        match c {
            Combiner::Continuation(k) => self.reinstate(k, args),
            c => self.apply(c, args),
        }
    }

    fn push(&mut self, ret: Rc<Insn>) {
        self.s = self.s.push(ret, self.e.clone(), self.r.clone());
        self.stats.pushes += 1;
        self.stats.peak_depth = self.stats.peak_depth.max(self.s.depth());
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        self.stats.steps += 1;
        match self.limits.max_steps {
            Some(lim) if self.steps > lim => err!(StepLimit, lim),
            _ => Ok(())
        }
    }

    fn run(&mut self) -> Result<Form> {
        loop {
            self.tick()?;
            let x = self.x.clone();
            log::trace!("{} [depth={}]", x.name(), self.s.depth());
            match &*x {
                Insn::Halt => return Ok(mem::replace(&mut self.a, Form::inert())),
                Insn::Refer(name, next) => {
                    self.a = self.e.lookup(name)?;
                    self.x = next.clone();
                }
                Insn::Constant(value, next) => {
                    self.a = value.clone();
                    self.x = next.clone();
                }
                Insn::Close(tpl, next) => {
                    self.a = Combiner::close(tpl, &self.e).into();
                    self.x = next.clone();
                }
                Insn::Define(ptree, next) => {
                    self.e.bind(ptree, &self.a)?;
                    self.a = Form::inert();
                    self.x = next.clone();
                }
                Insn::Assign(name, next) => {
                    let value = mem::replace(&mut self.a, Form::inert());
                    self.e.set(name, value)?;
                    self.x = next.clone();
                }
                Insn::Test(then, alt) => {
                    self.x = if self.a.is_false() { alt.clone() } else { then.clone() };
                }
                Insn::Frame(ret, next) => {
                    self.push(ret.clone());
                    self.x = next.clone();
                }
                Insn::Apply(operands) => {
                    let c = self.combiner()?;
                    self.apply(c, operands)?;
                }
                Insn::Argument(next) => {
                    let pending = mem::replace(&mut self.r, Form::Nil);
                    self.r = Form::cons(self.a.clone(), pending);
                    self.x = next.clone();
                }
                Insn::Conti(next) => {
                    log::debug!("capturing continuation at depth {}", self.s.depth());
                    let k: Form = Combiner::Continuation(self.s.clone()).into();
                    self.r = Form::cons(k.clone(), Form::Nil);
                    self.a = k;
                    self.x = next.clone();
                }
                Insn::Call => {
                    let c = self.combiner()?;
                    let args = reverse(mem::replace(&mut self.r, Form::Nil));
                    self.combine(c, &args)?;
                }
                Insn::Return => {
                    let Some(frame) = self.s.top() else {
                        return Ok(mem::replace(&mut self.a, Form::inert()))
                    };
                    self.x = frame.ret.clone();
                    self.e = frame.env.clone();
                    self.r = frame.args.clone();
                    let next = frame.next.clone();
                    self.s = next;
                    self.stats.pops += 1;
                }
            }
        }
    }

    #[cfg(feature = "extra")]
    pub fn dump_env_tbl(&self) -> Result<()> {
        use std::io::Write;

        let mut table = Table::new();

        table.load_preset(TABLE_STYLE);
        table.set_header(vec!["Symbol", "Value", "Scope"]);
        for (env, scope) in [(&self.toplevel, "toplevel"), (&self.ground, "ground")] {
            for name in env.names() {
                let value = env.get(&name).map(|v| v.to_string()).unwrap_or_default();
                table.add_row(vec![name.as_str(), value.as_str(), scope]);
            }
        }

        let mut stdout = self.stdout.borrow_mut();
        writeln!(stdout, "{}", table)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiner::NativeFn;
    use crate::error::{ErrorClass, ErrorKind};
    use crate::logging::setup_logging;

    fn vm() -> R8VM {
        setup_logging();
        R8VM::new()
    }

    fn run(vm: &mut R8VM, src: &str) -> Result<Form> {
        vm.eval_str(src)
    }

    fn read1(src: &str) -> Form {
        parse(src, None).unwrap().remove(0)
    }

    #[test]
    fn tail_recursion_runs_in_constant_stack() {
        let mut vm = vm();
        run(&mut vm, "($define! count ($lambda (n) ($if (=? n 0) 0 (count (- n 1)))))")
            .unwrap();
        vm.reset_stats();
        assert_eq!(run(&mut vm, "(count 100000)").unwrap(), Form::int(0));
        let stats = vm.stats();
        assert!(stats.peak_depth <= 3, "peak depth was {}", stats.peak_depth);
        assert_eq!(stats.pushes, stats.pops);
    }

    #[test]
    fn tail_recursive_operative_runs_in_constant_stack() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! $loop
              ($vau (n) env
                ($if (=? (eval n env) 0)
                     ($quote done)
                     (eval (list $loop (- (eval n env) 1)) env))))
        ").unwrap();
        vm.reset_stats();
        assert_eq!(run(&mut vm, "($loop 5000)").unwrap(), Form::sym("done"));
        assert!(vm.stats().peak_depth <= 4, "peak depth was {}", vm.stats().peak_depth);
    }

    #[test]
    fn non_tail_call_pushes_and_pops_frames() {
        let mut vm = vm();
        vm.register(NativeFn::new("f", |args: &[Form]| Ok(args[0].clone())));
        vm.register(NativeFn::new("g", |args: &[Form]| Ok(args[0].clone())));
        vm.reset_stats();
        assert_eq!(run(&mut vm, "(f (g 1))").unwrap(), Form::int(1));
        let stats = vm.stats();
        // One frame for the outer call, one to resume argument evaluation
        // after (g 1).
        assert_eq!(stats.pushes, 2);
        assert_eq!(stats.pops, 2);
        assert_eq!(stats.peak_depth, 2);
    }

    #[test]
    fn deep_non_tail_recursion_unwinds() {
        let mut vm = vm();
        run(&mut vm, "($define! sum ($lambda (n) ($if (=? n 0) 0 (+ n (sum (- n 1))))))")
            .unwrap();
        vm.reset_stats();
        assert_eq!(run(&mut vm, "(sum 1000)").unwrap(), Form::int(500500));
        let stats = vm.stats();
        assert!(stats.peak_depth > 1000);
        assert_eq!(stats.pushes, stats.pops);
    }

    #[test]
    fn operative_sees_raw_operands() {
        let mut vm = vm();
        run(&mut vm, "($define! V ($vau x #ignore (car x)))").unwrap();
        let raw = run(&mut vm, "(V (plus 1 2))").unwrap();
        assert_eq!(raw, read1("(plus 1 2)"));
        run(&mut vm, "($define! plus +)").unwrap();
        assert_eq!(run(&mut vm, "((wrap V) (plus 1 2))").unwrap(), Form::int(3));
    }

    #[test]
    fn operative_receives_dynamic_environment() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! $get ($vau (name) env (eval name env)))
            ($define! y 10)
            ($define! f ($lambda (y) ($get y)))
        ").unwrap();
        assert_eq!(run(&mut vm, "(f 3)").unwrap(), Form::int(3));
        assert_eq!(run(&mut vm, "($get y)").unwrap(), Form::int(10));
    }

    #[test]
    fn call_cc_escapes() {
        let mut vm = vm();
        assert_eq!(run(&mut vm, "(+ 1 (call/cc (lambda (k) (k 10))))").unwrap(),
                   Form::int(11));
        assert_eq!(run(&mut vm, "(+ 1 (call/cc (lambda (k) (+ 100 (k 10)))))").unwrap(),
                   Form::int(11));
        assert_eq!(run(&mut vm, "(+ 1 (call/cc (lambda (k) 5)))").unwrap(),
                   Form::int(6));
    }

    #[test]
    fn continuations_are_multi_shot() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! saved #inert)
            ($define! results ())
            ($define! v (+ 1 (call/cc (lambda (k) ($set! saved k) 1))))
            ($set! results (cons v results))
        ").unwrap();
        assert_eq!(vm.get("v").unwrap(), Form::int(2));

        // Re-enter after the capturing evaluation has completed.
        run(&mut vm, "(saved 10)").unwrap();
        assert_eq!(vm.get("v").unwrap(), Form::int(11));
        run(&mut vm, "($define! w (car (list (saved 20))))").unwrap();
        assert_eq!(vm.get("v").unwrap(), Form::int(21));
        assert!(vm.get("w").is_none());
        assert_eq!(vm.get("results").unwrap().to_string(), "(2)");
    }

    #[test]
    fn reentry_restores_pending_arguments() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! saved #inert)
            ($define! r (list 1 (call/cc (lambda (k) ($set! saved k) 2)) 3))
        ").unwrap();
        assert_eq!(vm.get("r").unwrap().to_string(), "(1 2 3)");
        run(&mut vm, "(saved 20)").unwrap();
        assert_eq!(vm.get("r").unwrap().to_string(), "(1 20 3)");
        run(&mut vm, "(saved 30)").unwrap();
        assert_eq!(vm.get("r").unwrap().to_string(), "(1 30 3)");
    }

    #[test]
    fn continuation_arity() {
        let mut vm = vm();
        assert_eq!(run(&mut vm, "(call/cc (lambda (k) (k)))").unwrap(), Form::inert());
        let err = run(&mut vm, "(call/cc (lambda (k) (k 1 2)))").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Binding);
    }

    #[test]
    fn shadowing() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! x 1)
            ($define! f ($lambda () ($define! x 2) x))
        ").unwrap();
        assert_eq!(run(&mut vm, "(f)").unwrap(), Form::int(2));
        assert_eq!(run(&mut vm, "x").unwrap(), Form::int(1));
    }

    #[test]
    fn unbound_variables() {
        let mut vm = vm();
        let err = run(&mut vm, "nope").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnboundVariable { .. }));
        let err = run(&mut vm, "($set! nope 1)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnboundVariable);
        assert!(vm.get("nope").is_none());
        let err = run(&mut vm, "(set! nope 1)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnboundVariable);
    }

    #[test]
    fn set_mutates_outer_binding() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! n 0)
            ($define! bump ($lambda () (set! n (+ n 1))))
            (bump) (bump)
        ").unwrap();
        assert_eq!(vm.get("n").unwrap(), Form::int(2));
    }

    #[test]
    fn quoted_data_round_trips() {
        let mut vm = vm();
        let form = read1("(a (b . c) 1 2.5 #t ())");
        let quoted = Form::from_vec(vec![Form::sym("$quote"), form.clone()]);
        let out = vm.eval(&quoted).unwrap();
        assert_eq!(out, form);
        assert!(out.is_eq(&form));
        run(&mut vm, "($define! d '(x y . z))").unwrap();
        assert_eq!(run(&mut vm, "(car (list d))").unwrap().to_string(), "(x y . z)");
    }

    #[test]
    fn not_combinable() {
        let mut vm = vm();
        let err = run(&mut vm, "(1 2 3)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotCombinable);
        let err = run(&mut vm, "(car 1)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Native);
    }

    #[test]
    fn binding_errors() {
        let mut vm = vm();
        run(&mut vm, "($define! f ($lambda (a b) a))").unwrap();
        let err = run(&mut vm, "(f 1)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Binding);
        let err = run(&mut vm, "($define! (a b) (list 1))").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Binding);
        run(&mut vm, "($define! (a . b) (list 1 2 3))").unwrap();
        assert_eq!(vm.get("b").unwrap().to_string(), "(2 3)");
        let err = run(&mut vm, "(+ 1 . 2)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Binding);
        let err = run(&mut vm, "((unwrap car) . x)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Binding);
    }

    #[test]
    fn ground_is_loaded() {
        let vm = vm();
        for name in ["list", "map", "apply", "$let", "$when"] {
            assert!(vm.ground().get(&Sym::new(name)).is_some(), "{name} missing");
        }
    }

    #[test]
    fn dropping_the_machine_frees_environments() {
        let mut vm = vm();
        run(&mut vm, "
            ($define! f ($lambda () 1))
            ($define! k (call/cc ($lambda (c) c)))
            ($define! make ($lambda () ($define! g ($lambda () 1)) g))
            ($define! h (make))
        ").unwrap();
        let toplevel = vm.toplevel().downgrade();
        let ground = vm.ground().downgrade();
        let h = vm.get("h").unwrap();
        let Some(Combiner::Operative(op)) = h.as_combiner().and_then(|c| c.underlying()) else {
            panic!("expected an applicative closure, got {h}")
        };
        let call_scope = op.env.downgrade();
        drop(h);
        run(&mut vm, "($set! h #inert)").unwrap();
        // `g` is still bound in the scope it was closed over.
        assert!(call_scope.is_alive());
        drop(vm);
        assert!(toplevel.upgrade().is_none());
        assert!(ground.upgrade().is_none());
        assert!(!call_scope.is_alive());
    }

    #[test]
    fn errors_reset_the_machine() {
        let mut vm = vm();
        assert!(run(&mut vm, "(+ 1 (car 2))").is_err());
        assert_eq!(run(&mut vm, "(+ 1 2)").unwrap(), Form::int(3));
    }

    #[test]
    fn step_limit() {
        let mut vm = vm();
        run(&mut vm, "($define! spin ($lambda () (spin)))").unwrap();
        vm.set_limits(Limits { max_steps: Some(10_000) });
        let err = run(&mut vm, "(spin)").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StepLimit { lim: 10_000 }));
        assert_eq!(err.class(), ErrorClass::Limit);
        assert_eq!(run(&mut vm, "(+ 1 2)").unwrap(), Form::int(3));
    }

    #[test]
    fn eval_in_given_environment() {
        let mut vm = vm();
        run(&mut vm, "($define! e (make-environment))").unwrap();
        let err = run(&mut vm, "(eval '(+ 1 2) e)").unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnboundVariable);
        assert_eq!(run(&mut vm, "(eval '(+ 1 2) (get-current-environment))").unwrap(),
                   Form::int(3));
        let err = run(&mut vm, "(eval 1 2)").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeError { .. }));
        let err = run(&mut vm, "(eval 1)").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ArgError { .. }));
        assert_eq!(err.class(), ErrorClass::Native);
    }

    #[test]
    fn disassemble() {
        let vm = vm();
        let listing = vm.disassemble(&read1("($lambda (x) (f x) x)")).unwrap();
        assert!(listing.starts_with("close lambda (x) #ignore"));
        assert!(listing.contains("\n    frame\n        refer x\n        return"));
    }

    #[test]
    fn arg_spec() {
        assert!(ArgSpec::normal(2).check(2).is_ok());
        assert!(ArgSpec::opt(2, 1).check(3).is_ok());
        assert!(ArgSpec::opt(2, 1).check(4).is_err());
        assert!(ArgSpec::rest(1, 0).check(7).is_ok());
        assert!(ArgSpec::rest(1, 0).check(0).is_err());
        assert!(ArgSpec::normal(1).check(65_537).is_err());
        assert!(ArgSpec::rest(1, 0).check(70_000).is_ok());
        assert_eq!(ArgSpec::opt(1, 2).to_string(), "1..3");
    }
}
