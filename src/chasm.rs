//! ChASM /ˈkæz(ə)m/, the instruction graph
//!
//! Compiled code is a graph of `Insn` nodes, each holding the instruction to
//! run after it. Nodes are shared through `Rc`, both branches of a `Test`
//! point at the same downstream node, and frames on the control stack point
//! back into the graph to say where to resume.

use crate::env::Env;
use crate::form::Form;
use crate::swym::Sym;
use std::fmt::{self, Write};
use std::rc::Rc;

/// A compiled `$vau` or `$lambda`, closed over the current environment by
/// the `Close` instruction.
pub struct Template {
    pub ptree: Form,
    pub eformal: Form,
    /// Compiled against `Return`.
    pub body: Rc<Insn>,
    pub source: Form,
    /// Produce an applicative instead of a bare operative.
    pub wrap: bool,
}

pub enum Insn {
    Halt,
    Refer(Sym, Rc<Insn>),
    Constant(Form, Rc<Insn>),
    Close(Rc<Template>, Rc<Insn>),
    /// Bind the accumulator to a parameter tree in the current environment.
    Define(Form, Rc<Insn>),
    /// Mutate the nearest binding of a name.
    Assign(Sym, Rc<Insn>),
    Test(Rc<Insn>, Rc<Insn>),
    Frame(Rc<Insn>, Rc<Insn>),
    /// Combine the accumulator with an unevaluated operand tree.
    Apply(Form),
    /// Push the accumulator onto the pending arguments.
    Argument(Rc<Insn>),
    Conti(Rc<Insn>),
    /// Combine the accumulator with the pending arguments.
    Call,
    Return,
}

impl Insn {
    pub fn halt() -> Rc<Insn> {
        Rc::new(Insn::Halt)
    }

    pub fn ret() -> Rc<Insn> {
        Rc::new(Insn::Return)
    }

    #[inline]
    pub fn is_return(&self) -> bool {
        matches!(self, Insn::Return)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Insn::Halt => "halt",
            Insn::Refer(..) => "refer",
            Insn::Constant(..) => "constant",
            Insn::Close(..) => "close",
            Insn::Define(..) => "define",
            Insn::Assign(..) => "assign",
            Insn::Test(..) => "test",
            Insn::Frame(..) => "frame",
            Insn::Apply(..) => "apply",
            Insn::Argument(..) => "argument",
            Insn::Conti(..) => "conti",
            Insn::Call => "call",
            Insn::Return => "return",
        }
    }

    /// The instruction that follows in a straight-line listing.
    fn next(&self) -> Option<&Rc<Insn>> {
        match self {
            Insn::Refer(_, next) | Insn::Constant(_, next) |
            Insn::Close(_, next) | Insn::Define(_, next) |
            Insn::Assign(_, next) | Insn::Frame(_, next) |
            Insn::Argument(next) | Insn::Conti(next) => Some(next),
            _ => None
        }
    }

    fn dump(&self, out: &mut String, depth: usize) -> fmt::Result {
        let mut insn = self;
        loop {
            write!(out, "{:1$}", "", depth * 4)?;
            match insn {
                Insn::Refer(name, _) => writeln!(out, "refer {name}")?,
                Insn::Constant(v, _) => writeln!(out, "constant {v}")?,
                Insn::Close(tpl, _) => {
                    let kind = if tpl.wrap { "lambda" } else { "vau" };
                    writeln!(out, "close {kind} {} {}", tpl.ptree, tpl.eformal)?;
                    tpl.body.dump(out, depth + 1)?;
                }
                Insn::Define(ptree, _) => writeln!(out, "define {ptree}")?,
                Insn::Assign(name, _) => writeln!(out, "assign {name}")?,
                Insn::Test(then, alt) => {
                    writeln!(out, "test")?;
                    then.dump(out, depth + 1)?;
                    write!(out, "{:1$}", "", depth * 4)?;
                    writeln!(out, "else")?;
                    alt.dump(out, depth + 1)?;
                }
                Insn::Frame(ret, _) => {
                    writeln!(out, "frame")?;
                    ret.dump(out, depth + 1)?;
                }
                Insn::Apply(operands) => writeln!(out, "apply {operands}")?,
                insn => writeln!(out, "{}", insn.name())?,
            }
            match insn.next() {
                Some(next) => insn = next,
                None => return Ok(())
            }
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.dump(&mut out, 0)?;
        write!(f, "{}", out.trim_end())
    }
}

impl fmt::Debug for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

pub struct Frame {
    pub ret: Rc<Insn>,
    pub env: Env,
    /// Pending arguments at the time of the push.
    pub args: Form,
    pub next: Stack,
    depth: usize,
}

/// Persistent control stack. Pushing allocates a new frame pointing at the
/// old stack, frames are never mutated after that, so any number of
/// continuations can share a suffix with the live stack.
#[derive(Clone, Default)]
pub struct Stack(Option<Rc<Frame>>);

impl Stack {
    pub fn push(&self, ret: Rc<Insn>, env: Env, args: Form) -> Stack {
        let depth = self.depth() + 1;
        Stack(Some(Rc::new(Frame { ret, env, args, next: self.clone(), depth })))
    }

    pub fn top(&self) -> Option<&Frame> {
        self.0.as_deref()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.as_ref().map(|f| f.depth).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn same(&self, other: &Stack) -> bool {
        match (&self.0, &other.0) {
            (Some(u), Some(v)) => Rc::ptr_eq(u, v),
            (None, None) => true,
            _ => false
        }
    }
}

impl Drop for Stack {
    /// Unlink uniquely owned frames one at a time, a deep stack would
    /// otherwise be dropped recursively.
    fn drop(&mut self) {
        let mut head = self.0.take();
        while let Some(frame) = head {
            match Rc::try_unwrap(frame) {
                Ok(mut frame) => head = frame.next.0.take(),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_share_the_suffix() {
        let env = Env::root();
        let base = Stack::default().push(Insn::halt(), env.clone(), Form::Nil);
        let a = base.push(Insn::ret(), env.clone(), Form::Nil);
        let b = base.push(Insn::ret(), env, Form::int(1));
        assert_eq!(a.depth(), 2);
        assert_eq!(b.depth(), 2);
        assert!(a.top().unwrap().next.same(&base));
        assert!(b.top().unwrap().next.same(&base));
        assert!(!a.same(&b));
        assert!(matches!(*base.top().unwrap().ret, Insn::Halt));
    }

    #[test]
    fn deep_stacks_drop() {
        let env = Env::root();
        let mut s = Stack::default();
        for _ in 0..500_000 {
            s = s.push(Insn::ret(), env.clone(), Form::Nil);
        }
        assert_eq!(s.depth(), 500_000);
        drop(s);
    }

    #[test]
    fn dump_listing() {
        let code = Rc::new(Insn::Refer(
            Sym::new("x"),
            Rc::new(Insn::Test(
                Rc::new(Insn::Constant(Form::int(1), Insn::halt())),
                Rc::new(Insn::Constant(Form::int(2), Insn::halt()))))));
        assert_eq!(code.to_string(),
                   "refer x\ntest\n    constant 1\n    halt\nelse\n    constant 2\n    halt");
        assert_eq!(format!("{code:?}"), code.to_string());
    }
}
