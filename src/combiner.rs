//! Combiners
//!
//! Everything that can sit in the operator position of a combination. The
//! machine dispatches on this enum in exactly one place, `R8VM::apply`, and
//! its evaluated-argument counterpart `R8VM::combine`.

use crate::chasm::{Insn, Stack, Template};
use crate::env::Env;
use crate::error::Result;
use crate::form::Form;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A native combiner, implemented by the host.
///
/// A native receives its operand list as an ordered slice. Registered
/// natives are wrapped, so in practice that slice holds evaluated
/// arguments.
pub trait Subr: 'static {
    fn call(&mut self, args: &[Form]) -> Result<Form>;
    fn name(&self) -> &str;
}

/// A closure with a name, for registering natives without declaring a type.
pub struct NativeFn<F> {
    name: String,
    funk: F,
}

impl<F> NativeFn<F> where F: FnMut(&[Form]) -> Result<Form> + 'static {
    pub fn new(name: impl Into<String>, funk: F) -> NativeFn<F> {
        NativeFn { name: name.into(), funk }
    }
}

impl<F> Subr for NativeFn<F> where F: FnMut(&[Form]) -> Result<Form> + 'static {
    fn call(&mut self, args: &[Form]) -> Result<Form> {
        (self.funk)(args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct Operative {
    /// Static environment, captured when the operative was closed.
    pub env: Env,
    pub ptree: Form,
    /// Either a symbol naming the caller's environment, or `#ignore`.
    pub eformal: Form,
    pub body: Rc<Insn>,
    /// The body forms, for printing and disassembly.
    pub source: Form,
}

#[derive(Clone)]
pub enum Combiner {
    Operative(Rc<Operative>),
    Applicative(Rc<Combiner>),
    Native(Rc<RefCell<dyn Subr>>),
    Continuation(Stack),
    Eval,
}

impl Combiner {
    /// Close a compiled `$vau`/`$lambda` template over `env`.
    pub fn close(tpl: &Template, env: &Env) -> Combiner {
        let op = Combiner::Operative(Rc::new(Operative {
            env: env.clone(),
            ptree: tpl.ptree.clone(),
            eformal: tpl.eformal.clone(),
            body: tpl.body.clone(),
            source: tpl.source.clone(),
        }));
        if tpl.wrap {
            op.wrap()
        } else {
            op
        }
    }

    pub fn native(subr: impl Subr) -> Combiner {
        Combiner::Native(Rc::new(RefCell::new(subr)))
    }

    pub fn wrap(self) -> Combiner {
        Combiner::Applicative(Rc::new(self))
    }

    /// The underlying combiner of an applicative.
    pub fn underlying(&self) -> Option<&Combiner> {
        match self {
            Combiner::Applicative(inner) => Some(inner),
            _ => None
        }
    }

    /// True for combiners that receive their operands unevaluated. Natives
    /// and `eval` are operatives at heart, the ground environment binds them
    /// wrapped.
    pub fn is_operative(&self) -> bool {
        matches!(self, Combiner::Operative(_) | Combiner::Native(_) | Combiner::Eval)
    }

    /// Continuations are neither: they evaluate their operands without
    /// having an underlying combiner.
    pub fn is_applicative(&self) -> bool {
        matches!(self, Combiner::Applicative(_))
    }

    pub fn same(&self, other: &Combiner) -> bool {
        use Combiner::*;
        match (self, other) {
            (Operative(u), Operative(v)) => Rc::ptr_eq(u, v),
            (Applicative(u), Applicative(v)) => Rc::ptr_eq(u, v),
            (Native(u), Native(v)) =>
                Rc::as_ptr(u) as *const u8 == Rc::as_ptr(v) as *const u8,
            (Continuation(u), Continuation(v)) => u.same(v),
            (Eval, Eval) => true,
            _ => false
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Combiner::Operative(_) => "operative",
            Combiner::Applicative(_) => "applicative",
            Combiner::Native(_) => "native",
            Combiner::Continuation(_) => "continuation",
            Combiner::Eval => "operative",
        }
    }

    pub fn name(&self) -> Option<String> {
        match self {
            Combiner::Native(f) => Some(f.borrow().name().to_string()),
            Combiner::Applicative(inner) => inner.name(),
            Combiner::Eval => Some("eval".to_string()),
            _ => None
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combiner::Operative(op) => write!(f, "#[operative {}]", op.ptree),
            Combiner::Applicative(inner) => write!(f, "#[applicative {inner}]"),
            Combiner::Native(subr) => match subr.try_borrow() {
                Ok(subr) => write!(f, "#[native {}]", subr.name()),
                Err(_) => write!(f, "#[native]"),
            },
            Combiner::Continuation(k) => write!(f, "#[continuation {}]", k.depth()),
            Combiner::Eval => write!(f, "#[eval]"),
        }
    }
}
