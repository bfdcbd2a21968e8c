//! Symbolic Expressions
//!
//! `Form` is the one data representation for both code and data. Pairs are
//! immutable and shared through `Rc`, so handing an operand tree from the
//! compiler to the machine, or from the machine into an environment, never
//! copies it.

use crate::combiner::Combiner;
use crate::env::Env;
use crate::swym::Sym;
use std::fmt;
use std::mem;
use std::rc::Rc;

#[derive(Clone)]
pub enum Form {
    Nil,
    Symbol(Sym),
    Pair(Rc<Pair>),
    Atom(Atom),
}

#[derive(Clone)]
pub struct Pair {
    pub car: Form,
    pub cdr: Form,
}

impl Drop for Pair {
    /// Unlink uniquely owned cdrs one at a time, a long list would otherwise
    /// be dropped recursively.
    fn drop(&mut self) {
        let mut tail = mem::replace(&mut self.cdr, Form::Nil);
        while let Form::Pair(p) = tail {
            match Rc::try_unwrap(p) {
                Ok(mut pair) => tail = mem::replace(&mut pair.cdr, Form::Nil),
                Err(_) => break,
            }
        }
    }
}

#[derive(Clone)]
pub enum Atom {
    Int(i64),
    Real(f64),
    Bool(bool),
    Ignore,
    Inert,
    Combiner(Combiner),
    Env(Env),
}

impl Form {
    pub fn sym(name: &str) -> Form {
        Form::Symbol(Sym::new(name))
    }

    pub fn int(x: i64) -> Form {
        Form::Atom(Atom::Int(x))
    }

    pub fn real(x: f64) -> Form {
        Form::Atom(Atom::Real(x))
    }

    pub fn bool(x: bool) -> Form {
        Form::Atom(Atom::Bool(x))
    }

    pub fn inert() -> Form {
        Form::Atom(Atom::Inert)
    }

    pub fn ignore() -> Form {
        Form::Atom(Atom::Ignore)
    }

    pub fn cons(car: Form, cdr: Form) -> Form {
        Form::Pair(Rc::new(Pair { car, cdr }))
    }

    /// Build a proper list.
    pub fn list(items: impl IntoIterator<Item = Form>,
                tail: Form) -> Form
    {
        let items: Vec<_> = items.into_iter().collect();
        items.into_iter()
             .rev()
             .fold(tail, |acc, x| Form::cons(x, acc))
    }

    pub fn from_vec(items: Vec<Form>) -> Form {
        Form::list(items, Form::Nil)
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Form::Nil)
    }

    /// Either a pair or nil.
    #[inline]
    pub fn is_compound(&self) -> bool {
        matches!(self, Form::Nil | Form::Pair(_))
    }

    #[inline]
    pub fn is_false(&self) -> bool {
        matches!(self, Form::Atom(Atom::Bool(false)))
    }

    pub fn car(&self) -> Option<&Form> {
        match self {
            Form::Pair(p) => Some(&p.car),
            _ => None
        }
    }

    pub fn cdr(&self) -> Option<&Form> {
        match self {
            Form::Pair(p) => Some(&p.cdr),
            _ => None
        }
    }

    pub fn as_sym(&self) -> Option<&Sym> {
        match self {
            Form::Symbol(s) => Some(s),
            _ => None
        }
    }

    pub fn as_combiner(&self) -> Option<&Combiner> {
        match self {
            Form::Atom(Atom::Combiner(c)) => Some(c),
            _ => None
        }
    }

    pub fn as_env(&self) -> Option<&Env> {
        match self {
            Form::Atom(Atom::Env(e)) => Some(e),
            _ => None
        }
    }

    /// Iterate over the elements of a list, stopping at the first non-pair
    /// tail. Use `ConsIter::tail` afterwards to see what terminated it.
    pub fn iter(&self) -> ConsIter {
        ConsIter { head: self.clone() }
    }

    /// Elements of a proper list, `None` for dotted lists and non-lists.
    pub fn to_vec(&self) -> Option<Vec<Form>> {
        let mut it = self.iter();
        let xs: Vec<_> = it.by_ref().collect();
        it.tail().is_nil().then_some(xs)
    }

    /// Structural equality, combiners and environments compare by identity.
    pub fn equal(&self, other: &Form) -> bool {
        let (mut u, mut v) = (self, other);
        loop {
            match (u, v) {
                (Form::Pair(x), Form::Pair(y)) => {
                    if Rc::ptr_eq(x, y) {
                        return true
                    }
                    if !x.car.equal(&y.car) {
                        return false
                    }
                    u = &x.cdr;
                    v = &y.cdr;
                }
                _ => return u.is_eq(v)
            }
        }
    }

    /// Identity, numbers and symbols compare by value.
    pub fn is_eq(&self, other: &Form) -> bool {
        use Atom::*;
        match (self, other) {
            (Form::Nil, Form::Nil) => true,
            (Form::Symbol(u), Form::Symbol(v)) => u == v,
            (Form::Pair(u), Form::Pair(v)) => Rc::ptr_eq(u, v),
            (Form::Atom(u), Form::Atom(v)) => match (u, v) {
                (Int(x), Int(y)) => x == y,
                (Real(x), Real(y)) => x == y,
                (Int(x), Real(y)) | (Real(y), Int(x)) => (*x as f64) == *y,
                (Bool(x), Bool(y)) => x == y,
                (Ignore, Ignore) | (Inert, Inert) => true,
                (Combiner(x), Combiner(y)) => x.same(y),
                (Env(x), Env(y)) => x.same(y),
                _ => false
            }
            _ => false
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Form::Nil => "nil",
            Form::Symbol(_) => "symbol",
            Form::Pair(_) => "pair",
            Form::Atom(Atom::Int(_)) => "integer",
            Form::Atom(Atom::Real(_)) => "real",
            Form::Atom(Atom::Bool(_)) => "boolean",
            Form::Atom(Atom::Ignore) => "ignore",
            Form::Atom(Atom::Inert) => "inert",
            Form::Atom(Atom::Combiner(c)) => c.type_name(),
            Form::Atom(Atom::Env(_)) => "environment",
        }
    }
}

impl PartialEq for Form {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl From<Combiner> for Form {
    fn from(c: Combiner) -> Self {
        Form::Atom(Atom::Combiner(c))
    }
}

impl From<Env> for Form {
    fn from(e: Env) -> Self {
        Form::Atom(Atom::Env(e))
    }
}

impl From<i64> for Form {
    fn from(x: i64) -> Self {
        Form::int(x)
    }
}

impl From<bool> for Form {
    fn from(x: bool) -> Self {
        Form::bool(x)
    }
}

#[derive(Clone)]
pub struct ConsIter {
    head: Form,
}

impl ConsIter {
    pub fn tail(&self) -> &Form {
        &self.head
    }
}

impl Iterator for ConsIter {
    type Item = Form;

    fn next(&mut self) -> Option<Self::Item> {
        let Form::Pair(p) = &self.head else { return None };
        let p = p.clone();
        self.head = p.cdr.clone();
        Some(p.car.clone())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(x) => write!(f, "{x}"),
            Atom::Real(x) => write!(f, "{x:?}"),
            Atom::Bool(true) => write!(f, "#t"),
            Atom::Bool(false) => write!(f, "#f"),
            Atom::Ignore => write!(f, "#ignore"),
            Atom::Inert => write!(f, "#inert"),
            Atom::Combiner(c) => write!(f, "{c}"),
            Atom::Env(_) => write!(f, "#[environment]"),
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Nil => write!(f, "()"),
            Form::Symbol(s) => write!(f, "{s}"),
            Form::Atom(a) => write!(f, "{a}"),
            Form::Pair(_) => {
                write!(f, "(")?;
                let mut head = self;
                let mut first = true;
                loop {
                    match head {
                        Form::Pair(p) => {
                            if !first {
                                write!(f, " ")?;
                            }
                            first = false;
                            write!(f, "{}", p.car)?;
                            head = &p.cdr;
                        }
                        Form::Nil => break,
                        tail => {
                            write!(f, " . {tail}")?;
                            break
                        }
                    }
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[macro_export]
macro_rules! list {
    ($($x:expr),* $(,)?) => {
        $crate::form::Form::from_vec(vec![$($x.into()),*])
    };
}
