//! Environments

use crate::error::Result;
use crate::form::{Atom, Form};
use crate::swym::Sym;
use ahash::{AHashMap, AHashSet};
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

/// A scope in a chain of scopes. Cloning an `Env` clones the reference, all
/// clones observe the same bindings.
///
/// Scopes are reference counted. A combiner closed over a scope keeps it
/// alive, so binding such a combiner in that same scope, or in one of its
/// descendants, makes a cycle. `R8VM` empties the ground and top-level
/// scopes when dropped, along with every call scope it created that is
/// still alive. So a call scope that binds a closure over itself, such as an
/// inner `$define!` of a `$lambda`, lives as long as the machine. Scopes
/// made by `make-environment` are not tracked.
#[derive(Clone)]
pub struct Env(Rc<Scope>);

/// A reference to a scope that does not keep it alive.
#[derive(Clone)]
pub struct WeakEnv(Weak<Scope>);

impl WeakEnv {
    pub fn upgrade(&self) -> Option<Env> {
        self.0.upgrade().map(Env)
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

struct Scope {
    vars: RefCell<AHashMap<Sym, Form>>,
    parent: Option<Env>,
}

impl Env {
    pub fn root() -> Env {
        Env(Rc::new(Scope { vars: Default::default(), parent: None }))
    }

    pub fn extend(parent: &Env) -> Env {
        Env(Rc::new(Scope { vars: Default::default(),
                            parent: Some(parent.clone()) }))
    }

    pub fn parent(&self) -> Option<&Env> {
        self.0.parent.as_ref()
    }

    pub fn downgrade(&self) -> WeakEnv {
        WeakEnv(Rc::downgrade(&self.0))
    }

    /// Remove every binding in this scope.
    pub fn clear(&self) {
        let vars = mem::take(&mut *self.0.vars.borrow_mut());
        drop(vars);
    }

    #[inline]
    pub fn same(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, name: &Sym) -> Option<Form> {
        let mut env = self;
        loop {
            if let Some(v) = env.0.vars.borrow().get(name) {
                return Some(v.clone())
            }
            env = env.parent()?;
        }
    }

    pub fn lookup(&self, name: &Sym) -> Result<Form> {
        self.get(name).ok_or_else(|| error!(UnboundVariable, var: name.clone()))
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: Sym, value: Form) {
        self.0.vars.borrow_mut().insert(name, value);
    }

    /// Mutate the nearest existing binding of `name`.
    pub fn set(&self, name: &Sym, value: Form) -> Result<()> {
        let mut env = self;
        loop {
            if let Some(v) = env.0.vars.borrow_mut().get_mut(name) {
                *v = value;
                return Ok(())
            }
            env = env.parent()
                     .ok_or_else(|| error!(UnboundVariable, var: name.clone()))?;
        }
    }

    /// Match `ptree` against `operands`, defining every symbol in the
    /// parameter tree in this scope.
    pub fn bind(&self, ptree: &Form, operands: &Form) -> Result<()> {
        let mismatch = || err!(BindingMismatch,
                               expect: ptree.to_string(),
                               got: operands.to_string());
        match (ptree, operands) {
            (Form::Symbol(name), _) => {
                self.define(name.clone(), operands.clone());
                Ok(())
            }
            (Form::Atom(Atom::Ignore), _) => Ok(()),
            (Form::Nil, Form::Nil) => Ok(()),
            (Form::Nil, _) => mismatch(),
            (Form::Pair(p), Form::Pair(o)) => {
                self.bind(&p.car, &o.car)?;
                self.bind(&p.cdr, &o.cdr)
            }
            (Form::Pair(_), _) => mismatch(),
            (Form::Atom(_), _) => err!(IllegalParamTree, got: ptree.to_string()),
        }
    }

    /// Names bound directly in this scope, sorted.
    pub fn names(&self) -> Vec<Sym> {
        let mut names: Vec<_> = self.0.vars.borrow().keys().cloned().collect();
        names.sort_by(|u, v| u.as_str().cmp(v.as_str()));
        names
    }

    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut env = self.parent();
        while let Some(e) = env {
            n += 1;
            env = e.parent();
        }
        n
    }
}

/// The elements of an operand list that is about to be bound, a dotted
/// list cannot be.
pub fn operand_list(operands: &Form) -> Result<Vec<Form>> {
    operands.to_vec().ok_or_else(|| error!(BindingMismatch,
                                           expect: "a proper list of operands".to_string(),
                                           got: operands.to_string()))
}

/// Check that `ptree` is a well-formed parameter tree: only symbols,
/// `#ignore`, nil and pairs, with no symbol appearing twice.
pub fn check_ptree(ptree: &Form) -> Result<()> {
    fn check(ptree: &Form, seen: &mut AHashSet<Sym>) -> Result<()> {
        match ptree {
            Form::Symbol(s) => if seen.insert(s.clone()) {
                Ok(())
            } else {
                err!(DuplicateParam, name: s.clone())
            }
            Form::Nil | Form::Atom(Atom::Ignore) => Ok(()),
            Form::Pair(p) => {
                check(&p.car, seen)?;
                check(&p.cdr, seen)
            }
            Form::Atom(_) => err!(IllegalParamTree, got: ptree.to_string()),
        }
    }
    check(ptree, &mut AHashSet::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, ErrorKind};

    fn ptree(xs: &[&str], rest: Option<&str>) -> Form {
        Form::list(xs.iter().map(|x| Form::sym(x)),
                   rest.map(Form::sym).unwrap_or(Form::Nil))
    }

    #[test]
    fn shadowing_leaves_outer_binding_alone() {
        let outer = Env::root();
        let x = Sym::new("x");
        outer.define(x.clone(), Form::int(1));
        let inner = Env::extend(&outer);
        inner.define(x.clone(), Form::int(2));
        let innermost = Env::extend(&inner);
        assert_eq!(innermost.lookup(&x).unwrap(), Form::int(2));
        assert_eq!(inner.lookup(&x).unwrap(), Form::int(2));
        assert_eq!(outer.lookup(&x).unwrap(), Form::int(1));
    }

    #[test]
    fn set_mutates_nearest_binding() {
        let outer = Env::root();
        let x = Sym::new("x");
        outer.define(x.clone(), Form::int(1));
        let inner = Env::extend(&outer);
        inner.set(&x, Form::int(5)).unwrap();
        assert_eq!(outer.lookup(&x).unwrap(), Form::int(5));
        assert!(inner.names().is_empty());
    }

    #[test]
    fn set_of_unbound_fails() {
        let env = Env::extend(&Env::root());
        let y = Sym::new("y");
        let err = env.set(&y, Form::int(1)).unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnboundVariable);
        assert!(env.get(&y).is_none());
        assert!(env.parent().unwrap().get(&y).is_none());
    }

    #[test]
    fn bind_dotted_rest() {
        let env = Env::root();
        let operands = Form::from_vec(vec![Form::int(1), Form::int(2), Form::int(3)]);
        env.bind(&ptree(&["a"], Some("rest")), &operands).unwrap();
        assert_eq!(env.lookup(&Sym::new("a")).unwrap(), Form::int(1));
        assert_eq!(env.lookup(&Sym::new("rest")).unwrap().to_string(), "(2 3)");
    }

    #[test]
    fn bind_arity_mismatch() {
        let env = Env::root();
        let operands = Form::from_vec(vec![Form::int(1)]);
        let err = env.bind(&ptree(&["a", "b"], None), &operands).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BindingMismatch { .. }));
        let operands = Form::from_vec(vec![Form::int(1), Form::int(2), Form::int(3)]);
        let err = env.bind(&ptree(&["a", "b"], None), &operands).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Binding);
    }

    #[test]
    fn ptree_checks() {
        assert!(check_ptree(&ptree(&["a", "b"], Some("c"))).is_ok());
        assert!(check_ptree(&Form::list([Form::ignore()], Form::Nil)).is_ok());
        let dup = check_ptree(&ptree(&["a", "a"], None)).unwrap_err();
        assert!(matches!(dup.kind(), ErrorKind::DuplicateParam { .. }));
        let bad = check_ptree(&Form::list([Form::int(1)], Form::Nil)).unwrap_err();
        assert_eq!(bad.class(), ErrorClass::Compile);
    }
}
