//! Native Combiners
//!
//! The ground environment's natives. Each is bound wrapped in an
//! applicative, so the argument slice a native sees is already evaluated.

use crate::combiner::{Combiner, Subr};
use crate::env::Env;
use crate::error::Result;
use crate::form::{Atom, Form};
use crate::r8vm::{ArgSpec, SharedOut};
use crate::swym::Sym;
use std::io::Write;

macro_rules! subr {
    (fn $name:ident[$name_s:expr](&mut $self:ident, $args:ident : &[Form])
                    -> Result<Form> $body:block) => {
        #[derive(Clone, Copy, Debug)]
        #[allow(non_camel_case_types)]
        pub struct $name;

        #[allow(unused_variables)]
        impl Subr for $name {
            fn call(&mut $self, $args: &[Form]) -> Result<Form> $body
            fn name(&self) -> &str { $name_s }
        }
    };

    (fn $name:ident[$name_s:expr](&mut $self:ident, args: ($($arg:ident),*))
                    -> Result<Form> $body:block) => {
        subr!(fn $name[$name_s](&mut $self, args: &[Form]) -> Result<Form> {
            subr_args!(($($arg),*) args $body)
        });
    };
}

macro_rules! subr_args {
    (($($arg:ident),*) $args:ident $body:block) => {
        match &$args[..] {
            [$($arg),*] => $body,
            _ => Err(error!(ArgError,
                            expect: ArgSpec::normal(count_args!($($arg),*)),
                            got_num: $args.len() as u32))
        }
    };
}

macro_rules! std_subrs {
    ($(fn $name:ident[$name_s:expr]($($inner:tt)*) -> Result<Form> $body:block)*) => {
        $(subr!(fn $name[$name_s]($($inner)*) -> Result<Form> $body);)*
    };
}

macro_rules! predicates {
    ($($name:ident[$name_s:expr] |$x:ident| $test:expr;)*) => {
        std_subrs! {
            $(fn $name[$name_s](&mut self, args: ($x)) -> Result<Form> {
                Ok(Form::bool($test))
            })*
        }
    };
}

#[derive(Clone, Copy, Debug)]
enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    fn from_form(x: &Form, argn: usize) -> Result<Num> {
        match x {
            Form::Atom(Atom::Int(x)) => Ok(Num::Int(*x)),
            Form::Atom(Atom::Real(x)) => Ok(Num::Real(*x)),
            x => Err(error!(TypeError, expect: "number", got: x.to_string())
                     .argn(argn as u32)),
        }
    }

    fn real(self) -> f64 {
        match self {
            Num::Int(x) => x as f64,
            Num::Real(x) => x,
        }
    }

    fn arith(self,
             other: Num,
             int_op: fn(i64, i64) -> Option<i64>,
             real_op: fn(f64, f64) -> f64) -> Num
    {
        match (self, other) {
            (Num::Int(x), Num::Int(y)) => match int_op(x, y) {
                Some(z) => Num::Int(z),
                None => Num::Real(real_op(x as f64, y as f64)),
            },
            (x, y) => Num::Real(real_op(x.real(), y.real())),
        }
    }

    fn div(self, other: Num) -> Result<Num> {
        match (self, other) {
            (_, Num::Int(0)) => Err(error!(DivisionByZero,)),
            (_, Num::Real(y)) if y == 0.0 => Err(error!(DivisionByZero,)),
            (Num::Int(x), Num::Int(y)) => Ok(match (x.checked_rem(y), x.checked_div(y)) {
                (Some(0), Some(z)) => Num::Int(z),
                _ => Num::Real(x as f64 / y as f64),
            }),
            (x, y) => Ok(Num::Real(x.real() / y.real())),
        }
    }

    fn cmp(self, other: Num) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            (x, y) => x.real().partial_cmp(&y.real()),
        }
    }
}

impl From<Num> for Form {
    fn from(x: Num) -> Self {
        match x {
            Num::Int(x) => Form::int(x),
            Num::Real(x) => Form::real(x),
        }
    }
}

fn nums(args: &[Form]) -> Result<Vec<Num>> {
    args.iter().enumerate().map(|(i, x)| Num::from_form(x, i + 1)).collect()
}

fn fold_nums(args: &[Form],
             init: Num,
             int_op: fn(i64, i64) -> Option<i64>,
             real_op: fn(f64, f64) -> f64) -> Result<Form>
{
    Ok(nums(args)?.into_iter()
                  .fold(init, |acc, x| acc.arith(x, int_op, real_op))
                  .into())
}

fn compare(args: &[Form], ok: fn(std::cmp::Ordering) -> bool) -> Result<Form> {
    let xs = nums(args)?;
    Ok(Form::bool(xs.windows(2).all(|w| w[0].cmp(w[1]).map(ok).unwrap_or(false))))
}

fn combiner_arg(x: &Form, argn: u32) -> Result<&Combiner> {
    x.as_combiner().ok_or_else(|| {
        error!(TypeError, expect: "combiner", got: x.to_string()).argn(argn)
    })
}

#[allow(non_camel_case_types)]
mod sysfns {
    use super::*;

    std_subrs! {
        fn add["+"](&mut self, args: &[Form]) -> Result<Form> {
            fold_nums(args, Num::Int(0), i64::checked_add, |x, y| x + y)
        }

        fn mul["*"](&mut self, args: &[Form]) -> Result<Form> {
            fold_nums(args, Num::Int(1), i64::checked_mul, |x, y| x * y)
        }

        fn sub["-"](&mut self, args: &[Form]) -> Result<Form> {
            ArgSpec::rest(1, 0).check(args.len())?;
            let xs = nums(args)?;
            let neg = |x: Num| Num::Int(0).arith(x, i64::checked_sub, |x, y| x - y);
            Ok(match &xs[..] {
                [x] => neg(*x),
                [x, rest @ ..] => rest.iter().fold(*x, |acc, y| {
                    acc.arith(*y, i64::checked_sub, |x, y| x - y)
                }),
                [] => Num::Int(0),
            }.into())
        }

        fn div["/"](&mut self, args: &[Form]) -> Result<Form> {
            ArgSpec::rest(1, 0).check(args.len())?;
            let xs = nums(args)?;
            // A single argument is a reciprocal.
            let (first, rest) = match &xs[..] {
                [_] => (Num::Int(1), &xs[..]),
                _ => (xs[0], &xs[1..]),
            };
            rest.iter()
                .try_fold(first, |acc, y| acc.div(*y))
                .map(Form::from)
        }

        fn num_eq["=?"](&mut self, args: &[Form]) -> Result<Form> {
            compare(args, |o| o.is_eq())
        }

        fn lt["<?"](&mut self, args: &[Form]) -> Result<Form> {
            compare(args, |o| o.is_lt())
        }

        fn gt[">?"](&mut self, args: &[Form]) -> Result<Form> {
            compare(args, |o| o.is_gt())
        }

        fn lte["<=?"](&mut self, args: &[Form]) -> Result<Form> {
            compare(args, |o| o.is_le())
        }

        fn gte[">=?"](&mut self, args: &[Form]) -> Result<Form> {
            compare(args, |o| o.is_ge())
        }

        fn eq["eq?"](&mut self, args: (x, y)) -> Result<Form> {
            Ok(Form::bool(x.is_eq(y)))
        }

        fn equal["equal?"](&mut self, args: (x, y)) -> Result<Form> {
            Ok(Form::bool(x.equal(y)))
        }

        fn cons["cons"](&mut self, args: (x, y)) -> Result<Form> {
            Ok(Form::cons(x.clone(), y.clone()))
        }

        fn car["car"](&mut self, args: (x)) -> Result<Form> {
            x.car().cloned().ok_or_else(|| {
                error!(TypeError, expect: "pair", got: x.to_string()).argn(1)
            })
        }

        fn cdr["cdr"](&mut self, args: (x)) -> Result<Form> {
            x.cdr().cloned().ok_or_else(|| {
                error!(TypeError, expect: "pair", got: x.to_string()).argn(1)
            })
        }

        fn not["not"](&mut self, args: (x)) -> Result<Form> {
            Ok(Form::bool(x.is_false()))
        }

        fn wrap["wrap"](&mut self, args: (x)) -> Result<Form> {
            Ok(combiner_arg(x, 1)?.clone().wrap().into())
        }

        fn unwrap["unwrap"](&mut self, args: (x)) -> Result<Form> {
            combiner_arg(x, 1)?
                .underlying()
                .map(|c| c.clone().into())
                .ok_or_else(|| {
                    error!(TypeError, expect: "applicative", got: x.to_string()).argn(1)
                })
        }

        fn make_environment["make-environment"](&mut self, args: &[Form]) -> Result<Form> {
            match args {
                [] => Ok(Env::root().into()),
                [parent] => match parent.as_env() {
                    Some(env) => Ok(Env::extend(env).into()),
                    None => Err(error!(TypeError, expect: "environment",
                                       got: parent.to_string()).argn(1)),
                },
                _ => Err(error!(ArgError,
                                expect: ArgSpec::opt(0, 1),
                                got_num: args.len() as u32)),
            }
        }
    }

    predicates! {
        is_null["null?"] |x| x.is_nil();
        is_pair["pair?"] |x| matches!(x, Form::Pair(_));
        is_symbol["symbol?"] |x| matches!(x, Form::Symbol(_));
        is_number["number?"] |x| matches!(x, Form::Atom(Atom::Int(_) | Atom::Real(_)));
        is_integer["integer?"] |x| matches!(x, Form::Atom(Atom::Int(_)));
        is_real["real?"] |x| matches!(x, Form::Atom(Atom::Real(_)));
        is_boolean["boolean?"] |x| matches!(x, Form::Atom(Atom::Bool(_)));
        is_inert["inert?"] |x| matches!(x, Form::Atom(Atom::Inert));
        is_ignore["ignore?"] |x| matches!(x, Form::Atom(Atom::Ignore));
        is_combiner["combiner?"] |x| x.as_combiner().is_some();
        is_operative["operative?"] |x| x.as_combiner().map(|c| c.is_operative()).unwrap_or(false);
        is_applicative["applicative?"] |x| x.as_combiner().map(|c| c.is_applicative()).unwrap_or(false);
        is_environment["environment?"] |x| x.as_env().is_some();
    }
}

/// Writes its argument to the machine's output.
pub struct Display {
    out: SharedOut,
}

impl Subr for Display {
    fn call(&mut self, args: &[Form]) -> Result<Form> {
        let [x] = args else {
            return Err(error!(ArgError, expect: ArgSpec::normal(1),
                              got_num: args.len() as u32))
        };
        write!(self.out.borrow_mut(), "{x}")?;
        Ok(Form::inert())
    }

    fn name(&self) -> &str {
        "display"
    }
}

pub struct Newline {
    out: SharedOut,
}

impl Subr for Newline {
    fn call(&mut self, args: &[Form]) -> Result<Form> {
        ArgSpec::normal(0).check(args.len())?;
        let mut out = self.out.borrow_mut();
        writeln!(out)?;
        out.flush()?;
        Ok(Form::inert())
    }

    fn name(&self) -> &str {
        "newline"
    }
}

fn define(env: &Env, subr: impl Subr) {
    env.define(Sym::new(subr.name()), Combiner::native(subr).wrap().into());
}

/// Bind every native in `env`.
pub fn install(env: &Env, out: &SharedOut) {
    use sysfns::*;

    macro_rules! install {
        ($($subr:expr),* $(,)?) => {
            $(define(env, $subr);)*
        };
    }

    install![add, mul, sub, div, num_eq, lt, gt, lte, gte, eq, equal, cons,
             car, cdr, not, wrap, unwrap, make_environment, is_null, is_pair,
             is_symbol, is_number, is_integer, is_real, is_boolean, is_inert, is_ignore,
             is_combiner, is_operative, is_applicative, is_environment,
             Display { out: out.clone() },
             Newline { out: out.clone() }];
}
