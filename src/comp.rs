//! Form Compiler
//!
//! Compilation is continuation-passing: every form is compiled against the
//! instruction that should run once its value is in the accumulator. A
//! combination whose continuation is `Return` gets no `Frame`, which is all
//! there is to tail calls.

use crate::builtins::Builtin;
use crate::chasm::{Insn, Template};
use crate::combiner::Combiner;
use crate::env::{check_ptree, operand_list};
use crate::error::Result;
use crate::form::{Atom, Form};
use crate::r8vm::ArgSpec;
use std::rc::Rc;

pub fn compile(form: &Form, next: Rc<Insn>) -> Result<Rc<Insn>> {
    match form {
        Form::Symbol(name) => Ok(Rc::new(Insn::Refer(name.clone(), next))),
        Form::Pair(p) => match p.car.as_sym().and_then(Builtin::from_sym) {
            Some(op) if op.is_special_form() => compile_special(op, &p.cdr, next),
            _ => compile_combination(&p.car, &p.cdr, next),
        },
        _ => Ok(Rc::new(Insn::Constant(form.clone(), next))),
    }
}

/// Push a frame returning to `next`, unless `next` is itself a return.
fn with_frame(code: Rc<Insn>, next: Rc<Insn>) -> Rc<Insn> {
    if next.is_return() {
        code
    } else {
        Rc::new(Insn::Frame(next, code))
    }
}

fn compile_combination(operator: &Form,
                       operands: &Form,
                       next: Rc<Insn>) -> Result<Rc<Insn>>
{
    let apply = compile(operator, Rc::new(Insn::Apply(operands.clone())))?;
    Ok(with_frame(apply, next))
}

/// Compile forms in order, the value of the last one is the result.
pub fn compile_seq(forms: &[Form], next: Rc<Insn>) -> Result<Rc<Insn>> {
    let Some((last, init)) = forms.split_last() else {
        return Ok(Rc::new(Insn::Constant(Form::inert(), next)))
    };
    let mut code = compile(last, next)?;
    for form in init.iter().rev() {
        code = compile(form, code)?;
    }
    Ok(code)
}

/// Code that evaluates `operands` left to right onto the pending arguments,
/// and then combines `combiner` with them.
pub fn compile_arguments(operands: &Form, combiner: Combiner) -> Result<Rc<Insn>> {
    let args = operand_list(operands)?;
    let mut code = Rc::new(Insn::Constant(combiner.into(), Rc::new(Insn::Call)));
    for arg in args.iter().rev() {
        code = compile(arg, Rc::new(Insn::Argument(code)))?;
    }
    Ok(code)
}

fn compile_close(op: Builtin,
                 ptree: &Form,
                 eformal: &Form,
                 body: &[Form],
                 wrap: bool,
                 next: Rc<Insn>) -> Result<Rc<Insn>>
{
    if !matches!(eformal, Form::Symbol(_) | Form::Atom(Atom::Ignore)) {
        bail!((IllegalParamTree { got: eformal.to_string() }).sop(op.as_str()))
    }
    // The environment formal shares a scope with the parameters.
    check_ptree(&Form::cons(eformal.clone(), ptree.clone()))
        .map_err(|e| e.sop(op.as_str()))?;
    let source = Form::from_vec(body.to_vec());
    log::trace!("compiling {op} body {source}");
    let tpl = Template {
        ptree: ptree.clone(),
        eformal: eformal.clone(),
        body: compile_seq(body, Insn::ret())?,
        source,
        wrap,
    };
    Ok(Rc::new(Insn::Close(Rc::new(tpl), next)))
}

fn compile_special(op: Builtin, operands: &Form, next: Rc<Insn>) -> Result<Rc<Insn>> {
    use Builtin::*;
    let args = operands.to_vec()
                       .ok_or_else(|| error!(UnexpectedDottedList,).sop(op.as_str()))?;
    let check = |spec: ArgSpec| {
        spec.check(args.len()).map_err(|e| e.sop(op.as_str()))
    };
    Ok(match op {
        Quote => {
            check(ArgSpec::normal(1))?;
            Rc::new(Insn::Constant(args[0].clone(), next))
        }
        If | IfShort => {
            check(ArgSpec::opt(2, 1))?;
            let then = compile(&args[1], next.clone())?;
            let alt = match args.get(2) {
                Some(alt) => compile(alt, next)?,
                None => Rc::new(Insn::Constant(Form::inert(), next)),
            };
            compile(&args[0], Rc::new(Insn::Test(then, alt)))?
        }
        Define => {
            check(ArgSpec::normal(2))?;
            check_ptree(&args[0]).map_err(|e| e.sop(op.as_str()))?;
            compile(&args[1], Rc::new(Insn::Define(args[0].clone(), next)))?
        }
        Set | SetShort => {
            check(ArgSpec::normal(2))?;
            let Some(name) = args[0].as_sym() else {
                bail!((IllegalParamTree { got: args[0].to_string() }).sop(op.as_str()))
            };
            compile(&args[1], Rc::new(Insn::Assign(name.clone(), next)))?
        }
        Vau => {
            check(ArgSpec::rest(3, 0))?;
            compile_close(op, &args[0], &args[1], &args[2..], false, next)?
        }
        Lambda | LambdaShort => {
            check(ArgSpec::rest(2, 0))?;
            compile_close(op, &args[0], &Form::ignore(), &args[1..], true, next)?
        }
        Sequence | Begin => compile_seq(&args, next)?,
        CallCC => {
            check(ArgSpec::normal(1))?;
            // The frame, if any, is pushed before the capture, so the
            // continuation returns to `next`.
            let call = compile(&args[0], Rc::new(Insn::Call))?;
            with_frame(Rc::new(Insn::Conti(call)), next)
        }
        _ => return compile_combination(&Form::Symbol(op.sym()), operands, next),
    })
}
