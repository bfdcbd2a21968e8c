//! Structured Errors

use crate::r8vm::{ArgInt, ArgSpec};
use crate::swym::Sym;
use std::borrow::Cow;
use std::error;
use std::fmt::{self, Display};

pub type SourceFileName = Option<Cow<'static, str>>;

pub type Result<T> = std::result::Result<T, Error>;

/// A position in source text, line and column count from 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub file: SourceFileName,
    pub line: u32,
    pub col: u32,
}

impl Source {
    pub fn new(line: u32, col: u32, file: SourceFileName) -> Source {
        Source { file, line, col }
    }

    pub fn is_none(&self) -> bool {
        self.line == 0
    }
}

/// The operator an error is attributed to.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum OpName {
    Sym(Sym),
    Str(&'static str),
}

impl Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpName::Sym(s) => write!(f, "{s}"),
            OpName::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Copy)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// One piece of context attached to an error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Meta {
    Op(OpName),
    OpArgn(u32),
    SourceFile(Cow<'static, str>),
    Source(LineCol),
    Hint(String),
}

/// Error context, at most one of each kind of `Meta`.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct MetaSet {
    op: Option<OpName>,
    argn: Option<u32>,
    file: Option<Cow<'static, str>>,
    pos: Option<LineCol>,
    hint: Option<String>,
}

impl MetaSet {
    fn put(&mut self, data: Meta, overwrite: bool) {
        fn slot<T>(slot: &mut Option<T>, v: T, overwrite: bool) {
            if overwrite || slot.is_none() {
                *slot = Some(v);
            }
        }
        match data {
            Meta::Op(op) => slot(&mut self.op, op, overwrite),
            Meta::OpArgn(n) => slot(&mut self.argn, n, overwrite),
            Meta::SourceFile(file) => slot(&mut self.file, file, overwrite),
            Meta::Source(pos) => slot(&mut self.pos, pos, overwrite),
            Meta::Hint(hint) => slot(&mut self.hint, hint, overwrite),
        }
    }

    /// Replace any metadata of the same kind.
    fn amend(&mut self, data: Meta) {
        self.put(data, true)
    }

    /// Only add `data` if there is no metadata of the same kind yet.
    fn fallback(&mut self, data: Meta) {
        self.put(data, false)
    }

    pub fn op(&self) -> Option<&OpName> {
        self.op.as_ref()
    }

    pub fn op_argn(&self) -> Option<u32> {
        self.argn
    }

    pub fn src_file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn src(&self) -> Option<Source> {
        let LineCol { line, col } = self.pos?;
        Some(Source { file: self.file.clone(), line, col })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    DotAtEndOfList,
    DotAtStartOfList,
    DotAfterDot,
    DotOutsideList,
    ModifierBeforeDot,
    MoreThanOneElemAfterDot,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SyntaxErrorKind::*;
        f.write_str(match self {
            DotAtEndOfList => "Nothing follows the dot [.] in a dotted list",
            DotAtStartOfList => "Dot [.] at the start of a list, as in (. a)",
            DotAfterDot => "Two dots [.] in the same list",
            DotOutsideList => "Dot [.] outside of a list",
            ModifierBeforeDot => "Quote ['] before a dot [.], write (a . 'b) not (a ' . b)",
            MoreThanOneElemAfterDot => "More than one datum after a dot [.], as in (a . b c)",
        })
    }
}

/// The broad error categories an embedder can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Read,
    Compile,
    UnboundVariable,
    Binding,
    NotCombinable,
    Native,
    Limit,
    Host,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Reader
    TrailingDelimiter { close: &'static str },
    UnclosedDelimiter { open: &'static str },
    TrailingModifiers { mods: String },
    UnknownLiteral { lit: String },
    SyntaxError(SyntaxErrorKind),

    // Compiler
    ArgError { expect: ArgSpec, got_num: u32 },
    IllegalParamTree { got: String },
    DuplicateParam { name: Sym },
    UnexpectedDottedList,

    // Machine
    UnboundVariable { var: Sym },
    BindingMismatch { expect: String, got: String },
    NotCombinable { got: String },

    // Natives
    TypeError { expect: &'static str, got: String },
    DivisionByZero,
    SomeError { msg: String },

    StepLimit { lim: usize },
    IOError { kind: std::io::ErrorKind },
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        use ErrorKind::*;
        match self {
            TrailingDelimiter { .. } | UnclosedDelimiter { .. } |
            TrailingModifiers { .. } | UnknownLiteral { .. } |
            SyntaxError(_) => ErrorClass::Read,
            IllegalParamTree { .. } | DuplicateParam { .. } |
            UnexpectedDottedList => ErrorClass::Compile,
            // Arity errors from special forms carry no different kind than
            // those raised by natives, the op metadata tells them apart.
            ArgError { .. } => ErrorClass::Compile,
            UnboundVariable { .. } => ErrorClass::UnboundVariable,
            BindingMismatch { .. } => ErrorClass::Binding,
            NotCombinable { .. } => ErrorClass::NotCombinable,
            TypeError { .. } | DivisionByZero | SomeError { .. } => ErrorClass::Native,
            StepLimit { .. } => ErrorClass::Limit,
            IOError { .. } => ErrorClass::Host,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(v: std::io::Error) -> Self {
        Error::new(ErrorKind::IOError { kind: v.kind() })
    }
}

impl From<ErrorKind> for Error {
    fn from(v: ErrorKind) -> Self {
        Error::new(v)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::new(ErrorKind::SomeError { msg })
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::new(ErrorKind::SomeError { msg: msg.to_string() })
    }
}

/// Structural Error Type
#[derive(Clone, PartialEq)]
pub struct Error {
    inner: Box<ErrorInner>,
}

#[derive(Clone, PartialEq)]
struct ErrorInner {
    meta: MetaSet,
    ty: ErrorKind,
    /// Set when the error was raised by a native combiner, overrides the
    /// class derived from `ty`.
    native: bool,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_error(self, f)
    }
}

impl Error {
    pub fn new(kind: ErrorKind) -> Error {
        Error {
            inner: Box::new(ErrorInner { meta: Default::default(),
                                         ty: kind,
                                         native: false })
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner.ty
    }

    pub fn meta(&self) -> &MetaSet {
        &self.inner.meta
    }

    pub fn class(&self) -> ErrorClass {
        if self.inner.native {
            ErrorClass::Native
        } else {
            self.inner.ty.class()
        }
    }

    pub(crate) fn from_native(mut self) -> Error {
        self.inner.native = true;
        self
    }
}

impl MetaSet {
    /// Render the location as a ` [file line:col]` suffix, or nothing.
    fn fmt_location(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.src(), self.src_file()) {
            (Some(src), _) => write!(f, " {src}"),
            (None, Some(file)) => write!(f, " [{file}]"),
            (None, None) => Ok(()),
        }
    }
}

fn plural(n: ArgInt) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn fmt_error(err: &Error, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use ErrorKind::*;

    let meta = err.meta();
    match err.kind() {
        TrailingDelimiter { close } =>
            write!(f, "Trailing Delimiter: Found trailing `{close}' in input")?,
        UnclosedDelimiter { open } =>
            write!(f, "Unclosed Delimiter: Found `{open}' which was not closed in input")?,
        TrailingModifiers { mods } =>
            write!(f, "Trailing Modifiers: Unexpected end of input at: {mods}")?,
        UnknownLiteral { lit } =>
            write!(f, "Syntax Error: Unknown literal {lit}")?,
        SyntaxError(kind) =>
            write!(f, "Syntax Error: {kind}")?,
        ArgError { expect, got_num } => {
            write!(f, "Argument Error: ")?;
            if let Some(op) = meta.op() {
                write!(f, "{op} ")?
            }
            match expect {
                ArgSpec { nargs, nopt: 0, rest: false } =>
                    write!(f, "expected {} argument{}, but got {}",
                           nargs, plural(*nargs), got_num)?,
                ArgSpec { nargs, nopt, rest: false } =>
                    write!(f, "expected from {} to {} arguments, but got {}",
                           nargs, nargs+nopt, got_num)?,
                ArgSpec { nargs, rest: true, .. } =>
                    write!(f, "expected at least {} argument{}, but got {}",
                           nargs, plural(*nargs), got_num)?,
            }
        }
        IllegalParamTree { got } => {
            write!(f, "Compile Error: ")?;
            if let Some(op) = meta.op() {
                write!(f, "{op} ")?
            }
            write!(f, "illegal parameter tree element {got}")?
        }
        DuplicateParam { name } =>
            write!(f, "Compile Error: Parameter {name} bound more than once")?,
        UnexpectedDottedList => {
            write!(f, "Compile Error: ")?;
            if let Some(op) = meta.op() {
                write!(f, "{op} ")?
            }
            write!(f, "expected a proper list of operands")?
        }
        UnboundVariable { var } =>
            write!(f, "Unbound Variable: {var}")?,
        BindingMismatch { expect, got } => {
            write!(f, "Binding Error: ")?;
            if let Some(op) = meta.op() {
                write!(f, "in {op} ")?
            }
            write!(f, "expected {expect} but got {got}")?
        }
        NotCombinable { got } =>
            write!(f, "Not Combinable: {got} cannot be applied")?,
        TypeError { expect, got } => {
            write!(f, "Type Error: Expected {expect} ")?;
            if let Some(op) = meta.op() {
                if let Some(argn) = meta.op_argn() {
                    write!(f, "for argument {argn} of ({op} ...), ")?;
                } else {
                    write!(f, "in {op}, ")?;
                }
            }
            write!(f, "but got {got}")?
        }
        DivisionByZero => {
            write!(f, "Arithmetic Error: Division by zero")?;
            if let Some(op) = meta.op() {
                write!(f, " in {op}")?;
            }
        }
        SomeError { msg } => write!(f, "Error: {}", msg)?,
        StepLimit { lim } =>
            write!(f, "Step Limit: Evaluation exceeded {lim} instructions")?,
        IOError { kind } => {
            let err: std::io::Error = (*kind).into();
            write!(f, "IOError: {}", err)?;
        }
    }

    meta.fmt_location(f)?;

    if let Some(hint) = meta.hint() {
        write!(f, " (hint: {hint})")?;
    }

    Ok(())
}

impl Error {
    pub fn src(mut self, src: Source) -> Error {
        if src.is_none() {
            return self
        }
        self.inner.meta.amend(Meta::Source(LineCol {
            line: src.line,
            col: src.col
        }));
        if let Some(file) = src.file {
            self.inner.meta.amend(Meta::SourceFile(file));
        }
        self
    }

    pub fn amend(mut self, meta: Meta) -> Self {
        self.inner.meta.amend(meta);
        self
    }

    pub fn fallback(mut self, meta: Meta) -> Self {
        self.inner.meta.fallback(meta);
        self
    }

    pub fn op(mut self, new_op: Sym) -> Error {
        self.inner.meta.amend(Meta::Op(OpName::Sym(new_op)));
        self
    }

    /// Attach an operator name unless one was already given.
    pub fn fop(mut self, new_op: Sym) -> Error {
        self.inner.meta.fallback(Meta::Op(OpName::Sym(new_op)));
        self
    }

    pub fn sop(mut self, new_op: &'static str) -> Error {
        self.inner.meta.amend(Meta::Op(OpName::Str(new_op)));
        self
    }

    pub fn argn(mut self, n: u32) -> Error {
        self.inner.meta.amend(Meta::OpArgn(n));
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Error {
        self.inner.meta.amend(Meta::Hint(hint.into()));
        self
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_error(&Error::new(self.clone()), f)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if self.line == 0 {
            write!(f, "unknown")?;
        } else {
            if let Some(file) = &self.file {
                write!(f, "{} ", file)?;
            }
            write!(f, "{}:{}", self.line, self.col)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_error(self, f)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}

macro_rules! err {
    ($kind:ident, $($init:tt)* ) => {
        Err((crate::error::ErrorKind::$kind { $($init)* }).into())
    };
}

macro_rules! bail {
    (($kind:ident $($init:tt)*)$($extra:tt)*) => {
        return Err({
            let err: $crate::error::Error = (crate::error::ErrorKind::$kind  $($init)* ).into();
            err$($extra)*
        })
    };
    ($kind:ident $($init:tt)*) => {
        return Err((crate::error::ErrorKind::$kind  $($init)* ).into())
    };
}

macro_rules! error {
    ($kind:ident, $($init:tt)* ) => {
        crate::error::Error::new(crate::error::ErrorKind::$kind { $($init)* })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_and_hint_but_no_lineno() {
        let err = Error::new(ErrorKind::SomeError { msg: "thing".to_owned() })
            .amend(Meta::SourceFile(Cow::Borrowed("filename")))
            .amend(Meta::Hint("have you tried counseling?".to_owned()));
        assert_eq!(format!("{err}"), "Error: thing [filename] (hint: have you tried counseling?)");
    }

    #[test]
    fn arg_error_names_the_operator() {
        let err = error!(ArgError, expect: ArgSpec::normal(2), got_num: 3)
            .sop("$if");
        assert_eq!(format!("{err}"), "Argument Error: $if expected 2 arguments, but got 3");
        assert_eq!(err.class(), ErrorClass::Compile);
        assert_eq!(err.from_native().class(), ErrorClass::Native);
    }

    #[test]
    fn source_is_appended() {
        let err = error!(UnboundVariable, var: Sym::new("frob"))
            .src(Source::new(3, 7, None));
        assert_eq!(format!("{err}"), "Unbound Variable: frob [3:7]");
        assert_eq!(err.class(), ErrorClass::UnboundVariable);
    }
}
