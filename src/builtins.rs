//! Builtin Symbols

use crate::swym::Sym;
use std::fmt;

macro_rules! builtins {
    ($(($sym:ident, $str:expr)),*) => {
        #[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
        pub enum Builtin { $($sym),* }

        const NUM_BUILTINS: usize = count_args!($($sym),*);

        pub const BUILTIN_SYMBOLS: [&'static str; NUM_BUILTINS] = [
            $($str),*
        ];

        fn get_builtin(s: &str) -> Option<Builtin> {
            Some(match s {
                $($str => Builtin::$sym),*,
                _ => return None
            })
        }

        impl Builtin {
            pub fn as_str(&self) -> &'static str {
                match self { $(Builtin::$sym => $str),* }
            }
        }
    }
}

builtins! {
    (Vau, "$vau"),
    (Lambda, "$lambda"),
    (LambdaShort, "lambda"),
    (Define, "$define!"),
    (Set, "$set!"),
    (SetShort, "set!"),
    (If, "$if"),
    (IfShort, "if"),
    (Sequence, "$sequence"),
    (Begin, "$begin"),
    (Quote, "$quote"),
    (CallCC, "call/cc"),
    (Eval, "eval"),
    (Ignore, "#ignore"),
    (Inert, "#inert"),
    (True, "#t"),
    (False, "#f"),
    (ConsDot, ".")
}

impl Builtin {
    pub fn from<T: AsRef<str>>(s: T) -> Option<Builtin> {
        get_builtin(s.as_ref())
    }

    pub fn from_sym(sym: &Sym) -> Option<Builtin> {
        get_builtin(sym.as_str())
    }

    pub fn sym(&self) -> Sym {
        Sym::new(self.as_str())
    }

    /// Operators recognized by the compiler. These cannot be shadowed.
    pub fn is_special_form(&self) -> bool {
        use Builtin::*;
        matches!(self, Vau | Lambda | LambdaShort | Define | Set | SetShort |
                       If | IfShort | Sequence | Begin | Quote | CallCC)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in BUILTIN_SYMBOLS {
            assert_eq!(Builtin::from(name).map(|b| b.as_str()), Some(name));
        }
        assert_eq!(Builtin::from("frobnicate"), None);
        assert!(Builtin::from_sym(&Sym::new("call/cc")).unwrap().is_special_form());
        assert!(!Builtin::Eval.is_special_form());
    }
}
