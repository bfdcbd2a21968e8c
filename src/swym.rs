//! Symbol Interning
//!
//! Every distinct symbol name is stored exactly once per thread, so two
//! `Sym`s are equal iff they point at the same string. Comparison and hashing
//! are pointer operations, which keeps environment lookups cheap.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHashSet;

#[derive(Default)]
struct SwymDb {
    names: AHashSet<Key>,
}

/// Set key which hashes by content, so lookups by `&str` find the interned
/// string.
#[derive(PartialEq, Eq, Hash)]
struct Key(Rc<str>);

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

thread_local! {
    static SWYM: RefCell<SwymDb> = RefCell::new(SwymDb::default());
}

#[derive(Clone)]
pub struct Sym(Rc<str>);

impl Sym {
    pub fn new(name: &str) -> Sym {
        SWYM.with(|db| {
            let mut db = db.borrow_mut();
            if let Some(Key(s)) = db.names.get(name) {
                return Sym(s.clone());
            }
            let s: Rc<str> = Rc::from(name);
            db.names.insert(Key(s.clone()));
            Sym(s)
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of symbols interned on this thread.
    pub fn count() -> usize {
        SWYM.with(|db| db.borrow().names.len())
    }
}

impl PartialEq for Sym {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Sym {}

impl Hash for Sym {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const u8 as usize).hash(state)
    }
}

impl AsRef<str> for Sym {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Sym {
    fn from(name: &str) -> Self {
        Sym::new(name)
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &*self.0)
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_symbols_are_pointer_equal() {
        let a = Sym::new("swym-test-a");
        let b = Sym::new(&format!("swym-test-{}", "a"));
        assert_eq!(a, b);
        assert!(Rc::ptr_eq(&a.0, &b.0));
        assert_ne!(a, Sym::new("swym-test-b"));
    }

    #[test]
    fn interning_does_not_duplicate() {
        let before = Sym::count();
        for _ in 0..10 {
            Sym::new("swym-test-repeated");
        }
        assert_eq!(Sym::count(), before + 1);
    }
}
