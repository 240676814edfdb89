use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::CompileError;
use crate::span::Location;

use super::symbol::Symbol;

/// One block's symbols plus a shared link to the enclosing block.
///
/// Scopes are never relinked; entering and leaving only swaps which
/// `Rc<Scope>` the context treats as current.
#[derive(Debug, Default)]
pub struct Scope {
    symbols: RefCell<HashMap<String, Rc<Symbol>>>,
    next: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new(next: Option<Rc<Scope>>) -> Self {
        Self {
            symbols: RefCell::new(HashMap::new()),
            next,
        }
    }

    pub fn next_scope(&self) -> Option<Rc<Scope>> {
        self.next.clone()
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.next.as_deref();
        while let Some(scope) = cur {
            depth += 1;
            cur = scope.next.as_deref();
        }
        depth
    }

    pub fn add(&self, name: &str, location: &Location) -> Result<Rc<Symbol>, CompileError> {
        let mut symbols = self.symbols.borrow_mut();
        if symbols.contains_key(name) {
            return Err(CompileError::DuplicateDeclaration {
                name: name.to_string(),
                location: location.clone(),
            });
        }
        let symbol = Rc::new(Symbol::new(name));
        symbols.insert(name.to_string(), Rc::clone(&symbol));
        Ok(symbol)
    }

    pub fn maybe_find(&self, name: &str) -> Option<Rc<Symbol>> {
        if let Some(symbol) = self.symbols.borrow().get(name) {
            return Some(Rc::clone(symbol));
        }
        self.next.as_ref().and_then(|next| next.maybe_find(name))
    }

    pub fn find(&self, name: &str, location: &Location) -> Result<Rc<Symbol>, CompileError> {
        self.maybe_find(name)
            .ok_or_else(|| CompileError::UnresolvedSymbol {
                name: name.to_string(),
                location: location.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope::new(Some(Rc::clone(parent))))
    }

    #[test]
    fn add_then_find_returns_same_symbol() {
        let loc = Location::default();
        let scope = Scope::new(None);
        let added = scope.add("X", &loc).unwrap();
        let found = scope.find("X", &loc).unwrap();
        assert!(Rc::ptr_eq(&added, &found));
    }

    #[test]
    fn duplicate_in_same_scope_fails() {
        let loc = Location::default();
        let scope = Scope::new(None);
        scope.add("X", &loc).unwrap();
        let err = scope.add("X", &loc).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDeclaration { ref name, .. } if name == "X"));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let loc = Location::default();
        let outer = Rc::new(Scope::new(None));
        let outer_x = outer.add("X", &loc).unwrap();
        let inner = child(&outer);
        let inner_x = inner.add("X", &loc).unwrap();

        assert!(Rc::ptr_eq(&inner.find("X", &loc).unwrap(), &inner_x));
        assert!(Rc::ptr_eq(&outer.find("X", &loc).unwrap(), &outer_x));
    }

    #[test]
    fn lookup_walks_the_whole_chain() {
        let loc = Location::default();
        let root = Rc::new(Scope::new(None));
        let top = root.add("TOP", &loc).unwrap();
        let innermost = child(&child(&child(&root)));
        assert_eq!(innermost.depth(), 3);
        assert!(Rc::ptr_eq(&innermost.find("TOP", &loc).unwrap(), &top));
    }

    #[test]
    fn missing_name_is_unresolved() {
        let loc = Location::initialize("t.nst");
        let scope = child(&Rc::new(Scope::new(None)));
        assert!(scope.maybe_find("NOPE").is_none());
        let err = scope.find("NOPE", &loc).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedSymbol { ref name, .. } if name == "NOPE"));
        assert_eq!(err.location(), Some(&loc));
    }

    #[test]
    fn popped_scope_survives_while_referenced() {
        let loc = Location::default();
        let root = Rc::new(Scope::new(None));
        let inner = child(&root);
        let y = inner.add("Y", &loc).unwrap();
        let kept = Rc::clone(&inner);
        drop(inner);
        assert!(Rc::ptr_eq(&kept.find("Y", &loc).unwrap(), &y));
        assert!(root.maybe_find("Y").is_none());
    }
}
