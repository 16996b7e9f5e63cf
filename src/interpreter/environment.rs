use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// One lexical scope: a mutable name→value map plus a link to the
/// scope that lexically encloses it.
///
/// Environments are shared, not owned: the interpreter holds the
/// current one, and every function value holds the one it was declared
/// in. Mutation goes through `&self` with interior mutability, so a
/// closure and the block that created it observe the same bindings.
/// Following `enclosing` links from any environment always ends at the
/// single globals scope, which has no enclosing.
#[derive(Debug, Default)]
pub struct Environment {
    enclosing: Option<Rc<Environment>>,
    values: RefCell<HashMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn with_enclosing(enclosing: Rc<Environment>) -> Rc<Self> {
        Rc::new(Self {
            enclosing: Some(enclosing),
            values: RefCell::new(HashMap::new()),
        })
    }

    /// Inserts or overwrites a binding in this scope. Redefinition is
    /// deliberate: it is what lets a prompt line re-declare a name and
    /// what makes shadowing work.
    pub fn define(&self, name: &str, value: Value) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    /// Reads a binding, walking outward through enclosing scopes.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.get(name),
            None => Err(RuntimeError::undefined_variable(name)),
        }
    }

    /// Writes an *existing* binding, walking outward. Assignment never
    /// creates a binding; an unknown name is the same error as an
    /// unknown read.
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        {
            let mut values = self.values.borrow_mut();
            if let Some(slot) = values.get_mut(&name.lexeme) {
                *slot = value;
                return Ok(());
            }
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.assign(name, value),
            None => Err(RuntimeError::undefined_variable(name)),
        }
    }

    /// Reads a binding exactly `distance` scopes out, without search.
    /// The resolver guarantees the name is there; a miss is an
    /// interpreter bug, not a user error, so it panics.
    pub fn get_at(self: &Rc<Self>, distance: usize, name: &str) -> Value {
        let scope = self.ancestor(distance);
        let values = scope.values.borrow();
        match values.get(name) {
            Some(value) => value.clone(),
            None => panic!("resolved variable '{name}' missing {distance} scopes out"),
        }
    }

    /// Writes a binding exactly `distance` scopes out. Same invariant
    /// as [`Environment::get_at`].
    pub fn assign_at(self: &Rc<Self>, distance: usize, name: &str, value: Value) {
        let scope = self.ancestor(distance);
        let mut values = scope.values.borrow_mut();
        match values.get_mut(name) {
            Some(slot) => *slot = value,
            None => panic!("resolved variable '{name}' missing {distance} scopes out"),
        }
    }

    fn ancestor(self: &Rc<Self>, distance: usize) -> Rc<Environment> {
        let mut scope = Rc::clone(self);
        for _ in 0..distance {
            let enclosing = scope
                .enclosing
                .clone()
                .expect("scope chain ends before the resolved depth");
            scope = enclosing;
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenKind::Identifier, lexeme.to_string(), None, 1)
    }

    #[test]
    fn define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0));
        assert_eq!(env.get(&name("x")).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn get_walks_outward() {
        let outer = Environment::new();
        outer.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&outer));
        assert_eq!(inner.get(&name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn shadowing_hides_outer_binding() {
        let outer = Environment::new();
        outer.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.define("x", Value::Number(2.0));
        assert_eq!(inner.get(&name("x")).unwrap(), Value::Number(2.0));
        assert_eq!(outer.get(&name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_updates_the_declaring_scope() {
        let outer = Environment::new();
        outer.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.assign(&name("x"), Value::Number(5.0)).unwrap();
        assert_eq!(outer.get(&name("x")).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn assign_never_creates() {
        let env = Environment::new();
        let err = env.assign(&name("ghost"), Value::Nil).unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'ghost'.");
    }

    #[test]
    fn get_unknown_is_an_error() {
        let env = Environment::new();
        assert!(env.get(&name("ghost")).is_err());
    }

    #[test]
    fn get_at_jumps_exact_hops() {
        let global = Environment::new();
        global.define("x", Value::Number(1.0));
        let middle = Environment::with_enclosing(Rc::clone(&global));
        middle.define("x", Value::Number(2.0));
        let inner = Environment::with_enclosing(Rc::clone(&middle));

        assert_eq!(inner.get_at(1, "x"), Value::Number(2.0));
        assert_eq!(inner.get_at(2, "x"), Value::Number(1.0));
    }

    #[test]
    fn assign_at_mutates_exact_scope() {
        let global = Environment::new();
        global.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&global));
        inner.assign_at(1, "x", Value::Number(9.0));
        assert_eq!(global.get(&name("x")).unwrap(), Value::Number(9.0));
    }

    #[test]
    fn shared_handles_observe_mutation() {
        // Two closures capturing the same scope see each other's writes.
        let shared = Environment::new();
        shared.define("count", Value::Number(0.0));
        let first = Rc::clone(&shared);
        let second = Rc::clone(&shared);
        first.assign(&name("count"), Value::Number(1.0)).unwrap();
        assert_eq!(second.get(&name("count")).unwrap(), Value::Number(1.0));
    }
}
