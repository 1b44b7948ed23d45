use crate::types::{NativeFn, NativeFunction, TypeTag, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
// Carries no location; the evaluator attaches the line of the offending token.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Undefined variable: '{0}'")]
    UnboundVariable(String),
    #[error("Variable '{0}' is already declared in this scope")]
    AlreadyDefined(String),
    #[error("Attempting to assign to undefined variable '{0}'")]
    UndefinedAssignment(String),
    #[error("Cannot assign {found} value to {expected} variable '{name}'")]
    TypeMismatch {
        name: String,
        expected: TypeTag,
        found: TypeTag,
    },
}

// --- Environment Definition ---

#[derive(Debug)]
pub struct Environment {
    // Use Rc<RefCell<...>> to allow shared ownership and interior mutability.
    // Closures keep the scope they were declared in alive after it exits.
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: HashMap::new(),
        }))
    }

    /// Creates the global environment with every native function bound.
    pub fn new_global_populated() -> Rc<RefCell<Environment>> {
        let env_ptr = Environment::new(); // Create empty global env
        {
            // Borrow mutably only inside this scope
            let mut env = env_ptr.borrow_mut();
            env.add_native("clock", 0, crate::primitives::prim_clock);
        }
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// A name can only be bound once per frame; inner frames may shadow it.
    pub fn define(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        if self.bindings.contains_key(name) {
            return Err(EnvError::AlreadyDefined(name.to_string()));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    pub fn get(&self, name: &str) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name),
                None => Err(EnvError::UnboundVariable(name.to_string())),
            }
        }
    }

    /// Sets the value of an *existing* variable in the environment chain.
    /// Updates the first frame where the variable is found; the new value must have
    /// the same type tag as the one it replaces.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        if let Some(slot) = self.bindings.get_mut(name) {
            let (expected, found) = (slot.type_tag(), value.type_tag());
            if expected != found {
                return Err(EnvError::TypeMismatch {
                    name: name.to_string(),
                    expected,
                    found,
                });
            }
            *slot = value;
            Ok(())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow_mut().assign(name, value),
                None => Err(EnvError::UndefinedAssignment(name.to_string())),
            }
        }
    }

    /// Helper to add a native procedure to the environment.
    fn add_native(&mut self, name: &'static str, arity: usize, func: NativeFn) {
        self.bindings.insert(
            name.to_string(),
            Value::Native(NativeFunction { name, arity, func }),
        );
    }

    /// Gets every identifier visible from this environment.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}
