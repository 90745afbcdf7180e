use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use crate::class::{DataType, ScriptClass};
use crate::data::{ClassArea, SharedClassArea};

use super::instance::InstanceRef;

/// Shared, owning, nullable indirection to an instance.
///
/// Every `native`-typed value is a handle. The handle keeps its target
/// alive; clearing it detaches the target while the handle itself stays
/// valid, so a reference can outlive the pointee by reading null.
/// Instance-to-instance cycles keep each other alive; there is no
/// collector.
pub struct Handle {
    target: Mutex<Option<InstanceRef>>,
}

pub type HandleRef = Arc<Handle>;

impl Handle {
    /// A handle pointing at nothing.
    #[must_use]
    pub fn null() -> HandleRef {
        Arc::new(Self {
            target: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn to(instance: InstanceRef) -> HandleRef {
        Arc::new(Self {
            target: Mutex::new(Some(instance)),
        })
    }

    #[must_use]
    pub fn get(&self) -> Option<InstanceRef> {
        self.target.lock().unwrap().clone()
    }

    /// Detach the target; the instance is dropped once nothing else owns
    /// it.
    pub fn clear(&self) {
        *self.target.lock().unwrap() = None;
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.target.lock().unwrap() {
            Some(instance) => write!(f, "handle -> {}", instance.class().name),
            None => write!(f, "handle -> null"),
        }
    }
}

/// A typed operand-stack value.
///
/// The class on a `Native` value is the *declared* one; the actual
/// target, when present, is always a subtype of it.
#[derive(Clone)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    Native {
        class: Arc<ScriptClass>,
        handle: HandleRef,
    },
}

impl Value {
    /// The zero of a declared type; `void` returns the dummy bool the
    /// compiler substitutes for it.
    ///
    /// # Panics
    /// If a native type names a class the area does not contain.
    #[must_use]
    pub fn zero_of(ty: &DataType, area: &SharedClassArea) -> Self {
        match ty {
            DataType::Int => Self::Int(0),
            DataType::Float => Self::Float(0.0),
            DataType::Bool | DataType::Void => Self::Bool(false),
            DataType::Native(name) => Self::Native {
                class: area
                    .search(name)
                    .unwrap_or_else(|| panic!("unknown class {name}")),
                handle: Handle::null(),
            },
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Native { .. } => "native",
        }
    }

    /// # Panics
    /// If the value is not an int.
    #[must_use]
    pub fn int(&self) -> i32 {
        match self {
            Self::Int(value) => *value,
            other => panic!("expected int, found {}", other.type_name()),
        }
    }

    /// # Panics
    /// If the value is not a float.
    #[must_use]
    pub fn float(&self) -> f32 {
        match self {
            Self::Float(value) => *value,
            other => panic!("expected float, found {}", other.type_name()),
        }
    }

    /// # Panics
    /// If the value is not a bool.
    #[must_use]
    pub fn bool(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            other => panic!("expected bool, found {}", other.type_name()),
        }
    }

    /// # Panics
    /// If the value is not a native reference.
    #[must_use]
    pub fn native(&self) -> (&Arc<ScriptClass>, &HandleRef) {
        match self {
            Self::Native { class, handle } => (class, handle),
            other => panic!("expected native reference, found {}", other.type_name()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "int {value}"),
            Self::Float(value) => write!(f, "float {value}"),
            Self::Bool(value) => write!(f, "bool {value}"),
            Self::Native { class, handle } => write!(f, "{} {handle:?}", class.name),
        }
    }
}
