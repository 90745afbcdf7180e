use std::{
    fmt::{Debug, Display},
    sync::{Arc, OnceLock},
};

use crate::bytecode::Word;
use crate::vm::{InstanceRef, Value};

/// The four primitive data categories plus the return-only `void`.
/// `Native` carries the declared class name; the name is resolved against
/// the loaded declarations during compilation and against the class area
/// at run time.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DataType {
    Bool,
    Int,
    Float,
    Void,
    Native(Arc<str>),
}

impl DataType {
    /// Map a source type name onto its category; anything that is not a
    /// built-in tag is a native class reference.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "void" => Self::Void,
            _ => Self::Native(name.into()),
        }
    }

    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    #[must_use]
    pub const fn native_name(&self) -> Option<&Arc<str>> {
        match self {
            Self::Native(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Void => write!(f, "void"),
            Self::Native(name) => write!(f, "{name}"),
        }
    }
}

/// A named, typed slot: a field, a parameter, or a local.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DataDecl {
    pub name: Arc<str>,
    pub ty: DataType,
    pub line: u32,
}

/// Runtime view of a function signature.
#[derive(Clone, Debug)]
pub struct FunctionDefinition {
    pub name: Arc<str>,
    pub return_type: DataType,
    pub params: Vec<DataDecl>,
}

impl FunctionDefinition {
    #[must_use]
    pub fn num_args(&self) -> usize {
        self.params.len()
    }
}

/// A host function bound into a native method or constructor slot.
pub type NativeFn = Arc<dyn Fn(&InstanceRef, &[Value]) -> Value + Send + Sync>;

/// A compiled function body.
pub struct ByteCode {
    pub words: Vec<Word>,
    /// exact operand-stack peak, computed at compile time
    pub max_stack: usize,
    pub locals: Vec<DataDecl>,
    /// interned targets of `new`, indexed by the `NEW` operand
    pub new_class_names: Vec<Arc<str>>,
}

impl Debug for ByteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "max_stack {}, {} locals\n{}",
            self.max_stack,
            self.locals.len(),
            crate::bytecode::disassemble(&self.words)
        )
    }
}

/// Code contained in a method or constructor implementation.
pub enum Code {
    Bytecode(ByteCode),
    /// bound by the embedder after compilation
    Native(OnceLock<NativeFn>),
}

impl Code {
    #[must_use]
    pub const fn as_bytecode(&self) -> Option<&ByteCode> {
        match self {
            Self::Bytecode(code) => Some(code),
            Self::Native(_) => None,
        }
    }

    #[must_use]
    pub fn as_native(&self) -> Option<&NativeFn> {
        match self {
            Self::Native(slot) => slot.get(),
            Self::Bytecode(_) => None,
        }
    }

    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytecode(code) => code.fmt(f),
            Self::Native(slot) => {
                if slot.get().is_some() {
                    write!(f, "<<native code>>")
                } else {
                    write!(f, "<<unbound native slot>>")
                }
            }
        }
    }
}

/// One method or constructor implementation, owned by the class that
/// declared it and shared into subclass vtables.
#[derive(Debug)]
pub struct FunctionImpl {
    pub definition: FunctionDefinition,
    /// the class that declared this implementation; `super` dispatch
    /// resolves against its superclass
    pub class_name: Arc<str>,
    pub code: Code,
}

impl FunctionImpl {
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.code.is_native()
    }
}

/// Allocator hook for classes backed by the embedding runtime.
pub trait ScriptFactory: Send + Sync {
    fn create_instance(&self, class: &Arc<ScriptClass>) -> InstanceRef;
    fn name(&self) -> &str;
}

/// A linked, per-class compilation artifact.
///
/// The method vtable is fully materialized: the superclass's effective
/// vtable with overridden slots replaced in place and own methods
/// appended, so a method's index is stable for the class and every
/// subclass. Data slots are super-prefixed; constructors are not
/// inherited.
pub struct ScriptClass {
    pub name: Arc<str>,
    pub native: bool,
    pub super_class: Option<Arc<ScriptClass>>,
    /// own data members only; effective layout is `super ++ own`
    pub data: Vec<DataDecl>,
    vtable: Vec<Arc<FunctionImpl>>,
    constructors: Vec<Arc<FunctionImpl>>,
    factory: OnceLock<Arc<dyn ScriptFactory>>,
}

impl ScriptClass {
    #[must_use]
    pub fn new(
        name: Arc<str>,
        native: bool,
        super_class: Option<Arc<Self>>,
        data: Vec<DataDecl>,
        vtable: Vec<Arc<FunctionImpl>>,
        constructors: Vec<Arc<FunctionImpl>>,
    ) -> Self {
        Self {
            name,
            native,
            super_class,
            data,
            vtable,
            constructors,
            factory: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn num_data(&self) -> usize {
        self.super_class
            .as_ref()
            .map_or(0, |super_class| super_class.num_data())
            + self.data.len()
    }

    /// The declaration of effective data slot `idx`, walking the super
    /// prefix.
    #[must_use]
    pub fn data_decl(&self, idx: usize) -> Option<&DataDecl> {
        if let Some(super_class) = &self.super_class {
            let super_len = super_class.num_data();
            if idx < super_len {
                return super_class.data_decl(idx);
            }
            return self.data.get(idx - super_len);
        }
        self.data.get(idx)
    }

    /// Effective slot index of a named data member; own members shadow
    /// inherited ones.
    #[must_use]
    pub fn data_index(&self, name: &str) -> Option<usize> {
        let super_len = self
            .super_class
            .as_ref()
            .map_or(0, |super_class| super_class.num_data());
        if let Some(idx) = self.data.iter().position(|data| &*data.name == name) {
            return Some(super_len + idx);
        }
        self.super_class
            .as_ref()
            .and_then(|super_class| super_class.data_index(name))
    }

    #[must_use]
    pub fn num_functions(&self) -> usize {
        self.vtable.len()
    }

    #[must_use]
    pub fn function(&self, idx: usize) -> Option<&Arc<FunctionImpl>> {
        self.vtable.get(idx)
    }

    /// Vtable slot of a named method; stable across the subclass chain.
    #[must_use]
    pub fn vtable_index(&self, name: &str) -> Option<usize> {
        self.vtable
            .iter()
            .position(|function| &*function.definition.name == name)
    }

    #[must_use]
    pub fn num_constructors(&self) -> usize {
        self.constructors.len()
    }

    #[must_use]
    pub fn constructor(&self, idx: usize) -> Option<&Arc<FunctionImpl>> {
        self.constructors.get(idx)
    }

    /// Single-inheritance subtype test.
    #[must_use]
    pub fn is_a(&self, other: &Self) -> bool {
        if self.name == other.name {
            return true;
        }
        self.super_class
            .as_ref()
            .is_some_and(|super_class| super_class.is_a(other))
    }

    /// The nearest class on the super chain (including self) whose
    /// instances are allocated by a host factory.
    #[must_use]
    pub fn closest_native(self: &Arc<Self>) -> Option<Arc<Self>> {
        if self.native {
            return Some(self.clone());
        }
        self.super_class
            .as_ref()
            .and_then(ScriptClass::closest_native)
    }

    /// Allocate an instance with zeroed slots. Constructors are invoked
    /// separately, by the VM's `NEW`/`CALLC` pair or by the host.
    ///
    /// # Panics
    /// If the class inherits native state but no factory was registered.
    #[must_use]
    pub fn create_instance(self: &Arc<Self>) -> InstanceRef {
        self.closest_native().map_or_else(
            || crate::vm::Instance::new(self.clone()),
            |native| {
                let factory = native.factory.get().unwrap_or_else(|| {
                    panic!("no factory registered for native class {}", native.name)
                });
                factory.create_instance(self)
            },
        )
    }

    /// # Panics
    /// If a factory is already set, or the class is not native.
    pub fn set_factory(&self, factory: Arc<dyn ScriptFactory>) {
        assert!(self.native, "factory on non-native class {}", self.name);
        assert!(
            self.factory.set(factory).is_ok(),
            "factory already registered for class {}",
            self.name
        );
    }

    /// Bind a host function into a native method slot.
    ///
    /// # Panics
    /// If the slot does not exist, is not native, or is already bound.
    pub fn set_native_function(&self, idx: usize, function: NativeFn) {
        let slot = self
            .function(idx)
            .unwrap_or_else(|| panic!("class {} has no method slot {idx}", self.name));
        let Code::Native(cell) = &slot.code else {
            panic!("method slot {idx} of class {} is not native", self.name);
        };
        assert!(
            cell.set(function).is_ok(),
            "method slot {idx} of class {} is already bound",
            self.name
        );
    }

    /// Bind a host function into a native constructor slot.
    ///
    /// # Panics
    /// If the slot does not exist, is not native, or is already bound.
    pub fn set_native_constructor(&self, idx: usize, function: NativeFn) {
        let slot = self
            .constructor(idx)
            .unwrap_or_else(|| panic!("class {} has no constructor slot {idx}", self.name));
        let Code::Native(cell) = &slot.code else {
            panic!("constructor slot {idx} of class {} is not native", self.name);
        };
        assert!(
            cell.set(function).is_ok(),
            "constructor slot {idx} of class {} is already bound",
            self.name
        );
    }
}

impl Debug for ScriptClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptClass")
            .field("name", &self.name)
            .field("native", &self.native)
            .field(
                "super",
                &self.super_class.as_ref().map(|super_class| &super_class.name),
            )
            .field("data", &self.data)
            .field(
                "vtable",
                &self
                    .vtable
                    .iter()
                    .map(|function| function.definition.name.clone())
                    .collect::<Vec<_>>(),
            )
            .field("constructors", &self.constructors.len())
            .finish()
    }
}
