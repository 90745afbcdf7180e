use std::{collections::HashMap, sync::Arc};

use crate::class::{NativeFn, ScriptClass, ScriptFactory};

pub trait ClassArea {
    fn search(&self, class: &str) -> Option<Arc<ScriptClass>>;
}

/// Mutable class list used while the compiler links classes.
pub struct WorkingClassArea {
    classes: Vec<Arc<ScriptClass>>,
}

impl WorkingClassArea {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            classes: Vec::new(),
        }
    }

    pub fn push(&mut self, class: Arc<ScriptClass>) {
        self.classes.push(class);
    }

    #[must_use]
    pub fn to_shared(self) -> SharedClassArea {
        SharedClassArea {
            classes: Arc::from(
                self.classes
                    .into_iter()
                    .map(|class| (class.name.clone(), class))
                    .collect::<HashMap<_, _>>(),
            ),
        }
    }
}

impl Default for WorkingClassArea {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassArea for WorkingClassArea {
    fn search(&self, class: &str) -> Option<Arc<ScriptClass>> {
        self.classes
            .iter()
            .find(|possible| &*possible.name == class)
            .cloned()
    }
}

/// Immutable name-keyed view of every linked class, cheap to clone into
/// the VM.
#[derive(Clone)]
pub struct SharedClassArea {
    classes: Arc<HashMap<Arc<str>, Arc<ScriptClass>>>,
}

impl std::fmt::Debug for SharedClassArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClassArea")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SharedClassArea {
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ScriptClass>> {
        self.classes.values()
    }
}

impl ClassArea for SharedClassArea {
    fn search(&self, class: &str) -> Option<Arc<ScriptClass>> {
        self.classes.get(class).cloned()
    }
}

/// Host-side registration of factories and native implementations,
/// keyed by class name and vtable/constructor index. Collected before a
/// build and installed into the linked classes afterwards.
#[derive(Default)]
pub struct NativeRegistry {
    factories: HashMap<String, Arc<dyn ScriptFactory>>,
    functions: HashMap<(String, usize), NativeFn>,
    constructors: HashMap<(String, usize), NativeFn>,
}

impl NativeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, class: &str, factory: Arc<dyn ScriptFactory>) {
        self.factories.insert(class.to_string(), factory);
    }

    pub fn register_function(&mut self, class: &str, idx: usize, function: NativeFn) {
        self.functions.insert((class.to_string(), idx), function);
    }

    pub fn register_constructor(&mut self, class: &str, idx: usize, function: NativeFn) {
        self.constructors
            .insert((class.to_string(), idx), function);
    }

    /// Bind everything registered into the given class area.
    ///
    /// # Errors
    /// If a registration names a class the area does not contain.
    pub fn install(&self, area: &SharedClassArea) -> Result<(), String> {
        for (name, factory) in &self.factories {
            let class = area
                .search(name)
                .ok_or_else(|| format!("no class {name} for registered factory"))?;
            class.set_factory(factory.clone());
        }
        for ((name, idx), function) in &self.functions {
            let class = area
                .search(name)
                .ok_or_else(|| format!("no class {name} for registered native method"))?;
            class.set_native_function(*idx, function.clone());
        }
        for ((name, idx), function) in &self.constructors {
            let class = area
                .search(name)
                .ok_or_else(|| format!("no class {name} for registered native constructor"))?;
            class.set_native_constructor(*idx, function.clone());
        }
        Ok(())
    }
}
