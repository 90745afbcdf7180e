use std::{
    any::Any,
    fmt::Debug,
    sync::{Arc, Mutex, Weak},
};

use crate::class::{DataType, ScriptClass};

use super::value::{Handle, HandleRef};

pub type InstanceRef = Arc<Instance>;

/// One data slot of an instance: a 32-bit primitive payload or a handle.
#[derive(Clone, Debug)]
pub enum Slot {
    Int(i32),
    Float(f32),
    Bool(bool),
    Native(HandleRef),
}

/// A live object: a fixed slot array sized by the class's effective data
/// layout, plus optional host-side backing state for native classes.
///
/// An instance is owned by the handles and stack values referring to it;
/// it is dropped when the last of those goes away.
pub struct Instance {
    class: Arc<ScriptClass>,
    slots: Mutex<Vec<Slot>>,
    self_handle: Mutex<Weak<Handle>>,
    native_data: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Instance {
    /// Allocate with every slot zeroed for its declared type; native
    /// slots start as null handles.
    #[must_use]
    pub fn new(class: Arc<ScriptClass>) -> InstanceRef {
        let slots = (0..class.num_data())
            .map(|idx| {
                let decl = class
                    .data_decl(idx)
                    .unwrap_or_else(|| panic!("class {} has no data slot {idx}", class.name));
                match &decl.ty {
                    DataType::Int => Slot::Int(0),
                    DataType::Float => Slot::Float(0.0),
                    DataType::Bool => Slot::Bool(false),
                    DataType::Native(_) => Slot::Native(Handle::null()),
                    DataType::Void => {
                        panic!("void data slot {idx} on class {}", class.name)
                    }
                }
            })
            .collect();
        Arc::new(Self {
            class,
            slots: Mutex::new(slots),
            self_handle: Mutex::new(Weak::new()),
            native_data: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn class(&self) -> &Arc<ScriptClass> {
        &self.class
    }

    /// The shared handle for this instance. All live references to one
    /// instance go through the same handle; a fresh one is minted only
    /// after every previous holder dropped theirs.
    #[must_use]
    pub fn handle(self: &Arc<Self>) -> HandleRef {
        let mut slot = self.self_handle.lock().unwrap();
        if let Some(handle) = slot.upgrade() {
            return handle;
        }
        let handle = Handle::to(self.clone());
        *slot = Arc::downgrade(&handle);
        handle
    }

    /// # Panics
    /// If the slot index is out of range.
    #[must_use]
    pub fn get_slot(&self, idx: usize) -> Slot {
        self.slots.lock().unwrap()[idx].clone()
    }

    /// # Panics
    /// If the slot index is out of range.
    pub fn set_slot(&self, idx: usize, slot: Slot) {
        self.slots.lock().unwrap()[idx] = slot;
    }

    /// Attach host backing state; used by factories of native classes.
    pub fn init_native_data(&self, data: Box<dyn Any + Send>) {
        *self.native_data.lock().unwrap() = Some(data);
    }

    /// Run a closure over the typed host backing state, if present and
    /// of the requested type.
    pub fn with_native_data<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.native_data
            .lock()
            .unwrap()
            .as_mut()
            .and_then(|data| data.downcast_mut::<T>())
            .map(f)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?}",
            self.class.name,
            &*self.slots.lock().unwrap()
        )
    }
}
