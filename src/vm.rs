//! The stack interpreter.
//!
//! Single-threaded and synchronous: one frame per call, nested calls
//! recurse on the host stack and run to completion before the caller
//! resumes. Runtime invariant violations are compiler bugs, so they
//! panic with the frame's class, method, and program counter rather than
//! surfacing as recoverable errors.

pub mod instance;
pub mod value;

pub use instance::{Instance, InstanceRef, Slot};
pub use value::{Handle, HandleRef, Value};

use std::sync::Arc;

use crate::bytecode::{opcode, operand, Opcode, Word};
use crate::class::{ByteCode, Code, FunctionImpl, ScriptClass};
use crate::data::{ClassArea, SharedClassArea};

pub struct Vm {
    class_area: SharedClassArea,
    verbose: bool,
}

impl Vm {
    #[must_use]
    pub const fn new(class_area: SharedClassArea) -> Self {
        Self {
            class_area,
            verbose: false,
        }
    }

    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Allocate an instance and run the given constructor over it.
    pub fn new_instance(
        &self,
        class: &Arc<ScriptClass>,
        ctor_idx: usize,
        args: Vec<Value>,
    ) -> InstanceRef {
        let instance = class.create_instance();
        self.call_constructor(&instance, ctor_idx, args);
        instance
    }

    /// Invoke vtable slot `fn_idx`, dispatching on the instance's
    /// dynamic class.
    ///
    /// # Panics
    /// On a bad slot index, an unbound native slot, or any interpreter
    /// invariant violation inside the callee.
    pub fn call_function(&self, instance: &InstanceRef, fn_idx: usize, args: Vec<Value>) -> Value {
        let class = instance.class();
        let function = class
            .function(fn_idx)
            .unwrap_or_else(|| panic!("class {} has no method slot {fn_idx}", class.name))
            .clone();
        self.call_impl(instance, &function, args)
    }

    /// Invoke constructor `ctor_idx` of the instance's class.
    ///
    /// # Panics
    /// As [`Self::call_function`].
    pub fn call_constructor(
        &self,
        instance: &InstanceRef,
        ctor_idx: usize,
        args: Vec<Value>,
    ) -> Value {
        let class = instance.class();
        let ctor = class
            .constructor(ctor_idx)
            .unwrap_or_else(|| panic!("class {} has no constructor slot {ctor_idx}", class.name))
            .clone();
        self.call_impl(instance, &ctor, args)
    }

    fn call_impl(&self, instance: &InstanceRef, function: &FunctionImpl, args: Vec<Value>) -> Value {
        assert_eq!(
            args.len(),
            function.definition.num_args(),
            "{}.{}: argument count mismatch",
            function.class_name,
            function.definition.name
        );
        match &function.code {
            Code::Native(slot) => {
                let native = slot.get().unwrap_or_else(|| {
                    panic!(
                        "native function {}.{} is not bound",
                        function.class_name, function.definition.name
                    )
                });
                native(instance, &args)
            }
            Code::Bytecode(code) => self.exec(instance, function, code, args),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn exec(
        &self,
        instance: &InstanceRef,
        function: &FunctionImpl,
        code: &ByteCode,
        mut args: Vec<Value>,
    ) -> Value {
        let ctx = format!("{}.{}", function.class_name, function.definition.name);

        // locals start as the zero of their declared type
        let mut locals: Vec<Value> = code
            .locals
            .iter()
            .map(|local| Value::zero_of(&local.ty, &self.class_area))
            .collect();
        let mut stack: Vec<Value> = Vec::with_capacity(code.max_stack);

        let mut pc = 0;
        loop {
            let word = *code
                .words
                .get(pc)
                .unwrap_or_else(|| panic!("{ctx}: pc {pc} ran past the code block"));
            let op = opcode(word)
                .unwrap_or_else(|| panic!("{ctx}: bad opcode in word {word:#010x} at pc {pc}"));
            if self.verbose {
                println!("{ctx} {pc:4}  {op}");
            }
            match op {
                Opcode::Invalid => panic!("{ctx}: invalid instruction at pc {pc}"),
                Opcode::Nop => {}
                Opcode::CallfSelfG => {
                    pc += 1;
                    let fn_idx = data_word(code, pc, &ctx) as usize;
                    let class = instance.class();
                    let callee = class
                        .function(fn_idx)
                        .unwrap_or_else(|| panic!("{ctx}: no method slot {fn_idx} at pc {pc}"));
                    let num_args = callee.definition.num_args();
                    let call_args = split_args(&mut stack, num_args, &ctx);
                    let ret = self.call_function(instance, fn_idx, call_args);
                    stack.push(ret);
                }
                Opcode::CallfSuperG => {
                    pc += 1;
                    let fn_idx = data_word(code, pc, &ctx) as usize;
                    let super_class = self.super_of_defining(function, &ctx);
                    let callee = super_class
                        .function(fn_idx)
                        .unwrap_or_else(|| panic!("{ctx}: no super method slot {fn_idx}"))
                        .clone();
                    let num_args = callee.definition.num_args();
                    let call_args = split_args(&mut stack, num_args, &ctx);
                    let ret = self.call_impl(instance, &callee, call_args);
                    stack.push(ret);
                }
                Opcode::CallcSelfSuper => {
                    pc += 1;
                    let ctor_idx = data_word(code, pc, &ctx) as usize;
                    let super_class = self.super_of_defining(function, &ctx);
                    let ctor = super_class
                        .constructor(ctor_idx)
                        .unwrap_or_else(|| panic!("{ctx}: no super constructor slot {ctor_idx}"))
                        .clone();
                    let num_args = ctor.definition.num_args();
                    let call_args = split_args(&mut stack, num_args, &ctx);
                    let ret = self.call_impl(instance, &ctor, call_args);
                    stack.push(ret);
                }
                Opcode::CallfPushedG => {
                    pc += 1;
                    let fn_idx = data_word(code, pc, &ctx) as usize;
                    let receiver = pop(&mut stack, &ctx, pc);
                    let (declared, handle) = receiver.native();
                    let callee = declared
                        .function(fn_idx)
                        .unwrap_or_else(|| panic!("{ctx}: no method slot {fn_idx} on {}", declared.name));
                    let return_type = callee.definition.return_type.clone();
                    let num_args = callee.definition.num_args();
                    let call_args = split_args(&mut stack, num_args, &ctx);
                    let ret = handle.get().map_or_else(
                        // calling through a null reference produces the
                        // zero of the declared return type
                        || Value::zero_of(&return_type, &self.class_area),
                        |target| {
                            debug_assert!(target.class().is_a(declared));
                            self.call_function(&target, fn_idx, call_args)
                        },
                    );
                    stack.push(ret);
                }
                Opcode::CallcPushedG => {
                    pc += 1;
                    let ctor_idx = data_word(code, pc, &ctx) as usize;
                    let receiver = pop(&mut stack, &ctx, pc);
                    let (declared, handle) = receiver.native();
                    let target = handle.get().unwrap_or_else(|| {
                        panic!("{ctx}: constructor call on null receiver at pc {pc}")
                    });
                    debug_assert!(target.class().is_a(declared));
                    let ctor = declared
                        .constructor(ctor_idx)
                        .unwrap_or_else(|| {
                            panic!("{ctx}: no constructor slot {ctor_idx} on {}", declared.name)
                        })
                        .clone();
                    let num_args = ctor.definition.num_args();
                    let call_args = split_args(&mut stack, num_args, &ctx);
                    // the constructor's dummy return is discarded; the
                    // freshly built instance is the call's value
                    self.call_impl(&target, &ctor, call_args);
                    stack.push(receiver);
                }
                Opcode::New => {
                    let name_idx = operand(word) as usize;
                    let name = code
                        .new_class_names
                        .get(name_idx)
                        .unwrap_or_else(|| panic!("{ctx}: no new-class name {name_idx}"));
                    let class = self
                        .class_area
                        .search(name)
                        .unwrap_or_else(|| panic!("{ctx}: unknown class {name}"));
                    let created = class.create_instance();
                    let handle = created.handle();
                    stack.push(Value::Native { class, handle });
                }
                Opcode::Ret => {
                    let ret = pop(&mut stack, &ctx, pc);
                    assert!(
                        stack.is_empty(),
                        "{ctx}: {} values left on the stack at ret",
                        stack.len()
                    );
                    return ret;
                }
                Opcode::Jmp => {
                    pc = operand(word) as usize;
                    continue;
                }
                Opcode::Jz => {
                    let cond = pop(&mut stack, &ctx, pc);
                    if !cond.bool() {
                        pc = operand(word) as usize;
                        continue;
                    }
                }
                Opcode::StoreSF => {
                    let value = pop(&mut stack, &ctx, pc);
                    instance.set_slot(operand(word) as usize, Slot::Float(value.float()));
                }
                Opcode::StoreSI => {
                    let value = pop(&mut stack, &ctx, pc);
                    instance.set_slot(operand(word) as usize, Slot::Int(value.int()));
                }
                Opcode::StoreSB => {
                    let value = pop(&mut stack, &ctx, pc);
                    instance.set_slot(operand(word) as usize, Slot::Bool(value.bool()));
                }
                Opcode::StoreSN => {
                    let value = pop(&mut stack, &ctx, pc);
                    let (_, handle) = value.native();
                    let idx = operand(word) as usize;
                    let declared = self.slot_class(instance, idx, &ctx);
                    if let Some(target) = handle.get() {
                        assert!(
                            target.class().is_a(&declared),
                            "{ctx}: stored {} into a {} slot",
                            target.class().name,
                            declared.name
                        );
                    }
                    instance.set_slot(idx, Slot::Native(handle.clone()));
                }
                Opcode::StoreLF | Opcode::StoreLI | Opcode::StoreLB | Opcode::StoreLN => {
                    let value = pop(&mut stack, &ctx, pc);
                    let idx = operand(word) as usize;
                    check_store(&locals[idx], &value, &ctx);
                    locals[idx] = value;
                }
                Opcode::StorePF | Opcode::StorePI | Opcode::StorePB | Opcode::StorePN => {
                    let value = pop(&mut stack, &ctx, pc);
                    let idx = operand(word) as usize;
                    check_store(&args[idx], &value, &ctx);
                    args[idx] = value;
                }
                Opcode::FetchSF => {
                    let Slot::Float(value) = instance.get_slot(operand(word) as usize) else {
                        panic!("{ctx}: fetchsf on a non-float slot at pc {pc}")
                    };
                    stack.push(Value::Float(value));
                }
                Opcode::FetchSI => {
                    let Slot::Int(value) = instance.get_slot(operand(word) as usize) else {
                        panic!("{ctx}: fetchsi on a non-int slot at pc {pc}")
                    };
                    stack.push(Value::Int(value));
                }
                Opcode::FetchSB => {
                    let Slot::Bool(value) = instance.get_slot(operand(word) as usize) else {
                        panic!("{ctx}: fetchsb on a non-bool slot at pc {pc}")
                    };
                    stack.push(Value::Bool(value));
                }
                Opcode::FetchSN => {
                    let idx = operand(word) as usize;
                    let Slot::Native(handle) = instance.get_slot(idx) else {
                        panic!("{ctx}: fetchsn on a non-native slot at pc {pc}")
                    };
                    // the pushed value is tagged with the slot's declared
                    // class, not the target's dynamic one
                    let class = self.slot_class(instance, idx, &ctx);
                    stack.push(Value::Native { class, handle });
                }
                Opcode::FetchLF | Opcode::FetchLI | Opcode::FetchLB | Opcode::FetchLN => {
                    let value = locals[operand(word) as usize].clone();
                    debug_assert_eq!(value.type_name(), fetch_tag(op));
                    stack.push(value);
                }
                Opcode::FetchPF | Opcode::FetchPI | Opcode::FetchPB | Opcode::FetchPN => {
                    let value = args[operand(word) as usize].clone();
                    debug_assert_eq!(value.type_name(), fetch_tag(op));
                    stack.push(value);
                }
                Opcode::PushF => {
                    pc += 1;
                    stack.push(Value::Float(f32::from_bits(data_word(code, pc, &ctx))));
                }
                Opcode::PushI => {
                    pc += 1;
                    stack.push(Value::Int(data_word(code, pc, &ctx) as i32));
                }
                Opcode::PushB => {
                    stack.push(Value::Bool(operand(word) != 0));
                }
                Opcode::Pop => {
                    pop(&mut stack, &ctx, pc);
                }
                Opcode::NegF => {
                    let value = pop(&mut stack, &ctx, pc);
                    stack.push(Value::Float(-value.float()));
                }
                Opcode::NegI => {
                    let value = pop(&mut stack, &ctx, pc);
                    stack.push(Value::Int(-value.int()));
                }
                Opcode::Not => {
                    let value = pop(&mut stack, &ctx, pc);
                    stack.push(Value::Bool(!value.bool()));
                }
                Opcode::DivII
                | Opcode::DivFF
                | Opcode::DivFI
                | Opcode::DivIF
                | Opcode::MulII
                | Opcode::MulFF
                | Opcode::MulFI
                | Opcode::MulIF
                | Opcode::SubII
                | Opcode::SubFF
                | Opcode::SubFI
                | Opcode::SubIF
                | Opcode::AddII
                | Opcode::AddFF
                | Opcode::AddFI
                | Opcode::AddIF
                | Opcode::Mod => {
                    let rhs = pop(&mut stack, &ctx, pc);
                    let lhs = pop(&mut stack, &ctx, pc);
                    stack.push(binary_arith(op, &lhs, &rhs));
                }
                Opcode::EqII
                | Opcode::EqFF
                | Opcode::EqFI
                | Opcode::EqIF
                | Opcode::EqBB
                | Opcode::LtEqII
                | Opcode::LtEqFF
                | Opcode::LtEqFI
                | Opcode::LtEqIF
                | Opcode::LtII
                | Opcode::LtFF
                | Opcode::LtFI
                | Opcode::LtIF
                | Opcode::GtEqII
                | Opcode::GtEqFF
                | Opcode::GtEqFI
                | Opcode::GtEqIF
                | Opcode::GtII
                | Opcode::GtFF
                | Opcode::GtFI
                | Opcode::GtIF => {
                    let rhs = pop(&mut stack, &ctx, pc);
                    let lhs = pop(&mut stack, &ctx, pc);
                    stack.push(Value::Bool(compare(op, &lhs, &rhs)));
                }
                Opcode::And => {
                    let rhs = pop(&mut stack, &ctx, pc);
                    let lhs = pop(&mut stack, &ctx, pc);
                    stack.push(Value::Bool(lhs.bool() && rhs.bool()));
                }
                Opcode::Or => {
                    let rhs = pop(&mut stack, &ctx, pc);
                    let lhs = pop(&mut stack, &ctx, pc);
                    stack.push(Value::Bool(lhs.bool() || rhs.bool()));
                }
            }
            debug_assert!(
                stack.len() <= code.max_stack,
                "{ctx}: stack grew past the compiled max of {}",
                code.max_stack
            );
            pc += 1;
        }
    }

    fn super_of_defining(&self, function: &FunctionImpl, ctx: &str) -> Arc<ScriptClass> {
        let defining = self
            .class_area
            .search(&function.class_name)
            .unwrap_or_else(|| panic!("{ctx}: defining class is not loaded"));
        defining
            .super_class
            .clone()
            .unwrap_or_else(|| panic!("{ctx}: super dispatch without a superclass"))
    }

    /// The declared class of a native data slot.
    fn slot_class(&self, instance: &InstanceRef, idx: usize, ctx: &str) -> Arc<ScriptClass> {
        let class = instance.class();
        let decl = class
            .data_decl(idx)
            .unwrap_or_else(|| panic!("{ctx}: no data slot {idx} on {}", class.name));
        let name = decl
            .ty
            .native_name()
            .unwrap_or_else(|| panic!("{ctx}: data slot {idx} is not native"));
        self.class_area
            .search(name)
            .unwrap_or_else(|| panic!("{ctx}: unknown class {name}"))
    }
}

fn data_word(code: &ByteCode, pc: usize, ctx: &str) -> Word {
    *code
        .words
        .get(pc)
        .unwrap_or_else(|| panic!("{ctx}: missing data word at pc {pc}"))
}

fn pop(stack: &mut Vec<Value>, ctx: &str, pc: usize) -> Value {
    stack
        .pop()
        .unwrap_or_else(|| panic!("{ctx}: stack underflow at pc {pc}"))
}

/// The last `num` pushed values, in argument order.
fn split_args(stack: &mut Vec<Value>, num: usize, ctx: &str) -> Vec<Value> {
    assert!(
        stack.len() >= num,
        "{ctx}: stack underflow sampling {num} arguments"
    );
    stack.split_off(stack.len() - num)
}

/// Tag equality between a slot's current occupant and an incoming value,
/// plus the subtype check for natives. The incoming class is the
/// expression's declared one.
fn check_store(current: &Value, incoming: &Value, ctx: &str) {
    assert_eq!(
        current.type_name(),
        incoming.type_name(),
        "{ctx}: stored {} into a {} slot",
        incoming.type_name(),
        current.type_name()
    );
    if let (Value::Native { class: declared, .. }, Value::Native { class: stored, .. }) =
        (current, incoming)
    {
        assert!(
            stored.is_a(declared),
            "{ctx}: stored {} into a {} slot",
            stored.name,
            declared.name
        );
    }
}

const fn fetch_tag(op: Opcode) -> &'static str {
    match op {
        Opcode::FetchLF | Opcode::FetchPF => "float",
        Opcode::FetchLI | Opcode::FetchPI => "int",
        Opcode::FetchLB | Opcode::FetchPB => "bool",
        _ => "native",
    }
}

/// Typed arithmetic with the promotion each opcode name implies. Integer
/// division and modulo by zero panic.
fn binary_arith(op: Opcode, lhs: &Value, rhs: &Value) -> Value {
    match op {
        Opcode::DivII => Value::Int(lhs.int() / rhs.int()),
        Opcode::DivFF => Value::Float(lhs.float() / rhs.float()),
        Opcode::DivFI => Value::Float(lhs.float() / rhs.int() as f32),
        Opcode::DivIF => Value::Float(lhs.int() as f32 / rhs.float()),
        Opcode::MulII => Value::Int(lhs.int().wrapping_mul(rhs.int())),
        Opcode::MulFF => Value::Float(lhs.float() * rhs.float()),
        Opcode::MulFI => Value::Float(lhs.float() * rhs.int() as f32),
        Opcode::MulIF => Value::Float(lhs.int() as f32 * rhs.float()),
        Opcode::SubII => Value::Int(lhs.int().wrapping_sub(rhs.int())),
        Opcode::SubFF => Value::Float(lhs.float() - rhs.float()),
        Opcode::SubFI => Value::Float(lhs.float() - rhs.int() as f32),
        Opcode::SubIF => Value::Float(lhs.int() as f32 - rhs.float()),
        Opcode::AddII => Value::Int(lhs.int().wrapping_add(rhs.int())),
        Opcode::AddFF => Value::Float(lhs.float() + rhs.float()),
        Opcode::AddFI => Value::Float(lhs.float() + rhs.int() as f32),
        Opcode::AddIF => Value::Float(lhs.int() as f32 + rhs.float()),
        Opcode::Mod => Value::Int(lhs.int() % rhs.int()),
        _ => unreachable!("not an arithmetic opcode"),
    }
}

#[allow(clippy::float_cmp)]
fn compare(op: Opcode, lhs: &Value, rhs: &Value) -> bool {
    match op {
        Opcode::EqII => lhs.int() == rhs.int(),
        Opcode::EqFF => lhs.float() == rhs.float(),
        Opcode::EqFI => lhs.float() == rhs.int() as f32,
        Opcode::EqIF => lhs.int() as f32 == rhs.float(),
        Opcode::EqBB => lhs.bool() == rhs.bool(),
        Opcode::LtEqII => lhs.int() <= rhs.int(),
        Opcode::LtEqFF => lhs.float() <= rhs.float(),
        Opcode::LtEqFI => lhs.float() <= rhs.int() as f32,
        Opcode::LtEqIF => (lhs.int() as f32) <= rhs.float(),
        Opcode::LtII => lhs.int() < rhs.int(),
        Opcode::LtFF => lhs.float() < rhs.float(),
        Opcode::LtFI => lhs.float() < rhs.int() as f32,
        Opcode::LtIF => (lhs.int() as f32) < rhs.float(),
        Opcode::GtEqII => lhs.int() >= rhs.int(),
        Opcode::GtEqFF => lhs.float() >= rhs.float(),
        Opcode::GtEqFI => lhs.float() >= rhs.int() as f32,
        Opcode::GtEqIF => lhs.int() as f32 >= rhs.float(),
        Opcode::GtII => lhs.int() > rhs.int(),
        Opcode::GtFF => lhs.float() > rhs.float(),
        Opcode::GtFI => lhs.float() > rhs.int() as f32,
        Opcode::GtIF => lhs.int() as f32 > rhs.float(),
        _ => unreachable!("not a comparison opcode"),
    }
}
