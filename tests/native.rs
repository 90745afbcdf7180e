//! Host-facing tests: native classes whose factories, constructors, and
//! methods are supplied by the embedding runtime.

use std::sync::Arc;

use dscript::class::{ScriptClass, ScriptFactory};
use dscript::compiler::{Compiler, MemoryLoader};
use dscript::data::{ClassArea, NativeRegistry, SharedClassArea};
use dscript::vm::{Instance, InstanceRef, Slot, Value, Vm};

/// Plain allocator: script-visible slots plus a host-side counter.
struct CounterFactory;

impl ScriptFactory for CounterFactory {
    fn create_instance(&self, class: &Arc<ScriptClass>) -> InstanceRef {
        let instance = Instance::new(class.clone());
        instance.init_native_data(Box::new(0i32));
        instance
    }

    fn name(&self) -> &str {
        "counter"
    }
}

fn compile(sources: &[(&str, &str)]) -> SharedClassArea {
    let mut loader = MemoryLoader::new();
    for (name, text) in sources {
        loader.add(name, text);
    }
    Compiler::new(Box::new(loader))
        .build(sources[0].0)
        .expect("sources should compile")
}

#[test]
fn native_constructor_chain_initializes_both_classes() {
    let sources = [
        (
            "B",
            "import A;\nclass B extends A { int y_; B(int y) { super(y); y_ = y; } };",
        ),
        ("A", "native class A { A(int x); int x_; };"),
    ];
    let area = compile(&sources);

    let mut registry = NativeRegistry::new();
    registry.register_factory("A", Arc::new(CounterFactory));
    registry.register_constructor(
        "A",
        0,
        Arc::new(|instance: &InstanceRef, args: &[Value]| {
            let slot = instance
                .class()
                .data_index("x_")
                .expect("A declares x_");
            instance.set_slot(slot, Slot::Int(args[0].int()));
            Value::Bool(false)
        }),
    );
    registry.install(&area).expect("registrations match the build");

    let b = area.search("B").expect("B is loaded");
    let vm = Vm::new(area);
    let instance = vm.new_instance(&b, 0, vec![Value::Int(7)]);

    let x_slot = b.data_index("x_").expect("x_ is inherited");
    let y_slot = b.data_index("y_").expect("y_ is own");
    assert!(matches!(instance.get_slot(x_slot), Slot::Int(7)));
    assert!(matches!(instance.get_slot(y_slot), Slot::Int(7)));
}

#[test]
fn native_methods_share_host_state() {
    let sources = [
        (
            "P",
            "import Counter;\nclass P { int f() { Counter c; c = new Counter(); \
             c.bump(); c.bump(); return c.bump(); } };",
        ),
        ("Counter", "native class Counter { Counter(); int bump(); };"),
    ];
    let area = compile(&sources);

    let mut registry = NativeRegistry::new();
    registry.register_factory("Counter", Arc::new(CounterFactory));
    registry.register_constructor(
        "Counter",
        0,
        Arc::new(|_: &InstanceRef, _: &[Value]| Value::Bool(false)),
    );
    let counter = area.search("Counter").expect("Counter is loaded");
    let bump = counter.vtable_index("bump").expect("bump is declared");
    registry.register_function(
        "Counter",
        bump,
        Arc::new(|instance: &InstanceRef, _: &[Value]| {
            let next = instance
                .with_native_data(|count: &mut i32| {
                    *count += 1;
                    *count
                })
                .expect("factory attached the counter");
            Value::Int(next)
        }),
    );
    registry.install(&area).expect("registrations match the build");

    let entry = area.search("P").expect("P is loaded");
    let vm = Vm::new(area);
    let instance = entry.create_instance();
    let f = entry.vtable_index("f").expect("f is declared");
    assert_eq!(vm.call_function(&instance, f, Vec::new()).int(), 3);
}

#[test]
fn cleared_handle_reads_as_null() {
    let sources = [
        (
            "P",
            "import C;\nclass P { C c; void set(C v) { c = v; } int probe() { return c.get(); } };",
        ),
        ("C", "class C { C() { } int get() { return 9; } };"),
    ];
    let area = compile(&sources);

    let p = area.search("P").expect("P is loaded");
    let c = area.search("C").expect("C is loaded");
    let vm = Vm::new(area.clone());

    let target = vm.new_instance(&c, 0, Vec::new());
    let handle = target.handle();
    let instance = p.create_instance();
    let set = p.vtable_index("set").expect("set is declared");
    let probe = p.vtable_index("probe").expect("probe is declared");

    vm.call_function(
        &instance,
        set,
        vec![Value::Native {
            class: c.clone(),
            handle: handle.clone(),
        }],
    );
    assert_eq!(vm.call_function(&instance, probe, Vec::new()).int(), 9);

    // detaching the target turns the stored reference into a null one
    handle.clear();
    assert_eq!(vm.call_function(&instance, probe, Vec::new()).int(), 0);
}

#[test]
fn scripted_methods_on_native_classes_run_from_bytecode() {
    let sources = [(
        "M",
        "native class M { M(); int base(); int doubled() { return base() * 2; } };",
    )];
    let area = compile(&sources);

    let mut registry = NativeRegistry::new();
    registry.register_factory("M", Arc::new(CounterFactory));
    registry.register_constructor(
        "M",
        0,
        Arc::new(|_: &InstanceRef, _: &[Value]| Value::Bool(false)),
    );
    let m = area.search("M").expect("M is loaded");
    let base = m.vtable_index("base").expect("base is declared");
    registry.register_function(
        "M",
        base,
        Arc::new(|_: &InstanceRef, _: &[Value]| Value::Int(21)),
    );
    registry.install(&area).expect("registrations match the build");

    let vm = Vm::new(area);
    let instance = vm.new_instance(&m, 0, Vec::new());
    let doubled = m.vtable_index("doubled").expect("doubled is declared");
    assert_eq!(vm.call_function(&instance, doubled, Vec::new()).int(), 42);
}
