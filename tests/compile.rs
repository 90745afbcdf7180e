//! Compiler-facing tests: bytecode shape, declaration validation, and
//! the diagnostics each kind of broken source produces.

use dscript::bytecode::{self, Opcode};
use dscript::class::ByteCode;
use dscript::compiler::{Compiler, MemoryLoader};
use dscript::data::{ClassArea, SharedClassArea};
use dscript::error::CompileError;

fn compile(sources: &[(&str, &str)]) -> SharedClassArea {
    Compiler::new(loader(sources))
        .build(sources[0].0)
        .expect("sources should compile")
}

fn compile_err(sources: &[(&str, &str)]) -> CompileError {
    Compiler::new(loader(sources))
        .build(sources[0].0)
        .expect_err("sources should not compile")
}

fn loader(sources: &[(&str, &str)]) -> Box<MemoryLoader> {
    let mut loader = MemoryLoader::new();
    for (name, text) in sources {
        loader.add(name, text);
    }
    Box::new(loader)
}

fn method_code(area: &SharedClassArea, class: &str, method: &str) -> ByteCodeView {
    let class = area.search(class).expect("class is loaded");
    let idx = class.vtable_index(method).expect("method exists");
    let function = class.function(idx).expect("vtable slot is filled");
    let code = function.code.as_bytecode().expect("method is scripted");
    ByteCodeView {
        ops: opcodes(code),
        max_stack: code.max_stack,
    }
}

struct ByteCodeView {
    ops: Vec<Opcode>,
    max_stack: usize,
}

fn opcodes(code: &ByteCode) -> Vec<Opcode> {
    let mut ops = Vec::new();
    let mut pc = 0;
    while pc < code.words.len() {
        let op = bytecode::opcode(code.words[pc]).expect("valid opcode");
        pc += if op.has_data_word() { 2 } else { 1 };
        ops.push(op);
    }
    ops
}

#[test]
fn arithmetic_selects_typed_opcodes() {
    let area = compile(&[("P", "class P { int f() { return 3 + 4 * 2; } };")]);
    let view = method_code(&area, "P", "f");
    assert_eq!(
        view.ops,
        vec![
            Opcode::PushI,
            Opcode::PushI,
            Opcode::PushI,
            Opcode::MulII,
            Opcode::AddII,
            Opcode::Ret
        ]
    );
    assert_eq!(view.max_stack, 3);
}

#[test]
fn loop_compiles_to_one_jz_and_one_jmp() {
    let area = compile(&[(
        "P",
        "class P { int sum(int n) { int i; int s; i = 0; s = 0; \
         while (i < n) { s = s + i; i = i + 1; } return s; } };",
    )]);
    let view = method_code(&area, "P", "sum");
    let jumps = view.ops.iter().filter(|op| **op == Opcode::Jmp).count();
    let exits = view.ops.iter().filter(|op| **op == Opcode::Jz).count();
    assert_eq!(jumps, 1);
    assert_eq!(exits, 1);
    assert!(!view.ops.contains(&Opcode::Invalid), "all jumps are patched");
}

#[test]
fn int_float_mixes_promote() {
    let area = compile(&[("P", "class P { float f() { return 3 / 2.0; } };")]);
    let view = method_code(&area, "P", "f");
    assert!(view.ops.contains(&Opcode::DivIF));
}

#[test]
fn inequality_is_equality_then_not() {
    let area = compile(&[("P", "class P { bool f(int a) { return a != 2; } };")]);
    let view = method_code(&area, "P", "f");
    assert_eq!(
        view.ops,
        vec![
            Opcode::FetchPI,
            Opcode::PushI,
            Opcode::EqII,
            Opcode::Not,
            Opcode::Ret
        ]
    );
}

#[test]
fn super_call_resolves_the_inherited_slot() {
    let area = compile(&[
        ("B", "import A;\nclass B extends A { int kind() { return super.kind() + 10; } };"),
        ("A", "class A { int kind() { return 1; } };"),
    ]);
    let view = method_code(&area, "B", "kind");
    assert!(view.ops.contains(&Opcode::CallfSuperG));
}

#[test]
fn derived_constructor_leads_with_the_base_call() {
    let area = compile(&[
        (
            "B",
            "import A;\nclass B extends A { int y_; B(int y) { super(y); y_ = y; } };",
        ),
        ("A", "class A { int x_; A(int x) { x_ = x; } };"),
    ]);
    let class = area.search("B").expect("B is loaded");
    let ctor = class.constructor(0).expect("B has a constructor");
    let code = ctor.code.as_bytecode().expect("scripted constructor");
    // the base call (argument, call, discarded dummy) runs before the body
    assert_eq!(
        opcodes(code),
        vec![
            Opcode::FetchPI,
            Opcode::CallcSelfSuper,
            Opcode::Pop,
            Opcode::FetchPI,
            Opcode::StoreSI,
            Opcode::PushB,
            Opcode::Ret
        ]
    );
}

#[test]
fn override_keeps_the_vtable_index() {
    let area = compile(&[
        (
            "B",
            "import A;\nclass B extends A { int extra() { return 0; } int kind() { return 2; } };",
        ),
        ("A", "class A { int first() { return 0; } int kind() { return 1; } };"),
    ]);
    let a = area.search("A").expect("A is loaded");
    let b = area.search("B").expect("B is loaded");
    assert_eq!(a.vtable_index("kind"), b.vtable_index("kind"));
    assert_eq!(a.vtable_index("first"), b.vtable_index("first"));
    // B's own method lands after the inherited ones
    assert_eq!(b.vtable_index("extra"), Some(2));
    assert_eq!(b.num_functions(), 3);
}

#[test]
fn rebuilding_yields_the_same_layout() {
    let sources = [
        (
            "B",
            "import A;\nclass B extends A { int extra() { return 0; } int kind() { return 2; } };",
        ),
        ("A", "class A { int kind() { return 1; } };"),
    ];
    let first = compile(&sources);
    let second = compile(&sources);

    let layout = |area: &SharedClassArea| {
        let class = area.search("B").expect("B is loaded");
        (0..class.num_functions())
            .map(|i| {
                let function = class.function(i).expect("slot");
                (
                    function.definition.name.to_string(),
                    function.class_name.to_string(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(layout(&first), layout(&second));

    let disassembly = |area: &SharedClassArea| {
        let class = area.search("B").expect("B is loaded");
        let idx = class.vtable_index("kind").expect("kind exists");
        let code = class
            .function(idx)
            .expect("slot")
            .code
            .as_bytecode()
            .expect("scripted");
        bytecode::disassemble(&code.words)
    };
    assert_eq!(disassembly(&first), disassembly(&second));
}

#[test]
fn duplicate_constructors_are_ambiguous() {
    let err = compile_err(&[(
        "C",
        "class C {\nC(int a) { }\nC(int b) { }\n};",
    )]);
    let CompileError::AmbiguousConstructor { class, line } = err else {
        panic!("expected AmbiguousConstructor, found {err:?}");
    };
    assert_eq!(class, "C");
    assert_eq!(line, 3, "cites the second constructor");
}

#[test]
fn subtype_related_constructors_are_ambiguous() {
    let err = compile_err(&[
        (
            "C",
            "import A;\nimport B;\nclass C {\nC(A a) { }\nC(B b) { }\n};",
        ),
        ("A", "class A { };"),
        ("B", "import A;\nclass B extends A { };"),
    ]);
    assert!(matches!(err, CompileError::AmbiguousConstructor { .. }));
}

#[test]
fn duplicate_field_is_refused() {
    let err = compile_err(&[("C", "class C { int x; float x; };")]);
    assert!(matches!(err, CompileError::DuplicateMember { member, .. } if member == "x"));
}

#[test]
fn duplicate_method_is_refused() {
    let err = compile_err(&[(
        "C",
        "class C { int f() { return 1; } int f() { return 2; } };",
    )]);
    assert!(matches!(err, CompileError::DuplicateMember { member, .. } if member == "f"));
}

#[test]
fn override_with_different_signature_is_refused() {
    let err = compile_err(&[
        (
            "B",
            "import A;\nclass B extends A { float kind() { return 2.0; } };",
        ),
        ("A", "class A { int kind() { return 1; } };"),
    ]);
    assert!(matches!(err, CompileError::OverrideMismatch { function, .. } if function == "kind"));
}

#[test]
fn unknown_field_type_is_refused() {
    let err = compile_err(&[("C", "class C { Widget w; };")]);
    assert!(matches!(err, CompileError::UnknownType { type_name, .. } if type_name == "Widget"));
}

#[test]
fn unknown_variable_is_refused() {
    let err = compile_err(&[("C", "class C { int f() { return missing; } };")]);
    assert!(
        matches!(err, CompileError::UnknownVariable { variable, .. } if variable == "missing")
    );
}

#[test]
fn unknown_function_is_refused() {
    let err = compile_err(&[("C", "class C { int f() { return g(); } };")]);
    assert!(matches!(err, CompileError::UnknownFunction { function, .. } if function == "g"));
}

#[test]
fn arity_mismatch_is_refused() {
    let err = compile_err(&[(
        "C",
        "class C { int g(int a) { return a; } int f() { return g(); } };",
    )]);
    assert!(matches!(err, CompileError::ArityMismatch { function, .. } if function == "g"));
}

#[test]
fn bool_plus_int_is_refused() {
    let err = compile_err(&[("C", "class C { int f() { return true + 1; } };")]);
    assert!(matches!(err, CompileError::BadOperandTypes { .. }));
}

#[test]
fn modulo_requires_ints() {
    let err = compile_err(&[("C", "class C { float f() { return 1.0 % 2.0; } };")]);
    assert!(matches!(err, CompileError::BadOperandTypes { .. }));
}

#[test]
fn return_type_mismatch_is_refused() {
    let err = compile_err(&[("C", "class C { int f() { return 1.5; } };")]);
    assert!(matches!(
        err,
        CompileError::TypeMismatch { expected, found, .. } if expected == "int" && found == "float"
    ));
}

#[test]
fn missing_return_is_refused() {
    let err = compile_err(&[("C", "class C { int f() { int x; x = 1; } };")]);
    assert!(matches!(err, CompileError::MissingReturn { function, .. } if function == "f"));
}

#[test]
fn void_function_may_fall_off_the_end() {
    let area = compile(&[("C", "class C { void f() { } };")]);
    let view = method_code(&area, "C", "f");
    assert_eq!(view.ops, vec![Opcode::PushB, Opcode::Ret]);
}

#[test]
fn derived_constructor_without_super_call_is_refused() {
    // an empty body never parses a base call; codegen reports it
    let err = compile_err(&[
        ("B", "import A;\nclass B extends A { B(int y) { } };"),
        ("A", "class A { A(int x) { } };"),
    ]);
    assert!(matches!(err, CompileError::MissingSuperCall { .. }));
}

#[test]
fn missing_import_is_file_not_found() {
    let err = compile_err(&[("C", "import Absent;\nclass C { };")]);
    assert!(matches!(err, CompileError::FileNotFound { class } if class == "Absent"));
}

#[test]
fn file_with_wrong_class_name_is_refused() {
    let err = compile_err(&[("C", "class D { };")]);
    assert!(matches!(err, CompileError::Parse { .. }));
}

#[test]
fn compiler_keeps_the_most_recent_error() {
    let mut compiler = Compiler::new(loader(&[("C", "class C { int f() { return 1.5; } };")]));
    assert!(compiler.build("C").is_err());
    assert!(matches!(
        compiler.error(),
        Some(CompileError::TypeMismatch { .. })
    ));
}
