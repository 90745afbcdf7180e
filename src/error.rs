use thiserror::Error;

/// A compile-time failure. The first error aborts the build; no partial
/// artifact is kept.
///
/// Every variant renders to the one-line diagnostic the embedder prints,
/// carrying the class name and source line where one exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Could not find a source file for class {class}.")]
    FileNotFound { class: String },
    #[error("Class {class} was found under more than one script root.")]
    AmbiguousSource { class: String },
    #[error("{message}  Class {class}, line {line}.")]
    Parse {
        class: String,
        line: u32,
        message: String,
    },
    #[error("Member \"{member}\" is a duplicate.  Class {class}, line {line}.")]
    DuplicateMember {
        class: String,
        line: u32,
        member: String,
    },
    #[error("Unknown type \"{type_name}\".  Class {class}, line {line}.")]
    UnknownType {
        class: String,
        line: u32,
        type_name: String,
    },
    #[error("Signature of overriding function \"{function}\" does not match.  Class {class}, line {line}.")]
    OverrideMismatch {
        class: String,
        line: u32,
        function: String,
    },
    #[error("Class has a duplicate or ambiguous constructor.  Class {class}, line {line}.")]
    AmbiguousConstructor { class: String, line: u32 },
    #[error("Expecting type {expected}, but expression evaluates to {found}.  Class {class}, line {line}.")]
    TypeMismatch {
        class: String,
        line: u32,
        expected: String,
        found: String,
    },
    #[error("Unknown function \"{function}\" called.  Class {class}, line {line}.")]
    UnknownFunction {
        class: String,
        line: u32,
        function: String,
    },
    #[error("Could not find variable {variable}.  Class {class}, line {line}.")]
    UnknownVariable {
        class: String,
        line: u32,
        variable: String,
    },
    #[error("Number of arguments for function \"{function}\" does not match.  Class {class}, line {line}.")]
    ArityMismatch {
        class: String,
        line: u32,
        function: String,
    },
    #[error("Operator \"{operator}\" cannot be applied to {operands}.  Class {class}, line {line}.")]
    BadOperandTypes {
        class: String,
        line: u32,
        operator: String,
        operands: String,
    },
    #[error("Function \"{function}\" must return a value.  Class {class}, line {line}.")]
    MissingReturn {
        class: String,
        line: u32,
        function: String,
    },
    #[error("Super's constructor has to be the first statement in the constructor.  Class {class}, line {line}.")]
    MissingSuperCall { class: String, line: u32 },
    #[error("Internal compiler error: {0}.")]
    Internal(String),
}

pub type Result<T> = core::result::Result<T, CompileError>;
