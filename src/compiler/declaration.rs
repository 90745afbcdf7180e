//! Per-class declarations, materialized from the AST in pass 1 and
//! validated across classes in pass 2.

use std::sync::Arc;

use crate::ast::{DataSrc, FunctionSrc, ParamSrc, ScriptSrc};
use crate::class::{DataDecl, DataType, FunctionDefinition};

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Arc<str>,
    pub return_type: DataType,
    pub params: Vec<DataDecl>,
    pub line: u32,
}

impl FunctionDecl {
    #[must_use]
    pub fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.name.clone(),
            return_type: self.return_type.clone(),
            params: self.params.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ClassDecl {
    pub name: Arc<str>,
    pub super_name: Option<Arc<str>>,
    pub native: bool,
    pub line: u32,
    pub comments: Vec<String>,
    /// own data members only
    pub data: Vec<DataDecl>,
    /// own methods only; pass 2 removes the overriding ones so that
    /// lookup resolves them through the inherited slot
    pub functions: Vec<FunctionDecl>,
    pub constructors: Vec<FunctionDecl>,
}

fn data_decl(source: &DataSrc) -> DataDecl {
    DataDecl {
        name: source.name.as_str().into(),
        ty: DataType::for_name(&source.type_name),
        line: source.line,
    }
}

fn param_decl(source: &ParamSrc) -> DataDecl {
    DataDecl {
        name: source.name.as_str().into(),
        ty: DataType::for_name(&source.type_name),
        line: source.line,
    }
}

pub(crate) fn local_decl(source: &DataSrc) -> DataDecl {
    data_decl(source)
}

fn function_decl(source: &FunctionSrc) -> FunctionDecl {
    FunctionDecl {
        name: source.name.as_str().into(),
        return_type: DataType::for_name(&source.return_type),
        params: source.params.iter().map(param_decl).collect(),
        line: source.line,
    }
}

impl ClassDecl {
    /// Pass 1: lift one parsed source into its declaration.
    #[must_use]
    pub fn from_source(source: &ScriptSrc) -> Self {
        Self {
            name: source.name.as_str().into(),
            super_name: if source.super_name.is_empty() {
                None
            } else {
                Some(source.super_name.as_str().into())
            },
            native: source.native,
            line: source.line,
            comments: source.comments.clone(),
            data: source.data.iter().map(data_decl).collect(),
            functions: source.functions.iter().map(function_decl).collect(),
            constructors: source.constructors.iter().map(function_decl).collect(),
        }
    }
}

/// Every loaded class declaration, with the cross-class lookups the
/// resolver and the code generator share.
#[derive(Debug, Default)]
pub struct Declarations {
    list: Vec<ClassDecl>,
}

impl Declarations {
    pub fn push(&mut self, decl: ClassDecl) {
        self.list.push(decl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassDecl> {
        self.list.iter()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ClassDecl> {
        self.list.iter().find(|decl| &*decl.name == name)
    }

    #[must_use]
    pub fn at(&self, idx: usize) -> &ClassDecl {
        &self.list[idx]
    }

    /// Drop the own function declarations at the given positions; used
    /// after override validation so the overriding methods resolve
    /// through the inherited slot.
    pub fn remove_functions(&mut self, idx: usize, removals: &[usize]) {
        let mut removals = removals.to_vec();
        removals.sort_unstable();
        removals.dedup();
        for removal in removals.into_iter().rev() {
            self.list[idx].functions.remove(removal);
        }
    }

    /// Single-inheritance subtype test over declarations. Unknown names
    /// never match; the chain walk is bounded so a cyclic `extends` does
    /// not spin.
    #[must_use]
    pub fn is_a(&self, derived: &str, base: &str) -> bool {
        let mut current = derived;
        for _ in 0..=self.list.len() {
            if current == base {
                return true;
            }
            match self.find(current).and_then(|decl| decl.super_name.as_deref()) {
                Some(super_name) => current = super_name,
                None => return false,
            }
        }
        false
    }

    /// Effective method count: the super chain's plus the own
    /// (non-overriding) declarations.
    #[must_use]
    pub fn num_functions(&self, class: &ClassDecl) -> usize {
        let inherited = class
            .super_name
            .as_deref()
            .and_then(|name| self.find(name))
            .map_or(0, |super_decl| self.num_functions(super_decl));
        inherited + class.functions.len()
    }

    /// Vtable index of a named method: own declarations sit after the
    /// inherited prefix, and an overriding method (removed from the own
    /// list in pass 2) resolves to its inherited slot.
    #[must_use]
    pub fn function_index(&self, class: &ClassDecl, name: &str) -> Option<usize> {
        let super_decl = class.super_name.as_deref().and_then(|s| self.find(s));
        let num_inherited = super_decl.map_or(0, |decl| self.num_functions(decl));
        if let Some(idx) = class.functions.iter().position(|f| &*f.name == name) {
            return Some(num_inherited + idx);
        }
        super_decl.and_then(|decl| self.function_index(decl, name))
    }

    #[must_use]
    pub fn function_decl<'a>(&'a self, class: &'a ClassDecl, idx: usize) -> Option<&'a FunctionDecl> {
        if let Some(super_decl) = class.super_name.as_deref().and_then(|s| self.find(s)) {
            let num_inherited = self.num_functions(super_decl);
            if idx < num_inherited {
                return self.function_decl(super_decl, idx);
            }
            return class.functions.get(idx - num_inherited);
        }
        class.functions.get(idx)
    }

    #[must_use]
    pub fn num_data(&self, class: &ClassDecl) -> usize {
        let inherited = class
            .super_name
            .as_deref()
            .and_then(|name| self.find(name))
            .map_or(0, |super_decl| self.num_data(super_decl));
        inherited + class.data.len()
    }

    #[must_use]
    pub fn data_decl<'a>(&'a self, class: &'a ClassDecl, idx: usize) -> Option<&'a DataDecl> {
        if let Some(super_decl) = class.super_name.as_deref().and_then(|s| self.find(s)) {
            let num_inherited = self.num_data(super_decl);
            if idx < num_inherited {
                return self.data_decl(super_decl, idx);
            }
            return class.data.get(idx - num_inherited);
        }
        class.data.get(idx)
    }

    /// Constructor slot whose parameter list matches the given argument
    /// types exactly (native classes by name).
    #[must_use]
    pub fn constructor_index(&self, class: &ClassDecl, args: &[DataType]) -> Option<usize> {
        class.constructors.iter().position(|ctor| {
            ctor.params.len() == args.len()
                && ctor
                    .params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| param.ty == *arg)
        })
    }
}
