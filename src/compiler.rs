//! The compiler driver: source loading, the two declaration passes, and
//! function emission, ending in a linked class area the VM can execute.

pub mod codegen;
pub mod declaration;

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use itertools::Itertools;

use crate::ast::ScriptSrc;
use crate::class::{Code, DataType, FunctionImpl, ScriptClass};
use crate::data::{SharedClassArea, WorkingClassArea};
use crate::error::{CompileError, Result};
use crate::parser::Parser;

use codegen::FunctionEmitter;
use declaration::{ClassDecl, Declarations};

/// Maps a dotted class name to its source text.
pub trait SourceLoader {
    /// # Errors
    /// `FileNotFound` or `AmbiguousSource` when the name cannot be
    /// resolved to exactly one source.
    fn load(&self, class_name: &str) -> Result<String>;
}

/// Loads `.ds` files from an ordered list of root directories; the
/// dotted class name maps onto the relative path. A class present under
/// more than one root is refused.
pub struct FileLoader {
    roots: Vec<PathBuf>,
}

impl FileLoader {
    #[must_use]
    pub const fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl SourceLoader for FileLoader {
    fn load(&self, class_name: &str) -> Result<String> {
        let mut relative: PathBuf = class_name.split('.').collect();
        relative.set_extension("ds");

        let found = self
            .roots
            .iter()
            .map(|root| root.join(&relative))
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        match found.as_slice() {
            [] => Err(CompileError::FileNotFound {
                class: class_name.to_string(),
            }),
            [path] => fs::read_to_string(path).map_err(|_| CompileError::FileNotFound {
                class: class_name.to_string(),
            }),
            _ => Err(CompileError::AmbiguousSource {
                class: class_name.to_string(),
            }),
        }
    }
}

/// In-memory name-to-source map; tests compose a fresh one per run.
#[derive(Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, class_name: &str, source: &str) -> &mut Self {
        self.sources
            .insert(class_name.to_string(), source.to_string());
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, class_name: &str) -> Result<String> {
        self.sources
            .get(class_name)
            .cloned()
            .ok_or_else(|| CompileError::FileNotFound {
                class: class_name.to_string(),
            })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CompilePass {
    Undefined,
    LoadSources,
    Declarations1,
    Declarations2,
    Emit,
}

/// One build's worth of compiler state. A `build` call resets it, runs
/// every pass, and either returns the linked class area or the first
/// error.
pub struct Compiler {
    loader: Box<dyn SourceLoader>,
    sources: Vec<ScriptSrc>,
    decls: Declarations,
    pass: CompilePass,
    error: Option<CompileError>,
}

struct ClassImpls {
    functions: Vec<Arc<FunctionImpl>>,
    constructors: Vec<Arc<FunctionImpl>>,
}

impl Compiler {
    #[must_use]
    pub fn new(loader: Box<dyn SourceLoader>) -> Self {
        Self {
            loader,
            sources: Vec::new(),
            decls: Declarations::default(),
            pass: CompilePass::Undefined,
            error: None,
        }
    }

    /// The most recent build failure, kept for embedders that report
    /// diagnostics out of band.
    #[must_use]
    pub const fn error(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }

    /// Declaration lookup for embedders; only meaningful once the
    /// declarations exist.
    #[must_use]
    pub fn class_decl(&self, name: &str) -> Option<&ClassDecl> {
        debug_assert!(
            matches!(self.pass, CompilePass::Declarations2 | CompilePass::Emit),
            "declaration lookups are only valid during validation and emission"
        );
        self.decls.find(name)
    }

    /// Compile the named class and everything it imports, transitively.
    ///
    /// # Errors
    /// The first [`CompileError`] encountered; no partial artifact is
    /// kept.
    pub fn build(&mut self, class_name: &str) -> Result<SharedClassArea> {
        self.clear();
        match self.build_inner(class_name) {
            Ok(area) => Ok(area),
            Err(error) => {
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    fn clear(&mut self) {
        self.sources.clear();
        self.decls.clear();
        self.pass = CompilePass::Undefined;
        self.error = None;
    }

    fn build_inner(&mut self, class_name: &str) -> Result<SharedClassArea> {
        self.load_all(class_name)?;

        self.pass = CompilePass::Declarations1;
        for source in &self.sources {
            self.decls.push(ClassDecl::from_source(source));
        }

        self.pass = CompilePass::Declarations2;
        for idx in 0..self.decls.len() {
            self.check_super(idx)?;
            self.check_data(idx)?;
            self.check_constructors(idx)?;
            self.check_functions(idx)?;
        }

        self.pass = CompilePass::Emit;
        let impls = self.emit_all()?;
        self.link(impls)
    }

    /// Load the named source and, recursively, everything it imports.
    fn load_all(&mut self, class_name: &str) -> Result<()> {
        self.pass = CompilePass::LoadSources;

        if self.sources.iter().any(|source| source.name == class_name) {
            return Ok(());
        }

        let text = self.loader.load(class_name)?;
        let script = Parser::parse(&text)?;
        if script.name != class_name {
            return Err(CompileError::Parse {
                class: class_name.to_string(),
                line: script.line,
                message: format!(
                    "Trying to load class {class_name}, but the file contains class {}.",
                    script.name
                ),
            });
        }

        let imports = script.imports.clone();
        self.sources.push(script);
        for import in imports {
            self.load_all(&import)?;
        }
        Ok(())
    }

    /// The superclass must be loaded, and the chain must not loop back
    /// on itself.
    fn check_super(&self, idx: usize) -> Result<()> {
        let decl = self.decls.at(idx);
        let Some(super_name) = decl.super_name.as_deref() else {
            return Ok(());
        };
        if self.decls.find(super_name).is_none() {
            return Err(CompileError::UnknownType {
                class: decl.name.to_string(),
                line: decl.line,
                type_name: super_name.to_string(),
            });
        }

        let mut current = super_name;
        for _ in 0..self.decls.len() {
            match self
                .decls
                .find(current)
                .and_then(|other| other.super_name.as_deref())
            {
                Some(next) if next == &*decl.name => {
                    return Err(CompileError::Internal(format!(
                        "cyclic inheritance involving class {}",
                        decl.name
                    )));
                }
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(())
    }

    fn check_data(&self, idx: usize) -> Result<()> {
        let decl = self.decls.at(idx);
        for (first, second) in decl.data.iter().tuple_combinations() {
            if first.name == second.name {
                return Err(CompileError::DuplicateMember {
                    class: decl.name.to_string(),
                    line: first.line,
                    member: first.name.to_string(),
                });
            }
        }
        for data in &decl.data {
            self.check_type_resolves(decl, &data.ty, data.line)?;
        }
        Ok(())
    }

    fn check_constructors(&self, idx: usize) -> Result<()> {
        let decl = self.decls.at(idx);
        for ctor in &decl.constructors {
            for param in &ctor.params {
                self.check_type_resolves(decl, &param.ty, param.line)?;
            }
        }

        // two constructors are ambiguous when every parameter pair is
        // either the same primitive or subtype-related native classes
        for (first, second) in decl.constructors.iter().tuple_combinations() {
            if first.params.len() != second.params.len() {
                continue;
            }
            let same = first
                .params
                .iter()
                .zip(&second.params)
                .all(|(p1, p2)| match (&p1.ty, &p2.ty) {
                    (DataType::Native(n1), DataType::Native(n2)) => {
                        n1 == n2 || self.decls.is_a(n1, n2) || self.decls.is_a(n2, n1)
                    }
                    (t1, t2) => t1 == t2,
                });
            if same {
                return Err(CompileError::AmbiguousConstructor {
                    class: decl.name.to_string(),
                    line: second.line,
                });
            }
        }
        Ok(())
    }

    fn check_functions(&mut self, idx: usize) -> Result<()> {
        let removals = {
            let decl = self.decls.at(idx);
            for (first, second) in decl.functions.iter().tuple_combinations() {
                if first.name == second.name {
                    return Err(CompileError::DuplicateMember {
                        class: decl.name.to_string(),
                        line: second.line,
                        member: second.name.to_string(),
                    });
                }
            }

            // an own method whose name matches an inherited slot must
            // match it exactly, and then replaces it
            let num_inherited = self.decls.num_functions(decl) - decl.functions.len();
            let mut removals = Vec::new();
            for (own_idx, own) in decl.functions.iter().enumerate() {
                for inherited_idx in 0..num_inherited {
                    let Some(inherited) = self.decls.function_decl(decl, inherited_idx) else {
                        continue;
                    };
                    if own.name != inherited.name {
                        continue;
                    }
                    let matches = own.return_type == inherited.return_type
                        && own.params.len() == inherited.params.len()
                        && own
                            .params
                            .iter()
                            .zip(&inherited.params)
                            .all(|(p1, p2)| p1.ty == p2.ty);
                    if !matches {
                        return Err(CompileError::OverrideMismatch {
                            class: decl.name.to_string(),
                            line: own.line,
                            function: own.name.to_string(),
                        });
                    }
                    removals.push(own_idx);
                }
            }
            removals
        };
        self.decls.remove_functions(idx, &removals);

        let decl = self.decls.at(idx);
        for fn_idx in 0..self.decls.num_functions(decl) {
            let Some(function) = self.decls.function_decl(decl, fn_idx) else {
                continue;
            };
            if function.return_type != DataType::Void {
                self.check_type_resolves(decl, &function.return_type, function.line)?;
            }
            for param in &function.params {
                self.check_type_resolves(decl, &param.ty, param.line)?;
            }
        }
        Ok(())
    }

    fn check_type_resolves(&self, decl: &ClassDecl, ty: &DataType, line: u32) -> Result<()> {
        match ty {
            DataType::Native(name) if self.decls.find(name).is_none() => {
                Err(CompileError::UnknownType {
                    class: decl.name.to_string(),
                    line,
                    type_name: name.to_string(),
                })
            }
            DataType::Void => Err(CompileError::UnknownType {
                class: decl.name.to_string(),
                line,
                type_name: "void".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Pass 3: compile every scripted function and constructor of every
    /// loaded class.
    fn emit_all(&self) -> Result<HashMap<Arc<str>, ClassImpls>> {
        let mut impls = HashMap::new();
        for source in &self.sources {
            let class = self
                .decls
                .find(&source.name)
                .ok_or_else(|| CompileError::Internal(format!("no declaration for {}", source.name)))?;

            let mut functions = Vec::with_capacity(source.functions.len());
            for function_src in &source.functions {
                let fn_idx = self
                    .decls
                    .function_index(class, &function_src.name)
                    .ok_or_else(|| {
                        CompileError::Internal(format!("no declaration for {}", function_src.name))
                    })?;
                let decl = self
                    .decls
                    .function_decl(class, fn_idx)
                    .ok_or_else(|| CompileError::Internal("function index out of range".into()))?;
                let code = if function_src.native {
                    Code::Native(OnceLock::new())
                } else {
                    let emitter = FunctionEmitter::new(&self.decls, class, decl);
                    Code::Bytecode(emitter.emit(function_src)?)
                };
                functions.push(Arc::new(FunctionImpl {
                    definition: decl.definition(),
                    class_name: class.name.clone(),
                    code,
                }));
            }

            let mut constructors = Vec::with_capacity(source.constructors.len());
            for (ctor_idx, ctor_src) in source.constructors.iter().enumerate() {
                let decl = &class.constructors[ctor_idx];
                let code = if ctor_src.native {
                    Code::Native(OnceLock::new())
                } else {
                    let emitter = FunctionEmitter::new(&self.decls, class, decl);
                    Code::Bytecode(emitter.emit(ctor_src)?)
                };
                constructors.push(Arc::new(FunctionImpl {
                    definition: decl.definition(),
                    class_name: class.name.clone(),
                    code,
                }));
            }

            impls.insert(
                class.name.clone(),
                ClassImpls {
                    functions,
                    constructors,
                },
            );
        }
        Ok(impls)
    }

    /// Link declarations and emitted implementations into `ScriptClass`
    /// artifacts, supers first so that every vtable starts from its
    /// superclass's.
    fn link(&self, mut impls: HashMap<Arc<str>, ClassImpls>) -> Result<SharedClassArea> {
        let mut linked: HashMap<Arc<str>, Arc<ScriptClass>> = HashMap::new();
        let mut area = WorkingClassArea::new();

        while linked.len() < self.decls.len() {
            let mut progressed = false;
            for decl in self.decls.iter() {
                if linked.contains_key(&decl.name) {
                    continue;
                }
                let super_class = match decl.super_name.as_deref() {
                    Some(name) => match linked.get(name) {
                        Some(class) => Some(class.clone()),
                        None => continue,
                    },
                    None => None,
                };

                let ClassImpls {
                    functions,
                    constructors,
                } = impls
                    .remove(&decl.name)
                    .ok_or_else(|| CompileError::Internal(format!("no implementations for {}", decl.name)))?;

                // inherited slots first; an own method with an inherited
                // name replaces the slot, the rest are appended
                let mut vtable: Vec<Arc<FunctionImpl>> = super_class
                    .as_ref()
                    .map(|super_class| {
                        (0..super_class.num_functions())
                            .filter_map(|i| super_class.function(i).cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                for function in functions {
                    let name = &function.definition.name;
                    if let Some(slot) = vtable
                        .iter()
                        .position(|entry| entry.definition.name == *name)
                    {
                        vtable[slot] = function;
                    } else {
                        vtable.push(function);
                    }
                }

                let class = Arc::new(ScriptClass::new(
                    decl.name.clone(),
                    decl.native,
                    super_class,
                    decl.data.clone(),
                    vtable,
                    constructors,
                ));
                linked.insert(decl.name.clone(), class.clone());
                area.push(class);
                progressed = true;
            }
            if !progressed {
                return Err(CompileError::Internal(
                    "cyclic inheritance between loaded classes".into(),
                ));
            }
        }

        Ok(area.to_shared())
    }
}
