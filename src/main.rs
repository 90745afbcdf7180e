use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

use dscript::{
    compiler::{Compiler, FileLoader},
    data::{ClassArea, SharedClassArea},
    vm::Vm,
};

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a class and everything it imports
    Compile {
        /// dotted name of the entry class
        entry: String,
        /// script root directories, searched in order
        #[clap(short, long = "path")]
        paths: Vec<PathBuf>,
        /// dump the compiled classes and their bytecode
        #[clap(short, long)]
        verbose: bool,
    },
    /// Compile, then invoke a zero-argument method on a fresh instance
    Run {
        /// dotted name of the entry class
        entry: String,
        /// name of the method to invoke
        method: String,
        /// script root directories, searched in order
        #[clap(short, long = "path")]
        paths: Vec<PathBuf>,
        #[clap(short, long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    match Args::parse().command {
        Command::Compile {
            entry,
            paths,
            verbose,
        } => match build(&entry, paths) {
            Ok(area) => {
                if verbose {
                    dump(&area);
                }
                ExitCode::SUCCESS
            }
            Err(()) => ExitCode::FAILURE,
        },
        Command::Run {
            entry,
            method,
            paths,
            verbose,
        } => run(&entry, &method, paths, verbose),
    }
}

fn build(entry: &str, paths: Vec<PathBuf>) -> Result<SharedClassArea, ()> {
    let mut compiler = Compiler::new(Box::new(FileLoader::new(paths)));
    compiler.build(entry).map_err(|error| {
        eprintln!("{error}");
    })
}

fn dump(area: &SharedClassArea) {
    for class in area.classes() {
        println!("{class:?}");
        for idx in 0..class.num_functions() {
            let Some(function) = class.function(idx) else {
                continue;
            };
            println!("  [{idx}] {}.{}:", function.class_name, function.definition.name);
            println!("{:?}", function.code);
        }
    }
}

fn run(entry: &str, method: &str, paths: Vec<PathBuf>, verbose: bool) -> ExitCode {
    let Ok(area) = build(entry, paths) else {
        return ExitCode::FAILURE;
    };
    let Some(class) = area.search(entry) else {
        eprintln!("Class {entry} was not part of the build.");
        return ExitCode::FAILURE;
    };
    let Some(fn_idx) = class.vtable_index(method) else {
        eprintln!("Class {entry} has no method {method}.");
        return ExitCode::FAILURE;
    };
    let function = class.function(fn_idx).expect("vtable index is valid");
    if function.definition.num_args() != 0 {
        eprintln!("Method {entry}.{method} takes arguments and cannot be run directly.");
        return ExitCode::FAILURE;
    }

    let vm = Vm::new(area).verbose(verbose);
    // run the zero-argument constructor when the class declares one
    let zero_arg_ctor =
        (0..class.num_constructors()).find(|idx| {
            class
                .constructor(*idx)
                .is_some_and(|ctor| ctor.definition.num_args() == 0)
        });
    let instance = zero_arg_ctor.map_or_else(
        || class.create_instance(),
        |ctor_idx| vm.new_instance(&class, ctor_idx, Vec::new()),
    );

    let result = vm.call_function(&instance, fn_idx, Vec::new());
    println!("{result:?}");
    ExitCode::SUCCESS
}
