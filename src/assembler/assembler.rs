use std::path::Path;

use anyhow::Context;
use log::info;

use super::addr_fold::fold_address_arithmetic;
use super::codegen::{CodeGenerator, FuncContext};
use super::ig_visualizer::{visualize_allocation, visualize_liveness};
use super::interference_graph::{build_interference_graph, InterferenceGraph};
use super::liveness::{compute_liveness, LivenessInfo};
use super::reg_alloc::{allocate_registers, Allocation};
use super::x86::AsmLine;
use crate::cfg::cfg_visualizer::visualize_program_ir;
use crate::cfg::three_address_code::{Func, Program};
use crate::error::CodegenError;
use crate::utils::cli::{CompilerAction, Optimization};

#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Fold `t = b + k` into the following load/store.
    pub fold_addresses: bool,
}

impl CompileOptions {
    pub fn from_optimizations<'a>(opts: impl IntoIterator<Item = &'a Optimization>) -> Self {
        let mut options = CompileOptions::default();
        for opt in opts {
            match opt {
                Optimization::Fold => options.fold_addresses = true,
            }
        }
        options
    }
}

/// Results of every analysis stage for one function. Owned by the driver
/// and dropped once the function is emitted.
pub struct FunctionAnalysis {
    /// The function as emitted, after any rewriting pass.
    pub func: Func,
    pub liveness: LivenessInfo,
    pub graph: InterferenceGraph,
    pub alloc: Allocation,
}

pub fn analyze_function(
    func: &Func,
    opts: &CompileOptions,
) -> Result<FunctionAnalysis, CodegenError> {
    func.validate()?;
    let func = if opts.fold_addresses {
        fold_address_arithmetic(func)?
    } else {
        func.clone()
    };

    let liveness = compute_liveness(&func)?;
    let graph = build_interference_graph(&liveness);
    info!(
        "_{}: {} instructions, {} registers, {} interferences",
        func.name,
        func.code.len(),
        graph.node_count(),
        graph.edge_count()
    );
    let alloc = allocate_registers(&func, &liveness, &graph)?;

    Ok(FunctionAnalysis {
        func,
        liveness,
        graph,
        alloc,
    })
}

pub fn compile_to_lines(
    program: &Program,
    opts: &CompileOptions,
) -> Result<Vec<AsmLine>, CodegenError> {
    let mut cg = CodeGenerator::new();
    cg.begin_program(program);
    for (number, func) in program.funcs.iter().enumerate() {
        let analysis = analyze_function(func, opts)?;
        let cx = FuncContext::new(&analysis.func, number, &analysis.liveness, &analysis.alloc);
        cg.generate_function(&cx)?;
    }
    Ok(cg.finish())
}

/// Compile a whole program to assembly text. Stops at the first function
/// that fails.
pub fn compile_program(program: &Program, opts: &CompileOptions) -> Result<String, CodegenError> {
    let lines = compile_to_lines(program, opts)?;
    let mut out = lines
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    Ok(out)
}

pub fn read_program(path: &Path) -> anyhow::Result<Program> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid IR program", path.display()))
}

pub fn assemble(
    input: &Path,
    mut writer: Box<dyn std::io::Write>,
    target: &CompilerAction,
    opts: &CompileOptions,
) -> anyhow::Result<()> {
    let program = read_program(input)?;
    let text = match target {
        CompilerAction::Ir => visualize_program_ir(&program),
        CompilerAction::Liveness => {
            let mut out = String::new();
            for func in &program.funcs {
                let analysis = analyze_function(func, opts)?;
                out.push_str(&visualize_liveness(&analysis.func, &analysis.liveness));
                out.push('\n');
            }
            out
        }
        CompilerAction::Regalloc => {
            let mut out = String::new();
            for func in &program.funcs {
                let analysis = analyze_function(func, opts)?;
                out.push_str(&visualize_allocation(&analysis));
                out.push('\n');
            }
            out
        }
        CompilerAction::Assembly => compile_program(&program, opts)?,
    };
    writer.write_all(text.as_bytes()).context("cannot write output")?;
    writer.flush().context("cannot write output")?;
    Ok(())
}
