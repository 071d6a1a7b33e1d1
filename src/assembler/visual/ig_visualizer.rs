// Text dumps of the register-allocation stages.
//
// Two outputs, both per function:
//   visualize_liveness   – the IR listing with each instruction's live-out set
//   visualize_allocation – interference graph nodes with their assigned register

use std::fmt::Write as FmtWrite;

use crate::assembler::assembler::FunctionAnalysis;
use crate::assembler::liveness::LivenessInfo;
use crate::assembler::x86::PhysReg;
use crate::cfg::cfg_visualizer::visualize_function_ir;
use crate::cfg::three_address_code::{Func, Reg};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn reg_list<'a>(regs: impl Iterator<Item = &'a Reg>) -> String {
    regs.map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
}

fn class_name(pr: PhysReg) -> &'static str {
    if pr.is_callee_saved() {
        "callee-saved"
    } else {
        "caller-saved"
    }
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

pub fn visualize_liveness(func: &Func, liveness: &LivenessInfo) -> String {
    visualize_function_ir(func, |i| match liveness.live_out.get(i) {
        Some(out) if !out.is_empty() => format!("# out: {}", reg_list(out.iter())),
        _ => String::new(),
    })
}

// ---------------------------------------------------------------------------
// Interference graph and assignment
// ---------------------------------------------------------------------------

pub fn visualize_allocation(analysis: &FunctionAnalysis) -> String {
    let g = &analysis.graph;
    let alloc = &analysis.alloc;
    let mut out = String::new();

    let header = format!(
        "Interference Graph: {} (registers: {}, edges: {})",
        analysis.func.signature(),
        g.node_count(),
        g.edge_count(),
    );
    let rule = "═".repeat(header.chars().count().max(44));
    writeln!(out, "{rule}").unwrap();
    writeln!(out, "{header}").unwrap();
    writeln!(out, "{rule}").unwrap();

    // nodes in register order, not arena order
    let mut nodes: Vec<usize> = (0..g.node_count()).collect();
    nodes.sort_by(|&a, &b| g.reg(a).cmp(g.reg(b)));

    for n in nodes {
        let reg = g.reg(n);
        let mut nbrs: Vec<&Reg> = g.neighbors(n).map(|m| g.reg(m)).collect();
        nbrs.sort();
        let assigned = match alloc.get(reg) {
            Some(pr) => format!("{:<5} ({})", pr.to_string(), class_name(pr)),
            None => "-".to_string(),
        };
        write!(
            out,
            "  {:<10} -> {:<20}  deg={:<3}",
            reg.to_string(),
            assigned,
            g.degree(n)
        )
        .unwrap();
        if !nbrs.is_empty() {
            write!(out, "  nbrs=[{}]", reg_list(nbrs.into_iter())).unwrap();
        }
        writeln!(out).unwrap();
    }

    let saves: Vec<String> = alloc.callee_saves_used.iter().map(|r| r.to_string()).collect();
    if saves.is_empty() {
        writeln!(out, "  callee-saves: none").unwrap();
    } else {
        writeln!(out, "  callee-saves: {}", saves.join(" ")).unwrap();
    }

    out
}
