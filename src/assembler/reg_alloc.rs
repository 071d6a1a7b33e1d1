// Simplify/select graph-coloring register allocator.
//
// Phases:
//   1. Simplify – repeatedly remove a node whose remaining degree is below K
//      onto a select stack; when every remaining node has degree ≥ K, remove
//      a minimum-degree node instead. That fallback can lead to a coloring
//      failure in phase 2; there is no spilling to recover from it.
//   2. Select – pop the stack in LIFO order. For each node, the available
//      set is the allocatable registers minus those already given to its
//      neighbours; `find_assignment` picks one according to register class
//      and preference, or the allocation fails with OutOfRegisters.
//
// Preferences are soft hints: parameters and call arguments prefer their
// positional argument register, call results and returned values prefer
// RAX, and the dividend and quotient of a division prefer RAX.

use std::collections::{BTreeMap, BTreeSet};

use bitvec::prelude::*;
use log::debug;

use crate::assembler::interference_graph::{InterferenceGraph, NodeId};
use crate::assembler::liveness::LivenessInfo;
use crate::assembler::x86::{PhysReg, ALL_REGS, ARG_REGS, CALLEE_SAVED, CALLER_SAVED, K, RET_REG};
use crate::cfg::three_address_code::{BinOp, Func, Inst, Reg, Src};
use crate::error::CodegenError;

// ---------------------------------------------------------------------------
// Public output type
// ---------------------------------------------------------------------------

/// Register-allocation result for one function. Built once by
/// `allocate_registers` and only read afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Every register with a non-empty live range.
    pub env: BTreeMap<Reg, PhysReg>,
    /// Callee-saved registers that appear in `env`, in push order.
    pub callee_saves_used: Vec<PhysReg>,
}

impl Allocation {
    pub fn get(&self, reg: &Reg) -> Option<PhysReg> {
        self.env.get(reg).copied()
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

pub fn allocate_registers(
    func: &Func,
    liveness: &LivenessInfo,
    ig: &InterferenceGraph,
) -> Result<Allocation, CodegenError> {
    let preferences = get_preferences(func);
    let ranges = liveness.live_ranges();

    let stack = simplify(ig);

    let mut coloring: Vec<Option<PhysReg>> = vec![None; ig.node_count()];
    for &node in stack.iter().rev() {
        let reg = ig.reg(node);
        let taken: BTreeSet<PhysReg> = ig.neighbors(node).filter_map(|n| coloring[n]).collect();
        let available: BTreeSet<PhysReg> = ALL_REGS
            .iter()
            .copied()
            .filter(|r| r.is_allocatable() && !taken.contains(r))
            .collect();

        let spans_call = ranges
            .get(reg)
            .is_some_and(|range| range_contains_call(func, range));
        let chosen = find_assignment(&available, preferences.get(reg).copied(), spans_call)
            .ok_or_else(|| CodegenError::OutOfRegisters {
                func: func.name.clone(),
                reg: reg.clone(),
            })?;
        debug!("_{}: allocating {} to {}", func.name, reg, chosen);
        coloring[node] = Some(chosen);
    }

    let env: BTreeMap<Reg, PhysReg> = coloring
        .iter()
        .enumerate()
        .filter_map(|(n, c)| c.map(|r| (ig.reg(n).clone(), r)))
        .collect();
    let callee_saves_used = CALLEE_SAVED
        .iter()
        .copied()
        .filter(|r| env.values().any(|v| v == r))
        .collect();

    Ok(Allocation {
        env,
        callee_saves_used,
    })
}

// ---------------------------------------------------------------------------
// Phase 1: Simplify
// ---------------------------------------------------------------------------

/// Removal order of every node. Ties go to the lowest node id, which is the
/// order registers first become live.
fn simplify(ig: &InterferenceGraph) -> Vec<NodeId> {
    let n = ig.node_count();
    let mut removed = bitvec![0; n];
    let mut degree: Vec<usize> = (0..n).map(|v| ig.degree(v)).collect();
    let mut stack = Vec::with_capacity(n);

    while stack.len() < n {
        let low = removed.iter_zeros().find(|&v| degree[v] < K);
        let node = match low {
            Some(v) => v,
            None => {
                // all remaining are significant; take the least constrained
                let Some(v) = removed.iter_zeros().min_by_key(|&v| (degree[v], v)) else {
                    break;
                };
                debug!("simplify: no node below degree {}, removing {}", K, ig.reg(v));
                v
            }
        };

        removed.set(node, true);
        stack.push(node);
        for nbr in ig.neighbors(node) {
            if !removed[nbr] {
                degree[nbr] -= 1;
            }
        }
    }

    stack
}

// ---------------------------------------------------------------------------
// Register class policy
// ---------------------------------------------------------------------------

/// Soft register preferences for `func`. Later instructions overwrite
/// earlier hints for the same register.
pub fn get_preferences(func: &Func) -> BTreeMap<Reg, PhysReg> {
    let mut prefs = BTreeMap::new();

    // incoming arguments, callee side
    for (p, &r) in func.params.iter().zip(ARG_REGS.iter()) {
        prefs.insert(Reg::id(p), r);
    }

    for inst in &func.code {
        match inst {
            Inst::Call { args, rdst, .. } => {
                for (a, &r) in args.iter().zip(ARG_REGS.iter()) {
                    if let Src::Reg(reg) = a {
                        prefs.insert(reg.clone(), r);
                    }
                }
                if let Some(d) = rdst {
                    prefs.insert(d.clone(), RET_REG);
                }
            }
            Inst::Return { val: Some(Src::Reg(reg)) } => {
                prefs.insert(reg.clone(), RET_REG);
            }
            Inst::Binop {
                op: BinOp::Div,
                dst,
                src1,
                ..
            } => {
                if let Src::Reg(reg) = src1 {
                    prefs.insert(reg.clone(), PhysReg::Rax);
                }
                prefs.insert(dst.clone(), PhysReg::Rax);
            }
            _ => {}
        }
    }

    prefs
}

/// True iff the live range covers a call or a division: some index `i` in
/// the range has `i - 1` in the range too (so the register is live both
/// into and out of instruction `i`), and instruction `i` is a call or div.
/// Labels occupy a slot, so live-in of `i` equals live-out of `i - 1`.
pub fn range_contains_call(func: &Func, range: &BTreeSet<usize>) -> bool {
    range.iter().any(|&i| {
        i > 0 && range.contains(&(i - 1)) && func.code.get(i).is_some_and(Inst::is_call_or_div)
    })
}

/// Choose a register from `available`.
///
/// Spanning a call or division: callee-saved first, then the preference,
/// then caller-saved from the end of the list so argument registers come
/// last. Otherwise: the preference, then caller-saved in order, then
/// callee-saved.
pub fn find_assignment(
    available: &BTreeSet<PhysReg>,
    preference: Option<PhysReg>,
    spans_call: bool,
) -> Option<PhysReg> {
    let preferred = preference.filter(|p| available.contains(p));

    if spans_call {
        first_available(available, CALLEE_SAVED.iter())
            .or(preferred)
            .or_else(|| first_available(available, CALLER_SAVED.iter().rev()))
    } else {
        preferred
            .or_else(|| first_available(available, CALLER_SAVED.iter()))
            .or_else(|| first_available(available, CALLEE_SAVED.iter()))
    }
}

fn first_available<'a>(
    available: &BTreeSet<PhysReg>,
    mut regs: impl Iterator<Item = &'a PhysReg>,
) -> Option<PhysReg> {
    regs.find(|r| available.contains(r)).copied()
}
