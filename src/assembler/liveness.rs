// Liveness analysis for register allocation.
//
// Works directly on the flat instruction list, one slot per instruction:
//   live_out[i] – registers whose value may be read after i runs
//   live_in[i]  – registers whose value may be read by i or later
//
// Function parameters count as defined by instruction 0, so an unused
// parameter is dead from the start instead of live-in from nowhere.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::cfg::three_address_code::{Func, Reg, Succs};
use crate::error::CodegenError;

// ---------------------------------------------------------------------------
// Public output type
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LivenessInfo {
    pub live_in: Vec<BTreeSet<Reg>>,
    pub live_out: Vec<BTreeSet<Reg>>,
}

impl LivenessInfo {
    pub fn len(&self) -> usize {
        self.live_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_out.is_empty()
    }

    /// True iff `reg` is read after instruction `i` without being redefined.
    pub fn is_live_out(&self, i: usize, reg: &Reg) -> bool {
        self.live_out.get(i).is_some_and(|s| s.contains(reg))
    }

    /// For every register, the instruction indices whose live-out set holds it.
    pub fn live_ranges(&self) -> BTreeMap<Reg, BTreeSet<usize>> {
        let mut ranges: BTreeMap<Reg, BTreeSet<usize>> = BTreeMap::new();
        for (i, live) in self.live_out.iter().enumerate() {
            for r in live {
                ranges.entry(r.clone()).or_default().insert(i);
            }
        }
        ranges
    }

    /// Registers that hold a value across instruction `i`: live before it
    /// (live-out of the previous slot) and still live after it.
    pub fn live_over(&self, i: usize) -> BTreeSet<Reg> {
        if i == 0 || i >= self.live_out.len() {
            return BTreeSet::new();
        }
        self.live_out[i]
            .intersection(&self.live_out[i - 1])
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

pub fn compute_liveness(func: &Func) -> Result<LivenessInfo, CodegenError> {
    let succs = func.successors()?;
    let info = solve(&succs, &func.used(), &func.defined());
    trace!(
        "liveness for _{}: {} instructions, {} registers live somewhere",
        func.name,
        info.len(),
        info.live_ranges().len()
    );
    Ok(info)
}

/// Backward fixpoint over per-instruction successor, use and def sets:
///
///   live_out[i] = ∪ live_in[s]  for each successor s
///   live_in[i]  = (live_out[i] − def[i]) ∪ use[i]
///
/// Sets only grow, so the iteration terminates.
pub fn solve(succs: &[Succs], used: &[BTreeSet<Reg>], defined: &[BTreeSet<Reg>]) -> LivenessInfo {
    let n = succs.len();
    let mut live_in: Vec<BTreeSet<Reg>> = vec![BTreeSet::new(); n];
    let mut live_out: Vec<BTreeSet<Reg>> = vec![BTreeSet::new(); n];

    let mut rounds = 0;
    let mut changed = true;
    while changed {
        changed = false;
        rounds += 1;
        for i in (0..n).rev() {
            let mut new_out: BTreeSet<Reg> = BTreeSet::new();
            for &s in &succs[i] {
                new_out.extend(live_in[s].iter().cloned());
            }

            let mut new_in: BTreeSet<Reg> = new_out.difference(&defined[i]).cloned().collect();
            new_in.extend(used[i].iter().cloned());

            if new_out != live_out[i] || new_in != live_in[i] {
                live_out[i] = new_out;
                live_in[i] = new_in;
                changed = true;
            }
        }
        trace!("liveness round {} changed={}", rounds, changed);
    }

    LivenessInfo { live_in, live_out }
}
