// Address-arithmetic folding.
//
// Rewrites
//   t = b + k
//   x = 0[t]:I            (or 0[t]:I = x)
// into
//   x = k[b]:I
// when that value of t is read by nothing but the memory access. The pass
// runs before liveness for the emitted code, so dropping the add simply
// removes t from the function.

use log::debug;

use crate::assembler::liveness::{compute_liveness, LivenessInfo};
use crate::cfg::three_address_code::{Addr, BinOp, Func, Inst, Reg, Src};
use crate::error::CodegenError;

pub fn fold_address_arithmetic(func: &Func) -> Result<Func, CodegenError> {
    let live = compute_liveness(func)?;
    let mut code = Vec::with_capacity(func.code.len());
    let mut folded = 0;

    let mut i = 0;
    while i < func.code.len() {
        if let Some(inst) = try_fold(&func.code, i, &live) {
            debug!("_{}: folded {} into {}", func.name, func.code[i], inst);
            code.push(inst);
            folded += 1;
            i += 2;
        } else {
            code.push(func.code[i].clone());
            i += 1;
        }
    }

    if folded > 0 {
        debug!("_{}: {} address computations folded", func.name, folded);
    }
    Ok(Func {
        code,
        ..func.clone()
    })
}

/// `(t, b, k)` for `t = b + k` or `t = k + b`, with `b` a register other than `t`.
fn base_plus_const(inst: &Inst) -> Option<(&Reg, &Reg, i32)> {
    let Inst::Binop {
        op: BinOp::Add,
        dst,
        src1,
        src2,
    } = inst
    else {
        return None;
    };
    let (base, k) = match (src1, src2) {
        (Src::Reg(b), Src::Int(k)) | (Src::Int(k), Src::Reg(b)) => (b, *k),
        _ => return None,
    };
    (base != dst).then_some((dst, base, k))
}

fn rebase(addr: &Addr, t: &Reg, base: &Reg, k: i32) -> Option<Addr> {
    if addr.base.reg() != Some(t) {
        return None;
    }
    Some(Addr {
        base: Src::Reg(base.clone()),
        offset: addr.offset.checked_add(k)?,
    })
}

fn try_fold(code: &[Inst], i: usize, live: &LivenessInfo) -> Option<Inst> {
    let (t, base, k) = base_plus_const(&code[i])?;
    match code.get(i + 1)? {
        Inst::Load { ty, dst, addr } => {
            if live.is_live_out(i + 1, t) && dst != t {
                return None;
            }
            Some(Inst::Load {
                ty: *ty,
                dst: dst.clone(),
                addr: rebase(addr, t, base, k)?,
            })
        }
        Inst::Store { ty, addr, src } => {
            if live.is_live_out(i + 1, t) || src.reg() == Some(t) {
                return None;
            }
            Some(Inst::Store {
                ty: *ty,
                addr: rebase(addr, t, base, k)?,
                src: src.clone(),
            })
        }
        _ => None,
    }
}
