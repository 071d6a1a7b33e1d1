use log::debug;

use crate::assembler::liveness::LivenessInfo;
use crate::assembler::parallel_move::resolve_parallel_moves;
use crate::assembler::reg_alloc::Allocation;
use crate::assembler::x86::{
    AsmLine, Operand, PhysReg, Size, ARG_REGS, CALLER_SAVED, RET_REG, STACK_PTR, TEMP_REG1,
    TEMP_REG2,
};
use crate::cfg::three_address_code::{
    Addr, BinOp, CallTgt, Const, Data, Func, Inst, Program, Reg, RelOp, Src, Type, UnOp,
};
use crate::cfg::utils::{escape_string_literal, global_symbol, qualified_label};
use crate::error::CodegenError;

// ==================== Function Context ====================

/// Everything the emitter needs to know about the function being emitted.
/// Created per function by the driver and dropped once it is emitted.
pub struct FuncContext<'a> {
    pub func: &'a Func,
    /// Position in the program, used to qualify local labels.
    pub number: usize,
    pub liveness: &'a LivenessInfo,
    pub alloc: &'a Allocation,
    /// Bytes reserved below the callee-save pushes to keep %rsp aligned.
    frame_size: i32,
}

impl<'a> FuncContext<'a> {
    pub fn new(
        func: &'a Func,
        number: usize,
        liveness: &'a LivenessInfo,
        alloc: &'a Allocation,
    ) -> Self {
        // At entry %rsp is 16n+8. Pushing an even number of callee-saves
        // keeps it there, so reserve one more slot.
        let callee_save_size = alloc.callee_saves_used.len() as i32 * Size::Q.bytes();
        let frame_size = if callee_save_size % (2 * Size::Q.bytes()) == 0 {
            Size::Q.bytes()
        } else {
            0
        };
        FuncContext {
            func,
            number,
            liveness,
            alloc,
            frame_size,
        }
    }

    fn label(&self, name: &str) -> String {
        qualified_label(self.number, name)
    }

    /// Physical register of a register that is read.
    fn location(&self, reg: &Reg) -> Result<PhysReg, CodegenError> {
        self.alloc.get(reg).ok_or_else(|| CodegenError::Unallocated {
            func: self.func.name.clone(),
            reg: reg.clone(),
        })
    }

    /// True if some IR register mapped to `r` holds a value across
    /// instruction `i` and is not the register `i` defines.
    /// A dead `defined` register interferes with nothing at `i`, so its
    /// physical register may still carry another value over `i`.
    fn live_over(&self, r: PhysReg, i: usize, defined: Option<&Reg>) -> bool {
        self.liveness
            .live_over(i)
            .iter()
            .any(|ir| Some(ir) != defined && self.alloc.get(ir) == Some(r))
    }
}

// ==================== Code Generator ====================

pub struct CodeGenerator {
    /// Accumulated assembly output lines
    output: Vec<AsmLine>,
    /// String literals in order of first use; `_S<n>` names entry n.
    string_literals: Vec<String>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        CodeGenerator {
            output: Vec::new(),
            string_literals: Vec::new(),
        }
    }

    /// `.text` and the static data tables.
    pub fn begin_program(&mut self, program: &Program) {
        self.emit(AsmLine::Directive(".text".into()));
        for data in &program.data {
            self.emit_data(data);
        }
    }

    /// Append the interned string literals and return the finished listing.
    pub fn finish(mut self) -> Vec<AsmLine> {
        let literals = std::mem::take(&mut self.string_literals);
        for (i, s) in literals.iter().enumerate() {
            self.emit(AsmLine::Label(format!("_S{}", i)));
            self.emit(AsmLine::DataItem(format!(".asciz {}", escape_string_literal(s))));
        }
        self.output
    }

    // ==================== Assembly Emission Helpers ====================

    fn emit(&mut self, line: AsmLine) {
        self.output.push(line);
    }

    fn emit_instr(&mut self, op: &str, args: Vec<Operand>) {
        self.output.push(AsmLine::instr(op, args));
    }

    fn emit_comment(&mut self, comment: String) {
        self.output.push(AsmLine::Comment(comment));
    }

    /// `mov<size> from, to`, omitted when it would be a no-op.
    fn emit_mov(&mut self, size: Size, from: Operand, to: Operand) {
        if from != to {
            self.emit_instr(&format!("mov{}", size.suffix()), vec![from, to]);
        }
    }

    fn emit_push(&mut self, r: PhysReg) {
        self.emit_instr("pushq", vec![Operand::q(r)]);
    }

    fn emit_pop(&mut self, r: PhysReg) {
        self.emit_instr("popq", vec![Operand::q(r)]);
    }

    fn emit_rsp_adjust(&mut self, op: &str, bytes: i32) {
        self.emit_instr(op, vec![Operand::Imm(bytes as i64), Operand::q(STACK_PTR)]);
    }

    fn emit_data(&mut self, data: &Data) {
        let name = global_symbol(&data.name);
        self.emit(AsmLine::Directive(format!(".globl {}", name)));
        self.emit(AsmLine::Label(name));
        for item in &data.items {
            let line = match item {
                Const::Global(g) => format!(".quad {}", global_symbol(g)),
                Const::Int(i) => format!(".long {}", i),
                Const::Bool(b) => format!(".byte {}", u8::from(*b)),
            };
            self.emit(AsmLine::DataItem(line));
        }
    }

    // ==================== Operands ====================

    /// Operand for reading `src`. Immediates are returned as such when
    /// `imm_ok`; anything that is not already in a register ends up in `temp`.
    fn src_operand(
        &mut self,
        cx: &FuncContext,
        src: &Src,
        imm_ok: bool,
        temp: PhysReg,
    ) -> Result<Operand, CodegenError> {
        let imm = match src {
            Src::Reg(r) => return Ok(Operand::q(cx.location(r)?)),
            Src::Int(i) => *i as i64,
            Src::Bool(b) => *b as i64,
            Src::Str(s) => {
                let name = format!("_S{}", self.string_literals.len());
                self.string_literals.push(s.clone());
                self.emit_instr("leaq", vec![Operand::RipRel(name), Operand::q(temp)]);
                return Ok(Operand::q(temp));
            }
            Src::Global(g) => {
                self.emit_instr(
                    "leaq",
                    vec![Operand::RipRel(global_symbol(g)), Operand::q(temp)],
                );
                return Ok(Operand::q(temp));
            }
        };
        if imm_ok {
            Ok(Operand::Imm(imm))
        } else {
            self.emit_mov(Size::Q, Operand::Imm(imm), Operand::q(temp));
            Ok(Operand::q(temp))
        }
    }

    /// Like `src_operand` but always a register.
    fn src_reg(
        &mut self,
        cx: &FuncContext,
        src: &Src,
        temp: PhysReg,
    ) -> Result<PhysReg, CodegenError> {
        let op = self.src_operand(cx, src, false, temp)?;
        op.reg().ok_or_else(|| {
            CodegenError::malformed(&cx.func.name, format!("{} is not a register", src))
        })
    }

    /// Register receiving the value defined at `i`, or None when nothing
    /// reads it afterwards.
    fn dest_operand(
        &self,
        cx: &FuncContext,
        i: usize,
        dst: &Reg,
    ) -> Result<Option<PhysReg>, CodegenError> {
        if !cx.liveness.is_live_out(i, dst) {
            return Ok(None);
        }
        cx.location(dst).map(Some)
    }

    fn addr_operand(
        &mut self,
        cx: &FuncContext,
        addr: &Addr,
        temp: PhysReg,
    ) -> Result<Operand, CodegenError> {
        let base = self.src_reg(cx, &addr.base, temp)?;
        Ok(Operand::Mem {
            base,
            offset: addr.offset,
        })
    }

    // ==================== Function Generation ====================

    /// Emit one function: header, prologue, incoming parameter moves, body.
    pub fn generate_function(&mut self, cx: &FuncContext) -> Result<(), CodegenError> {
        let func = cx.func;
        debug!(
            "emitting _{} as function {} (frame {} bytes, callee-saves {:?})",
            func.name, cx.number, cx.frame_size, cx.alloc.callee_saves_used
        );

        self.emit_comment(func.signature());
        if !func.locals.is_empty() {
            self.emit_comment(format!("({})", func.locals.join(", ")));
        }
        self.emit_comment("Allocation map".into());
        for (reg, phys) in &cx.alloc.env {
            self.emit_comment(format!("{}\t{}", reg, phys));
        }

        let name = global_symbol(&func.name);
        self.emit(AsmLine::Directive(".p2align 4,0x90".into()));
        self.emit(AsmLine::Directive(format!(".globl {}", name)));
        self.emit(AsmLine::Label(name));

        self.emit_prologue(cx);
        self.emit_param_moves(cx);

        for (i, inst) in func.code.iter().enumerate() {
            self.emit_comment(format!("{}. {}", i, inst));
            self.emit_inst(cx, i, inst)?;
        }
        // falling off the final label returns
        self.emit_epilogue(cx);
        Ok(())
    }

    fn emit_prologue(&mut self, cx: &FuncContext) {
        for &r in &cx.alloc.callee_saves_used {
            self.emit_push(r);
        }
        if cx.frame_size != 0 {
            self.emit_rsp_adjust("subq", cx.frame_size);
        }
    }

    fn emit_epilogue(&mut self, cx: &FuncContext) {
        if cx.frame_size != 0 {
            self.emit_rsp_adjust("addq", cx.frame_size);
        }
        for &r in cx.alloc.callee_saves_used.iter().rev() {
            self.emit_pop(r);
        }
        self.emit_instr("ret", vec![]);
    }

    /// Move incoming arguments to their allocated registers. Parameters
    /// not live at entry are skipped.
    fn emit_param_moves(&mut self, cx: &FuncContext) {
        let moves: Vec<(PhysReg, PhysReg)> = cx
            .func
            .params
            .iter()
            .zip(ARG_REGS.iter())
            .filter_map(|(p, &arg)| {
                let reg = Reg::id(p);
                if !cx.liveness.is_live_out(0, &reg) {
                    return None;
                }
                cx.alloc.get(&reg).map(|d| (arg, d))
            })
            .collect();
        self.emit_parallel_moves(&moves);
    }

    fn emit_parallel_moves(&mut self, moves: &[(PhysReg, PhysReg)]) {
        for (s, d) in resolve_parallel_moves(moves, TEMP_REG1) {
            self.emit_mov(Size::Q, Operand::q(s), Operand::q(d));
        }
    }

    // ==================== Instructions ====================

    fn emit_inst(&mut self, cx: &FuncContext, i: usize, inst: &Inst) -> Result<(), CodegenError> {
        match inst {
            Inst::Binop {
                op,
                dst,
                src1,
                src2,
            } => match op.relation() {
                Some(rel) => self.emit_relational(cx, i, rel, dst, src1, src2),
                None if *op == BinOp::Div => self.emit_div(cx, i, dst, src1, src2),
                None => self.emit_arith(cx, i, *op, dst, src1, src2),
            },
            Inst::Unop { op, dst, src } => {
                let Some(mdest) = self.dest_operand(cx, i, dst)? else {
                    return Ok(());
                };
                let msrc = self.src_operand(cx, src, true, TEMP_REG1)?;
                self.emit_mov(Size::Q, msrc, Operand::q(mdest));
                match op {
                    UnOp::Neg => self.emit_instr("negq", vec![Operand::q(mdest)]),
                    UnOp::Not => self.emit_instr("xorq", vec![Operand::Imm(1), Operand::q(mdest)]),
                }
                Ok(())
            }
            Inst::Move { dst, src } => {
                let Some(mdest) = self.dest_operand(cx, i, dst)? else {
                    return Ok(());
                };
                let msrc = self.src_operand(cx, src, true, mdest)?;
                self.emit_mov(Size::Q, msrc, Operand::q(mdest));
                Ok(())
            }
            Inst::Load { ty, dst, addr } => {
                let Some(mdest) = self.dest_operand(cx, i, dst)? else {
                    return Ok(());
                };
                let a = self.addr_operand(cx, addr, TEMP_REG1)?;
                let op = match ty {
                    Type::Bool => "movzbq",
                    Type::Int => "movslq",
                    Type::Ptr => "movq",
                };
                self.emit_instr(op, vec![a, Operand::q(mdest)]);
                Ok(())
            }
            Inst::Store { ty, addr, src } => {
                let size = Size::of(*ty);
                let s = match self.src_operand(cx, src, true, TEMP_REG1)? {
                    Operand::Reg(r, _) => Operand::Reg(r, size),
                    other => other,
                };
                let a = self.addr_operand(cx, addr, TEMP_REG2)?;
                self.emit_mov(size, s, a);
                Ok(())
            }
            Inst::Call {
                tgt,
                ind,
                args,
                rdst,
            } => self.emit_call(cx, i, tgt, *ind, args, rdst.as_ref()),
            Inst::Return { val } => {
                if let Some(v) = val {
                    let r = self.src_operand(cx, v, true, RET_REG)?;
                    self.emit_mov(Size::Q, r, Operand::q(RET_REG));
                }
                self.emit_epilogue(cx);
                Ok(())
            }
            Inst::CJump {
                op,
                src1,
                src2,
                lab,
            } => {
                self.emit_compare(cx, src1, src2)?;
                self.emit_instr(
                    &format!("j{}", op.cc()),
                    vec![Operand::Label(cx.label(lab))],
                );
                Ok(())
            }
            Inst::Jump { lab } => {
                self.emit_instr("jmp", vec![Operand::Label(cx.label(lab))]);
                Ok(())
            }
            Inst::LabelDec { name } => {
                self.emit(AsmLine::Label(cx.label(name)));
                Ok(())
            }
        }
    }

    /// add/sub/mul/and/or: dest = left; dest op= right.
    fn emit_arith(
        &mut self,
        cx: &FuncContext,
        i: usize,
        op: BinOp,
        dst: &Reg,
        src1: &Src,
        src2: &Src,
    ) -> Result<(), CodegenError> {
        let Some(mdest) = self.dest_operand(cx, i, dst)? else {
            return Ok(());
        };
        let dest = Operand::q(mdest);
        let mut mright = self.src_operand(cx, src2, true, TEMP_REG1)?;
        // right operand must survive the move into dest
        if mright == dest {
            self.emit_mov(Size::Q, mright, Operand::q(TEMP_REG1));
            mright = Operand::q(TEMP_REG1);
        }
        let mleft = self.src_operand(cx, src1, true, TEMP_REG2)?;
        self.emit_mov(Size::Q, mleft, dest.clone());
        let mnemonic = match op {
            BinOp::Add => "addq",
            BinOp::Sub => "subq",
            BinOp::Mul => "imulq",
            BinOp::And => "andq",
            BinOp::Or => "orq",
            _ => {
                return Err(CodegenError::malformed(
                    &cx.func.name,
                    format!("{} is not an arithmetic operator", op),
                ))
            }
        };
        self.emit_instr(mnemonic, vec![mright, dest]);
        Ok(())
    }

    /// idivq needs the dividend in %rax and clobbers %rdx, so any other
    /// value living there across the division is saved on the stack.
    fn emit_div(
        &mut self,
        cx: &FuncContext,
        i: usize,
        dst: &Reg,
        src1: &Src,
        src2: &Src,
    ) -> Result<(), CodegenError> {
        let Some(mdest) = self.dest_operand(cx, i, dst)? else {
            return Ok(());
        };
        let save_rdx = cx.live_over(PhysReg::Rdx, i, Some(dst));
        let save_rax = cx.live_over(PhysReg::Rax, i, Some(dst));
        if save_rdx {
            self.emit_push(PhysReg::Rdx);
        }
        if save_rax {
            self.emit_push(PhysReg::Rax);
        }

        let mut mright = self.src_operand(cx, src2, false, TEMP_REG1)?;
        if matches!(mright.reg(), Some(PhysReg::Rax | PhysReg::Rdx)) {
            self.emit_mov(Size::Q, mright, Operand::q(TEMP_REG1));
            mright = Operand::q(TEMP_REG1);
        }
        let mleft = self.src_operand(cx, src1, true, PhysReg::Rax)?;
        self.emit_mov(Size::Q, mleft, Operand::q(PhysReg::Rax));
        self.emit_instr("cqto", vec![]);
        self.emit_instr("idivq", vec![mright]);
        self.emit_mov(Size::Q, Operand::q(PhysReg::Rax), Operand::q(mdest));

        if save_rax {
            self.emit_pop(PhysReg::Rax);
        }
        if save_rdx {
            self.emit_pop(PhysReg::Rdx);
        }
        Ok(())
    }

    /// `cmpq right, left` (AT&T order).
    fn emit_compare(
        &mut self,
        cx: &FuncContext,
        src1: &Src,
        src2: &Src,
    ) -> Result<(), CodegenError> {
        let mleft = self.src_operand(cx, src1, false, TEMP_REG1)?;
        let mright = self.src_operand(cx, src2, true, TEMP_REG2)?;
        self.emit_instr("cmpq", vec![mright, mleft]);
        Ok(())
    }

    fn emit_relational(
        &mut self,
        cx: &FuncContext,
        i: usize,
        rel: RelOp,
        dst: &Reg,
        src1: &Src,
        src2: &Src,
    ) -> Result<(), CodegenError> {
        let Some(mdest) = self.dest_operand(cx, i, dst)? else {
            return Ok(());
        };
        self.emit_compare(cx, src1, src2)?;
        let low_byte = Operand::Reg(mdest, Size::B);
        self.emit_instr(&format!("set{}", rel.cc()), vec![low_byte.clone()]);
        self.emit_instr("movzbq", vec![low_byte, Operand::q(mdest)]);
        Ok(())
    }

    fn emit_call(
        &mut self,
        cx: &FuncContext,
        i: usize,
        tgt: &CallTgt,
        ind: bool,
        args: &[Src],
        rdst: Option<&Reg>,
    ) -> Result<(), CodegenError> {
        if args.len() > ARG_REGS.len() {
            return Err(CodegenError::TooManyArgs {
                func: cx.func.name.clone(),
                count: args.len(),
            });
        }

        // save caller-save registers whose values survive the call
        let saved: Vec<PhysReg> = CALLER_SAVED
            .iter()
            .copied()
            .filter(|&r| cx.live_over(r, i, rdst))
            .collect();
        for &r in &saved {
            self.emit_push(r);
        }
        let pad = saved.len() % 2 != 0;
        if pad {
            self.emit_rsp_adjust("subq", Size::Q.bytes());
        }

        // an indirect target must not sit in a register about to be overwritten
        let call_target = match (tgt, ind) {
            (CallTgt::Global(g), false) => Operand::Label(global_symbol(g)),
            (CallTgt::Global(g), true) => {
                Operand::Indirect(Box::new(Operand::RipRel(global_symbol(g))))
            }
            (CallTgt::Reg(r), true) => {
                let mut t = cx.location(r)?;
                if ARG_REGS[..args.len()].contains(&t) {
                    self.emit_mov(Size::Q, Operand::q(t), Operand::q(TEMP_REG2));
                    t = TEMP_REG2;
                }
                Operand::Indirect(Box::new(Operand::q(t)))
            }
            (CallTgt::Reg(_), false) => {
                return Err(CodegenError::malformed(
                    &cx.func.name,
                    "direct call through a register",
                ))
            }
        };

        // register arguments move all at once, then the rest
        let mut moves = Vec::new();
        let mut moved = vec![false; args.len()];
        for (k, arg) in args.iter().enumerate() {
            if let Src::Reg(r) = arg {
                moves.push((cx.location(r)?, ARG_REGS[k]));
                moved[k] = true;
            }
        }
        self.emit_parallel_moves(&moves);
        for (k, arg) in args.iter().enumerate() {
            if !moved[k] {
                let r = self.src_operand(cx, arg, true, ARG_REGS[k])?;
                self.emit_mov(Size::Q, r, Operand::q(ARG_REGS[k]));
            }
        }

        self.emit_instr("call", vec![call_target]);

        if let Some(d) = rdst {
            if let Some(mdest) = self.dest_operand(cx, i, d)? {
                self.emit_mov(Size::Q, Operand::q(RET_REG), Operand::q(mdest));
            }
        }

        if pad {
            self.emit_rsp_adjust("addq", Size::Q.bytes());
        }
        for &r in saved.iter().rev() {
            self.emit_pop(r);
        }
        Ok(())
    }
}
