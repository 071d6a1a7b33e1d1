// x86-64 machine model: physical registers, operands and assembly lines.
//
// Register classes follow the System V calling convention:
//   caller-saved  rax rcx rdx rsi rdi r8 r9 r10 r11
//   callee-saved  rbx rbp r12 r13 r14 r15
//   special       rsp, plus r10/r11 reserved as emitter scratch
// That leaves thirteen registers for the allocator.

use std::fmt;

use crate::cfg::three_address_code::Type;

// ---------------------------------------------------------------------------
// Physical registers
// ---------------------------------------------------------------------------

/// The sixteen general purpose registers, in hardware encoding order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysReg {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

/// Operand width, selecting both the register view and the mnemonic suffix.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Size {
    B,
    L,
    Q,
}

impl Size {
    pub fn of(ty: Type) -> Size {
        match ty {
            Type::Bool => Size::B,
            Type::Int => Size::L,
            Type::Ptr => Size::Q,
        }
    }

    pub fn suffix(self) -> char {
        match self {
            Size::B => 'b',
            Size::L => 'l',
            Size::Q => 'q',
        }
    }

    pub fn bytes(self) -> i32 {
        match self {
            Size::B => 1,
            Size::L => 4,
            Size::Q => 8,
        }
    }
}

pub const ALL_REGS: [PhysReg; 16] = [
    PhysReg::Rax,
    PhysReg::Rcx,
    PhysReg::Rdx,
    PhysReg::Rbx,
    PhysReg::Rsp,
    PhysReg::Rbp,
    PhysReg::Rsi,
    PhysReg::Rdi,
    PhysReg::R8,
    PhysReg::R9,
    PhysReg::R10,
    PhysReg::R11,
    PhysReg::R12,
    PhysReg::R13,
    PhysReg::R14,
    PhysReg::R15,
];

/// Pushed by a function that uses them, in this order.
pub const CALLEE_SAVED: [PhysReg; 6] = [
    PhysReg::Rbx,
    PhysReg::Rbp,
    PhysReg::R12,
    PhysReg::R13,
    PhysReg::R14,
    PhysReg::R15,
];

pub const CALLER_SAVED: [PhysReg; 9] = [
    PhysReg::Rax,
    PhysReg::Rcx,
    PhysReg::Rdx,
    PhysReg::Rsi,
    PhysReg::Rdi,
    PhysReg::R8,
    PhysReg::R9,
    PhysReg::R10,
    PhysReg::R11,
];

/// Positional argument registers.
pub const ARG_REGS: [PhysReg; 6] = [
    PhysReg::Rdi,
    PhysReg::Rsi,
    PhysReg::Rdx,
    PhysReg::Rcx,
    PhysReg::R8,
    PhysReg::R9,
];

pub const RET_REG: PhysReg = PhysReg::Rax;
pub const STACK_PTR: PhysReg = PhysReg::Rsp;

/// Scratch registers owned by the emitter.
pub const TEMP_REG1: PhysReg = PhysReg::R10;
pub const TEMP_REG2: PhysReg = PhysReg::R11;

pub const SPECIAL_REGS: [PhysReg; 3] = [STACK_PTR, TEMP_REG1, TEMP_REG2];

/// Number of colors available to the allocator.
pub const K: usize = ALL_REGS.len() - SPECIAL_REGS.len(); // 13

impl PhysReg {
    pub fn is_callee_saved(self) -> bool {
        CALLEE_SAVED.contains(&self)
    }

    pub fn is_caller_saved(self) -> bool {
        CALLER_SAVED.contains(&self)
    }

    pub fn is_allocatable(self) -> bool {
        !SPECIAL_REGS.contains(&self)
    }

    /// Assembler name of this register viewed at `size`.
    pub fn name(self, size: Size) -> &'static str {
        match size {
            Size::Q => self.name64(),
            Size::L => self.name32(),
            Size::B => self.name8(),
        }
    }

    pub fn name64(self) -> &'static str {
        match self {
            PhysReg::Rax => "%rax",
            PhysReg::Rcx => "%rcx",
            PhysReg::Rdx => "%rdx",
            PhysReg::Rbx => "%rbx",
            PhysReg::Rsp => "%rsp",
            PhysReg::Rbp => "%rbp",
            PhysReg::Rsi => "%rsi",
            PhysReg::Rdi => "%rdi",
            PhysReg::R8 => "%r8",
            PhysReg::R9 => "%r9",
            PhysReg::R10 => "%r10",
            PhysReg::R11 => "%r11",
            PhysReg::R12 => "%r12",
            PhysReg::R13 => "%r13",
            PhysReg::R14 => "%r14",
            PhysReg::R15 => "%r15",
        }
    }

    pub fn name32(self) -> &'static str {
        match self {
            PhysReg::Rax => "%eax",
            PhysReg::Rcx => "%ecx",
            PhysReg::Rdx => "%edx",
            PhysReg::Rbx => "%ebx",
            PhysReg::Rsp => "%esp",
            PhysReg::Rbp => "%ebp",
            PhysReg::Rsi => "%esi",
            PhysReg::Rdi => "%edi",
            PhysReg::R8 => "%r8d",
            PhysReg::R9 => "%r9d",
            PhysReg::R10 => "%r10d",
            PhysReg::R11 => "%r11d",
            PhysReg::R12 => "%r12d",
            PhysReg::R13 => "%r13d",
            PhysReg::R14 => "%r14d",
            PhysReg::R15 => "%r15d",
        }
    }

    pub fn name8(self) -> &'static str {
        match self {
            PhysReg::Rax => "%al",
            PhysReg::Rcx => "%cl",
            PhysReg::Rdx => "%dl",
            PhysReg::Rbx => "%bl",
            PhysReg::Rsp => "%spl",
            PhysReg::Rbp => "%bpl",
            PhysReg::Rsi => "%sil",
            PhysReg::Rdi => "%dil",
            PhysReg::R8 => "%r8b",
            PhysReg::R9 => "%r9b",
            PhysReg::R10 => "%r10b",
            PhysReg::R11 => "%r11b",
            PhysReg::R12 => "%r12b",
            PhysReg::R13 => "%r13b",
            PhysReg::R14 => "%r14b",
            PhysReg::R15 => "%r15b",
        }
    }

    /// Inverse of `name`, accepting any view.
    pub fn parse(name: &str) -> Option<(PhysReg, Size)> {
        ALL_REGS.iter().find_map(|&r| {
            [Size::Q, Size::L, Size::B]
                .into_iter()
                .find(|&s| r.name(s) == name)
                .map(|s| (r, s))
        })
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name64())
    }
}

// ---------------------------------------------------------------------------
// Operands and lines
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(PhysReg, Size),
    Imm(i64),
    /// `offset(%base)`
    Mem { base: PhysReg, offset: i32 },
    /// `name(%rip)`, the address of a global symbol.
    RipRel(String),
    /// Jump or call target.
    Label(String),
    /// `*op`, for indirect calls.
    Indirect(Box<Operand>),
}

impl Operand {
    pub fn q(r: PhysReg) -> Operand {
        Operand::Reg(r, Size::Q)
    }

    pub fn reg(&self) -> Option<PhysReg> {
        match self {
            Operand::Reg(r, _) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r, s) => write!(f, "{}", r.name(*s)),
            Operand::Imm(i) => write!(f, "${}", i),
            Operand::Mem { base, offset: 0 } => write!(f, "({})", base.name64()),
            Operand::Mem { base, offset } => write!(f, "{}({})", offset, base.name64()),
            Operand::RipRel(name) => write!(f, "{}(%rip)", name),
            Operand::Label(name) => write!(f, "{}", name),
            Operand::Indirect(op) => write!(f, "*{}", op),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmLine {
    /// Section or symbol directive, unindented.
    Directive(String),
    /// Data directive inside a table, indented.
    DataItem(String),
    /// `name:`
    Label(String),
    Comment(String),
    Instr { op: String, args: Vec<Operand> },
}

impl AsmLine {
    pub fn instr(op: &str, args: Vec<Operand>) -> AsmLine {
        AsmLine::Instr {
            op: op.to_string(),
            args,
        }
    }

    pub fn is_instr(&self) -> bool {
        matches!(self, AsmLine::Instr { .. })
    }
}

impl fmt::Display for AsmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmLine::Directive(d) => write!(f, "{}", d),
            AsmLine::DataItem(d) => write!(f, "    {}", d),
            AsmLine::Label(l) => write!(f, "{}:", l),
            AsmLine::Comment(c) => write!(f, "    # {}", c),
            AsmLine::Instr { op, args } if args.is_empty() => write!(f, "    {}", op),
            AsmLine::Instr { op, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "    {} {}", op, args.join(", "))
            }
        }
    }
}
