// Three-address IR consumed by the x86 backend.
//
// A function body is a flat instruction list that starts and ends with a
// label declaration, so every jump has a fallthrough target. Registers are
// either named source variables (`Id`) or numbered temporaries (`Temp`); both
// compare by name/number only.
//
// Textual form (Display), e.g.
//   t1 = a + 1
//   8[p]:I = t1
//   t2 = call _f(a, 1)
//   if i < 11 goto L1

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::error::CodegenError;

/// Number of arguments passed in registers; calls and functions beyond it
/// are rejected.
pub const MAX_REG_ARGS: usize = 6;

/// Successor indices of one instruction (never more than two).
pub type Succs = SmallVec<[usize; 2]>;

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reg {
    /// Source-level variable or parameter.
    Id(String),
    /// Compiler temporary, numbered per function.
    Temp(u32),
}

impl Reg {
    pub fn id(name: &str) -> Self {
        Reg::Id(name.to_string())
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::Id(name) => write!(f, "{}", name),
            Reg::Temp(n) => write!(f, "t{}", n),
        }
    }
}

/// Anything that can be read by an instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Src {
    Reg(Reg),
    Int(i32),
    Bool(bool),
    /// String literal; interned into the data area at emission time.
    Str(String),
    /// Address of a global symbol.
    Global(String),
}

impl Src {
    pub fn id(name: &str) -> Self {
        Src::Reg(Reg::id(name))
    }

    pub fn reg(&self) -> Option<&Reg> {
        match self {
            Src::Reg(r) => Some(r),
            _ => None,
        }
    }

    fn add_to(&self, set: &mut BTreeSet<Reg>) {
        if let Src::Reg(r) = self {
            set.insert(r.clone());
        }
    }
}

impl From<Reg> for Src {
    fn from(r: Reg) -> Self {
        Src::Reg(r)
    }
}

impl From<&Reg> for Src {
    fn from(r: &Reg) -> Self {
        Src::Reg(r.clone())
    }
}

impl From<i32> for Src {
    fn from(i: i32) -> Self {
        Src::Int(i)
    }
}

impl fmt::Display for Src {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Src::Reg(r) => write!(f, "{}", r),
            Src::Int(i) => write!(f, "{}", i),
            Src::Bool(b) => write!(f, "{}", b),
            Src::Str(s) => write!(f, "\"{}\"", s),
            Src::Global(g) => write!(f, "_{}", g),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTgt {
    Global(String),
    Reg(Reg),
}

impl fmt::Display for CallTgt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTgt::Global(g) => write!(f, "_{}", g),
            CallTgt::Reg(r) => write!(f, "{}", r),
        }
    }
}

/// Static data item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Const {
    Global(String),
    Int(i32),
    Bool(bool),
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Global(g) => write!(f, "_{}", g),
            Const::Int(i) => write!(f, "{}", i),
            Const::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Memory at `base + offset`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addr {
    pub base: Src,
    #[serde(default)]
    pub offset: i32,
}

impl Addr {
    pub fn new(base: impl Into<Src>, offset: i32) -> Self {
        Addr {
            base: base.into(),
            offset,
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset != 0 {
            write!(f, "{}", self.offset)?;
        }
        write!(f, "[{}]", self.base)
    }
}

/// Width of a memory access.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Bool,
    Int,
    Ptr,
}

impl Type {
    pub fn size(self) -> i32 {
        match self {
            Type::Bool => 1,
            Type::Int => 4,
            Type::Ptr => 8,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, ":B"),
            Type::Int => write!(f, ":I"),
            Type::Ptr => write!(f, ":P"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// The comparison this operator performs, if it is relational.
    pub fn relation(self) -> Option<RelOp> {
        match self {
            BinOp::Eq => Some(RelOp::Eq),
            BinOp::Ne => Some(RelOp::Ne),
            BinOp::Lt => Some(RelOp::Lt),
            BinOp::Le => Some(RelOp::Le),
            BinOp::Gt => Some(RelOp::Gt),
            BinOp::Ge => Some(RelOp::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    /// x86 condition-code suffix (signed comparisons).
    pub fn cc(self) -> &'static str {
        match self {
            RelOp::Eq => "e",
            RelOp::Ne => "ne",
            RelOp::Lt => "l",
            RelOp::Le => "le",
            RelOp::Gt => "g",
            RelOp::Ge => "ge",
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    Neg,
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
        }
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inst {
    // t1 = a + b
    Binop {
        op: BinOp,
        dst: Reg,
        src1: Src,
        src2: Src,
    },
    // t1 = -a
    Unop {
        op: UnOp,
        dst: Reg,
        src: Src,
    },
    // a = t1
    Move {
        dst: Reg,
        src: Src,
    },
    // t1 = 8[p]:I
    Load {
        ty: Type,
        dst: Reg,
        addr: Addr,
    },
    // 8[p]:I = t1
    Store {
        ty: Type,
        addr: Addr,
        src: Src,
    },
    // t1 = call _f(a, b)   /   call * t2(a)
    Call {
        tgt: CallTgt,
        #[serde(default)]
        ind: bool,
        #[serde(default)]
        args: Vec<Src>,
        rdst: Option<Reg>,
    },
    // return a
    Return {
        val: Option<Src>,
    },
    // if a < b goto L1
    #[serde(rename = "cjump")]
    CJump {
        op: RelOp,
        src1: Src,
        src2: Src,
        lab: String,
    },
    // goto L1
    Jump {
        lab: String,
    },
    // L1:
    #[serde(rename = "label")]
    LabelDec {
        name: String,
    },
}

impl Inst {
    pub fn label(name: &str) -> Self {
        Inst::LabelDec {
            name: name.to_string(),
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Inst::LabelDec { .. })
    }

    /// Registers read by this instruction.
    pub fn used(&self) -> BTreeSet<Reg> {
        let mut s = BTreeSet::new();
        match self {
            Inst::Binop { src1, src2, .. } | Inst::CJump { src1, src2, .. } => {
                src1.add_to(&mut s);
                src2.add_to(&mut s);
            }
            Inst::Unop { src, .. } | Inst::Move { src, .. } => src.add_to(&mut s),
            Inst::Load { addr, .. } => addr.base.add_to(&mut s),
            Inst::Store { addr, src, .. } => {
                src.add_to(&mut s);
                addr.base.add_to(&mut s);
            }
            Inst::Call { tgt, args, .. } => {
                if let CallTgt::Reg(r) = tgt {
                    s.insert(r.clone());
                }
                for a in args {
                    a.add_to(&mut s);
                }
            }
            Inst::Return { val } => {
                if let Some(v) = val {
                    v.add_to(&mut s);
                }
            }
            Inst::Jump { .. } | Inst::LabelDec { .. } => {}
        }
        s
    }

    /// Registers written by this instruction.
    pub fn defined(&self) -> BTreeSet<Reg> {
        self.dest().into_iter().cloned().collect()
    }

    /// The single register this instruction writes, if any.
    pub fn dest(&self) -> Option<&Reg> {
        match self {
            Inst::Binop { dst, .. }
            | Inst::Unop { dst, .. }
            | Inst::Move { dst, .. }
            | Inst::Load { dst, .. } => Some(dst),
            Inst::Call { rdst, .. } => rdst.as_ref(),
            Inst::Store { .. }
            | Inst::Return { .. }
            | Inst::CJump { .. }
            | Inst::Jump { .. }
            | Inst::LabelDec { .. } => None,
        }
    }

    /// True for instructions that clobber caller-saved or divide registers.
    pub fn is_call_or_div(&self) -> bool {
        matches!(
            self,
            Inst::Call { .. } | Inst::Binop { op: BinOp::Div, .. }
        )
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Binop { op, dst, src1, src2 } => write!(f, "{} = {} {} {}", dst, src1, op, src2),
            Inst::Unop { op, dst, src } => write!(f, "{} = {}{}", dst, op, src),
            Inst::Move { dst, src } => write!(f, "{} = {}", dst, src),
            Inst::Load { ty, dst, addr } => write!(f, "{} = {}{}", dst, addr, ty),
            Inst::Store { ty, addr, src } => write!(f, "{}{} = {}", addr, ty, src),
            Inst::Call {
                tgt,
                ind,
                args,
                rdst,
            } => {
                if let Some(r) = rdst {
                    write!(f, "{} = ", r)?;
                }
                write!(
                    f,
                    "call {}{}({})",
                    if *ind { "* " } else { "" },
                    tgt,
                    join(args)
                )
            }
            Inst::Return { val: Some(v) } => write!(f, "return {}", v),
            Inst::Return { val: None } => write!(f, "return"),
            Inst::CJump {
                op,
                src1,
                src2,
                lab,
            } => write!(f, "if {} {} {} goto {}", src1, op, src2, lab),
            Inst::Jump { lab } => write!(f, "goto {}", lab),
            Inst::LabelDec { name } => write!(f, "{}:", name),
        }
    }
}

// ---------------------------------------------------------------------------
// Program structure
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub data: Vec<Data>,
    pub funcs: Vec<Func>,
}

/// Global table of static items, e.g. a class descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: String,
    pub size: i32,
    pub items: Vec<Const>,
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data _{} (sz={}): {}", self.name, self.size, join(&self.items))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub locals: Vec<String>,
    pub code: Vec<Inst>,
}

impl Func {
    /// `_name (p1, p2)` header line.
    pub fn signature(&self) -> String {
        format!("_{} ({})", self.name, self.params.join(", "))
    }

    /// Check the structural invariants the backend relies on.
    pub fn validate(&self) -> Result<(), CodegenError> {
        match (self.code.first(), self.code.last()) {
            (Some(first), Some(last)) if first.is_label() && last.is_label() => {}
            _ => {
                return Err(CodegenError::malformed(
                    &self.name,
                    "instruction list must start and end with a label",
                ))
            }
        }
        if self.params.len() > MAX_REG_ARGS {
            return Err(CodegenError::TooManyArgs {
                func: self.name.clone(),
                count: self.params.len(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(p) = self.params.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(CodegenError::malformed(
                &self.name,
                format!("parameter {} declared twice", p),
            ));
        }
        for inst in &self.code {
            if let Inst::Call { tgt, ind, args, .. } = inst {
                if args.len() > MAX_REG_ARGS {
                    return Err(CodegenError::TooManyArgs {
                        func: self.name.clone(),
                        count: args.len(),
                    });
                }
                if !*ind && matches!(tgt, CallTgt::Reg(_)) {
                    return Err(CodegenError::malformed(
                        &self.name,
                        format!("direct call through register: {}", inst),
                    ));
                }
            }
        }
        self.successors().map(|_| ())
    }

    /// Map from label name to the index of its declaration.
    pub fn label_map(&self) -> Result<HashMap<&str, usize>, CodegenError> {
        let mut labels = HashMap::new();
        for (i, inst) in self.code.iter().enumerate() {
            if let Inst::LabelDec { name } = inst {
                if labels.insert(name.as_str(), i).is_some() {
                    return Err(CodegenError::DuplicateLabel {
                        func: self.name.clone(),
                        label: name.clone(),
                    });
                }
            }
        }
        Ok(labels)
    }

    /// Successor indices for each instruction. The trailing label has none.
    pub fn successors(&self) -> Result<Vec<Succs>, CodegenError> {
        let labels = self.label_map()?;
        let target = |lab: &String| {
            labels
                .get(lab.as_str())
                .copied()
                .ok_or_else(|| CodegenError::UndeclaredLabel {
                    func: self.name.clone(),
                    label: lab.clone(),
                })
        };

        let n = self.code.len();
        let mut succs: Vec<Succs> = Vec::with_capacity(n);
        for (i, inst) in self.code.iter().enumerate() {
            if i + 1 == n {
                succs.push(SmallVec::new());
                break;
            }
            let s: Succs = match inst {
                Inst::CJump { lab, .. } => smallvec![target(lab)?, i + 1],
                Inst::Jump { lab } => smallvec![target(lab)?],
                Inst::Return { .. } => SmallVec::new(),
                _ => smallvec![i + 1],
            };
            succs.push(s);
        }
        Ok(succs)
    }

    /// Registers used by each instruction.
    pub fn used(&self) -> Vec<BTreeSet<Reg>> {
        self.code.iter().map(Inst::used).collect()
    }

    /// Registers defined by each instruction; parameters count as defined
    /// by the opening label.
    pub fn defined(&self) -> Vec<BTreeSet<Reg>> {
        let mut defined: Vec<BTreeSet<Reg>> = self.code.iter().map(Inst::defined).collect();
        if let Some(top) = defined.first_mut() {
            top.extend(self.params.iter().map(|p| Reg::id(p)));
        }
        defined
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.signature())?;
        if !self.locals.is_empty() {
            writeln!(f, "({})", self.locals.join(", "))?;
        }
        writeln!(f, "{{")?;
        for inst in &self.code {
            if inst.is_label() {
                writeln!(f, "{}", inst)?;
            } else {
                writeln!(f, " {}", inst)?;
            }
        }
        writeln!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Per-function construction context. Temporary and label numbering start
/// over for every builder, so nothing leaks between functions.
pub struct FuncBuilder {
    name: String,
    params: Vec<String>,
    locals: Vec<String>,
    code: Vec<Inst>,
    temp_count: u32,
    label_count: u32,
}

impl FuncBuilder {
    pub fn new(name: &str, params: &[&str]) -> Self {
        FuncBuilder {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            locals: Vec::new(),
            code: Vec::new(),
            temp_count: 0,
            label_count: 0,
        }
    }

    /// Declare a local variable and return its register.
    pub fn local(&mut self, name: &str) -> Reg {
        self.locals.push(name.to_string());
        Reg::id(name)
    }

    /// A fresh temporary: t1, t2, ...
    pub fn temp(&mut self) -> Reg {
        self.temp_count += 1;
        Reg::Temp(self.temp_count)
    }

    /// A fresh label name: L0, L1, ...
    pub fn new_label(&mut self) -> String {
        let l = format!("L{}", self.label_count);
        self.label_count += 1;
        l
    }

    pub fn push(&mut self, inst: Inst) -> &mut Self {
        self.code.push(inst);
        self
    }

    pub fn label(&mut self, name: &str) -> &mut Self {
        self.push(Inst::label(name))
    }

    pub fn binop(
        &mut self,
        op: BinOp,
        dst: &Reg,
        src1: impl Into<Src>,
        src2: impl Into<Src>,
    ) -> &mut Self {
        self.push(Inst::Binop {
            op,
            dst: dst.clone(),
            src1: src1.into(),
            src2: src2.into(),
        })
    }

    pub fn mov(&mut self, dst: &Reg, src: impl Into<Src>) -> &mut Self {
        self.push(Inst::Move {
            dst: dst.clone(),
            src: src.into(),
        })
    }

    pub fn call(&mut self, callee: &str, args: Vec<Src>, rdst: Option<&Reg>) -> &mut Self {
        self.push(Inst::Call {
            tgt: CallTgt::Global(callee.to_string()),
            ind: false,
            args,
            rdst: rdst.cloned(),
        })
    }

    pub fn cjump(
        &mut self,
        op: RelOp,
        src1: impl Into<Src>,
        src2: impl Into<Src>,
        lab: &str,
    ) -> &mut Self {
        self.push(Inst::CJump {
            op,
            src1: src1.into(),
            src2: src2.into(),
            lab: lab.to_string(),
        })
    }

    pub fn jump(&mut self, lab: &str) -> &mut Self {
        self.push(Inst::Jump {
            lab: lab.to_string(),
        })
    }

    pub fn ret(&mut self, val: Option<Src>) -> &mut Self {
        self.push(Inst::Return { val })
    }

    /// Close the function, adding the opening/closing labels if missing.
    pub fn finish(mut self) -> Func {
        if !self.code.first().is_some_and(Inst::is_label) {
            let l = self.new_label();
            self.code.insert(0, Inst::label(&l));
        }
        if !self.code.last().is_some_and(Inst::is_label) {
            let l = self.new_label();
            self.code.push(Inst::label(&l));
        }
        Func {
            name: self.name,
            params: self.params,
            locals: self.locals,
            code: self.code,
        }
    }
}
