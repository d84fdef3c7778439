//! Register-based instruction stream produced by the emitter.

mod buffer;

pub use buffer::CodeBuffer;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use xc_core::ast::{BinaryOp, UnaryOp};
use xc_core::pool::{ConstId, ConstantPool};
use xc_core::pretty::{PrettyCtx, PrettyPrintable};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("r{_0}")]
pub struct Register(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Register(Register),
    Constant(ConstId),
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Register(reg)
    }
}

impl From<ConstId> for Operand {
    fn from(id: ConstId) -> Self {
        Operand::Constant(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelKind {
    /// Loop entry.
    Repeat,
    Continue,
    Break,
    Else,
    End,
    /// Condition check of a `for` loop.
    Test,
    Case(u32),
    /// Buffer-local helper label, e.g. for short-circuit skips.
    Local(u32),
}

/// A jump target: the owning statement's label scope plus the role of the label in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label {
    pub scope: u32,
    pub kind: LabelKind,
}

impl Label {
    pub fn new(scope: u32, kind: LabelKind) -> Self {
        Self { scope, kind }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            LabelKind::Case(index) => write!(f, "Case{}_{}", index, self.scope),
            LabelKind::Local(index) => write!(f, "L{}", index),
            kind => write!(f, "{:?}_{}", kind, self.scope),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Enter,
    Exit,
    Var { reg: Register, ty: ConstId },
    Move { from: Operand, to: Register },
    Jump(Label),
    JumpTrue { cond: Operand, target: Label },
    JumpFalse { cond: Operand, target: Label },
    JumpNull { value: Operand, target: Label },
    JumpEq { lhs: Operand, rhs: Operand, target: Label },
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
        to: Register,
    },
    Unary {
        op: UnaryOp,
        operand: Operand,
        to: Register,
    },
    MakeTuple { elements: Vec<Operand>, to: Register },
    Return(Vec<Operand>),
    Return0,
}

impl Op {
    pub fn target(&self) -> Option<Label> {
        match self {
            Op::Jump(target)
            | Op::JumpTrue { target, .. }
            | Op::JumpFalse { target, .. }
            | Op::JumpNull { target, .. }
            | Op::JumpEq { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Nothing after this op is reachable on the same path.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Op::Jump(_) | Op::Return(_) | Op::Return0)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Enter => "ENTER",
            Op::Exit => "EXIT",
            Op::Var { .. } => "VAR",
            Op::Move { .. } => "MOV",
            Op::Jump(_) => "JMP",
            Op::JumpTrue { .. } => "JMP_TRUE",
            Op::JumpFalse { .. } => "JMP_FALSE",
            Op::JumpNull { .. } => "JMP_NULL",
            Op::JumpEq { .. } => "JMP_EQ",
            Op::Binary { .. } => "BINOP",
            Op::Unary { .. } => "UNOP",
            Op::MakeTuple { .. } => "TUPLE",
            Op::Return(_) => "RETURN",
            Op::Return0 => "RETURN_0",
        }
    }
}

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("bytecode format error: {message}")]
    Format { message: String },
    #[error("bytecode encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<BytecodeError> for xc_core::Error {
    fn from(err: BytecodeError) -> Self {
        match err {
            BytecodeError::Format { message } => xc_core::Error::Invariant(message),
            BytecodeError::Encode(err) => xc_core::Error::from(err),
        }
    }
}

/// Finished body of one method, ready for an assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCode {
    pub name: String,
    pub ops: Vec<Op>,
    /// Register high-water mark.
    pub registers: u32,
    /// Placed labels with their op offsets, ordered by offset.
    pub labels: Vec<(Label, usize)>,
}

impl MethodCode {
    pub fn to_json(&self) -> Result<String, BytecodeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn label_offset(&self, label: Label) -> Option<usize> {
        self.labels
            .iter()
            .find(|(placed, _)| *placed == label)
            .map(|(_, offset)| *offset)
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    pub fn disassemble(&self, pool: &ConstantPool) -> String {
        xc_core::pretty::pretty(
            &MethodListing { code: self, pool },
            xc_core::pretty::PrettyOptions::default(),
        )
        .to_string()
    }
}

/// Every jump must target a placed label and every register must be below the high-water mark.
pub fn validate_method(code: &MethodCode) -> Result<(), BytecodeError> {
    let placed: HashSet<Label> = code.labels.iter().map(|(label, _)| *label).collect();
    for (index, op) in code.ops.iter().enumerate() {
        if let Some(target) = op.target() {
            if !placed.contains(&target) {
                return Err(BytecodeError::Format {
                    message: format!(
                        "{}: op {} jumps to unplaced label {}",
                        code.name, index, target
                    ),
                });
            }
        }
        for reg in op_registers(op) {
            if reg.0 >= code.registers {
                return Err(BytecodeError::Format {
                    message: format!(
                        "{}: op {} uses {} beyond {} registers",
                        code.name, index, reg, code.registers
                    ),
                });
            }
        }
    }
    for (label, offset) in &code.labels {
        if *offset > code.ops.len() {
            return Err(BytecodeError::Format {
                message: format!("{}: label {} placed past the end", code.name, label),
            });
        }
    }
    check_scopes(code)
}

/// Every path must reach an op with the same number of entered scopes and must not exit a
/// scope it never entered.
fn check_scopes(code: &MethodCode) -> Result<(), BytecodeError> {
    let offsets: HashMap<Label, usize> = code.labels.iter().copied().collect();
    let mut depths: Vec<Option<usize>> = vec![None; code.ops.len() + 1];
    let mut pending = vec![(0, 0)];
    while let Some((at, depth)) = pending.pop() {
        match depths[at] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                return Err(BytecodeError::Format {
                    message: format!(
                        "{}: op {} reached with {} and with {} open scope(s)",
                        code.name, at, seen, depth
                    ),
                })
            }
            None => depths[at] = Some(depth),
        }
        let Some(op) = code.ops.get(at) else {
            continue;
        };
        let next = match op {
            Op::Enter => depth + 1,
            Op::Exit => depth.checked_sub(1).ok_or_else(|| BytecodeError::Format {
                message: format!("{}: op {} exits a scope that was never entered", code.name, at),
            })?,
            _ => depth,
        };
        if let Some(offset) = op.target().and_then(|target| offsets.get(&target)) {
            pending.push((*offset, next));
        }
        if !op.is_terminal() {
            pending.push((at + 1, next));
        }
    }
    Ok(())
}

fn op_registers(op: &Op) -> Vec<Register> {
    let operand = |operand: &Operand| match operand {
        Operand::Register(reg) => Some(*reg),
        Operand::Constant(_) => None,
    };
    match op {
        Op::Var { reg, .. } => vec![*reg],
        Op::Move { from, to } => operand(from).into_iter().chain(Some(*to)).collect(),
        Op::JumpTrue { cond, .. } | Op::JumpFalse { cond, .. } => operand(cond).into_iter().collect(),
        Op::JumpNull { value, .. } => operand(value).into_iter().collect(),
        Op::JumpEq { lhs, rhs, .. } => operand(lhs).into_iter().chain(operand(rhs)).collect(),
        Op::Binary { lhs, rhs, to, .. } => operand(lhs)
            .into_iter()
            .chain(operand(rhs))
            .chain(Some(*to))
            .collect(),
        Op::Unary { operand: value, to, .. } => operand(value).into_iter().chain(Some(*to)).collect(),
        Op::MakeTuple { elements, to } => elements
            .iter()
            .filter_map(operand)
            .chain(Some(*to))
            .collect(),
        Op::Return(values) => values.iter().filter_map(operand).collect(),
        Op::Enter | Op::Exit | Op::Jump(_) | Op::Return0 => Vec::new(),
    }
}

/// Disassembly listing of a [`MethodCode`] with constants rendered through the pool.
pub struct MethodListing<'a> {
    pub code: &'a MethodCode,
    pub pool: &'a ConstantPool,
}

impl MethodListing<'_> {
    fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Register(reg) => reg.to_string(),
            Operand::Constant(id) => self.pool.describe(*id),
        }
    }

    fn format_op(&self, op: &Op) -> String {
        let mnemonic = op.mnemonic();
        match op {
            Op::Enter | Op::Exit | Op::Return0 => mnemonic.to_string(),
            Op::Var { reg, ty } => format!("{} {} {}", mnemonic, reg, self.pool.describe(*ty)),
            Op::Move { from, to } => format!("{} {} -> {}", mnemonic, self.operand(from), to),
            Op::Jump(target) => format!("{} {}", mnemonic, target),
            Op::JumpTrue { cond, target } | Op::JumpFalse { cond, target } => {
                format!("{} {} {}", mnemonic, self.operand(cond), target)
            }
            Op::JumpNull { value, target } => {
                format!("{} {} {}", mnemonic, self.operand(value), target)
            }
            Op::JumpEq { lhs, rhs, target } => format!(
                "{} {}, {} {}",
                mnemonic,
                self.operand(lhs),
                self.operand(rhs),
                target
            ),
            Op::Binary { op, lhs, rhs, to } => format!(
                "{} {} {} {} -> {}",
                mnemonic,
                self.operand(lhs),
                op,
                self.operand(rhs),
                to
            ),
            Op::Unary {
                op,
                operand: value,
                to,
            } => format!("{} {}{} -> {}", mnemonic, op, self.operand(value), to),
            Op::MakeTuple { elements, to } => format!(
                "{} ({}) -> {}",
                mnemonic,
                elements.iter().map(|e| self.operand(e)).join(", "),
                to
            ),
            Op::Return(values) => format!(
                "{} {}",
                mnemonic,
                values.iter().map(|v| self.operand(v)).join(", ")
            ),
        }
    }
}

impl PrettyPrintable for MethodListing<'_> {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(
            f,
            format!(
                "method {} (registers: {})",
                self.code.name, self.code.registers
            ),
        )?;
        ctx.with_indent(|ctx| {
            for offset in 0..=self.code.ops.len() {
                for (label, _) in self.code.labels.iter().filter(|(_, at)| *at == offset) {
                    ctx.writeln(f, format!("{}:", label))?;
                }
                if let Some(op) = self.code.ops.get(offset) {
                    ctx.with_indent(|ctx| {
                        ctx.writeln(f, format!("{}: {}", offset, self.format_op(op)))
                    })?;
                }
            }
            Ok(())
        })
    }
}
