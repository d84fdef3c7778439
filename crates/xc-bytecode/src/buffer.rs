use crate::{validate_method, BytecodeError, Label, LabelKind, MethodCode, Op, Register};
use std::collections::{HashMap, HashSet};

/// Append-only op sequence for one method body.
///
/// After a terminal op (jump or return) the buffer is unreachable and further ops are
/// dropped until a label that some emitted jump targets is placed.
#[derive(Debug)]
pub struct CodeBuffer {
    ops: Vec<Op>,
    labels: HashMap<Label, usize>,
    referenced: HashSet<Label>,
    next_register: u32,
    next_local: u32,
    reachable: bool,
    dropped: usize,
}

impl Default for CodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            labels: HashMap::new(),
            referenced: HashSet::new(),
            next_register: 0,
            next_local: 0,
            reachable: true,
            dropped: 0,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Ops discarded because they were appended on an unreachable path.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Append `op`. Returns false when the op was dropped as unreachable.
    pub fn add(&mut self, op: Op) -> bool {
        if !self.reachable {
            tracing::trace!("dropping unreachable {}", op.mnemonic());
            self.dropped += 1;
            return false;
        }
        if let Some(target) = op.target() {
            self.referenced.insert(target);
        }
        self.reachable = !op.is_terminal();
        self.ops.push(op);
        true
    }

    /// Bind `label` to the next op offset. The label may be the target of a jump emitted later
    /// (a loop entry), so the buffer becomes reachable again.
    pub fn place(&mut self, label: Label) -> Result<(), BytecodeError> {
        self.bind(label)?;
        self.reachable = true;
        Ok(())
    }

    /// Bind a forward join point. Control arrives only by falling through or by a jump already
    /// emitted, so an unreferenced label leaves an unreachable buffer unreachable.
    pub fn place_join(&mut self, label: Label) -> Result<(), BytecodeError> {
        self.bind(label)?;
        self.reachable |= self.referenced.contains(&label);
        Ok(())
    }

    fn bind(&mut self, label: Label) -> Result<(), BytecodeError> {
        if let Some(existing) = self.labels.insert(label, self.ops.len()) {
            return Err(BytecodeError::Format {
                message: format!("label {} already placed at {}", label, existing),
            });
        }
        Ok(())
    }

    /// Whether an emitted (not dropped) jump targets `label`.
    pub fn is_referenced(&self, label: Label) -> bool {
        self.referenced.contains(&label)
    }

    pub fn is_placed(&self, label: Label) -> bool {
        self.labels.contains_key(&label)
    }

    /// Mark the current position as unreachable without appending anything.
    pub fn mark_unreachable(&mut self) {
        self.reachable = false;
    }

    pub fn new_register(&mut self) -> Register {
        let reg = Register(self.next_register);
        self.next_register += 1;
        reg
    }

    pub fn registers(&self) -> u32 {
        self.next_register
    }

    /// A fresh label private to this buffer.
    pub fn local_label(&mut self) -> Label {
        let label = Label::new(0, LabelKind::Local(self.next_local));
        self.next_local += 1;
        label
    }

    pub fn finish(self, name: impl Into<String>) -> Result<MethodCode, BytecodeError> {
        let mut labels: Vec<(Label, usize)> = self.labels.into_iter().collect();
        labels.sort_by_key(|(label, offset)| (*offset, *label));
        let code = MethodCode {
            name: name.into(),
            ops: self.ops,
            registers: self.next_register,
            labels,
        };
        validate_method(&code)?;
        Ok(code)
    }
}
