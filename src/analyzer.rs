//! Variable lifetime analysis over [`Function`] bodies.
//!
//! For every variable the analyzer computes the half-open instruction range
//! over which it is live, conservatively widened so that a backward jump
//! into the range keeps the variable alive through the jump itself.
//!
//! Lifetimes are found in a simple first-use/last-use scan; what makes the
//! scan sound in the presence of control flow is the closure step in
//! [`extend_lifetime`]: whenever a use lands past the known range end, the
//! jump targets inside the range are walked and any jump source beyond the
//! current end pulls the range out to cover it, repeating until no farther
//! source appears. Jumps entirely before the range are ignored; the only
//! initialization tracking is the trivial read-before-write case, which
//! pins the variable as uninitialized and alive for the whole function.
//!
//! Taking a variable's address also makes it live for the whole function,
//! since uses through the pointer are invisible to the scan.

use crate::ir::{Function, OperandFlags};
use thiserror::Error;

/// Rejections raised when a function fails its well-formedness check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalyzeError {
    #[error("opcode {index}: jump target {target} outside function of {len} opcodes")]
    JumpOutOfRange {
        index: usize,
        target: usize,
        len: usize,
    },
    #[error("opcode {index}: jump carries no instruction index in its target slot")]
    MalformedJump { index: usize },
    #[error("opcode {index}: variable reference {variable} out of range ({count} declared)")]
    VariableOutOfRange {
        index: usize,
        variable: usize,
        count: usize,
    },
}

/// Per-instruction control flow facts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Nearest earlier instruction that is a jump target, forming a linked
    /// list of jump targets back to the start of the function.
    pub previous_label: Option<usize>,
    /// Latest instruction that jumps here.
    pub jump_from: Option<usize>,
}

/// Flags accumulated on a variable during analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarFlags(u8);

impl VarFlags {
    /// Reserved for later passes that delete dead variables.
    pub const PRUNED: VarFlags = VarFlags(1 << 0);
    /// The latest assignment has not been read back yet.
    pub const UNUSED: VarFlags = VarFlags(1 << 1);
    /// Live across the whole function; the numeric range is meaningless.
    pub const ETERNAL: VarFlags = VarFlags(1 << 2);
    /// Read before any assignment. Implies [`VarFlags::ETERNAL`].
    pub const UNINITIALIZED: VarFlags = VarFlags(1 << 3);

    pub const fn empty() -> Self {
        VarFlags(0)
    }

    pub const fn contains(self, other: VarFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn insert(&mut self, other: VarFlags) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: VarFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for VarFlags {
    type Output = VarFlags;

    fn bitor(self, rhs: VarFlags) -> VarFlags {
        VarFlags(self.0 | rhs.0)
    }
}

/// Half-open instruction index range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub start: usize,
    pub end: usize,
}

/// Analysis result for a single variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableInfo {
    /// `None` until the variable is first referenced.
    pub lifetime: Option<Lifetime>,
    pub flags: VarFlags,
}

impl VariableInfo {
    pub const fn is_eternal(&self) -> bool {
        self.flags.contains(VarFlags::ETERNAL)
    }

    /// Effective live range given the function's opcode count.
    ///
    /// Eternal variables span the whole function regardless of the range
    /// the scan recorded.
    pub fn live_range(&self, opcode_count: usize) -> Option<Lifetime> {
        if self.is_eternal() {
            Some(Lifetime {
                start: 0,
                end: opcode_count,
            })
        } else {
            self.lifetime
        }
    }
}

/// Control flow and lifetime facts for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAnalysis {
    /// One entry per opcode.
    pub opcodes: Vec<OpcodeInfo>,
    /// One entry per declared variable.
    pub variables: Vec<VariableInfo>,
}

impl FunctionAnalysis {
    /// Analyzes `func` without modifying it.
    ///
    /// Runs three passes: jump-source discovery (right to left, so the
    /// highest-index source of each target wins), the previous-label chain,
    /// and the lifetime scan.
    pub fn analyze(func: &Function) -> Result<FunctionAnalysis, AnalyzeError> {
        validate(func)?;

        let mut infos = vec![OpcodeInfo::default(); func.opcodes.len()];
        for (index, op) in func.opcodes.iter().enumerate().rev() {
            if !op.kind.is_jump() {
                continue;
            }
            let Some(target) = op.branch_target() else {
                continue;
            };
            if infos[target].jump_from.is_none() {
                infos[target].jump_from = Some(index);
            }
        }

        let mut previous_label = None;
        for (index, info) in infos.iter_mut().enumerate() {
            info.previous_label = previous_label;
            if info.jump_from.is_some() {
                previous_label = Some(index);
            }
        }

        let mut variables = vec![VariableInfo::default(); func.variables.len()];
        for (index, op) in func.opcodes.iter().enumerate() {
            let pure_assignment = op.kind.is_pure_assignment();
            if let Some(var) = op.target.var_id() {
                if pure_assignment || op.kind.modifies_target() {
                    extend_lifetime(&infos, &mut variables[var], index, pure_assignment);
                }
            }

            let reads = [op.kind.reads_primary_1(), op.kind.reads_primary_2()];
            for (operand, read) in op.primary.iter().zip(reads) {
                let Some(var) = operand.var_id() else {
                    continue;
                };
                if operand.flags.contains(OperandFlags::ADDRESS) {
                    variables[var].flags.insert(VarFlags::ETERNAL);
                } else if read {
                    extend_lifetime(&infos, &mut variables[var], index, false);
                }
            }
        }

        log::debug!(
            "function {}: {} opcodes, {} variables analyzed",
            func.id,
            func.opcodes.len(),
            func.variables.len()
        );
        Ok(FunctionAnalysis {
            opcodes: infos,
            variables,
        })
    }
}

/// Well-formedness check: jump targets and variable references in range.
fn validate(func: &Function) -> Result<(), AnalyzeError> {
    let len = func.opcodes.len();
    let count = func.variables.len();
    for (index, op) in func.opcodes.iter().enumerate() {
        if op.kind.is_jump() {
            match op.branch_target() {
                Some(target) if target < len => {}
                Some(target) => return Err(AnalyzeError::JumpOutOfRange { index, target, len }),
                None => return Err(AnalyzeError::MalformedJump { index }),
            }
        }
        for operand in op.operands() {
            if let Some(variable) = operand.var_id() {
                if variable >= count {
                    return Err(AnalyzeError::VariableOutOfRange {
                        index,
                        variable,
                        count,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Widens `var`'s lifetime to cover a reference at `index`.
///
/// A first reference decides the variable's fate: a pure assignment opens
/// the range, while a read marks it uninitialized and eternal. Later
/// references run the backward-jump closure: starting from `index`, every
/// jump target inside the live range is inspected (via the previous-label
/// chain) and the farthest jump source found becomes the new range end,
/// repeating while that end keeps moving.
fn extend_lifetime(
    infos: &[OpcodeInfo],
    var: &mut VariableInfo,
    index: usize,
    pure_assignment: bool,
) {
    if var.flags.contains(VarFlags::ETERNAL) || var.flags.contains(VarFlags::UNINITIALIZED) {
        return;
    }

    let Some(lifetime) = var.lifetime else {
        if pure_assignment {
            var.lifetime = Some(Lifetime {
                start: index,
                end: index + 1,
            });
            var.flags.insert(VarFlags::UNUSED);
        } else {
            var.flags.insert(VarFlags::ETERNAL | VarFlags::UNINITIALIZED);
        }
        return;
    };

    // Already covered; an interior reference changes nothing.
    if lifetime.end > index {
        return;
    }

    if pure_assignment {
        var.flags.insert(VarFlags::UNUSED);
    } else {
        var.flags.remove(VarFlags::UNUSED);
    }

    let mut minimum = lifetime.end.max(lifetime.start);
    let mut max_jmp_pos = index;
    let maximum = loop {
        let maximum = max_jmp_pos + 1;
        let mut pos = max_jmp_pos;
        while pos >= minimum {
            if let Some(source) = infos[pos].jump_from {
                if source > max_jmp_pos {
                    max_jmp_pos = source;
                }
            }
            match infos[pos].previous_label {
                Some(prev) => pos = prev,
                None => break,
            }
        }
        minimum = maximum;
        // A farther jump source may itself be jumped into from farther
        // still, so rescan until the end settles.
        if max_jmp_pos < maximum {
            break maximum;
        }
    };

    var.lifetime = Some(Lifetime {
        start: lifetime.start,
        end: maximum,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Comparison, Immediate, OpKind, Opcode, Operand, TypeInfo, TypeKind};

    fn i64_ty() -> TypeInfo {
        TypeInfo::scalar(TypeKind::I64)
    }

    fn imm(value: i64) -> Operand {
        Operand::immediate(Immediate::I64(value))
    }

    /// Counting loop:
    /// ```text
    /// 0: v0 = 0
    /// 1: v1 = 1
    /// 2: v0 = v0 + v1
    /// 3: goto 5 if v0 == 10
    /// 4: goto 2
    /// 5: return v0
    /// ```
    fn counting_loop() -> Function {
        let mut func = Function::new(0, i64_ty());
        let v0 = func.add_variable(i64_ty());
        let v1 = func.add_variable(i64_ty());
        func.push(Opcode::copy(Operand::variable(v0), imm(0)));
        func.push(Opcode::copy(Operand::variable(v1), imm(1)));
        func.push(Opcode::binary(
            OpKind::Add,
            Operand::variable(v0),
            Operand::variable(v0),
            Operand::variable(v1),
        ));
        func.push(Opcode::goto_if(
            Comparison::Equal,
            5,
            Operand::variable(v0),
            imm(10),
        ));
        func.push(Opcode::goto(2));
        func.push(Opcode::ret(Operand::variable(v0)));
        func
    }

    #[test]
    fn jump_sources_and_label_chain() {
        let func = counting_loop();
        let analysis = FunctionAnalysis::analyze(&func).unwrap();

        let jump_from: Vec<_> = analysis.opcodes.iter().map(|i| i.jump_from).collect();
        assert_eq!(jump_from, [None, None, Some(4), None, None, Some(3)]);

        let previous: Vec<_> = analysis.opcodes.iter().map(|i| i.previous_label).collect();
        assert_eq!(previous, [None, None, None, Some(2), Some(2), Some(2)]);
    }

    #[test]
    fn loop_lifetimes_cover_backward_jump() {
        let func = counting_loop();
        let analysis = FunctionAnalysis::analyze(&func).unwrap();

        let v0 = analysis.variables[0];
        let v1 = analysis.variables[1];
        assert_eq!(v0.lifetime, Some(Lifetime { start: 0, end: 6 }));
        assert_eq!(v1.lifetime, Some(Lifetime { start: 1, end: 5 }));
        assert!(!v0.is_eternal());
        assert!(!v1.is_eternal());
        assert!(!v0.flags.contains(VarFlags::UNUSED));
        assert!(!v1.flags.contains(VarFlags::UNUSED));
    }

    #[test]
    fn analysis_does_not_modify_the_function() {
        let func = counting_loop();
        let snapshot = func.clone();
        FunctionAnalysis::analyze(&func).unwrap();
        assert_eq!(func, snapshot);
    }

    #[test]
    fn chained_backward_jumps_close_transitively() {
        // 0: v0 = 1
        // 1: v0 = v0 + v0
        // 2: nop
        // 3: goto 1
        // 4: nop
        // 5: goto 3
        // 6: return v0
        let mut func = Function::new(1, i64_ty());
        let v0 = func.add_variable(i64_ty());
        func.push(Opcode::copy(Operand::variable(v0), imm(1)));
        func.push(Opcode::binary(
            OpKind::Add,
            Operand::variable(v0),
            Operand::variable(v0),
            Operand::variable(v0),
        ));
        func.push(Opcode::nop());
        func.push(Opcode::goto(1));
        func.push(Opcode::nop());
        func.push(Opcode::goto(3));
        func.push(Opcode::ret(Operand::variable(v0)));

        let analysis = FunctionAnalysis::analyze(&func).unwrap();
        // The jump at 3 pulls the range to 4, and the jump at 5 targeting
        // 3 pulls it further; the return then closes over the whole body.
        assert_eq!(
            analysis.variables[v0].lifetime,
            Some(Lifetime { start: 0, end: 7 })
        );
    }

    #[test]
    fn address_taken_variable_is_eternal() {
        let mut func = Function::new(2, i64_ty());
        let v0 = func.add_variable(i64_ty());
        let v1 = func.add_variable(i64_ty());
        func.push(Opcode::copy(Operand::variable(v0), imm(7)));
        func.push(Opcode::copy(Operand::variable(v1), imm(0)));
        func.push(Opcode::nop());
        func.push(Opcode::copy(
            Operand::variable(v1),
            Operand::variable(v0).taking_address(),
        ));
        func.push(Opcode::ret_void());

        let analysis = FunctionAnalysis::analyze(&func).unwrap();
        assert!(analysis.variables[v0].is_eternal());
        assert_eq!(
            analysis.variables[v0].live_range(func.opcodes.len()),
            Some(Lifetime { start: 0, end: 5 })
        );
        assert!(!analysis.variables[v1].is_eternal());
    }

    #[test]
    fn read_before_write_is_uninitialized_and_eternal() {
        let mut func = Function::new(3, i64_ty());
        let v0 = func.add_variable(i64_ty());
        let v1 = func.add_variable(i64_ty());
        func.push(Opcode::binary(
            OpKind::Add,
            Operand::variable(v0),
            Operand::variable(v1),
            imm(1),
        ));
        func.push(Opcode::ret(Operand::variable(v0)));

        let analysis = FunctionAnalysis::analyze(&func).unwrap();
        // v1 is read without ever being assigned.
        assert!(analysis.variables[v1]
            .flags
            .contains(VarFlags::ETERNAL | VarFlags::UNINITIALIZED));
        // v0's first reference is ADD's read-modify-write of its target.
        assert!(analysis.variables[v0]
            .flags
            .contains(VarFlags::ETERNAL | VarFlags::UNINITIALIZED));
    }

    #[test]
    fn write_only_variable_stays_unused() {
        let mut func = Function::new(4, i64_ty());
        let v0 = func.add_variable(i64_ty());
        func.push(Opcode::copy(Operand::variable(v0), imm(3)));
        func.push(Opcode::ret_void());

        let analysis = FunctionAnalysis::analyze(&func).unwrap();
        let info = analysis.variables[v0];
        assert!(info.flags.contains(VarFlags::UNUSED));
        assert_eq!(info.lifetime, Some(Lifetime { start: 0, end: 1 }));
    }

    #[test]
    fn base_comparison_forms_read_nothing() {
        let mut func = Function::new(5, i64_ty());
        let v0 = func.add_variable(i64_ty());
        // The always-form of COMPARE writes its target but reads neither
        // primary, so v0 in a primary slot stays untouched.
        let v1 = func.add_variable(i64_ty());
        func.push(Opcode::copy(Operand::variable(v1), imm(0)));
        func.push(Opcode::compare(
            Comparison::Always,
            Operand::variable(v1),
            Operand::variable(v0),
            Operand::NONE,
        ));
        func.push(Opcode::ret_void());

        let analysis = FunctionAnalysis::analyze(&func).unwrap();
        assert_eq!(analysis.variables[v0].lifetime, None);
        assert!(!analysis.variables[v0].is_eternal());
        // Whereas a conditional variant does read, and the read of an
        // unassigned variable flags it.
        let mut cond = Function::new(6, i64_ty());
        let w0 = cond.add_variable(i64_ty());
        let w1 = cond.add_variable(i64_ty());
        cond.push(Opcode::copy(Operand::variable(w1), imm(0)));
        cond.push(Opcode::compare(
            Comparison::Equal,
            Operand::variable(w1),
            Operand::variable(w0),
            imm(0),
        ));
        cond.push(Opcode::ret_void());
        let analysis = FunctionAnalysis::analyze(&cond).unwrap();
        assert!(analysis.variables[w0].flags.contains(VarFlags::UNINITIALIZED));
    }

    #[test]
    fn jump_targets_are_validated() {
        let mut func = Function::new(7, i64_ty());
        func.push(Opcode::goto(9));
        assert_eq!(
            FunctionAnalysis::analyze(&func),
            Err(AnalyzeError::JumpOutOfRange {
                index: 0,
                target: 9,
                len: 1
            })
        );
    }

    #[test]
    fn variable_references_are_validated() {
        let mut func = Function::new(8, i64_ty());
        func.push(Opcode::copy(Operand::variable(3), imm(0)));
        assert_eq!(
            FunctionAnalysis::analyze(&func),
            Err(AnalyzeError::VariableOutOfRange {
                index: 0,
                variable: 3,
                count: 0
            })
        );
    }
}
