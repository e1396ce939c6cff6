//! Three-address intermediate representation.
//!
//! A [`Function`] is an ordered sequence of [`Opcode`]s over a flat variable
//! table. Every opcode carries three operand slots: a *target* and two
//! *primaries*. Which slots an opcode actually reads or writes is a property
//! of its [`OpKind`] and is what the lifetime analyzer keys on.
//!
//! Jump targets are instruction indices into the containing function, not a
//! separate label space. The conditional variants of GOTO and COMPARE share
//! their comparison payload; the `Always` comparison doubles as the
//! unconditional base form.

/// Scalar type tags for values flowing through the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    U64,
    I64,
    U32,
    I32,
    U16,
    I16,
    U8,
    I8,
    F64,
    F32,
    Struct,
}

/// Type descriptor attached to variables, arguments and return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub kind: TypeKind,
    /// Element type for aggregates; unused for scalars.
    pub sub_type: u16,
    /// Size in bytes when `kind` is [`TypeKind::Struct`].
    pub struct_size: usize,
}

impl TypeInfo {
    pub const fn scalar(kind: TypeKind) -> Self {
        Self {
            kind,
            sub_type: 0,
            struct_size: 0,
        }
    }
}

/// A typed immediate value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    U64(u64),
    I64(i64),
    U32(u32),
    I32(i32),
    U16(u16),
    I16(i16),
    U8(u8),
    I8(i8),
    F64(f64),
    F32(f32),
}

/// Modifier flags on an operand reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperandFlags(u16);

impl OperandFlags {
    /// The operand's address is taken rather than its value.
    pub const ADDRESS: OperandFlags = OperandFlags(1 << 0);
    /// The operand is read or written through a pointer.
    pub const DEREFERENCE: OperandFlags = OperandFlags(1 << 1);

    pub const fn empty() -> Self {
        OperandFlags(0)
    }

    pub const fn contains(self, other: OperandFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for OperandFlags {
    type Output = OperandFlags;

    fn bitor(self, rhs: OperandFlags) -> OperandFlags {
        OperandFlags(self.0 | rhs.0)
    }
}

/// What an operand refers to.
///
/// Reference payloads index into the owning function's variable, argument,
/// constant and function tables respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandKind {
    Immediate(Immediate),
    Variable(usize),
    Argument(usize),
    Constant(usize),
    Function(usize),
}

/// One operand slot of an [`Opcode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub flags: OperandFlags,
}

impl Operand {
    /// Placeholder for operand slots an opcode does not use.
    pub const NONE: Operand = Operand {
        kind: OperandKind::Immediate(Immediate::U64(0)),
        flags: OperandFlags::empty(),
    };

    pub const fn immediate(value: Immediate) -> Self {
        Operand {
            kind: OperandKind::Immediate(value),
            flags: OperandFlags::empty(),
        }
    }

    pub const fn variable(id: usize) -> Self {
        Operand {
            kind: OperandKind::Variable(id),
            flags: OperandFlags::empty(),
        }
    }

    pub const fn argument(id: usize) -> Self {
        Operand {
            kind: OperandKind::Argument(id),
            flags: OperandFlags::empty(),
        }
    }

    pub const fn constant(id: usize) -> Self {
        Operand {
            kind: OperandKind::Constant(id),
            flags: OperandFlags::empty(),
        }
    }

    pub const fn function(id: usize) -> Self {
        Operand {
            kind: OperandKind::Function(id),
            flags: OperandFlags::empty(),
        }
    }

    /// Marks this operand as an address-of reference.
    pub const fn taking_address(mut self) -> Self {
        self.flags = OperandFlags(self.flags.0 | OperandFlags::ADDRESS.0);
        self
    }

    /// Variable table index if this operand refers to a variable.
    pub const fn var_id(&self) -> Option<usize> {
        match self.kind {
            OperandKind::Variable(id) => Some(id),
            _ => None,
        }
    }
}

/// Comparison selector shared by the conditional GOTO and COMPARE families.
///
/// `Always` is the unconditional base form of both families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Always,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

/// Operation selector for an [`Opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Nop,
    Copy,
    Add,
    Sub,
    Mul,
    Div,
    Not,
    Or,
    And,
    BitNeg,
    BitOr,
    BitAnd,
    BitXor,
    ShiftLeft,
    ShiftRightLogical,
    ShiftRightArithmetic,
    Goto(Comparison),
    Compare(Comparison),
    SetArgument,
    Call,
    Return,
}

impl OpKind {
    /// True for the GOTO family, conditional or not.
    pub const fn is_jump(self) -> bool {
        matches!(self, OpKind::Goto(_))
    }

    /// True when the opcode overwrites its target without reading it first.
    pub const fn is_pure_assignment(self) -> bool {
        matches!(self, OpKind::Copy | OpKind::Call)
    }

    /// True when the opcode writes through its target slot at all.
    pub const fn modifies_target(self) -> bool {
        matches!(
            self,
            OpKind::Copy
                | OpKind::Add
                | OpKind::Sub
                | OpKind::Mul
                | OpKind::Div
                | OpKind::Not
                | OpKind::Or
                | OpKind::And
                | OpKind::BitNeg
                | OpKind::BitOr
                | OpKind::BitAnd
                | OpKind::BitXor
                | OpKind::ShiftLeft
                | OpKind::ShiftRightLogical
                | OpKind::ShiftRightArithmetic
                | OpKind::Compare(_)
                | OpKind::Call
        )
    }

    /// Whether the first primary operand is read.
    ///
    /// Only NOP and the unconditional base forms of GOTO and COMPARE leave
    /// it untouched; every conditional variant reads its left-hand side.
    pub const fn reads_primary_1(self) -> bool {
        !matches!(
            self,
            OpKind::Nop | OpKind::Goto(Comparison::Always) | OpKind::Compare(Comparison::Always)
        )
    }

    /// Whether the second primary operand is read.
    pub const fn reads_primary_2(self) -> bool {
        self.reads_primary_1()
            && !matches!(
                self,
                OpKind::Return
                    | OpKind::Call
                    | OpKind::SetArgument
                    | OpKind::BitNeg
                    | OpKind::Not
                    | OpKind::Copy
            )
    }
}

/// A single three-address instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opcode {
    pub kind: OpKind,
    pub target: Operand,
    pub primary: [Operand; 2],
}

impl Opcode {
    pub const fn nop() -> Self {
        Opcode {
            kind: OpKind::Nop,
            target: Operand::NONE,
            primary: [Operand::NONE; 2],
        }
    }

    pub const fn copy(target: Operand, source: Operand) -> Self {
        Opcode {
            kind: OpKind::Copy,
            target,
            primary: [source, Operand::NONE],
        }
    }

    /// Builds a two-operand arithmetic, bitwise or shift opcode.
    pub const fn binary(kind: OpKind, target: Operand, lhs: Operand, rhs: Operand) -> Self {
        Opcode {
            kind,
            target,
            primary: [lhs, rhs],
        }
    }

    /// Builds a NOT or BIT_NEG opcode.
    pub const fn unary(kind: OpKind, target: Operand, operand: Operand) -> Self {
        Opcode {
            kind,
            target,
            primary: [operand, Operand::NONE],
        }
    }

    /// Unconditional jump to the instruction at `target_index`.
    pub const fn goto(target_index: usize) -> Self {
        Opcode {
            kind: OpKind::Goto(Comparison::Always),
            target: Operand::immediate(Immediate::U64(target_index as u64)),
            primary: [Operand::NONE; 2],
        }
    }

    /// Jump to `target_index` when `lhs cmp rhs` holds.
    pub const fn goto_if(cmp: Comparison, target_index: usize, lhs: Operand, rhs: Operand) -> Self {
        Opcode {
            kind: OpKind::Goto(cmp),
            target: Operand::immediate(Immediate::U64(target_index as u64)),
            primary: [lhs, rhs],
        }
    }

    /// Materialize the result of `lhs cmp rhs` into `target`.
    pub const fn compare(cmp: Comparison, target: Operand, lhs: Operand, rhs: Operand) -> Self {
        Opcode {
            kind: OpKind::Compare(cmp),
            target,
            primary: [lhs, rhs],
        }
    }

    /// Stage `value` as outgoing call argument number `slot`.
    pub const fn set_argument(slot: usize, value: Operand) -> Self {
        Opcode {
            kind: OpKind::SetArgument,
            target: Operand::immediate(Immediate::U64(slot as u64)),
            primary: [value, Operand::NONE],
        }
    }

    /// Call `callee`, storing the result in `target`.
    pub const fn call(target: Operand, callee: Operand) -> Self {
        Opcode {
            kind: OpKind::Call,
            target,
            primary: [callee, Operand::NONE],
        }
    }

    pub const fn ret(value: Operand) -> Self {
        Opcode {
            kind: OpKind::Return,
            target: Operand::NONE,
            primary: [value, Operand::NONE],
        }
    }

    pub const fn ret_void() -> Self {
        Opcode {
            kind: OpKind::Return,
            target: Operand::NONE,
            primary: [Operand::NONE; 2],
        }
    }

    /// Jump destination for GOTO opcodes.
    ///
    /// The destination is an instruction index carried in the target slot.
    pub const fn branch_target(&self) -> Option<usize> {
        if !self.kind.is_jump() {
            return None;
        }
        match self.target.kind {
            OperandKind::Immediate(Immediate::U64(index)) => Some(index as usize),
            _ => None,
        }
    }

    /// All three operand slots, target first.
    pub const fn operands(&self) -> [&Operand; 3] {
        [&self.target, &self.primary[0], &self.primary[1]]
    }
}

/// A declared local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub type_info: TypeInfo,
}

/// A function body: opcode sequence plus the tables its operands index into.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub id: usize,
    pub arguments: Vec<TypeInfo>,
    pub return_type: TypeInfo,
    pub opcodes: Vec<Opcode>,
    pub variables: Vec<Variable>,
}

impl Function {
    pub fn new(id: usize, return_type: TypeInfo) -> Self {
        Function {
            id,
            arguments: Vec::new(),
            return_type,
            opcodes: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub fn add_argument(&mut self, type_info: TypeInfo) -> usize {
        self.arguments.push(type_info);
        self.arguments.len() - 1
    }

    /// Declares a variable and returns its table index.
    pub fn add_variable(&mut self, type_info: TypeInfo) -> usize {
        self.variables.push(Variable { type_info });
        self.variables.len() - 1
    }

    /// Appends an opcode and returns its instruction index.
    pub fn push(&mut self, opcode: Opcode) -> usize {
        self.opcodes.push(opcode);
        self.opcodes.len() - 1
    }
}
