//! Hand-rolled x86-64 instruction encoding.
//!
//! [`Encoder`] appends instruction bytes to a growable buffer and tracks
//! symbolic [`Label`]s together with the relocations that reference them.
//! Emitters never touch bytes written by earlier emitters; jumps leave a
//! zeroed displacement behind and record a relocation, and the whole buffer
//! is patched in one pass at link time.
//!
//! Only register-direct operand forms are supported. Every ModR/M emitter
//! produces `[prefix] REX opcode modrm` with `mod = 0b11`; the REX byte is
//! emitted even when all of its extension bits are clear, which is
//! redundant but valid and keeps instruction lengths independent of the
//! registers involved.
//!
//! Jumps and calls to labels always use the rel32 long forms, so every
//! relative relocation patches exactly four bytes.

use thiserror::Error;

/// Errors surfaced while resolving relocations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// A relocation names a label this encoder never created.
    #[error("relocation references unknown label {id}")]
    UnknownLabel { id: usize },
    /// A rel32 displacement does not fit in 32 bits.
    #[error("displacement from patch at {patch_offset:#x} to label offset {target:#x} exceeds 32 bits")]
    DisplacementOverflow { patch_offset: usize, target: usize },
    /// A relocation's placeholder bytes lie outside the code buffer.
    #[error("relocation patch {offset:#x}..{end:#x} lies outside the {len} byte buffer")]
    PatchOutOfBounds { offset: usize, end: usize, len: usize },
    /// `link_to` was handed a buffer smaller than the encoded code.
    #[error("destination buffer holds {len} bytes but {required} are required")]
    DestinationTooSmall { required: usize, len: usize },
}

/// General purpose register, identified by its 4-bit hardware index.
///
/// The index splits into a low 3-bit part that lands in ModR/M and a high
/// bit that lands in the REX prefix; [`Reg::low3`] and
/// [`Reg::needs_extension`] are the only places that split happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(u8);

impl Reg {
    pub const RAX: Reg = Reg(0);
    pub const RCX: Reg = Reg(1);
    pub const RDX: Reg = Reg(2);
    pub const RBX: Reg = Reg(3);
    pub const RSP: Reg = Reg(4);
    pub const RBP: Reg = Reg(5);
    pub const RSI: Reg = Reg(6);
    pub const RDI: Reg = Reg(7);
    pub const R8: Reg = Reg(8);
    pub const R9: Reg = Reg(9);
    pub const R10: Reg = Reg(10);
    pub const R11: Reg = Reg(11);
    pub const R12: Reg = Reg(12);
    pub const R13: Reg = Reg(13);
    pub const R14: Reg = Reg(14);
    pub const R15: Reg = Reg(15);

    /// Register for a raw hardware index in `0..16`.
    pub const fn from_index(index: u8) -> Option<Reg> {
        if index < 16 {
            Some(Reg(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// Low three bits, placed in a ModR/M field or added to a short opcode.
    const fn low3(self) -> u8 {
        self.0 & 0x07
    }

    /// High bit, placed in REX.B or REX.R depending on operand position.
    const fn needs_extension(self) -> bool {
        self.0 & 0x08 != 0
    }
}

/// x86 condition codes in hardware numbering, as used by `Jcc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    /// Overflow.
    O = 0,
    /// Not overflow.
    No = 1,
    /// Below (unsigned); also carry.
    B = 2,
    /// Above or equal (unsigned); also not carry.
    Ae = 3,
    /// Equal; also zero.
    E = 4,
    /// Not equal; also not zero.
    Ne = 5,
    /// Below or equal (unsigned).
    Be = 6,
    /// Above (unsigned).
    A = 7,
    /// Sign set.
    S = 8,
    /// Sign clear.
    Ns = 9,
    /// Parity even.
    P = 10,
    /// Parity odd.
    Np = 11,
    /// Less (signed).
    L = 12,
    /// Greater or equal (signed).
    Ge = 13,
    /// Less or equal (signed); also not greater.
    Le = 14,
    /// Greater (signed).
    G = 15,
}

/// Opcode bytes of the register-register ModR/M instruction family.
///
/// These are the `op r/m, r` forms; the 8-bit variant of each is the byte
/// immediately below it and is selected by [`Encoder::modrm8_rr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModrmOp {
    Add = 0x01,
    Or = 0x09,
    Adc = 0x11,
    Sbb = 0x19,
    And = 0x21,
    Sub = 0x29,
    Xor = 0x31,
    Cmp = 0x39,
    Mov = 0x89,
}

/// Opcode extension digits of the single-operand `F7 /digit` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MulDivOp {
    Mul = 4,
    Imul = 5,
    Div = 6,
    Idiv = 7,
}

/// Handle for a position in the encoded stream.
///
/// Labels are created at the current write position and may be moved to a
/// later position any number of times; the offset at link time wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// How a relocation resolves against its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// Four bytes receive `label_offset - (patch_offset + 4)` as an i32.
    Relative,
    /// Eight bytes receive `base + label_offset` as a u64.
    Absolute,
}

#[derive(Debug, Clone, Copy)]
struct Relocation {
    offset: usize,
    label: Label,
    kind: RelocKind,
}

impl RelocKind {
    const fn patch_width(self) -> usize {
        match self {
            RelocKind::Relative => 4,
            RelocKind::Absolute => 8,
        }
    }
}

const REX: u8 = 0x40;

/// REX prefix with the given B (r/m extension), R (reg extension) and
/// W (64-bit operand size) bits. The X bit stays clear; SIB addressing is
/// not supported.
const fn rex(b: bool, r: bool, w: bool) -> u8 {
    REX | b as u8 | ((r as u8) << 2) | ((w as u8) << 3)
}

/// Register-direct ModR/M byte: `mod = 0b11`.
const fn modrm(rm: u8, reg: u8) -> u8 {
    0xC0 | (reg << 3) | rm
}

const OPERAND_SIZE_OVERRIDE: u8 = 0x66;
const OPCODE_CALL_REL32: u8 = 0xE8;
const OPCODE_JMP_REL32: u8 = 0xE9;
const OPCODE_ESCAPE_0F: u8 = 0x0F;
const OPCODE_MOV_IMM_LONG: u8 = 0xB8;
const OPCODE_MOV_IMM_LOW: u8 = 0xB0;
const OPCODE_PUSH: u8 = 0x50;
const OPCODE_POP: u8 = 0x58;
const OPCODE_RET: u8 = 0xC3;
const OPCODE_NOP: u8 = 0x90;
const OPCODE_GROUP_FF: u8 = 0xFF;
const FF_DIGIT_CALL: u8 = 2;
const FF_DIGIT_JMP: u8 = 4;
const OPCODE_GROUP_F7: u8 = 0xF7;

/// In-memory x86-64 instruction encoder.
///
/// The byte buffer only ever grows; labels and relocations are resolved by
/// [`Encoder::apply_relocations`] (in place) or [`Encoder::link_to`]
/// (against a destination buffer, leaving the encoder untouched and
/// reusable).
#[derive(Debug, Default)]
pub struct Encoder {
    code: Vec<u8>,
    labels: Vec<usize>,
    relocations: Vec<Relocation>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded bytes so far, with relocation placeholders still zeroed
    /// unless [`Encoder::apply_relocations`] has run.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Creates a label at the current write position.
    pub fn add_label(&mut self) -> Label {
        let label = Label(self.labels.len());
        self.labels.push(self.code.len());
        label
    }

    /// Moves `label` to the current write position.
    pub fn move_label(&mut self, label: Label) {
        self.labels[label.0] = self.code.len();
    }

    /// Current offset of `label`, if it belongs to this encoder.
    pub fn label_offset(&self, label: Label) -> Option<usize> {
        self.labels.get(label.0).copied()
    }

    /// Records a relocation at the current write position.
    ///
    /// The caller is responsible for appending the placeholder bytes (four
    /// for [`RelocKind::Relative`], eight for [`RelocKind::Absolute`])
    /// immediately afterwards; the jump emitters do this themselves.
    pub fn add_relocation(&mut self, label: Label, kind: RelocKind) {
        self.relocations.push(Relocation {
            offset: self.code.len(),
            label,
            kind,
        });
    }

    fn emit_modrm(&mut self, opcode: u8, rm: Reg, reg_low3: u8, reg_ext: bool, wide: bool) {
        self.code.reserve(3);
        self.code.push(rex(rm.needs_extension(), reg_ext, wide));
        self.code.push(opcode);
        self.code.push(modrm(rm.low3(), reg_low3));
    }

    /// 64-bit `op rm, reg` (REX.W set).
    pub fn modrm_rr(&mut self, op: ModrmOp, rm: Reg, reg: Reg) {
        self.emit_modrm(op as u8, rm, reg.low3(), reg.needs_extension(), true);
    }

    /// 32-bit `op rm, reg`. REX is still emitted with W clear.
    pub fn modrm32_rr(&mut self, op: ModrmOp, rm: Reg, reg: Reg) {
        self.emit_modrm(op as u8, rm, reg.low3(), reg.needs_extension(), false);
    }

    /// 16-bit `op rm, reg`, selected by the operand-size override prefix.
    pub fn modrm16_rr(&mut self, op: ModrmOp, rm: Reg, reg: Reg) {
        self.code.reserve(4);
        self.code.push(OPERAND_SIZE_OVERRIDE);
        self.emit_modrm(op as u8, rm, reg.low3(), reg.needs_extension(), false);
    }

    /// 8-bit `op rm, reg`. The byte-sized opcode is one below the wide one.
    pub fn modrm8_rr(&mut self, op: ModrmOp, rm: Reg, reg: Reg) {
        self.emit_modrm(op as u8 - 1, rm, reg.low3(), reg.needs_extension(), false);
    }

    /// `mov reg, imm64` via the `B8+r` short form.
    pub fn mov_imm64(&mut self, reg: Reg, value: u64) {
        self.code.reserve(10);
        self.code.push(rex(reg.needs_extension(), false, true));
        self.code.push(OPCODE_MOV_IMM_LONG + reg.low3());
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// `mov reg32, imm32`, zero-extending into the full register.
    pub fn mov_imm32(&mut self, reg: Reg, value: u32) {
        self.code.reserve(6);
        self.code.push(rex(reg.needs_extension(), false, false));
        self.code.push(OPCODE_MOV_IMM_LONG + reg.low3());
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// `mov reg16, imm16`.
    pub fn mov_imm16(&mut self, reg: Reg, value: u16) {
        self.code.reserve(5);
        self.code.push(OPERAND_SIZE_OVERRIDE);
        self.code.push(rex(reg.needs_extension(), false, false));
        self.code.push(OPCODE_MOV_IMM_LONG + reg.low3());
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// `mov reg8, imm8` via the `B0+r` short form.
    pub fn mov_imm8(&mut self, reg: Reg, value: u8) {
        self.code.reserve(3);
        self.code.push(rex(reg.needs_extension(), false, false));
        self.code.push(OPCODE_MOV_IMM_LOW + reg.low3());
        self.code.push(value);
    }

    /// `mov reg, imm64` whose immediate is the linked address of `label`.
    ///
    /// Emits an eight byte placeholder and an absolute relocation, so the
    /// loaded value becomes `base + label_offset` once linked.
    pub fn mov_imm64_label(&mut self, reg: Reg, label: Label) {
        self.code.reserve(10);
        self.code.push(rex(reg.needs_extension(), false, true));
        self.code.push(OPCODE_MOV_IMM_LONG + reg.low3());
        self.add_relocation(label, RelocKind::Absolute);
        self.code.extend_from_slice(&0u64.to_le_bytes());
    }

    /// `push reg`.
    pub fn push(&mut self, reg: Reg) {
        self.code.reserve(2);
        self.code.push(rex(reg.needs_extension(), false, false));
        self.code.push(OPCODE_PUSH + reg.low3());
    }

    /// `pop reg`.
    pub fn pop(&mut self, reg: Reg) {
        self.code.reserve(2);
        self.code.push(rex(reg.needs_extension(), false, false));
        self.code.push(OPCODE_POP + reg.low3());
    }

    pub fn ret(&mut self) {
        self.code.push(OPCODE_RET);
    }

    pub fn nop(&mut self) {
        self.code.push(OPCODE_NOP);
    }

    /// `jmp rel32` to `label`, with a relative relocation over the
    /// displacement bytes.
    pub fn jmp(&mut self, label: Label) {
        self.code.reserve(5);
        self.code.push(OPCODE_JMP_REL32);
        self.add_relocation(label, RelocKind::Relative);
        self.code.extend_from_slice(&[0; 4]);
    }

    /// `call rel32` to `label`.
    pub fn call(&mut self, label: Label) {
        self.code.reserve(5);
        self.code.push(OPCODE_CALL_REL32);
        self.add_relocation(label, RelocKind::Relative);
        self.code.extend_from_slice(&[0; 4]);
    }

    /// `jcc rel32` to `label` via the two byte `0F 8x` form.
    pub fn jcc(&mut self, cond: Cond, label: Label) {
        self.code.reserve(6);
        self.code.push(OPCODE_ESCAPE_0F);
        self.code.push(0x80 + cond as u8);
        self.add_relocation(label, RelocKind::Relative);
        self.code.extend_from_slice(&[0; 4]);
    }

    /// Indirect `jmp reg` (`FF /4`).
    pub fn jmp_reg(&mut self, reg: Reg) {
        self.emit_modrm(OPCODE_GROUP_FF, reg, FF_DIGIT_JMP, false, true);
    }

    /// Indirect `call reg` (`FF /2`).
    pub fn call_reg(&mut self, reg: Reg) {
        self.emit_modrm(OPCODE_GROUP_FF, reg, FF_DIGIT_CALL, false, true);
    }

    /// Single-operand multiply or divide against rax/rdx (`F7 /digit`).
    pub fn muldiv(&mut self, op: MulDivOp, reg: Reg) {
        self.emit_modrm(OPCODE_GROUP_F7, reg, op as u8, false, true);
    }

    /// Resolves every relocation in the encoder's own buffer.
    ///
    /// Relative displacements ignore `base`; absolute relocations receive
    /// `base + label_offset`. All relocations are resolved before any byte
    /// is patched, so a failed call leaves the buffer unmodified.
    pub fn apply_relocations(&mut self, base: u64) -> Result<(), EncodeError> {
        Self::apply_to(&mut self.code, &self.labels, &self.relocations, base)
    }

    /// Copies the code into `dest` and resolves relocations there, using
    /// the destination's own address as base.
    ///
    /// The encoder is not modified; linking the same encoder into several
    /// destinations produces identical relative code in each.
    pub fn link_to(&self, dest: &mut [u8]) -> Result<(), EncodeError> {
        if dest.len() < self.code.len() {
            return Err(EncodeError::DestinationTooSmall {
                required: self.code.len(),
                len: dest.len(),
            });
        }
        let dest = &mut dest[..self.code.len()];
        dest.copy_from_slice(&self.code);
        Self::apply_to(dest, &self.labels, &self.relocations, dest.as_ptr() as u64)
    }

    fn apply_to(
        code: &mut [u8],
        labels: &[usize],
        relocations: &[Relocation],
        base: u64,
    ) -> Result<(), EncodeError> {
        struct Patch {
            offset: usize,
            value: u64,
            width: usize,
        }

        let mut patches = Vec::with_capacity(relocations.len());
        for reloc in relocations {
            let target = *labels
                .get(reloc.label.0)
                .ok_or(EncodeError::UnknownLabel { id: reloc.label.0 })?;
            let width = reloc.kind.patch_width();
            let end = reloc.offset + width;
            if end > code.len() {
                return Err(EncodeError::PatchOutOfBounds {
                    offset: reloc.offset,
                    end,
                    len: code.len(),
                });
            }
            let value = match reloc.kind {
                RelocKind::Relative => {
                    let displacement = target as i64 - (reloc.offset as i64 + 4);
                    let displacement = i32::try_from(displacement).map_err(|_| {
                        EncodeError::DisplacementOverflow {
                            patch_offset: reloc.offset,
                            target,
                        }
                    })?;
                    displacement as u32 as u64
                }
                RelocKind::Absolute => base.wrapping_add(target as u64),
            };
            patches.push(Patch {
                offset: reloc.offset,
                value,
                width,
            });
        }

        for patch in patches {
            let bytes = patch.value.to_le_bytes();
            code[patch.offset..patch.offset + patch.width].copy_from_slice(&bytes[..patch.width]);
        }
        log::trace!(
            "resolved {} relocations against base {base:#x}",
            relocations.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modrm_widths() {
        let mut enc = Encoder::new();
        enc.modrm_rr(ModrmOp::Mov, Reg::RAX, Reg::RDX);
        enc.modrm32_rr(ModrmOp::Mov, Reg::RAX, Reg::RDX);
        enc.modrm16_rr(ModrmOp::Mov, Reg::RAX, Reg::RDX);
        enc.modrm8_rr(ModrmOp::Mov, Reg::RAX, Reg::RDX);
        assert_eq!(
            enc.code(),
            [
                0x48, 0x89, 0xD0, // mov rax, rdx
                0x40, 0x89, 0xD0, // mov eax, edx
                0x66, 0x40, 0x89, 0xD0, // mov ax, dx
                0x40, 0x88, 0xD0, // mov al, dl
            ]
        );
    }

    #[test]
    fn rex_extension_bits() {
        let mut enc = Encoder::new();
        enc.modrm_rr(ModrmOp::Mov, Reg::R8, Reg::RAX); // B set
        enc.modrm_rr(ModrmOp::Mov, Reg::RAX, Reg::R9); // R set
        enc.modrm_rr(ModrmOp::Sub, Reg::R15, Reg::R8); // both
        assert_eq!(
            enc.code(),
            [
                0x49, 0x89, 0xC0, // mov r8, rax
                0x4C, 0x89, 0xC8, // mov rax, r9
                0x4D, 0x29, 0xC7, // sub r15, r8
            ]
        );
    }

    #[test]
    fn mov_immediate_widths() {
        let mut enc = Encoder::new();
        enc.mov_imm64(Reg::RAX, 0xdead_beef_1234_5678);
        enc.mov_imm64(Reg::R9, 0xdead_beef_1234_5678);
        enc.mov_imm32(Reg::R9, 0x1234_5678);
        enc.mov_imm16(Reg::R9, 0x1234);
        enc.mov_imm8(Reg::R9, 0x12);
        enc.mov_imm8(Reg::RAX, 0x01);
        assert_eq!(
            enc.code(),
            [
                0x48, 0xB8, 0x78, 0x56, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE,
                0x49, 0xB9, 0x78, 0x56, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE,
                0x41, 0xB9, 0x78, 0x56, 0x34, 0x12,
                0x66, 0x41, 0xB9, 0x34, 0x12,
                0x41, 0xB1, 0x12,
                0x40, 0xB0, 0x01,
            ]
        );
    }

    #[test]
    fn stack_and_misc() {
        let mut enc = Encoder::new();
        enc.push(Reg::RBP);
        enc.push(Reg::R15);
        enc.pop(Reg::RAX);
        enc.nop();
        enc.ret();
        assert_eq!(
            enc.code(),
            [0x40, 0x55, 0x41, 0x57, 0x40, 0x58, 0x90, 0xC3]
        );
    }

    #[test]
    fn indirect_and_muldiv() {
        let mut enc = Encoder::new();
        enc.jmp_reg(Reg::RAX);
        enc.call_reg(Reg::RAX);
        enc.muldiv(MulDivOp::Imul, Reg::RDI);
        enc.muldiv(MulDivOp::Idiv, Reg::R9);
        assert_eq!(
            enc.code(),
            [
                0x48, 0xFF, 0xE0, // jmp rax
                0x48, 0xFF, 0xD0, // call rax
                0x48, 0xF7, 0xEF, // imul rdi
                0x49, 0xF7, 0xF9, // idiv r9
            ]
        );
    }

    #[test]
    fn forward_conditional_jump_resolves_to_zero() {
        let mut enc = Encoder::new();
        let target = enc.add_label();
        enc.modrm_rr(ModrmOp::Cmp, Reg::RAX, Reg::RDX);
        enc.jcc(Cond::E, target);
        enc.move_label(target);
        enc.apply_relocations(0).unwrap();
        assert_eq!(
            enc.code(),
            [0x48, 0x39, 0xD0, 0x0F, 0x84, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn backward_jump_displacement() {
        let mut enc = Encoder::new();
        let target = enc.add_label();
        enc.nop();
        enc.jmp(target);
        enc.apply_relocations(0).unwrap();
        // jmp back over itself and the nop: -6
        assert_eq!(enc.code(), [0x90, 0xE9, 0xFA, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn moved_label_wins() {
        let mut enc = Encoder::new();
        let target = enc.add_label();
        for _ in 0..10 {
            enc.nop();
        }
        enc.move_label(target);
        enc.jmp(target);
        enc.apply_relocations(0).unwrap();
        assert_eq!(enc.label_offset(target), Some(10));
        assert_eq!(&enc.code()[10..], [0xE9, 0xFB, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn label_offsets_stay_within_buffer() {
        let mut enc = Encoder::new();
        let a = enc.add_label();
        enc.mov_imm64(Reg::RAX, 1);
        let b = enc.add_label();
        enc.push(Reg::RAX);
        enc.move_label(a);
        enc.ret();
        assert_eq!(enc.len(), 10 + 2 + 1);
        assert_eq!(enc.label_offset(a), Some(12));
        assert_eq!(enc.label_offset(b), Some(10));
        assert!(enc.label_offset(a).unwrap() <= enc.len());
    }

    #[test]
    fn absolute_relocation_adds_base() {
        let mut enc = Encoder::new();
        let entry = enc.add_label();
        enc.nop();
        enc.mov_imm64_label(Reg::RAX, entry);
        enc.apply_relocations(0x7000_0000).unwrap();
        let mut expected = vec![0x90, 0x48, 0xB8];
        expected.extend_from_slice(&0x7000_0000u64.to_le_bytes());
        assert_eq!(enc.code(), expected);
    }

    #[test]
    fn unknown_label_is_rejected_before_patching() {
        let mut enc = Encoder::new();
        let ok = enc.add_label();
        enc.jmp(ok);
        enc.add_relocation(Label(7), RelocKind::Relative);
        enc.code.extend_from_slice(&[0xAA; 4]);
        let before = enc.code().to_vec();
        assert_eq!(
            enc.apply_relocations(0),
            Err(EncodeError::UnknownLabel { id: 7 })
        );
        // no partial linking: the valid jmp placeholder is untouched too
        assert_eq!(enc.code(), before);
    }

    #[test]
    fn link_to_rejects_short_destination() {
        let mut enc = Encoder::new();
        enc.mov_imm64(Reg::RAX, 0);
        let mut dest = [0u8; 4];
        assert_eq!(
            enc.link_to(&mut dest),
            Err(EncodeError::DestinationTooSmall {
                required: 10,
                len: 4
            })
        );
    }

    #[test]
    fn link_is_repeatable() {
        let mut enc = Encoder::new();
        let top = enc.add_label();
        enc.modrm_rr(ModrmOp::Add, Reg::RAX, Reg::RDX);
        enc.jmp(top);
        enc.ret();

        let mut first = vec![0u8; enc.len()];
        let mut second = vec![0u8; enc.len()];
        enc.link_to(&mut first).unwrap();
        enc.link_to(&mut second).unwrap();
        // relative-only code is position independent
        assert_eq!(first, second);
        // and the encoder's own buffer still holds the zeroed placeholder
        assert_eq!(&enc.code()[4..8], [0, 0, 0, 0]);
    }
}
