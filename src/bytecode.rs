//! The shared bytecode encoding.
//!
//! A function body is a sequence of 32-bit words. An instruction word
//! carries the opcode in its high byte and a 24-bit unsigned operand in
//! the low three bytes. `PUSHF`, `PUSHI`, and the call opcodes consume a
//! following raw data word (float bits, int bits, or a function index).

use std::fmt::{Display, Write};

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub type Word = u32;

const OPERAND_MASK: u32 = 0x00FF_FFFF;

#[derive(Clone, Copy, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// never valid at run time; placeholder for unpatched jumps
    Invalid = 0,
    Nop,
    // calls; the callee index lives in the following data word
    CallfSelfG,
    CallfSuperG,
    CallfPushedG,
    CallcPushedG,
    CallcSelfSuper,
    Ret,
    // absolute jump targets in the operand field
    Jmp,
    Jz,
    // stores pop one value into {script, local, parameter} data[operand]
    StoreSF,
    StoreSI,
    StoreSB,
    StoreSN,
    StoreLF,
    StoreLI,
    StoreLB,
    StoreLN,
    StorePF,
    StorePI,
    StorePB,
    StorePN,
    // fetches push {script, local, parameter} data[operand]
    FetchSF,
    FetchSI,
    FetchSB,
    FetchSN,
    FetchLF,
    FetchLI,
    FetchLB,
    FetchLN,
    FetchPF,
    FetchPI,
    FetchPB,
    FetchPN,
    PushF,
    PushI,
    PushB,
    Pop,
    NegF,
    NegI,
    Not,
    // binary arithmetic, monomorphized by operand pair
    DivII,
    DivFF,
    DivFI,
    DivIF,
    MulII,
    MulFF,
    MulFI,
    MulIF,
    SubII,
    SubFF,
    SubFI,
    SubIF,
    AddII,
    AddFF,
    AddFI,
    AddIF,
    Mod,
    EqII,
    EqFF,
    EqFI,
    EqIF,
    EqBB,
    LtEqII,
    LtEqFF,
    LtEqFI,
    LtEqIF,
    LtII,
    LtFF,
    LtFI,
    LtIF,
    GtEqII,
    GtEqFF,
    GtEqFI,
    GtEqIF,
    GtII,
    GtFF,
    GtFI,
    GtIF,
    And,
    Or,
    /// operand indexes the function's interned new-class-name table
    New,
}

impl Opcode {
    /// Whether the instruction consumes the following raw data word.
    #[must_use]
    pub const fn has_data_word(self) -> bool {
        matches!(
            self,
            Self::PushF
                | Self::PushI
                | Self::CallfSelfG
                | Self::CallfSuperG
                | Self::CallfPushedG
                | Self::CallcPushedG
                | Self::CallcSelfSuper
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Self::Invalid => "invalid",
            Self::Nop => "nop",
            Self::CallfSelfG => "callf_self_g",
            Self::CallfSuperG => "callf_super_g",
            Self::CallfPushedG => "callf_pushed_g",
            Self::CallcPushedG => "callc_pushed_g",
            Self::CallcSelfSuper => "callc_self_super",
            Self::Ret => "ret",
            Self::Jmp => "jmp",
            Self::Jz => "jz",
            Self::StoreSF => "storesf",
            Self::StoreSI => "storesi",
            Self::StoreSB => "storesb",
            Self::StoreSN => "storesn",
            Self::StoreLF => "storelf",
            Self::StoreLI => "storeli",
            Self::StoreLB => "storelb",
            Self::StoreLN => "storeln",
            Self::StorePF => "storepf",
            Self::StorePI => "storepi",
            Self::StorePB => "storepb",
            Self::StorePN => "storepn",
            Self::FetchSF => "fetchsf",
            Self::FetchSI => "fetchsi",
            Self::FetchSB => "fetchsb",
            Self::FetchSN => "fetchsn",
            Self::FetchLF => "fetchlf",
            Self::FetchLI => "fetchli",
            Self::FetchLB => "fetchlb",
            Self::FetchLN => "fetchln",
            Self::FetchPF => "fetchpf",
            Self::FetchPI => "fetchpi",
            Self::FetchPB => "fetchpb",
            Self::FetchPN => "fetchpn",
            Self::PushF => "pushf",
            Self::PushI => "pushi",
            Self::PushB => "pushb",
            Self::Pop => "pop",
            Self::NegF => "negf",
            Self::NegI => "negi",
            Self::Not => "not",
            Self::DivII => "divii",
            Self::DivFF => "divff",
            Self::DivFI => "divfi",
            Self::DivIF => "divif",
            Self::MulII => "mulii",
            Self::MulFF => "mulff",
            Self::MulFI => "mulfi",
            Self::MulIF => "mulif",
            Self::SubII => "subii",
            Self::SubFF => "subff",
            Self::SubFI => "subfi",
            Self::SubIF => "subif",
            Self::AddII => "addii",
            Self::AddFF => "addff",
            Self::AddFI => "addfi",
            Self::AddIF => "addif",
            Self::Mod => "mod",
            Self::EqII => "eqii",
            Self::EqFF => "eqff",
            Self::EqFI => "eqfi",
            Self::EqIF => "eqif",
            Self::EqBB => "eqbb",
            Self::LtEqII => "lteqii",
            Self::LtEqFF => "lteqff",
            Self::LtEqFI => "lteqfi",
            Self::LtEqIF => "lteqif",
            Self::LtII => "ltii",
            Self::LtFF => "ltff",
            Self::LtFI => "ltfi",
            Self::LtIF => "ltif",
            Self::GtEqII => "gteqii",
            Self::GtEqFF => "gteqff",
            Self::GtEqFI => "gteqfi",
            Self::GtEqIF => "gteqif",
            Self::GtII => "gtii",
            Self::GtFF => "gtff",
            Self::GtFI => "gtfi",
            Self::GtIF => "gtif",
            Self::And => "and",
            Self::Or => "or",
            Self::New => "new",
        };
        write!(f, "{str}")
    }
}

/// Pack an opcode and its 24-bit operand into one instruction word.
#[must_use]
pub const fn pack(op: Opcode, operand: u32) -> Word {
    ((op as u32) << 24) | (operand & OPERAND_MASK)
}

/// The opcode in a word's high byte, if it is one.
#[must_use]
pub fn opcode(word: Word) -> Option<Opcode> {
    Opcode::try_from((word >> 24) as u8).ok()
}

/// The 24-bit unsigned operand in a word's low bytes.
#[must_use]
pub const fn operand(word: Word) -> u32 {
    word & OPERAND_MASK
}

/// Render a code block one instruction per line, with word indices, the
/// way `--verbose` dumps and test failures want to see it.
#[must_use]
pub fn disassemble(code: &[Word]) -> String {
    let mut out = String::new();
    let mut pc = 0;
    while pc < code.len() {
        let word = code[pc];
        let Some(op) = opcode(word) else {
            let _ = writeln!(out, "{pc:4}  ?? {word:#010x}");
            pc += 1;
            continue;
        };
        if op.has_data_word() {
            let data = code.get(pc + 1).copied().unwrap_or_default();
            match op {
                Opcode::PushF => {
                    let _ = writeln!(out, "{pc:4}  {op} {}", f32::from_bits(data));
                }
                Opcode::PushI => {
                    let _ = writeln!(out, "{pc:4}  {op} {}", data as i32);
                }
                _ => {
                    let _ = writeln!(out, "{pc:4}  {op} {data}");
                }
            }
            pc += 2;
        } else {
            match op {
                Opcode::Jmp
                | Opcode::Jz
                | Opcode::New
                | Opcode::PushB
                | Opcode::StoreSF
                | Opcode::StoreSI
                | Opcode::StoreSB
                | Opcode::StoreSN
                | Opcode::StoreLF
                | Opcode::StoreLI
                | Opcode::StoreLB
                | Opcode::StoreLN
                | Opcode::StorePF
                | Opcode::StorePI
                | Opcode::StorePB
                | Opcode::StorePN
                | Opcode::FetchSF
                | Opcode::FetchSI
                | Opcode::FetchSB
                | Opcode::FetchSN
                | Opcode::FetchLF
                | Opcode::FetchLI
                | Opcode::FetchLB
                | Opcode::FetchLN
                | Opcode::FetchPF
                | Opcode::FetchPI
                | Opcode::FetchPB
                | Opcode::FetchPN => {
                    let _ = writeln!(out, "{pc:4}  {op} {}", operand(word));
                }
                _ => {
                    let _ = writeln!(out, "{pc:4}  {op}");
                }
            }
            pc += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_splits_back() {
        let word = pack(Opcode::StoreLI, 7);
        assert_eq!(opcode(word), Some(Opcode::StoreLI));
        assert_eq!(operand(word), 7);

        let word = pack(Opcode::Jmp, OPERAND_MASK);
        assert_eq!(operand(word), OPERAND_MASK);
    }

    #[test]
    fn unknown_opcode_byte_is_none() {
        assert_eq!(opcode(0xFF00_0000), None);
    }

    #[test]
    fn data_word_instructions() {
        assert!(Opcode::PushI.has_data_word());
        assert!(Opcode::CallfSuperG.has_data_word());
        assert!(!Opcode::PushB.has_data_word());
        assert!(!Opcode::New.has_data_word());
    }

    #[test]
    fn disassembles_with_immediates() {
        let code = vec![
            pack(Opcode::PushI, 0),
            3i32 as u32,
            pack(Opcode::PushF, 0),
            1.5f32.to_bits(),
            pack(Opcode::AddIF, 0),
            pack(Opcode::Ret, 0),
        ];
        let text = disassemble(&code);
        assert!(text.contains("pushi 3"));
        assert!(text.contains("pushf 1.5"));
        assert!(text.contains("addif"));
        assert!(text.contains("ret"));
    }
}
