/// EVM opcode values. PUSH/DUP/SWAP/LOG families are handled by range in the
/// interpreter; the named constants below cover everything it matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Stop = 0x00,
    Add = 0x01,
    Mul = 0x02,
    Sub = 0x03,
    Div = 0x04,
    Sdiv = 0x05,
    Mod = 0x06,
    Smod = 0x07,
    AddMod = 0x08,
    MulMod = 0x09,
    Exp = 0x0a,
    SignExtend = 0x0b,

    Lt = 0x10,
    Gt = 0x11,
    Slt = 0x12,
    Sgt = 0x13,
    Eq = 0x14,
    IsZero = 0x15,
    And = 0x16,
    Or = 0x17,
    Xor = 0x18,
    Not = 0x19,
    Byte = 0x1a,
    Shl = 0x1b,
    Shr = 0x1c,
    Sar = 0x1d,

    Keccak256 = 0x20,

    Address = 0x30,
    Balance = 0x31,
    Origin = 0x32,
    Caller = 0x33,
    CallValue = 0x34,
    CallDataLoad = 0x35,
    CallDataSize = 0x36,
    CallDataCopy = 0x37,
    CodeSize = 0x38,
    CodeCopy = 0x39,
    GasPrice = 0x3a,
    ExtCodeSize = 0x3b,
    ExtCodeCopy = 0x3c,
    ReturnDataSize = 0x3d,
    ReturnDataCopy = 0x3e,
    ExtCodeHash = 0x3f,

    BlockHash = 0x40,
    Coinbase = 0x41,
    Timestamp = 0x42,
    Number = 0x43,
    Difficulty = 0x44,
    GasLimit = 0x45,
    ChainId = 0x46,
    SelfBalance = 0x47,

    Pop = 0x50,
    MLoad = 0x51,
    MStore = 0x52,
    MStore8 = 0x53,
    SLoad = 0x54,
    SStore = 0x55,
    Jump = 0x56,
    JumpI = 0x57,
    Pc = 0x58,
    MSize = 0x59,
    Gas = 0x5a,
    JumpDest = 0x5b,

    Push1 = 0x60,
    Push32 = 0x7f,
    Dup1 = 0x80,
    Dup16 = 0x8f,
    Swap1 = 0x90,
    Swap16 = 0x9f,
    Log0 = 0xa0,
    Log4 = 0xa4,

    Create = 0xf0,
    Call = 0xf1,
    CallCode = 0xf2,
    Return = 0xf3,
    DelegateCall = 0xf4,
    Create2 = 0xf5,
    StaticCall = 0xfa,
    Revert = 0xfd,
    Invalid = 0xfe,
    SelfDestruct = 0xff,
}

pub const PUSH1: u8 = OpCode::Push1 as u8;
pub const PUSH32: u8 = OpCode::Push32 as u8;
pub const DUP1: u8 = OpCode::Dup1 as u8;
pub const DUP16: u8 = OpCode::Dup16 as u8;
pub const SWAP1: u8 = OpCode::Swap1 as u8;
pub const SWAP16: u8 = OpCode::Swap16 as u8;
pub const LOG0: u8 = OpCode::Log0 as u8;
pub const LOG4: u8 = OpCode::Log4 as u8;

/// Flat gas cost per opcode byte. A coarse schedule: cheap stack and
/// arithmetic work, mid-priced environment access, expensive storage writes.
pub fn base_cost(op: u8) -> u64 {
    match op {
        0x00 => 0,                            // STOP
        0x01..=0x0b => 5,                     // arithmetic
        0x10..=0x1d => 3,                     // comparison / bitwise
        0x20 => 30,                           // KECCAK256
        0x30..=0x3f => 20,                    // environment
        0x40..=0x47 => 20,                    // block info
        0x50..=0x53 => 3,                     // POP / memory
        0x54 => 50,                           // SLOAD
        0x55 => 100,                          // SSTORE
        0x56..=0x5b => 8,                     // control flow
        PUSH1..=PUSH32 => 3,
        DUP1..=DUP16 => 3,
        SWAP1..=SWAP16 => 3,
        LOG0..=LOG4 => 50,
        0xf0 | 0xf5 => 200,                   // CREATE / CREATE2
        0xf1 | 0xf2 | 0xf4 | 0xfa => 40,      // calls
        0xf3 | 0xfd => 0,                     // RETURN / REVERT
        0xff => 100,                          // SELFDESTRUCT
        _ => 0,
    }
}

/// Per-32-byte-word cost of growing memory.
pub const MEMORY_WORD_COST: u64 = 3;
