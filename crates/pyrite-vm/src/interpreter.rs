use std::collections::HashSet;

use primitive_types::{U256, U512};

use pyrite_core::Address;

use crate::host::{CallKind, Host, VmMessage, VmResult, VmStatus};
use crate::opcode::{
    base_cost, OpCode, DUP1, DUP16, LOG0, LOG4, MEMORY_WORD_COST, PUSH1, PUSH32, SWAP1, SWAP16,
};

const STACK_LIMIT: usize = 1024;
const MAX_CALL_DEPTH: u32 = 1024;
/// Upper bound on any memory offset or length a program may name.
const MEMORY_HARD_CAP: usize = 1 << 24;

/// Run `code` under `msg` against `host`.
///
/// Fault statuses consume the whole gas budget; REVERT and normal
/// completion return the remainder.
pub fn execute(host: &mut dyn Host, msg: &VmMessage, code: &[u8]) -> VmResult {
    if msg.depth > MAX_CALL_DEPTH {
        return VmResult::fault(VmStatus::Failure);
    }
    Interpreter::new(host, msg, code).run()
}

enum Flow {
    Continue,
    Done(VmStatus, Vec<u8>),
}

struct Interpreter<'a> {
    host: &'a mut dyn Host,
    msg: &'a VmMessage,
    code: &'a [u8],
    stack: Vec<U256>,
    memory: Vec<u8>,
    pc: usize,
    gas_left: u64,
    return_data: Vec<u8>,
    jumpdests: HashSet<usize>,
}

impl<'a> Interpreter<'a> {
    fn new(host: &'a mut dyn Host, msg: &'a VmMessage, code: &'a [u8]) -> Self {
        Self {
            host,
            msg,
            code,
            stack: Vec::new(),
            memory: Vec::new(),
            pc: 0,
            gas_left: msg.gas,
            return_data: Vec::new(),
            jumpdests: analyze_jumpdests(code),
        }
    }

    fn run(mut self) -> VmResult {
        loop {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Done(status, output)) => {
                    let gas_left = match status {
                        VmStatus::Success | VmStatus::Revert => self.gas_left,
                        _ => 0,
                    };
                    return VmResult::new(status, gas_left, output);
                }
                Err(status) => return VmResult::fault(status),
            }
        }
    }

    // ── Stack / gas / memory plumbing ────────────────────────────────────────

    fn push(&mut self, value: U256) -> Result<(), VmStatus> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(VmStatus::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<U256, VmStatus> {
        self.stack.pop().ok_or(VmStatus::StackUnderflow)
    }

    fn charge(&mut self, gas: u64) -> Result<(), VmStatus> {
        if self.gas_left < gas {
            return Err(VmStatus::OutOfGas);
        }
        self.gas_left -= gas;
        Ok(())
    }

    fn as_usize(value: U256) -> Result<usize, VmStatus> {
        if value > U256::from(MEMORY_HARD_CAP) {
            return Err(VmStatus::OutOfGas);
        }
        Ok(value.as_usize())
    }

    /// Grow memory to cover `[offset, offset + len)`, charging per new
    /// 32-byte word. A zero-length access never grows memory.
    fn expand_memory(&mut self, offset: usize, len: usize) -> Result<(), VmStatus> {
        if len == 0 {
            return Ok(());
        }
        let end = offset.checked_add(len).ok_or(VmStatus::OutOfGas)?;
        if end > MEMORY_HARD_CAP {
            return Err(VmStatus::OutOfGas);
        }
        let target = (end + 31) / 32 * 32;
        if target > self.memory.len() {
            let new_words = ((target - self.memory.len()) / 32) as u64;
            self.charge(new_words * MEMORY_WORD_COST)?;
            self.memory.resize(target, 0);
        }
        Ok(())
    }

    fn mem_slice(&mut self, offset: U256, len: U256) -> Result<(usize, usize), VmStatus> {
        let offset = Self::as_usize(offset)?;
        let len = Self::as_usize(len)?;
        self.expand_memory(offset, len)?;
        Ok((offset, len))
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    fn step(&mut self) -> Result<Flow, VmStatus> {
        let Some(&op) = self.code.get(self.pc) else {
            // Running off the end of code is an implicit STOP.
            return Ok(Flow::Done(VmStatus::Success, Vec::new()));
        };
        self.charge(base_cost(op))?;
        self.pc += 1;

        match op {
            PUSH1..=PUSH32 => {
                let count = (op - PUSH1 + 1) as usize;
                let mut word = [0u8; 32];
                for i in 0..count {
                    // Push data past the end of code reads as zero.
                    word[32 - count + i] = self.code.get(self.pc + i).copied().unwrap_or(0);
                }
                self.pc += count;
                self.push(U256::from_big_endian(&word))?;
                return Ok(Flow::Continue);
            }
            DUP1..=DUP16 => {
                let depth = (op - DUP1 + 1) as usize;
                if self.stack.len() < depth {
                    return Err(VmStatus::StackUnderflow);
                }
                let value = self.stack[self.stack.len() - depth];
                self.push(value)?;
                return Ok(Flow::Continue);
            }
            SWAP1..=SWAP16 => {
                let depth = (op - SWAP1 + 1) as usize;
                if self.stack.len() < depth + 1 {
                    return Err(VmStatus::StackUnderflow);
                }
                let top = self.stack.len() - 1;
                self.stack.swap(top, top - depth);
                return Ok(Flow::Continue);
            }
            LOG0..=LOG4 => {
                if self.msg.is_static {
                    return Err(VmStatus::StaticViolation);
                }
                let topic_count = (op - LOG0) as usize;
                let (offset, len) = {
                    let o = self.pop()?;
                    let l = self.pop()?;
                    self.mem_slice(o, l)?
                };
                let mut topics = Vec::with_capacity(topic_count);
                for _ in 0..topic_count {
                    topics.push(word_to_bytes(self.pop()?));
                }
                let data = self.memory[offset..offset + len].to_vec();
                let destination = self.msg.destination;
                self.host.emit_log(&destination, &data, &topics);
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        let opcode = match op {
            0x00 => OpCode::Stop,
            0x01 => OpCode::Add,
            0x02 => OpCode::Mul,
            0x03 => OpCode::Sub,
            0x04 => OpCode::Div,
            0x05 => OpCode::Sdiv,
            0x06 => OpCode::Mod,
            0x07 => OpCode::Smod,
            0x08 => OpCode::AddMod,
            0x09 => OpCode::MulMod,
            0x0a => OpCode::Exp,
            0x0b => OpCode::SignExtend,
            0x10 => OpCode::Lt,
            0x11 => OpCode::Gt,
            0x12 => OpCode::Slt,
            0x13 => OpCode::Sgt,
            0x14 => OpCode::Eq,
            0x15 => OpCode::IsZero,
            0x16 => OpCode::And,
            0x17 => OpCode::Or,
            0x18 => OpCode::Xor,
            0x19 => OpCode::Not,
            0x1a => OpCode::Byte,
            0x1b => OpCode::Shl,
            0x1c => OpCode::Shr,
            0x1d => OpCode::Sar,
            0x20 => OpCode::Keccak256,
            0x30 => OpCode::Address,
            0x31 => OpCode::Balance,
            0x32 => OpCode::Origin,
            0x33 => OpCode::Caller,
            0x34 => OpCode::CallValue,
            0x35 => OpCode::CallDataLoad,
            0x36 => OpCode::CallDataSize,
            0x37 => OpCode::CallDataCopy,
            0x38 => OpCode::CodeSize,
            0x39 => OpCode::CodeCopy,
            0x3a => OpCode::GasPrice,
            0x3b => OpCode::ExtCodeSize,
            0x3c => OpCode::ExtCodeCopy,
            0x3d => OpCode::ReturnDataSize,
            0x3e => OpCode::ReturnDataCopy,
            0x3f => OpCode::ExtCodeHash,
            0x40 => OpCode::BlockHash,
            0x41 => OpCode::Coinbase,
            0x42 => OpCode::Timestamp,
            0x43 => OpCode::Number,
            0x44 => OpCode::Difficulty,
            0x45 => OpCode::GasLimit,
            0x46 => OpCode::ChainId,
            0x47 => OpCode::SelfBalance,
            0x50 => OpCode::Pop,
            0x51 => OpCode::MLoad,
            0x52 => OpCode::MStore,
            0x53 => OpCode::MStore8,
            0x54 => OpCode::SLoad,
            0x55 => OpCode::SStore,
            0x56 => OpCode::Jump,
            0x57 => OpCode::JumpI,
            0x58 => OpCode::Pc,
            0x59 => OpCode::MSize,
            0x5a => OpCode::Gas,
            0x5b => OpCode::JumpDest,
            0xf0 => OpCode::Create,
            0xf1 => OpCode::Call,
            0xf2 => OpCode::CallCode,
            0xf3 => OpCode::Return,
            0xf4 => OpCode::DelegateCall,
            0xf5 => OpCode::Create2,
            0xfa => OpCode::StaticCall,
            0xfd => OpCode::Revert,
            0xff => OpCode::SelfDestruct,
            _ => return Err(VmStatus::InvalidInstruction),
        };

        match opcode {
            OpCode::Stop => return Ok(Flow::Done(VmStatus::Success, Vec::new())),

            // ── Arithmetic ───────────────────────────────────────────────────
            OpCode::Add => self.binary(|a, b| a.overflowing_add(b).0)?,
            OpCode::Mul => self.binary(|a, b| a.overflowing_mul(b).0)?,
            OpCode::Sub => self.binary(|a, b| a.overflowing_sub(b).0)?,
            OpCode::Div => self.binary(|a, b| if b.is_zero() { U256::zero() } else { a / b })?,
            OpCode::Sdiv => self.binary(signed_div)?,
            OpCode::Mod => self.binary(|a, b| if b.is_zero() { U256::zero() } else { a % b })?,
            OpCode::Smod => self.binary(signed_mod)?,
            OpCode::AddMod => {
                let a = self.pop()?;
                let b = self.pop()?;
                let m = self.pop()?;
                let result = if m.is_zero() {
                    U256::zero()
                } else {
                    let sum = U512::from(a) + U512::from(b);
                    U256::try_from(sum % U512::from(m)).expect("modulus fits U256")
                };
                self.push(result)?;
            }
            OpCode::MulMod => {
                let a = self.pop()?;
                let b = self.pop()?;
                let m = self.pop()?;
                let result = if m.is_zero() {
                    U256::zero()
                } else {
                    U256::try_from(a.full_mul(b) % U512::from(m)).expect("modulus fits U256")
                };
                self.push(result)?;
            }
            OpCode::Exp => self.binary(|a, b| a.overflowing_pow(b).0)?,
            OpCode::SignExtend => self.binary(sign_extend)?,

            // ── Comparison / bitwise ─────────────────────────────────────────
            OpCode::Lt => self.binary(|a, b| bool_word(a < b))?,
            OpCode::Gt => self.binary(|a, b| bool_word(a > b))?,
            OpCode::Slt => self.binary(|a, b| bool_word(signed_lt(a, b)))?,
            OpCode::Sgt => self.binary(|a, b| bool_word(signed_lt(b, a)))?,
            OpCode::Eq => self.binary(|a, b| bool_word(a == b))?,
            OpCode::IsZero => {
                let a = self.pop()?;
                self.push(bool_word(a.is_zero()))?;
            }
            OpCode::And => self.binary(|a, b| a & b)?,
            OpCode::Or => self.binary(|a, b| a | b)?,
            OpCode::Xor => self.binary(|a, b| a ^ b)?,
            OpCode::Not => {
                let a = self.pop()?;
                self.push(!a)?;
            }
            OpCode::Byte => self.binary(|i, x| {
                if i >= U256::from(32) {
                    U256::zero()
                } else {
                    U256::from(word_to_bytes(x)[i.as_usize()])
                }
            })?,
            OpCode::Shl => self.binary(|shift, x| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    x << shift.as_usize()
                }
            })?,
            OpCode::Shr => self.binary(|shift, x| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    x >> shift.as_usize()
                }
            })?,
            OpCode::Sar => self.binary(arithmetic_shr)?,

            OpCode::Keccak256 => {
                let o = self.pop()?;
                let l = self.pop()?;
                let (offset, len) = self.mem_slice(o, l)?;
                let digest = pyrite_crypto::keccak256(&self.memory[offset..offset + len]);
                self.push(U256::from_big_endian(&digest))?;
            }

            // ── Environment ──────────────────────────────────────────────────
            OpCode::Address => {
                let word = address_to_word(&self.msg.destination);
                self.push(word)?;
            }
            OpCode::Balance => {
                let address = word_to_address(self.pop()?);
                let balance = self.host.get_balance(&address);
                self.push(balance)?;
            }
            OpCode::Origin => {
                let origin = self.host.get_tx_context().origin;
                self.push(address_to_word(&origin))?;
            }
            OpCode::Caller => {
                let word = address_to_word(&self.msg.sender);
                self.push(word)?;
            }
            OpCode::CallValue => {
                let value = self.msg.value;
                self.push(value)?;
            }
            OpCode::CallDataLoad => {
                let offset = self.pop()?;
                let mut word = [0u8; 32];
                if offset <= U256::from(MEMORY_HARD_CAP) {
                    let offset = offset.as_usize();
                    for (i, byte) in word.iter_mut().enumerate() {
                        *byte = self.msg.input.get(offset + i).copied().unwrap_or(0);
                    }
                }
                self.push(U256::from_big_endian(&word))?;
            }
            OpCode::CallDataSize => {
                let len = self.msg.input.len();
                self.push(U256::from(len))?;
            }
            OpCode::CallDataCopy => {
                let dest = self.pop()?;
                let src = self.pop()?;
                let len = self.pop()?;
                let (dest, len) = self.mem_slice(dest, len)?;
                let src = Self::as_usize(src)?;
                copy_padded(&self.msg.input, src, &mut self.memory[dest..dest + len]);
            }
            OpCode::CodeSize => self.push(U256::from(self.code.len()))?,
            OpCode::CodeCopy => {
                let dest = self.pop()?;
                let src = self.pop()?;
                let len = self.pop()?;
                let (dest, len) = self.mem_slice(dest, len)?;
                let src = Self::as_usize(src)?;
                copy_padded(self.code, src, &mut self.memory[dest..dest + len]);
            }
            OpCode::GasPrice => {
                let price = self.host.get_tx_context().gas_price;
                self.push(price)?;
            }
            OpCode::ExtCodeSize => {
                let address = word_to_address(self.pop()?);
                let size = self.host.get_code_size(&address);
                self.push(U256::from(size))?;
            }
            OpCode::ExtCodeCopy => {
                let address = word_to_address(self.pop()?);
                let dest = self.pop()?;
                let src = self.pop()?;
                let len = self.pop()?;
                let (dest, len) = self.mem_slice(dest, len)?;
                let src = Self::as_usize(src)?;
                let mut buffer = vec![0u8; len];
                self.host.copy_code(&address, src, &mut buffer);
                self.memory[dest..dest + len].copy_from_slice(&buffer);
            }
            OpCode::ReturnDataSize => {
                let len = self.return_data.len();
                self.push(U256::from(len))?;
            }
            OpCode::ReturnDataCopy => {
                let dest = self.pop()?;
                let src = self.pop()?;
                let len = self.pop()?;
                let (dest, len) = self.mem_slice(dest, len)?;
                let src = Self::as_usize(src)?;
                // Reading past the end of return data is a hard fault.
                if src.checked_add(len).map_or(true, |end| end > self.return_data.len()) {
                    return Err(VmStatus::Failure);
                }
                let data = self.return_data[src..src + len].to_vec();
                self.memory[dest..dest + len].copy_from_slice(&data);
            }
            OpCode::ExtCodeHash => {
                let address = word_to_address(self.pop()?);
                let hash = self.host.get_code_hash(&address);
                self.push(U256::from_big_endian(&hash))?;
            }

            // ── Block info ───────────────────────────────────────────────────
            OpCode::BlockHash => {
                let number = self.pop()?;
                let hash = if number <= U256::from(u64::MAX) {
                    self.host.get_block_hash(number.as_u64())
                } else {
                    [0u8; 32]
                };
                self.push(U256::from_big_endian(&hash))?;
            }
            OpCode::Coinbase => {
                let coinbase = self.host.get_tx_context().coinbase;
                self.push(address_to_word(&coinbase))?;
            }
            OpCode::Timestamp => {
                let timestamp = self.host.get_tx_context().block_timestamp;
                self.push(U256::from(timestamp))?;
            }
            OpCode::Number => {
                let number = self.host.get_tx_context().block_number;
                self.push(U256::from(number))?;
            }
            OpCode::Difficulty => {
                let difficulty = self.host.get_tx_context().block_difficulty;
                self.push(difficulty)?;
            }
            OpCode::GasLimit => {
                let gas = self.msg.gas;
                self.push(U256::from(gas))?;
            }
            OpCode::ChainId => {
                let chain_id = self.host.get_tx_context().chain_id;
                self.push(chain_id)?;
            }
            OpCode::SelfBalance => {
                let balance = self.host.get_balance(&self.msg.destination);
                self.push(balance)?;
            }

            // ── Stack / memory / storage / flow ──────────────────────────────
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::MLoad => {
                let offset = self.pop()?;
                let (offset, _) = self.mem_slice(offset, U256::from(32))?;
                let word = U256::from_big_endian(&self.memory[offset..offset + 32]);
                self.push(word)?;
            }
            OpCode::MStore => {
                let offset = self.pop()?;
                let value = self.pop()?;
                let (offset, _) = self.mem_slice(offset, U256::from(32))?;
                self.memory[offset..offset + 32].copy_from_slice(&word_to_bytes(value));
            }
            OpCode::MStore8 => {
                let offset = self.pop()?;
                let value = self.pop()?;
                let (offset, _) = self.mem_slice(offset, U256::from(1))?;
                self.memory[offset] = word_to_bytes(value)[31];
            }
            OpCode::SLoad => {
                let key = word_to_bytes(self.pop()?);
                let value = self.host.get_storage(&self.msg.destination, &key);
                self.push(U256::from_big_endian(&value))?;
            }
            OpCode::SStore => {
                if self.msg.is_static {
                    return Err(VmStatus::StaticViolation);
                }
                let key = word_to_bytes(self.pop()?);
                let value = word_to_bytes(self.pop()?);
                let destination = self.msg.destination;
                self.host.set_storage(&destination, &key, &value);
            }
            OpCode::Jump => {
                let target = Self::as_usize(self.pop()?)?;
                if !self.jumpdests.contains(&target) {
                    return Err(VmStatus::BadJumpDestination);
                }
                self.pc = target;
            }
            OpCode::JumpI => {
                let target = self.pop()?;
                let condition = self.pop()?;
                if !condition.is_zero() {
                    let target = Self::as_usize(target)?;
                    if !self.jumpdests.contains(&target) {
                        return Err(VmStatus::BadJumpDestination);
                    }
                    self.pc = target;
                }
            }
            OpCode::Pc => self.push(U256::from(self.pc - 1))?,
            OpCode::MSize => self.push(U256::from(self.memory.len()))?,
            OpCode::Gas => self.push(U256::from(self.gas_left))?,
            OpCode::JumpDest => {}

            // ── Calls ────────────────────────────────────────────────────────
            OpCode::Call => return self.do_call(false),
            OpCode::StaticCall => return self.do_call(true),
            // Contract-initiated creation and code-borrowing call variants
            // are outside the executed protocol surface.
            OpCode::Create | OpCode::Create2 | OpCode::CallCode | OpCode::DelegateCall => {
                return Err(VmStatus::Failure);
            }

            OpCode::Return => {
                let o = self.pop()?;
                let l = self.pop()?;
                let (offset, len) = self.mem_slice(o, l)?;
                let output = self.memory[offset..offset + len].to_vec();
                return Ok(Flow::Done(VmStatus::Success, output));
            }
            OpCode::Revert => {
                let o = self.pop()?;
                let l = self.pop()?;
                let (offset, len) = self.mem_slice(o, l)?;
                let output = self.memory[offset..offset + len].to_vec();
                return Ok(Flow::Done(VmStatus::Revert, output));
            }
            OpCode::Invalid => return Err(VmStatus::InvalidInstruction),
            OpCode::SelfDestruct => {
                if self.msg.is_static {
                    return Err(VmStatus::StaticViolation);
                }
                let beneficiary = word_to_address(self.pop()?);
                let destination = self.msg.destination;
                self.host.selfdestruct(&destination, &beneficiary);
                return Ok(Flow::Done(VmStatus::Success, Vec::new()));
            }

            // Push/dup/swap/log were handled above by range.
            OpCode::Push1
            | OpCode::Push32
            | OpCode::Dup1
            | OpCode::Dup16
            | OpCode::Swap1
            | OpCode::Swap16
            | OpCode::Log0
            | OpCode::Log4 => unreachable!("handled by range dispatch"),
        }

        Ok(Flow::Continue)
    }

    fn binary(&mut self, f: impl FnOnce(U256, U256) -> U256) -> Result<(), VmStatus> {
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(f(a, b))
    }

    /// CALL / STATICCALL. The static flag is sticky: a static frame forces
    /// every nested frame static.
    fn do_call(&mut self, force_static: bool) -> Result<Flow, VmStatus> {
        let gas_requested = self.pop()?;
        let destination = word_to_address(self.pop()?);
        let value = if force_static { U256::zero() } else { self.pop()? };
        let in_offset = self.pop()?;
        let in_len = self.pop()?;
        let out_offset = self.pop()?;
        let out_len = self.pop()?;

        if self.msg.is_static && !value.is_zero() {
            return Err(VmStatus::StaticViolation);
        }

        let (in_offset, in_len) = self.mem_slice(in_offset, in_len)?;
        let (out_offset, out_len) = self.mem_slice(out_offset, out_len)?;
        let input = self.memory[in_offset..in_offset + in_len].to_vec();

        let forwarded = if gas_requested > U256::from(self.gas_left) {
            self.gas_left
        } else {
            gas_requested.as_u64()
        };

        let message = VmMessage {
            kind: CallKind::Call,
            is_static: force_static || self.msg.is_static,
            depth: self.msg.depth + 1,
            gas: forwarded,
            sender: self.msg.destination,
            destination,
            value,
            input,
        };
        let result = self.host.call(message);

        self.gas_left -= forwarded - result.gas_left.min(forwarded);
        self.return_data = result.output;

        let copied = self.return_data.len().min(out_len);
        self.memory[out_offset..out_offset + copied]
            .copy_from_slice(&self.return_data[..copied]);

        self.push(bool_word(result.status.is_success()))?;
        Ok(Flow::Continue)
    }
}

// ── Word helpers ─────────────────────────────────────────────────────────────

fn bool_word(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

fn word_to_bytes(word: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    bytes
}

/// An address occupies the low 20 bytes of a big-endian word.
fn word_to_address(word: U256) -> Address {
    let bytes = word_to_bytes(word);
    let mut address = [0u8; 20];
    address.copy_from_slice(&bytes[12..]);
    Address::from_bytes(address)
}

fn address_to_word(address: &Address) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    U256::from_big_endian(&bytes)
}

/// Copy from `src[offset..]` into `dest`, zero-filling past the source end.
fn copy_padded(src: &[u8], offset: usize, dest: &mut [u8]) {
    for (i, byte) in dest.iter_mut().enumerate() {
        *byte = src.get(offset + i).copied().unwrap_or(0);
    }
}

// ── Two's-complement arithmetic ──────────────────────────────────────────────

fn is_negative(value: U256) -> bool {
    value.bit(255)
}

fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = is_negative(a);
    let b_neg = is_negative(b);
    let a_mag = if a_neg { negate(a) } else { a };
    let b_mag = if b_neg { negate(b) } else { b };
    let quotient = a_mag / b_mag;
    if a_neg != b_neg {
        negate(quotient)
    } else {
        quotient
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = is_negative(a);
    let a_mag = if a_neg { negate(a) } else { a };
    let b_mag = if is_negative(b) { negate(b) } else { b };
    let remainder = a_mag % b_mag;
    if a_neg {
        negate(remainder)
    } else {
        remainder
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn arithmetic_shr(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.as_usize();
    let shifted = value >> shift;
    if negative && shift > 0 {
        // Fill the vacated high bits with ones.
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

fn sign_extend(k: U256, value: U256) -> U256 {
    if k >= U256::from(31) {
        return value;
    }
    let bit = k.as_usize() * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if value.bit(bit) {
        value | !mask
    } else {
        value & mask
    }
}

fn analyze_jumpdests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut pc = 0;
    while pc < code.len() {
        let op = code[pc];
        if op == OpCode::JumpDest as u8 {
            dests.insert(pc);
        }
        if (PUSH1..=PUSH32).contains(&op) {
            pc += (op - PUSH1 + 1) as usize;
        }
        pc += 1;
    }
    dests
}
