//! Bounds-checked cursor over ROM bytes.

/// Address at which cartridge ROM is mapped on the target console.
pub const ROM_BASE: u32 = 0x0800_0000;

/// Why a read stopped. The decoder attaches track and offset context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadFault {
    /// Ran past the end of the ROM
    Eof,
    /// Opcode byte outside every known range
    Opcode(u8),
    /// Pointer that does not land inside the ROM
    Pointer(u32),
}

/// Convert a mapped ROM address to a byte offset, if it lands inside `rom_len`.
pub fn pointer_to_offset(pointer: u32, rom_len: usize) -> Option<usize> {
    let offset = pointer.checked_sub(ROM_BASE)? as usize;
    (offset < rom_len).then_some(offset)
}

// ---------------------------------------------------------------------------
// RomReader: cursor over a byte slice
// ---------------------------------------------------------------------------

pub struct RomReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RomReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadFault> {
        let v = *self.data.get(self.pos).ok_or(ReadFault::Eof)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadFault> {
        Ok(self.read_u8()? as i8)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Consume the next byte only if it is an operand (below 0x80).
    pub fn read_operand(&mut self) -> Option<u8> {
        let v = self.peek_u8().filter(|&b| b < 0x80)?;
        self.pos += 1;
        Some(v)
    }

    pub fn read_i16_le(&mut self) -> Result<i16, ReadFault> {
        let bytes = self.read_array::<2>()?;
        Ok(i16::from_le_bytes(bytes))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ReadFault> {
        let bytes = self.read_array::<4>()?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read a mapped ROM address and convert it to an offset.
    pub fn read_pointer(&mut self) -> Result<usize, ReadFault> {
        let pointer = self.read_u32_le()?;
        pointer_to_offset(pointer, self.data.len()).ok_or(ReadFault::Pointer(pointer))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadFault> {
        let end = self.pos.checked_add(N).ok_or(ReadFault::Eof)?;
        let slice = self.data.get(self.pos..end).ok_or(ReadFault::Eof)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }
}
