use crate::error::{Sc55Error, Sc55Result};
use crate::rom::tables::{PCM_ADDRESS_PERMUTATION, PCM_BYTE_PERMUTATION, PCM_UNSCRAMBLED_PREFIX};

/// Descrambled PCM wave data, addressable the same way the hardware's 24-bit
/// sample address space is: flat, with bank 0/1/2/4 occupying disjoint
/// 0x100000-byte windows. Holds raw descrambled bytes rather than decoded
/// `f32` samples, since each 16-bit sample is assembled from two adjacent
/// bytes only at the point a voice reads it (the shift amount is per-byte).
pub struct PcmRom {
    data: Vec<u8>,
}

fn permute_bits(value: u32, order: &[u8]) -> u32 {
    let mut out = 0u32;
    for (dst_bit, &src_bit) in order.iter().enumerate() {
        if (value >> src_bit) & 1 != 0 {
            out |= 1 << dst_bit;
        }
    }
    out
}

fn descramble_byte(b: u8) -> u8 {
    permute_bits(b as u32, &PCM_BYTE_PERMUTATION) as u8
}

fn descramble_address(addr: u32) -> u32 {
    permute_bits(addr, &PCM_ADDRESS_PERMUTATION)
}

impl PcmRom {
    /// Loads 1-3 raw PCM ROM file images (each `ROLAND`-tagged, size a
    /// multiple of 1 MiB) and descrambles them into one flat byte array.
    pub fn load(roms: &[Vec<u8>]) -> Sc55Result<Self> {
        if roms.is_empty() || roms.len() > 3 {
            return Err(Sc55Error::RomWrongSize {
                expected: 1,
                actual: roms.len(),
            });
        }

        let mut banks: Vec<Vec<u8>> = Vec::with_capacity(roms.len());
        for rom in roms {
            if rom.len() % (1024 * 1024) != 0 || rom.len() < 1024 * 1024 {
                return Err(Sc55Error::RomWrongSize {
                    expected: 1024 * 1024,
                    actual: rom.len(),
                });
            }
            banks.push(descramble_rom_file(rom));
        }

        // Banks map into the flat address space at {0x000000, 0x100000,
        // 0x100000, 0x200000} for raw-bank indices {0,1,2,4}; with 1-3
        // physical ROM files we only ever see bank 0 and (if present) bank 1.
        let total_len = banks.iter().map(|b| b.len()).sum::<usize>().max(0x300000);
        let mut data = vec![0u8; total_len];
        let mut offset = 0usize;
        for bank in &banks {
            data[offset..offset + bank.len()].copy_from_slice(bank);
            offset += bank.len();
        }

        Ok(PcmRom { data })
    }

    /// Resolves a 24-bit hardware sample address into the flat bank-mapped
    /// address used to index `data`, per the bank-nibble table in `get_samples`.
    fn resolve_bank_address(address: u32) -> Sc55Result<usize> {
        let bank_selector = (address & 0x700000) >> 20;
        let bank = match bank_selector {
            0 => 0x000000,
            1 | 2 => 0x100000,
            4 => 0x200000,
            _ => return Err(Sc55Error::RomPermutationInvalid),
        };
        Ok(((address & 0xFFFFF) as usize) | bank)
    }

    /// Reads one decoded PCM sample at `address + index`, applying the
    /// self-referential nibble-shift the hardware uses to restore dynamic
    /// range lost to the 8-bit-per-sample storage format.
    pub fn sample_at(&self, address: u32, index: u32) -> Sc55Result<i16> {
        let sample_address = address.wrapping_add(index);
        let rom_address = Self::resolve_bank_address(sample_address)?;
        if rom_address >= self.data.len() {
            return Err(Sc55Error::RomPermutationInvalid);
        }
        let data_byte = self.data[rom_address];

        let shift_byte_addr =
            ((sample_address & 0xFFFFF) >> 5) as usize | (sample_address & 0xF00000) as usize;
        let shift_byte_addr = Self::resolve_bank_address(shift_byte_addr as u32)?;
        if shift_byte_addr >= self.data.len() {
            return Err(Sc55Error::RomPermutationInvalid);
        }
        let shift_source = self.data[shift_byte_addr];
        let shift = if sample_address & 0x10 != 0 {
            shift_source >> 4
        } else {
            shift_source & 0x0F
        };

        let widened = (data_byte as i8 as i32) << shift;
        let sample = ((widened << 14) >> 1) as i32;
        Ok(sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Descrambles one physical ROM file: the byte-value permutation applies to
/// every byte, the address permutation determines which *position* each
/// decoded byte lands at. The first `PCM_UNSCRAMBLED_PREFIX` bytes/addresses
/// pass through untouched.
fn descramble_rom_file(rom: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; rom.len()];

    for addr in 0..PCM_UNSCRAMBLED_PREFIX.min(rom.len()) {
        out[addr] = rom[addr];
    }

    for addr in PCM_UNSCRAMBLED_PREFIX..rom.len() {
        let descrambled_addr = descramble_address(addr as u32) as usize;
        if descrambled_addr < rom.len() {
            out[descrambled_addr] = descramble_byte(rom[addr]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_sized_rom() {
        let rom = vec![0u8; 500];
        let err = PcmRom::load(&[rom]).unwrap_err();
        assert!(matches!(err, Sc55Error::RomWrongSize { .. }));
    }

    #[test]
    fn rejects_too_many_files() {
        let rom = vec![0u8; 1024 * 1024];
        let err = PcmRom::load(&[rom.clone(), rom.clone(), rom.clone(), rom]).unwrap_err();
        assert!(matches!(err, Sc55Error::RomWrongSize { .. }));
    }

    #[test]
    fn descramble_is_a_bijection_on_addresses() {
        let mut seen = std::collections::HashSet::new();
        for addr in 0u32..(1 << 20) {
            let d = descramble_address(addr);
            assert!(seen.insert(d), "address {addr:#x} collided after descramble");
        }
    }

    #[test]
    fn bank_address_rejects_unused_selector() {
        assert!(PcmRom::resolve_bank_address(0x300000).is_err());
        assert!(PcmRom::resolve_bank_address(0x500000).is_err());
    }

    #[test]
    fn loads_single_one_meg_rom() {
        let rom = vec![0xAAu8; 1024 * 1024];
        let pcm = PcmRom::load(&[rom]).unwrap();
        assert!(pcm.len() >= 0x300000);
    }
}
