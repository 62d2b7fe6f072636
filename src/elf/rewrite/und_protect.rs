//! Marks every undefined, default/internal-visibility dynamic symbol as
//! `STV_PROTECTED`, preventing the dynamic linker from letting a
//! preloaded or later-loaded object's definition interpose over these
//! references at runtime.

use object::elf::{STV_HIDDEN, STV_PROTECTED, SHT_DYNSYM};

use super::{MappedFile, SHN_UNDEF};
use crate::error::Result;

const STV_MASK: u8 = 0x3;

pub fn run(file: &mut MappedFile) -> Result<usize> {
    let Some(dynsym_idx) = file.find_section(SHT_DYNSYM)? else {
        return Ok(0);
    };
    let endian = file.endian()?;
    let symbols = file.symbols_mut(dynsym_idx)?;
    let mut changed = 0;
    for sym in symbols.iter_mut() {
        if sym.st_shndx.get(endian) != SHN_UNDEF {
            continue;
        }
        let visibility = sym.st_other & STV_MASK;
        if visibility == STV_HIDDEN || visibility == STV_PROTECTED {
            continue;
        }
        sym.st_other = (sym.st_other & !STV_MASK) | STV_PROTECTED;
        changed += 1;
    }
    Ok(changed)
}
