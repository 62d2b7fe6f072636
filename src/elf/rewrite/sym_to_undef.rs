//! Turns a defined symbol into an undefined one, used to force a symbol
//! that would otherwise resolve locally to instead resolve through the
//! dynamic linker (the half of a `--wrap` rewrite that demotes the
//! original definition once the wrapper has taken its name).

use object::elf::{SHT_SYMTAB, STB_GLOBAL, STT_NOTYPE};

use super::{MappedFile, SHN_UNDEF};
use crate::error::{Result, XwrapError};

const GLOBAL_NOTYPE: u8 = (STB_GLOBAL << 4) | STT_NOTYPE;

/// Demotes every symbol in `.symtab` named `name` to `SHN_UNDEF`, zeroing
/// its value and size and resetting its binding/type to (global,
/// notype). Returns how many symbols were changed.
pub fn run(file: &mut MappedFile, name: &str) -> Result<usize> {
    let symtab_idx = file
        .find_section(SHT_SYMTAB)?
        .ok_or_else(|| XwrapError::FormatUnsupported {
            path: file.path().to_path_buf(),
            reason: "no .symtab section".to_string(),
        })?;
    let endian = file.endian()?;
    let strtab_idx = file.section_headers()?[symtab_idx].sh_link.get(endian) as usize;

    let symbols = file.symbols(symtab_idx)?;
    let mut targets = Vec::new();
    for (i, sym) in symbols.iter().enumerate() {
        let shndx = sym.st_shndx.get(endian);
        if shndx == SHN_UNDEF {
            continue;
        }
        let sym_name = file.name_of(strtab_idx, sym.st_name, endian)?;
        if sym_name == name {
            targets.push(i);
        }
    }

    let count = targets.len();
    if count > 0 {
        let symbols = file.symbols_mut(symtab_idx)?;
        for i in targets {
            symbols[i].st_shndx.set(endian, SHN_UNDEF);
            symbols[i].st_value.set(endian, 0);
            symbols[i].st_size.set(endian, 0);
            symbols[i].st_info = GLOBAL_NOTYPE;
        }
    }
    Ok(count)
}
