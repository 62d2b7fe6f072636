//! Rewrites relocations so that references into non-debugging sections go
//! through the stable `STT_SECTION` symbol, while references *from*
//! debugging sections (which DWARF consumers expect to see as
//! named+offset, not section+offset) go the other way, through whichever
//! named symbol the section's zero-offset alias provides.

use std::collections::HashMap;

use object::elf::{
    SHT_RELA, SHT_SYMTAB, STT_COMMON, STT_FUNC, STT_NOTYPE, STT_OBJECT, STT_SECTION,
};

use super::{MappedFile, SHN_LORESERVE, SHN_UNDEF};
use crate::elf::fmap::str_from_table;
use crate::error::Result;

fn is_debugging_section(name: &str) -> bool {
    name.starts_with(".debug_") || name == ".eh_frame"
}

fn is_ordinary_type(ty: u8) -> bool {
    matches!(ty, STT_NOTYPE | STT_OBJECT | STT_FUNC | STT_COMMON)
}

/// Runs the rewrite. When `symname` is `Some`, only that name is eligible
/// to serve as a zero-offset alias (matching the original tool's mode
/// for normalizing a single `--wrap`ped symbol rather than the whole
/// file).
pub fn run(file: &mut MappedFile, symname: Option<&str>) -> Result<usize> {
    let Some(symtab_idx) = file.find_section(SHT_SYMTAB)? else {
        return Ok(0);
    };
    let endian = file.endian()?;
    let strtab_idx = file.section_headers()?[symtab_idx].sh_link.get(endian) as usize;
    let (strtab_off, strtab_size) = file.section_range(strtab_idx)?;
    let strtab: Vec<u8> = file.data()[strtab_off..strtab_off + strtab_size].to_vec();

    let section_count = file.section_headers()?.len();
    let section_names: Vec<String> = (0..section_count)
        .map(|i| file.section_name_at(i).unwrap_or_default())
        .collect();
    let debugging: Vec<bool> = section_names.iter().map(|n| is_debugging_section(n)).collect();

    let symbols = file.symbols(symtab_idx)?.to_vec();

    // section index -> symtab index of its STT_SECTION symbol.
    let mut section_symbol: HashMap<u16, u32> = HashMap::new();
    // section index -> symtab index of its associated zero-offset named alias.
    let mut zero_offset: HashMap<u16, u32> = HashMap::new();

    for (i, sym) in symbols.iter().enumerate() {
        let shndx = sym.st_shndx.get(endian);
        let ty = sym.st_info & 0xf;
        if ty == STT_SECTION {
            section_symbol.entry(shndx).or_insert(i as u32);
            continue;
        }
        if shndx == SHN_UNDEF || shndx >= SHN_LORESERVE {
            continue;
        }
        if sym.st_value.get(endian) != 0 {
            continue;
        }
        let name_off = sym.st_name.get(endian) as usize;
        let Some(name) = str_from_table(&strtab, name_off).filter(|n| !n.is_empty()) else {
            continue;
        };
        if let Some(want) = symname {
            if name != want {
                continue;
            }
        }
        // Never sorted: the first zero-offset alias encountered for a
        // section is kept; later candidates are only logged.
        if let Some(&existing) = zero_offset.get(&shndx) {
            if existing != i as u32 {
                tracing::warn!(
                    section = shndx,
                    first = existing,
                    other = i,
                    "multiple zero-offset candidates for section"
                );
            }
            continue;
        }
        zero_offset.insert(shndx, i as u32);
    }

    let mut changed = 0;
    for sidx in 0..section_count {
        let (sh_type, sh_info) = {
            let shdr = &file.section_headers()?[sidx];
            (shdr.sh_type.get(endian), shdr.sh_info.get(endian))
        };
        if sh_type != SHT_RELA {
            continue;
        }
        let target = sh_info as usize;
        let target_is_debug = debugging.get(target).copied().unwrap_or(false);

        let relocs = file.relocations_mut(sidx)?;
        for rela in relocs.iter_mut() {
            let info = rela.r_info.get(endian);
            let sym_idx = (info >> 32) as u32;
            let r_type = info as u32;
            let Some(sym) = symbols.get(sym_idx as usize) else {
                continue;
            };
            let sym_type = sym.st_info & 0xf;
            let sym_shndx = sym.st_shndx.get(endian);

            if target_is_debug {
                let name_off = sym.st_name.get(endian) as usize;
                let named = str_from_table(&strtab, name_off)
                    .map(|n| !n.is_empty())
                    .unwrap_or(false);
                if is_ordinary_type(sym_type) && named && sym.st_value.get(endian) == 0 {
                    if let Some(&sec_sym) = section_symbol.get(&sym_shndx) {
                        if sec_sym != sym_idx {
                            rela.r_info.set(endian, ((sec_sym as u64) << 32) | r_type as u64);
                            changed += 1;
                        }
                    }
                }
            } else if sym_type == STT_SECTION {
                if let Some(&zsym) = zero_offset.get(&sym_shndx) {
                    if sym_shndx as usize != target {
                        rela.r_info.set(endian, ((zsym as u64) << 32) | r_type as u64);
                        changed += 1;
                    }
                }
            }
        }
    }
    Ok(changed)
}
