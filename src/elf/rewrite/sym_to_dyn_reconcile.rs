//! Reconciles `.dynsym` against `.symtab`: fixes up a dynamic symbol's
//! definedness/value when a same-named static symbol disagrees, and
//! repairs a dynamic symbol's name when it can be matched to a
//! differently-named static symbol at the same address. The latter case
//! rewrites `st_name` in place and requires recomputing `.hash`.
//!
//! Matching a renamed symbol's new name back into `.dynstr` is done with
//! a raw substring search over the flat string-table bytes, exactly as
//! the original tool did with `strstr`. This is not a word-boundary-safe
//! lookup: a name that happens to be a substring of a longer name in
//! `.dynstr` can match the wrong offset. That hazard is inherited
//! deliberately rather than silently fixed, to keep this rewrite's
//! observable behavior identical to the tool it replaces.

use std::collections::{HashMap, HashSet};

use object::elf::{SHN_ABS, SHN_UNDEF, SHT_DYNSYM, SHT_GNU_HASH, SHT_HASH, SHT_SYMTAB};

use super::MappedFile;
use crate::elf::fmap::str_from_table;
use crate::error::{Result, XwrapError};

fn strtab_find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

struct SymtabIndex {
    by_name: HashMap<String, u32>,
    blacklisted_names: HashSet<String>,
    by_addr: HashMap<u64, u32>,
    blacklisted_addrs: HashSet<u64>,
}

fn index_symtab(file: &MappedFile, symtab_idx: usize, strtab_idx: usize) -> Result<SymtabIndex> {
    let endian = file.endian()?;
    let (strtab_off, strtab_size) = file.section_range(strtab_idx)?;
    let strtab = &file.data()[strtab_off..strtab_off + strtab_size];

    let mut by_name = HashMap::new();
    let mut blacklisted_names = HashSet::new();
    let mut by_addr = HashMap::new();
    let mut blacklisted_addrs = HashSet::new();

    for (i, sym) in file.symbols(symtab_idx)?.iter().enumerate() {
        let name_off = sym.st_name.get(endian) as usize;
        if let Some(name) = str_from_table(strtab, name_off).filter(|n| !n.is_empty()) {
            let name = name.to_string();
            if by_name.insert(name.clone(), i as u32).is_some() {
                blacklisted_names.insert(name);
            }
        }
        let addr = sym.st_value.get(endian);
        if by_addr.insert(addr, i as u32).is_some() {
            blacklisted_addrs.insert(addr);
        }
    }

    Ok(SymtabIndex {
        by_name,
        blacklisted_names,
        by_addr,
        blacklisted_addrs,
    })
}

pub fn run(file: &mut MappedFile) -> Result<usize> {
    let Some(symtab_idx) = file.find_section(SHT_SYMTAB)? else {
        return Ok(0);
    };
    let Some(dynsym_idx) = file.find_section(SHT_DYNSYM)? else {
        return Ok(0);
    };
    let endian = file.endian()?;
    let symtab_strtab_idx = file.section_headers()?[symtab_idx].sh_link.get(endian) as usize;
    let dynsym_strtab_idx = file.section_headers()?[dynsym_idx].sh_link.get(endian) as usize;

    let index = index_symtab(file, symtab_idx, symtab_strtab_idx)?;

    let (dynstr_off, dynstr_size) = file.section_range(dynsym_strtab_idx)?;
    let dynstr: Vec<u8> = file.data()[dynstr_off..dynstr_off + dynstr_size].to_vec();

    let symtab_syms = file.symbols(symtab_idx)?.to_vec();
    let dynsyms = file.symbols(dynsym_idx)?;

    // (dynsym index, new st_shndx, new st_value, new st_name)
    let mut shndx_value_patches: Vec<(u32, Option<u16>, Option<u64>, Option<u32>)> = Vec::new();
    let mut needs_hash_rebuild = false;

    for (i, dsym) in dynsyms.iter().enumerate() {
        let name_off = dsym.st_name.get(endian) as usize;
        let dyn_name = str_from_table(&dynstr, name_off).unwrap_or("");
        if dyn_name.is_empty() {
            continue;
        }

        if index.blacklisted_names.contains(dyn_name) {
            continue;
        }

        if let Some(&sidx) = index.by_name.get(dyn_name) {
            let ssym = &symtab_syms[sidx as usize];
            let dyn_shndx = dsym.st_shndx.get(endian);
            let sym_shndx = ssym.st_shndx.get(endian);
            let dyn_und = dyn_shndx == SHN_UNDEF;
            let sym_und = sym_shndx == SHN_UNDEF;
            let dyn_abs = dyn_shndx == SHN_ABS;
            let sym_abs = sym_shndx == SHN_ABS;

            if dyn_und != sym_und || dyn_abs != sym_abs {
                shndx_value_patches.push((
                    i as u32,
                    Some(sym_shndx),
                    Some(ssym.st_value.get(endian)),
                    None,
                ));
            } else if dsym.st_value.get(endian) != ssym.st_value.get(endian) {
                shndx_value_patches.push((i as u32, None, Some(ssym.st_value.get(endian)), None));
            }
            continue;
        }

        let addr = dsym.st_value.get(endian);
        if index.blacklisted_addrs.contains(&addr) {
            continue;
        }
        let Some(&sidx) = index.by_addr.get(&addr) else {
            continue;
        };
        let ssym = &symtab_syms[sidx as usize];
        let sym_name_off = ssym.st_name.get(endian) as usize;
        let (sym_strtab_off, sym_strtab_size) = file.section_range(symtab_strtab_idx)?;
        let symtab_strtab = &file.data()[sym_strtab_off..sym_strtab_off + sym_strtab_size];
        let Some(sym_name) = str_from_table(symtab_strtab, sym_name_off).filter(|n| !n.is_empty())
        else {
            continue;
        };
        if sym_name == dyn_name {
            continue;
        }
        if let Some(new_off) = strtab_find(&dynstr, sym_name.as_bytes()) {
            shndx_value_patches.push((i as u32, None, None, Some(new_off as u32)));
            needs_hash_rebuild = true;
        }
    }

    let changed = shndx_value_patches.len();
    if changed > 0 {
        let dynsyms = file.symbols_mut(dynsym_idx)?;
        for (i, shndx, value, name) in shndx_value_patches {
            let target = &mut dynsyms[i as usize];
            if let Some(shndx) = shndx {
                target.st_shndx.set(endian, shndx);
            }
            if let Some(value) = value {
                target.st_value.set(endian, value);
            }
            if let Some(name) = name {
                target.st_name.set(endian, name);
            }
        }
    }

    if needs_hash_rebuild {
        rebuild_sysv_hash(file, dynsym_idx)?;
    }
    Ok(changed)
}

fn elf_hash(name: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in name {
        h = h.wrapping_shl(4).wrapping_add(b as u32);
        let g = h & 0xf000_0000;
        if g != 0 {
            h ^= g >> 24;
        }
        h &= !g;
    }
    h
}

/// Recomputes a `SHT_HASH` table's bucket/chain arrays in place, keeping
/// its existing `nbucket` (the section cannot grow) and requiring
/// `nchain == dynsym count`.
fn rebuild_sysv_hash(file: &mut MappedFile, dynsym_idx: usize) -> Result<()> {
    if file.find_section(SHT_GNU_HASH)?.is_some() {
        return Err(XwrapError::UnimplementedGnuHash);
    }
    let Some(hash_idx) = file.find_section(SHT_HASH)? else {
        return Ok(());
    };
    let endian = file.endian()?;
    let dynsym_strtab_idx = file.section_headers()?[dynsym_idx].sh_link.get(endian) as usize;
    let (dynstr_off, dynstr_size) = file.section_range(dynsym_strtab_idx)?;
    let dynstr: Vec<u8> = file.data()[dynstr_off..dynstr_off + dynstr_size].to_vec();

    let names: Vec<Vec<u8>> = file
        .symbols(dynsym_idx)?
        .iter()
        .map(|s| {
            let off = s.st_name.get(endian) as usize;
            str_from_table(&dynstr, off).unwrap_or("").as_bytes().to_vec()
        })
        .collect();

    let (hash_off, hash_size) = file.section_range(hash_idx)?;
    let words = hash_size / 4;
    let rest = file
        .data_mut()
        .get_mut(hash_off..hash_off + hash_size)
        .ok_or_else(|| XwrapError::FormatUnsupported {
            path: file.path().to_path_buf(),
            reason: "hash table out of bounds".to_string(),
        })?;
    let (table, _) = object::pod::slice_from_bytes_mut::<object::U32<object::Endianness>>(rest, words)
        .map_err(|_| XwrapError::FormatUnsupported {
            path: file.path().to_path_buf(),
            reason: "truncated hash table".to_string(),
        })?;

    let nbucket = table[0].get(endian) as usize;
    let nchain = table[1].get(endian) as usize;
    if nbucket == 0 || nchain != names.len() || words < 2 + nbucket + nchain {
        return Ok(());
    }

    for slot in table[2..2 + nbucket + nchain].iter_mut() {
        slot.set(endian, 0);
    }
    for (i, name) in names.iter().enumerate() {
        if i == 0 || name.is_empty() {
            continue;
        }
        let bucket = (elf_hash(name) as usize) % nbucket;
        let bucket_slot = 2 + bucket;
        let head = table[bucket_slot].get(endian);
        table[bucket_slot].set(endian, i as u32);
        table[2 + nbucket + i].set(endian, head);
    }
    Ok(())
}
