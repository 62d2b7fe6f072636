//! Input classification: walking a driver input (a loose object or an
//! archive of objects) and applying a caller predicate to every symbol
//! table entry found, tagged with the file path and the byte offset of
//! the member it came from.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use object::elf::{Sym64, SHT_SYMTAB, STT_FUNC, STT_OBJECT};
use object::Endianness;

use crate::elf::fmap::{archive_members, str_from_table, ElfView, Fmap};
use crate::error::Result;

/// Walks every object-file view reachable from `path` (the file itself,
/// or every member of a thin archive) and calls `visit` with each.
pub fn for_each_object_view<F>(path: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(&ElfView, u64) -> Result<()>,
{
    let file = File::open(path).map_err(|source| crate::error::XwrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let top = Fmap::open(path, &file, 0)?;
    if top.is_archive() {
        for member in archive_members(&top) {
            let member_map = Fmap::open(path, &file, member.payload_offset)?;
            if !member_map.is_elf() {
                continue;
            }
            let view = ElfView::new(member_map)?;
            visit(&view, member.payload_offset)?;
        }
    } else if top.is_elf() {
        let view = ElfView::new(top)?;
        visit(&view, 0)?;
    }
    Ok(())
}

/// `(symbol, name)` pairs in `view`'s `.symtab` for which `pred` holds.
pub fn enumerate_symbols_matching<P>(
    view: &ElfView,
    mut pred: P,
) -> Result<Vec<(Sym64<Endianness>, String)>>
where
    P: FnMut(&Sym64<Endianness>, &str) -> bool,
{
    let endian = view.endian()?;
    let Some(symtab_idx) = view.find_section(SHT_SYMTAB, None)? else {
        return Ok(Vec::new());
    };
    let shdrs = view.section_headers()?;
    let symtab_shdr = &shdrs[symtab_idx];
    let strtab_shdr = &shdrs[symtab_shdr.sh_link.get(endian) as usize];
    let strtab = view.section_data(strtab_shdr, endian)?;
    let symtab = view.section_data(symtab_shdr, endian)?;
    let (symbols, _) = object::pod::slice_from_bytes::<Sym64<Endianness>>(
        symtab,
        symtab.len() / std::mem::size_of::<Sym64<Endianness>>(),
    )
    .map_err(|_| crate::error::XwrapError::FormatUnsupported {
        path: view.path().to_path_buf(),
        reason: "truncated symbol table".to_string(),
    })?;

    let mut out = Vec::new();
    for sym in symbols {
        let name_off = sym.st_name.get(endian) as usize;
        let Some(name) = str_from_table(strtab, name_off) else {
            continue;
        };
        if pred(sym, name) {
            out.push((*sym, name.to_string()));
        }
    }
    Ok(out)
}

/// The predicate xwrap uses: a defined `OBJECT`/`FUNC` symbol whose name
/// is one of the orchestration's wrap targets.
pub fn is_xwrap_target(
    targets: &std::collections::HashSet<String>,
) -> impl Fn(&Sym64<Endianness>, &str) -> bool + '_ {
    move |sym, name| {
        let ty = sym.st_info & 0xf;
        if ty != STT_OBJECT && ty != STT_FUNC {
            return false;
        }
        let endian = Endianness::Little;
        let shndx = sym.st_shndx.get(endian);
        if shndx == object::elf::SHN_UNDEF || shndx == object::elf::SHN_ABS {
            return false;
        }
        targets.contains(name)
    }
}

/// Classifies every input path, producing the `(path, offset) -> names`
/// map the orchestrator needs to decide which `claim_file` calls to act
/// on and which `--wrap` options are already satisfied.
pub fn classify_inputs(
    paths: &[PathBuf],
    targets: &std::collections::HashSet<String>,
) -> Result<BTreeMap<(PathBuf, u64), std::collections::HashSet<String>>> {
    let mut map = BTreeMap::new();
    let pred = is_xwrap_target(targets);
    for path in paths {
        for_each_object_view(path, |view, offset| {
            let matches = enumerate_symbols_matching(view, &pred)?;
            if !matches.is_empty() {
                let names: std::collections::HashSet<String> =
                    matches.into_iter().map(|(_, name)| name).collect();
                map.insert((path.clone(), offset), names);
            }
            Ok(())
        })?;
    }
    Ok(map)
}
