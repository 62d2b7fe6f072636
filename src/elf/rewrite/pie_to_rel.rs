//! Converts a static position-independent executable (`ET_DYN`, no
//! `DT_NEEDED`) into a relocatable object (`ET_REL`) suitable for feeding
//! back into a link: symbol values are rebased from load addresses to
//! section-relative offsets, section addresses are cleared, and the
//! program header table is dropped.

use object::elf::{ET_REL, SHF_ALLOC, SHN_ABS, SHN_UNDEF, SHT_SYMTAB};

use super::MappedFile;
use crate::error::Result;

pub fn run(file: &mut MappedFile) -> Result<()> {
    let endian = file.endian()?;

    let section_addrs: Vec<u64> = file
        .section_headers()?
        .iter()
        .map(|s| s.sh_addr.get(endian))
        .collect();

    if let Some(symtab_idx) = file.find_section(SHT_SYMTAB)? {
        let symbols = file.symbols_mut(symtab_idx)?;
        for sym in symbols.iter_mut() {
            let shndx = sym.st_shndx.get(endian);
            if shndx == SHN_ABS || shndx == SHN_UNDEF || shndx as usize >= section_addrs.len() {
                continue;
            }
            let addr = section_addrs[shndx as usize];
            let value = sym.st_value.get(endian);
            sym.st_value.set(endian, value.wrapping_sub(addr));
        }
    }

    {
        let shdrs = file.section_headers_mut()?;
        for shdr in shdrs.iter_mut() {
            if shdr.sh_flags.get(endian) & u64::from(SHF_ALLOC) != 0 {
                shdr.sh_addr.set(endian, 0);
            }
        }
    }

    let hdr = file.header_mut()?;
    hdr.e_type.set(endian, ET_REL);
    hdr.e_phoff.set(endian, 0);
    hdr.e_phentsize.set(endian, 0);
    hdr.e_phnum.set(endian, 0);
    Ok(())
}
