//! Shifts every file-offset field in an ELF file's headers (but not the
//! underlying section/segment data, which the caller is responsible for
//! relocating separately, e.g. by prepending a loadable payload) by a
//! fixed delta.
//!
//! Like the original tool, this primitive never physically moves the
//! section/program header tables either: it only rewrites the numeric
//! offset fields. That means a file shifted by `d` without an
//! accompanying physical move "lies" about where its tables are, the
//! header says `recorded + d` but the bytes are still at `recorded`. A
//! later call meant to undo that shift (same magnitude, opposite sign)
//! must still be able to find those bytes, so table lookups here fall
//! back to `recorded + delta` whenever the recorded offset itself no
//! longer fits the file.

use object::elf::{ProgramHeader64, SectionHeader64};
use object::Endianness;

use super::MappedFile;
use crate::error::{Result, XwrapError};

pub fn run(file: &mut MappedFile, delta: i64) -> Result<()> {
    let endian = file.endian()?;

    let (shoff, shnum) = {
        let hdr = file.header()?;
        (hdr.e_shoff.get(endian), hdr.e_shnum.get(endian) as usize)
    };
    let (phoff, phnum) = {
        let hdr = file.header()?;
        (hdr.e_phoff.get(endian), hdr.e_phnum.get(endian) as usize)
    };

    if shoff != 0 {
        let shdrs = locate_mut::<SectionHeader64<Endianness>>(file, shoff, shnum, delta, "section")?;
        for shdr in shdrs.iter_mut() {
            let off = shdr.sh_offset.get(endian);
            shdr.sh_offset.set(endian, shift(off, delta));
        }
    }

    if phoff != 0 {
        let phdrs = locate_mut::<ProgramHeader64<Endianness>>(file, phoff, phnum, delta, "program")?;
        for phdr in phdrs.iter_mut() {
            let off = phdr.p_offset.get(endian);
            phdr.p_offset.set(endian, shift(off, delta));
        }
    }

    {
        let hdr = file.header_mut()?;
        if phoff != 0 {
            hdr.e_phoff.set(endian, shift(phoff, delta));
        }
        if shoff != 0 {
            hdr.e_shoff.set(endian, shift(shoff, delta));
        }
    }

    Ok(())
}

/// Locates `count` entries of `T` at `recorded_offset`, falling back to
/// `recorded_offset + delta` if the recorded offset doesn't fit the file
/// any more — the situation a prior, not-yet-physically-applied call to
/// this same primitive leaves behind.
fn locate_mut<'a, T: object::Pod>(
    file: &'a mut MappedFile,
    recorded_offset: u64,
    count: usize,
    delta: i64,
    kind: &str,
) -> Result<&'a mut [T]> {
    let size = count * std::mem::size_of::<T>();
    let data_len = file.data().len();
    let fits = |off: u64| (off as usize).checked_add(size).is_some_and(|end| end <= data_len);

    let use_offset = if fits(recorded_offset) {
        recorded_offset
    } else {
        shift(recorded_offset, delta)
    };

    let err_path = file.path().to_path_buf();
    let off = use_offset as usize;
    let rest = file
        .data_mut()
        .get_mut(off..)
        .ok_or_else(|| XwrapError::FormatUnsupported {
            path: err_path.clone(),
            reason: format!("{kind} header table out of bounds"),
        })?;
    object::pod::slice_from_bytes_mut(rest, count)
        .map(|(s, _)| s)
        .map_err(|_| XwrapError::FormatUnsupported {
            path: err_path,
            reason: format!("truncated {kind} header table"),
        })
}

fn shift(offset: u64, delta: i64) -> u64 {
    (offset as i64 + delta) as u64
}
