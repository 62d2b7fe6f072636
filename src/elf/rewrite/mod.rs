//! The eight in-place ELF rewrite primitives and the read-write whole-file
//! mapping ([`MappedFile`]) they share.
//!
//! Each primitive mirrors one of the original standalone tools: it opens
//! its own `PROT_READ|PROT_WRITE, MAP_SHARED` mapping of a single file
//! (never going through [`crate::elf::fmap::Fmap`], which is read-only and
//! meant for classification) and mutates header/section/symbol fields
//! directly in the mapped bytes. None of them copy or resize the file;
//! every rewrite fits data already present at a fixed offset.

pub mod abs_to_section;
pub mod dyn_tag_append;
pub mod normalize_relocs;
pub mod pie_to_rel;
pub mod shift_file_offsets;
pub mod sym_to_dyn_reconcile;
pub mod sym_to_undef;
pub mod und_protect;

use memmap2::{MmapMut, MmapOptions};
use object::elf::{Dyn64, FileHeader64, ProgramHeader64, Rela64, SectionHeader64, Sym64};
use object::{Endianness, U32};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::elf::fmap::str_from_table;
use crate::error::{Result, XwrapError};

/// A whole-file, read-write memory mapping used by the rewrite primitives.
pub struct MappedFile {
    mmap: MmapMut,
    path: PathBuf,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| XwrapError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        // SAFETY: the file is opened read-write for the exclusive use of
        // this process for the lifetime of the mapping; concurrent
        // external modification is the caller's responsibility to avoid,
        // matching the original tools' own bare `mmap` calls.
        let mmap = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|source| XwrapError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
        };
        Ok(MappedFile {
            mmap,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush().map_err(|source| XwrapError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn format_error(&self, reason: impl Into<String>) -> XwrapError {
        XwrapError::FormatUnsupported {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    pub fn header(&self) -> Result<&FileHeader64<Endianness>> {
        object::pod::from_bytes(self.data())
            .map(|(hdr, _)| hdr)
            .map_err(|_| self.format_error("truncated ELF header"))
    }

    pub fn header_mut(&mut self) -> Result<&mut FileHeader64<Endianness>> {
        let err_path = self.path.clone();
        object::pod::from_bytes_mut(self.data_mut())
            .map(|(hdr, _)| hdr)
            .map_err(|_| XwrapError::FormatUnsupported {
                path: err_path,
                reason: "truncated ELF header".to_string(),
            })
    }

    pub fn endian(&self) -> Result<Endianness> {
        if self.header()?.e_ident.data == object::elf::ELFDATA2LSB {
            Ok(Endianness::Little)
        } else {
            Err(self.format_error("unsupported ELF encoding"))
        }
    }

    fn shoff_shnum(&self) -> Result<(usize, usize, Endianness)> {
        let hdr = self.header()?;
        let endian = self.endian()?;
        Ok((
            hdr.e_shoff.get(endian) as usize,
            hdr.e_shnum.get(endian) as usize,
            endian,
        ))
    }

    pub fn section_headers(&self) -> Result<&[SectionHeader64<Endianness>]> {
        let (off, count, _) = self.shoff_shnum()?;
        let rest = self
            .data()
            .get(off..)
            .ok_or_else(|| self.format_error("section header table out of bounds"))?;
        object::pod::slice_from_bytes(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| self.format_error("truncated section header table"))
    }

    pub fn section_headers_mut(&mut self) -> Result<&mut [SectionHeader64<Endianness>]> {
        let (off, count, _) = self.shoff_shnum()?;
        let err_path = self.path.clone();
        let rest = self
            .data_mut()
            .get_mut(off..)
            .ok_or_else(|| XwrapError::FormatUnsupported {
                path: err_path.clone(),
                reason: "section header table out of bounds".to_string(),
            })?;
        object::pod::slice_from_bytes_mut(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| XwrapError::FormatUnsupported {
                path: err_path,
                reason: "truncated section header table".to_string(),
            })
    }

    fn phoff_phnum(&self) -> Result<(usize, usize, Endianness)> {
        let hdr = self.header()?;
        let endian = self.endian()?;
        Ok((
            hdr.e_phoff.get(endian) as usize,
            hdr.e_phnum.get(endian) as usize,
            endian,
        ))
    }

    pub fn program_headers_mut(&mut self) -> Result<&mut [ProgramHeader64<Endianness>]> {
        let (off, count, _) = self.phoff_phnum()?;
        let err_path = self.path.clone();
        let rest = self
            .data_mut()
            .get_mut(off..)
            .ok_or_else(|| XwrapError::FormatUnsupported {
                path: err_path.clone(),
                reason: "program header table out of bounds".to_string(),
            })?;
        object::pod::slice_from_bytes_mut(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| XwrapError::FormatUnsupported {
                path: err_path,
                reason: "truncated program header table".to_string(),
            })
    }

    pub fn shstrtab(&self) -> Result<&[u8]> {
        let hdr = self.header()?;
        let endian = self.endian()?;
        let idx = hdr.e_shstrndx.get(endian) as usize;
        let shdrs = self.section_headers()?;
        let shdr = shdrs
            .get(idx)
            .ok_or_else(|| self.format_error("missing section header string table"))?;
        self.section_bytes(shdr, endian)
    }

    pub fn section_bytes(
        &self,
        shdr: &SectionHeader64<Endianness>,
        endian: Endianness,
    ) -> Result<&[u8]> {
        let off = shdr.sh_offset.get(endian) as usize;
        let size = shdr.sh_size.get(endian) as usize;
        self.data()
            .get(off..off + size)
            .ok_or_else(|| self.format_error("section data out of bounds"))
    }

    pub fn section_name_at(&self, idx: usize) -> Result<String> {
        let endian = self.endian()?;
        let shdrs = self.section_headers()?;
        let shdr = shdrs
            .get(idx)
            .ok_or_else(|| self.format_error("section index out of bounds"))?;
        let name_off = shdr.sh_name.get(endian) as usize;
        let shstrtab = self.shstrtab()?;
        str_from_table(shstrtab, name_off)
            .map(str::to_string)
            .ok_or_else(|| self.format_error("section name out of bounds"))
    }

    /// Finds the first section header of the given `sh_type`, returning
    /// its index.
    pub fn find_section(&self, sh_type: u32) -> Result<Option<usize>> {
        let endian = self.endian()?;
        Ok(self
            .section_headers()?
            .iter()
            .position(|s| s.sh_type.get(endian) == sh_type))
    }

    /// Byte range (offset, size) of section `idx`.
    pub fn section_range(&self, idx: usize) -> Result<(usize, usize)> {
        let endian = self.endian()?;
        let shdr = self
            .section_headers()?
            .get(idx)
            .ok_or_else(|| self.format_error("section index out of bounds"))?;
        Ok((
            shdr.sh_offset.get(endian) as usize,
            shdr.sh_size.get(endian) as usize,
        ))
    }

    pub fn symbols_mut(&mut self, symtab_idx: usize) -> Result<&mut [Sym64<Endianness>]> {
        let (off, size) = self.section_range(symtab_idx)?;
        let count = size / std::mem::size_of::<Sym64<Endianness>>();
        let err_path = self.path.clone();
        let rest = self
            .data_mut()
            .get_mut(off..off + size)
            .ok_or_else(|| XwrapError::FormatUnsupported {
                path: err_path.clone(),
                reason: "symbol table out of bounds".to_string(),
            })?;
        object::pod::slice_from_bytes_mut(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| XwrapError::FormatUnsupported {
                path: err_path,
                reason: "truncated symbol table".to_string(),
            })
    }

    pub fn symbols(&self, symtab_idx: usize) -> Result<&[Sym64<Endianness>]> {
        let (off, size) = self.section_range(symtab_idx)?;
        let count = size / std::mem::size_of::<Sym64<Endianness>>();
        let rest = self
            .data()
            .get(off..off + size)
            .ok_or_else(|| self.format_error("symbol table out of bounds"))?;
        object::pod::slice_from_bytes(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| self.format_error("truncated symbol table"))
    }

    pub fn dynamic_entries_mut(&mut self, dynamic_idx: usize) -> Result<&mut [Dyn64<Endianness>]> {
        let (off, size) = self.section_range(dynamic_idx)?;
        let count = size / std::mem::size_of::<Dyn64<Endianness>>();
        let err_path = self.path.clone();
        let rest = self
            .data_mut()
            .get_mut(off..off + size)
            .ok_or_else(|| XwrapError::FormatUnsupported {
                path: err_path.clone(),
                reason: "dynamic section out of bounds".to_string(),
            })?;
        object::pod::slice_from_bytes_mut(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| XwrapError::FormatUnsupported {
                path: err_path,
                reason: "truncated dynamic section".to_string(),
            })
    }

    pub fn relocations_mut(&mut self, rela_idx: usize) -> Result<&mut [Rela64<Endianness>]> {
        let (off, size) = self.section_range(rela_idx)?;
        let count = size / std::mem::size_of::<Rela64<Endianness>>();
        let err_path = self.path.clone();
        let rest = self
            .data_mut()
            .get_mut(off..off + size)
            .ok_or_else(|| XwrapError::FormatUnsupported {
                path: err_path.clone(),
                reason: "relocation section out of bounds".to_string(),
            })?;
        object::pod::slice_from_bytes_mut(rest, count)
            .map(|(s, _)| s)
            .map_err(|_| XwrapError::FormatUnsupported {
                path: err_path,
                reason: "truncated relocation section".to_string(),
            })
    }

    pub fn name_of(&self, strtab_idx: usize, name: U32<Endianness>, endian: Endianness) -> Result<String> {
        let (off, size) = self.section_range(strtab_idx)?;
        let strtab = self
            .data()
            .get(off..off + size)
            .ok_or_else(|| self.format_error("string table out of bounds"))?;
        str_from_table(strtab, name.get(endian) as usize)
            .map(str::to_string)
            .ok_or_else(|| self.format_error("symbol name out of bounds"))
    }
}

pub const SHN_UNDEF: u16 = object::elf::SHN_UNDEF;
pub const SHN_ABS: u16 = object::elf::SHN_ABS;
pub const SHN_LORESERVE: u16 = object::elf::SHN_LORESERVE;
