//! Read-only memory-mapped access to an ELF file or archive, used by the
//! input classifier (§4.D) and by the plugin adapter's `claim_file` probe.
//!
//! The standalone rewrite tools (`abs2sectsym`, `sym2und`, ...) do *not*
//! go through this module: they need read-write access to a single whole
//! file, which [`crate::elf::rewrite::MappedFile`] provides directly.
//! This split mirrors the original tool, where the plugin-side `fmap`/
//! `elfmap` helpers are distinct from each standalone tool's inline
//! `mmap(PROT_READ|PROT_WRITE, ...)` call.

use memmap2::{Mmap, MmapOptions};
use object::elf::{FileHeader64, SectionHeader64};
use object::{Endianness, U32};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Result, XwrapError};

fn page_size() -> u64 {
    // SAFETY: sysconf(_SC_PAGESIZE) has no preconditions and always
    // returns a positive value on a POSIX system.
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as u64
    } else {
        4096
    }
}

/// A page-aligned, read-only memory mapping of part of a file, starting
/// logically at `offset` (which need not itself be page-aligned: the
/// intra-page remainder is recorded as `delta` and hidden from callers).
pub struct Fmap {
    mmap: Mmap,
    delta: usize,
    path: PathBuf,
}

impl Fmap {
    /// Maps `file` (whose diagnostic path is `path`, used only for error
    /// messages) starting at byte `offset` through to the end of the file.
    pub fn open(path: &Path, file: &File, offset: u64) -> Result<Self> {
        let page = page_size();
        let aligned_offset = offset - (offset % page);
        let delta = (offset - aligned_offset) as usize;
        // SAFETY: the mapping is read-only and the caller-supplied `file`
        // is a regular file for the lifetime of this `Fmap`.
        let mmap = unsafe {
            MmapOptions::new()
                .offset(aligned_offset)
                .map(file)
                .map_err(|source| XwrapError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
        };
        Ok(Fmap {
            mmap,
            delta,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The mapped bytes, with the page-alignment remainder already
    /// skipped so index 0 corresponds to the `offset` passed to `open`.
    pub fn data(&self) -> &[u8] {
        &self.mmap[self.delta..]
    }

    pub fn is_archive(&self) -> bool {
        self.data().starts_with(b"!<arch>\n")
    }

    pub fn is_elf(&self) -> bool {
        self.data().get(0..4) == Some(b"\x7FELF")
    }

    fn format_error(&self, reason: &str) -> XwrapError {
        XwrapError::FormatUnsupported {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// A validated ELF64-little-endian façade over an [`Fmap`].
///
/// Constructing one checks the `\x7FELF` magic and that class/encoding
/// match this implementation's sole supported combination (64-bit,
/// little-endian), per the crate-wide non-goal of cross-architecture
/// byte-swapping support.
pub struct ElfView {
    fmap: Fmap,
}

impl ElfView {
    pub fn new(fmap: Fmap) -> Result<Self> {
        if !fmap.is_elf() {
            return Err(fmap.format_error("not an ELF file"));
        }
        let view = ElfView { fmap };
        let hdr = view.header()?;
        if hdr.e_ident.class != object::elf::ELFCLASS64 {
            return Err(view.fmap.format_error("unsupported ELF class (need ELFCLASS64)"));
        }
        if hdr.e_ident.data != object::elf::ELFDATA2LSB {
            return Err(view.fmap.format_error("unsupported ELF encoding (need little-endian)"));
        }
        Ok(view)
    }

    pub fn path(&self) -> &Path {
        self.fmap.path()
    }

    pub fn data(&self) -> &[u8] {
        self.fmap.data()
    }

    pub fn header(&self) -> Result<&FileHeader64<Endianness>> {
        object::pod::from_bytes(self.data())
            .map(|(hdr, _)| hdr)
            .map_err(|_| self.fmap.format_error("truncated ELF header"))
    }

    pub fn endian(&self) -> Result<Endianness> {
        self.header()?
            .e_ident
            .data
            .eq(&object::elf::ELFDATA2LSB)
            .then_some(Endianness::Little)
            .ok_or_else(|| self.fmap.format_error("unsupported ELF encoding"))
    }

    pub fn section_headers(&self) -> Result<&[SectionHeader64<Endianness>]> {
        let hdr = self.header()?;
        let endian = self.endian()?;
        let offset = hdr.e_shoff.get(endian);
        let count = hdr.e_shnum.get(endian) as usize;
        if offset == 0 || count == 0 {
            return Ok(&[]);
        }
        let rest = self
            .data()
            .get(offset as usize..)
            .ok_or_else(|| self.fmap.format_error("section header table out of bounds"))?;
        object::pod::slice_from_bytes(rest, count)
            .map(|(shdrs, _)| shdrs)
            .map_err(|_| self.fmap.format_error("truncated section header table"))
    }

    pub fn shstrtab(&self) -> Result<&[u8]> {
        let hdr = self.header()?;
        let endian = self.endian()?;
        let shdrs = self.section_headers()?;
        let idx = hdr.e_shstrndx.get(endian) as usize;
        let shdr = shdrs
            .get(idx)
            .ok_or_else(|| self.fmap.format_error("missing section header string table"))?;
        self.section_data(shdr, endian)
    }

    pub fn section_data(
        &self,
        shdr: &SectionHeader64<Endianness>,
        endian: Endianness,
    ) -> Result<&[u8]> {
        let off = shdr.sh_offset.get(endian) as usize;
        let size = shdr.sh_size.get(endian) as usize;
        self.data()
            .get(off..off + size)
            .ok_or_else(|| self.fmap.format_error("section data out of bounds"))
    }

    pub fn section_name(&self, shdr: &SectionHeader64<Endianness>, endian: Endianness) -> Result<&str> {
        let shstrtab = self.shstrtab()?;
        let name_off = shdr.sh_name.get(endian) as usize;
        str_from_table(shstrtab, name_off)
            .ok_or_else(|| self.fmap.format_error("symbol/section name out of bounds"))
    }

    /// Returns the index of the first section header after `start` whose
    /// `sh_type` equals `sh_type`, or the first such section overall when
    /// `start` is `None`.
    pub fn find_section(&self, sh_type: u32, start: Option<usize>) -> Result<Option<usize>> {
        let endian = self.endian()?;
        let shdrs = self.section_headers()?;
        let begin = start.map(|s| s + 1).unwrap_or(0);
        Ok(shdrs
            .iter()
            .enumerate()
            .skip(begin)
            .find(|(_, shdr)| shdr.sh_type.get(endian) == sh_type)
            .map(|(i, _)| i))
    }
}

/// Reads a NUL-terminated string starting at `offset` within a flat
/// string-table byte slice (`.shstrtab`, `.strtab`, or `.dynstr`).
pub fn str_from_table(table: &[u8], offset: usize) -> Option<&str> {
    let rest = table.get(offset..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&rest[..end]).ok()
}

/// One directory entry of a `!<arch>\n` thin archive: a member name, and
/// the file offset/size of its payload (which the caller reopens as an
/// [`ElfView`] if desired).
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub name: String,
    pub payload_offset: u64,
    pub size: u64,
}

const ARCHIVE_MAGIC: &[u8; 8] = b"!<arch>\n";
const MEMBER_HEADER_LEN: usize = 60;
const MEMBER_MAGIC: &[u8; 2] = &[0x60, 0x0a];

/// Iterates the members of a thin archive mapped by `fmap`.
///
/// Stops (silently, matching the original's `for` loop falling through)
/// as soon as a member header's trailing magic bytes don't match, since
/// that indicates we've walked off the end of a well-formed archive.
pub fn archive_members(fmap: &Fmap) -> Vec<ArchiveMember> {
    let data = fmap.data();
    let mut members = Vec::new();
    let mut pos = ARCHIVE_MAGIC.len();
    while pos + MEMBER_HEADER_LEN <= data.len() {
        let header = &data[pos..pos + MEMBER_HEADER_LEN];
        if &header[58..60] != MEMBER_MAGIC {
            break;
        }
        let name = String::from_utf8_lossy(&header[0..16])
            .trim_end()
            .to_string();
        let size_str = String::from_utf8_lossy(&header[48..58]);
        let size: u64 = match size_str.trim().parse() {
            Ok(v) => v,
            Err(_) => break,
        };
        let payload_offset = (pos + MEMBER_HEADER_LEN) as u64;
        members.push(ArchiveMember {
            name,
            payload_offset,
            size,
        });
        // Archive members are 2-byte aligned; a padding byte follows an
        // odd-sized member.
        let padded_size = size + (size & 1);
        pos += MEMBER_HEADER_LEN + padded_size as usize;
    }
    members
}

/// Convenience wrapper combining [`str_from_table`] with a raw `U32`
/// name-offset field, as used by symbol/section name accessors.
pub fn name_offset(bytes: U32<Endianness>, endian: Endianness) -> usize {
    bytes.get(endian) as usize
}

/// Reads out the bytes of one classified input: the whole file when
/// `offset == 0` and the file isn't an archive, or the matching thin
/// archive member's payload otherwise. Used by the surrogate-creation
/// step of `claim_file` to materialize the bytes to rewrite.
pub fn extract_member(path: &Path, offset: u64) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|source| XwrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let top = Fmap::open(path, &file, 0)?;
    if !top.is_archive() {
        return Ok(top.data().to_vec());
    }
    let member = archive_members(&top)
        .into_iter()
        .find(|m| m.payload_offset == offset)
        .ok_or_else(|| top.format_error("no archive member at claimed offset"))?;
    let start = member.payload_offset as usize;
    let end = start + member.size as usize;
    top.data()
        .get(start..end)
        .map(|s| s.to_vec())
        .ok_or_else(|| top.format_error("archive member out of bounds"))
}
