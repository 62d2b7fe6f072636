//! End-to-end tests for the eight ELF rewrite primitives, against
//! hand-built minimal ELF64 little-endian relocatable files.
//!
//! Byte layouts are assembled directly (not via `object::write`) so each
//! test controls every field the primitive under test reads, independent
//! of any uncertainty about a writer API's defaults.

use std::io::Write;
use std::path::{Path, PathBuf};

use xwrap::elf::rewrite::{
    abs_to_section, dyn_tag_append, normalize_relocs, pie_to_rel, shift_file_offsets,
    sym_to_dyn_reconcile, sym_to_undef, und_protect, MappedFile,
};

const EHDR_SIZE: usize = 64;
const SHDR_SIZE: usize = 64;
const SYM_SIZE: usize = 24;
const DYN_SIZE: usize = 16;
const PHDR_SIZE: usize = 56;
const RELA_SIZE: usize = 24;

const ET_REL: u16 = 1;
const ET_DYN: u16 = 3;
const EM_X86_64: u16 = 62;
const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_DYNAMIC: u32 = 6;
const SHT_RELA: u32 = 4;
const SHT_DYNSYM: u32 = 11;
const SHN_ABS: u16 = 0xfff1;
const SHN_UNDEF: u16 = 0;
const STB_GLOBAL: u8 = 1;
const STT_NOTYPE: u8 = 0;
const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;
const STT_SECTION: u8 = 3;
const STV_HIDDEN: u8 = 2;
const STV_PROTECTED: u8 = 3;
const SHF_ALLOC: u64 = 0x2;
const DT_NULL: i64 = 0;
const DT_NEEDED: i64 = 1;

/// A NUL-delimited string table that always starts with an empty name at
/// offset 0, matching every real `.strtab`/`.shstrtab`.
struct StrTab {
    bytes: Vec<u8>,
}

impl StrTab {
    fn new() -> Self {
        StrTab { bytes: vec![0] }
    }

    fn add(&mut self, name: &str) -> u32 {
        let off = self.bytes.len() as u32;
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        off
    }
}

fn ehdr(e_shoff: u64, e_shnum: u16, e_shstrndx: u16, e_phoff: u64, e_phnum: u16) -> Vec<u8> {
    let mut h = vec![0u8; EHDR_SIZE];
    h[0..4].copy_from_slice(b"\x7FELF");
    h[4] = 2; // ELFCLASS64
    h[5] = 1; // ELFDATA2LSB
    h[6] = 1; // EV_CURRENT
    h[16..18].copy_from_slice(&ET_REL.to_le_bytes());
    h[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
    h[20..24].copy_from_slice(&1u32.to_le_bytes());
    h[32..40].copy_from_slice(&e_phoff.to_le_bytes());
    h[40..48].copy_from_slice(&e_shoff.to_le_bytes());
    h[52..54].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
    h[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    h[56..58].copy_from_slice(&e_phnum.to_le_bytes());
    h[58..60].copy_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
    h[60..62].copy_from_slice(&e_shnum.to_le_bytes());
    h[62..64].copy_from_slice(&e_shstrndx.to_le_bytes());
    h
}

#[allow(clippy::too_many_arguments)]
fn shdr(name: u32, ty: u32, offset: u64, size: u64, link: u32, info: u32, entsize: u64) -> Vec<u8> {
    let mut s = vec![0u8; SHDR_SIZE];
    s[0..4].copy_from_slice(&name.to_le_bytes());
    s[4..8].copy_from_slice(&ty.to_le_bytes());
    s[24..32].copy_from_slice(&offset.to_le_bytes());
    s[32..40].copy_from_slice(&size.to_le_bytes());
    s[40..44].copy_from_slice(&link.to_le_bytes());
    s[44..48].copy_from_slice(&info.to_le_bytes());
    s[56..64].copy_from_slice(&entsize.to_le_bytes());
    s
}

fn sym(name: u32, info: u8, shndx: u16, value: u64, size: u64) -> Vec<u8> {
    let mut s = vec![0u8; SYM_SIZE];
    s[0..4].copy_from_slice(&name.to_le_bytes());
    s[4] = info;
    s[6..8].copy_from_slice(&shndx.to_le_bytes());
    s[8..16].copy_from_slice(&value.to_le_bytes());
    s[16..24].copy_from_slice(&size.to_le_bytes());
    s
}

fn dyn_entry(tag: i64, val: u64) -> Vec<u8> {
    let mut d = vec![0u8; DYN_SIZE];
    d[0..8].copy_from_slice(&tag.to_le_bytes());
    d[8..16].copy_from_slice(&val.to_le_bytes());
    d
}

fn sym_with_other(name: u32, info: u8, other: u8, shndx: u16, value: u64, size: u64) -> Vec<u8> {
    let mut s = sym(name, info, shndx, value, size);
    s[5] = other;
    s
}

fn rela(r_offset: u64, sym_idx: u32, r_type: u32, r_addend: i64) -> Vec<u8> {
    let mut r = vec![0u8; RELA_SIZE];
    r[0..8].copy_from_slice(&r_offset.to_le_bytes());
    let r_info: u64 = ((sym_idx as u64) << 32) | r_type as u64;
    r[8..16].copy_from_slice(&r_info.to_le_bytes());
    r[16..24].copy_from_slice(&r_addend.to_le_bytes());
    r
}

fn write_temp(name: &str, data: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "xwrap-test-{name}-{}-{}",
        std::process::id(),
        data.len()
    ));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(data).unwrap();
    path
}

fn cleanup(path: &Path) {
    let _ = std::fs::remove_file(path);
}

/// Builds a minimal ELF64 relocatable with sections
/// `[null, .foo (PROGBITS), .symtab, .strtab, .shstrtab]` and one symbol
/// table entry, returning the file bytes and the `.foo` section index.
fn build_abs_to_section_fixture() -> (Vec<u8>, u16) {
    let foo_data = vec![0u8; 16];

    let mut shstrtab = StrTab::new();
    let foo_name = shstrtab.add(".foo");
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let mut strtab = StrTab::new();
    let sym_name = strtab.add(".foo");

    let null_sym = sym(0, 0, 0, 0, 0);
    let abs_sym = sym(sym_name, (STB_GLOBAL << 4) | STT_NOTYPE, SHN_ABS, 0, 0);
    let symtab_data = [null_sym, abs_sym].concat();

    let foo_off = EHDR_SIZE as u64;
    let symtab_off = foo_off + foo_data.len() as u64;
    let strtab_off = symtab_off + symtab_data.len() as u64;
    let shstrtab_off = strtab_off + strtab.bytes.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0),
        shdr(foo_name, SHT_PROGBITS, foo_off, foo_data.len() as u64, 0, 0, 0),
        shdr(
            symtab_name,
            SHT_SYMTAB,
            symtab_off,
            symtab_data.len() as u64,
            3, // sh_link -> .strtab
            1,
            SYM_SIZE as u64,
        ),
        shdr(strtab_name, SHT_STRTAB, strtab_off, strtab.bytes.len() as u64, 0, 0, 0),
        shdr(
            shstrtab_name,
            SHT_STRTAB,
            shstrtab_off,
            shstrtab.bytes.len() as u64,
            0,
            0,
            0,
        ),
    ]
    .concat();

    let mut file = ehdr(shoff, 5, 4, 0, 0);
    file.extend_from_slice(&foo_data);
    file.extend_from_slice(&symtab_data);
    file.extend_from_slice(&strtab.bytes);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);

    (file, 1)
}

#[test]
fn abs_to_section_reassigns_matching_zero_value_abs_symbol() {
    let (data, foo_idx) = build_abs_to_section_fixture();
    let path = write_temp("abs2sect", &data);

    {
        let mut file = MappedFile::open(&path).unwrap();
        let count = abs_to_section::run(&mut file, None).unwrap();
        assert_eq!(count, 1);
        file.flush().unwrap();
    }

    let rewritten = std::fs::read(&path).unwrap();
    // Symbol table starts right after the 16-byte `.foo` payload.
    let symtab_off = EHDR_SIZE + 16;
    let abs_sym_off = symtab_off + SYM_SIZE; // entry 1
    let shndx = u16::from_le_bytes(rewritten[abs_sym_off + 6..abs_sym_off + 8].try_into().unwrap());
    let value = u64::from_le_bytes(rewritten[abs_sym_off + 8..abs_sym_off + 16].try_into().unwrap());
    assert_eq!(shndx, foo_idx);
    assert_eq!(value, 0);

    cleanup(&path);
}

fn build_sym_to_undef_fixture() -> Vec<u8> {
    let text_data = vec![0u8; 8];

    let mut shstrtab = StrTab::new();
    let text_name = shstrtab.add(".text");
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let mut strtab = StrTab::new();
    let malloc_name = strtab.add("malloc");

    let null_sym = sym(0, 0, 0, 0, 0);
    let malloc_sym = sym(malloc_name, (STB_GLOBAL << 4) | STT_FUNC, 1, 0x10, 4);
    let symtab_data = [null_sym, malloc_sym].concat();

    let text_off = EHDR_SIZE as u64;
    let symtab_off = text_off + text_data.len() as u64;
    let strtab_off = symtab_off + symtab_data.len() as u64;
    let shstrtab_off = strtab_off + strtab.bytes.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0),
        shdr(text_name, SHT_PROGBITS, text_off, text_data.len() as u64, 0, 0, 0),
        shdr(symtab_name, SHT_SYMTAB, symtab_off, symtab_data.len() as u64, 3, 1, SYM_SIZE as u64),
        shdr(strtab_name, SHT_STRTAB, strtab_off, strtab.bytes.len() as u64, 0, 0, 0),
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0),
    ]
    .concat();

    let mut file = ehdr(shoff, 5, 4, 0, 0);
    file.extend_from_slice(&text_data);
    file.extend_from_slice(&symtab_data);
    file.extend_from_slice(&strtab.bytes);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);
    file
}

#[test]
fn sym_to_undef_demotes_and_is_idempotent() {
    let data = build_sym_to_undef_fixture();
    let path = write_temp("sym2und", &data);

    {
        let mut file = MappedFile::open(&path).unwrap();
        let count = sym_to_undef::run(&mut file, "malloc").unwrap();
        assert_eq!(count, 1);
        file.flush().unwrap();
    }
    let once = std::fs::read(&path).unwrap();

    {
        let mut file = MappedFile::open(&path).unwrap();
        let count = sym_to_undef::run(&mut file, "malloc").unwrap();
        assert_eq!(count, 0, "second pass should find nothing left to demote");
        file.flush().unwrap();
    }
    let twice = std::fs::read(&path).unwrap();
    assert_eq!(once, twice, "sym_to_undef must be a fix point");

    let symtab_off = EHDR_SIZE + 8;
    let malloc_off = symtab_off + SYM_SIZE;
    let shndx = u16::from_le_bytes(once[malloc_off + 6..malloc_off + 8].try_into().unwrap());
    let value = u64::from_le_bytes(once[malloc_off + 8..malloc_off + 16].try_into().unwrap());
    let size = u64::from_le_bytes(once[malloc_off + 16..malloc_off + 24].try_into().unwrap());
    let info = once[malloc_off + 4];
    assert_eq!(shndx, SHN_UNDEF);
    assert_eq!(value, 0);
    assert_eq!(size, 0);
    assert_eq!(info, (STB_GLOBAL << 4) | STT_NOTYPE);

    cleanup(&path);
}

fn build_dynamic_fixture() -> Vec<u8> {
    let dyn_data = [
        dyn_entry(DT_NEEDED, 0),
        dyn_entry(DT_NULL, 0),
        dyn_entry(DT_NULL, 0),
    ]
    .concat();

    let mut shstrtab = StrTab::new();
    let dynamic_name = shstrtab.add(".dynamic");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let dyn_off = EHDR_SIZE as u64;
    let shstrtab_off = dyn_off + dyn_data.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0),
        shdr(dynamic_name, SHT_DYNAMIC, dyn_off, dyn_data.len() as u64, 0, 0, DYN_SIZE as u64),
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0),
    ]
    .concat();

    let mut file = ehdr(shoff, 3, 2, 0, 0);
    file.extend_from_slice(&dyn_data);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);
    file
}

#[test]
fn dyn_tag_append_consumes_a_spare_null() {
    let data = build_dynamic_fixture();
    let path = write_temp("dynappend", &data);

    {
        let mut file = MappedFile::open(&path).unwrap();
        dyn_tag_append::run(&mut file, 29, Some(0)).unwrap();
        file.flush().unwrap();
    }

    let rewritten = std::fs::read(&path).unwrap();
    let dyn_off = EHDR_SIZE;
    let first_tag = i64::from_le_bytes(rewritten[dyn_off..dyn_off + 8].try_into().unwrap());
    let second_tag = i64::from_le_bytes(rewritten[dyn_off + DYN_SIZE..dyn_off + DYN_SIZE + 8].try_into().unwrap());
    assert_eq!(first_tag, 29);
    assert_eq!(second_tag, DT_NULL);

    cleanup(&path);
}

#[test]
fn dyn_tag_append_fails_without_a_spare_null() {
    let dyn_data = [dyn_entry(DT_NEEDED, 0), dyn_entry(DT_NULL, 0)].concat();
    let mut shstrtab = StrTab::new();
    let dynamic_name = shstrtab.add(".dynamic");
    let shstrtab_name = shstrtab.add(".shstrtab");
    let dyn_off = EHDR_SIZE as u64;
    let shstrtab_off = dyn_off + dyn_data.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;
    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0),
        shdr(dynamic_name, SHT_DYNAMIC, dyn_off, dyn_data.len() as u64, 0, 0, DYN_SIZE as u64),
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0),
    ]
    .concat();
    let mut file = ehdr(shoff, 3, 2, 0, 0);
    file.extend_from_slice(&dyn_data);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);

    let path = write_temp("dynappend-no-spare", &file);
    {
        let mut mf = MappedFile::open(&path).unwrap();
        let err = dyn_tag_append::run(&mut mf, 29, Some(0)).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }
    cleanup(&path);
}

#[test]
fn shift_file_offsets_round_trips() {
    // Header + one program header + one section header, no payload
    // beyond the tables themselves; only offset fields matter here.
    let phoff = EHDR_SIZE as u64;
    let shoff = phoff + PHDR_SIZE as u64;

    let mut phdr = vec![0u8; PHDR_SIZE];
    phdr[8..16].copy_from_slice(&phoff.to_le_bytes()); // p_offset, arbitrary but present

    let shdr0 = shdr(0, SHT_NULL, 0, 0, 0, 0, 0);

    let mut file = ehdr(shoff, 1, 0, phoff, 1);
    file.extend_from_slice(&phdr);
    file.extend_from_slice(&shdr0);

    let path = write_temp("shift-elf", &file);
    let before = file.clone();

    {
        let mut mf = MappedFile::open(&path).unwrap();
        shift_file_offsets::run(&mut mf, 4096).unwrap();
        mf.flush().unwrap();
    }
    {
        let mut mf = MappedFile::open(&path).unwrap();
        shift_file_offsets::run(&mut mf, -4096).unwrap();
        mf.flush().unwrap();
    }

    let after = std::fs::read(&path).unwrap();
    assert_eq!(before, after, "shift(+d) then shift(-d) must restore every offset field");

    cleanup(&path);
}

/// `.dynsym` with a plain default-visibility undefined symbol, an
/// already-hidden undefined symbol, and a defined symbol.
fn build_und_protect_fixture() -> Vec<u8> {
    let mut dynstr = StrTab::new();
    let undef_name = dynstr.add("plain_undef");
    let hidden_name = dynstr.add("hidden_undef");
    let defined_name = dynstr.add("defined_sym");

    let mut shstrtab = StrTab::new();
    let dynsym_name = shstrtab.add(".dynsym");
    let dynstr_name = shstrtab.add(".dynstr");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let null_sym = sym(0, 0, 0, 0, 0);
    let plain_undef = sym_with_other(undef_name, (STB_GLOBAL << 4) | STT_NOTYPE, 0, SHN_UNDEF, 0, 0);
    let hidden_undef =
        sym_with_other(hidden_name, (STB_GLOBAL << 4) | STT_NOTYPE, STV_HIDDEN, SHN_UNDEF, 0, 0);
    let defined = sym_with_other(defined_name, (STB_GLOBAL << 4) | STT_NOTYPE, 0, 1, 0x10, 0);
    let dynsym_data = [null_sym, plain_undef, hidden_undef, defined].concat();

    let dynsym_off = EHDR_SIZE as u64;
    let dynstr_off = dynsym_off + dynsym_data.len() as u64;
    let shstrtab_off = dynstr_off + dynstr.bytes.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0),
        shdr(dynsym_name, SHT_DYNSYM, dynsym_off, dynsym_data.len() as u64, 2, 1, SYM_SIZE as u64),
        shdr(dynstr_name, SHT_STRTAB, dynstr_off, dynstr.bytes.len() as u64, 0, 0, 0),
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0),
    ]
    .concat();

    let mut file = ehdr(shoff, 4, 3, 0, 0);
    file.extend_from_slice(&dynsym_data);
    file.extend_from_slice(&dynstr.bytes);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);
    file
}

#[test]
fn und_protect_marks_default_visibility_undefined_symbols() {
    let data = build_und_protect_fixture();
    let path = write_temp("und-protect", &data);

    let changed;
    {
        let mut file = MappedFile::open(&path).unwrap();
        changed = und_protect::run(&mut file).unwrap();
        file.flush().unwrap();
    }
    assert_eq!(changed, 1, "only the plain default-visibility undefined symbol should change");

    let rewritten = std::fs::read(&path).unwrap();
    let dynsym_off = EHDR_SIZE;
    let plain_off = dynsym_off + SYM_SIZE;
    let hidden_off = dynsym_off + 2 * SYM_SIZE;
    let defined_off = dynsym_off + 3 * SYM_SIZE;
    assert_eq!(rewritten[plain_off + 5] & 0x3, STV_PROTECTED);
    assert_eq!(rewritten[hidden_off + 5] & 0x3, STV_HIDDEN, "already-hidden symbol must be left alone");
    assert_eq!(rewritten[defined_off + 5] & 0x3, 0, "defined symbols are never touched");

    cleanup(&path);
}

/// One `SHF_ALLOC` `.text` section at `sh_addr=0x1000` and a function
/// symbol at `0x1004`, wrapped in an `ET_DYN` file with a (never-read,
/// just present) program header.
fn build_pie_to_rel_fixture() -> (Vec<u8>, u64, u64) {
    let mut shstrtab = StrTab::new();
    let text_name = shstrtab.add(".text");
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let mut strtab = StrTab::new();
    let fn_name = strtab.add("start_fn");

    let null_sym = sym(0, 0, 0, 0, 0);
    let fn_sym = sym(fn_name, (STB_GLOBAL << 4) | STT_FUNC, 1, 0x1004, 0);
    let symtab_data = [null_sym, fn_sym].concat();

    let symtab_off = EHDR_SIZE as u64;
    let strtab_off = symtab_off + symtab_data.len() as u64;
    let shstrtab_off = strtab_off + strtab.bytes.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let mut text_shdr = shdr(text_name, SHT_PROGBITS, EHDR_SIZE as u64, 0, 0, 0, 0);
    text_shdr[8..16].copy_from_slice(&SHF_ALLOC.to_le_bytes());
    text_shdr[16..24].copy_from_slice(&0x1000u64.to_le_bytes());

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0),
        text_shdr,
        shdr(symtab_name, SHT_SYMTAB, symtab_off, symtab_data.len() as u64, 3, 1, SYM_SIZE as u64),
        shdr(strtab_name, SHT_STRTAB, strtab_off, strtab.bytes.len() as u64, 0, 0, 0),
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0),
    ]
    .concat();

    let mut file = ehdr(shoff, 5, 4, EHDR_SIZE as u64, 1);
    file[16..18].copy_from_slice(&ET_DYN.to_le_bytes());
    file.extend_from_slice(&symtab_data);
    file.extend_from_slice(&strtab.bytes);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);

    let text_shdr_off = shoff + SHDR_SIZE as u64; // shdrs[1]
    let fn_sym_off = symtab_off + SYM_SIZE as u64; // symtab entry 1
    (file, text_shdr_off, fn_sym_off)
}

#[test]
fn pie_to_rel_rebases_symbols_clears_addrs_and_drops_program_headers() {
    let (data, text_shdr_off, fn_sym_off) = build_pie_to_rel_fixture();
    let path = write_temp("pie2rel", &data);

    {
        let mut file = MappedFile::open(&path).unwrap();
        pie_to_rel::run(&mut file).unwrap();
        file.flush().unwrap();
    }

    let rewritten = std::fs::read(&path).unwrap();
    let e_type = u16::from_le_bytes(rewritten[16..18].try_into().unwrap());
    let e_phoff = u64::from_le_bytes(rewritten[32..40].try_into().unwrap());
    let e_phentsize = u16::from_le_bytes(rewritten[54..56].try_into().unwrap());
    let e_phnum = u16::from_le_bytes(rewritten[56..58].try_into().unwrap());
    assert_eq!(e_type, ET_REL);
    assert_eq!(e_phoff, 0);
    assert_eq!(e_phentsize, 0);
    assert_eq!(e_phnum, 0);

    let text_addr_off = text_shdr_off as usize + 16;
    let addr = u64::from_le_bytes(rewritten[text_addr_off..text_addr_off + 8].try_into().unwrap());
    assert_eq!(addr, 0, "sh_addr of an ALLOC section must be cleared");

    let value_off = fn_sym_off as usize + 8;
    let value = u64::from_le_bytes(rewritten[value_off..value_off + 8].try_into().unwrap());
    assert_eq!(value, 0x4, "symbol value is rebased from load address to section offset");

    cleanup(&path);
}

/// A `.symtab`/`.strtab` pair and `.rela.text`/`.rela.debug_info`
/// sections, covering both normalization directions: a non-debug
/// relocation through a section symbol gets redirected to the section's
/// zero-offset named alias, and a debug-section relocation through a
/// named symbol gets redirected to the section symbol.
fn build_normalize_relocs_fixture() -> (Vec<u8>, u64, u64) {
    let mut shstrtab = StrTab::new();
    let text_name = shstrtab.add(".text");
    let rodata_name = shstrtab.add(".rodata");
    let debug_name = shstrtab.add(".debug_info");
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let shstrtab_name = shstrtab.add(".shstrtab");
    let rela_text_name = shstrtab.add(".rela.text");
    let rela_debug_name = shstrtab.add(".rela.debug_info");

    let mut strtab = StrTab::new();
    let rodata_start_name = strtab.add("rodata_start");
    let some_var_name = strtab.add("some_var");

    let null_sym = sym(0, 0, 0, 0, 0);
    let section_sym = sym(0, STT_SECTION, 2, 0, 0); // idx1: STT_SECTION for .rodata
    let zero_offset_sym = sym(rodata_start_name, (STB_GLOBAL << 4) | STT_OBJECT, 2, 0, 0); // idx2
    let ordinary_sym = sym(some_var_name, (STB_GLOBAL << 4) | STT_OBJECT, 2, 0, 0); // idx3
    let symtab_data = [null_sym, section_sym, zero_offset_sym, ordinary_sym].concat();

    let symtab_off = EHDR_SIZE as u64;
    let strtab_off = symtab_off + symtab_data.len() as u64;

    let rela_text_data = rela(0, 1, 0, 0); // references idx1 (section symbol)
    let rela_debug_data = rela(0, 3, 0, 0); // references idx3 (ordinary named symbol)
    let rela_text_off = strtab_off + strtab.bytes.len() as u64;
    let rela_debug_off = rela_text_off + rela_text_data.len() as u64;

    let shstrtab_off = rela_debug_off + rela_debug_data.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0), // 0
        shdr(text_name, SHT_PROGBITS, EHDR_SIZE as u64, 0, 0, 0, 0), // 1 .text
        shdr(rodata_name, SHT_PROGBITS, EHDR_SIZE as u64, 0, 0, 0, 0), // 2 .rodata
        shdr(debug_name, SHT_PROGBITS, EHDR_SIZE as u64, 0, 0, 0, 0), // 3 .debug_info
        shdr(symtab_name, SHT_SYMTAB, symtab_off, symtab_data.len() as u64, 5, 1, SYM_SIZE as u64), // 4 .symtab
        shdr(strtab_name, SHT_STRTAB, strtab_off, strtab.bytes.len() as u64, 0, 0, 0), // 5 .strtab
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0), // 6 .shstrtab
        shdr(rela_text_name, SHT_RELA, rela_text_off, rela_text_data.len() as u64, 4, 1, RELA_SIZE as u64), // 7
        shdr(
            rela_debug_name,
            SHT_RELA,
            rela_debug_off,
            rela_debug_data.len() as u64,
            4,
            3,
            RELA_SIZE as u64,
        ), // 8
    ]
    .concat();

    let mut file = ehdr(shoff, 9, 6, 0, 0);
    file.extend_from_slice(&symtab_data);
    file.extend_from_slice(&strtab.bytes);
    file.extend_from_slice(&rela_text_data);
    file.extend_from_slice(&rela_debug_data);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);

    (file, rela_text_off, rela_debug_off)
}

#[test]
fn normalize_relocs_redirects_both_directions() {
    let (data, rela_text_off, rela_debug_off) = build_normalize_relocs_fixture();
    let path = write_temp("normrelocs", &data);

    let changed;
    {
        let mut file = MappedFile::open(&path).unwrap();
        changed = normalize_relocs::run(&mut file, None).unwrap();
        file.flush().unwrap();
    }
    assert_eq!(changed, 2);

    let rewritten = std::fs::read(&path).unwrap();
    let text_r_info = u64::from_le_bytes(
        rewritten[rela_text_off as usize + 8..rela_text_off as usize + 16]
            .try_into()
            .unwrap(),
    );
    let debug_r_info = u64::from_le_bytes(
        rewritten[rela_debug_off as usize + 8..rela_debug_off as usize + 16]
            .try_into()
            .unwrap(),
    );

    assert_eq!(text_r_info >> 32, 2, "non-debug reloc must move off the section symbol onto the zero-offset alias");
    assert_eq!(debug_r_info >> 32, 1, "debug-section reloc must move onto the STT_SECTION symbol");

    cleanup(&path);
}

/// A defined `.symtab` entry and a same-named, inconsistent `.dynsym`
/// entry (undefined where `.symtab` says defined).
fn build_sym_to_dyn_reconcile_fixture() -> (Vec<u8>, u64) {
    let mut shstrtab = StrTab::new();
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let dynsym_name = shstrtab.add(".dynsym");
    let dynstr_name = shstrtab.add(".dynstr");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let mut strtab = StrTab::new();
    let foo_name_strtab = strtab.add("foo");
    let mut dynstr = StrTab::new();
    let foo_name_dynstr = dynstr.add("foo");

    let null_sym = sym(0, 0, 0, 0, 0);
    let foo_defined = sym(foo_name_strtab, (STB_GLOBAL << 4) | STT_FUNC, 1, 0x20, 0);
    let symtab_data = [null_sym.clone(), foo_defined].concat();

    let foo_undef = sym(foo_name_dynstr, (STB_GLOBAL << 4) | STT_FUNC, SHN_UNDEF, 0, 0);
    let dynsym_data = [null_sym, foo_undef].concat();

    let symtab_off = EHDR_SIZE as u64;
    let strtab_off = symtab_off + symtab_data.len() as u64;
    let dynsym_off = strtab_off + strtab.bytes.len() as u64;
    let dynstr_off = dynsym_off + dynsym_data.len() as u64;
    let shstrtab_off = dynstr_off + dynstr.bytes.len() as u64;
    let shoff = shstrtab_off + shstrtab.bytes.len() as u64;

    let shdrs = [
        shdr(0, SHT_NULL, 0, 0, 0, 0, 0), // 0
        shdr(symtab_name, SHT_SYMTAB, symtab_off, symtab_data.len() as u64, 2, 1, SYM_SIZE as u64), // 1 -> link .strtab(2)
        shdr(strtab_name, SHT_STRTAB, strtab_off, strtab.bytes.len() as u64, 0, 0, 0), // 2
        shdr(dynsym_name, SHT_DYNSYM, dynsym_off, dynsym_data.len() as u64, 4, 1, SYM_SIZE as u64), // 3 -> link .dynstr(4)
        shdr(dynstr_name, SHT_STRTAB, dynstr_off, dynstr.bytes.len() as u64, 0, 0, 0), // 4
        shdr(shstrtab_name, SHT_STRTAB, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 0), // 5
    ]
    .concat();

    let mut file = ehdr(shoff, 6, 5, 0, 0);
    file.extend_from_slice(&symtab_data);
    file.extend_from_slice(&strtab.bytes);
    file.extend_from_slice(&dynsym_data);
    file.extend_from_slice(&dynstr.bytes);
    file.extend_from_slice(&shstrtab.bytes);
    file.extend_from_slice(&shdrs);

    (file, dynsym_off)
}

#[test]
fn sym_to_dyn_reconcile_fixes_undefined_dynsym_entry() {
    let (data, dynsym_off) = build_sym_to_dyn_reconcile_fixture();
    let path = write_temp("symdynreconcile", &data);

    let changed;
    {
        let mut file = MappedFile::open(&path).unwrap();
        changed = sym_to_dyn_reconcile::run(&mut file).unwrap();
        file.flush().unwrap();
    }
    assert_eq!(changed, 1);

    let rewritten = std::fs::read(&path).unwrap();
    let foo_off = dynsym_off as usize + SYM_SIZE;
    let shndx = u16::from_le_bytes(rewritten[foo_off + 6..foo_off + 8].try_into().unwrap());
    let value = u64::from_le_bytes(rewritten[foo_off + 8..foo_off + 16].try_into().unwrap());
    assert_eq!(shndx, 1, "dynsym entry must pick up symtab's definedness");
    assert_eq!(value, 0x20, "dynsym entry must pick up symtab's value");

    cleanup(&path);
}
