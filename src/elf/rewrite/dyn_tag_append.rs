//! Appends a new `(tag, value)` pair to `.dynamic` by overwriting the
//! first `DT_NULL` terminator in place, provided a further `DT_NULL` slot
//! remains after it to re-terminate the table. Never grows the section:
//! this only works because ELF writers customarily leave a few spare
//! `DT_NULL` entries as alignment padding.

use object::elf::{DT_NULL, SHT_DYNAMIC};

use super::MappedFile;
use crate::error::{Result, XwrapError};

/// Appends `tag`/`val` to `.dynamic` (`val` defaults to 0 when absent).
/// Returns `Ok(())` on success or [`XwrapError::NoSpareDynamicTag`] if
/// there is no room.
pub fn run(file: &mut MappedFile, tag: i64, val: Option<u64>) -> Result<()> {
    let val = val.unwrap_or(0);
    let dynamic_idx =
        file.find_section(SHT_DYNAMIC)?
            .ok_or_else(|| XwrapError::FormatUnsupported {
                path: file.path().to_path_buf(),
                reason: "no .dynamic section".to_string(),
            })?;
    let endian = file.endian()?;
    let entries = file.dynamic_entries_mut(dynamic_idx)?;

    let slot = entries
        .iter()
        .position(|e| e.d_tag.get(endian) == DT_NULL as i64)
        .filter(|&i| i + 1 < entries.len())
        .ok_or(XwrapError::NoSpareDynamicTag)?;

    entries[slot].d_tag.set(endian, tag);
    entries[slot].d_val.set(endian, val);
    entries[slot + 1].d_tag.set(endian, DT_NULL as i64);
    entries[slot + 1].d_val.set(endian, 0);
    Ok(())
}
