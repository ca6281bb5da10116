//! Branch target extraction from the disassembler's `# <target>` annotation.
//!
//! QEMU's RISC-V disassembler prints branches as
//! `beq                     a0,a1,-8                # 0xff8`: the operand
//! offset first, then a comment with the target. The comment may also carry a
//! negative offset (`# -0x8`), which is relative to the instruction address.

use thiserror::Error;

/// Why a branch target could not be recovered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("no '#' target annotation")]
    MissingMarker,
    #[error("target annotation is truncated")]
    Truncated,
    #[error("malformed hex target '{0}'")]
    Malformed(String),
    #[error("hex target '{0}' overflows 64 bits")]
    Overflow(String),
}

/// Compute the absolute target of the branch at `vaddr` from its disassembly.
///
/// The text after the last `#` (minus one separator character) is either a
/// negative offset, when it contains `-`, or an absolute address. Negative
/// offsets wrap like unsigned address arithmetic.
pub fn branch_target(disas: &str, vaddr: u64) -> Result<u64, TargetError> {
    let marker = disas.rfind('#').ok_or(TargetError::MissingMarker)?;

    let mut chars = disas[marker..].chars();
    chars.next();
    chars.next().ok_or(TargetError::Truncated)?;
    let annotation = chars.as_str();

    if let Some(dash) = annotation.find('-') {
        let magnitude = parse_hex_prefix(&annotation[dash + 1..])?;
        Ok(vaddr.wrapping_sub(magnitude))
    } else {
        parse_hex_prefix(annotation)
    }
}

/// Parse a leading hex number, `strtoull` style.
///
/// Leading whitespace and an optional `0x` are skipped; parsing stops at the
/// first non-hex character. At least one digit is required.
fn parse_hex_prefix(text: &str) -> Result<u64, TargetError> {
    let trimmed = text.trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    if end == 0 {
        return Err(TargetError::Malformed(text.trim().to_string()));
    }

    u64::from_str_radix(&digits[..end], 16)
        .map_err(|_| TargetError::Overflow(digits[..end].to_string()))
}
