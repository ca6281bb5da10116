//! Conditional branch mnemonics.

use std::fmt;
use std::str::FromStr;

/// Comparison performed by a conditional branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchCond {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

impl BranchCond {
    /// Base mnemonic for this comparison.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Eq => "beq",
            Self::Ne => "bne",
            Self::Lt => "blt",
            Self::Ge => "bge",
            Self::Ltu => "bltu",
            Self::Geu => "bgeu",
        }
    }
}

impl fmt::Display for BranchCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Static information about a branch mnemonic as printed by the disassembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: &'static str,
    pub cond: BranchCond,
    /// Assembler alias (pseudo-instruction or compressed form).
    pub alias: bool,
}

const fn base(name: &'static str, cond: BranchCond) -> BranchInfo {
    BranchInfo {
        name,
        cond,
        alias: false,
    }
}

const fn alias(name: &'static str, cond: BranchCond) -> BranchInfo {
    BranchInfo {
        name,
        cond,
        alias: true,
    }
}

/// Conditional branch table. Base mnemonics come first.
///
/// Swapped-operand aliases (`bgt`, `ble`, ...) map onto the comparison the
/// hardware performs, so `bgt a0,a1` is `Lt` with operands reversed.
pub static BRANCHES: &[BranchInfo] = &[
    base("beq", BranchCond::Eq),
    base("bne", BranchCond::Ne),
    base("blt", BranchCond::Lt),
    base("bge", BranchCond::Ge),
    base("bltu", BranchCond::Ltu),
    base("bgeu", BranchCond::Geu),
    alias("beqz", BranchCond::Eq),
    alias("bnez", BranchCond::Ne),
    alias("bltz", BranchCond::Lt),
    alias("bgez", BranchCond::Ge),
    alias("blez", BranchCond::Ge),
    alias("bgtz", BranchCond::Lt),
    alias("bgt", BranchCond::Lt),
    alias("ble", BranchCond::Ge),
    alias("bgtu", BranchCond::Ltu),
    alias("bleu", BranchCond::Geu),
    alias("c.beqz", BranchCond::Eq),
    alias("c.bnez", BranchCond::Ne),
];

/// How the leading mnemonic of a disassembly line is matched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MnemonicMatch {
    /// Whole first token must equal a known branch mnemonic or alias.
    #[default]
    Exact,
    /// Line must start with one of the six base mnemonics.
    ///
    /// Anything sharing a prefix with them (`bnez`, `bgeu.x`, ...) also
    /// matches and is attributed to the prefix's comparison.
    Prefix,
}

impl MnemonicMatch {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
        }
    }
}

impl fmt::Display for MnemonicMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown [`MnemonicMatch`] name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown mnemonic match mode '{0}' (expected exact or prefix)")]
pub struct UnknownMatchMode(pub String);

impl FromStr for MnemonicMatch {
    type Err = UnknownMatchMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "prefix" => Ok(Self::Prefix),
            other => Err(UnknownMatchMode(other.to_string())),
        }
    }
}

/// Match the leading mnemonic of `disas` against the branch table.
#[must_use]
pub fn match_branch(disas: &str, mode: MnemonicMatch) -> Option<&'static BranchInfo> {
    match mode {
        MnemonicMatch::Exact => {
            let token = disas.split_whitespace().next()?;
            BRANCHES.iter().find(|info| info.name == token)
        }
        MnemonicMatch::Prefix => {
            // Longest base name first so "bltu" is not reported as "blt".
            BRANCHES
                .iter()
                .filter(|info| !info.alias)
                .filter(|info| disas.starts_with(info.name))
                .max_by_key(|info| info.name.len())
        }
    }
}
