//! Plugin id enum and the persisted id ledger.
//!
//! Ids are a pure function of the sorted plugin-name set for one generation
//! run. The ledger records that assignment so a later subset rebuild can
//! detect that the name set changed underneath a running host instead of
//! silently shifting unrelated ids.

use std::fmt::Write;
use std::fs;

use serde::{Deserialize, Serialize};

use super::{pascal_case, PluginRegistryEntry};
use crate::context::BuildContext;
use crate::errors::{BuildError, ValidationError};

/// `plugin_ids.hpp`: the id enum in sorted-name order plus COUNT sentinel.
pub fn render_ids(entries: &[PluginRegistryEntry]) -> String {
    let mut out = String::new();
    out.push_str("//! WARNING: this file is auto-generated (by `plugforge generate`).\n\n");
    out.push_str("#ifndef _PLUGIN_IDS_HPP\n#define _PLUGIN_IDS_HPP\n\n");
    out.push_str("enum PluginID {\n");
    for entry in entries {
        writeln!(out, "    PluginID_{} = {},", pascal_case(&entry.name), entry.ordinal).unwrap();
    }
    out.push_str("    PluginID_COUNT\n");
    out.push_str("};\n\n");
    out.push_str("#endif // include guard\n");
    out
}

/// Persisted record of one generation run's id assignment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdLedger {
    /// Plugin names in ordinal order.
    pub plugins: Vec<String>,
}

pub(super) fn write_ledger(
    ctx: &BuildContext,
    entries: &[PluginRegistryEntry],
) -> Result<(), BuildError> {
    let ledger = IdLedger {
        plugins: entries.iter().map(|e| e.name.clone()).collect(),
    };
    let path = ctx.ledger_path();
    let json = serde_json::to_string_pretty(&ledger).map_err(|e| {
        BuildError::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    fs::write(&path, json).map_err(|e| BuildError::io(&path, e))?;
    Ok(())
}

/// Load the ledger from the last generation run, if one exists.
pub fn load_ledger(ctx: &BuildContext) -> Result<Option<IdLedger>, BuildError> {
    let path = ctx.ledger_path();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BuildError::io(&path, e)),
    };
    let ledger: IdLedger = serde_json::from_str(&text).map_err(|e| {
        BuildError::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    Ok(Some(ledger))
}

/// Refuse a partial rebuild when the on-disk plugin set no longer matches
/// the ledger: compiled-in ids would be stale. A missing ledger means no
/// generation has run against this tree yet, which later stages surface on
/// their own.
pub fn verify_ledger(ctx: &BuildContext, discovered: &[String]) -> Result<(), BuildError> {
    let Some(ledger) = load_ledger(ctx)? else {
        return Ok(());
    };
    if ledger.plugins != discovered {
        return Err(ValidationError::LedgerMismatch {
            ledger: ledger.plugins,
            found: discovered.to_vec(),
        }
        .into());
    }
    Ok(())
}
