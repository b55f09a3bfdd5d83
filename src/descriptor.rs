//! Descriptor loading. Each plugin directory carries one `plugin.toml`
//! describing its exported procedures and source files. Parsing happens
//! once, here, at the boundary: the rest of the pipeline only ever sees a
//! typed [`PluginDescriptor`] and never re-validates shape.

use std::fs;

use serde::Deserialize;

use crate::context::BuildContext;
use crate::errors::{BuildError, DescriptorError};

/// One argument of an exported procedure.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Param {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One exported procedure. Declaration order in the descriptor fixes the
/// field order of the generated call table, so it is preserved verbatim.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Procedure {
    pub name: String,
    #[serde(rename = "return")]
    pub return_type: String,
    pub args: Vec<Param>,
}

#[derive(Debug, Deserialize)]
struct DescriptorDoc {
    procedures: Vec<Procedure>,
    #[serde(default)]
    plugin_source_files: Vec<String>,
    #[serde(default)]
    other_source_files: Vec<String>,
}

/// Fully validated descriptor for one plugin. Read-only for the rest of
/// the build.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub procedures: Vec<Procedure>,
    /// Paths relative to the plugin's own source directory.
    pub plugin_source_files: Vec<String>,
    /// Paths relative to the project root; may be shared between plugins.
    pub other_source_files: Vec<String>,
}

/// Plugin names are the sorted subdirectory names of the plugins dir.
/// Sorting here is load-bearing: ordinal id assignment depends on it.
pub fn discover_plugins(ctx: &BuildContext) -> Result<Vec<String>, BuildError> {
    let mut names = Vec::new();
    let entries =
        fs::read_dir(&ctx.plugins_dir).map_err(|e| BuildError::io(&ctx.plugins_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(&ctx.plugins_dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Load and validate one plugin's descriptor. On any failure the error
/// names the plugin and the offending field; no partially populated
/// descriptor is ever returned.
pub fn load_descriptor(ctx: &BuildContext, name: &str) -> Result<PluginDescriptor, DescriptorError> {
    let path = ctx.descriptor_path(name);
    let text = fs::read_to_string(&path).map_err(|source| DescriptorError::Unreadable {
        plugin: name.to_string(),
        path: path.clone(),
        source,
    })?;
    let doc: DescriptorDoc = toml::from_str(&text).map_err(|source| DescriptorError::Malformed {
        plugin: name.to_string(),
        source,
    })?;

    for (i, proc) in doc.procedures.iter().enumerate() {
        if proc.name.is_empty() {
            return Err(DescriptorError::BadField {
                plugin: name.to_string(),
                field: "procedures.name",
                message: format!("procedure {i} has an empty name"),
            });
        }
        if proc.return_type.is_empty() {
            return Err(DescriptorError::BadField {
                plugin: name.to_string(),
                field: "procedures.return",
                message: format!("procedure `{}` has an empty return type", proc.name),
            });
        }
        for arg in &proc.args {
            if arg.ty.is_empty() {
                return Err(DescriptorError::BadField {
                    plugin: name.to_string(),
                    field: "procedures.args.type",
                    message: format!("procedure `{}` has an argument with an empty type", proc.name),
                });
            }
        }
    }

    Ok(PluginDescriptor {
        name: name.to_string(),
        procedures: doc.procedures,
        plugin_source_files: doc.plugin_source_files,
        other_source_files: doc.other_source_files,
    })
}

/// Load every named descriptor in order, failing on the first invalid one.
pub fn load_all(
    ctx: &BuildContext,
    names: &[String],
) -> Result<Vec<PluginDescriptor>, DescriptorError> {
    names.iter().map(|name| load_descriptor(ctx, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use std::fs;
    use tempfile::tempdir;

    fn write_plugin(ctx: &BuildContext, name: &str, body: &str) {
        let dir = ctx.plugin_src_dir(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("plugin.toml"), body).unwrap();
    }

    fn temp_ctx() -> (tempfile::TempDir, BuildContext) {
        let dir = tempdir().unwrap();
        let ctx = BuildContext::new(dir.path(), BuildConfig::default());
        fs::create_dir_all(&ctx.plugins_dir).unwrap();
        (dir, ctx)
    }

    #[test]
    fn loads_a_well_formed_descriptor() {
        let (_dir, ctx) = temp_ctx();
        write_plugin(
            &ctx,
            "fluid_sim",
            r#"
            plugin_source_files = ["fluid_sim.cpp"]
            other_source_files = ["libs/loguru/loguru.cpp"]

            [[procedures]]
            name = "init"
            return = "void"
            args = [{ type = "SimData*", name = "data" }]

            [[procedures]]
            name = "step"
            return = "void"
            args = [{ type = "SimData*" }, { type = "float", name = "dt" }]
            "#,
        );
        let descriptor = load_descriptor(&ctx, "fluid_sim").unwrap();
        assert_eq!(descriptor.name, "fluid_sim");
        assert_eq!(descriptor.procedures.len(), 2);
        assert_eq!(descriptor.procedures[0].name, "init");
        assert_eq!(descriptor.procedures[1].args[0].name, None);
        assert_eq!(descriptor.plugin_source_files, vec!["fluid_sim.cpp"]);
    }

    #[test]
    fn missing_procedures_key_is_a_descriptor_error() {
        let (_dir, ctx) = temp_ctx();
        write_plugin(&ctx, "bad", "plugin_source_files = [\"a.cpp\"]\n");
        let err = load_descriptor(&ctx, "bad").unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { ref plugin, .. } if plugin == "bad"));
    }

    #[test]
    fn arg_without_type_is_a_descriptor_error() {
        let (_dir, ctx) = temp_ctx();
        write_plugin(
            &ctx,
            "bad",
            r#"
            [[procedures]]
            name = "init"
            return = "void"
            args = [{ name = "data" }]
            "#,
        );
        assert!(load_descriptor(&ctx, "bad").is_err());
    }

    #[test]
    fn missing_descriptor_file_names_the_plugin() {
        let (_dir, ctx) = temp_ctx();
        fs::create_dir_all(ctx.plugin_src_dir("ghost")).unwrap();
        let err = load_descriptor(&ctx, "ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn discovery_sorts_plugin_names() {
        let (_dir, ctx) = temp_ctx();
        for name in ["zeta", "alpha", "mid"] {
            fs::create_dir_all(ctx.plugin_src_dir(name)).unwrap();
        }
        fs::write(ctx.plugins_dir.join("stray_file.txt"), "ignored").unwrap();
        let names = discover_plugins(&ctx).unwrap();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
