//! The whole-program registry artifact, `plugin_infos.hpp`. Everything the
//! host needs to load, watch, and hot-swap plugins: proc-offset tables,
//! call-table layout, artifact path templates, watch-file lists, and the
//! commands that recompile/relink one plugin.

use std::fmt::Write;

use super::PluginRegistryEntry;

fn upper(name: &str) -> String {
    name.to_uppercase()
}

fn render_preamble(out: &mut String, entries: &[PluginRegistryEntry]) {
    out.push_str("//! WARNING: this file is auto-generated (by `plugforge generate`).\n\n");
    out.push_str("#ifndef _PLUGIN_INFOS_HPP\n#define _PLUGIN_INFOS_HPP\n\n");
    out.push_str("#include <cstddef>\n");
    out.push_str("#include \"plugin_ids.hpp\"\n");
    for entry in entries {
        writeln!(
            out,
            "#include \"{name}/plugin_{name}.hpp\"",
            name = entry.name
        )
        .unwrap();
    }
    out.push_str(
        "\nnamespace plugin_infos {\n\
         \n\
         struct PluginProcStructInfo {\n    \
             size_t alignment;\n    \
             size_t size;\n\
         };\n\
         \n\
         struct PluginProcInfo {\n    \
             const char* proc_name;\n    \
             size_t offset_in_procs_struct;\n\
         };\n\
         \n\
         struct PluginReloadInfo {\n    \
             const char* shared_object_path_template;\n    \
             size_t proc_count;\n    \
             const PluginProcInfo* p_proc_infos;\n    \
             const char* recompile_command;\n    \
             const char* relink_command;\n    \
             const char* name;\n    \
             size_t watch_filepath_count;\n    \
             const char* const* p_watch_filepaths;\n\
         };\n\n",
    );
}

fn render_proc_tables(out: &mut String, entries: &[PluginRegistryEntry]) {
    for (i, entry) in entries.iter().enumerate() {
        let tag = upper(&entry.name);
        writeln!(
            out,
            "constexpr size_t PROC_COUNT_{tag} = {};",
            entry.procedures.len()
        )
        .unwrap();
        writeln!(out, "constexpr PluginProcInfo PROC_INFOS_{tag}[] {{").unwrap();
        for proc in &entry.procedures {
            out.push_str("    PluginProcInfo {\n");
            writeln!(out, "        .proc_name = \"{proc}\",").unwrap();
            writeln!(
                out,
                "        .offset_in_procs_struct = offsetof({ns}::{st}, {proc}),",
                ns = entry.name,
                st = entry.procs_struct_name
            )
            .unwrap();
            out.push_str("    },\n");
        }
        out.push_str("};\n");
        if i != entries.len() - 1 {
            out.push('\n');
        }
    }
    out.push('\n');
}

fn render_watch_tables(out: &mut String, entries: &[PluginRegistryEntry]) {
    for (i, entry) in entries.iter().enumerate() {
        let tag = upper(&entry.name);
        writeln!(
            out,
            "constexpr size_t WATCH_FILEPATH_COUNT_{tag} = {};",
            entry.watch_files.len()
        )
        .unwrap();
        writeln!(out, "const char* const WATCH_FILEPATHS_{tag}[] {{").unwrap();
        for path in &entry.watch_files {
            writeln!(out, "    \"{}\",", path.display()).unwrap();
        }
        out.push_str("};\n");
        if i != entries.len() - 1 {
            out.push('\n');
        }
    }
    out.push('\n');
}

fn render_reload_infos(out: &mut String, entries: &[PluginRegistryEntry]) {
    out.push_str("constexpr PluginReloadInfo PLUGIN_RELOAD_INFOS[PluginID_COUNT] {\n");
    for entry in entries {
        let tag = upper(&entry.name);
        out.push_str("    PluginReloadInfo {\n");
        writeln!(
            out,
            "        .shared_object_path_template = \"{}\",",
            entry.artifact_template
        )
        .unwrap();
        writeln!(out, "        .proc_count = PROC_COUNT_{tag},").unwrap();
        writeln!(out, "        .p_proc_infos = PROC_INFOS_{tag},").unwrap();
        writeln!(
            out,
            "        .recompile_command = \"plugforge compile {}\",",
            entry.name
        )
        .unwrap();
        writeln!(
            out,
            "        .relink_command = \"plugforge link {}\",",
            entry.name
        )
        .unwrap();
        writeln!(out, "        .name = \"{}\",", entry.name).unwrap();
        writeln!(
            out,
            "        .watch_filepath_count = WATCH_FILEPATH_COUNT_{tag},"
        )
        .unwrap();
        writeln!(out, "        .p_watch_filepaths = WATCH_FILEPATHS_{tag},").unwrap();
        out.push_str("    },\n");
    }
    out.push_str("};\n\n");

    out.push_str("constexpr PluginProcStructInfo PLUGIN_PROC_STRUCT_INFOS[PluginID_COUNT] {\n");
    for entry in entries {
        out.push_str("    PluginProcStructInfo {\n");
        writeln!(
            out,
            "        .alignment = alignof({ns}::{st}),",
            ns = entry.name,
            st = entry.procs_struct_name
        )
        .unwrap();
        writeln!(
            out,
            "        .size = sizeof({ns}::{st}),",
            ns = entry.name,
            st = entry.procs_struct_name
        )
        .unwrap();
        out.push_str("    },\n");
    }
    out.push_str("};\n");
}

/// Render the whole registry artifact.
pub fn render_registry(entries: &[PluginRegistryEntry]) -> String {
    let mut out = String::new();
    render_preamble(&mut out, entries);
    render_proc_tables(&mut out, entries);
    render_watch_tables(&mut out, entries);
    render_reload_infos(&mut out, entries);
    out.push_str("\n} // namespace\n\n#endif // include guard\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headergen::procs_struct_name;
    use std::path::PathBuf;

    fn entries() -> Vec<PluginRegistryEntry> {
        vec![
            PluginRegistryEntry {
                name: "audio".to_string(),
                ordinal: 0,
                procs_struct_name: procs_struct_name("audio"),
                procedures: vec!["play".to_string(), "stop".to_string()],
                artifact_template: "build/plugins/audio.so.%u".to_string(),
                watch_files: vec![PathBuf::from("plugins_src/audio/audio.cpp")],
                header_path: PathBuf::new(),
            },
            PluginRegistryEntry {
                name: "fluid_sim".to_string(),
                ordinal: 1,
                procs_struct_name: procs_struct_name("fluid_sim"),
                procedures: vec!["step".to_string()],
                artifact_template: "build/plugins/fluid_sim.so.%u".to_string(),
                watch_files: vec![],
                header_path: PathBuf::new(),
            },
        ]
    }

    #[test]
    fn per_plugin_tables_use_their_own_name() {
        let rendered = render_registry(&entries());
        assert!(rendered.contains("constexpr size_t PROC_COUNT_AUDIO = 2;"));
        assert!(rendered.contains("constexpr size_t PROC_COUNT_FLUID_SIM = 1;"));
        assert!(rendered.contains("offsetof(audio::AudioProcs, play)"));
        assert!(rendered.contains("offsetof(fluid_sim::FluidSimProcs, step)"));
    }

    #[test]
    fn reload_table_carries_template_and_entry_points() {
        let rendered = render_registry(&entries());
        assert!(rendered.contains(".shared_object_path_template = \"build/plugins/audio.so.%u\","));
        assert!(rendered.contains(".recompile_command = \"plugforge compile fluid_sim\","));
        assert!(rendered.contains(".relink_command = \"plugforge link audio\","));
        assert!(rendered.contains("PLUGIN_RELOAD_INFOS[PluginID_COUNT]"));
    }

    #[test]
    fn layout_table_defers_to_the_compiler() {
        let rendered = render_registry(&entries());
        assert!(rendered.contains(".alignment = alignof(audio::AudioProcs),"));
        assert!(rendered.contains(".size = sizeof(fluid_sim::FluidSimProcs),"));
    }
}
