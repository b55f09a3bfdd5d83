//! Per-plugin ABI header: one function-pointer alias per procedure and the
//! call-table struct aggregating them in declaration order.

use std::fmt::Write;

use crate::descriptor::{PluginDescriptor, Procedure};

/// `fluid_sim` -> `FluidSim`.
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Name of the generated call-table struct for a plugin.
pub fn procs_struct_name(plugin: &str) -> String {
    format!("{}Procs", pascal_case(plugin))
}

fn render_alias(out: &mut String, proc: &Procedure) {
    write!(out, "using FN_{} = {} (", proc.name, proc.return_type).unwrap();
    for (i, arg) in proc.args.iter().enumerate() {
        out.push_str(&arg.ty);
        if let Some(name) = &arg.name {
            out.push(' ');
            out.push_str(name);
        }
        if i != proc.args.len() - 1 {
            out.push_str(", ");
        }
    }
    out.push_str(");\n");
}

/// Render the full header text for one plugin.
pub fn render_header(descriptor: &PluginDescriptor) -> String {
    let name = &descriptor.name;
    let guard = format!("_PLUGIN_{}_HPP", name.to_uppercase());
    let struct_name = procs_struct_name(name);

    let mut out = String::new();
    out.push_str("//! WARNING: this file is auto-generated (by `plugforge generate`).\n\n");
    writeln!(out, "#ifndef {guard}").unwrap();
    writeln!(out, "#define {guard}").unwrap();
    out.push('\n');
    writeln!(out, "#include \"../../../plugins_src/{name}/{name}_types.hpp\"").unwrap();
    out.push('\n');
    writeln!(out, "namespace {name} {{").unwrap();
    out.push('\n');

    for proc in &descriptor.procedures {
        render_alias(&mut out, proc);
    }
    if !descriptor.procedures.is_empty() {
        out.push('\n');
    }

    writeln!(out, "struct {struct_name} {{").unwrap();
    for proc in &descriptor.procedures {
        writeln!(out, "    FN_{name}* {name};", name = proc.name).unwrap();
    }
    out.push_str("};\n");

    out.push('\n');
    out.push_str("} // namespace\n");
    out.push('\n');
    out.push_str("#endif // include guard\n");
    out
}
