mod common;

use common::{project_with_plugins, FakeToolchain};
use plugforge::pipeline;

/// Linking a plugin at version 0 and then at version 1 leaves both
/// artifacts on disk: a running host keeps the old module mapped until it
/// repoints its call table.
#[test]
fn versioned_artifacts_coexist() {
    let (_dir, ctx) = project_with_plugins(&["fluid_sim"]);
    let toolchain = FakeToolchain::default();
    pipeline::run_full_build(&ctx, &toolchain).unwrap();
    assert!(ctx.plugin_artifact("fluid_sim", 0).is_file());

    pipeline::run_link(
        &ctx,
        &toolchain,
        &["fluid_sim".to_string()],
        Some(&[1]),
    )
    .unwrap();

    assert!(ctx.plugin_artifact("fluid_sim", 0).is_file());
    assert!(ctx.plugin_artifact("fluid_sim", 1).is_file());
}

/// A subset relink must only clean up the artifacts it is about to
/// regenerate. Other plugins' modules may still be mapped by a running
/// host and have to survive.
#[test]
fn subset_relink_leaves_unrelated_artifacts_alone() {
    let (_dir, ctx) = project_with_plugins(&["audio", "fluid_sim"]);
    let toolchain = FakeToolchain::default();
    pipeline::run_full_build(&ctx, &toolchain).unwrap();

    pipeline::run_link(&ctx, &toolchain, &["fluid_sim".to_string()], Some(&[7])).unwrap();

    assert!(ctx.plugin_artifact("fluid_sim", 7).is_file());
    assert!(ctx.plugin_artifact("audio", 0).is_file(), "unrelated artifact was destroyed");
    assert!(ctx.plugin_artifact("fluid_sim", 0).is_file());
}

/// Relinking the same version replaces that artifact only.
#[test]
fn relink_replaces_exactly_the_requested_version() {
    let (_dir, ctx) = project_with_plugins(&["audio", "fluid_sim"]);
    let toolchain = FakeToolchain::default();
    pipeline::run_full_build(&ctx, &toolchain).unwrap();

    let relink = FakeToolchain::default();
    pipeline::run_link(&ctx, &relink, &["audio".to_string()], None).unwrap();

    let linked = relink.linked_artifacts();
    assert_eq!(linked.len(), 1);
    assert!(linked[0].ends_with("audio.so.0"));
    assert!(ctx.plugin_artifact("fluid_sim", 0).is_file());
}
