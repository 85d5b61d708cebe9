//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Shared primitives and utilities for the supervisor runtime."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Builds outside a git checkout fall back to vergen's placeholder values.
    EmitBuilder::builder().all_cargo().all_build().all_git().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
