//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "binary"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Build metadata for the HSUP daemon."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_cargo().all_git().emit()?;
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
