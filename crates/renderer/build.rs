use std::path::Path;
use std::{env, fs};

use anyhow::{Context, Result, anyhow};
use naga::back::spv;
use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::ShaderStage;

const SHADERS: [(&str, ShaderStage); 2] = [
    ("quad.vert", ShaderStage::Vertex),
    ("quad.frag", ShaderStage::Fragment),
];

fn main() -> Result<()> {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
    let out_dir = env::var("OUT_DIR")?;
    let shaders_dir = Path::new(&manifest_dir).join("shaders");

    for (name, stage) in SHADERS {
        let path = shaders_dir.join(name);
        println!("cargo:rerun-if-changed={}", path.display());

        let words = compile(&path, stage).with_context(|| format!("compiling {}", name))?;
        let output = Path::new(&out_dir).join(format!("{}.spv", name));
        fs::write(&output, bytemuck::cast_slice::<u32, u8>(&words))?;
    }

    Ok(())
}

fn compile(path: &Path, stage: ShaderStage) -> Result<Vec<u32>> {
    let source = fs::read_to_string(path)?;

    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(stage), &source)
        .map_err(|e| anyhow!("{:?}", e))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| anyhow!("{:?}", e))?;

    // The projection matrix already flips Y.
    let mut options = spv::Options::default();
    options.flags.remove(spv::WriterFlags::ADJUST_COORDINATE_SPACE);

    Ok(spv::write_vec(&module, &info, &options, None)?)
}
