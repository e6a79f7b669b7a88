use crate::cli::TransformArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use sdatools::{
    engine::config::{RotationSpec, TransformConfig},
    workflows,
};
use tracing::info;

fn rotation(args: &TransformArgs) -> Result<RotationSpec> {
    let to_cli = |e: parser::ParseError| CliError::Argument(e.to_string());
    if let Some(values) = &args.rotation_matrix {
        return Ok(RotationSpec::Matrix(parser::matrix3(values).map_err(to_cli)?));
    }
    if let Some(angles) = &args.euler_angles {
        return Ok(RotationSpec::EulerXyzDegrees(parser::vector3(angles).map_err(to_cli)?));
    }
    Ok(RotationSpec::None)
}

pub async fn run(args: TransformArgs) -> Result<()> {
    let target_com = parser::vector3(&args.target_com).map_err(|e| CliError::Argument(e.to_string()))?;
    let rotation = rotation(&args)?;
    info!("Rotation: {:?}", rotation);

    let config = TransformConfig {
        input: args.input,
        output: args.output,
        target_com,
        rotation,
    };
    tokio::task::block_in_place(|| workflows::transform::run(&config))?;
    println!("✓ Structure written to: {}", config.output.display());
    Ok(())
}
