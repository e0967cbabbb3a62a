//! Prints the deployment descriptor as JSON
//!
//! Secret values are masked unless `--reveal-secrets` is passed.

use pantry_auth::deploy::DeploymentDescriptor;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let reveal = std::env::args().skip(1).any(|arg| arg == "--reveal-secrets");

    let descriptor = DeploymentDescriptor::from_env()?;
    let descriptor = if reveal {
        descriptor
    } else {
        descriptor.redacted()
    };

    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}
