//! Config command - show the resolved configuration and credential presence

use colored::*;

use crate::cli::context::CliContext;
use crate::cli::error::CliResult;

/// Options for the config command
#[derive(Debug, Clone)]
pub struct ConfigShowOptions {
    /// Skip the credential check
    pub toml_only: bool,
}

/// `(variable, present)` for every credential the runtime reads.
pub fn credential_status(ctx: &CliContext) -> Vec<(&'static str, bool)> {
    vec![
        ("OPENAI_API_KEY", ctx.env.openai_api_key().is_some()),
        ("OPENAI_BASE_URL", ctx.env.openai_base_url().is_some()),
        ("WEAVIATE_URL", ctx.env.weaviate_url().is_some()),
        ("WEAVIATE_API_KEY", ctx.env.weaviate_api_key().is_some()),
    ]
}

pub fn run(ctx: &CliContext, opts: ConfigShowOptions) -> CliResult<()> {
    let rendered = ctx.loader.to_toml()?;
    if opts.toml_only {
        print!("{}", rendered);
        return Ok(());
    }

    println!("{}", "Configuration Check".cyan().bold());
    println!("{}", "===================".cyan());

    let path = &ctx.loader.config_path;
    if path.exists() {
        println!("{}", format!("✓ Config file: {}", path.display()).green());
    } else {
        println!("{}", "Using default configuration".yellow());
    }

    match ctx.env.env_file() {
        Some(env_file) => println!("{}", format!("Env file: {}", env_file).green()),
        None => println!("{}", "No environment file loaded".yellow()),
    }

    for (name, present) in credential_status(ctx) {
        if present {
            println!("{}", format!("✓ {} set", name).green());
        } else {
            println!("{}", format!("✗ {} not set", name).red());
        }
    }

    println!("\n{}", "Resolved configuration:".bold());
    print!("{}", rendered);
    Ok(())
}
