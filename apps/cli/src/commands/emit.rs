//! `refine emit`: print config fragments for an already fine-tuned model.

use super::types::EmitArgs;
use anyhow::{Context, Result};
use refine_training::{config_fragments, RecipeConfig, DEFAULT_PROVIDER_NAME};

pub fn execute(args: &EmitArgs) -> Result<()> {
    let config = RecipeConfig::load(&args.recipe.config).context("Failed to load config")?;
    let variant = config.variant(&args.recipe.function, &args.recipe.variant)?;
    let fragments = config_fragments(DEFAULT_PROVIDER_NAME, &args.recipe.function, &args.model_id, &variant.templates)?;

    println!("{}", fragments.model);
    println!("{}", fragments.variant);
    Ok(())
}
