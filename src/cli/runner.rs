use crate::{
    cli::{context::ContextCollector, Commands, RenderArgs, ValidateArgs},
    engine::TemplateEngine,
    error::Result,
    options::EngineConfig,
};
use std::path::Path;

/// Runs one CLI command.
pub async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Render(args) => {
            let output = render(&args).await?;
            println!("{output}");
            Ok(())
        }
        Commands::Validate(args) => validate(&args),
    }
}

/// Renders the template named by `args` and returns the output.
pub async fn render(args: &RenderArgs) -> Result<String> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if config.include_root.is_none() {
        config.include_root = Some(template_dir(&args.template));
    }

    let mut options = config.render.clone();
    if args.format.is_some() {
        options.format = args.format;
    }
    options.trim_whitespace |= args.trim;
    options.placeholder.throw_on_error |= args.strict;
    if args.no_cache {
        options.use_cache = false;
    }

    let template = tokio::fs::read_to_string(&args.template).await?;
    let context = ContextCollector::collect(args.context_file.as_deref(), args.context.as_deref())?;
    log::info!(
        "Rendering {} with context keys [{}]",
        args.template.display(),
        context.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    let engine = TemplateEngine::with_config(config);
    engine.process_template(&template, &context, &options).await
}

fn validate(args: &ValidateArgs) -> Result<()> {
    let template = std::fs::read_to_string(&args.template)?;
    TemplateEngine::new().validate_template(&template)?;
    println!("{} is valid.", args.template.display());
    Ok(())
}

fn template_dir(template: &Path) -> std::path::PathBuf {
    match template.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    }
}
