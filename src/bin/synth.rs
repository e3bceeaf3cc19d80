//! Synthesize the demo stack into a cloud assembly directory.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use fargate_demo::logger;
use fargate_demo::stack::assembly::{self, TemplateFormat};
use fargate_demo::stack::{self, Environment, StackError, StackProps, StackSettings};

#[derive(Parser, Debug)]
#[command(name = "fargate-demo-synth")]
#[command(about = "Synthesize the Fargate demo stack into a CloudFormation template")]
#[command(version)]
struct Cli {
    /// Cloud assembly directory
    #[arg(short, long, default_value = "cdk.out")]
    output: PathBuf,

    /// Template serialization
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Print the template instead of writing the assembly
    #[arg(long)]
    stdout: bool,

    /// Stack name
    #[arg(long, env = "STACK_NAME", default_value = stack::DEFAULT_STACK_NAME)]
    stack_name: String,

    /// Optional stack settings file
    #[arg(long, default_value = "stack.toml")]
    settings: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl From<Format> for TemplateFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => Self::Json,
            Format::Yaml => Self::Yaml,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        logger::log_error(&format!("Synthesis failed: {e}"));
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), StackError> {
    let mut props = StackProps::demo(Environment::from_env());
    props.stack_name.clone_from(&cli.stack_name);
    props.settings = StackSettings::load(&cli.settings)?;

    let template = stack::synthesize(&props)?;
    let format = TemplateFormat::from(cli.format);

    if cli.stdout {
        print!("{}", assembly::render(&template, format)?);
        return Ok(());
    }

    let path = assembly::write(&cli.output, &props.stack_name, &props.env, &template, format)?;
    logger::log_info(&format!(
        "Synthesized {} ({} resources) to {}",
        props.stack_name,
        template.resources.len(),
        path.display()
    ));
    Ok(())
}
