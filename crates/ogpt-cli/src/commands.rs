//! Available subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Build the binary with make in the source directory
    Compile,

    /// Run `ollama serve` in the foreground until Ctrl-C
    Serve,

    /// List installed models
    List {
        /// Ask the running server over HTTP instead of starting it
        #[arg(long)]
        via_api: bool,
    },

    /// Pull a model, streaming download progress
    Pull {
        /// Model name, e.g. "llama3"
        name: String,
        /// Run `ollama pull` as a child process instead of using the API
        #[arg(long)]
        no_http: bool,
    },

    /// Generate a completion, streaming tokens as they arrive
    Generate {
        /// Model name
        model: String,
        /// Prompt text
        prompt: String,
        /// Also print every raw response line
        #[arg(long)]
        raw: bool,
    },

    /// Chat with a model interactively (`ollama run <model>` on a terminal)
    Run {
        /// Model name
        model: String,
    },

    /// Launch the compiled binary without arguments
    RunBinary,

    /// Print the effective settings as JSON
    Settings,
}

#[cfg(test)]
mod tests {
    use crate::Cli;
    use crate::commands::Commands;
    use clap::Parser;

    #[test]
    fn pull_flags() {
        let cli = Cli::parse_from(["ogpt", "pull", "llama3", "--no-http"]);
        match cli.command {
            Some(Commands::Pull { name, no_http }) => {
                assert_eq!(name, "llama3");
                assert!(no_http);
            }
            _ => panic!("expected pull"),
        }
    }

    #[test]
    fn generate_takes_model_and_prompt() {
        let cli = Cli::parse_from(["ogpt", "generate", "llama3", "why is the sky blue"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Generate { ref model, ref prompt, raw: false })
                if model == "llama3" && prompt == "why is the sky blue"
        ));
    }
}
