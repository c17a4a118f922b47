pub mod commands;
pub mod output;
pub mod resolve;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pst")]
#[command(about = "Patch stack manager for git: named patches you can push, pop and squash")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a patch stack on the current branch
    Init {
        /// Turn the top N commits of the branch into applied patches
        #[arg(long, value_name = "N", default_value_t = 0)]
        adopt: usize,
    },

    /// Show the stack of the current branch
    Status,

    /// Apply unapplied patches
    Push {
        /// Patches to push, in order (default: the next one)
        names: Vec<String>,

        /// Push every unapplied patch
        #[arg(long, short, conflicts_with = "names")]
        all: bool,
    },

    /// Unapply patches
    Pop {
        /// Patches to pop (default: the top one)
        names: Vec<String>,

        /// Pop every applied patch
        #[arg(long, short, conflicts_with = "names")]
        all: bool,
    },

    /// Squash two or more patches into one
    #[command(long_about = "Squash two or more patches into one.\n\n\
        The given patches are popped together with everything above them, pushed \
        back in the order given on the command line, and replaced by one patch \
        holding their combined changes. Patches popped on the way are pushed again \
        afterwards. A conflict stops the squash in place; use `pst resolve` or \
        `pst undo --hard`.")]
    Squash {
        /// Patches to squash, in the order their changes are combined
        #[arg(required = true, num_args = 1..)]
        patches: Vec<String>,

        /// Name for the squashed patch
        #[arg(long, short)]
        name: Option<String>,

        /// Use MESSAGE as the patch message instead of invoking the editor
        #[arg(long, short)]
        message: Option<String>,

        /// Read the patch message from FILE
        #[arg(long, short, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Pre-fill the editor with the contents of FILE
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Write the message template to PATH (`-` for stdout) and exit
        #[arg(long, value_name = "PATH")]
        save_template: Option<String>,

        /// Set the author, as "Name <email>"
        #[arg(long)]
        author: Option<String>,
    },

    /// Undo the last stack operations
    Undo {
        /// Number of operations to undo
        #[arg(long = "number", short = 'n', default_value_t = 1)]
        steps: usize,

        /// Discard conflicts and local changes
        #[arg(long)]
        hard: bool,
    },

    /// Redo operations removed by undo
    Redo {
        /// Number of operations to redo
        #[arg(long = "number", short = 'n', default_value_t = 1)]
        steps: usize,

        /// Discard conflicts and local changes
        #[arg(long)]
        hard: bool,
    },

    /// Finish a conflicted push after resolving the conflicts
    Resolve,

    /// Show the snapshot log
    Log {
        /// Show only the last N entries
        #[arg(long = "number", short = 'n')]
        limit: Option<usize>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., author.name)
        key: String,
        /// Configuration value
        value: String,
        /// Write to the global config instead of the repository's
        #[arg(long)]
        global: bool,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all configuration values
    List,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            Commands::Init { adopt } => commands::init::run(adopt),
            Commands::Status => commands::status::run(),
            Commands::Push { names, all } => commands::push::push(names, all),
            Commands::Pop { names, all } => commands::push::pop(names, all),
            Commands::Squash {
                patches,
                name,
                message,
                file,
                template,
                save_template,
                author,
            } => commands::squash::run(commands::squash::SquashArgs {
                patches,
                name,
                message,
                file,
                template,
                save_template,
                author,
            }),
            Commands::Undo { steps, hard } => commands::undo::undo(steps, hard),
            Commands::Redo { steps, hard } => commands::undo::redo(steps, hard),
            Commands::Resolve => commands::resolve::run(),
            Commands::Log { limit } => commands::log::run(limit),
            Commands::Config { action } => commands::config::run(action),
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr);

        // try_init: a subscriber may already be installed when run in-process
        if self.no_color {
            let _ = subscriber.with_ansi(false).try_init();
        } else {
            let _ = subscriber.try_init();
        }
    }
}
