use clap::{Parser, Subcommand};
use rag_kit::Result;
use rag_kit::commands::{
    create_index, delete_index, index_status, query, resolve_config_dir, search, upload,
};
use rag_kit::config::{run_interactive_config, show_config};
use rag_kit::indexer::SourceDocument;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-kit")]
#[command(about = "Retrieval-augmented question answering over your own documents")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.rag-kit)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation backends
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Segment, embed and upload source files into the index
    Upload {
        /// Source file tagged with its type, e.g. faq=./faq.txt
        #[arg(long = "source", value_name = "TYPE=PATH", required = true)]
        sources: Vec<SourceDocument>,
        /// Drop and recreate the index before uploading
        #[arg(long)]
        recreate: bool,
    },
    /// Answer a question from the indexed documents
    Query {
        question: String,
        /// Number of passages to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the retrieved matches and assembled context
        #[arg(long)]
        show_context: bool,
    },
    /// Show the passages closest to a question
    Search {
        question: String,
        /// Number of matches to show
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Manage the vector index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create the configured index
    Create {
        /// Replace an existing index, deleting its records
        #[arg(long)]
        force: bool,
    },
    /// Delete the configured index
    Delete {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show dimension, metric and record count
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Upload { sources, recreate } => {
            upload(&config_dir, sources, recreate).await?;
        }
        Commands::Query {
            question,
            top_k,
            show_context,
        } => {
            query(&config_dir, &question, top_k, show_context).await?;
        }
        Commands::Search { question, top_k } => {
            search(&config_dir, &question, top_k).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Create { force } => create_index(&config_dir, force).await?,
            IndexAction::Delete { yes } => delete_index(&config_dir, yes).await?,
            IndexAction::Status => index_status(&config_dir).await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn upload_command_with_sources() {
        let cli = Cli::try_parse_from([
            "rag-kit",
            "upload",
            "--source",
            "faq=faq.txt",
            "--source",
            "tool_use=tools.txt",
            "--recreate",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Upload { sources, recreate } = parsed.command {
                assert_eq!(
                    sources,
                    [
                        SourceDocument::new("faq", "faq.txt"),
                        SourceDocument::new("tool_use", "tools.txt")
                    ]
                );
                assert!(recreate);
            } else {
                panic!("expected upload command");
            }
        }
    }

    #[test]
    fn upload_requires_a_source() {
        let cli = Cli::try_parse_from(["rag-kit", "upload"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn upload_rejects_malformed_source() {
        let cli = Cli::try_parse_from(["rag-kit", "upload", "--source", "faq.txt"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn query_command_with_options() {
        let cli = Cli::try_parse_from([
            "rag-kit",
            "query",
            "How does Canvas pricing work?",
            "--top-k",
            "3",
            "--show-context",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query {
                question,
                top_k,
                show_context,
            } = parsed.command
            {
                assert_eq!(question, "How does Canvas pricing work?");
                assert_eq!(top_k, Some(3));
                assert!(show_context);
            } else {
                panic!("expected query command");
            }
        }
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["rag-kit", "search", "pricing", "--config-dir", "/tmp/rk"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/rk")));
            assert!(matches!(parsed.command, Commands::Search { top_k: None, .. }));
        }
    }

    #[test]
    fn index_subcommands() {
        let cli = Cli::try_parse_from(["rag-kit", "index", "create", "--force"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Index {
                action: IndexAction::Create { force: true }
            })
        ));

        let cli = Cli::try_parse_from(["rag-kit", "index", "delete", "-y"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Index {
                action: IndexAction::Delete { yes: true }
            })
        ));

        let cli = Cli::try_parse_from(["rag-kit", "index", "status"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Index {
                action: IndexAction::Status
            })
        ));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["rag-kit", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["rag-kit", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["rag-kit", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
