use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sentimo")]
#[command(author, version, about = "Sentiment model training, registry and serving")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "sentimo.yaml")]
    pub config: PathBuf,

    /// Registry root, overriding `registry.root`
    #[arg(short, long, global = true, env = "SENTIMO_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Experiment name, overriding `registry.experiment`
    #[arg(short, long, global = true)]
    pub experiment: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier on a CSV corpus and record the run
    Train {
        /// Corpus CSV with `review` and `sentiment` columns
        #[arg(long)]
        corpus: PathBuf,

        /// Promote the experiment's best run afterwards
        #[arg(long)]
        promote: bool,
    },

    /// Promote a run (the experiment's best when no id is given)
    Promote {
        /// Run to promote
        #[arg(long)]
        run_id: Option<String>,
    },

    /// List the experiment's runs, best first
    Runs {
        /// Show the promotion history instead
        #[arg(long)]
        history: bool,
    },

    /// Serve predictions from the promoted pair
    Serve {
        /// Listen address
        #[arg(short, long)]
        listen: Option<String>,

        /// Listen port
        #[arg(short = 'P', long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train() {
        let cli = Cli::parse_from([
            "sentimo", "train", "--corpus", "data/imdb.csv", "--promote", "-e", "reviews",
        ]);
        assert_eq!(cli.experiment.as_deref(), Some("reviews"));
        match cli.command {
            Commands::Train { corpus, promote } => {
                assert_eq!(corpus, PathBuf::from("data/imdb.csv"));
                assert!(promote);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["sentimo", "--verbose", "serve", "-P", "9000"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("sentimo.yaml"));
        assert!(matches!(
            cli.command,
            Commands::Serve { listen: None, port: Some(9000) }
        ));
    }
}
