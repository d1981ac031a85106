use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use vecfuse_vector::FilterFallback;

#[derive(Parser, Debug)]
#[command(name = "vecfuse")]
#[command(about = "Manage code-chunk collections and run dense, lexical or fused searches.")]
#[command(
    after_help = "Every subcommand except `translate` needs a persistent backend: \
                  `backend.kind: memory` is rejected because nothing survives the process."
)]
pub(crate) struct Cli {
    /// Override config directory holding `vecfuse/settings.yaml`.
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins).
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Policy for filter expressions that do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FallbackArg {
    Reject,
    IgnoreFilter,
    UseDefault,
}

impl From<FallbackArg> for FilterFallback {
    fn from(value: FallbackArg) -> Self {
        match value {
            FallbackArg::Reject => Self::Reject,
            FallbackArg::IgnoreFilter => Self::IgnoreFilter,
            FallbackArg::UseDefault => Self::UseDefault,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Translate a filter expression and print the predicate as JSON.
    Translate {
        /// Expression such as `fileExtension in [".rs", ".py"]`
        expression: String,

        /// Apply this fallback instead of the total translation
        #[arg(long, value_enum)]
        policy: Option<FallbackArg>,
    },
    /// Collection lifecycle.
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
    /// Upsert documents from a JSON-lines file (`-` for stdin).
    Insert {
        collection: String,
        /// One `Document` object per line
        input: PathBuf,
    },
    /// Delete documents by id.
    Delete {
        collection: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// List documents, optionally filtered.
    Query {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Dense-vector search.
    Search {
        collection: String,
        /// Comma-separated embedding, e.g. `0.1,0.2,0.3`
        #[arg(long, required = true, value_delimiter = ',', allow_negative_numbers = true)]
        vector: Vec<f32>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Dense and lexical search fused into one ranking.
    Hybrid {
        collection: String,
        /// Comma-separated embedding for the dense modality
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        vector: Option<Vec<f32>>,
        /// Query text for the lexical modality
        #[arg(long)]
        text: Option<String>,
        /// Per-modality fetch limit (default: --limit)
        #[arg(long)]
        fetch: Option<usize>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        filter: Option<String>,
        /// Policy for an unparseable --filter (default from settings)
        #[arg(long, value_enum)]
        fallback: Option<FallbackArg>,
        /// Keep going when one modality fails
        #[arg(long)]
        degrade: bool,
        /// Issue modality requests concurrently
        #[arg(long)]
        concurrent: bool,
        /// Whole-call deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum CollectionsAction {
    /// Print collection names.
    List,
    /// Create an empty collection.
    Create {
        name: String,
        /// Embedding dimension (default from settings)
        #[arg(long)]
        dimension: Option<usize>,
    },
    /// Drop a collection and its documents.
    Drop { name: String },
}
