use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use rna_mi::config::{LengthProfile, MsaQuality, ScoreParams, DEFAULT_MAX_SEQUENCES};
use rna_mi::io::fasta;
use rna_mi::mi::{CouplingResult, ResultMeta};
use rna_mi::msa::filter::{filter_sequences, FilterParams};
use rna_mi::msa::Alignment;
use rna_mi::{score_alignment, score_plain, Chunking};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "rna-mi",
    author,
    version,
    about = "Covariation scoring of RNA multiple sequence alignments",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, short = 'l', global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score an aligned FASTA file (MI + APC, chunked for long alignments)
    Score(ScoreArgs),
    /// Print the top pairs of a saved result
    Top {
        /// Result file written by `score -o`
        result: String,
        #[arg(short = 'n', default_value_t = 20)]
        n: usize,
    },
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Aligned FASTA file
    msa: String,
    /// Save the full result (bincode)
    #[arg(short, long)]
    out: Option<String>,
    /// Write top pairs as TSV ("-" for stdout)
    #[arg(long = "top-pairs")]
    top_pairs: Option<String>,
    /// Fixed pseudocount (adaptive by Neff if omitted)
    #[arg(long)]
    pseudocount: Option<f64>,
    #[arg(long = "max-length")]
    max_length: Option<usize>,
    #[arg(long = "chunk-size")]
    chunk_size: Option<usize>,
    #[arg(long)]
    overlap: Option<usize>,
    #[arg(long = "gap-threshold")]
    gap_threshold: Option<f64>,
    #[arg(long = "identity-threshold")]
    identity_threshold: Option<f64>,
    #[arg(long = "max-top-pairs")]
    max_top_pairs: Option<usize>,
    /// Preset by RNA length (picked from the alignment length if omitted)
    #[arg(long = "length-profile", value_enum)]
    length_profile: Option<LengthProfile>,
    /// Preset by MSA quality
    #[arg(long, value_enum)]
    quality: Option<MsaQuality>,
    /// Shrink chunks to fit this much memory (MB)
    #[arg(long = "memory-mb")]
    memory_mb: Option<f64>,
    /// Drop gappy and redundant sequences before scoring
    #[arg(long)]
    filter: bool,
    #[arg(long = "max-sequences")]
    max_sequences: Option<usize>,
    /// Unweighted MI without pseudocounts or APC
    #[arg(long)]
    plain: bool,
    /// Downweight near-diagonal pairs and smooth the coupling matrix
    #[arg(long = "rna-adjust")]
    rna_adjust: bool,
    #[arg(long = "no-chunking", conflicts_with = "force_chunking")]
    no_chunking: bool,
    #[arg(long = "force-chunking")]
    force_chunking: bool,
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    TermLogger::init(cli.log_level, Default::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .map_err(|e| anyhow::anyhow!("cannot initialise logger: {}", e))?;

    match cli.command {
        Commands::Score(args) => run_score(args),
        Commands::Top { result, n } => run_top(&result, n),
    }
}

/// 按命令行组装打分参数：先长度预设，再质量预设，最后是单独指定的选项
fn build_params(args: &ScoreArgs, n_cols: usize) -> ScoreParams {
    let profile = args.length_profile.unwrap_or_else(|| LengthProfile::for_length(n_cols));
    let mut params = ScoreParams::default().with_length_profile(profile);
    if let Some(q) = args.quality {
        params = params.with_quality(q);
    }
    if let Some(mb) = args.memory_mb {
        params.fit_memory_budget(mb, n_cols);
    }

    if args.pseudocount.is_some() {
        params.pseudocount = args.pseudocount;
    }
    if let Some(v) = args.max_length {
        params.max_length = v;
    }
    if let Some(v) = args.chunk_size {
        params.chunk_size = v;
    }
    if let Some(v) = args.overlap {
        params.overlap = v;
    }
    if let Some(v) = args.gap_threshold {
        params.gap_threshold = v;
    }
    if let Some(v) = args.identity_threshold {
        params.identity_threshold = v;
    }
    if let Some(v) = args.max_top_pairs {
        params.max_top_pairs = v;
    }
    if args.no_chunking {
        params.chunking = Chunking::Never;
    } else if args.force_chunking {
        params.chunking = Chunking::Always;
    }
    params.rna_adjust = args.rna_adjust;
    params
}

fn run_score(args: ScoreArgs) -> Result<()> {
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("cannot configure thread pool: {}", e))?;
    }

    let max_sequences = args
        .max_sequences
        .or_else(|| args.quality.map(|q| q.max_sequences()))
        .unwrap_or(DEFAULT_MAX_SEQUENCES);
    let records = fasta::load_alignment(&args.msa, max_sequences)?;
    let params = build_params(&args, records.n_cols());

    let mut sequences = records.sequences;
    if args.filter {
        let aln = Alignment::from_sequences(&sequences)?;
        let fp = FilterParams {
            gap_threshold: params.gap_threshold,
            identity_threshold: params.identity_threshold,
            max_sequences,
        };
        match filter_sequences(&aln, &fp) {
            Some(filtered) => {
                sequences =
                    filtered.alignment.to_strings().into_iter().map(String::into_bytes).collect()
            }
            None => anyhow::bail!("no sequences left in '{}' after filtering", args.msa),
        }
    }

    let mut result = if args.plain {
        score_plain(&sequences)?
    } else {
        score_alignment(&sequences, None, &params)?
    };
    result.set_meta(ResultMeta {
        msa_file: Some(args.msa.clone()),
        command: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        created_at: Some(chrono::Utc::now().to_rfc3339()),
    });

    print_summary(&args.msa, &result);

    if let Some(path) = &args.out {
        result
            .save_to_file(path)
            .map_err(|e| anyhow::anyhow!("cannot write result to '{}': {}", path, e))?;
        info!("result saved: {}", path);
    }
    match args.top_pairs.as_deref() {
        Some("-") => result.write_top_pairs(std::io::stdout().lock())?,
        Some(path) => {
            let fh = std::fs::File::create(path)
                .map_err(|e| anyhow::anyhow!("cannot create '{}': {}", path, e))?;
            result.write_top_pairs(std::io::BufWriter::new(fh))?;
        }
        None => {}
    }
    Ok(())
}

fn print_summary(msa: &str, result: &CouplingResult) {
    let p = &result.params;
    println!("msa: {}", msa);
    println!("sequences: {} ({} distinct)", p.n_seqs, p.distinct_seqs);
    println!("columns: {}", p.n_cols);
    println!("method: {}", result.method.tag());
    println!("neff: {:.2}", result.effective_n);
    println!("pseudocount: {} ({:?})", p.pseudocount, p.pseudocount_source);
    if !p.chunks.is_empty() {
        println!("chunks: {}", p.chunks.len());
    }
    if p.partial_failure {
        println!("partial_failure: true");
    }
    println!("top_pairs: {}", result.top_pairs.len());
    println!("elapsed: {:.2?}", result.elapsed);
}

fn run_top(path: &str, n: usize) -> Result<()> {
    let result = CouplingResult::load_from_file(path)
        .map_err(|e| anyhow::anyhow!("cannot read result '{}': {}", path, e))?;
    if let Some(src) = &result.meta.msa_file {
        println!("# msa: {}", src);
    }
    if let Some(ts) = &result.meta.created_at {
        println!("# created: {}", ts);
    }
    println!("# method: {}", result.method.tag());
    println!("i\tj\tscore");
    for p in result.top_pairs.iter().take(n) {
        println!("{}\t{}\t{:.6}", p.i, p.j, p.score);
    }
    Ok(())
}
