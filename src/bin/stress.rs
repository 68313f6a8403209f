//! Randomized edit stress run
//!
//! Usage: rift-stress [ITERATIONS] [SEED] [ENCODING] [INITIAL_BYTES]
//!
//! Loads a generated document of about INITIAL_BYTES (default 512 KiB),
//! applies random batched edits with an interpretation attached, checks the
//! line index against a full decode at intervals and periodically unwinds
//! the undo history back to the last checkpoint. Set `RUST_LOG` for output.

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rift_buffer::interpret::encoding;
use rift_buffer::{
    Buffer, BufferOptions, Encoding, Interpretation, InterpretationOptions, Logger, SourceId,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const FRAGMENTS: &[&str] = &["a", "word ", "\n", "\r", "\r\n", "é", "€", "😀", "\t"];

/// Largest removal per operation; inserts average about the same size
const MAX_REMOVE: usize = 24;
const MAX_INSERT_FRAGMENTS: usize = 8;

fn random_text(rng: &mut StdRng, encoding: &dyn Encoding, fragments: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..fragments {
        let text = FRAGMENTS[rng.gen_range(0..FRAGMENTS.len())];
        out.extend(encoding.encode_str(text));
    }
    out
}

fn initial_document(rng: &mut StdRng, encoding: &dyn Encoding, size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size + 64);
    while out.len() < size {
        out.extend(random_text(rng, encoding, 16));
    }
    out
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let iterations: usize = match args.next() {
        Some(arg) => arg.parse().context("ITERATIONS must be a number")?,
        None => 10_000,
    };
    let seed: u64 = match args.next() {
        Some(arg) => arg.parse().context("SEED must be a number")?,
        None => rand::random(),
    };
    let encoding_name = args.next().unwrap_or_else(|| "utf-8".to_string());
    let Some(encoding) = encoding::by_name(&encoding_name) else {
        bail!("unknown encoding: {}", encoding_name);
    };
    let initial_bytes: usize = match args.next() {
        Some(arg) => arg.parse().context("INITIAL_BYTES must be a number")?,
        None => 512 * 1024,
    };

    tracing::info!(
        iterations,
        seed,
        initial_bytes,
        encoding = encoding.name(),
        "stress run starting"
    );

    // Room for every edit between two unwinds
    let options = BufferOptions {
        history_limit: 2000,
        ..BufferOptions::default()
    };
    let buffer = Buffer::with_options(options, Logger::ambient());
    let mut rng = StdRng::seed_from_u64(seed);
    buffer.load(&initial_document(&mut rng, encoding.as_ref(), initial_bytes))?;

    let interp = Interpretation::open_with(
        &buffer,
        Arc::clone(&encoding),
        InterpretationOptions {
            verify_integrity: false,
        },
    );
    let mut checkpoint = buffer.snapshot().to_bytes();
    let mut rejected = 0usize;
    let mut max_pieces = 0usize;

    for i in 0..iterations {
        let len = buffer.length();
        let mut tx = buffer.begin(SourceId::NONE);
        for _ in 0..rng.gen_range(1..=4) {
            let offset = rng.gen_range(0..=len);
            let remove = rng.gen_range(0..=(len - offset).min(MAX_REMOVE));
            let fragments = rng.gen_range(0..=MAX_INSERT_FRAGMENTS);
            tx.modify(offset, remove, random_text(&mut rng, encoding.as_ref(), fragments));
        }
        if tx.end().is_err() {
            rejected += 1;
        }
        max_pieces = max_pieces.max(buffer.snapshot().piece_count());

        if i % 100 == 99 && !interp.check_integrity() {
            bail!("line index diverged at iteration {} (seed {})", i, seed);
        }

        if i % 1000 == 999 {
            while buffer.undo(SourceId::NONE)?.is_some() {}
            if buffer.snapshot().to_bytes() != checkpoint {
                bail!("undo did not restore the checkpoint at iteration {} (seed {})", i, seed);
            }
            if !interp.check_integrity() {
                bail!("line index diverged after undo at iteration {} (seed {})", i, seed);
            }
            while buffer.redo(SourceId::NONE)?.is_some() {}
            checkpoint = buffer.snapshot().to_bytes();
            buffer.load(&checkpoint)?;
            tracing::info!(
                iteration = i + 1,
                bytes = checkpoint.len(),
                max_pieces,
                "history unwound and replayed"
            );
        }
    }

    let view = interp.snapshot();
    if !view.check_integrity() {
        bail!("line index diverged at the end of the run (seed {})", seed);
    }
    println!(
        "{} iterations, {} rejected, {} bytes, {} lines, {} pieces (max {}) (seed {})",
        iterations,
        rejected,
        view.buffer().len(),
        view.lines().line_count(),
        view.buffer().piece_count(),
        max_pieces,
        seed
    );
    Ok(())
}
