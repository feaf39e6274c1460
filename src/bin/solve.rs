use std::io::{Read, Write};

use flexi_logger::Logger;
use perm_treap::{solve, Input, DEFAULT_SEED};

const SEED_ENV: &str = "PERM_TREAP_SEED";

/// `--seed N` wins over the environment, which wins over the default.
fn seed() -> Result<u64, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {}
        [flag, value] if flag == "--seed" => {
            return Ok(value
                .parse::<u64>()
                .map_err(|e| format!("bad --seed {value:?}: {e}"))?);
        }
        _ => return Err(format!("usage: solve [--seed N], got {args:?}").into()),
    }
    match std::env::var(SEED_ENV) {
        Ok(value) => Ok(value
            .parse::<u64>()
            .map_err(|e| format!("bad {SEED_ENV} {value:?}: {e}"))?),
        Err(std::env::VarError::NotPresent) => Ok(DEFAULT_SEED),
        Err(e) => Err(format!("bad {SEED_ENV}: {e}").into()),
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let seed = seed()?;
    log::debug!("using seed {seed}");
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    let input = Input::parse(&text)?;
    log::info!(
        "read {} elements and {} queries",
        input.elements.len(),
        input.queries.len()
    );
    let out = solve(&input, seed)?;
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{out}")?;
    stdout.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _logger = Logger::try_with_env_or_str("warn")?
        .log_to_stderr()
        .set_palette("196;208;3;7;8".to_owned())
        .format(|w, now, record| {
            let style = flexi_logger::style(record.level());
            write!(
                w,
                "{} {pref}[{}] {}{suf}",
                now.format("%H:%M:%S"),
                &record.level().as_str()[0..1],
                record.args(),
                pref = style.prefix(),
                suf = style.suffix(),
            )
        })
        .start()?;
    run().inspect_err(|e| log::error!("{e}"))
}
