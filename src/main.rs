use log::{error, info};
use std::process;

use tally::{Args, Credentials, Extractor, Ledger, Session};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::try_parse_lenient(std::env::args_os()).unwrap_or_else(|err| err.exit());

    if let Err(err) = tally_range(&args) {
        error!("{}", err);
        process::exit(1);
    }
}

fn tally_range(args: &Args) -> tally::Result<()> {
    let range = args.range();
    range.validate()?;

    let credentials = Credentials::load(&args.env_file)?;
    let mut session = Session::login(&credentials)?;

    let mut ledger = Ledger::create(&args.output)?;
    let extractor = Extractor::new(args.product.as_str());
    let summary = tally::run(&mut session, &range, &extractor, &mut ledger)?;
    ledger.finish()?;

    info!(
        "wrote {} row(s) for {} day(s) to {}",
        summary.rows,
        summary.days,
        args.output.display()
    );
    println!("Done");
    println!("Total: {}", summary.total);
    Ok(())
}
