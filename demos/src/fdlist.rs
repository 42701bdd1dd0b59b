//! Lists the open files of one task in a raw memory dump.
//!
//! Usage:
//!   fdlist <symbols.json> <dump.raw> <dump-base-hex> <task-hex>
//!
//! Set `RUST_LOG=debug` to see why a path came out empty.

use fdpath::{Context, MemoryImageBuilder, Resolver, SymbolSpace, SymbolTable};
use log::info;
use std::env;
use std::error::Error;
use std::fs::File;
use std::process;

const TABLE: &str = "linux";

fn parse_address(arg: &str) -> Result<u64, Box<dyn Error>> {
    let digits = arg.trim_start_matches("0x");
    Ok(u64::from_str_radix(digits, 16)?)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        eprintln!("usage: fdlist <symbols.json> <dump.raw> <base-hex> <task-hex>");
        process::exit(2);
    }
    let base = parse_address(&args[3])?;
    let task = parse_address(&args[4])?;

    let mut symbols = SymbolSpace::new();
    symbols.insert(SymbolTable::from_isf(TABLE, File::open(&args[1])?)?);
    let image = MemoryImageBuilder::from(File::open(&args[2])?)
        .with_base(base)
        .build()?;
    info!("loaded {} bytes of memory", image.mapped_len());

    let ctx = Context::new(image, symbols);
    let resolver = Resolver::new(&ctx, TABLE)?;
    for open in resolver.file_descriptors(resolver.task(task)?) {
        println!("{}\t{}", open.fd, open.path);
    }
    Ok(())
}
