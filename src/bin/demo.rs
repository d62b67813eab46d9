//! Interactive defragmentation demo
//!
//! Console driver around the diskpack core: seeds a disk with randomly
//! scattered files, then offers a menu to inspect the grid, add and delete
//! files, and watch the compaction pass run swap by swap.

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use diskpack::{DefragEvent, Defragmenter, Disk, DiskError, DEFAULT_CAPACITY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "diskpack-demo")]
#[command(about = "Simulated disk defragmentation demo")]
struct Args {
    /// Number of blocks in the arena
    #[arg(short = 'c', long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Grid width used when rendering the arena
    #[arg(long, default_value_t = 10)]
    columns: usize,

    /// Number of randomly placed files to seed
    #[arg(short = 'f', long, default_value_t = 10)]
    files: usize,

    /// Smallest random file size in blocks
    #[arg(long, default_value_t = 2)]
    min_blocks: usize,

    /// Largest random file size in blocks
    #[arg(long, default_value_t = 5)]
    max_blocks: usize,

    /// RNG seed for reproducible layouts
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Delay between rendered defragmentation steps, in milliseconds
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.min_blocks == 0 || args.min_blocks > args.max_blocks {
        bail!(
            "invalid size range {}..={}",
            args.min_blocks,
            args.max_blocks
        );
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut disk = Disk::new(args.capacity);
    disk.populate_random(args.files, args.min_blocks..=args.max_blocks, &mut rng)
        .context("seeding the disk")?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("1) Show disk");
        println!("2) List files");
        println!("3) Add file");
        println!("4) Delete file");
        println!("5) Defragment");
        println!("6) Dump state as JSON");
        println!("7) Quit");
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        match line?.trim() {
            "1" => render(&disk, args.columns),
            "2" => list_files(&disk)?,
            "3" => add_file(&mut disk, &mut lines)?,
            "4" => delete_file(&mut disk, &mut lines)?,
            "5" => defragment(&mut disk, args.columns, args.delay_ms),
            "6" => println!("{}", disk.to_json()?),
            "7" => break,
            other => println!("Unknown choice: {other}"),
        }
    }

    Ok(())
}

/// Print the arena as a grid, one tag (or '.') per block
fn render(disk: &Disk, columns: usize) {
    for (index, block) in disk.arena().blocks() {
        if block.is_free() {
            print!("{:>8}", ".");
        } else {
            print!("{:>8}", block.owner_tag());
        }
        if index.col(columns) == columns - 1 {
            println!();
        }
    }
    if disk.arena().capacity() % columns != 0 {
        println!();
    }

    let stats = disk.stats();
    println!(
        "{} files, {}/{} blocks occupied, fragmentation {:.2}",
        stats.file_count, stats.occupied_blocks, stats.capacity, stats.fragmentation
    );
}

fn list_files(disk: &Disk) -> anyhow::Result<()> {
    if disk.catalog().is_empty() {
        println!("No files.");
        return Ok(());
    }

    for (position, record) in disk.catalog().iter().enumerate() {
        let chain = disk.chain(position)?;
        let indices: Vec<String> = chain.iter().map(ToString::to_string).collect();
        println!(
            "{}: {} (created {}, {} blocks: {})",
            position + 1,
            record.name(),
            record.created(),
            chain.len(),
            indices.join(" -> ")
        );
    }
    Ok(())
}

fn add_file(
    disk: &mut Disk,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<()> {
    let name = prompt(lines, "File name: ")?;
    if name.is_empty() {
        println!("Name must not be empty.");
        return Ok(());
    }
    if disk.catalog().find_by_name(&name).is_some() {
        println!("A file named '{name}' already exists.");
        return Ok(());
    }

    let blocks: usize = match prompt(lines, "Number of blocks: ")?.parse() {
        Ok(n) => n,
        Err(_) => {
            println!("Not a number.");
            return Ok(());
        }
    };

    match disk.create_file(&name, Local::now().date_naive(), blocks) {
        Ok(record) => println!("Added '{}' ({} blocks).", record.name(), blocks),
        Err(DiskError::DiskFull) => println!("Disk is full. Cannot add more files."),
        Err(e) => println!("{e}"),
    }
    Ok(())
}

fn delete_file(
    disk: &mut Disk,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<()> {
    let count = disk.catalog().len();
    if count == 0 {
        println!("No files to delete.");
        return Ok(());
    }

    for (position, record) in disk.catalog().iter().enumerate() {
        println!("{}: {}", position + 1, record.name());
    }
    println!("{}: None", count + 1);

    let choice: usize = match prompt(lines, "File to delete: ")?.parse() {
        Ok(n) => n,
        Err(_) => {
            println!("Not a number.");
            return Ok(());
        }
    };

    if choice == count + 1 {
        println!("No files were deleted.");
        return Ok(());
    }
    if choice == 0 || choice > count {
        println!("Invalid input, nothing deleted.");
        return Ok(());
    }

    match disk.delete_file(choice - 1) {
        Ok(record) => println!("Deleted '{}'.", record.name()),
        Err(e) => println!("{e}"),
    }
    Ok(())
}

/// Run the compaction pass, re-rendering the grid after every swap
fn defragment(disk: &mut Disk, columns: usize, delay_ms: u64) {
    let mut defrag = Defragmenter::new();
    let mut swaps = 0usize;

    render(disk, columns);
    while let Some(event) = defrag.step(disk) {
        if let DefragEvent::Swapped { .. } = event {
            swaps += 1;
            thread::sleep(Duration::from_millis(delay_ms));
            println!();
            render(disk, columns);
        }
    }

    println!("Defragmentation complete: {swaps} swaps.");
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    message: &str,
) -> anyhow::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let line = lines.next().context("input closed")??;
    Ok(line.trim().to_string())
}
