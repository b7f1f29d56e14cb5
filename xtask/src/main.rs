//! Build automation tasks for the octo-clock project.
//!
//! Run with: `cargo xtask <command>`

mod glyphs;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

const PICO1_TARGET: &str = "thumbv6m-none-eabi";
const DEMO: &str = "octo_clock";
const DEMO_FEATURES: &str = "pico1,wifi,defmt";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for the octo-clock project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: host tests, firmware build, docs
    CheckAll,
    /// Build the clock firmware for the Pico 1W
    Demo {
        #[arg(long)]
        release: bool,
    },
    /// Build a UF2 image of the clock firmware for drag-and-drop flashing
    Uf2,
    /// Convert 128x32 PNG artwork into packed glyph assets
    Glyphs {
        /// Directory holding colon.png and digit_0.png .. digit_9.png
        #[arg(long, default_value = "artwork")]
        input: PathBuf,
        #[arg(long, default_value = "assets")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckAll => check_all(),
        Commands::Demo { release } => {
            if build_demo(release) {
                println!("{}", "Build successful! ✨".green());
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Uf2 => build_uf2(),
        Commands::Glyphs { input, output } => convert_glyphs(&input, &output),
    }
}

fn check_all() -> ExitCode {
    let workspace_root = workspace_root();

    println!("{}", "==> Running unit and integration tests on host...".cyan());
    let mut test_cmd = Command::new("cargo");
    test_cmd
        .current_dir(&workspace_root)
        .args(["test", "--features", "host"]);
    if let Some(target) = host_target() {
        println!("  {}", format!("Using host target: {target}").bright_black());
        test_cmd.arg("--target").arg(target);
    }
    if !run_command(&mut test_cmd) {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> Running xtask tests...".cyan());
    if !run_command(
        Command::new("cargo")
            .current_dir(&workspace_root)
            .args(["test", "--package", "xtask"]),
    ) {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> Building library for the Pico 1W...".cyan());
    if !run_command(Command::new("cargo").current_dir(&workspace_root).args([
        "build",
        "--lib",
        "--target",
        PICO1_TARGET,
        "--features",
        DEMO_FEATURES,
    ])) {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> Building clock firmware...".cyan());
    if !build_demo(false) {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> Building documentation...".cyan());
    if !run_command(Command::new("cargo").current_dir(&workspace_root).args([
        "doc",
        "--target",
        PICO1_TARGET,
        "--no-deps",
        "--features",
        DEMO_FEATURES,
    ])) {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> All checks passed! 🎉".green().bold());
    ExitCode::SUCCESS
}

fn build_demo(release: bool) -> bool {
    println!(
        "{}",
        format!("Building '{DEMO}' with features: {DEMO_FEATURES}").cyan()
    );
    let mut cmd = Command::new("cargo");
    cmd.current_dir(workspace_root()).args([
        "build",
        "--example",
        DEMO,
        "--target",
        PICO1_TARGET,
        "--features",
        DEMO_FEATURES,
    ]);
    if release {
        cmd.arg("--release");
    }
    run_command(&mut cmd)
}

fn build_uf2() -> ExitCode {
    // Build in release mode for UF2
    if !build_demo(true) {
        return ExitCode::FAILURE;
    }

    let elf_path = format!("target/{PICO1_TARGET}/release/examples/{DEMO}");
    let uf2_path = format!("{DEMO}.uf2");

    println!("\n{}", "Converting to UF2 format...".cyan());

    if run_command(
        Command::new("elf2uf2-rs")
            .current_dir(workspace_root())
            .args([&elf_path, &uf2_path]),
    ) {
        println!("{}", format!("UF2 created: {uf2_path} 🚀").green().bold());
        println!("{}", "Ready to drag-and-drop to your Pico!".bright_black());
        ExitCode::SUCCESS
    } else {
        println!(
            "{}",
            "Note: Install elf2uf2-rs with: cargo install elf2uf2-rs".yellow()
        );
        ExitCode::FAILURE
    }
}

fn convert_glyphs(input: &std::path::Path, output: &std::path::Path) -> ExitCode {
    println!(
        "{}",
        format!("Converting glyphs from {} to {}", input.display(), output.display()).cyan()
    );
    match glyphs::convert_all(input, output) {
        Ok(()) => {
            println!("{}", "Glyphs written.".green());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", format!("Glyph conversion failed: {err}").red());
            ExitCode::FAILURE
        }
    }
}

fn workspace_root() -> PathBuf {
    // `cargo xtask` runs from the workspace root
    std::env::current_dir().expect("Failed to get current directory")
}

fn host_target() -> Option<String> {
    let output = Command::new("rustc").arg("-vV").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(host) = line.strip_prefix("host: ") {
            return Some(host.trim().to_string());
        }
    }
    None
}

fn run_command(cmd: &mut Command) -> bool {
    match cmd.status() {
        Ok(status) => status.success(),
        Err(e) => {
            eprintln!("{}", format!("Failed to execute command: {e}").red());
            false
        }
    }
}
