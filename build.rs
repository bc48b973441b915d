// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("spacktree")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Spacktree Contributors")
        .about("Bootstrap a Spack software tree")
        .subcommand_required(false)
        .arg(
            Arg::new("spack_root")
                .short('s')
                .long("spack-root")
                .value_name("PATH")
                .help("Path to the Spack root [default: ./spack]"),
        )
        .arg(
            Arg::new("gcc_version")
                .short('g')
                .long("gcc-version")
                .value_name("VERSION")
                .help("Compiler version to ensure"),
        )
        .arg(
            Arg::new("compiler")
                .long("compiler")
                .value_name("NAME")
                .help("Compiler package name"),
        )
        .arg(
            Arg::new("spack_mirror")
                .short('m')
                .long("spack-mirror")
                .value_name("PATH")
                .help("Path to a local Spack mirror"),
        )
        .arg(Arg::new("manifest").long("manifest").value_name("PATH").help("Package manifest"))
        .arg(
            Arg::new("activate_script")
                .long("activate-script")
                .value_name("PATH")
                .help("Where to write the activation script"),
        )
        .arg(Arg::new("source").long("source").value_name("URL|PATH").help("Spack source archive"))
        .arg(Arg::new("python").long("python").value_name("PATH").help("Interpreter for bin/spack"))
        .arg(Arg::new("config").short('c').long("config").value_name("PATH").help("Config file"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Stream Spack output and enable debug logging"),
        )
        .subcommand(Command::new("setup").about("Provision the Spack tree"))
        .subcommand(Command::new("check").about("Check host prerequisites"))
        .subcommand(
            Command::new("render")
                .about("Print a generated document without writing it")
                .arg(
                    Arg::new("document")
                        .required(true)
                        .value_parser(["mirrors", "packages", "modules", "activate"]),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("spacktree.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
