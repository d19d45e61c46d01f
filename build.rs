// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Global argument taking a path
fn path_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .value_name("PATH")
        .global(true)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("rhel2centos")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rhel2centos Contributors")
        .about("Convert a RHEL 7 host to CentOS 7 in place")
        .subcommand_required(false)
        .arg(
            path_arg("config", "config", "Configuration file (default: /etc/rhel2centos.toml if present)")
                .short('c'),
        )
        .arg(path_arg("root", "root", "Filesystem root for host checks; `run` only accepts /"))
        .arg(path_arg("status_file", "status-file", "Stage status document"))
        .arg(path_arg("log_file", "log-file", "Persistent log file"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("run").about("Run the migration, resuming after completed stages (default)"),
        )
        .subcommand(Command::new("status").about("Show which stages have completed"))
        .subcommand(
            Command::new("reset")
                .about("Clear stages from the status document so they run again")
                .arg(
                    Arg::new("stages")
                        .required(true)
                        .num_args(1..)
                        .help("Stage keys to clear (see `status`)"),
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

    let man_path = man_dir.join("rhel2centos.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
