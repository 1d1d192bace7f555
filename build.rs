// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package identity
fn package_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("remote").required(true).help("Remote name"))
        .arg(Arg::new("category").required(true).help("Category name"))
        .arg(Arg::new("package").required(true).help("Package name"))
}

fn name_arg() -> Arg {
    Arg::new("name").required(true).help("Remote name")
}

fn build_cli() -> Command {
    Command::new("plugpack")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Plugpack Contributors")
        .about("Package manager for plugin-extensible host applications")
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .global(true)
                .help("Host resource directory (default: per-user data directory)"),
        )
        .subcommand(
            Command::new("sync")
                .about("Synchronize installed packages with their remotes")
                .arg(Arg::new("remote").help("Only synchronize this remote"))
                .arg(
                    Arg::new("remove_obsolete")
                        .long("remove-obsolete")
                        .action(ArgAction::SetTrue)
                        .help("Remove packages that are no longer offered by their remote"),
                )
                .arg(
                    Arg::new("bleeding_edge")
                        .long("bleeding-edge")
                        .action(ArgAction::SetTrue)
                        .help("Offer prereleases for this run"),
                )
                .arg(
                    Arg::new("no_install")
                        .long("no-install")
                        .action(ArgAction::SetTrue)
                        .help("Do not install new packages, only update installed ones"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .help("Do not report progress"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(Arg::new("remote").help("Only list packages of this remote"))
                .arg(
                    Arg::new("files")
                        .short('f')
                        .long("files")
                        .action(ArgAction::SetTrue)
                        .help("Show installed files"),
                ),
        )
        .subcommand(
            Command::new("remote")
                .about("Remote repository management")
                .subcommand(
                    Command::new("add")
                        .about("Add a remote, or replace the URL of an existing one")
                        .arg(name_arg())
                        .arg(Arg::new("url").required(true).help("URL of the index document"))
                        .arg(
                            Arg::new("disabled")
                                .long("disabled")
                                .action(ArgAction::SetTrue)
                                .help("Add the remote in disabled state"),
                        )
                        .arg(
                            Arg::new("no_auto_install")
                                .long("no-auto-install")
                                .action(ArgAction::SetTrue)
                                .help("Do not install new packages of this remote automatically"),
                        ),
                )
                .subcommand(Command::new("list").about("List configured remotes"))
                .subcommand(
                    Command::new("remove")
                        .about("Remove a remote; its packages become obsolete")
                        .arg(name_arg()),
                )
                .subcommand(
                    Command::new("enable")
                        .about("Enable a remote and register its packages with the host")
                        .arg(name_arg()),
                )
                .subcommand(
                    Command::new("disable")
                        .about("Disable a remote and unregister its packages from the host")
                        .arg(name_arg()),
                ),
        )
        .subcommand(
            Command::new("uninstall-remote")
                .about("Remove a remote and every package installed from it")
                .arg(name_arg()),
        )
        .subcommand(package_args(
            Command::new("pin").about("Exclude an installed package from updates"),
        ))
        .subcommand(package_args(
            Command::new("unpin").about("Allow updates of a pinned package again"),
        ))
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

    let man_path = man_dir.join("plugpack.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
