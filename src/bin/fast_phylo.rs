use clap::{crate_name, crate_version, Parser};

use fast_phylo::{
    cli::{ProgramArgs, ProgramSubcommand},
    reconstruct::reconstruct::{AdditiveRunner, UpgmaRunner},
    set_log_level,
};
use log::error;

fn main() {
    let app = ProgramArgs::parse();

    set_log_level(&app, true, crate_name!(), crate_version!());

    let result = match app.subcommand {
        ProgramSubcommand::Upgma(args) => UpgmaRunner::new(app.output_directory, args).run(),
        ProgramSubcommand::Additive(args) => AdditiveRunner::new(app.output_directory, args).run(),
    };

    if let Err(err) = result {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
