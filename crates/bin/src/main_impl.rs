use std::{env, io, process::Termination, time::Instant};

use tracing::debug;

use crate::{
    args::{self, Command},
    bin_util::MainExit,
    entry,
    logging::logging,
};

pub fn do_main() -> impl Termination {
    let tokens = env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());

    let command = match args::parse(tokens) {
        Ok(command) => command,
        Err(err) => return MainExit::Error(err),
    };

    match command {
        Command::Help => MainExit::new(entry::print(&args::usage()), None),
        Command::Version => MainExit::new(entry::print(&args::version()), None),
        Command::Render(invocation) => {
            logging(invocation.log_level, invocation.json_output);

            let start = Instant::now();

            let result = entry::run(invocation, io::stdin().lock(), &mut io::stdout().lock());

            let done = start.elapsed();
            debug!("run time: {done:?}");

            MainExit::new(result, Some(done))
        }
    }
}
