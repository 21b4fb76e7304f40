use std::process::Termination;

use stencil_cli::main_impl::do_main;

fn main() -> impl Termination {
    do_main()
}
