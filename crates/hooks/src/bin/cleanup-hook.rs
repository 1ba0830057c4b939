//! certbot `--manual-cleanup-hook`

use dnsexit_hooks::{main_with, Command};
use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(main_with(Command::Cleanup, false) as u8)
}
