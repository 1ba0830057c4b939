//! certbot `--manual-auth-hook`

use dnsexit_hooks::{main_with, Command};
use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(main_with(Command::Auth, false) as u8)
}
