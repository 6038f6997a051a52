//! Prints the digests of a plaintext password.
//!
//! Useful for seeding accounts by hand and for checking what a client must
//! send as its credential digest.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use usergroup_auth::password;

#[derive(Parser)]
#[command(name = "usergroup-password-tool", version)]
#[command(about = "Print the fast digest and salted digests of a password")]
struct Cli {
    /// Password in plain text
    #[arg(long)]
    password: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut out = std::io::stdout().lock();

    let Some(plain) = cli.password else {
        let _ = writeln!(out, "ERROR: missing parameter, usage: usergroup-password-tool --password <plain>");
        return ExitCode::FAILURE;
    };

    match report(&plain, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(out, "ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn report(plain: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let fast = password::fast_digest(plain);
    let salted_fast = password::digest(&fast)?;
    let salted_plain = password::digest(plain)?;

    writeln!(out, "password: {plain:?}")?;
    writeln!(out, "sha256:                   {fast}")?;
    writeln!(out, "salted digest of sha256:  {salted_fast}")?;
    writeln!(out, "salted digest of password: {salted_plain}")?;
    writeln!(out, "verify(salted sha256, sha256):       {}", password::verify(&salted_fast, &fast))?;
    writeln!(out, "verify(salted password, password):   {}", password::verify(&salted_plain, plain))?;
    Ok(())
}
