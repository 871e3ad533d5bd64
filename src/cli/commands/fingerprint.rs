//! `fingerprint` command: print what `run` would record about this host.

use crate::cli::args::{FingerprintArgs, OutputFormat};
use crate::error::FogError;
use crate::fingerprint::Fingerprint;

/// Collects and prints a host fingerprint.
///
/// # Errors
///
/// Returns an error only if JSON serialization fails.
pub fn run(args: &FingerprintArgs) -> Result<(), FogError> {
    let fp = Fingerprint::collect();
    match args.format {
        OutputFormat::Human => print!("{}", render_human(&fp)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fp)?),
    }
    Ok(())
}

fn render_human(fp: &Fingerprint) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "hostname:   {}",
        fp.hostname.as_deref().unwrap_or("(unknown)")
    );
    let _ = writeln!(out, "platform:   {}", fp.platform);
    if let Some(n) = fp.cpu_count {
        let _ = writeln!(out, "cpus:       {n}");
    }
    if fp.interfaces.is_empty() {
        let _ = writeln!(out, "interfaces: (none found)");
    } else {
        let _ = writeln!(out, "interfaces:");
        for iface in &fp.interfaces {
            let _ = writeln!(
                out,
                "  {:<12} {}",
                iface.name,
                iface.mac.as_deref().unwrap_or("-")
            );
        }
    }
    if let Some(err) = &fp.error {
        let _ = writeln!(out, "error:      {err}");
    }
    out
}
