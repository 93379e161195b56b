// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tilgung_attest::CertificateFilter;
use tilgung_core::error::TilgungError;
use tilgung_core::types::{EraseMethod, Subject, Target};

#[derive(Parser, Debug)]
#[command(
    name = "tilgung",
    version,
    about = "Attested multi-pass erasure with signed proof-of-erasure certificates"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Data directory (defaults to $XDG_DATA_HOME/tilgung)"
    )]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Erase a file, directory tree or block device and certify the result.
    Erase(EraseArgs),
    /// Re-validate a certificate from its artifacts.
    Verify {
        id: String,
        #[arg(long, help = "Reject certificates not signed by the local identity")]
        trust_local: bool,
    },
    /// List indexed certificates, newest first.
    List(ListArgs),
    /// Mark a certificate invalid in the index.
    Invalidate { id: String },
    /// Show the supported erase methods.
    Methods,
    /// Show recent audit entries.
    Audit {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show past erasures, certified or not.
    History {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, help = "Only operations that did not succeed")]
        failed: bool,
    },
    /// Certificate index totals.
    Stats,
    /// Show the effective configuration.
    Config {
        #[arg(long, help = "Write the effective configuration to config.json")]
        write: bool,
    },
}

#[derive(Args, Debug)]
pub struct EraseArgs {
    pub path: PathBuf,
    #[arg(long, default_value = "dod_5220_22_m", value_parser = parse_method)]
    pub method: EraseMethod,
    #[arg(long, value_enum, help = "Override target detection")]
    pub kind: Option<TargetKind>,
    #[arg(long, help = "Report what would happen without touching the target")]
    pub simulate: bool,
    #[arg(long, help = "Skip certificate issuance")]
    pub no_certificate: bool,
    #[command(flatten)]
    pub subject: SubjectArgs,
}

impl EraseArgs {
    /// The target to hand to the engine.
    ///
    /// Detection never fails here: a path that cannot be inspected is passed
    /// on as a file so the engine reports it in a receipt.  Simulated runs
    /// without `--kind` do not touch the filesystem at all.
    pub fn target(&self) -> Target {
        let path = self.path.clone();
        match self.kind {
            Some(TargetKind::File) => Target::File(path),
            Some(TargetKind::Directory) => Target::Directory(path),
            Some(TargetKind::BlockDevice) => Target::BlockDevice(path),
            None if self.simulate => Target::File(path),
            None => Target::resolve(&path).unwrap_or(Target::File(path)),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
    BlockDevice,
}

#[derive(Args, Debug, Default)]
pub struct SubjectArgs {
    #[arg(long, default_value = "")]
    pub user_id: String,
    #[arg(long, default_value = "")]
    pub user_name: String,
    #[arg(long, default_value = "")]
    pub organization: String,
    #[arg(long, default_value = "")]
    pub device_serial: String,
    #[arg(long, default_value = "")]
    pub device_model: String,
    #[arg(long, default_value = "")]
    pub device_type: String,
}

impl From<&SubjectArgs> for Subject {
    fn from(a: &SubjectArgs) -> Self {
        Subject {
            user_id: a.user_id.clone(),
            user_name: a.user_name.clone(),
            organization: a.organization.clone(),
            device_serial: a.device_serial.clone(),
            device_model: a.device_model.clone(),
            device_type: a.device_type.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub device: Option<String>,
    #[arg(long)]
    pub org: Option<String>,
    #[arg(long, value_parser = parse_method)]
    pub method: Option<EraseMethod>,
    #[arg(long)]
    pub valid_only: bool,
    #[arg(long, default_value_t = 100)]
    pub limit: u32,
}

impl From<&ListArgs> for CertificateFilter {
    fn from(a: &ListArgs) -> Self {
        CertificateFilter {
            user_id: a.user.clone(),
            device_serial: a.device.clone(),
            organization: a.org.clone(),
            method: a.method.map(|m| m.as_str().to_owned()),
            valid_only: a.valid_only,
            limit: a.limit,
        }
    }
}

fn parse_method(s: &str) -> std::result::Result<EraseMethod, TilgungError> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn erase_defaults_to_dod() {
        let cli = Cli::try_parse_from(["tilgung", "erase", "/tmp/x", "--simulate"]).unwrap();
        let Commands::Erase(args) = cli.command else {
            panic!("expected erase");
        };
        assert_eq!(args.method, EraseMethod::Dod522022M);
        assert!(args.simulate);
        assert!(!args.no_certificate);
    }

    #[test]
    fn method_aliases_accepted() {
        let cli =
            Cli::try_parse_from(["tilgung", "erase", "/tmp/x", "--method", "shred"]).unwrap();
        let Commands::Erase(args) = cli.command else {
            panic!("expected erase");
        };
        assert_eq!(args.method, EraseMethod::Gutmann);

        assert!(Cli::try_parse_from(["tilgung", "erase", "/tmp/x", "--method", "melt"]).is_err());
    }

    #[test]
    fn explicit_kind_skips_detection() {
        let cli = Cli::try_parse_from([
            "tilgung",
            "erase",
            "/definitely/missing",
            "--kind",
            "block-device",
        ])
        .unwrap();
        let Commands::Erase(args) = cli.command else {
            panic!("expected erase");
        };
        assert_eq!(
            args.target(),
            Target::BlockDevice("/definitely/missing".into())
        );
    }

    fn erase_args(argv: &[&str]) -> EraseArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Erase(args) = cli.command else {
            panic!("expected erase");
        };
        args
    }

    #[test]
    fn missing_path_is_left_to_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.bin");
        let args = erase_args(&["tilgung", "erase", missing.to_str().unwrap()]);
        assert_eq!(args.target(), Target::File(missing));
    }

    #[test]
    fn detection_picks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let args = erase_args(&["tilgung", "erase", dir.path().to_str().unwrap()]);
        assert_eq!(args.target(), Target::Directory(dir.path().to_path_buf()));
    }

    #[test]
    fn simulate_does_not_inspect_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let args = erase_args(&["tilgung", "erase", path, "--simulate"]);
        // An existing directory still comes back as a file: nothing was stat'ed.
        assert_eq!(args.target(), Target::File(dir.path().to_path_buf()));
    }

    #[test]
    fn history_defaults() {
        let cli = Cli::try_parse_from(["tilgung", "history", "--failed"]).unwrap();
        let Commands::History { limit, failed } = cli.command else {
            panic!("expected history");
        };
        assert_eq!(limit, 50);
        assert!(failed);
    }

    #[test]
    fn list_flags_become_filter() {
        let cli = Cli::try_parse_from([
            "tilgung",
            "list",
            "--user",
            "u1",
            "--method",
            "zeros",
            "--valid-only",
        ])
        .unwrap();
        let Commands::List(args) = cli.command else {
            panic!("expected list");
        };
        let filter = CertificateFilter::from(&args);
        assert_eq!(filter.user_id.as_deref(), Some("u1"));
        assert_eq!(filter.method.as_deref(), Some("zero"));
        assert!(filter.valid_only);
        assert_eq!(filter.limit, 100);
    }
}
