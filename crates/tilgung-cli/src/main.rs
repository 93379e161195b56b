// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilgung: attested multi-pass erasure.
//
// Entry point. Initialises logging, loads the configuration, builds the
// backend services and dispatches the subcommand.

mod cli;
mod services;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tilgung_attest::CertificateFilter;
use tilgung_attest::record::format_size;
use tilgung_core::config::TilgungConfig;
use tilgung_core::error::Result;
use tilgung_core::types::{EraseMethod, Subject};
use tilgung_engine::total_passes;

use cli::{Cli, Commands, EraseArgs};
use services::app_services::AppServices;
use services::data_dir;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let dir = data_dir::data_dir(cli.data_dir.clone())?;
    let config = TilgungConfig::load(&dir);
    let json = cli.json;

    if let Commands::Methods = cli.command {
        print_methods(json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let svc = AppServices::init(config, &dir)?;
    match cli.command {
        Commands::Erase(args) => erase(&svc, &args, json).await,
        Commands::Verify { id, trust_local } => {
            let result = svc.verify(&id, trust_local)?;
            if json {
                emit(&result)?;
            } else if result.valid {
                println!("{id}: valid ({})", result.algorithm.as_deref().unwrap_or("?"));
                if result.expired {
                    println!("  note: certificate has expired");
                }
            } else if let Some(failure) = &result.failure {
                println!("{id}: INVALID ({failure})");
            }
            Ok(exit_for(result.valid))
        }
        Commands::List(args) => {
            let certs = svc.list(&CertificateFilter::from(&args))?;
            if json {
                emit(&certs)?;
            } else if certs.is_empty() {
                println!("no certificates");
            } else {
                for c in &certs {
                    let cert = &c.certificate;
                    println!(
                        "{}  {}  {:<14} {:<9} {}{}",
                        cert.id,
                        cert.created_at.format("%Y-%m-%d %H:%M"),
                        cert.erasure.method.as_str(),
                        format_size(cert.erasure.size_bytes),
                        cert.erasure.target,
                        if c.is_valid { "" } else { "  [invalidated]" },
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Invalidate { id } => {
            let changed = svc.invalidate(&id)?;
            if json {
                emit(&serde_json::json!({ "certificate_id": id, "invalidated": changed }))?;
            } else if changed {
                println!("{id}: invalidated");
            } else {
                println!("{id}: not found");
            }
            Ok(exit_for(changed))
        }
        Commands::Audit { limit } => {
            let entries = svc.recent_audit_entries(limit)?;
            if json {
                emit(&entries)?;
            } else {
                for e in &entries {
                    println!(
                        "{}  {:<10} {:<4} {}  {}",
                        e.timestamp,
                        e.action.as_str(),
                        if e.success { "ok" } else { "FAIL" },
                        e.subject,
                        e.details.as_deref().unwrap_or(""),
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { limit, failed } => {
            let ops = svc.history(limit, failed)?;
            if json {
                emit(&ops)?;
            } else if ops.is_empty() {
                println!("no operations recorded");
            } else {
                for op in &ops {
                    let status = match (&op.error, op.simulated) {
                        (Some(e), _) => format!("FAIL {}", e.message),
                        (None, true) => "simulated".to_owned(),
                        (None, false) => "ok".to_owned(),
                    };
                    println!(
                        "{}  {}  {:<14} {}/{}  {:<9} {}  {}{}",
                        op.operation_id,
                        op.started_at.format("%Y-%m-%d %H:%M"),
                        op.method.as_str(),
                        op.passes_completed,
                        op.total_passes,
                        format_size(op.size_bytes),
                        op.target,
                        status,
                        op.certificate_id
                            .as_deref()
                            .map(|c| format!("  [{c}]"))
                            .unwrap_or_default(),
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stats => {
            let stats = svc.stats()?;
            if json {
                emit(&stats)?;
            } else {
                println!("total:    {}", stats.total);
                println!("valid:    {}", stats.valid);
                println!("verified: {}", stats.verified);
                println!("expired:  {}", stats.expired);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { write } => {
            if write {
                svc.save_config()?;
                tracing::info!(path = %dir.display(), "configuration written");
            }
            println!("{}", serde_json::to_string_pretty(svc.config())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Methods => Ok(ExitCode::SUCCESS),
    }
}

async fn erase(svc: &AppServices, args: &EraseArgs, json: bool) -> Result<ExitCode> {
    let target = args.target();
    let subject = svc.enrich_subject(&target, Subject::from(&args.subject));

    let receipt = svc.erase(target, args.method, args.simulate).await;
    let certificate = if receipt.is_attestable() && !args.no_certificate {
        match svc.certify(&receipt, &subject) {
            Ok(cert) => Some(cert),
            Err(e) => {
                // The erasure itself stands; only the proof is missing.
                tracing::error!(error = %e, "certificate issuance failed");
                eprintln!("warning: erasure completed but no certificate was issued: {e}");
                None
            }
        }
    } else {
        None
    };

    if json {
        emit(&serde_json::json!({ "receipt": receipt, "certificate": certificate }))?;
    } else {
        let verb = if receipt.simulated { "simulated" } else { "erased" };
        match &receipt.error {
            None => println!(
                "{verb} {} with {} ({} passes, {}, {:.2}s)",
                receipt.target,
                receipt.method.display_name(),
                receipt.passes_completed,
                format_size(receipt.size_bytes),
                receipt.duration_seconds(),
            ),
            Some(e) => println!(
                "failed {} after {}/{} passes: {}",
                receipt.target, receipt.passes_completed, receipt.total_passes, e.message
            ),
        }
        if let Some(cert) = &certificate {
            println!("certificate {}", cert.id);
            println!("  {}", cert.artifacts.directory.display());
        }
    }
    Ok(exit_for(receipt.success))
}

#[derive(Serialize)]
struct MethodInfo {
    name: &'static str,
    display_name: &'static str,
    passes: usize,
}

fn print_methods(json: bool) -> Result<()> {
    let methods: Vec<_> = EraseMethod::ALL
        .iter()
        .map(|m| MethodInfo {
            name: m.as_str(),
            display_name: m.display_name(),
            passes: total_passes(*m),
        })
        .collect();
    if json {
        return emit(&methods);
    }
    for m in &methods {
        println!("{:<14} {:>2} passes  {}", m.name, m.passes, m.display_name);
    }
    Ok(())
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_for(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
