use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use call_core::{
    http::{CallApiClient, PlacesClient},
    retry::RetryPolicy,
    CallSequencer, ContactList, LiveUpdateChannel, MissingPhoneResolver, NoticeLevel,
    PhoneResolver, RetryingBookingConfirmer, SequenceOutcome, SequencerEvent, SessionError,
    SessionInput,
};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

const REDIRECT_EXIT_CODE: u8 = 2;

#[derive(Parser, Debug)]
#[command(about = "Call the selected contacts one by one until an appointment is booked")]
struct Args {
    /// Directory holding statusData.json and formData.json.
    #[arg(long, default_value = ".")]
    session_dir: PathBuf,
    #[arg(long, default_value = "call_status.toml")]
    config: PathBuf,
    /// Move the contact at 1-based position FROM to position TO before
    /// confirming. May be repeated.
    #[arg(long = "move", value_name = "FROM:TO", value_parser = parse_move)]
    moves: Vec<(usize, usize)>,
    /// Look up missing phone numbers through the Places API.
    #[arg(long)]
    resolve_phones: bool,
    /// Print the call order and exit without dialing.
    #[arg(long)]
    dry_run: bool,
}

fn parse_move(raw: &str) -> Result<(usize, usize), String> {
    let (from, to) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got {raw:?}"))?;
    let position = |value: &str| -> Result<usize, String> {
        match value.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(format!("{value:?} is not a position (positions start at 1)")),
        }
    };
    Ok((position(from)?, position(to)?))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<SessionError>() {
            Some(session_err) if session_err.is_redirect() => {
                eprintln!("{session_err}");
                ExitCode::from(REDIRECT_EXIT_CODE)
            }
            _ => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = config::load_settings(&args.config);
    let session = SessionInput::load(&args.session_dir)?;

    let mut contacts = session.contact_list();
    for &(from, to) in &args.moves {
        if !contacts.reorder(from, to) {
            warn!(from = from + 1, to = to + 1, "ignoring move outside the list");
        }
    }

    if args.resolve_phones {
        let resolver: Box<dyn PhoneResolver> = match &settings.places_api_key {
            Some(key) => Box::new(PlacesClient::new(&settings.places_base_url, key.clone())?),
            None => {
                warn!("no Places API key configured; phone numbers stay as loaded");
                Box::new(MissingPhoneResolver)
            }
        };
        let resolved = contacts.resolve_phone_numbers(resolver.as_ref()).await;
        info!(resolved, "phone lookup finished");
    }

    print_call_order(&contacts);
    if args.dry_run {
        return Ok(());
    }

    let api = Arc::new(CallApiClient::new(&settings.api_base_url)?);
    let confirmer = Arc::new(RetryingBookingConfirmer::with_policy(
        api.clone(),
        RetryPolicy::fixed(settings.status_retry_attempts, settings.status_retry_delay()),
    ));
    let channel = LiveUpdateChannel::with_reconnect_delay(
        settings.notifications_url()?,
        settings.reconnect_delay(),
    );

    let mut sequencer = CallSequencer::new(
        contacts,
        session.form,
        api,
        confirmer,
        Box::new(channel),
    )
    .with_settle_delay(settings.settle_delay());

    let printer = tokio::spawn(print_events(sequencer.subscribe_events()));

    sequencer
        .confirm()
        .await
        .context("failed to start the call sequence")?;

    let outcome = tokio::select! {
        outcome = sequencer.run() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let result = match outcome {
        Some(Ok(SequenceOutcome::Booked { contact_id, call_id })) => {
            info!(%contact_id, %call_id, "sequence finished with a booking");
            Ok(())
        }
        Some(Ok(SequenceOutcome::Exhausted)) => Ok(()),
        Some(Err(err)) => Err(err).context("call sequence stopped"),
        None => {
            sequencer.close();
            println!("Closed. A summary will be sent by email.");
            Ok(())
        }
    };

    drop(sequencer);
    let _ = printer.await;
    result
}

fn print_call_order(contacts: &ContactList) {
    println!("Call order:");
    for (index, contact) in contacts.contacts().iter().enumerate() {
        let phone = contact.phone_number.as_deref().unwrap_or("no phone number");
        println!("  {}. {} ({phone})", index + 1, contact.name);
    }
}

async fn print_events(mut events: broadcast::Receiver<SequencerEvent>) {
    loop {
        match events.recv().await {
            Ok(SequencerEvent::Notice { level, message }) => {
                let tag = match level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Success => "success",
                    NoticeLevel::Warning => "warning",
                    NoticeLevel::Error => "error",
                };
                println!("[{tag}] {message}");
            }
            Ok(SequencerEvent::CallStarted {
                index,
                contact,
                call_id,
            }) => {
                println!(
                    "Calling {}. {} (call {call_id})...",
                    index + 1,
                    contact.name
                );
            }
            Ok(SequencerEvent::TranscriptLine(line)) => println!("    {line}"),
            Ok(SequencerEvent::StateChanged(_)) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_positions_are_one_based() {
        assert_eq!(parse_move("3:1"), Ok((2, 0)));
        assert_eq!(parse_move(" 1 : 2 "), Ok((0, 1)));
        assert!(parse_move("0:1").is_err());
        assert!(parse_move("2").is_err());
        assert!(parse_move("a:b").is_err());
    }

    #[test]
    fn args_accept_repeated_moves() {
        let args = Args::try_parse_from([
            "call_status",
            "--session-dir",
            "/tmp/session",
            "--move",
            "2:1",
            "--move",
            "4:3",
            "--dry-run",
        ])
        .expect("args");

        assert_eq!(args.session_dir, PathBuf::from("/tmp/session"));
        assert_eq!(args.config, PathBuf::from("call_status.toml"));
        assert_eq!(args.moves, vec![(1, 0), (3, 2)]);
        assert!(args.dry_run);
        assert!(!args.resolve_phones);
    }
}
