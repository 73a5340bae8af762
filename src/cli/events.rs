//! Messages, sync, push and notification commands
//!
//! Each command delivers one event to the worker and prints whatever the
//! worker posted back to this invocation's window.

use colored::Colorize;
use serde_json::Value;

use crate::cli::args::GlobalOptions;
use crate::cli::context::WorkerContext;
use crate::error::{Error, Result};
use crate::models::EventDisplay;
use crate::output;
use crate::worker::messages::{ClientCommand, PushSubscription, WorkerEvent};
use crate::worker::notifications::ClickOutcome;

fn parse_json_arg(name: &str, raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::Other(format!("--{} is not valid JSON: {}", name, e))),
        None => Ok(Value::Null),
    }
}

fn parse_subscription(name: &str, raw: Option<&str>) -> Result<Option<PushSubscription>> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| Error::Other(format!("--{} is not a valid subscription: {}", name, e))),
        None => Ok(None),
    }
}

fn print_events(opts: &GlobalOptions, events: &[WorkerEvent]) -> Result<()> {
    if opts.is_json() {
        return output::print_json(events);
    }
    if events.is_empty() {
        println!("{} No messages received", "○".dimmed());
    }
    for event in events {
        println!("{}", EventDisplay(event));
    }
    Ok(())
}

/// Send a raw message envelope to the worker
pub async fn message(opts: &GlobalOptions, json: &str) -> Result<()> {
    let message: Value = serde_json::from_str(json)?;
    let mut ctx = WorkerContext::new(opts)?;
    let source = Some(ctx.client_id);

    match ctx.worker.handle_message(source, &message).await {
        None => log::info!("Message has no type, ignored"),
        Some(ClientCommand::Unknown(kind)) => log::info!("Unknown message type {}, ignored", kind),
        Some(ClientCommand::Malformed { kind, reason }) => {
            log::info!("Malformed {} message ignored: {}", kind, reason)
        }
        Some(command) => log::debug!("Handled {:?}", command),
    }

    let events = ctx.finish().await;
    print_events(opts, &events)
}

/// Fire a one-off or periodic sync
pub async fn sync(opts: &GlobalOptions, tag: &str, periodic: bool) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;
    let event = if periodic {
        ctx.worker.handle_periodic_sync(tag)
    } else {
        ctx.worker.handle_sync(tag)
    };
    let events = ctx.finish().await;

    if event.is_none() && !opts.is_json() {
        println!("{} Unknown sync tag '{}', nothing sent", "⚠".yellow(), tag);
        return Ok(());
    }
    print_events(opts, &events)
}

/// Deliver a push payload and print the notification shown
pub fn push(opts: &GlobalOptions, payload: Option<&str>) -> Result<()> {
    let ctx = WorkerContext::new(opts)?;
    let intent = ctx.worker.handle_push(payload.map(str::as_bytes));

    if opts.is_json() {
        return output::print_json(&intent);
    }

    println!("{}", intent.title.bold());
    println!("{}", intent.body);
    println!();
    println!("Tag:       {}", intent.tag);
    println!("Icon:      {}", intent.icon);
    println!("Vibrate:   {:?}", intent.vibrate);
    if intent.require_interaction {
        println!("{} Requires interaction", "⚠".yellow());
    }
    let actions: Vec<String> = intent
        .actions
        .iter()
        .map(|a| format!("{} ({})", a.title, a.action))
        .collect();
    println!("Actions:   {}", actions.join(", "));
    Ok(())
}

/// Click a notification
pub async fn notification_click(opts: &GlobalOptions, action: &str, data: Option<&str>) -> Result<()> {
    let data = parse_json_arg("data", data)?;
    let mut ctx = WorkerContext::new(opts)?;
    let outcome = ctx.worker.handle_notification_click(action, &data)?;
    let events = ctx.finish().await;

    if opts.is_json() {
        let json = serde_json::json!({ "outcome": outcome, "events": events });
        return output::print_json(&json);
    }

    match &outcome {
        ClickOutcome::Dismissed => println!("{} Notification dismissed", "○".dimmed()),
        ClickOutcome::Focused { client, url } => {
            println!("{} Focused window {} → {}", "✓".green(), client, url.cyan())
        }
        ClickOutcome::Opened { client, url } => {
            println!("{} Opened window {} at {}", "✓".green(), client, url.cyan())
        }
    }
    for event in &events {
        println!("{}", EventDisplay(event));
    }
    Ok(())
}

/// Close a notification
pub async fn notification_close(opts: &GlobalOptions, data: Option<&str>) -> Result<()> {
    let data = parse_json_arg("data", data)?;
    let mut ctx = WorkerContext::new(opts)?;
    ctx.worker.handle_notification_close(&data);
    let events = ctx.finish().await;
    print_events(opts, &events)
}

/// Announce a push subscription change
pub async fn subscription_change(opts: &GlobalOptions, old: Option<&str>, new: Option<&str>) -> Result<()> {
    let old = parse_subscription("old", old)?;
    let new = parse_subscription("new", new)?;
    let mut ctx = WorkerContext::new(opts)?;
    ctx.worker.handle_subscription_change(old, new);
    let events = ctx.finish().await;
    print_events(opts, &events)
}
