//! Fetch and classify commands

use colored::Colorize;
use reqwest::Method;
use serde::Serialize;

use crate::cli::args::GlobalOptions;
use crate::cli::context::{WorkerContext, load_config};
use crate::client::Request;
use crate::error::{NetworkError, Result};
use crate::models::{EventDisplay, ResponseDisplay};
use crate::output;
use crate::worker::classify::{Route, Strategy, classify};
use crate::worker::strategy::ServedFrom;

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| NetworkError::Request(format!("invalid method '{}'", method)).into())
}

/// Run a request through the worker and print what was served
pub async fn fetch(
    opts: &GlobalOptions,
    url: &str,
    navigate: bool,
    method: &str,
    include_body: bool,
) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;
    let target = ctx.worker.config().resolve_url(url)?;
    let request = if navigate {
        Request::navigate(target)
    } else {
        Request::get(target)
    }
    .with_method(parse_method(method)?);

    let served = ctx.worker.handle_fetch(&request).await?;
    let events = ctx.finish().await;
    let display = ResponseDisplay::new(request.url.as_str(), &served, include_body);

    if opts.is_json() {
        return output::print_json(&display);
    }

    let status = if served.response.is_ok() {
        served.response.status.to_string().green()
    } else {
        served.response.status.to_string().red()
    };
    let source = match served.source {
        ServedFrom::Network => "network".normal(),
        ServedFrom::Cache => "cache".cyan(),
        ServedFrom::AppShell => "app shell".cyan(),
        ServedFrom::Synthesized => "offline fallback".yellow(),
        ServedFrom::Passthrough => "network (not cached)".dimmed(),
    };

    println!("{} {}", status, request.url);
    println!("Route:   {}", served.route.label());
    println!("Served:  {}", source);
    println!("Size:    {} bytes", display.size_bytes);

    if include_body {
        println!();
        match (&display.body, &display.body_base64) {
            (Some(text), _) => println!("{}", text),
            (None, Some(encoded)) => println!("{}", encoded),
            _ => {}
        }
    }

    for event in &events {
        println!("{}", EventDisplay(event));
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct Classification {
    url: String,
    method: String,
    route: Route,
    strategy: Strategy,
    bucket: Option<String>,
}

/// Print how a request would be routed
pub fn classify_url(opts: &GlobalOptions, url: &str, method: &str) -> Result<()> {
    let config = load_config(opts)?;
    let target = config.resolve_url(url)?;
    let request = Request::get(target).with_method(parse_method(method)?);

    let route = classify(&request, &config.routes);
    let result = Classification {
        url: request.url.to_string(),
        method: request.method.to_string(),
        route,
        strategy: route.strategy(),
        bucket: route.bucket().map(|b| config.bucket_name(b)),
    };

    if opts.is_json() {
        return output::print_json(&result);
    }

    println!("URL:       {} {}", result.method, result.url);
    println!("Route:     {}", route.label().bold());
    println!("Strategy:  {}", result.strategy.label());
    match &result.bucket {
        Some(bucket) => println!("Bucket:    {}", bucket.cyan()),
        None => println!("Bucket:    {}", "none (never cached)".dimmed()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("POST").unwrap(), Method::POST);
        assert!(parse_method("NOT A METHOD").is_err());
    }
}
