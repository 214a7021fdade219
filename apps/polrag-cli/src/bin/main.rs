use std::env;

use anyhow::{anyhow, Context};
use polrag_core::RetrievalRequest;
use polrag_hybrid::RetrievalContext;
use tracing_subscriber::EnvFilter;

/// Exit codes: 1 for usage or configuration errors, 2 when a backing store
/// is unreachable.
const USAGE: &str = "Usage: polrag query \"<text>\" [--limit N] [--region R] [--content-type T] [--source S] [--general]\n       polrag health";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn parse_query(args: &[String], default_limit: usize) -> anyhow::Result<RetrievalRequest> {
    let mut iter = args.iter();
    let query = iter.next().ok_or_else(|| anyhow!("missing query text\n{USAGE}"))?;
    let mut request = RetrievalRequest::new(query.as_str()).limit(default_limit as i64);
    while let Some(flag) = iter.next() {
        if flag == "--general" { request = request.prefer_specific(false); continue; }
        let value = iter.next().ok_or_else(|| anyhow!("{flag} needs a value"))?;
        request = match flag.as_str() {
            "--limit" => request.limit(value.parse().with_context(|| format!("bad --limit {value:?}"))?),
            "--region" => request.region(value.as_str()),
            "--content-type" => request.content_type(value.as_str()),
            "--source" => request.policy_source(value.as_str()),
            other => return Err(anyhow!("unknown flag {other}\n{USAGE}")),
        };
    }
    Ok(request)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "query" => {
            let ctx = RetrievalContext::load()?;
            let request = parse_query(&args, ctx.settings().retrieval.default_limit)?;
            let results = match ctx.retrieve(&request) {
                Ok(results) => results,
                Err(e) if e.is_unavailable() => {
                    eprintln!("{e}");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            };
            if results.is_empty() { tracing::info!(query = %request.query, "no supporting passages"); }
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        "health" => {
            let ctx = RetrievalContext::load()?;
            let report = ctx.health();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() { std::process::exit(2); }
        }
        _ => { eprintln!("Unknown command: {cmd}\n{USAGE}"); std::process::exit(1); }
    }
    Ok(())
}
