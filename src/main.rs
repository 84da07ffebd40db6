// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use dagwood_lineage::config::{load_and_validate_config, ProvenanceRuntime, RuntimeBuilder};
use dagwood_lineage::events::ProvenanceEvent;
use dagwood_lineage::lineage::LineageRequest;
use dagwood_lineage::observability::init_tracing;
use dagwood_lineage::schema::IterationSelector;

/// Lineage query given after the event log on the command line
struct QueryArgs {
    run_id: String,
    processor_name: String,
    port_name: String,
    selector: IterationSelector,
    targets: Vec<String>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <config.yaml> <events.jsonl> [<run> <processor> <port> [<path>|ALL] [targets...]]\n\
         Example: {program} configs/memory.yaml demos/identity.jsonl\n\
         Example: {program} configs/memory.yaml demos/identity.jsonl R1 Proc1 in \"\" Proc1"
    )
}

fn parse_query(args: &[String]) -> Result<Option<QueryArgs>> {
    match args {
        [] => Ok(None),
        [run_id, processor_name, port_name, rest @ ..] => {
            let (selector, targets) = match rest.split_first() {
                Some((selector, targets)) => (
                    selector
                        .parse::<IterationSelector>()
                        .with_context(|| format!("invalid iteration path '{}'", selector))?,
                    targets.to_vec(),
                ),
                None => (IterationSelector::default(), Vec::new()),
            };
            Ok(Some(QueryArgs {
                run_id: run_id.clone(),
                processor_name: processor_name.clone(),
                port_name: port_name.clone(),
                selector,
                targets,
            }))
        }
        _ => bail!("a lineage query needs at least <run> <processor> <port>"),
    }
}

/// Feed every line of the log to the recorder; returns the number of events replayed
async fn replay(runtime: &ProvenanceRuntime, events_path: &str) -> Result<usize> {
    let file = File::open(events_path).with_context(|| format!("cannot open {}", events_path))?;
    let mut count = 0;

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut event: ProvenanceEvent = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed event", events_path, number + 1))?;
        if event.process_id.is_empty() {
            event.process_id = event.identifier.clone();
        }
        runtime.recorder.record(&event).await;
        count += 1;
    }

    Ok(count)
}

async fn print_summary(runtime: &ProvenanceRuntime) -> Result<()> {
    for run in runtime.access.list_runs(None).await? {
        let invocations = runtime.access.invocations(&run.run_id).await?;
        let enactments = runtime.access.enactments(&run.run_id, None).await?;
        println!("Run {} (workflow {})", run.run_id, run.workflow_id);
        println!("  started:     {}", run.timestamp);
        println!("  invocations: {}", invocations.len());
        println!("  enactments:  {}", enactments.len());

        for (label, ports) in [
            ("input", runtime.access.initial_inputs(&run.run_id).await?),
            ("output", runtime.access.final_outputs(&run.run_id).await?),
        ] {
            for (port, bindings) in ports {
                let values: Vec<String> = bindings
                    .iter()
                    .map(|b| format!("{}={}", b.iteration, b.value.as_deref().unwrap_or("-")))
                    .collect();
                println!("  {} {}: {}", label, port, values.join(", "));
            }
        }
    }
    Ok(())
}

async fn run_query(runtime: &ProvenanceRuntime, query: QueryArgs) -> Result<()> {
    let run = runtime.access.run(&query.run_id).await?;
    let request = LineageRequest::new(
        &query.run_id,
        &run.workflow_id,
        &query.processor_name,
        &query.port_name,
    )
    .at(query.selector)
    .targeting(query.targets);

    let answer = runtime.resolver.resolve(&request).await?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dagwood-lineage");

    if args.len() < 3 {
        eprintln!("{}", usage(program));
        std::process::exit(1);
    }

    let config = load_and_validate_config(&args[1])
        .with_context(|| format!("failed to load {}", args[1]))?;
    init_tracing(&config.logging.filter);
    let query = parse_query(&args[3..])?;

    let runtime = RuntimeBuilder::from_config(&config).await?;

    let start = Instant::now();
    let count = replay(&runtime, &args[2]).await?;
    println!("Replayed {} events in {:?}", count, start.elapsed());
    print_summary(&runtime).await?;

    if let Some(query) = query {
        println!();
        run_query(&runtime, query).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_no_query_arguments() {
        assert!(parse_query(&[]).unwrap().is_none());
    }

    #[test]
    fn test_query_defaults_to_empty_path() {
        let query = parse_query(&args(&["R1", "Proc1", "in"])).unwrap().unwrap();

        assert_eq!(query.run_id, "R1");
        assert_eq!(query.selector, IterationSelector::default());
        assert!(query.targets.is_empty());
    }

    #[test]
    fn test_query_with_all_and_targets() {
        let query = parse_query(&args(&["R1", "W", "Y", "ALL", "Proc1", "Proc2"]))
            .unwrap()
            .unwrap();

        assert_eq!(query.selector, IterationSelector::All);
        assert_eq!(query.targets, vec!["Proc1", "Proc2"]);
    }

    #[tokio::test]
    async fn test_demo_log_replays() {
        let config = dagwood_lineage::config::Config::default();
        let runtime = RuntimeBuilder::from_config(&config).await.unwrap();

        let count = replay(&runtime, "demos/identity.jsonl").await.unwrap();
        assert_eq!(count, 15);

        let outputs = runtime.access.final_outputs("R1").await.unwrap();
        let values: Vec<_> = outputs["Y"].iter().map(|b| b.value.clone()).collect();
        assert_eq!(values, vec![Some("HELLO".to_string()), Some("WORLD".to_string())]);
    }

    #[test]
    fn test_incomplete_query_is_rejected() {
        assert!(parse_query(&args(&["R1", "Proc1"])).is_err());
    }
}
