use anyhow::{bail, Result};
use netsim_cli::cli::ModelArgs;
use netsim_cli::load_model;
use netsim_core::graph_utils::graph_stats;
use netsim_core::Diagnostics;
use tracing::info;

pub fn handle(input: &ModelArgs) -> Result<()> {
    let model = load_model(&input.model, input.model_json)?;
    let network = &model.network;

    let mut diagnostics = Diagnostics::new();
    network.validate_into(&mut diagnostics);

    println!("{}: {}", display_name(network.name()), network.stats());
    let graph = graph_stats(network);
    println!(
        "graph: {} nodes, {} edges, {} sub-network(s), degree [min/avg/max] {}/{:.2}/{}",
        graph.node_count,
        graph.edge_count,
        graph.sub_networks,
        graph.min_degree,
        graph.avg_degree,
        graph.max_degree
    );
    if let Some(plan) = &model.plan {
        let years: Vec<String> = plan.periods.iter().map(|p| p.year.to_string()).collect();
        println!("investment periods: {}", years.join(", "));
    }
    print!("{diagnostics}");

    if diagnostics.has_errors() {
        bail!("validation found {}", diagnostics.summary());
    }
    info!("model is valid");
    Ok(())
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "network"
    } else {
        name
    }
}
