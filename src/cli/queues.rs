//! Queues command implementation

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

use crate::cli::serve::load_queues_from_config;
use crate::cli::QueuesArgs;
use crate::config::DistributorConfig;
use crate::registry::{Member, Queue, Registry};

/// View model for queue display
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    #[serde(flatten)]
    pub queue: Queue,
    pub members: Vec<Member>,
}

/// Load the config file named in `args` and print its queues.
pub fn run_queues(args: &QueuesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = DistributorConfig::load(Some(&args.config))?;
    config.validate()?;

    let registry = Registry::new();
    load_queues_from_config(&config, &registry)?;

    println!("{}", handle_queues(args, &registry)?);
    Ok(())
}

/// Render the registry's queues as a table or JSON.
pub fn handle_queues(
    args: &QueuesArgs,
    registry: &Registry,
) -> Result<String, Box<dyn std::error::Error>> {
    let queues = match args.tenant {
        Some(ref tenant) => registry.list_queues(tenant),
        None => registry.all_queues(),
    };

    let views = queues
        .into_iter()
        .map(|queue| {
            let members = registry.list_members(queue.id)?;
            Ok(QueueView { queue, members })
        })
        .collect::<Result<Vec<_>, crate::registry::RegistryError>>()?;

    if args.json {
        Ok(serde_json::to_string_pretty(&json!({ "queues": views }))?)
    } else {
        Ok(format_queues_table(&views))
    }
}

/// Members are listed as `agent(penalty)`, paused ones marked with `*`.
pub fn format_queues_table(views: &[QueueView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Tenant", "Name", "Strategy", "Timeout", "Members", "Overflow",
    ]);

    for view in views {
        let queue = &view.queue;
        let members = view
            .members
            .iter()
            .map(|m| {
                let marker = if m.paused { "*" } else { "" };
                format!("{}({}){}", m.agent_id, m.penalty, marker)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let overflow = match queue.overflow_queue_id {
            Some(target) => format!("{} after {}s", target, queue.overflow_timeout),
            None => "-".to_string(),
        };

        table.add_row(vec![
            Cell::new(queue.id),
            Cell::new(&queue.tenant),
            Cell::new(&queue.name),
            Cell::new(queue.strategy),
            Cell::new(format!("{}s", queue.timeout)),
            Cell::new(members),
            Cell::new(overflow),
        ]);
    }

    table.to_string()
}
