//! Data source commands.

use super::{Command, code_of, list_command, parse_json, parse_key};
use crate::shell::{Flow, Shell};

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "listDataSources",
        brief: "List all data sources in the current configuration.",
        syntax: "listDataSources [filter_expression] [table|json|jsonl]",
        handler: list_data_sources,
    },
    Command {
        name: "addDataSource",
        brief: "Add a new data source.",
        syntax: "addDataSource <data_source_code>\n\
                 addDataSource {\"dataSource\": \"CODE\", \"id\": 1001, \"description\": \"...\"}",
        handler: add_data_source,
    },
    Command {
        name: "deleteDataSource",
        brief: "Delete a data source.",
        syntax: "deleteDataSource <data_source_code or id>",
        handler: delete_data_source,
    },
];

fn list_data_sources(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.data_sources().list())
}

fn add_data_source(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let arg = arg.trim();
    let (code, id) = if arg.starts_with('{') {
        let record = parse_json(arg)?;
        (code_of(&record, "dataSource"), shell.manager.data_sources().add_data_source_json(&record)?)
    } else {
        if arg.is_empty() {
            bail!("Data source code is required");
        }
        (arg.to_uppercase(), shell.manager.data_sources().add_data_source(arg)?)
    };
    shell.success(format!("Data source {code} added with ID {id}"));
    Ok(Flow::Continue)
}

fn delete_data_source(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let key = parse_key(arg, "Data source code")?;
    if !shell.confirm(&format!("Delete data source {key}?"))? {
        return Ok(Flow::Continue);
    }
    shell.manager.data_sources().delete_data_source(&key)?;
    shell.success(format!("Data source {key} deleted"));
    Ok(Flow::Continue)
}
