//! Session commands: load, save, import/export and raw configuration
//! sections.

use serde_json::{Value, json};
use szconfig::{Record, translate::lookup};

use super::{Command, list_command, parse_json, positional, record, show_list, show_record, split_format};
use crate::shell::{DEFAULT_SAVE_COMMENT, Flow, Shell};

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "getDefaultConfigID",
        brief: "Get the default configuration ID.",
        syntax: "getDefaultConfigID",
        handler: get_default_config_id,
    },
    Command {
        name: "getConfigRegistry",
        brief: "Display the configuration registry.",
        syntax: "getConfigRegistry [filter_expression] [table|json|jsonl]",
        handler: get_config_registry,
    },
    Command {
        name: "reload_config",
        brief: "Load a configuration.",
        syntax: "reload_config [config_id]\n\nIf no config_id is provided, loads the default configuration.",
        handler: reload_config,
    },
    Command {
        name: "save",
        brief: "Save the current configuration.",
        syntax: "save [comment]\n\nRegisters the configuration and makes it the default.",
        handler: save,
    },
    Command {
        name: "exportToFile",
        brief: "Export current configuration to a file.",
        syntax: "exportToFile <filename>",
        handler: export_to_file,
    },
    Command {
        name: "importFromFile",
        brief: "Import configuration from a file.",
        syntax: "importFromFile <filename>\n\nReplaces the current configuration. Use save to keep it.",
        handler: import_from_file,
    },
    Command {
        name: "getConfigSection",
        brief: "Get a configuration section.",
        syntax: "getConfigSection [section_name] [filter_expression] [table|json|jsonl]\n\n\
                 Without a section name lists every section.",
        handler: get_config_section,
    },
    Command {
        name: "addConfigSection",
        brief: "Add a new configuration section.",
        syntax: "addConfigSection {\"section_name\": \"SECTION_NAME\", \"section_data\": [...]}\n\n\
                 section_data defaults to an empty table.",
        handler: add_config_section,
    },
    Command {
        name: "addConfigSectionField",
        brief: "Add a field to an existing configuration section.",
        syntax: "addConfigSectionField {\"section_name\": \"SECTION_NAME\", \"field_data\": {\"FIELD\": default}}",
        handler: add_config_section_field,
    },
    Command {
        name: "removeConfigSection",
        brief: "Remove a configuration section.",
        syntax: "removeConfigSection <section_name>",
        handler: remove_config_section,
    },
    Command {
        name: "removeConfigSectionField",
        brief: "Remove a field from a configuration section.",
        syntax: "removeConfigSectionField {\"section_name\": \"SECTION_NAME\", \"field_name\": \"FIELD\"}",
        handler: remove_config_section_field,
    },
    Command {
        name: "templateAdd",
        brief: "Add a template to create feature with attributes.",
        syntax: "templateAdd {\"template\": \"NAME|ADDRESS\", \"feature\": \"FEATURE_CODE\"}\n\
                 templateAdd <NAME|ADDRESS> <feature_code>",
        handler: template_add,
    },
    Command {
        name: "setSetting",
        brief: "Set a configuration setting.",
        syntax: "setSetting <setting_name> <setting_value>",
        handler: set_setting,
    },
    Command {
        name: "touch",
        brief: "Touch/update configuration timestamp.",
        syntax: "touch\n\nMarks the configuration as changed so the next save registers it.",
        handler: touch,
    },
];

fn get_default_config_id(shell: &mut Shell, _arg: &str) -> anyhow::Result<Flow> {
    let config_id = shell.manager.get_default_config_id()?;
    shell.info(format!("Default configuration ID: {config_id}"));
    Ok(Flow::Continue)
}

fn get_config_registry(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.get_config_registry())
}

fn reload_config(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let config_id = match arg.trim() {
        "" => None,
        text => Some(text.parse::<i64>().map_err(|_| anyhow!("Invalid configuration ID: {text}"))?),
    };
    if shell.manager.is_dirty() && !shell.confirm("There are unsaved changes. Discard them?")? {
        return Ok(Flow::Continue);
    }
    let loaded = shell.manager.load_config(config_id)?;
    shell.success(format!("Configuration {loaded} loaded successfully"));
    Ok(Flow::Continue)
}

fn save(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    if !shell.manager.is_dirty() {
        shell.warning("There are no changes to save");
        return Ok(Flow::Continue);
    }
    let comment = match arg.trim() {
        "" => DEFAULT_SAVE_COMMENT,
        text => text,
    };
    let config_id = shell.manager.save_config(comment)?;
    shell.success(format!("Configuration saved with ID: {config_id}"));
    Ok(Flow::Continue)
}

fn filename(arg: &str) -> anyhow::Result<&str> {
    match arg.trim().trim_matches('"') {
        "" => bail!("Filename is required"),
        name => Ok(name),
    }
}

fn export_to_file(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let path = filename(arg)?;
    shell.manager.export_config_to_file(path)?;
    shell.success(format!("Configuration exported to {path}"));
    Ok(Flow::Continue)
}

fn import_from_file(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let path = filename(arg)?;
    shell.manager.import_config_from_file(path)?;
    shell.success(format!("Configuration imported from {path}"));
    Ok(Flow::Continue)
}

fn get_config_section(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (rest, format) = split_format(arg);
    let (name, filter) = match rest.split_once(char::is_whitespace) {
        Some((name, filter)) => (name, filter.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        let names = shell.manager.system().section_names()?;
        let store = shell.manager.get_config_data()?;
        let records = names
            .into_iter()
            .map(|name| {
                let rows = store.section(&name).and_then(Value::as_array).map(Vec::len);
                record(json!({"section": name, "records": rows}))
            })
            .collect();
        show_list(shell, records, filter, format);
        return Ok(Flow::Continue);
    }

    match shell.manager.system().get_section(name)? {
        Value::Array(items) if items.iter().all(Value::is_object) => {
            let records: Vec<Record> = items.into_iter().filter_map(|v| v.as_object().cloned()).collect();
            show_list(shell, records, filter, format);
            Ok(Flow::Continue)
        }
        other => {
            show_record(shell, &other, format);
            Ok(Flow::Continue)
        }
    }
}

fn section_name(record: &Record) -> anyhow::Result<String> {
    lookup(record, "section_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("section_name is required"))
}

fn add_config_section(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let section = if arg.trim_start().starts_with('{') {
        parse_json(arg)?
    } else {
        record(json!({"section_name": arg.trim()}))
    };
    let name = section_name(&section)?;
    shell.manager.system().add_section(&section)?;
    shell.success(format!("Configuration section {name} added"));
    Ok(Flow::Continue)
}

fn add_config_section_field(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let record = parse_json(arg)?;
    let name = section_name(&record)?;
    let changed = shell.manager.system().add_section_field(&record)?;
    shell.success(format!("Field added to {changed} records of {name}"));
    Ok(Flow::Continue)
}

fn remove_config_section(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let name = match positional(arg).first() {
        Some(name) => name.to_string(),
        None => bail!("Section name is required"),
    };
    if !shell.confirm(&format!("Remove configuration section {name}?"))? {
        return Ok(Flow::Continue);
    }
    shell.manager.system().remove_section(&name)?;
    shell.success(format!("Configuration section {name} removed"));
    Ok(Flow::Continue)
}

fn remove_config_section_field(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let record = parse_json(arg)?;
    let name = section_name(&record)?;
    if !shell.confirm(&format!("Remove the field from every record of {name}?"))? {
        return Ok(Flow::Continue);
    }
    let changed = shell.manager.system().remove_section_field(&record)?;
    shell.success(format!("Field removed from {changed} records of {name}"));
    Ok(Flow::Continue)
}

fn template_add(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (template, feature) = if arg.trim_start().starts_with('{') {
        let record = parse_json(arg)?;
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(&record, name).and_then(Value::as_str))
                .map(str::to_string)
        };
        (field(&["template", "template_name"]), field(&["feature", "feature_code"]))
    } else {
        let values = positional(arg);
        (values.first().map(|s| s.to_string()), values.get(1).map(|s| s.to_string()))
    };
    let template = template.ok_or_else(|| anyhow!("Template name is required"))?;
    let feature = feature.ok_or_else(|| anyhow!("Feature code is required"))?;
    let id = shell.manager.features().apply_template(&template, &feature)?;
    shell.success(format!(
        "Feature {} added from the {} template with ID {id}",
        feature.to_uppercase(),
        template.to_uppercase()
    ));
    Ok(Flow::Continue)
}

fn set_setting(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let Some((name, value)) = arg.trim().split_once(char::is_whitespace) else {
        bail!("Setting name and value are required");
    };
    shell.manager.system().set_setting(name, value.trim())?;
    shell.success(format!("Setting {name} set to {}", value.trim()));
    Ok(Flow::Continue)
}

fn touch(shell: &mut Shell, _arg: &str) -> anyhow::Result<Flow> {
    let stamp = shell.manager.system().touch()?;
    shell.success(format!("Configuration touched at {stamp}"));
    Ok(Flow::Continue)
}
