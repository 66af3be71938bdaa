//! System parameters, compatibility version and reference codes.

use serde_json::json;
use szconfig::{manager::system::REFERENCE_CODE_TYPES, translate::lookup};

use super::{Command, list_command, parse_json, show_list, show_record, split_format};
use crate::shell::{Flow, Shell};

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "listSystemParameters",
        brief: "List all system parameters.",
        syntax: "listSystemParameters [filter_expression] [table|json|jsonl]",
        handler: list_system_parameters,
    },
    Command {
        name: "setSystemParameter",
        brief: "Set a system parameter.",
        syntax: "setSystemParameter <parameter_name> <parameter_value>\n\
                 setSystemParameter {\"parameter\": \"NAME\", \"value\": \"VALUE\"}",
        handler: set_system_parameter,
    },
    Command {
        name: "getCompatibilityVersion",
        brief: "Get compatibility version info.",
        syntax: "getCompatibilityVersion [table|json|jsonl]",
        handler: get_compatibility_version,
    },
    Command {
        name: "updateCompatibilityVersion",
        brief: "Update compatibility version.",
        syntax: "updateCompatibilityVersion <version>",
        handler: update_compatibility_version,
    },
    Command {
        name: "verifyCompatibilityVersion",
        brief: "Verify version compatibility.",
        syntax: "verifyCompatibilityVersion <expected_version>",
        handler: verify_compatibility_version,
    },
    Command {
        name: "listReferenceCodes",
        brief: "List reference codes.",
        syntax: "listReferenceCodes [matchLevels|featureClasses|behaviorCodes|attributeClasses] \
                 [filter_expression] [table|json|jsonl]",
        handler: list_reference_codes,
    },
];

fn list_system_parameters(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.system().list_parameters())
}

fn set_system_parameter(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let arg = arg.trim();
    let (name, value) = if arg.starts_with('{') {
        let record = parse_json(arg)?;
        let text = |field: &str| lookup(&record, field).map(szconfig::store::value_to_string);
        (text("parameter"), text("value"))
    } else {
        match arg.split_once(char::is_whitespace) {
            Some((name, value)) => (Some(name.to_string()), Some(value.trim().to_string())),
            None => (Some(arg.to_string()).filter(|s| !s.is_empty()), None),
        }
    };
    let name = name.ok_or_else(|| anyhow!("Parameter name is required"))?;
    let value = value.ok_or_else(|| anyhow!("Parameter value is required"))?;
    shell.manager.system().set_parameter(&name, &value)?;
    shell.success(format!("System parameter {name} set to {value}"));
    Ok(Flow::Continue)
}

fn get_compatibility_version(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (_, format) = split_format(arg);
    let version = shell.manager.system().get_compatibility_version()?;
    show_record(shell, &json!({"compatibilityVersion": version}), format);
    Ok(Flow::Continue)
}

fn version_arg(arg: &str) -> anyhow::Result<&str> {
    match arg.trim() {
        "" => bail!("Version is required"),
        version => Ok(version),
    }
}

fn update_compatibility_version(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let version = version_arg(arg)?;
    let previous = shell.manager.system().get_compatibility_version()?;
    shell.manager.system().update_compatibility_version(version)?;
    shell.success(format!("Compatibility version updated from {previous} to {version}"));
    Ok(Flow::Continue)
}

fn verify_compatibility_version(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let expected = version_arg(arg)?;
    if !shell.manager.system().verify_compatibility_version(expected)? {
        let actual = shell.manager.system().get_compatibility_version()?;
        bail!("Compatibility version mismatch: expected {expected}, configuration has {actual}");
    }
    shell.success(format!("Compatibility version {expected} verified"));
    Ok(Flow::Continue)
}

fn list_reference_codes(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (rest, format) = split_format(arg);
    let (first, remainder) = match rest.split_once(char::is_whitespace) {
        Some((first, remainder)) => (first, remainder.trim()),
        None => (rest, ""),
    };
    let (code_type, filter) = if REFERENCE_CODE_TYPES.iter().any(|t| t.eq_ignore_ascii_case(first)) {
        (Some(first), remainder)
    } else {
        (None, rest)
    };
    let records = shell.manager.system().list_reference_codes(code_type)?;
    show_list(shell, records, filter, format);
    Ok(Flow::Continue)
}
