//! Resolution rules and the fragments they are built from.

use szconfig::{store::value_as_i64, translate::lookup};

use super::{Command, code_of, delete_command, get_command, list_command, parse_json};
use crate::shell::{Flow, Shell};

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "addRule",
        brief: "Add a resolution rule.",
        syntax: "addRule {\"id\": 1234, \"rule\": \"CODE\", \"tier\": 50, \"fragment\": \"FRAGMENT_CODE\", \
                 \"disqualifier\": \"FRAGMENT_CODE\", \"resolve\": \"Yes\", \"relate\": \"No\", \"rtype_id\": 1}",
        handler: add_rule,
    },
    Command {
        name: "deleteRule",
        brief: "Delete a resolution rule.",
        syntax: "deleteRule <rule_code_or_id>",
        handler: delete_rule,
    },
    Command {
        name: "getRule",
        brief: "Get a resolution rule.",
        syntax: "getRule <rule_code_or_id> [table|json|jsonl]",
        handler: get_rule,
    },
    Command {
        name: "setRule",
        brief: "Modify a resolution rule.",
        syntax: "setRule {\"id\": 1234, \"resolve\": \"No\", \"relate\": \"Yes\", \"tier\": 60, ...}",
        handler: set_rule,
    },
    Command {
        name: "listRules",
        brief: "List resolution rules.",
        syntax: "listRules [filter_expression] [table|json|jsonl]",
        handler: list_rules,
    },
    Command {
        name: "addFragment",
        brief: "Add a rule fragment.",
        syntax: "addFragment {\"id\": 1234, \"fragment\": \"CODE\", \
                 \"source\": \"./FRAGMENT[./SAME_NAME>0 and ./SAME_STAB>0]\"}",
        handler: add_fragment,
    },
    Command {
        name: "deleteFragment",
        brief: "Delete a rule fragment.",
        syntax: "deleteFragment <fragment_code_or_id>",
        handler: delete_fragment,
    },
    Command {
        name: "getFragment",
        brief: "Get a rule fragment.",
        syntax: "getFragment <fragment_code_or_id> [table|json|jsonl]",
        handler: get_fragment,
    },
    Command {
        name: "setFragment",
        brief: "Modify a rule fragment.",
        syntax: "setFragment {\"fragment\": \"CODE\", \"source\": \"...\", \"description\": \"...\"}",
        handler: set_fragment,
    },
    Command {
        name: "listFragments",
        brief: "List rule fragments.",
        syntax: "listFragments [filter_expression] [table|json|jsonl]",
        handler: list_fragments,
    },
];

fn add_rule(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let rule = parse_json(arg)?;
    let id = shell.manager.rules().add_rule(&rule)?;
    shell.success(format!("Rule {} added with ID {id}", code_of(&rule, "rule")));
    Ok(Flow::Continue)
}

fn delete_rule(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    delete_command(shell, arg, "Rule", |shell, key| shell.manager.rules().delete_rule(key))
}

fn get_rule(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    get_command(shell, arg, "Rule code or ID", |shell, key| shell.manager.rules().get_rule(key))
}

fn set_rule(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    let id = lookup(&changes, "id")
        .and_then(value_as_i64)
        .ok_or_else(|| anyhow!("Rule ID is required"))?;
    shell.manager.rules().set_rule(&changes)?;
    shell.success(format!("Rule {id} updated"));
    Ok(Flow::Continue)
}

fn list_rules(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.rules().list_rules())
}

fn add_fragment(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let fragment = parse_json(arg)?;
    let id = shell.manager.rules().add_fragment(&fragment)?;
    shell.success(format!("Fragment {} added with ID {id}", code_of(&fragment, "fragment")));
    Ok(Flow::Continue)
}

fn delete_fragment(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    delete_command(shell, arg, "Fragment", |shell, key| shell.manager.rules().delete_fragment(key))
}

fn get_fragment(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    get_command(shell, arg, "Fragment code or ID", |shell, key| shell.manager.rules().get_fragment(key))
}

fn set_fragment(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    let code = code_of(&changes, "fragment");
    if code.is_empty() {
        bail!("Fragment code is required");
    }
    shell.manager.rules().set_fragment(&changes)?;
    shell.success(format!("Fragment {code} updated"));
    Ok(Flow::Continue)
}

fn list_fragments(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.rules().list_fragments())
}
