//! Generic plans, their candidate and scoring thresholds, and feature
//! behavior overrides.

use szconfig::Record;

use super::{Command, code_of, json_or_positional, list_command, parse_json, parse_key, split_format};
use crate::shell::{Flow, Shell};

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "addGenericThreshold",
        brief: "Add a generic threshold.",
        syntax: "addGenericThreshold {\"plan\": \"INGEST\", \"behavior\": \"NAME\", \"feature\": \"ALL\", \
                 \"candidateCap\": 10, \"scoringCap\": -1, \"sendToRedo\": \"Yes\"}",
        handler: add_generic_threshold,
    },
    Command {
        name: "deleteGenericThreshold",
        brief: "Delete a generic threshold.",
        syntax: "deleteGenericThreshold {\"plan\": \"INGEST\", \"behavior\": \"NAME\", \"feature\": \"ALL\"}",
        handler: delete_generic_threshold,
    },
    Command {
        name: "setGenericThreshold",
        brief: "Modify a generic threshold.",
        syntax: "setGenericThreshold {\"plan\": \"INGEST\", \"behavior\": \"NAME\", \"feature\": \"ALL\", \
                 \"candidateCap\": 20, \"scoringCap\": 100, \"sendToRedo\": \"No\"}",
        handler: set_generic_threshold,
    },
    Command {
        name: "listGenericThresholds",
        brief: "List generic thresholds.",
        syntax: "listGenericThresholds [plan_code] [filter_expression] [table|json|jsonl]",
        handler: list_generic_thresholds,
    },
    Command {
        name: "cloneGenericPlan",
        brief: "Clone a generic plan.",
        syntax: "cloneGenericPlan {\"existingPlan\": \"INGEST\", \"newPlan\": \"CODE\", \"description\": \"...\"}\n\
                 cloneGenericPlan <existing_plan> <new_plan> [description]",
        handler: clone_generic_plan,
    },
    Command {
        name: "deleteGenericPlan",
        brief: "Delete a generic plan.",
        syntax: "deleteGenericPlan <plan_code_or_id>",
        handler: delete_generic_plan,
    },
    Command {
        name: "listGenericPlans",
        brief: "List generic plans.",
        syntax: "listGenericPlans [filter_expression] [table|json|jsonl]",
        handler: list_generic_plans,
    },
    Command {
        name: "addEntityScore",
        brief: "Add entity scoring threshold.",
        syntax: "addEntityScore {\"plan\": \"INGEST\", \"behavior\": \"NAME\", \"candidateCap\": 10, \
                 \"scoringCap\": -1}\n\nAdds a generic threshold that applies to every feature.",
        handler: add_entity_score,
    },
    Command {
        name: "listBehaviorOverrides",
        brief: "List behavior overrides.",
        syntax: "listBehaviorOverrides [filter_expression] [table|json|jsonl]",
        handler: list_behavior_overrides,
    },
    Command {
        name: "addBehaviorOverride",
        brief: "Add a behavior override.",
        syntax: "addBehaviorOverride {\"feature\": \"CODE\", \"usageType\": \"BUSINESS\", \"behavior\": \"F1E\"}\n\
                 addBehaviorOverride <feature_code> <usage_type> <behavior>",
        handler: add_behavior_override,
    },
    Command {
        name: "deleteBehaviorOverride",
        brief: "Delete a behavior override.",
        syntax: "deleteBehaviorOverride {\"feature\": \"CODE\", \"usageType\": \"BUSINESS\"}\n\
                 deleteBehaviorOverride <feature_code> <usage_type>",
        handler: delete_behavior_override,
    },
];

/// `plan/behavior/feature` for messages.
fn threshold_label(record: &Record) -> String {
    let feature = match code_of(record, "feature") {
        code if code.is_empty() => "ALL".to_string(),
        code => code,
    };
    format!("{}/{}/{feature}", code_of(record, "plan"), code_of(record, "behavior"))
}

fn add_generic_threshold(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let threshold = parse_json(arg)?;
    shell.manager.scoring().add_threshold(&threshold)?;
    shell.success(format!("Generic threshold {} added", threshold_label(&threshold)));
    Ok(Flow::Continue)
}

fn delete_generic_threshold(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let threshold = parse_json(arg)?;
    let label = threshold_label(&threshold);
    if !shell.confirm(&format!("Delete generic threshold {label}?"))? {
        return Ok(Flow::Continue);
    }
    shell.manager.scoring().delete_threshold(&threshold)?;
    shell.success(format!("Generic threshold {label} deleted"));
    Ok(Flow::Continue)
}

fn set_generic_threshold(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    shell.manager.scoring().set_threshold(&changes)?;
    shell.success(format!("Generic threshold {} updated", threshold_label(&changes)));
    Ok(Flow::Continue)
}

fn list_generic_thresholds(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (rest, _) = split_format(arg);
    let plan = rest.split_whitespace().next().map(str::to_string);
    // A leading token that names a plan selects it; anything else filters.
    let plan = match plan {
        Some(plan) if shell.manager.scoring().list_thresholds(Some(&plan)).is_ok() => Some(plan),
        _ => None,
    };
    let filter_arg = match &plan {
        Some(plan) => arg.trim_start()[plan.len()..].to_string(),
        None => arg.to_string(),
    };
    list_command(shell, &filter_arg, |manager| manager.scoring().list_thresholds(plan.as_deref()))
}

fn clone_generic_plan(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let request = if arg.trim_start().starts_with('{') {
        parse_json(arg)?
    } else {
        let mut parts = arg.split_whitespace();
        let mut request = json_or_positional(
            &parts.by_ref().take(2).collect::<Vec<_>>().join(" "),
            &["existingPlan", "newPlan"],
        )?;
        let description = parts.collect::<Vec<_>>().join(" ");
        if !description.is_empty() {
            request.insert("description".into(), description.into());
        }
        request
    };
    let id = shell.manager.scoring().clone_plan(&request)?;
    shell.success(format!(
        "Generic plan {} cloned to {} with ID {id}",
        code_of(&request, "existingPlan"),
        code_of(&request, "newPlan")
    ));
    Ok(Flow::Continue)
}

fn delete_generic_plan(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let key = parse_key(arg, "Plan code or ID")?;
    if !shell.confirm(&format!("Delete generic plan {key} and its thresholds?"))? {
        return Ok(Flow::Continue);
    }
    shell.manager.scoring().delete_plan(&key)?;
    shell.success(format!("Generic plan {key} deleted"));
    Ok(Flow::Continue)
}

fn list_generic_plans(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.scoring().list_plans())
}

fn add_entity_score(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let threshold = parse_json(arg)?;
    shell.manager.scoring().add_entity_score(&threshold)?;
    let mut shown = threshold.clone();
    shown.retain(|name, _| !name.eq_ignore_ascii_case("feature"));
    shell.success(format!("Entity score threshold {} added", threshold_label(&shown)));
    Ok(Flow::Continue)
}

fn list_behavior_overrides(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.scoring().list_overrides())
}

fn add_behavior_override(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let request = json_or_positional(arg, &["feature", "usageType", "behavior"])?;
    shell.manager.scoring().add_override(&request)?;
    shell.success(format!(
        "Behavior override {} for {} added",
        code_of(&request, "feature"),
        code_of(&request, "usageType")
    ));
    Ok(Flow::Continue)
}

fn delete_behavior_override(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let request = json_or_positional(arg, &["feature", "usageType"])?;
    let (feature, usage) = (code_of(&request, "feature"), code_of(&request, "usageType"));
    if !shell.confirm(&format!("Delete behavior override {feature} for {usage}?"))? {
        return Ok(Flow::Continue);
    }
    shell.manager.scoring().delete_override(&request)?;
    shell.success(format!("Behavior override {feature} for {usage} deleted"));
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::commands::record;

    #[test]
    fn test_threshold_label_defaults_feature() {
        let threshold = record(json!({"plan": "ingest", "behavior": "name"}));
        assert_eq!(threshold_label(&threshold), "INGEST/NAME/ALL");
        let threshold = record(json!({"plan": "INGEST", "behavior": "F1", "feature": "ssn"}));
        assert_eq!(threshold_label(&threshold), "INGEST/F1/SSN");
    }
}
