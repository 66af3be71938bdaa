//! Features, attributes, elements and the elements of each feature.

use serde_json::Value;
use szconfig::{RecordKey, translate::lookup};

use super::{Command, code_of, delete_command, get_command, json_or_positional, list_command, parse_json, positional};
use crate::shell::{Flow, Shell};

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "listFeatures",
        brief: "List all features.",
        syntax: "listFeatures [filter_expression] [table|json|jsonl]",
        handler: list_features,
    },
    Command {
        name: "getFeature",
        brief: "Get a specific feature.",
        syntax: "getFeature <feature_code_or_id> [table|json|jsonl]",
        handler: get_feature,
    },
    Command {
        name: "addFeature",
        brief: "Add a new feature.",
        syntax: "addFeature <feature_code>\n\
                 addFeature {\"feature\": \"CODE\", \"class\": \"OTHER\", \"behavior\": \"FM\", \
                 \"candidates\": \"Yes\", \"anonymize\": \"No\", \"derived\": \"No\", \"history\": \"Yes\", \
                 \"matchKey\": \"Yes\", \"standardize\": \"\", \"expression\": \"\", \"comparison\": \"\", \
                 \"elementList\": [{\"element\": \"CODE\", \"expressed\": \"No\", \"compared\": \"Yes\", \
                 \"display\": \"Yes\"}]}",
        handler: add_feature,
    },
    Command {
        name: "deleteFeature",
        brief: "Delete a feature.",
        syntax: "deleteFeature <feature_code_or_id>",
        handler: delete_feature,
    },
    Command {
        name: "setFeature",
        brief: "Modify an existing feature.",
        syntax: "setFeature {\"feature\": \"CODE\", \"behavior\": \"FM\", \"candidates\": \"No\", ...}",
        handler: set_feature,
    },
    Command {
        name: "updateFeatureVersion",
        brief: "Update feature version.",
        syntax: "updateFeatureVersion <feature_code> <version>\n\
                 updateFeatureVersion {\"feature\": \"CODE\", \"version\": 2}",
        handler: update_feature_version,
    },
    Command {
        name: "listAttributes",
        brief: "List all attributes.",
        syntax: "listAttributes [filter_expression] [table|json|jsonl]",
        handler: list_attributes,
    },
    Command {
        name: "getAttribute",
        brief: "Get a specific attribute.",
        syntax: "getAttribute <attribute_code_or_id> [table|json|jsonl]",
        handler: get_attribute,
    },
    Command {
        name: "addAttribute",
        brief: "Add a new attribute.",
        syntax: "addAttribute <attribute> <class> <feature> <element> [required]\n\
                 addAttribute {\"attribute\": \"CODE\", \"class\": \"OTHER\", \"feature\": \"FEATURE\", \
                 \"element\": \"ELEMENT\", \"required\": \"No\", \"default\": null, \"internal\": \"No\"}",
        handler: add_attribute,
    },
    Command {
        name: "deleteAttribute",
        brief: "Delete an attribute.",
        syntax: "deleteAttribute <attribute_code_or_id>",
        handler: delete_attribute,
    },
    Command {
        name: "setAttribute",
        brief: "Modify an existing attribute.",
        syntax: "setAttribute {\"attribute\": \"CODE\", \"required\": \"Yes\", \"internal\": \"No\", \"default\": null}",
        handler: set_attribute,
    },
    Command {
        name: "listElements",
        brief: "List all elements.",
        syntax: "listElements [filter_expression] [table|json|jsonl]",
        handler: list_elements,
    },
    Command {
        name: "getElement",
        brief: "Get a specific element.",
        syntax: "getElement <element_code_or_id> [table|json|jsonl]",
        handler: get_element,
    },
    Command {
        name: "addElement",
        brief: "Add a new element.",
        syntax: "addElement <element_code> [datatype]\n\
                 addElement {\"element\": \"CODE\", \"datatype\": \"string\", \"tokenize\": \"No\", \
                 \"description\": \"CODE\"}",
        handler: add_element,
    },
    Command {
        name: "deleteElement",
        brief: "Delete an element.",
        syntax: "deleteElement <element_code_or_id>",
        handler: delete_element,
    },
    Command {
        name: "addElementToFeature",
        brief: "Add element to feature.",
        syntax: "addElementToFeature <feature_code> <element_code> [exec_order]\n\
                 addElementToFeature {\"feature\": \"CODE\", \"element\": \"CODE\", \"execOrder\": 1, \
                 \"derived\": \"No\", \"display\": \"Yes\", \"expressed\": \"No\", \"compared\": \"No\"}",
        handler: add_element_to_feature,
    },
    Command {
        name: "deleteElementFromFeature",
        brief: "Remove element from feature.",
        syntax: "deleteElementFromFeature <feature_code> <element_code>\n\
                 deleteElementFromFeature {\"feature\": \"CODE\", \"element\": \"CODE\"}",
        handler: delete_element_from_feature,
    },
    Command {
        name: "setFeatureElement",
        brief: "Set feature element properties.",
        syntax: "setFeatureElement {\"feature\": \"CODE\", \"element\": \"CODE\", \"derived\": \"No\", \
                 \"display\": \"Yes\", \"displayDelim\": \",\", \"execOrder\": 1}",
        handler: set_feature_element,
    },
    Command {
        name: "setFeatureElementDerived",
        brief: "Set feature element derived flag.",
        syntax: "setFeatureElementDerived {\"feature\": \"CODE\", \"element\": \"CODE\", \"derived\": \"Yes\"}",
        handler: set_feature_element,
    },
    Command {
        name: "setFeatureElementDisplayLevel",
        brief: "Set feature element display level.",
        syntax: "setFeatureElementDisplayLevel {\"feature\": \"CODE\", \"element\": \"CODE\", \"display\": \"No\"}",
        handler: set_feature_element,
    },
    Command {
        name: "addToNamehash",
        brief: "Add element to name hash.",
        syntax: "addToNamehash <feature_code> <element_code>\n\
                 addToNamehash {\"feature\": \"NAME\", \"element\": \"FULL_NAME\"}",
        handler: add_to_namehash,
    },
    Command {
        name: "deleteFromNamehash",
        brief: "Remove element from name hash.",
        syntax: "deleteFromNamehash <feature_code> <element_code>\n\
                 deleteFromNamehash {\"feature\": \"NAME\", \"element\": \"FULL_NAME\"}",
        handler: delete_from_namehash,
    },
    Command {
        name: "addToNameSSNLast4hash",
        brief: "Add element to SSN last 4 hash.",
        syntax: "addToNameSSNLast4hash <feature_code> <element_code>\n\
                 addToNameSSNLast4hash {\"feature\": \"SSN\", \"element\": \"SSN_LAST4\"}",
        handler: add_to_ssn_last4_hash,
    },
    Command {
        name: "deleteFromSSNLast4hash",
        brief: "Remove element from SSN last 4 hash.",
        syntax: "deleteFromSSNLast4hash <feature_code> <element_code>\n\
                 deleteFromSSNLast4hash {\"feature\": \"SSN\", \"element\": \"SSN_LAST4\"}",
        handler: delete_from_ssn_last4_hash,
    },
];

fn list_features(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.features().list())
}

fn get_feature(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    get_command(shell, arg, "Feature code or ID", |shell, key| shell.manager.features().get(key))
}

fn add_feature(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (code, id) = if arg.trim_start().starts_with('{') {
        let feature = parse_json(arg)?;
        let id = shell.manager.features().add_feature_json(&feature)?;
        (code_of(&feature, "feature"), id)
    } else {
        let code = match positional(arg).first() {
            Some(code) => code.to_uppercase(),
            None => bail!("Feature code is required"),
        };
        let id = shell.manager.features().add_feature(&code)?;
        (code, id)
    };
    shell.success(format!("Feature {code} added with ID {id}"));
    Ok(Flow::Continue)
}

fn delete_feature(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    delete_command(shell, arg, "Feature", |shell, key| shell.manager.features().delete_feature(key))
}

fn set_feature(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    shell.manager.features().set_feature(&changes)?;
    shell.success(format!("Feature {} updated", code_of(&changes, "feature")));
    Ok(Flow::Continue)
}

fn update_feature_version(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let request = json_or_positional(arg, &["feature", "version"])?;
    let feature = match lookup(&request, "feature") {
        Some(Value::Number(n)) => n.as_i64().map(RecordKey::Id),
        Some(other) => Some(RecordKey::parse(&szconfig::store::value_to_string(other))),
        None => None,
    }
    .ok_or_else(|| anyhow!("Feature code is required"))?;
    let version = lookup(&request, "version")
        .ok_or_else(|| anyhow!("Version is required"))
        .and_then(|v| szconfig::store::value_as_i64(v).ok_or_else(|| anyhow!("Version must be a number")))?;
    shell.manager.features().update_feature_version(&feature, version)?;
    shell.success(format!("Feature {feature} updated to version {version}"));
    Ok(Flow::Continue)
}

fn list_attributes(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.attributes().list())
}

fn get_attribute(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    get_command(shell, arg, "Attribute code or ID", |shell, key| shell.manager.attributes().get(key))
}

fn add_attribute(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let attribute = json_or_positional(arg, &["attribute", "class", "feature", "element", "required"])?;
    let id = shell.manager.attributes().add_attribute(&attribute)?;
    shell.success(format!("Attribute {} added with ID {id}", code_of(&attribute, "attribute")));
    Ok(Flow::Continue)
}

fn delete_attribute(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    delete_command(shell, arg, "Attribute", |shell, key| shell.manager.attributes().delete_attribute(key))
}

fn set_attribute(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    shell.manager.attributes().set_attribute(&changes)?;
    shell.success(format!("Attribute {} updated", code_of(&changes, "attribute")));
    Ok(Flow::Continue)
}

fn list_elements(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.elements().list())
}

fn get_element(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    get_command(shell, arg, "Element code or ID", |shell, key| shell.manager.elements().get(key))
}

fn add_element(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let element = json_or_positional(arg, &["element", "datatype"])?;
    let code = code_of(&element, "element");
    if code.is_empty() {
        bail!("Element code is required");
    }
    let id = if element.len() == 1 {
        shell.manager.elements().add_element(&code)?
    } else {
        shell.manager.elements().add_element_json(&element)?
    };
    shell.success(format!("Element {code} added with ID {id}"));
    Ok(Flow::Continue)
}

fn delete_element(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    delete_command(shell, arg, "Element", |shell, key| shell.manager.elements().delete_element(key))
}

fn add_element_to_feature(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let request = json_or_positional(arg, &["feature", "element", "execOrder"])?;
    let (feature, element) = (code_of(&request, "feature"), code_of(&request, "element"));
    if feature.is_empty() || element.is_empty() {
        bail!("Feature and element are required");
    }
    shell.manager.features().add_feature_element(&request)?;
    shell.success(format!("Element {element} added to feature {feature}"));
    Ok(Flow::Continue)
}

fn delete_element_from_feature(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let request = json_or_positional(arg, &["feature", "element"])?;
    let (feature, element) = (code_of(&request, "feature"), code_of(&request, "element"));
    if feature.is_empty() || element.is_empty() {
        bail!("Feature and element are required");
    }
    if !shell.confirm(&format!("Remove element {element} from feature {feature}?"))? {
        return Ok(Flow::Continue);
    }
    shell
        .manager
        .features()
        .remove_element_from_feature(&RecordKey::parse(&feature), &RecordKey::parse(&element))?;
    shell.success(format!("Element {element} removed from feature {feature}"));
    Ok(Flow::Continue)
}

fn set_feature_element(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    shell.manager.features().set_feature_element(&changes)?;
    shell.success(format!(
        "Element {} of feature {} updated",
        code_of(&changes, "element"),
        code_of(&changes, "feature")
    ));
    Ok(Flow::Continue)
}

/// The `{feature, element}` pair a hash command works on.
fn hash_pair(arg: &str) -> anyhow::Result<(String, String)> {
    let request = json_or_positional(arg, &["feature", "element"])?;
    let (feature, element) = (code_of(&request, "feature"), code_of(&request, "element"));
    if feature.is_empty() || element.is_empty() {
        bail!("Feature and element are required");
    }
    Ok((feature, element))
}

fn add_to_namehash(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (feature, element) = hash_pair(arg)?;
    shell.manager.features().add_to_namehash(&feature, &element)?;
    shell.success(format!("{feature}.{element} added to the name hash"));
    Ok(Flow::Continue)
}

fn delete_from_namehash(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (feature, element) = hash_pair(arg)?;
    shell.manager.features().delete_from_namehash(&feature, &element)?;
    shell.success(format!("{feature}.{element} removed from the name hash"));
    Ok(Flow::Continue)
}

fn add_to_ssn_last4_hash(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (feature, element) = hash_pair(arg)?;
    shell.manager.features().add_to_ssn_last4_hash(&feature, &element)?;
    shell.success(format!("{feature}.{element} added to the SSN last 4 hash"));
    Ok(Flow::Continue)
}

fn delete_from_ssn_last4_hash(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let (feature, element) = hash_pair(arg)?;
    shell.manager.features().delete_from_ssn_last4_hash(&feature, &element)?;
    shell.success(format!("{feature}.{element} removed from the SSN last 4 hash"));
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_hash_pair_accepts_both_forms() {
        assert_eq!(hash_pair("name full_name").unwrap(), ("NAME".into(), "FULL_NAME".into()));
        assert_eq!(
            hash_pair(r#"{"feature": "SSN", "element": "SSN_LAST4"}"#).unwrap(),
            ("SSN".into(), "SSN_LAST4".into())
        );
        assert!(hash_pair("NAME").is_err());
    }

    #[test]
    fn test_positional_attribute_record() {
        let attribute = json_or_positional("MY_ATTR other MY_FEAT MY_ELEM", &[
            "attribute", "class", "feature", "element", "required",
        ])
        .unwrap();
        assert_eq!(Value::Object(attribute), json!({
            "attribute": "MY_ATTR",
            "class": "other",
            "feature": "MY_FEAT",
            "element": "MY_ELEM",
        }));
    }
}
