//! Comparison, expression, standardize and distinct functions, the calls
//! binding them to features and comparison thresholds.
//!
//! The four families share handlers parameterised by [`FunctionKind`]; the
//! per-verb entry points are generated by `for_kind!`.

use serde_json::Value;
use szconfig::{Record, RecordKey, schema::FunctionKind, store::value_as_i64, translate::lookup};

use super::{Command, code_of, json_or_positional, list_command, parse_json, parse_key, show_list, show_record, split_format};
use crate::shell::{Flow, Shell};

macro_rules! for_kind {
    ($($name:ident => $helper:ident($kind:ident);)*) => {
        $(
            fn $name(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
                $helper(shell, arg, FunctionKind::$kind)
            }
        )*
    };
}

for_kind! {
    list_comparison_functions => list_functions(Comparison);
    list_expression_functions => list_functions(Expression);
    list_standardize_functions => list_functions(Standardize);
    list_distinct_functions => list_functions(Distinct);
    add_comparison_function => add_function(Comparison);
    add_expression_function => add_function(Expression);
    add_standardize_function => add_function(Standardize);
    add_distinct_function => add_function(Distinct);
    remove_comparison_function => remove_function(Comparison);
    remove_expression_function => remove_function(Expression);
    remove_standardize_function => remove_function(Standardize);
    list_comparison_calls => list_calls(Comparison);
    list_expression_calls => list_calls(Expression);
    list_standardize_calls => list_calls(Standardize);
    list_distinct_calls => list_calls(Distinct);
    get_comparison_call => get_call(Comparison);
    get_expression_call => get_call(Expression);
    get_standardize_call => get_call(Standardize);
    get_distinct_call => get_call(Distinct);
    add_comparison_call => add_call(Comparison);
    add_expression_call => add_call(Expression);
    add_standardize_call => add_call(Standardize);
    add_distinct_call => add_call(Distinct);
    delete_comparison_call => delete_call(Comparison);
    delete_expression_call => delete_call(Expression);
    delete_standardize_call => delete_call(Standardize);
    delete_distinct_call => delete_call(Distinct);
    add_comparison_call_element => add_call_element(Comparison);
    add_expression_call_element => add_call_element(Expression);
    add_distinct_call_element => add_call_element(Distinct);
    delete_comparison_call_element => delete_call_element(Comparison);
    delete_expression_call_element => delete_call_element(Expression);
    delete_distinct_call_element => delete_call_element(Distinct);
}

pub(super) const COMMANDS: &[Command] = &[
    Command {
        name: "listComparisonFunctions",
        brief: "List comparison functions.",
        syntax: "listComparisonFunctions [filter_expression] [table|json|jsonl]",
        handler: list_comparison_functions,
    },
    Command {
        name: "addComparisonFunction",
        brief: "Add a comparison function.",
        syntax: "addComparisonFunction {\"function\": \"CODE\", \"connectStr\": \"plugin_name\", \
                 \"description\": \"...\", \"language\": null, \"anonSupport\": \"No\"}\n\
                 addComparisonFunction <function_code> <connect_str>",
        handler: add_comparison_function,
    },
    Command {
        name: "addComparisonFunc",
        brief: "Add a comparison function (alias).",
        syntax: "addComparisonFunc {\"function\": \"CODE\", \"connectStr\": \"plugin_name\"}",
        handler: add_comparison_function,
    },
    Command {
        name: "removeComparisonFunction",
        brief: "Remove a comparison function.",
        syntax: "removeComparisonFunction <function_code_or_id>",
        handler: remove_comparison_function,
    },
    Command {
        name: "listComparisonCalls",
        brief: "List comparison calls.",
        syntax: "listComparisonCalls [filter_expression] [table|json|jsonl]",
        handler: list_comparison_calls,
    },
    Command {
        name: "addComparisonCall",
        brief: "Add a comparison call.",
        syntax: "addComparisonCall {\"feature\": \"CODE\", \"function\": \"CODE\", \"execOrder\": 1, \
                 \"elementList\": [\"ELEMENT\", {\"element\": \"ELEMENT\", \"required\": \"Yes\"}]}\n\
                 addComparisonCall <feature_code> <function_code>",
        handler: add_comparison_call,
    },
    Command {
        name: "deleteComparisonCall",
        brief: "Delete a comparison call.",
        syntax: "deleteComparisonCall <call_id>",
        handler: delete_comparison_call,
    },
    Command {
        name: "getComparisonCall",
        brief: "Get a comparison call.",
        syntax: "getComparisonCall <call_id_or_feature_code> [table|json|jsonl]",
        handler: get_comparison_call,
    },
    Command {
        name: "addComparisonCallElement",
        brief: "Add element to comparison call.",
        syntax: "addComparisonCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\", \
                 \"required\": \"No\"}\n\
                 addComparisonCallElement <call_id> <element_code> [feature_code] [required]",
        handler: add_comparison_call_element,
    },
    Command {
        name: "deleteComparisonCallElement",
        brief: "Remove element from comparison call.",
        syntax: "deleteComparisonCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}\n\
                 deleteComparisonCallElement <call_id> <element_code> [feature_code]",
        handler: delete_comparison_call_element,
    },
    Command {
        name: "addComparisonThreshold",
        brief: "Add a comparison threshold.",
        syntax: "addComparisonThreshold {\"function\": \"CODE\", \"scoreName\": \"FULL_SCORE\", \
                 \"feature\": \"ALL\", \"execOrder\": 1, \"sameScore\": 100, \"closeScore\": 90, \
                 \"likelyScore\": 80, \"plausibleScore\": 70, \"unlikelyScore\": 60}",
        handler: add_comparison_threshold,
    },
    Command {
        name: "addComparisonFuncReturnCode",
        brief: "Add a comparison threshold (alias).",
        syntax: "addComparisonFuncReturnCode {\"function\": \"CODE\", \"scoreName\": \"FULL_SCORE\", ...}",
        handler: add_comparison_threshold,
    },
    Command {
        name: "deleteComparisonThreshold",
        brief: "Delete a comparison threshold.",
        syntax: "deleteComparisonThreshold <threshold_id>",
        handler: delete_comparison_threshold,
    },
    Command {
        name: "setComparisonThreshold",
        brief: "Modify a comparison threshold.",
        syntax: "setComparisonThreshold {\"id\": 1, \"sameScore\": 100, \"closeScore\": 90, ...}",
        handler: set_comparison_threshold,
    },
    Command {
        name: "listComparisonThresholds",
        brief: "List comparison thresholds.",
        syntax: "listComparisonThresholds [filter_expression] [table|json|jsonl]",
        handler: list_comparison_thresholds,
    },
    Command {
        name: "listExpressionFunctions",
        brief: "List expression functions.",
        syntax: "listExpressionFunctions [filter_expression] [table|json|jsonl]",
        handler: list_expression_functions,
    },
    Command {
        name: "addExpressionFunction",
        brief: "Add an expression function.",
        syntax: "addExpressionFunction {\"function\": \"CODE\", \"connectStr\": \"plugin_name\", \
                 \"description\": \"...\", \"language\": null}\n\
                 addExpressionFunction <function_code> <connect_str>",
        handler: add_expression_function,
    },
    Command {
        name: "addExpressionFunc",
        brief: "Add an expression function (alias).",
        syntax: "addExpressionFunc {\"function\": \"CODE\", \"connectStr\": \"plugin_name\"}",
        handler: add_expression_function,
    },
    Command {
        name: "removeExpressionFunction",
        brief: "Remove an expression function.",
        syntax: "removeExpressionFunction <function_code_or_id>",
        handler: remove_expression_function,
    },
    Command {
        name: "listExpressionCalls",
        brief: "List expression calls.",
        syntax: "listExpressionCalls [filter_expression] [table|json|jsonl]",
        handler: list_expression_calls,
    },
    Command {
        name: "addExpressionCall",
        brief: "Add an expression call.",
        syntax: "addExpressionCall {\"feature\": \"CODE\", \"function\": \"CODE\", \"execOrder\": 1, \
                 \"expressionFeature\": \"CODE\", \"virtual\": \"No\", \"elementList\": [...]}\n\
                 addExpressionCall <feature_code> <function_code>",
        handler: add_expression_call,
    },
    Command {
        name: "deleteExpressionCall",
        brief: "Delete an expression call.",
        syntax: "deleteExpressionCall <call_id>",
        handler: delete_expression_call,
    },
    Command {
        name: "getExpressionCall",
        brief: "Get an expression call.",
        syntax: "getExpressionCall <call_id_or_feature_code> [table|json|jsonl]",
        handler: get_expression_call,
    },
    Command {
        name: "addExpressionCallElement",
        brief: "Add element to expression call.",
        syntax: "addExpressionCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\", \
                 \"required\": \"No\"}\n\
                 addExpressionCallElement <call_id> <element_code> [feature_code] [required]",
        handler: add_expression_call_element,
    },
    Command {
        name: "deleteExpressionCallElement",
        brief: "Remove element from expression call.",
        syntax: "deleteExpressionCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}\n\
                 deleteExpressionCallElement <call_id> <element_code> [feature_code]",
        handler: delete_expression_call_element,
    },
    Command {
        name: "addStandardizeFunc",
        brief: "Add a standardize function.",
        syntax: "addStandardizeFunc {\"function\": \"CODE\", \"connectStr\": \"plugin_name\", \
                 \"description\": \"...\", \"language\": null}\n\
                 addStandardizeFunc <function_code> <connect_str>",
        handler: add_standardize_function,
    },
    Command {
        name: "addStandardizeFunction",
        brief: "Add a standardize function (alias).",
        syntax: "addStandardizeFunction {\"function\": \"CODE\", \"connectStr\": \"plugin_name\"}",
        handler: add_standardize_function,
    },
    Command {
        name: "removeStandardizeFunction",
        brief: "Remove a standardize function.",
        syntax: "removeStandardizeFunction <function_code_or_id>",
        handler: remove_standardize_function,
    },
    Command {
        name: "listStandardizeFunctions",
        brief: "List standardize functions.",
        syntax: "listStandardizeFunctions [filter_expression] [table|json|jsonl]",
        handler: list_standardize_functions,
    },
    Command {
        name: "addStandardizeCall",
        brief: "Add a standardize call.",
        syntax: "addStandardizeCall {\"feature\": \"CODE\", \"function\": \"CODE\", \"element\": \"CODE\", \
                 \"execOrder\": 1}\n\
                 addStandardizeCall <feature_code> <function_code> [element_code]",
        handler: add_standardize_call,
    },
    Command {
        name: "deleteStandardizeCall",
        brief: "Delete a standardize call.",
        syntax: "deleteStandardizeCall <call_id>",
        handler: delete_standardize_call,
    },
    Command {
        name: "getStandardizeCall",
        brief: "Get a standardize call.",
        syntax: "getStandardizeCall <call_id_or_feature_code> [table|json|jsonl]",
        handler: get_standardize_call,
    },
    Command {
        name: "listStandardizeCalls",
        brief: "List standardize calls.",
        syntax: "listStandardizeCalls [filter_expression] [table|json|jsonl]",
        handler: list_standardize_calls,
    },
    Command {
        name: "addDistinctFunction",
        brief: "Add a distinct function.",
        syntax: "addDistinctFunction {\"function\": \"CODE\", \"connectStr\": \"plugin_name\", \
                 \"description\": \"...\", \"language\": null}\n\
                 addDistinctFunction <function_code> <connect_str>",
        handler: add_distinct_function,
    },
    Command {
        name: "listDistinctFunctions",
        brief: "List distinct functions.",
        syntax: "listDistinctFunctions [filter_expression] [table|json|jsonl]",
        handler: list_distinct_functions,
    },
    Command {
        name: "addDistinctCall",
        brief: "Add a distinct call.",
        syntax: "addDistinctCall {\"feature\": \"CODE\", \"function\": \"CODE\", \"execOrder\": 1, \
                 \"elementList\": [...]}\n\
                 addDistinctCall <feature_code> <function_code>",
        handler: add_distinct_call,
    },
    Command {
        name: "deleteDistinctCall",
        brief: "Delete a distinct call.",
        syntax: "deleteDistinctCall <call_id>",
        handler: delete_distinct_call,
    },
    Command {
        name: "getDistinctCall",
        brief: "Get a distinct call.",
        syntax: "getDistinctCall <call_id_or_feature_code> [table|json|jsonl]",
        handler: get_distinct_call,
    },
    Command {
        name: "listDistinctCalls",
        brief: "List distinct calls.",
        syntax: "listDistinctCalls [filter_expression] [table|json|jsonl]",
        handler: list_distinct_calls,
    },
    Command {
        name: "addDistinctCallElement",
        brief: "Add element to distinct call.",
        syntax: "addDistinctCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}\n\
                 addDistinctCallElement <call_id> <element_code> [feature_code]",
        handler: add_distinct_call_element,
    },
    Command {
        name: "deleteDistinctCallElement",
        brief: "Remove element from distinct call.",
        syntax: "deleteDistinctCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}\n\
                 deleteDistinctCallElement <call_id> <element_code> [feature_code]",
        handler: delete_distinct_call_element,
    },
    Command {
        name: "addFeatureComparison",
        brief: "Add a comparison call for a feature.",
        syntax: "addFeatureComparison {\"feature\": \"CODE\", \"function\": \"CODE\", \"elementList\": [...]}",
        handler: add_comparison_call,
    },
    Command {
        name: "addFeatureComparisonElement",
        brief: "Add element to a feature comparison call.",
        syntax: "addFeatureComparisonElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}",
        handler: add_comparison_call_element,
    },
    Command {
        name: "addFeatureDistinctCallElement",
        brief: "Add element to a feature distinct call.",
        syntax: "addFeatureDistinctCallElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}",
        handler: add_distinct_call_element,
    },
    Command {
        name: "deleteFeatureComparison",
        brief: "Delete a feature comparison call.",
        syntax: "deleteFeatureComparison <call_id>",
        handler: delete_comparison_call,
    },
    Command {
        name: "deleteFeatureComparisonElement",
        brief: "Remove element from a feature comparison call.",
        syntax: "deleteFeatureComparisonElement {\"id\": 1, \"element\": \"CODE\", \"feature\": \"CODE\"}",
        handler: delete_comparison_call_element,
    },
];

fn family(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Comparison => "Comparison",
        FunctionKind::Expression => "Expression",
        FunctionKind::Standardize => "Standardize",
        FunctionKind::Distinct => "Distinct",
    }
}

fn list_functions(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.functions(kind).list())
}

fn add_function(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let function = json_or_positional(arg, &["function", "connectStr"])?;
    let code = code_of(&function, "function");
    if code.is_empty() {
        bail!("Function code is required");
    }
    let id = shell.manager.functions(kind).add_function(&function)?;
    shell.success(format!("{} function {code} added with ID {id}", family(kind)));
    Ok(Flow::Continue)
}

fn remove_function(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let key = parse_key(arg, "Function code or ID")?;
    if !shell.confirm(&format!("Remove {} function {key}?", kind.label()))? {
        return Ok(Flow::Continue);
    }
    shell.manager.functions(kind).delete_function(&key)?;
    shell.success(format!("{} function {key} removed", family(kind)));
    Ok(Flow::Continue)
}

fn list_calls(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.calls(kind).list())
}

fn get_call(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let (rest, format) = split_format(arg);
    let key = parse_key(rest, "Call ID or feature code")?;
    let mut calls = shell.manager.calls(kind).get(&key)?;
    if calls.len() == 1 {
        let call = calls.remove(0);
        show_record(shell, &Value::Object(call), format);
    } else {
        show_list(shell, calls, "", format);
    }
    Ok(Flow::Continue)
}

fn add_call(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let call = match kind {
        FunctionKind::Standardize => json_or_positional(arg, &["feature", "function", "element"])?,
        _ => json_or_positional(arg, &["feature", "function"])?,
    };
    let feature = code_of(&call, "feature");
    let id = shell.manager.calls(kind).add_call(&call)?;
    shell.success(format!("{} call {id} added for feature {feature}", family(kind)));
    Ok(Flow::Continue)
}

/// The numeric ID in `arg`, bare or as `{"id": n}`.
fn numeric_id(arg: &str, what: &str) -> anyhow::Result<i64> {
    match parse_key(arg, what)? {
        RecordKey::Id(id) => Ok(id),
        RecordKey::Code(code) => bail!("{what} must be a number, got {code}"),
    }
}

fn delete_call(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let call_id = numeric_id(arg, "Call ID")?;
    if !shell.confirm(&format!("Delete {} call {call_id}?", kind.label()))? {
        return Ok(Flow::Continue);
    }
    shell.manager.calls(kind).delete_call(call_id)?;
    shell.success(format!("{} call {call_id} deleted", family(kind)));
    Ok(Flow::Continue)
}

/// `{id, element, feature, required}` from JSON or positional arguments.
fn call_element(arg: &str) -> anyhow::Result<(Record, i64, String)> {
    let request = json_or_positional(arg, &["id", "element", "feature", "required"])?;
    let call_id = lookup(&request, "id")
        .and_then(value_as_i64)
        .ok_or_else(|| anyhow!("Call ID is required"))?;
    let element = code_of(&request, "element");
    if element.is_empty() {
        bail!("Element code is required");
    }
    Ok((request, call_id, element))
}

fn add_call_element(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let (request, call_id, element) = call_element(arg)?;
    shell.manager.calls(kind).add_call_element(&request)?;
    shell.success(format!("Element {element} added to {} call {call_id}", kind.label()));
    Ok(Flow::Continue)
}

fn delete_call_element(shell: &mut Shell, arg: &str, kind: FunctionKind) -> anyhow::Result<Flow> {
    let (request, call_id, element) = call_element(arg)?;
    if !shell.confirm(&format!("Remove element {element} from {} call {call_id}?", kind.label()))? {
        return Ok(Flow::Continue);
    }
    shell.manager.calls(kind).delete_call_element(&request)?;
    shell.success(format!("Element {element} removed from {} call {call_id}", kind.label()));
    Ok(Flow::Continue)
}

fn add_comparison_threshold(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let threshold = parse_json(arg)?;
    let id = shell.manager.comparison_thresholds().add(&threshold)?;
    shell.success(format!(
        "Comparison threshold {id} added for function {}",
        code_of(&threshold, "function")
    ));
    Ok(Flow::Continue)
}

fn set_comparison_threshold(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let changes = parse_json(arg)?;
    let id = lookup(&changes, "id")
        .and_then(value_as_i64)
        .ok_or_else(|| anyhow!("Threshold ID is required"))?;
    shell.manager.comparison_thresholds().set(&changes)?;
    shell.success(format!("Comparison threshold {id} updated"));
    Ok(Flow::Continue)
}

fn delete_comparison_threshold(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    let id = numeric_id(arg, "Threshold ID")?;
    if !shell.confirm(&format!("Delete comparison threshold {id}?"))? {
        return Ok(Flow::Continue);
    }
    shell.manager.comparison_thresholds().delete(id)?;
    shell.success(format!("Comparison threshold {id} deleted"));
    Ok(Flow::Continue)
}

fn list_comparison_thresholds(shell: &mut Shell, arg: &str) -> anyhow::Result<Flow> {
    list_command(shell, arg, |manager| manager.comparison_thresholds().list())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id("42", "Call ID").unwrap(), 42);
        assert_eq!(numeric_id("{\"id\": 7}", "Call ID").unwrap(), 7);
        let err = numeric_id("NAME", "Call ID").unwrap_err();
        assert_eq!(err.to_string(), "Call ID must be a number, got NAME");
    }

    #[test]
    fn test_call_element_forms() {
        let (request, id, element) = call_element("3 full_name").unwrap();
        assert_eq!((id, element.as_str()), (3, "FULL_NAME"));
        assert_eq!(request.len(), 2);

        let (_, id, element) = call_element(r#"{"id": 5, "element": "ADDR_LINE1", "required": "Yes"}"#).unwrap();
        assert_eq!((id, element.as_str()), (5, "ADDR_LINE1"));
        assert!(call_element("5").is_err());
        assert!(call_element("ADDR").is_err());
    }
}
