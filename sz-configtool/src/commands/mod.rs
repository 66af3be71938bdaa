//! Command registry and handlers.
//!
//! Every verb is a static [`Command`] entry naming its handler, a one-line
//! description and the syntax block shown by `help <verb>`. Aliases are
//! separate entries sharing their target's handler. [`HELP_CATEGORIES`]
//! fixes the order in which `help` lists the verbs.
//!
//! ## Modules
//!
//! - `basic` - help, quit/exit, history, shell and setTheme
//! - `config` - session, import/export and raw configuration sections
//! - `data_sources` - data sources
//! - `features` - features, attributes, elements and their membership
//! - `functions` - functions, calls and comparison thresholds
//! - `rules` - rules and fragments
//! - `scoring` - generic plans, thresholds and behavior overrides
//! - `system` - system parameters, compatibility version, reference codes

use std::collections::HashMap;

use serde_json::Value;
use szconfig::{ConfigManager, Record, RecordKey};

use crate::{
    display::OutputFormat,
    shell::{Flow, Shell},
};

mod basic;
mod config;
mod data_sources;
mod features;
mod functions;
mod rules;
mod scoring;
mod system;

/// Runs one verb with the rest of the command line.
pub type Handler = fn(&mut Shell, &str) -> anyhow::Result<Flow>;

#[derive(Debug, Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    /// One line shown in the command overview.
    pub brief: &'static str,
    /// Full usage shown by `help <verb>`.
    pub syntax: &'static str,
    pub handler: Handler,
}

/// Verbs per help category, in display order.
pub const HELP_CATEGORIES: &[(&str, &[&str])] = &[
    ("Basic Commands", &["help", "quit", "exit", "history", "shell"]),
    (
        "Configuration Management",
        &[
            "getDefaultConfigID",
            "getConfigRegistry",
            "reload_config",
            "save",
            "exportToFile",
            "importFromFile",
            "getConfigSection",
            "addConfigSection",
            "addConfigSectionField",
            "removeConfigSection",
            "removeConfigSectionField",
            "templateAdd",
            "setSetting",
            "touch",
        ],
    ),
    ("Data Source Management", &["listDataSources", "addDataSource", "deleteDataSource"]),
    (
        "Feature Management",
        &["listFeatures", "getFeature", "addFeature", "deleteFeature", "setFeature", "updateFeatureVersion"],
    ),
    (
        "Attribute Management",
        &["listAttributes", "getAttribute", "addAttribute", "deleteAttribute", "setAttribute"],
    ),
    (
        "Element Management",
        &[
            "listElements",
            "getElement",
            "addElement",
            "deleteElement",
            "addElementToFeature",
            "deleteElementFromFeature",
            "setFeatureElement",
            "setFeatureElementDerived",
            "setFeatureElementDisplayLevel",
        ],
    ),
    (
        "Comparison Functions",
        &[
            "listComparisonFunctions",
            "addComparisonFunction",
            "addComparisonFunc",
            "removeComparisonFunction",
            "listComparisonCalls",
            "addComparisonCall",
            "deleteComparisonCall",
            "getComparisonCall",
            "addComparisonCallElement",
            "deleteComparisonCallElement",
            "addComparisonThreshold",
            "addComparisonFuncReturnCode",
            "deleteComparisonThreshold",
            "setComparisonThreshold",
            "listComparisonThresholds",
        ],
    ),
    (
        "Expression Functions",
        &[
            "listExpressionFunctions",
            "addExpressionFunction",
            "addExpressionFunc",
            "removeExpressionFunction",
            "listExpressionCalls",
            "addExpressionCall",
            "deleteExpressionCall",
            "getExpressionCall",
            "addExpressionCallElement",
            "deleteExpressionCallElement",
        ],
    ),
    (
        "Standardization Functions",
        &[
            "addStandardizeFunc",
            "addStandardizeFunction",
            "removeStandardizeFunction",
            "listStandardizeFunctions",
            "addStandardizeCall",
            "deleteStandardizeCall",
            "getStandardizeCall",
            "listStandardizeCalls",
        ],
    ),
    (
        "Distinct Functions",
        &[
            "addDistinctFunction",
            "listDistinctFunctions",
            "addDistinctCall",
            "deleteDistinctCall",
            "getDistinctCall",
            "listDistinctCalls",
            "addDistinctCallElement",
            "deleteDistinctCallElement",
        ],
    ),
    (
        "Feature System Advanced",
        &[
            "addFeatureComparison",
            "addFeatureComparisonElement",
            "addFeatureDistinctCallElement",
            "deleteFeatureComparison",
            "deleteFeatureComparisonElement",
            "addToNamehash",
            "deleteFromNamehash",
            "addToNameSSNLast4hash",
            "deleteFromSSNLast4hash",
        ],
    ),
    (
        "Rules and Fragments",
        &[
            "addRule",
            "deleteRule",
            "getRule",
            "setRule",
            "listRules",
            "addFragment",
            "deleteFragment",
            "getFragment",
            "setFragment",
            "listFragments",
        ],
    ),
    (
        "Generic Plans & Scoring",
        &[
            "addGenericThreshold",
            "deleteGenericThreshold",
            "setGenericThreshold",
            "listGenericThresholds",
            "cloneGenericPlan",
            "deleteGenericPlan",
            "listGenericPlans",
            "addEntityScore",
            "listReferenceCodes",
        ],
    ),
    ("Behavior Overrides", &["listBehaviorOverrides", "addBehaviorOverride", "deleteBehaviorOverride"]),
    ("System Parameters", &["listSystemParameters", "setSystemParameter"]),
    (
        "System & Compatibility",
        &["getCompatibilityVersion", "updateCompatibilityVersion", "verifyCompatibilityVersion"],
    ),
    ("Display Settings", &["setTheme"]),
];

/// Lookup table from verb to command, built once per shell.
#[derive(Debug, Clone)]
pub struct Registry {
    commands: Vec<Command>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        let commands: Vec<Command> = [
            basic::COMMANDS,
            config::COMMANDS,
            data_sources::COMMANDS,
            features::COMMANDS,
            functions::COMMANDS,
            rules::COMMANDS,
            scoring::COMMANDS,
            system::COMMANDS,
        ]
        .concat();
        let index = commands.iter().enumerate().map(|(i, c)| (c.name, i)).collect();
        Self { commands, index }
    }

    /// The command for `verb`. An exact match wins over one that only
    /// differs in case.
    pub fn get(&self, verb: &str) -> Option<&Command> {
        match self.index.get(verb) {
            Some(i) => self.commands.get(*i),
            None => self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(verb)),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Registered commands grouped by help category.
    pub fn categories(&self) -> Vec<(&'static str, Vec<&Command>)> {
        HELP_CATEGORIES
            .iter()
            .map(|(category, verbs)| (*category, verbs.iter().filter_map(|v| self.get(v)).collect()))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a trailing `table`, `json` or `jsonl` token off `arg`.
pub(crate) fn split_format(arg: &str) -> (&str, Option<OutputFormat>) {
    let arg = arg.trim();
    if let Some(format) = OutputFormat::parse(arg) {
        return ("", Some(format));
    }
    match arg.rsplit_once(char::is_whitespace) {
        Some((head, last)) => match OutputFormat::parse(last) {
            Some(format) => (head.trim_end(), Some(format)),
            None => (arg, None),
        },
        None => (arg, None),
    }
}

/// A JSON object argument.
pub(crate) fn parse_json(arg: &str) -> anyhow::Result<Record> {
    let arg = arg.trim();
    if arg.is_empty() {
        bail!("A JSON configuration is required");
    }
    let value: Value = serde_json::from_str(arg).map_err(|e| anyhow!("Invalid JSON: {e}"))?;
    match value {
        Value::Object(record) => Ok(record),
        _ => bail!("Invalid JSON: expected an object"),
    }
}

/// An ID, a code or a JSON object naming one, for example `{"id": 5}` or
/// `{"feature": "NAME"}`.
pub(crate) fn parse_key(arg: &str, what: &str) -> anyhow::Result<RecordKey> {
    let arg = arg.trim();
    if arg.is_empty() {
        bail!("{what} is required");
    }
    if arg.starts_with('{') {
        return key_from_record(&parse_json(arg)?).ok_or_else(|| anyhow!("{what} is required"));
    }
    let token = arg.split_whitespace().next().unwrap_or(arg);
    Ok(RecordKey::parse(token))
}

/// `id`, `featureId`, `FTYPE_ID` and the like.
fn is_id_field(name: &str) -> bool {
    name.eq_ignore_ascii_case("id") || name.ends_with("Id") || name.ends_with("_ID") || name.ends_with("_id")
}

fn key_from_record(record: &Record) -> Option<RecordKey> {
    let id = record.iter().find_map(|(name, value)| {
        let is_id = is_id_field(name);
        match value {
            Value::Number(n) if is_id => n.as_i64(),
            Value::String(s) if is_id => s.trim().parse().ok(),
            _ => None,
        }
    });
    if let Some(id) = id {
        return Some(RecordKey::Id(id));
    }
    record
        .values()
        .find_map(Value::as_str)
        .map(RecordKey::parse)
}

/// Whitespace separated arguments.
pub(crate) fn positional(arg: &str) -> Vec<&str> {
    arg.split_whitespace().collect()
}

/// Either the JSON object in `arg` or a record built from positional
/// arguments under `names`. Missing trailing positions are left out.
pub(crate) fn json_or_positional(arg: &str, names: &[&str]) -> anyhow::Result<Record> {
    if arg.trim_start().starts_with('{') {
        return parse_json(arg);
    }
    let values = positional(arg);
    if values.len() > names.len() {
        bail!("Too many arguments, expected: {}", names.join(" "));
    }
    Ok(names
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), Value::from(value)))
        .collect())
}

/// The upper-cased code stored under `name`, for messages.
pub(crate) fn code_of(record: &Record, name: &str) -> String {
    szconfig::translate::lookup(record, name)
        .map(szconfig::store::value_to_string)
        .unwrap_or_default()
        .to_uppercase()
}

/// A record from a JSON literal.
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        _ => Record::new(),
    }
}

/// Fetch, filter and print a list.
pub(crate) fn list_command(
    shell: &mut Shell,
    arg: &str,
    fetch: impl FnOnce(&mut ConfigManager) -> szconfig::Result<Vec<Record>>,
) -> anyhow::Result<Flow> {
    let (filter, format) = split_format(arg);
    let records = fetch(&mut shell.manager)?;
    show_list(shell, records, filter, format);
    Ok(Flow::Continue)
}

/// Filter and print records in the list format.
pub(crate) fn show_list(shell: &mut Shell, records: Vec<Record>, filter: &str, format: Option<OutputFormat>) {
    let records = ConfigManager::apply_filter(records, filter);
    let format = shell.list_format(format);
    let text = shell.display.records(&records, format);
    shell.print(&text);
}

/// Print one record, or a small group of them, in the record format.
pub(crate) fn show_record(shell: &mut Shell, value: &Value, format: Option<OutputFormat>) {
    let format = shell.record_format(format);
    let text = shell.display.record(value, format);
    shell.print(&text);
}

/// Print one record fetched by the key in `arg`.
pub(crate) fn get_command(
    shell: &mut Shell,
    arg: &str,
    what: &str,
    fetch: impl FnOnce(&mut Shell, &RecordKey) -> szconfig::Result<Record>,
) -> anyhow::Result<Flow> {
    let (rest, format) = split_format(arg);
    let key = parse_key(rest, what)?;
    let found = fetch(shell, &key)?;
    show_record(shell, &Value::Object(found), format);
    Ok(Flow::Continue)
}

/// Confirm, delete and report.
pub(crate) fn delete_command(
    shell: &mut Shell,
    arg: &str,
    what: &str,
    delete: impl FnOnce(&mut Shell, &RecordKey) -> szconfig::Result<()>,
) -> anyhow::Result<Flow> {
    let key = parse_key(arg, &format!("{what} code or ID"))?;
    let noun = what.to_lowercase();
    if !shell.confirm(&format!("Delete {noun} {key}?"))? {
        return Ok(Flow::Continue);
    }
    delete(shell, &key)?;
    shell.success(format!("{what} {key} deleted"));
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_every_verb() {
        let registry = Registry::new();
        assert_eq!(registry.len(), 120);

        let categorised: Vec<&str> = HELP_CATEGORIES.iter().flat_map(|(_, verbs)| verbs.iter().copied()).collect();
        assert_eq!(categorised.len(), 120);
        for verb in &categorised {
            assert!(registry.get(verb).is_some(), "{verb} is not registered");
        }
        for command in registry.iter() {
            assert!(categorised.contains(&command.name), "{} has no category", command.name);
            assert!(!command.brief.is_empty() && !command.syntax.is_empty(), "{} lacks help", command.name);
        }
    }

    #[test]
    fn test_aliases_share_handlers() {
        let registry = Registry::new();
        let pairs = [
            ("addComparisonFunc", "addComparisonFunction"),
            ("addComparisonFuncReturnCode", "addComparisonThreshold"),
            ("addExpressionFunc", "addExpressionFunction"),
            ("addStandardizeFunction", "addStandardizeFunc"),
            ("addFeatureComparison", "addComparisonCall"),
            ("addFeatureComparisonElement", "addComparisonCallElement"),
            ("addFeatureDistinctCallElement", "addDistinctCallElement"),
            ("deleteFeatureComparison", "deleteComparisonCall"),
            ("deleteFeatureComparisonElement", "deleteComparisonCallElement"),
            ("setFeatureElementDerived", "setFeatureElement"),
            ("setFeatureElementDisplayLevel", "setFeatureElement"),
            ("exit", "quit"),
        ];
        for (alias, target) in pairs {
            let alias = registry.get(alias).unwrap();
            let target = registry.get(target).unwrap();
            assert!(std::ptr::fn_addr_eq(alias.handler, target.handler), "{} differs", alias.name);
        }
    }

    #[test]
    fn test_lookup_ignores_case() {
        let registry = Registry::new();
        assert_eq!(registry.get("LISTDATASOURCES").unwrap().name, "listDataSources");
        assert!(registry.get("listDataSource").is_none());
    }

    #[test]
    fn test_split_format() {
        assert_eq!(split_format("NAME json"), ("NAME", Some(OutputFormat::Json)));
        assert_eq!(split_format("JSONL"), ("", Some(OutputFormat::Jsonl)));
        assert_eq!(split_format("cust  Table "), ("cust", Some(OutputFormat::Table)));
        assert_eq!(split_format("{\"id\": 1}"), ("{\"id\": 1}", None));
        assert_eq!(split_format(""), ("", None));
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("12", "feature").unwrap(), RecordKey::Id(12));
        assert_eq!(parse_key("name json", "feature").unwrap(), RecordKey::Code("NAME".into()));
        assert_eq!(parse_key("{\"rule_id\": 7}", "rule").unwrap(), RecordKey::Id(7));
        assert_eq!(parse_key("{\"feature\": \"addr\"}", "feature").unwrap(), RecordKey::Code("ADDR".into()));
        assert!(parse_key("", "feature").is_err());
        assert!(parse_key("{bad", "feature").is_err());
    }

    #[test]
    fn test_key_ignores_fields_merely_ending_in_id() {
        assert_eq!(parse_key("{\"grid\": 5, \"element\": \"addr\"}", "element").unwrap(), RecordKey::Code("ADDR".into()));
        assert_eq!(parse_key("{\"featureId\": \"9\"}", "feature").unwrap(), RecordKey::Id(9));
        assert_eq!(parse_key("{\"ID\": 3}", "feature").unwrap(), RecordKey::Id(3));
        assert!(!is_id_field("void"));
        assert!(is_id_field("FTYPE_ID"));
    }

    #[test]
    fn test_json_or_positional() {
        let record = json_or_positional("NAME FULL_NAME", &["feature", "element", "execOrder"]).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record["element"], "FULL_NAME");
        assert!(json_or_positional("a b c d", &["feature", "element", "execOrder"]).is_err());
        let record = json_or_positional("{\"feature\": \"NAME\"}", &["feature"]).unwrap();
        assert_eq!(record["feature"], "NAME");
    }
}
