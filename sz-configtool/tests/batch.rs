use std::{
    cell::RefCell,
    fs,
    io::{self, Cursor, Write},
    path::PathBuf,
    rc::Rc,
    sync::atomic::Ordering,
};

use sz_configtool::{Flow, RuntimeConfig, Shell, input::PlainReader};
use szconfig::{ConfigManager, backend::MemoryBackend};

/// Output sink the test keeps a handle to.
#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn config(force: bool) -> RuntimeConfig {
    RuntimeConfig {
        settings_path: None,
        repository: PathBuf::from("unused"),
        pager: None,
        history_file: PathBuf::from("unused_history"),
        history_enabled: false,
        force,
        color: false,
        verbose: false,
        file_to_process: None,
    }
}

/// A shell over the template configuration that answers prompts from
/// `answers`.
fn shell(force: bool, answers: &str) -> (Shell, Captured) {
    let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
    manager.initialize().unwrap();
    let out = Captured::default();
    let input = PlainReader::new(Cursor::new(answers.as_bytes().to_vec()));
    let shell = Shell::new(manager, config(force), Box::new(input), Box::new(out.clone()));
    (shell, out)
}

#[test]
fn test_batch_file_runs_every_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    fs::write(
        &path,
        "# set up a data source\n\naddDataSource customer\nlistDataSources json\nfrobnicate\nsave\nquit\nlistFeatures\n",
    )
    .unwrap();
    let (mut shell, out) = shell(true, "");

    shell.run_batch(&path).unwrap();

    let text = out.text();
    assert!(text.contains("Executing: addDataSource customer"));
    assert!(!text.contains("Executing: # set up"));
    assert!(text.contains("Success: Data source CUSTOMER added with ID"));
    assert!(text.contains("\"dataSource\": \"CUSTOMER\""));
    assert!(text.contains("Error: Unknown command: frobnicate. Type 'help' for available commands."));
    assert!(text.contains("Success: Configuration saved with ID:"));
    assert!(text.contains("Info: Goodbye!"));
    assert!(!text.contains("Executing: listFeatures"));
    assert!(!shell.manager().is_dirty());
}

#[test]
fn test_missing_batch_file_is_an_error() {
    let (mut shell, _) = shell(true, "");
    let err = shell.run_batch(std::path::Path::new("/nonexistent/commands.txt")).unwrap_err();
    assert!(err.to_string().starts_with("Error reading file"));
}

#[test]
fn test_help_lists_every_command() {
    let (mut shell, out) = shell(true, "");

    assert_eq!(shell.execute("help"), Flow::Continue);
    assert_eq!(shell.execute("? addDataSource"), Flow::Continue);

    let text = out.text();
    assert!(text.contains("TOTAL COMMANDS AVAILABLE: 120"));
    assert!(text.contains("Data Source Management: (3 commands)"));
    assert!(text.contains("ADDDATASOURCE:"));
    assert!(text.contains("Syntax:"));
}

#[test]
fn test_format_choice_is_sticky() {
    let (mut shell, out) = shell(true, "");

    shell.execute("listDataSources jsonl");
    shell.execute("listDataSources");
    let text = out.text();
    let jsonl_lines = text.lines().filter(|line| line.starts_with("{\"")).count();
    assert_eq!(jsonl_lines, 4);

    shell.execute("listDataSources table");
    assert!(out.text().contains("│ TEST"));
}

#[test]
fn test_handler_errors_keep_the_shell_running() {
    let (mut shell, out) = shell(true, "");

    assert_eq!(shell.execute("getFeature NOT_A_FEATURE"), Flow::Continue);
    assert_eq!(shell.execute("addFeature {broken"), Flow::Continue);
    assert_eq!(shell.execute("deleteComparisonCall NAME"), Flow::Continue);

    let text = out.text();
    assert_eq!(text.matches("Error: ").count(), 3);
    assert!(text.contains("Invalid JSON"));
    assert!(text.contains("Call ID must be a number, got NAME"));
}

#[test]
fn test_declined_confirmation_keeps_record() {
    let (mut shell, out) = shell(false, "no\n");

    shell.execute("addDataSource CUSTOMER");
    shell.execute("deleteDataSource CUSTOMER");

    assert!(out.text().contains("Info: Cancelled"));
    let sources = shell.manager().data_sources().list().unwrap();
    assert_eq!(sources.len(), 3);
}

#[test]
fn test_interactive_quit_offers_to_save() {
    let (mut shell, out) = shell(false, "addFeature MY_FEATURE\nquit\nyes\n");

    shell.run_interactive().unwrap();

    let text = out.text();
    assert!(text.contains("Success: Feature MY_FEATURE added with ID"));
    assert!(text.contains("Success: Configuration saved with ID:"));
    assert!(text.contains("Info: Goodbye!"));
    assert!(!shell.manager().is_dirty());
}

#[test]
fn test_end_of_input_quits() {
    let (mut shell, out) = shell(true, "addElement MY_ELEMENT\n");

    shell.run_interactive().unwrap();

    let text = out.text();
    assert!(text.contains("Success: Element MY_ELEMENT added with ID"));
    assert!(text.contains("Warning: Unsaved changes discarded"));
    assert!(text.contains("Info: Goodbye!"));
}

#[test]
fn test_system_and_reference_commands() {
    let (mut shell, out) = shell(true, "");

    shell.execute("getCompatibilityVersion json");
    shell.execute("verifyCompatibilityVersion 0.0");
    shell.execute("listReferenceCodes matchLevels json");
    shell.execute("setSystemParameter QUEUE_SIZE 5");

    let text = out.text();
    assert!(text.contains("\"compatibilityVersion\""));
    assert!(text.contains("Error: Compatibility version mismatch: expected 0.0"));
    assert!(text.contains("\"codeType\""));
    assert!(text.contains("Success: System parameter QUEUE_SIZE set to 5"));
    assert!(shell.manager().is_dirty());
}

#[test]
fn test_exhausted_ids_keep_the_shell_running() {
    let (mut shell, out) = shell(true, "");

    shell.execute(r#"addDataSource {"dataSource": "BIG", "id": 9223372036854775807}"#);
    assert_eq!(shell.execute("addDataSource SMALL"), Flow::Continue);

    let text = out.text();
    assert!(text.contains("Success: Data source BIG added with ID 9223372036854775807"));
    assert!(text.contains("Error: ID space exhausted"));
    assert_eq!(shell.manager().data_sources().list().unwrap().len(), 3);
}

#[test]
fn test_interrupt_stops_batch_and_keeps_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    fs::write(&path, "addDataSource customer\nsave\n").unwrap();
    let (mut shell, out) = shell(true, "");

    shell.execute("addDataSource watchlist");
    shell.interrupt_handle().store(true, Ordering::SeqCst);
    shell.run_batch(&path).unwrap();

    let text = out.text();
    assert!(text.contains("Warning: Batch interrupted"));
    assert!(!text.contains("Executing: addDataSource customer"));
    assert!(shell.manager().is_dirty());

    // A stale interrupt does not abort the next command.
    shell.interrupt_handle().store(true, Ordering::SeqCst);
    assert_eq!(shell.execute("addDataSource customer"), Flow::Continue);
    assert!(out.text().contains("Success: Data source CUSTOMER added"));
    assert!(!out.text().contains("addDataSource interrupted"));
}
